//! CLI module for chatloop
//!
//! Handles command-line argument parsing, layered configuration and `.env`
//! loading.

pub mod args;
pub mod config;
pub mod env;

pub use args::{Args, Verbosity};
pub use config::{
    expand_path, parse_color, ChatConfig, EngineConfig, FeatureFlags, Palette, PathsConfig,
};
pub use env::load_dotenv;
