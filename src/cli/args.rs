//! Command-line argument parsing for chatloop

use clap::Parser;
use std::path::PathBuf;

/// chatloop - interactive terminal chat with an LLM agent
#[derive(Parser, Debug)]
#[command(name = "chatloop")]
#[command(version)]
#[command(about = "Interactive terminal chat with a streaming LLM agent", long_about = None)]
pub struct Args {
    /// Agent definition file (TOML)
    #[arg(short, long, value_name = "PATH")]
    pub agent: PathBuf,

    /// Configuration file; replaces ~/.chatrc and ./.chatrc discovery
    #[arg(short, long, value_name = "PATH")]
    pub config: Option<PathBuf>,

    /// Log verbosity: default info, -v debug, -vv trace
    #[arg(short, long, action = clap::ArgAction::Count)]
    pub verbose: u8,
}

/// Verbosity level enum
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Verbosity {
    Normal,
    Verbose,
    VeryVerbose,
}

impl Args {
    /// Get verbosity level based on flags
    pub fn verbosity(&self) -> Verbosity {
        match self.verbose {
            0 => Verbosity::Normal,
            1 => Verbosity::Verbose,
            _ => Verbosity::VeryVerbose,
        }
    }
}

impl Verbosity {
    /// Default log filter directive
    pub fn log_level(&self) -> &'static str {
        match self {
            Verbosity::Normal => "info",
            Verbosity::Verbose => "debug",
            Verbosity::VeryVerbose => "trace",
        }
    }
}
