//! Layered configuration for chatloop
//!
//! Layers, later wins: built-in defaults, `~/.chatrc`, `./.chatrc`.
//! `--config <path>` replaces the two discovered files. Tables are merged
//! key by key, so a layer only needs the values it changes.
//!
//! Per-agent overrides live under `[agents.<name>]` and use the leaf key:
//! `agents.Sally.max_retries` beats `behavior.max_retries`.

use crate::errors::{ConsoleError, Result};
use crate::recovery::RetryPolicy;
use crate::streaming::{IndicatorConfig, IndicatorStyle};
use colored::Color;
use std::path::{Path, PathBuf};
use std::time::Duration;
use toml::{Table, Value};

/// Config file name, looked up in the home and working directories
pub const CONFIG_FILE_NAME: &str = ".chatrc";

/// Built-in defaults, the lowest layer
pub const DEFAULT_CONFIG: &str = r#"
[behavior]
max_retries = 3
retry_delay = 2.0
timeout = 120.0
spinner_style = "dots"

[features]
auto_save = false
show_metadata = true
show_tokens = false
rich_enabled = true

[ui]
show_banner = true
show_thinking_indicator = true
show_duration = true
show_status_bar = false

[colors]
user = "bright white"
agent = "bright blue"
system = "yellow"
error = "bright red"
success = "bright green"
dim = "bright black"

[paths]
prompts_dir = "~/.prompts"
log_dir = "~/.chatloop/logs"
history_file = "~/.chat_history"
save_location = "~/agent-conversations"
"#;

/// Merged configuration tree
#[derive(Debug, Clone)]
pub struct ChatConfig {
    table: Table,
    sources: Vec<PathBuf>,
}

impl ChatConfig {
    /// Defaults only
    pub fn defaults() -> Result<Self> {
        let table = DEFAULT_CONFIG
            .parse::<Table>()
            .map_err(|e| ConsoleError::Config(format!("Invalid built-in defaults: {}", e)))?;
        Ok(Self {
            table,
            sources: Vec::new(),
        })
    }

    /// Load defaults plus either the explicit file or the discovered ones.
    pub fn load(explicit: Option<&Path>) -> Result<Self> {
        match explicit {
            Some(path) => {
                if !path.is_file() {
                    return Err(ConsoleError::Config(format!(
                        "Config file not found: {}",
                        path.display()
                    )));
                }
                Self::from_layers(&[path.to_path_buf()])
            }
            None => Self::from_layers(&discover()),
        }
    }

    /// Merge the given files over the defaults, in order.
    pub fn from_layers(paths: &[PathBuf]) -> Result<Self> {
        let mut config = Self::defaults()?;
        for path in paths {
            config.merge_file(path)?;
        }
        Ok(config)
    }

    fn merge_file(&mut self, path: &Path) -> Result<()> {
        let contents = std::fs::read_to_string(path).map_err(|e| {
            ConsoleError::Config(format!("Failed to read {}: {}", path.display(), e))
        })?;
        let layer = contents.parse::<Table>().map_err(|e| {
            ConsoleError::Config(format!("Failed to parse {}: {}", path.display(), e))
        })?;

        merge(&mut self.table, layer);
        self.sources.push(path.to_path_buf());
        tracing::debug!(path = %path.display(), "Config layer merged");
        Ok(())
    }

    /// Files merged over the defaults
    pub fn sources(&self) -> &[PathBuf] {
        &self.sources
    }

    pub fn is_file_backed(&self) -> bool {
        !self.sources.is_empty()
    }

    /// Look up a dotted key, trying `agents.<agent>.<leaf>` first.
    pub fn get(&self, key: &str, agent: Option<&str>) -> Option<&Value> {
        if let Some(agent) = agent {
            let leaf = key.rsplit('.').next().unwrap_or(key);
            let overridden = self
                .table
                .get("agents")
                .and_then(|agents| agents.get(agent))
                .and_then(|section| section.get(leaf));
            if overridden.is_some() {
                return overridden;
            }
        }
        lookup(&self.table, key)
    }

    pub fn get_bool(&self, key: &str, agent: Option<&str>) -> Result<bool> {
        match self.get(key, agent) {
            Some(Value::Boolean(value)) => Ok(*value),
            other => Err(type_error(key, "a boolean", other)),
        }
    }

    /// Integers are accepted where floats are expected.
    pub fn get_float(&self, key: &str, agent: Option<&str>) -> Result<f64> {
        match self.get(key, agent) {
            Some(Value::Float(value)) => Ok(*value),
            Some(Value::Integer(value)) => Ok(*value as f64),
            other => Err(type_error(key, "a number", other)),
        }
    }

    pub fn get_int(&self, key: &str, agent: Option<&str>) -> Result<i64> {
        match self.get(key, agent) {
            Some(Value::Integer(value)) => Ok(*value),
            other => Err(type_error(key, "an integer", other)),
        }
    }

    pub fn get_str(&self, key: &str, agent: Option<&str>) -> Result<&str> {
        match self.get(key, agent) {
            Some(Value::String(value)) => Ok(value),
            other => Err(type_error(key, "a string", other)),
        }
    }

    pub fn get_opt_str(&self, key: &str, agent: Option<&str>) -> Option<&str> {
        self.get(key, agent).and_then(Value::as_str)
    }
}

/// `~/.chatrc` then `./.chatrc`, whichever exist
fn discover() -> Vec<PathBuf> {
    let mut found: Vec<PathBuf> = Vec::new();
    let candidates = [
        dirs::home_dir().map(|home| home.join(CONFIG_FILE_NAME)),
        std::env::current_dir()
            .ok()
            .map(|cwd| cwd.join(CONFIG_FILE_NAME)),
    ];

    for path in candidates.into_iter().flatten() {
        if !path.is_file() {
            continue;
        }
        let canonical = path.canonicalize().unwrap_or_else(|_| path.clone());
        if !found.contains(&canonical) {
            found.push(canonical);
        }
    }
    found
}

fn lookup<'a>(table: &'a Table, key: &str) -> Option<&'a Value> {
    let mut parts = key.split('.');
    let first = table.get(parts.next()?)?;
    parts.try_fold(first, |value, part| value.get(part))
}

/// Deep merge `overlay` into `base`; tables merge, everything else replaces.
fn merge(base: &mut Table, overlay: Table) {
    for (key, value) in overlay {
        match (base.get_mut(&key), value) {
            (Some(Value::Table(existing)), Value::Table(incoming)) => merge(existing, incoming),
            (_, value) => {
                base.insert(key, value);
            }
        }
    }
}

fn type_error(key: &str, expected: &str, found: Option<&Value>) -> ConsoleError {
    match found {
        Some(value) => ConsoleError::Config(format!(
            "{} must be {}, found {}",
            key,
            expected,
            value.type_str()
        )),
        None => ConsoleError::Config(format!("{} is missing", key)),
    }
}

/// Expand a leading `~/` to the home directory
pub fn expand_path(path: &str) -> PathBuf {
    if let Some(rest) = path.strip_prefix("~/") {
        if let Some(home) = dirs::home_dir() {
            return home.join(rest);
        }
    }
    PathBuf::from(path)
}

/// Terminal colors by role
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Palette {
    pub user: Color,
    pub agent: Color,
    pub system: Color,
    pub error: Color,
    pub success: Color,
    pub dim: Color,
}

impl Default for Palette {
    fn default() -> Self {
        Self {
            user: Color::BrightWhite,
            agent: Color::BrightBlue,
            system: Color::Yellow,
            error: Color::BrightRed,
            success: Color::BrightGreen,
            dim: Color::BrightBlack,
        }
    }
}

/// Parse a color name (`bright blue`, `bright_blue`) or `#rrggbb`.
pub fn parse_color(name: &str) -> Option<Color> {
    let name = name.trim();
    if let Some(hex) = name.strip_prefix('#') {
        if hex.len() != 6 || !hex.is_ascii() {
            return None;
        }
        let channel = |i: usize| u8::from_str_radix(&hex[i..i + 2], 16).ok();
        return Some(Color::TrueColor {
            r: channel(0)?,
            g: channel(2)?,
            b: channel(4)?,
        });
    }

    let normalized = name.to_lowercase().replace(['_', '-'], " ");
    normalized.parse::<Color>().ok()
}

/// Paths used by the shell
#[derive(Debug, Clone, PartialEq)]
pub struct PathsConfig {
    pub prompts_dir: PathBuf,
    pub log_dir: PathBuf,
    pub history_file: PathBuf,
    pub save_location: PathBuf,
}

/// Feature switches
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FeatureFlags {
    pub auto_save: bool,
    pub show_metadata: bool,
    pub show_tokens: bool,
    pub show_duration: bool,
    pub show_banner: bool,
    pub show_status_bar: bool,
    pub rich_enabled: bool,
}

/// Effective settings for one agent, resolved once at startup
#[derive(Debug, Clone)]
pub struct EngineConfig {
    pub max_retries: u32,
    pub retry_delay: Duration,
    pub timeout: Duration,
    pub indicator: IndicatorConfig,
    pub features: FeatureFlags,
    pub model_display_name: Option<String>,
    pub palette: Palette,
    pub paths: PathsConfig,
    pub file_backed: bool,
}

impl EngineConfig {
    /// Resolve and validate every engine setting for `agent`.
    pub fn resolve(config: &ChatConfig, agent: &str) -> Result<Self> {
        let agent = Some(agent);

        let max_retries = config.get_int("behavior.max_retries", agent)?;
        if max_retries < 1 {
            return Err(ConsoleError::Config(format!(
                "behavior.max_retries must be at least 1, found {}",
                max_retries
            )));
        }
        let max_retries = u32::try_from(max_retries).map_err(|_| {
            ConsoleError::Config(format!("behavior.max_retries is too large: {}", max_retries))
        })?;

        let retry_delay = config.get_float("behavior.retry_delay", agent)?;
        if !retry_delay.is_finite() || retry_delay < 0.0 {
            return Err(ConsoleError::Config(format!(
                "behavior.retry_delay must be a non-negative number of seconds, found {}",
                retry_delay
            )));
        }

        let timeout = config.get_float("behavior.timeout", agent)?;
        if !timeout.is_finite() || timeout <= 0.0 {
            return Err(ConsoleError::Config(format!(
                "behavior.timeout must be a positive number of seconds, found {}",
                timeout
            )));
        }

        let features = FeatureFlags {
            auto_save: config.get_bool("features.auto_save", agent)?,
            show_metadata: config.get_bool("features.show_metadata", agent)?,
            show_tokens: config.get_bool("features.show_tokens", agent)?,
            rich_enabled: config.get_bool("features.rich_enabled", agent)?,
            show_duration: config.get_bool("ui.show_duration", agent)?,
            show_banner: config.get_bool("ui.show_banner", agent)?,
            show_status_bar: config.get_bool("ui.show_status_bar", agent)?,
        };

        let palette = resolve_palette(config)?;

        let indicator = IndicatorConfig {
            enabled: config.get_bool("ui.show_thinking_indicator", agent)?,
            style: if features.rich_enabled {
                IndicatorStyle::Spinner(config.get_str("behavior.spinner_style", agent)?.to_string())
            } else {
                IndicatorStyle::Dots
            },
            color: palette.system,
        };

        let paths = PathsConfig {
            prompts_dir: expand_path(config.get_str("paths.prompts_dir", agent)?),
            log_dir: expand_path(config.get_str("paths.log_dir", agent)?),
            history_file: expand_path(config.get_str("paths.history_file", agent)?),
            save_location: expand_path(config.get_str("paths.save_location", agent)?),
        };

        Ok(Self {
            max_retries,
            retry_delay: seconds("behavior.retry_delay", retry_delay)?,
            timeout: seconds("behavior.timeout", timeout)?,
            indicator,
            features,
            model_display_name: config
                .get_opt_str("model_display_name", agent)
                .map(str::to_string),
            palette,
            paths,
            file_backed: config.is_file_backed(),
        })
    }

    pub fn retry_policy(&self) -> RetryPolicy {
        RetryPolicy::new(self.max_retries, self.retry_delay)
    }
}

/// Seconds as a `Duration`; values too large to represent are rejected.
fn seconds(key: &str, value: f64) -> Result<Duration> {
    Duration::try_from_secs_f64(value)
        .map_err(|e| ConsoleError::Config(format!("{} is out of range ({}): {}", key, e, value)))
}

fn resolve_palette(config: &ChatConfig) -> Result<Palette> {
    let defaults = Palette::default();
    let color = |role: &str, fallback: Color| -> Result<Color> {
        let key = format!("colors.{}", role);
        match config.get_opt_str(&key, None) {
            Some(name) => parse_color(name)
                .ok_or_else(|| ConsoleError::Config(format!("{} has unknown color '{}'", key, name))),
            None => Ok(fallback),
        }
    };

    Ok(Palette {
        user: color("user", defaults.user)?,
        agent: color("agent", defaults.agent)?,
        system: color("system", defaults.system)?,
        error: color("error", defaults.error)?,
        success: color("success", defaults.success)?,
        dim: color("dim", defaults.dim)?,
    })
}
