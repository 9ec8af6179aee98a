//! Bootstrap configuration loading and resolution
//!
//! Settings sources priority:
//! 1. Command-line arguments
//! 2. Environment variables (`PERSP_CONFIG`, `PERSP_API_KEY`, `PERSP_STATE_DIR`)
//! 3. TOML configuration file
//! 4. Built-in defaults
//!
//! A missing config file is not an error: a warning is logged and defaults
//! are used. A file that exists but does not parse is a `Config` error.

use crate::{Error, Result};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use tracing::{info, warn};

/// Perspective schema endpoint of the CloudHealth API
pub const DEFAULT_API_URL: &str = "https://chapi.cloudhealthtech.com/v1/perspective_schemas";

pub const CONFIG_ENV_VAR: &str = "PERSP_CONFIG";
pub const API_KEY_ENV_VAR: &str = "PERSP_API_KEY";
pub const STATE_DIR_ENV_VAR: &str = "PERSP_STATE_DIR";

/// Bootstrap configuration loaded from TOML file
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TomlConfig {
    /// Perspective schema endpoint
    #[serde(default = "default_api_url")]
    pub api_url: String,

    /// API key (optional, may come from CLI or environment instead)
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub api_key: Option<String>,

    /// Directory holding per-perspective state records
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub state_dir: Option<PathBuf>,

    /// HTTP request timeout in seconds
    #[serde(default = "default_timeout_secs")]
    pub timeout_secs: u64,

    /// Logging configuration (optional)
    #[serde(default)]
    pub logging: LoggingConfig,
}

impl Default for TomlConfig {
    fn default() -> Self {
        Self {
            api_url: default_api_url(),
            api_key: None,
            state_dir: None,
            timeout_secs: default_timeout_secs(),
            logging: LoggingConfig::default(),
        }
    }
}

/// Logging configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LoggingConfig {
    /// Log level (trace, debug, info, warn, error)
    #[serde(default = "default_log_level")]
    pub level: String,

    /// Log file path (optional, logs to stderr if not specified)
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub file: Option<PathBuf>,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: default_log_level(),
            file: None,
        }
    }
}

fn default_api_url() -> String {
    DEFAULT_API_URL.to_string()
}

fn default_timeout_secs() -> u64 {
    30
}

fn default_log_level() -> String {
    "info".to_string()
}

/// Where the configuration came from
///
/// Loading happens before the tracing subscriber exists, so `load` returns
/// this instead of logging and the caller reports it once logging is up.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ConfigSource {
    File(PathBuf),
    /// Default location checked, nothing there
    Missing(PathBuf),
    /// Platform has no config directory
    NoConfigDir,
}

impl ConfigSource {
    /// Emit the load diagnostic; a missing file is a warning
    pub fn log(&self) {
        match self {
            ConfigSource::File(path) => info!("Loaded configuration from {}", path.display()),
            ConfigSource::Missing(path) => warn!(
                "Config file not found at {}, using built-in defaults",
                path.display()
            ),
            ConfigSource::NoConfigDir => {
                warn!("Could not determine config directory, using built-in defaults")
            }
        }
    }
}

impl TomlConfig {
    /// Load configuration, resolving the file location by priority
    ///
    /// Explicit path (CLI) → `PERSP_CONFIG` → `<config_dir>/persp/config.toml` → defaults.
    /// An explicitly named file must exist; the others are optional.
    pub fn load(explicit: Option<&Path>) -> Result<(Self, ConfigSource)> {
        let path = match explicit {
            Some(path) => path.to_path_buf(),
            None => match std::env::var(CONFIG_ENV_VAR) {
                Ok(path) => PathBuf::from(path),
                Err(_) => match default_config_path() {
                    Some(path) if path.exists() => path,
                    Some(path) => return Ok((Self::default(), ConfigSource::Missing(path))),
                    None => return Ok((Self::default(), ConfigSource::NoConfigDir)),
                },
            },
        };

        let config = Self::from_file(&path)?;
        Ok((config, ConfigSource::File(path)))
    }

    /// Parse a specific TOML file
    pub fn from_file(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path).map_err(|e| {
            Error::Config(format!("Read config {} failed: {}", path.display(), e))
        })?;
        toml::from_str(&content)
            .map_err(|e| Error::Config(format!("Parse config {} failed: {}", path.display(), e)))
    }
}

/// `<config_dir>/persp/config.toml` for the current platform
pub fn default_config_path() -> Option<PathBuf> {
    dirs::config_dir().map(|d| d.join("persp").join("config.toml"))
}

/// OS-dependent default state directory
pub fn default_state_dir() -> PathBuf {
    dirs::data_local_dir()
        .map(|d| d.join("persp"))
        .unwrap_or_else(|| PathBuf::from("./persp_state"))
}

/// Validate API key (non-empty, non-whitespace)
pub fn is_valid_key(key: &str) -> bool {
    !key.trim().is_empty()
}

/// Resolve the API key from 3-tier configuration
///
/// **Priority:** CLI → ENV → TOML. The key itself is never logged.
pub fn resolve_api_key(cli_arg: Option<&str>, toml_config: &TomlConfig) -> Result<String> {
    if let Some(key) = cli_arg.filter(|k| is_valid_key(k)) {
        info!("API key taken from command line");
        return Ok(key.trim().to_string());
    }

    if let Ok(key) = std::env::var(API_KEY_ENV_VAR) {
        if is_valid_key(&key) {
            info!("API key loaded from environment variable");
            return Ok(key.trim().to_string());
        }
    }

    if let Some(key) = toml_config.api_key.as_deref().filter(|k| is_valid_key(k)) {
        info!("API key loaded from TOML config");
        return Ok(key.trim().to_string());
    }

    Err(Error::Config(format!(
        "API key not configured. Please configure using one of:\n\
         1. Command line: --api-key <key>\n\
         2. Environment: {}=<key>\n\
         3. TOML config: api_key = \"<key>\"",
        API_KEY_ENV_VAR
    )))
}

/// Resolve the state directory
///
/// **Priority:** CLI → ENV → TOML → OS default
pub fn resolve_state_dir(cli_arg: Option<&Path>, toml_config: &TomlConfig) -> PathBuf {
    if let Some(path) = cli_arg {
        return path.to_path_buf();
    }

    if let Ok(path) = std::env::var(STATE_DIR_ENV_VAR) {
        if !path.trim().is_empty() {
            return PathBuf::from(path);
        }
    }

    if let Some(path) = &toml_config.state_dir {
        return path.clone();
    }

    default_state_dir()
}
