//! Bootstrap configuration
//!
//! Loaded once at startup from a TOML file. A missing file is not an error:
//! the compiled defaults are used and a warning is logged.
//!
//! Config file resolution priority:
//! 1. Explicit path (command-line argument)
//! 2. `BANDSYNC_CONFIG` environment variable
//! 3. `<user config dir>/bandsync/config.toml`

use crate::{Error, Result};
use serde::Deserialize;
use std::path::{Path, PathBuf};
use tracing::{info, warn};

/// Environment variable naming an explicit config file
pub const CONFIG_ENV_VAR: &str = "BANDSYNC_CONFIG";

/// Default debounce window for the resync coordinator
pub const DEFAULT_DEBOUNCE_MS: u64 = 100;

/// Top-level configuration file layout
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct TomlConfig {
    /// Sync engine settings
    #[serde(default)]
    pub sync: SyncConfig,

    /// Logging configuration
    #[serde(default)]
    pub logging: LoggingConfig,
}

/// Which remote-to-local sync path the application runs
///
/// Chosen once at startup. Only the audit-log path is implemented here;
/// the per-table legacy path lives outside this engine.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SyncStrategy {
    #[default]
    AuditLog,
    Legacy,
}

/// `[sync]` section
#[derive(Debug, Clone, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct SyncConfig {
    #[serde(default)]
    pub strategy: SyncStrategy,

    /// Coalescing window for change notifications
    #[serde(default = "default_debounce_ms")]
    pub debounce_ms: u64,

    /// Ignore notifications originated by `current_user_id`
    #[serde(default = "default_true")]
    pub skip_own_changes: bool,

    /// Identity of the local user (for self-origin filtering)
    #[serde(default)]
    pub current_user_id: Option<String>,

    /// Only react to notifications for this band
    #[serde(default)]
    pub band_id: Option<String>,
}

impl Default for SyncConfig {
    fn default() -> Self {
        Self {
            strategy: SyncStrategy::default(),
            debounce_ms: DEFAULT_DEBOUNCE_MS,
            skip_own_changes: true,
            current_user_id: None,
            band_id: None,
        }
    }
}

impl SyncConfig {
    /// Fail unless the configured strategy is one this engine runs
    pub fn ensure_supported(&self) -> Result<()> {
        match self.strategy {
            SyncStrategy::AuditLog => Ok(()),
            SyncStrategy::Legacy => Err(Error::Unsupported(
                "legacy per-table sync is not handled by the audit-log engine".to_string(),
            )),
        }
    }
}

/// `[logging]` section
#[derive(Debug, Clone, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct LoggingConfig {
    /// Log level (trace, debug, info, warn, error)
    #[serde(default = "default_log_level")]
    pub level: String,

    /// Log file path (optional, logs to stderr if not specified)
    #[serde(default)]
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

fn default_debounce_ms() -> u64 {
    DEFAULT_DEBOUNCE_MS
}

fn default_true() -> bool {
    true
}

fn default_log_level() -> String {
    "info".to_string()
}

impl TomlConfig {
    /// Parse configuration from TOML text
    pub fn from_toml_str(content: &str) -> Result<Self> {
        toml::from_str(content).map_err(|e| Error::Config(format!("Invalid config: {}", e)))
    }

    /// Load configuration from a specific file
    ///
    /// A missing file yields defaults with a warning; an unreadable or
    /// malformed file is an error.
    pub fn load_from(path: &Path) -> Result<Self> {
        if !path.exists() {
            warn!(
                "Config file {} not found, using built-in defaults",
                path.display()
            );
            return Ok(Self::default());
        }

        let content = std::fs::read_to_string(path)?;
        let config = Self::from_toml_str(&content)?;
        info!("Loaded configuration from {}", path.display());
        Ok(config)
    }

    /// Resolve the config path by priority and load it
    pub fn load(cli_path: Option<&Path>) -> Result<Self> {
        match resolve_config_path(cli_path) {
            Some(path) => Self::load_from(&path),
            None => {
                warn!("No config directory available, using built-in defaults");
                Ok(Self::default())
            }
        }
    }
}

/// Config file location following the documented priority order
pub fn resolve_config_path(cli_path: Option<&Path>) -> Option<PathBuf> {
    // Priority 1: Command-line argument
    if let Some(path) = cli_path {
        return Some(path.to_path_buf());
    }

    // Priority 2: Environment variable
    if let Ok(path) = std::env::var(CONFIG_ENV_VAR) {
        if !path.trim().is_empty() {
            return Some(PathBuf::from(path));
        }
    }

    // Priority 3: OS-dependent user config directory
    dirs::config_dir().map(|dir| dir.join("bandsync").join("config.toml"))
}
