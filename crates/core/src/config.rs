//! TOML-based configuration for ldapmerge.
//!
//! Every section is optional; a missing file yields the defaults. The NSX
//! password is never stored in the file: `nsx.password_env` names an
//! environment variable that is resolved at runtime via
//! [`AppConfig::resolve_env_vars`]. `LDAPMERGE_*` environment variables
//! override file values (see [`AppConfig::apply_env_overrides`]).

use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};
use tracing::{debug, info, warn};

use crate::errors::ConfigError;

/// Default config file name, relative to the user's home directory.
pub const CONFIG_FILE_NAME: &str = ".ldapmerge.toml";

/// Accepted values for `logging.level`.
pub const LOG_LEVELS: &[&str] = &["trace", "debug", "info", "warn", "error"];

// ---------------------------------------------------------------------------
// Top-level config
// ---------------------------------------------------------------------------

/// Contents of `~/.ldapmerge.toml`. Every section is optional.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct AppConfig {
    #[serde(default)]
    pub logging: LoggingConfig,

    #[serde(default)]
    pub server: ServerConfig,

    #[serde(default)]
    pub nsx: NsxConfig,
}

// ---------------------------------------------------------------------------
// Logging
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LoggingConfig {
    /// Directory for rolling log files.
    #[serde(default = "default_log_dir")]
    pub dir: PathBuf,

    /// Minimum tracing level: trace, debug, info, warn, error.
    #[serde(default = "default_log_level")]
    pub level: String,

    /// Mirror log events to stderr.
    #[serde(default)]
    pub console: bool,

    /// Write file logs as JSON lines (plain text otherwise).
    #[serde(default = "default_true")]
    pub json: bool,

    /// Number of daily log files to keep.
    #[serde(default = "default_max_files")]
    pub max_files: usize,
}

fn data_dir() -> PathBuf {
    dirs::home_dir()
        .unwrap_or_else(|| PathBuf::from("."))
        .join(".ldapmerge")
}
fn default_log_dir() -> PathBuf {
    data_dir().join("logs")
}
fn default_log_level() -> String {
    "info".into()
}
fn default_true() -> bool {
    true
}
fn default_max_files() -> usize {
    7
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            dir: default_log_dir(),
            level: default_log_level(),
            console: false,
            json: true,
            max_files: default_max_files(),
        }
    }
}

// ---------------------------------------------------------------------------
// HTTP server
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ServerConfig {
    /// Listen address, e.g. `0.0.0.0:8080`.
    #[serde(default = "default_listen")]
    pub listen: String,

    /// SQLite database holding merge history and connection profiles.
    #[serde(default = "default_db_path")]
    pub db_path: PathBuf,
}

fn default_listen() -> String {
    "0.0.0.0:8080".into()
}
fn default_db_path() -> PathBuf {
    data_dir().join("data.db")
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            listen: default_listen(),
            db_path: default_db_path(),
        }
    }
}

// ---------------------------------------------------------------------------
// NSX Manager
// ---------------------------------------------------------------------------

/// Fallback NSX connection used when neither flags nor a profile supply one.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct NsxConfig {
    /// Base URL, e.g. `https://nsx.example.lab`.
    #[serde(default)]
    pub host: Option<String>,

    #[serde(default)]
    pub username: Option<String>,

    /// Name of the environment variable holding the password.
    #[serde(default)]
    pub password_env: Option<String>,

    /// Skip TLS certificate verification.
    #[serde(default)]
    pub insecure: bool,

    /// Request timeout in seconds.
    #[serde(default = "default_timeout_secs")]
    pub timeout_secs: u64,

    /// Resolved from `password_env` at runtime.
    #[serde(skip)]
    pub password: Option<String>,
}

fn default_timeout_secs() -> u64 {
    30
}

impl Default for NsxConfig {
    fn default() -> Self {
        Self {
            host: None,
            username: None,
            password_env: None,
            insecure: false,
            timeout_secs: default_timeout_secs(),
            password: None,
        }
    }
}

// ---------------------------------------------------------------------------
// Loading & resolving
// ---------------------------------------------------------------------------

impl AppConfig {
    /// Path of the per-user config file, if a home directory is known.
    pub fn default_path() -> Option<PathBuf> {
        dirs::home_dir().map(|h| h.join(CONFIG_FILE_NAME))
    }

    /// Parse a TOML file as-is; `*_env` references stay unresolved.
    pub fn load_from_file<P: AsRef<Path>>(path: P) -> Result<Self, ConfigError> {
        let path = path.as_ref();
        info!(path = %path.display(), "loading configuration");

        if !path.exists() {
            return Err(ConfigError::FileNotFound(path.display().to_string()));
        }

        let contents = std::fs::read_to_string(path)?;
        let config: AppConfig =
            toml::from_str(&contents).map_err(|e| ConfigError::ParseError(e.to_string()))?;

        debug!(path = %path.display(), "configuration parsed");
        Ok(config)
    }

    /// Load configuration for a command run.
    ///
    /// An explicitly requested file must exist. Without one, the default
    /// per-user file is used when present and built-in defaults otherwise.
    /// Environment overrides and `*_env` references are applied either way.
    pub fn load(explicit: Option<&Path>) -> Result<Self, ConfigError> {
        let mut config = match explicit {
            Some(path) => Self::load_from_file(path)?,
            None => match Self::default_path() {
                Some(path) if path.exists() => Self::load_from_file(path)?,
                _ => {
                    debug!("no configuration file, using defaults");
                    Self::default()
                }
            },
        };
        config.apply_env_overrides();
        config.resolve_env_vars()?;
        config.validate()?;
        Ok(config)
    }

    /// Apply `LDAPMERGE_*` overrides from the process environment.
    pub fn apply_env_overrides(&mut self) {
        self.apply_overrides(|name| std::env::var(name).ok());
    }

    /// Apply overrides from an arbitrary lookup. Empty values are ignored.
    pub fn apply_overrides<F>(&mut self, lookup: F)
    where
        F: Fn(&str) -> Option<String>,
    {
        let get = |name: &str| lookup(name).filter(|v| !v.is_empty());

        if let Some(v) = get("LDAPMERGE_LOG_LEVEL") {
            self.logging.level = v;
        }
        if let Some(v) = get("LDAPMERGE_LOG_DIR") {
            self.logging.dir = PathBuf::from(v);
        }
        if let Some(v) = get("LDAPMERGE_LISTEN") {
            self.server.listen = v;
        }
        if let Some(v) = get("LDAPMERGE_DB") {
            self.server.db_path = PathBuf::from(v);
        }
        if let Some(v) = get("LDAPMERGE_NSX_HOST") {
            self.nsx.host = Some(v);
        }
        if let Some(v) = get("LDAPMERGE_NSX_USERNAME") {
            self.nsx.username = Some(v);
        }
    }

    /// Read the secrets named by `*_env` fields.
    ///
    /// A missing variable logs a warning but does not fail; callers decide
    /// whether the password is required.
    pub fn resolve_env_vars(&mut self) -> Result<(), ConfigError> {
        if let Some(ref env_name) = self.nsx.password_env {
            self.nsx.password = resolve_optional_env(env_name, "nsx.password_env");
        }
        Ok(())
    }

    /// Validate that all values are sane.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if !LOG_LEVELS.contains(&self.logging.level.to_ascii_lowercase().as_str()) {
            return Err(ConfigError::InvalidValue {
                field: "logging.level".into(),
                detail: format!(
                    "'{}' is not one of {}",
                    self.logging.level,
                    LOG_LEVELS.join(", ")
                ),
            });
        }
        if self.logging.max_files == 0 {
            return Err(ConfigError::InvalidValue {
                field: "logging.max_files".into(),
                detail: "must keep at least one log file".into(),
            });
        }
        if self.server.listen.trim().is_empty() {
            return Err(ConfigError::InvalidValue {
                field: "server.listen".into(),
                detail: "listen address must not be empty".into(),
            });
        }
        if self.nsx.timeout_secs == 0 {
            return Err(ConfigError::InvalidValue {
                field: "nsx.timeout_secs".into(),
                detail: "timeout must be > 0".into(),
            });
        }
        Ok(())
    }
}

/// Value of `env_name`; unset and empty both count as missing.
fn resolve_optional_env(env_name: &str, field: &str) -> Option<String> {
    match std::env::var(env_name) {
        Ok(val) if !val.is_empty() => {
            debug!(field, env_name, "resolved env var");
            Some(val)
        }
        Ok(_) => {
            warn!(field, env_name, "env var is set but empty");
            None
        }
        Err(_) => {
            warn!(field, env_name, "env var not set");
            None
        }
    }
}

/// Commented configuration written by `ldapmerge init`.
pub const DEFAULT_CONFIG_TOML: &str = r#"# ldapmerge configuration

[logging]
# dir = "~/.ldapmerge/logs"
level = "info"
console = false
json = true
max_files = 7

[server]
listen = "0.0.0.0:8080"
# db_path = "~/.ldapmerge/data.db"

[nsx]
# host = "https://nsx.example.lab"
# username = "admin"
# Name of the environment variable that holds the NSX password.
# password_env = "NSX_PASSWORD"
insecure = false
timeout_secs = 30
"#;
