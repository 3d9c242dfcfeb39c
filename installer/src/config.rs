//! Optional TOML configuration file.
//!
//! The file lives at `<config_dir>/config.toml` unless `--config` names
//! another path. Every key is optional; command-line flags override it.
//!
//! ```toml
//! repository = "doitsujin/dxvk"
//! backup = true
//! http_timeout_secs = 60
//! install_log = "/home/me/dxvk-installs.json"
//! ```

use crate::dirs::BaseDirs;
use crate::error::ErrorClass;
use crate::release::provider::DEFAULT_REPOSITORY;
use serde::Deserialize;
use std::path::{Path, PathBuf};
use std::time::Duration;

const CONFIG_FILENAME: &str = "config.toml";

/// Settings read from the configuration file.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct ManagerConfig {
    /// GitHub repository to fetch releases from, as `owner/name`.
    pub repository: String,
    /// Whether to back up replaced files.
    pub backup: bool,
    /// Global timeout for each HTTP request, in seconds.
    pub http_timeout_secs: u64,
    /// Override for the install log location.
    pub install_log: Option<PathBuf>,
}

impl Default for ManagerConfig {
    fn default() -> Self {
        Self {
            repository: DEFAULT_REPOSITORY.to_owned(),
            backup: true,
            http_timeout_secs: 60,
            install_log: None,
        }
    }
}

impl ManagerConfig {
    /// The HTTP timeout as a [`Duration`].
    #[must_use]
    pub fn http_timeout(&self) -> Duration {
        Duration::from_secs(self.http_timeout_secs)
    }

    /// Parse configuration from TOML text.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError::Parse`] for malformed TOML or unknown keys and
    /// [`ConfigError::InvalidValue`] for out-of-range values.
    ///
    /// # Examples
    ///
    /// ```
    /// use dxvk_installer::config::ManagerConfig;
    /// use std::path::Path;
    ///
    /// let config = ManagerConfig::from_toml("backup = false", Path::new("config.toml"))?;
    /// assert!(!config.backup);
    /// assert_eq!(config.repository, "doitsujin/dxvk");
    /// # Ok::<(), dxvk_installer::config::ConfigError>(())
    /// ```
    pub fn from_toml(content: &str, path: &Path) -> Result<Self, ConfigError> {
        let config: Self = toml::from_str(content).map_err(|source| ConfigError::Parse {
            path: path.to_path_buf(),
            source: Box::new(source),
        })?;
        config.validate()?;
        Ok(config)
    }

    fn validate(&self) -> Result<(), ConfigError> {
        if self.http_timeout_secs == 0 {
            return Err(ConfigError::InvalidValue {
                key: "http_timeout_secs",
                reason: "must be at least 1".to_owned(),
            });
        }
        if self.repository.trim().is_empty() {
            return Err(ConfigError::InvalidValue {
                key: "repository",
                reason: "must not be empty".to_owned(),
            });
        }
        Ok(())
    }
}

/// Errors raised while loading the configuration file.
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    /// The file could not be read.
    #[error("failed to read config file {path}: {source}")]
    Read {
        /// Path of the config file.
        path: PathBuf,
        /// Underlying I/O error.
        #[source]
        source: std::io::Error,
    },

    /// The file is not valid TOML or contains unknown keys.
    #[error("invalid config file {path}: {source}")]
    Parse {
        /// Path of the config file.
        path: PathBuf,
        /// Underlying parse error.
        #[source]
        source: Box<toml::de::Error>,
    },

    /// A key holds an unusable value.
    #[error("invalid value for `{key}` in config file: {reason}")]
    InvalidValue {
        /// Offending key.
        key: &'static str,
        /// Why the value was rejected.
        reason: String,
    },
}

impl ConfigError {
    /// Return the [`ErrorClass`] of this error.
    #[must_use]
    pub fn class(&self) -> ErrorClass {
        match self {
            Self::Read { source, .. } => ErrorClass::from_io_kind(source.kind()),
            Self::Parse { .. } | Self::InvalidValue { .. } => ErrorClass::Validation,
        }
    }
}

/// Default location of the configuration file.
#[must_use]
pub fn default_config_path(dirs: &dyn BaseDirs) -> Option<PathBuf> {
    dirs.config_dir().map(|dir| dir.join(CONFIG_FILENAME))
}

/// Load the configuration.
///
/// An explicit path must exist. Without one, the default location is used
/// when it exists and built-in defaults otherwise.
///
/// # Errors
///
/// Returns an error if the chosen file cannot be read or parsed.
pub fn load(explicit: Option<&Path>, dirs: &dyn BaseDirs) -> Result<ManagerConfig, ConfigError> {
    let path = match explicit {
        Some(path) => path.to_path_buf(),
        None => match default_config_path(dirs) {
            Some(path) if path.is_file() => path,
            _ => return Ok(ManagerConfig::default()),
        },
    };

    log::debug!("loading configuration from {}", path.display());
    let content = std::fs::read_to_string(&path).map_err(|source| ConfigError::Read {
        path: path.clone(),
        source,
    })?;
    ManagerConfig::from_toml(&content, &path)
}
