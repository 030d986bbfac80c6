//! # Runtime Configuration
//!
//! Loads the [`KernelConfig`] from a JSON file and applies environment
//! overrides.
//!
//! ## File Format (`app-config.json`)
//!
//! ```json
//! {
//!   "strictMode": false,
//!   "autoInitialize": true,
//!   "features": {
//!     "storage":  { "enabled": true, "config": { "path": "./data" } },
//!     "sync":     { "enabled": true, "dependencies": ["storage"] }
//!   }
//! }
//! ```
//!
//! ## Environment Variables
//!
//! | Variable | Default | Description |
//! |----------|---------|-------------|
//! | `KERNEL_CONFIG_PATH` | `app-config.json` | Configuration file |
//! | `KERNEL_STRICT_MODE` | from file | Override `strictMode` |
//! | `KERNEL_AUTO_INITIALIZE` | from file | Override `autoInitialize` |

use kernel_telemetry::parse_flag;
use kernel_types::KernelConfig;
use std::path::{Path, PathBuf};
use thiserror::Error;
use tracing::{info, warn};

/// Configuration file used when `KERNEL_CONFIG_PATH` is unset.
pub const DEFAULT_CONFIG_PATH: &str = "app-config.json";

/// Configuration errors.
#[derive(Debug, Error)]
pub enum ConfigError {
    /// The file exists but could not be read.
    #[error("Failed to read config file {path:?}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    /// The file is not a valid configuration document.
    #[error("Failed to parse config file {path:?}: {source}")]
    Parse {
        path: PathBuf,
        #[source]
        source: serde_json::Error,
    },

    /// `KERNEL_CONFIG_PATH` names a file that does not exist.
    #[error("Config file not found: {0:?}")]
    NotFound(PathBuf),
}

/// Read and parse one configuration file.
pub fn load_config_file(path: &Path) -> Result<KernelConfig, ConfigError> {
    let raw = std::fs::read_to_string(path).map_err(|source| {
        if source.kind() == std::io::ErrorKind::NotFound {
            ConfigError::NotFound(path.to_path_buf())
        } else {
            ConfigError::Io {
                path: path.to_path_buf(),
                source,
            }
        }
    })?;

    KernelConfig::from_json(&raw).map_err(|source| ConfigError::Parse {
        path: path.to_path_buf(),
        source,
    })
}

/// Apply `KERNEL_STRICT_MODE` / `KERNEL_AUTO_INITIALIZE` as returned by
/// `lookup`.
pub fn apply_env_overrides<F>(mut config: KernelConfig, lookup: F) -> KernelConfig
where
    F: Fn(&str) -> Option<String>,
{
    if let Some(value) = lookup("KERNEL_STRICT_MODE") {
        config.strict_mode = parse_flag(&value);
    }
    if let Some(value) = lookup("KERNEL_AUTO_INITIALIZE") {
        config.auto_initialize = parse_flag(&value);
    }
    config
}

/// Load configuration from environment and files.
///
/// A missing default file yields an empty lenient configuration; a missing
/// file named explicitly by `KERNEL_CONFIG_PATH` is an error.
pub fn load_config() -> Result<KernelConfig, ConfigError> {
    let lookup = |key: &str| std::env::var(key).ok();

    let config = match lookup("KERNEL_CONFIG_PATH") {
        Some(path) => load_config_file(Path::new(&path))?,
        None => match load_config_file(Path::new(DEFAULT_CONFIG_PATH)) {
            Err(ConfigError::NotFound(path)) => {
                warn!(path = ?path, "No config file found, starting with no features enabled");
                KernelConfig::default()
            }
            other => other?,
        },
    };

    let config = apply_env_overrides(config, lookup);
    info!(
        strict_mode = config.strict_mode,
        auto_initialize = config.auto_initialize,
        features = config.features.len(),
        "Configuration loaded"
    );
    Ok(config)
}
