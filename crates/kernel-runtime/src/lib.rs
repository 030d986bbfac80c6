//! # Kernel Runtime Library
//!
//! Exposes the bootstrapper's modules for testing and embedding. The main
//! entry point is the `main.rs` binary.
//!
//! - `config` - `app-config.json` loading and environment overrides
//! - `features` - features built from configuration records
//! - `runtime` - bus + manager wiring, startup and shutdown

pub mod config;
pub mod features;
pub mod runtime;

pub use config::{load_config, load_config_file, ConfigError, DEFAULT_CONFIG_PATH};
pub use features::ConfiguredFeature;
pub use runtime::KernelRuntime;
