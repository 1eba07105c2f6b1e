//! Settings and runtime configuration.
//!
//! - [`config`]: process-level [`Settings`] loaded from defaults, `kanvert.toml`
//!   and `KANVERT_*` environment variables
//! - [`config_manager`]: the scoped [`ConfigManager`] with validation rules and
//!   per-converter configuration

pub mod config;
pub mod config_manager;

pub use config::{Environment, LogFormat, Settings};
pub use config_manager::{
    ConfigEntry, ConfigHealthStatus, ConfigManager, ConfigScope, ConverterConfig, ValidationRules, ValueType,
};
