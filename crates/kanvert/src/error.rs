//! Error types for Kanvert.
//!
//! Every fallible operation in the crate returns [`KanvertError`]. The variants
//! follow the conversion error taxonomy:
//!
//! - `Validation` - malformed or unsupported requests (unknown converter, no
//!   converter for a format, empty content)
//! - `Processing` - a converter's internal step failed (external tool crashed,
//!   timed out, produced no output)
//! - `Configuration` - invalid settings or config files
//! - `MissingDependency` - an optional engine (LibreOffice, Chromium, ...) is absent
//!
//! Converters capture `Processing` errors into a failed
//! [`ConversionResult`](crate::types::ConversionResult); only the lookup failures
//! of [`ConverterRegistry::convert`](crate::plugins::ConverterRegistry::convert)
//! reach callers as `Err`.
//!
//! # Example
//!
//! ```rust
//! use kanvert::{KanvertError, Result};
//!
//! fn require_content(content: &str) -> Result<&str> {
//!     if content.trim().is_empty() {
//!         return Err(KanvertError::validation("Content cannot be empty"));
//!     }
//!     Ok(content)
//! }
//! ```
use thiserror::Error;

/// Result type alias using `KanvertError`.
pub type Result<T> = std::result::Result<T, KanvertError>;

/// Main error type for all Kanvert operations.
#[derive(Debug, Error)]
pub enum KanvertError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Validation error: {message}")]
    Validation {
        message: String,
        #[source]
        source: Option<Box<dyn std::error::Error + Send + Sync>>,
    },

    #[error("Processing error: {message}")]
    Processing {
        message: String,
        #[source]
        source: Option<Box<dyn std::error::Error + Send + Sync>>,
    },

    #[error("Configuration error: {message}")]
    Configuration {
        message: String,
        #[source]
        source: Option<Box<dyn std::error::Error + Send + Sync>>,
    },

    #[error("Serialization error: {message}")]
    Serialization {
        message: String,
        #[source]
        source: Option<Box<dyn std::error::Error + Send + Sync>>,
    },

    #[error("Missing dependency: {0}")]
    MissingDependency(String),

    #[error("Plugin error in '{plugin_name}': {message}")]
    Plugin { message: String, plugin_name: String },

    #[error("{operation} timed out after {seconds} seconds")]
    Timeout { operation: String, seconds: u64 },

    #[error("{0}")]
    Other(String),
}

impl From<serde_json::Error> for KanvertError {
    fn from(err: serde_json::Error) -> Self {
        KanvertError::Serialization {
            message: err.to_string(),
            source: Some(Box::new(err)),
        }
    }
}

impl From<toml::de::Error> for KanvertError {
    fn from(err: toml::de::Error) -> Self {
        KanvertError::Configuration {
            message: err.to_string(),
            source: Some(Box::new(err)),
        }
    }
}

macro_rules! error_constructor {
    ($name:ident, $variant:ident) => {
        paste::paste! {
            #[doc = "Create a " $variant " error"]
            pub fn $name<S: Into<String>>(message: S) -> Self {
                Self::$variant {
                    message: message.into(),
                    source: None,
                }
            }

            #[doc = "Create a " $variant " error with source"]
            pub fn [<$name _with_source>]<S: Into<String>, E: std::error::Error + Send + Sync + 'static>(
                message: S,
                source: E,
            ) -> Self {
                Self::$variant {
                    message: message.into(),
                    source: Some(Box::new(source)),
                }
            }
        }
    };
}

impl KanvertError {
    error_constructor!(validation, Validation);
    error_constructor!(processing, Processing);
    error_constructor!(configuration, Configuration);
    error_constructor!(serialization, Serialization);

    /// Short machine-readable name of the variant, used in API error bodies.
    pub fn kind(&self) -> &'static str {
        match self {
            KanvertError::Io(_) => "IoError",
            KanvertError::Validation { .. } => "ValidationError",
            KanvertError::Processing { .. } => "ProcessingError",
            KanvertError::Configuration { .. } => "ConfigurationError",
            KanvertError::Serialization { .. } => "SerializationError",
            KanvertError::MissingDependency(_) => "MissingDependencyError",
            KanvertError::Plugin { .. } => "PluginError",
            KanvertError::Timeout { .. } => "TimeoutError",
            KanvertError::Other(_) => "ConversionError",
        }
    }

    /// Message without the variant prefix added by `Display`.
    pub fn message(&self) -> String {
        match self {
            KanvertError::Validation { message, .. }
            | KanvertError::Processing { message, .. }
            | KanvertError::Configuration { message, .. }
            | KanvertError::Serialization { message, .. }
            | KanvertError::Plugin { message, .. } => message.clone(),
            KanvertError::MissingDependency(message) | KanvertError::Other(message) => message.clone(),
            other => other.to_string(),
        }
    }
}
