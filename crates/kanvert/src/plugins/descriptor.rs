//! Plugin descriptors.
//!
//! A [`ConverterPlugin`] bundles a converter's name, dependency list,
//! availability probe, and factory method. Discovery works on descriptors, so an
//! optional engine that is not installed makes a converter absent instead of
//! failing process startup.

use serde::{Deserialize, Serialize};
use std::sync::Arc;

use crate::Result;
use crate::plugins::Converter;
use crate::types::ConversionFormat;

pub trait ConverterPlugin: Send + Sync {
    fn name(&self) -> &str;

    /// Names of the engines or libraries the converter needs. Informational.
    fn dependencies(&self) -> &[&'static str];

    /// Whether the converter's runtime dependencies are present.
    ///
    /// Probing only, no side effects. An `Err` counts as unavailable.
    fn is_available(&self) -> Result<bool>;

    fn create_converter(&self) -> Result<Arc<dyn Converter>>;

    /// Static description of the plugin. Never inspects the environment.
    fn metadata(&self) -> PluginMetadata;
}

/// Static plugin description reported by discovery and health endpoints.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PluginMetadata {
    pub name: String,
    pub description: String,
    pub version: String,
    pub author: String,
    pub supported_formats: Vec<ConversionFormat>,
    pub features: Vec<String>,
    pub dependencies: Vec<String>,
    #[serde(default, skip_serializing_if = "serde_json::Value::is_null")]
    pub example_request: serde_json::Value,
}

impl PluginMetadata {
    pub fn new(name: impl Into<String>, description: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            description: description.into(),
            version: "1.0.0".to_string(),
            author: "Kanvert Team".to_string(),
            supported_formats: Vec::new(),
            features: Vec::new(),
            dependencies: Vec::new(),
            example_request: serde_json::Value::Null,
        }
    }

    pub fn formats(mut self, formats: &[ConversionFormat]) -> Self {
        self.supported_formats = formats.to_vec();
        self
    }

    pub fn features(mut self, features: &[&str]) -> Self {
        self.features = features.iter().map(|f| f.to_string()).collect();
        self
    }

    pub fn dependencies(mut self, dependencies: &[&str]) -> Self {
        self.dependencies = dependencies.iter().map(|d| d.to_string()).collect();
        self
    }

    pub fn example(mut self, example_request: serde_json::Value) -> Self {
        self.example_request = example_request;
        self
    }
}
