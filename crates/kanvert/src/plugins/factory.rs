//! Converter factory.
//!
//! The factory owns the plugin descriptors discovered from the static built-in
//! list, records which ones are available in the current environment, and
//! lazily builds converters from them. Every per-plugin step runs inside its own
//! failure boundary: a plugin whose probe errors or panics, or whose converter
//! fails to build, is logged and skipped while the rest carry on.

use ahash::AHashMap;
use indexmap::IndexMap;
use serde::Serialize;
use std::panic::{AssertUnwindSafe, catch_unwind};
use std::sync::Arc;

use crate::Result;
use crate::plugins::registry::validate_plugin_name;
use crate::plugins::{Converter, ConverterPlugin, PluginMetadata};

/// Per-plugin entry of [`FactoryHealthReport`].
#[derive(Debug, Clone, Serialize)]
pub struct PluginHealth {
    pub available: bool,
    pub dependencies: Vec<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub metadata: Option<PluginMetadata>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

#[derive(Debug, Clone, Serialize)]
pub struct FactoryHealthReport {
    pub total_plugins: usize,
    pub available_plugins: usize,
    /// `"healthy"` or `"no_plugins_available"`.
    pub status: String,
    pub plugins: IndexMap<String, PluginHealth>,
}

/// Probe a plugin's availability. Errors and panics both mean unavailable.
fn probe_availability(plugin: &dyn ConverterPlugin) -> (bool, Option<String>) {
    match catch_unwind(AssertUnwindSafe(|| plugin.is_available())) {
        Ok(Ok(available)) => (available, None),
        Ok(Err(e)) => (false, Some(e.to_string())),
        Err(_) => (false, Some("Availability check panicked".to_string())),
    }
}

fn build_converter(plugin: &dyn ConverterPlugin) -> Result<Arc<dyn Converter>> {
    catch_unwind(AssertUnwindSafe(|| plugin.create_converter())).unwrap_or_else(|_| {
        Err(crate::KanvertError::Plugin {
            message: "Converter construction panicked".to_string(),
            plugin_name: plugin.name().to_string(),
        })
    })
}

pub struct ConverterFactory {
    builtin: Vec<Arc<dyn ConverterPlugin>>,
    plugins: IndexMap<String, Arc<dyn ConverterPlugin>>,
    availability: AHashMap<String, bool>,
    instances: AHashMap<String, Arc<dyn Converter>>,
    auto_discover: bool,
}

impl ConverterFactory {
    /// Create a factory that discovers from `builtin`.
    pub fn new(builtin: Vec<Arc<dyn ConverterPlugin>>) -> Self {
        Self {
            builtin,
            plugins: IndexMap::new(),
            availability: AHashMap::new(),
            instances: AHashMap::new(),
            auto_discover: true,
        }
    }

    /// When disabled, [`discover_plugins`](Self::discover_plugins) registers nothing
    /// and plugins must be added through [`register_plugin`](Self::register_plugin).
    pub fn with_auto_discover(mut self, auto_discover: bool) -> Self {
        self.auto_discover = auto_discover;
        self
    }

    /// Add a plugin descriptor. An existing plugin with the same name is replaced.
    ///
    /// # Errors
    ///
    /// Returns `Validation` if the plugin name is empty or contains whitespace.
    pub fn register_plugin(&mut self, plugin: Arc<dyn ConverterPlugin>) -> Result<()> {
        let name = plugin.name().to_string();
        validate_plugin_name(&name)?;

        if self.plugins.contains_key(&name) {
            tracing::warn!(plugin = %name, "Plugin already registered, overriding it");
            self.instances.remove(&name);
        }

        let (available, error) = probe_availability(plugin.as_ref());
        match error {
            Some(error) => tracing::warn!(plugin = %name, %error, "Plugin availability check failed"),
            None if !available => tracing::info!(
                plugin = %name,
                dependencies = ?plugin.dependencies(),
                "Plugin unavailable, dependencies missing"
            ),
            None => tracing::debug!(plugin = %name, "Plugin available"),
        }

        self.availability.insert(name.clone(), available);
        self.plugins.insert(name, plugin);
        Ok(())
    }

    /// Register every built-in plugin. Safe to call repeatedly; later passes
    /// overwrite entries with the same name.
    ///
    /// Returns the number of available plugins after discovery.
    pub fn discover_plugins(&mut self) -> usize {
        if !self.auto_discover {
            tracing::info!("Automatic plugin discovery disabled");
            return self.get_available_plugins().len();
        }

        for plugin in self.builtin.clone() {
            if let Err(e) = self.register_plugin(plugin) {
                tracing::warn!(error = %e, "Skipping invalid built-in plugin");
            }
        }

        let available = self.get_available_plugins().len();
        tracing::info!(
            discovered = self.plugins.len(),
            available,
            "Plugin discovery complete"
        );
        available
    }

    /// Build (or reuse) the converter for plugin `name`.
    ///
    /// Returns `None`, with the reason logged, if the plugin is unknown,
    /// unavailable, or fails to construct. `force` bypasses the instance cache.
    pub fn create_converter(&mut self, name: &str, force: bool) -> Option<Arc<dyn Converter>> {
        if !force && let Some(instance) = self.instances.get(name) {
            return Some(Arc::clone(instance));
        }

        let Some(plugin) = self.plugins.get(name).cloned() else {
            tracing::warn!(plugin = %name, "Unknown plugin");
            return None;
        };

        let (available, error) = probe_availability(plugin.as_ref());
        self.availability.insert(name.to_string(), available);
        if !available {
            tracing::warn!(
                plugin = %name,
                error = error.as_deref().unwrap_or("dependencies missing"),
                "Plugin not available, converter not created"
            );
            return None;
        }

        match build_converter(plugin.as_ref()) {
            Ok(converter) => {
                tracing::info!(plugin = %name, "Created converter");
                self.instances.insert(name.to_string(), Arc::clone(&converter));
                Some(converter)
            }
            Err(e) => {
                tracing::error!(plugin = %name, error = %e, "Failed to create converter");
                None
            }
        }
    }

    /// Build every available plugin's converter, skipping any that fail.
    pub fn create_all_available_converters(&mut self) -> IndexMap<String, Arc<dyn Converter>> {
        let mut converters = IndexMap::new();
        for name in self.get_available_plugins() {
            if let Some(converter) = self.create_converter(&name, false) {
                converters.insert(name, converter);
            }
        }
        converters
    }

    /// Names of plugins whose last availability check succeeded, in discovery order.
    pub fn get_available_plugins(&self) -> Vec<String> {
        self.plugins
            .keys()
            .filter(|name| self.availability.get(*name).copied().unwrap_or(false))
            .cloned()
            .collect()
    }

    pub fn list_plugins(&self) -> Vec<String> {
        self.plugins.keys().cloned().collect()
    }

    pub fn is_plugin_available(&self, name: &str) -> bool {
        self.availability.get(name).copied().unwrap_or(false)
    }

    pub fn get_plugin_metadata(&self, name: &str) -> Option<PluginMetadata> {
        self.plugins.get(name).map(|plugin| plugin.metadata())
    }

    pub fn get_all_plugin_metadata(&self) -> IndexMap<String, PluginMetadata> {
        self.plugins
            .iter()
            .map(|(name, plugin)| (name.clone(), plugin.metadata()))
            .collect()
    }

    /// Drop cached converter instances. Converters already handed to a registry
    /// stay alive there.
    pub fn clear_cache(&mut self) {
        self.instances.clear();
    }

    /// Re-check every plugin and report availability and metadata.
    pub fn health_check(&mut self) -> FactoryHealthReport {
        let mut plugins = IndexMap::with_capacity(self.plugins.len());

        for (name, plugin) in &self.plugins {
            let dependencies = plugin.dependencies().iter().map(|d| d.to_string()).collect();
            let (available, probe_error) = probe_availability(plugin.as_ref());
            self.availability.insert(name.clone(), available);

            let entry = match (probe_error, catch_unwind(AssertUnwindSafe(|| plugin.metadata()))) {
                (None, Ok(metadata)) => PluginHealth {
                    available,
                    dependencies,
                    metadata: Some(metadata),
                    error: None,
                },
                (Some(error), _) => PluginHealth {
                    available: false,
                    dependencies,
                    metadata: None,
                    error: Some(error),
                },
                (None, Err(_)) => PluginHealth {
                    available: false,
                    dependencies,
                    metadata: None,
                    error: Some("Metadata lookup panicked".to_string()),
                },
            };
            plugins.insert(name.clone(), entry);
        }

        let available_plugins = plugins.values().filter(|p| p.available).count();
        FactoryHealthReport {
            total_plugins: plugins.len(),
            available_plugins,
            status: if available_plugins > 0 {
                "healthy".to_string()
            } else {
                "no_plugins_available".to_string()
            },
            plugins,
        }
    }
}
