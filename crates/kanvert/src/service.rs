//! Service context shared by the HTTP and MCP front-ends.
//!
//! [`KanvertContext`] owns the configuration manager, the converter factory and
//! the converter registry. Each sits behind a `tokio::sync::RwLock`; locks are
//! never held across a conversion.

use serde_json::Value;
use std::sync::Arc;
use tokio::sync::RwLock;

use crate::Result;
use crate::core::{ConfigHealthStatus, ConfigManager, Settings};
use crate::plugins::{Converter, ConverterFactory, ConverterRegistry, FactoryHealthReport, RegistryHealthReport};
use crate::types::{ConversionFormat, ConversionRequest, ConversionResult, ConverterCapabilities};

pub struct KanvertContext {
    settings: Settings,
    config: RwLock<ConfigManager>,
    factory: RwLock<ConverterFactory>,
    registry: RwLock<ConverterRegistry>,
}

impl std::fmt::Debug for KanvertContext {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("KanvertContext").field("settings", &self.settings).finish_non_exhaustive()
    }
}

impl KanvertContext {
    /// Load the plugin config, discover the built-in plugins and register every
    /// available, enabled converter.
    ///
    /// # Errors
    ///
    /// Fails only when `settings.plugin_config` names a file that cannot be
    /// loaded. Plugins that are unavailable or fail to build are logged and skipped.
    pub fn initialize(settings: Settings) -> Result<Self> {
        let mut config = ConfigManager::new(&settings);
        if let Some(path) = &settings.plugin_config {
            config.load_config_from_file(path)?;
        }

        let converter_settings = config.converter_settings(settings.converter_settings());
        let mut factory = ConverterFactory::with_builtin_plugins(&converter_settings)
            .with_auto_discover(settings.auto_discover);
        let discovered = factory.discover_plugins();

        let mut registry = ConverterRegistry::new();
        for (name, converter) in factory.create_all_available_converters() {
            if !config.is_converter_enabled(&name) {
                tracing::info!(converter = %name, "Converter disabled by configuration");
                continue;
            }
            if let Err(e) = registry.register_converter(converter) {
                tracing::error!(converter = %name, error = %e, "Failed to register converter");
            }
        }

        tracing::info!(
            discovered,
            registered = registry.len(),
            formats = ?registry.get_supported_formats(),
            "Kanvert initialized"
        );

        Ok(Self::from_parts(settings, config, factory, registry))
    }

    /// Assemble a context from pre-built parts.
    pub fn from_parts(
        settings: Settings,
        config: ConfigManager,
        factory: ConverterFactory,
        registry: ConverterRegistry,
    ) -> Self {
        Self {
            settings,
            config: RwLock::new(config),
            factory: RwLock::new(factory),
            registry: RwLock::new(registry),
        }
    }

    pub fn settings(&self) -> &Settings {
        &self.settings
    }

    pub fn config(&self) -> &RwLock<ConfigManager> {
        &self.config
    }

    pub fn factory(&self) -> &RwLock<ConverterFactory> {
        &self.factory
    }

    pub fn registry(&self) -> &RwLock<ConverterRegistry> {
        &self.registry
    }

    /// Largest accepted `content`, as currently configured.
    pub async fn max_content_size(&self) -> usize {
        let fallback = Value::from(self.settings.max_content_size);
        self.config
            .read()
            .await
            .get_config_value("app.max_content_size", fallback)
            .as_u64()
            .map_or(self.settings.max_content_size, |size| size as usize)
    }

    /// Convert through the registry.
    ///
    /// Configured converter options fill in whatever the request leaves unset;
    /// PDF converters also receive the global `pdf.*` defaults.
    ///
    /// # Errors
    ///
    /// Only lookup failures are errors; a failed conversion is an `Ok` result
    /// with status `failed`.
    pub async fn convert(
        &self,
        request: &ConversionRequest,
        converter_name: Option<&str>,
    ) -> Result<ConversionResult> {
        let converter: Arc<dyn Converter> = self.registry.read().await.select_converter(request, converter_name)?;

        let merge_global = converter.supported_formats().contains(&ConversionFormat::Pdf);
        let configured = self
            .config
            .read()
            .await
            .get_converter_options(converter.name(), merge_global);

        let mut request = request.clone();
        for (key, value) in configured {
            request.options.entry(key).or_insert(value);
        }

        tracing::info!(
            converter = %converter.name(),
            format = %request.output_format,
            "Using converter"
        );
        converter.convert(&request).await
    }

    pub async fn list_converters(&self) -> Vec<ConverterCapabilities> {
        self.registry.read().await.list_converters()
    }

    pub async fn supported_formats(&self) -> Vec<ConversionFormat> {
        self.registry.read().await.get_supported_formats()
    }

    pub async fn health_check(&self) -> RegistryHealthReport {
        self.registry.write().await.health_check()
    }

    pub async fn plugin_health(&self) -> FactoryHealthReport {
        self.factory.write().await.health_check()
    }

    pub async fn config_health(&self) -> ConfigHealthStatus {
        self.config.read().await.get_health_status()
    }

    /// Unregister and dispose every converter.
    pub async fn shutdown(&self) {
        self.registry.write().await.shutdown_all();
        self.factory.write().await.clear_cache();
        tracing::info!("Kanvert shut down");
    }
}
