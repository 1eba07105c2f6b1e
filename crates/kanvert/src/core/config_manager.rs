//! Scoped runtime configuration.
//!
//! [`ConfigManager`] holds typed key/value entries (`app.*`, `converter.*`,
//! `pdf.*`) with optional validation rules, plus per-converter configuration
//! loaded from a JSON plugin config file:
//!
//! ```json
//! {
//!   "global": {"max_content_size": 1048576, "pdf.page_size": "Letter"},
//!   "converters": {
//!     "markdown_to_pdf": {"enabled": true, "options": {"include_toc": true}}
//!   }
//! }
//! ```
//!
//! Global keys without a dot are taken to live under `app.`.

use indexmap::IndexMap;
use serde::{Deserialize, Serialize};
use serde_json::{Value, json};
use std::path::{Path, PathBuf};

use crate::converters::ConverterSettings;
use crate::core::config::Settings;
use crate::types::Options;
use crate::{KanvertError, Result};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ConfigScope {
    Global,
    Converter,
    User,
    Runtime,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ValueType {
    String,
    Integer,
    Number,
    Boolean,
    Object,
    Array,
}

impl ValueType {
    fn matches(&self, value: &Value) -> bool {
        match self {
            ValueType::String => value.is_string(),
            ValueType::Integer => value.is_i64() || value.is_u64(),
            ValueType::Number => value.is_number(),
            ValueType::Boolean => value.is_boolean(),
            ValueType::Object => value.is_object(),
            ValueType::Array => value.is_array(),
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ValidationRules {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub allowed_values: Option<Vec<Value>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub value_type: Option<ValueType>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub min_value: Option<f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub max_value: Option<f64>,
}

impl ValidationRules {
    pub fn allowed(values: &[&str]) -> Self {
        Self {
            allowed_values: Some(values.iter().map(|v| json!(v)).collect()),
            ..Self::default()
        }
    }

    pub fn range(value_type: ValueType, min_value: Option<f64>, max_value: Option<f64>) -> Self {
        Self {
            value_type: Some(value_type),
            min_value,
            max_value,
            ..Self::default()
        }
    }

    /// Range bounds apply to numeric values only.
    pub fn check(&self, value: &Value) -> bool {
        if let Some(allowed) = &self.allowed_values
            && !allowed.contains(value)
        {
            return false;
        }

        if let Some(value_type) = self.value_type
            && !value_type.matches(value)
        {
            return false;
        }

        if let Some(number) = value.as_f64() {
            if self.min_value.is_some_and(|min| number < min) {
                return false;
            }
            if self.max_value.is_some_and(|max| number > max) {
                return false;
            }
        }

        true
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ConfigEntry {
    pub key: String,
    pub value: Value,
    pub scope: ConfigScope,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    #[serde(default)]
    pub default_value: Value,
    #[serde(default)]
    pub is_required: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub validation_rules: Option<ValidationRules>,
}

impl ConfigEntry {
    pub fn new(key: impl Into<String>, value: impl Into<Value>, scope: ConfigScope) -> Self {
        Self {
            key: key.into(),
            value: value.into(),
            scope,
            description: None,
            default_value: Value::Null,
            is_required: false,
            validation_rules: None,
        }
    }

    pub fn description(mut self, description: &str) -> Self {
        self.description = Some(description.to_string());
        self
    }

    /// Set the default and, for now, the current value.
    pub fn default_value(mut self, value: impl Into<Value>) -> Self {
        self.default_value = value.into();
        self.value = self.default_value.clone();
        self
    }

    pub fn required(mut self) -> Self {
        self.is_required = true;
        self
    }

    pub fn rules(mut self, rules: ValidationRules) -> Self {
        self.validation_rules = Some(rules);
        self
    }

    fn accepts(&self, value: &Value) -> bool {
        self.validation_rules.as_ref().is_none_or(|rules| rules.check(value))
    }
}

fn enabled_by_default() -> bool {
    true
}

/// Configuration for one converter.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ConverterConfig {
    /// Filled from the map key when loaded from a file.
    #[serde(default, skip_serializing)]
    pub name: String,
    #[serde(default = "enabled_by_default")]
    pub enabled: bool,
    #[serde(default)]
    pub options: Options,
    #[serde(default)]
    pub resource_limits: Option<Value>,
    #[serde(default)]
    pub cache_config: Option<Value>,
}

impl ConverterConfig {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            enabled: true,
            options: Options::new(),
            resource_limits: None,
            cache_config: None,
        }
    }
}

#[derive(Debug, Default, Serialize, Deserialize)]
struct ConfigFile {
    #[serde(default)]
    global: IndexMap<String, Value>,
    #[serde(default)]
    converters: IndexMap<String, ConverterConfig>,
}

#[derive(Debug, Clone, Serialize)]
pub struct ConfigHealthStatus {
    /// `"healthy"` or `"invalid"`.
    pub status: String,
    pub total_entries: usize,
    pub converter_configs: usize,
    pub validation_errors: Vec<String>,
    pub loaded_files: Vec<PathBuf>,
}

pub struct ConfigManager {
    entries: IndexMap<String, ConfigEntry>,
    converters: IndexMap<String, ConverterConfig>,
    loaded_files: Vec<PathBuf>,
}

impl Default for ConfigManager {
    fn default() -> Self {
        Self::new(&Settings::default())
    }
}

impl ConfigManager {
    /// Manager seeded with the default entries, using `settings` for the `app.*` values.
    pub fn new(settings: &Settings) -> Self {
        let mut manager = Self {
            entries: IndexMap::new(),
            converters: IndexMap::new(),
            loaded_files: Vec::new(),
        };
        manager.seed_defaults(settings);
        manager
    }

    fn seed_defaults(&mut self, settings: &Settings) {
        let margin = &settings.pdf_margins;
        let defaults = [
            ConfigEntry::new("app.max_content_size", settings.max_content_size, ConfigScope::Global)
                .description("Maximum content size for requests")
                .default_value(settings.max_content_size)
                .required()
                .rules(ValidationRules::range(ValueType::Integer, Some(1.0), None)),
            ConfigEntry::new("app.temp_dir", settings.temp_dir.display().to_string(), ConfigScope::Global)
                .description("Temporary directory for file operations")
                .default_value(settings.temp_dir.display().to_string()),
            ConfigEntry::new("converter.timeout", settings.conversion_timeout, ConfigScope::Converter)
                .description("Default timeout for converter operations (seconds)")
                .default_value(settings.conversion_timeout)
                .rules(ValidationRules::range(ValueType::Integer, Some(1.0), None)),
            ConfigEntry::new("pdf.page_size", "A4", ConfigScope::Converter)
                .description("Default page size for PDF generation")
                .default_value("A4")
                .rules(ValidationRules::allowed(&["A4", "A3", "Letter", "Legal"])),
            ConfigEntry::new("pdf.margins", Value::Null, ConfigScope::Converter)
                .description("Default margins for PDF generation")
                .default_value(json!({"top": margin, "right": margin, "bottom": margin, "left": margin}))
                .rules(ValidationRules {
                    value_type: Some(ValueType::Object),
                    ..ValidationRules::default()
                }),
        ];

        for entry in defaults {
            self.set_config_entry(entry);
        }
    }

    /// Insert or replace an entry. No validation is applied.
    pub fn set_config_entry(&mut self, entry: ConfigEntry) {
        tracing::debug!(key = %entry.key, value = %entry.value, "Set config entry");
        self.entries.insert(entry.key.clone(), entry);
    }

    /// Current value, falling back to the entry's default, then to `default`.
    pub fn get_config_value(&self, key: &str, default: Value) -> Value {
        match self.entries.get(key) {
            Some(entry) if !entry.value.is_null() => entry.value.clone(),
            Some(entry) if !entry.default_value.is_null() => entry.default_value.clone(),
            _ => default,
        }
    }

    /// Returns `false` when the key is unknown or the value breaks the entry's rules.
    pub fn update_config_value(&mut self, key: &str, value: Value) -> bool {
        let Some(entry) = self.entries.get_mut(key) else {
            tracing::warn!(key, "Attempted to update unknown config key");
            return false;
        };

        if !entry.accepts(&value) {
            tracing::error!(key, value = %value, "Rejected invalid config value");
            return false;
        }

        tracing::info!(key, value = %value, "Updated config value");
        entry.value = value;
        true
    }

    pub fn register_converter_config(&mut self, config: ConverterConfig) {
        tracing::info!(converter = %config.name, enabled = config.enabled, "Registered converter config");
        self.converters.insert(config.name.clone(), config);
    }

    pub fn get_converter_config(&self, name: &str) -> Option<&ConverterConfig> {
        self.converters.get(name)
    }

    /// `false` only when a config exists and disables the converter.
    pub fn is_converter_enabled(&self, name: &str) -> bool {
        self.converters.get(name).is_none_or(|config| config.enabled)
    }

    /// `base` with the configured `converter.timeout` and `app.temp_dir` applied.
    pub fn converter_settings(&self, base: ConverterSettings) -> ConverterSettings {
        let timeout_secs = self
            .get_config_value("converter.timeout", Value::Null)
            .as_u64()
            .unwrap_or(base.timeout_secs);
        let temp_dir = match self.get_config_value("app.temp_dir", Value::Null).as_str() {
            Some(dir) if !dir.is_empty() => PathBuf::from(dir),
            _ => base.temp_dir.clone(),
        };
        ConverterSettings {
            timeout_secs,
            temp_dir,
            ..base
        }
    }

    /// Options for `name`. With `merge_global`, `pdf.*` entries are added
    /// under their short names unless the converter sets them itself.
    pub fn get_converter_options(&self, name: &str, merge_global: bool) -> Options {
        let mut options = self
            .converters
            .get(name)
            .map(|config| config.options.clone())
            .unwrap_or_default();

        if merge_global {
            for key in self.entries.keys() {
                let Some(short) = key.strip_prefix("pdf.") else {
                    continue;
                };
                let value = self.get_config_value(key, Value::Null);
                if !options.contains_key(short) && !value.is_null() {
                    options.insert(short.to_string(), value);
                }
            }
        }

        options
    }

    /// Every problem found, as messages. Never fails.
    pub fn validate_all_configs(&self) -> Vec<String> {
        let mut errors = Vec::new();

        for (key, entry) in &self.entries {
            let value = if entry.value.is_null() {
                &entry.default_value
            } else {
                &entry.value
            };

            if value.is_null() {
                if entry.is_required {
                    errors.push(format!("Required config missing: {}", key));
                }
                continue;
            }

            if !entry.accepts(value) {
                errors.push(format!("Invalid config value for {}: {}", key, value));
            }
        }

        errors
    }

    /// Load a JSON plugin config file.
    pub fn load_config_from_file(&mut self, path: impl AsRef<Path>) -> Result<()> {
        let path = path.as_ref();
        let content = std::fs::read_to_string(path).map_err(|e| {
            KanvertError::configuration(format!("Failed to read plugin config {}: {}", path.display(), e))
        })?;
        let file: ConfigFile = serde_json::from_str(&content).map_err(|e| {
            KanvertError::configuration_with_source(format!("Invalid JSON in {}", path.display()), e)
        })?;

        for (key, value) in file.global {
            let key = if key.contains('.') { key } else { format!("app.{}", key) };
            if !self.update_config_value(&key, value) {
                tracing::warn!(key = %key, path = %path.display(), "Ignored global config value");
            }
        }

        for (name, mut config) in file.converters {
            config.name = name;
            self.register_converter_config(config);
        }

        self.loaded_files.push(path.to_path_buf());
        tracing::info!(path = %path.display(), "Loaded plugin configuration");
        Ok(())
    }

    /// Write global entries and converter configs as JSON, creating parent directories.
    pub fn save_config_to_file(&self, path: impl AsRef<Path>) -> Result<()> {
        let path = path.as_ref();

        let mut global = IndexMap::new();
        for (key, entry) in &self.entries {
            if entry.scope == ConfigScope::Global {
                let short = key.strip_prefix("app.").unwrap_or(key);
                global.insert(short.to_string(), entry.value.clone());
            }
        }

        let file = ConfigFile {
            global,
            converters: self.converters.clone(),
        };
        let json = serde_json::to_string_pretty(&file)?;

        if let Some(parent) = path.parent()
            && !parent.as_os_str().is_empty()
        {
            std::fs::create_dir_all(parent)?;
        }
        std::fs::write(path, json)?;

        tracing::info!(path = %path.display(), "Saved configuration");
        Ok(())
    }

    pub fn get_all_config_entries(&self) -> &IndexMap<String, ConfigEntry> {
        &self.entries
    }

    pub fn get_config_by_scope(&self, scope: ConfigScope) -> Vec<&ConfigEntry> {
        self.entries.values().filter(|entry| entry.scope == scope).collect()
    }

    /// Restore every entry that has a default.
    pub fn reset_to_defaults(&mut self) {
        for entry in self.entries.values_mut() {
            if !entry.default_value.is_null() {
                entry.value = entry.default_value.clone();
            }
        }
        tracing::info!("Configuration reset to defaults");
    }

    pub fn get_health_status(&self) -> ConfigHealthStatus {
        let validation_errors = self.validate_all_configs();
        ConfigHealthStatus {
            status: if validation_errors.is_empty() { "healthy" } else { "invalid" }.to_string(),
            total_entries: self.entries.len(),
            converter_configs: self.converters.len(),
            validation_errors,
            loaded_files: self.loaded_files.clone(),
        }
    }
}
