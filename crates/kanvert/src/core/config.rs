//! Service settings.
//!
//! Settings come from three layers, lowest precedence first:
//!
//! 1. Built-in defaults
//! 2. A `kanvert.toml` file, given explicitly or discovered by walking up from
//!    the current directory
//! 3. `KANVERT_*` environment variables
//!
//! Environment values that fail to parse are logged and ignored.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::path::{Path, PathBuf};
use std::str::FromStr;

use crate::converters::ConverterSettings;
use crate::render::{Margins, PageSetup};
use crate::{KanvertError, Result};

pub const CONFIG_FILE_NAME: &str = "kanvert.toml";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Environment {
    #[default]
    Development,
    Testing,
    Staging,
    Production,
}

impl Environment {
    pub fn as_str(&self) -> &'static str {
        match self {
            Environment::Development => "development",
            Environment::Testing => "testing",
            Environment::Staging => "staging",
            Environment::Production => "production",
        }
    }
}

impl fmt::Display for Environment {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Environment {
    type Err = KanvertError;

    fn from_str(s: &str) -> Result<Self> {
        match s.trim().to_ascii_lowercase().as_str() {
            "development" | "dev" => Ok(Environment::Development),
            "testing" | "test" => Ok(Environment::Testing),
            "staging" => Ok(Environment::Staging),
            "production" | "prod" => Ok(Environment::Production),
            other => Err(KanvertError::configuration(format!("Unknown environment '{}'", other))),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum LogFormat {
    #[default]
    Json,
    Text,
}

impl FromStr for LogFormat {
    type Err = KanvertError;

    fn from_str(s: &str) -> Result<Self> {
        match s.trim().to_ascii_lowercase().as_str() {
            "json" => Ok(LogFormat::Json),
            "text" | "pretty" => Ok(LogFormat::Text),
            other => Err(KanvertError::configuration(format!("Unknown log format '{}'", other))),
        }
    }
}

/// Service settings.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Settings {
    pub app_name: String,
    pub app_version: String,
    pub environment: Environment,
    pub debug: bool,

    pub host: String,
    pub port: u16,
    pub api_prefix: String,
    pub cors_origins: Vec<String>,
    /// Largest accepted HTTP request body, in bytes.
    pub max_request_size: usize,
    /// Largest accepted `content` field, in bytes.
    pub max_content_size: usize,
    /// Required `X-API-Key` value. No key check when unset.
    pub api_key: Option<String>,
    /// Requests per client per minute; `0` disables rate limiting.
    pub rate_limit_requests: u32,

    /// Limit for each external engine run, in seconds.
    pub conversion_timeout: u64,
    pub temp_dir: PathBuf,
    pub pdf_page_size: String,
    pub pdf_margins: String,

    pub mcp_enabled: bool,
    pub mcp_server_name: String,

    pub log_level: String,
    pub log_format: LogFormat,

    /// JSON plugin configuration loaded by the configuration manager.
    pub plugin_config: Option<PathBuf>,
    pub auto_discover: bool,
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            app_name: "Kanvert".to_string(),
            app_version: env!("CARGO_PKG_VERSION").to_string(),
            environment: Environment::Development,
            debug: false,
            host: "0.0.0.0".to_string(),
            port: 8000,
            api_prefix: "/api/v1".to_string(),
            cors_origins: vec!["*".to_string()],
            max_request_size: 10 * 1024 * 1024,
            max_content_size: 5 * 1024 * 1024,
            api_key: None,
            rate_limit_requests: 100,
            conversion_timeout: 300,
            temp_dir: std::env::temp_dir().join("kanvert"),
            pdf_page_size: "A4".to_string(),
            pdf_margins: "2cm".to_string(),
            mcp_enabled: true,
            mcp_server_name: "kanvert".to_string(),
            log_level: "info".to_string(),
            log_format: LogFormat::Json,
            plugin_config: None,
            auto_discover: true,
        }
    }
}

fn parse_bool(value: &str) -> Option<bool> {
    match value.trim().to_ascii_lowercase().as_str() {
        "1" | "true" | "yes" | "on" => Some(true),
        "0" | "false" | "no" | "off" => Some(false),
        _ => None,
    }
}

/// Overwrite `target` with the parsed value of `KANVERT_{key}`, if set and valid.
fn env_override<T>(key: &str, target: &mut T, parse: impl FnOnce(&str) -> Option<T>) {
    let var = format!("KANVERT_{}", key);
    let Ok(raw) = std::env::var(&var) else {
        return;
    };

    match parse(&raw) {
        Some(value) => *target = value,
        None => tracing::warn!(variable = %var, value = %raw, "Ignoring invalid environment value"),
    }
}

impl Settings {
    /// Load settings from a TOML file. Missing keys keep their defaults.
    pub fn from_toml_file(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let content = std::fs::read_to_string(path).map_err(|e| {
            KanvertError::configuration(format!("Failed to read config file {}: {}", path.display(), e))
        })?;

        toml::from_str(&content)
            .map_err(|e| KanvertError::configuration(format!("Invalid TOML in {}: {}", path.display(), e)))
    }

    /// Find `kanvert.toml` in the current directory or any parent.
    pub fn discover() -> Result<Option<Self>> {
        let mut current = std::env::current_dir().map_err(KanvertError::Io)?;

        loop {
            let candidate = current.join(CONFIG_FILE_NAME);
            if candidate.is_file() {
                tracing::debug!(path = %candidate.display(), "Discovered settings file");
                return Ok(Some(Self::from_toml_file(candidate)?));
            }

            match current.parent() {
                Some(parent) => current = parent.to_path_buf(),
                None => return Ok(None),
            }
        }
    }

    /// Defaults, then the settings file, then the environment.
    pub fn load(config_file: Option<&Path>) -> Result<Self> {
        let mut settings = match config_file {
            Some(path) => Self::from_toml_file(path)?,
            None => Self::discover()?.unwrap_or_default(),
        };
        settings.apply_env();
        settings.validate()?;
        Ok(settings)
    }

    /// Apply `KANVERT_*` environment overrides.
    pub fn apply_env(&mut self) {
        env_override("APP_NAME", &mut self.app_name, |v| Some(v.to_string()));
        env_override("ENVIRONMENT", &mut self.environment, |v| v.parse().ok());
        env_override("DEBUG", &mut self.debug, parse_bool);
        env_override("HOST", &mut self.host, |v| Some(v.trim().to_string()));
        env_override("PORT", &mut self.port, |v| v.trim().parse().ok());
        env_override("API_PREFIX", &mut self.api_prefix, |v| Some(v.trim().to_string()));
        env_override("CORS_ORIGINS", &mut self.cors_origins, |v| {
            Some(
                v.split(',')
                    .map(|origin| origin.trim().to_string())
                    .filter(|origin| !origin.is_empty())
                    .collect(),
            )
        });
        env_override("MAX_REQUEST_SIZE", &mut self.max_request_size, |v| v.trim().parse().ok());
        env_override("MAX_CONTENT_SIZE", &mut self.max_content_size, |v| v.trim().parse().ok());
        env_override("API_KEY", &mut self.api_key, |v| Some(Some(v.trim().to_string())));
        env_override("RATE_LIMIT_REQUESTS", &mut self.rate_limit_requests, |v| v.trim().parse().ok());
        env_override("CONVERSION_TIMEOUT", &mut self.conversion_timeout, |v| v.trim().parse().ok());
        env_override("TEMP_DIR", &mut self.temp_dir, |v| Some(PathBuf::from(v)));
        env_override("PDF_PAGE_SIZE", &mut self.pdf_page_size, |v| Some(v.trim().to_string()));
        env_override("PDF_MARGINS", &mut self.pdf_margins, |v| Some(v.trim().to_string()));
        env_override("MCP_ENABLED", &mut self.mcp_enabled, parse_bool);
        env_override("MCP_SERVER_NAME", &mut self.mcp_server_name, |v| Some(v.to_string()));
        env_override("LOG_LEVEL", &mut self.log_level, |v| Some(v.trim().to_ascii_lowercase()));
        env_override("LOG_FORMAT", &mut self.log_format, |v| v.parse().ok());
        env_override("PLUGIN_CONFIG", &mut self.plugin_config, |v| Some(Some(PathBuf::from(v))));
        env_override("AUTO_DISCOVER", &mut self.auto_discover, parse_bool);
    }

    pub fn validate(&self) -> Result<()> {
        if !self.api_prefix.starts_with('/') {
            return Err(KanvertError::configuration(format!(
                "api_prefix must start with '/', got '{}'",
                self.api_prefix
            )));
        }
        if self.max_request_size == 0 || self.max_content_size == 0 {
            return Err(KanvertError::configuration("Request and content size limits must be positive"));
        }
        if self.conversion_timeout == 0 {
            return Err(KanvertError::configuration("conversion_timeout must be at least 1 second"));
        }
        crate::render::parse_margin(&self.pdf_margins)?;
        Ok(())
    }

    /// Settings handed to the built-in converters.
    pub fn converter_settings(&self) -> ConverterSettings {
        ConverterSettings {
            timeout_secs: self.conversion_timeout,
            temp_dir: self.temp_dir.clone(),
            page: PageSetup {
                page_size: self.pdf_page_size.clone(),
                margins: Margins::uniform(&self.pdf_margins),
                ..PageSetup::default()
            },
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serial_test::serial;
    use std::fs;
    use tempfile::tempdir;

    #[test]
    fn test_defaults() {
        let settings = Settings::default();
        assert_eq!(settings.port, 8000);
        assert_eq!(settings.api_prefix, "/api/v1");
        assert_eq!(settings.max_content_size, 5 * 1024 * 1024);
        assert_eq!(settings.log_format, LogFormat::Json);
        assert!(settings.auto_discover);
        assert!(settings.validate().is_ok());
    }

    #[test]
    fn test_from_toml_file_keeps_defaults_for_missing_keys() {
        let dir = tempdir().unwrap();
        let path = dir.path().join(CONFIG_FILE_NAME);
        fs::write(
            &path,
            r#"
port = 9000
environment = "production"
cors_origins = ["https://example.com"]
log_format = "text"
"#,
        )
        .unwrap();

        let settings = Settings::from_toml_file(&path).unwrap();
        assert_eq!(settings.port, 9000);
        assert_eq!(settings.environment, Environment::Production);
        assert_eq!(settings.cors_origins, vec!["https://example.com".to_string()]);
        assert_eq!(settings.log_format, LogFormat::Text);
        assert_eq!(settings.host, "0.0.0.0");
    }

    #[test]
    fn test_invalid_toml_is_configuration_error() {
        let dir = tempdir().unwrap();
        let path = dir.path().join(CONFIG_FILE_NAME);
        fs::write(&path, "port = \"not a number\"").unwrap();
        assert!(matches!(
            Settings::from_toml_file(&path),
            Err(KanvertError::Configuration { .. })
        ));
    }

    #[test]
    #[serial]
    fn test_discover_walks_up() {
        let dir = tempdir().unwrap();
        fs::write(dir.path().join(CONFIG_FILE_NAME), "port = 7001").unwrap();
        let nested = dir.path().join("a").join("b");
        fs::create_dir_all(&nested).unwrap();

        let original_dir = std::env::current_dir().unwrap();
        std::env::set_current_dir(&nested).unwrap();

        let result = std::panic::catch_unwind(|| {
            let settings = Settings::discover().unwrap();
            assert_eq!(settings.unwrap().port, 7001);
        });

        std::env::set_current_dir(&original_dir).unwrap();

        if let Err(e) = result {
            std::panic::resume_unwind(e);
        }
    }

    #[test]
    #[serial]
    #[allow(unsafe_code)]
    fn test_env_overrides_and_invalid_values() {
        unsafe {
            std::env::set_var("KANVERT_PORT", "8123");
            std::env::set_var("KANVERT_DEBUG", "yes");
            std::env::set_var("KANVERT_CORS_ORIGINS", "https://a.test, https://b.test");
            std::env::set_var("KANVERT_CONVERSION_TIMEOUT", "soon");
        }

        let mut settings = Settings::default();
        settings.apply_env();

        unsafe {
            std::env::remove_var("KANVERT_PORT");
            std::env::remove_var("KANVERT_DEBUG");
            std::env::remove_var("KANVERT_CORS_ORIGINS");
            std::env::remove_var("KANVERT_CONVERSION_TIMEOUT");
        }

        assert_eq!(settings.port, 8123);
        assert!(settings.debug);
        assert_eq!(settings.cors_origins, vec!["https://a.test", "https://b.test"]);
        assert_eq!(settings.conversion_timeout, 300);
    }

    #[test]
    fn test_validate_rejects_bad_values() {
        let settings = Settings {
            api_prefix: "api".to_string(),
            ..Settings::default()
        };
        assert!(settings.validate().is_err());

        let settings = Settings {
            conversion_timeout: 0,
            ..Settings::default()
        };
        assert!(settings.validate().is_err());
    }

    #[test]
    fn test_converter_settings() {
        let settings = Settings {
            pdf_page_size: "Letter".to_string(),
            conversion_timeout: 42,
            ..Settings::default()
        };
        let converter = settings.converter_settings();
        assert_eq!(converter.timeout_secs, 42);
        assert_eq!(converter.page.page_size, "Letter");
        assert_eq!(converter.page.margins.top, "2cm");
    }
}
