use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

use crate::{KanvertError, Result};

/// Open key/value map used for request options and metadata.
pub type Options = serde_json::Map<String, serde_json::Value>;

// ============================================================================
// Formats and status
// ============================================================================

/// Output format tag.
///
/// Serialized lowercase (`"pdf"`, `"docx"`, ...). Parsing from a string is
/// case-insensitive.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ConversionFormat {
    Pdf,
    Html,
    Docx,
    Markdown,
    Text,
    Xlsx,
    Pptx,
    /// Structured comparison report between two documents.
    Comparison,
}

impl ConversionFormat {
    pub const ALL: [ConversionFormat; 8] = [
        ConversionFormat::Pdf,
        ConversionFormat::Html,
        ConversionFormat::Docx,
        ConversionFormat::Markdown,
        ConversionFormat::Text,
        ConversionFormat::Xlsx,
        ConversionFormat::Pptx,
        ConversionFormat::Comparison,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            ConversionFormat::Pdf => "pdf",
            ConversionFormat::Html => "html",
            ConversionFormat::Docx => "docx",
            ConversionFormat::Markdown => "markdown",
            ConversionFormat::Text => "text",
            ConversionFormat::Xlsx => "xlsx",
            ConversionFormat::Pptx => "pptx",
            ConversionFormat::Comparison => "comparison",
        }
    }

    /// MIME type of the produced payload.
    pub fn media_type(&self) -> &'static str {
        match self {
            ConversionFormat::Pdf => "application/pdf",
            ConversionFormat::Html => "text/html",
            ConversionFormat::Docx => "application/vnd.openxmlformats-officedocument.wordprocessingml.document",
            ConversionFormat::Markdown => "text/markdown",
            ConversionFormat::Text => "text/plain",
            ConversionFormat::Xlsx => "application/vnd.openxmlformats-officedocument.spreadsheetml.sheet",
            ConversionFormat::Pptx => "application/vnd.openxmlformats-officedocument.presentationml.presentation",
            ConversionFormat::Comparison => "application/json",
        }
    }
}

impl fmt::Display for ConversionFormat {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for ConversionFormat {
    type Err = KanvertError;

    fn from_str(s: &str) -> Result<Self> {
        let needle = s.trim().to_ascii_lowercase();
        ConversionFormat::ALL
            .into_iter()
            .find(|format| format.as_str() == needle)
            .ok_or_else(|| KanvertError::validation(format!("Unsupported output format '{}'", s)))
    }
}

/// Lifecycle state of a conversion job.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ConversionStatus {
    Pending,
    Processing,
    Completed,
    Failed,
}

/// Health of a single converter or of the whole registry.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum HealthStatus {
    Healthy,
    Degraded,
    Unhealthy,
    #[default]
    Unknown,
}

impl HealthStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            HealthStatus::Healthy => "healthy",
            HealthStatus::Degraded => "degraded",
            HealthStatus::Unhealthy => "unhealthy",
            HealthStatus::Unknown => "unknown",
        }
    }
}

impl fmt::Display for HealthStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

// ============================================================================
// Requests and results
// ============================================================================

/// A request to convert `content` into `output_format`.
///
/// `content` is interpreted by each converter: raw text or markup, a path to an
/// existing file, a URL, or a base64 `data:` URL.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ConversionRequest {
    pub content: String,
    pub output_format: ConversionFormat,
    #[serde(default)]
    pub options: Options,
    #[serde(default)]
    pub metadata: Options,
}

impl ConversionRequest {
    pub fn new(content: impl Into<String>, output_format: ConversionFormat) -> Self {
        Self {
            content: content.into(),
            output_format,
            options: Options::new(),
            metadata: Options::new(),
        }
    }

    pub fn with_option(mut self, key: impl Into<String>, value: impl Into<serde_json::Value>) -> Self {
        self.options.insert(key.into(), value.into());
        self
    }

    pub fn option_str(&self, key: &str) -> Option<&str> {
        self.options.get(key).and_then(|v| v.as_str())
    }

    pub fn option_bool(&self, key: &str) -> Option<bool> {
        self.options.get(key).and_then(|v| v.as_bool())
    }
}

/// Outcome of a conversion.
///
/// Only [`ConversionResult::completed`] and [`ConversionResult::failed`] build
/// values, so a completed result always carries output and no error, and a
/// failed result always carries an error and no output.
#[derive(Debug, Clone, Serialize)]
pub struct ConversionResult {
    job_id: String,
    status: ConversionStatus,
    #[serde(skip)]
    output_data: Option<Vec<u8>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    output_filename: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    error_message: Option<String>,
    metadata: Options,
    created_at: DateTime<Utc>,
    #[serde(skip_serializing_if = "Option::is_none")]
    completed_at: Option<DateTime<Utc>>,
}

impl ConversionResult {
    pub fn completed(
        job_id: impl Into<String>,
        output_data: Vec<u8>,
        output_filename: impl Into<String>,
        metadata: Options,
        created_at: DateTime<Utc>,
    ) -> Self {
        Self {
            job_id: job_id.into(),
            status: ConversionStatus::Completed,
            output_data: Some(output_data),
            output_filename: Some(output_filename.into()),
            error_message: None,
            metadata,
            created_at,
            completed_at: Some(Utc::now()),
        }
    }

    pub fn failed(job_id: impl Into<String>, error_message: impl Into<String>, created_at: DateTime<Utc>) -> Self {
        Self {
            job_id: job_id.into(),
            status: ConversionStatus::Failed,
            output_data: None,
            output_filename: None,
            error_message: Some(error_message.into()),
            metadata: Options::new(),
            created_at,
            completed_at: Some(Utc::now()),
        }
    }

    pub fn job_id(&self) -> &str {
        &self.job_id
    }

    pub fn status(&self) -> ConversionStatus {
        self.status
    }

    pub fn is_success(&self) -> bool {
        self.status == ConversionStatus::Completed
    }

    pub fn output_data(&self) -> Option<&[u8]> {
        self.output_data.as_deref()
    }

    /// Takes the output bytes, leaving the rest of the result intact.
    pub fn into_output(self) -> Option<Vec<u8>> {
        self.output_data
    }

    pub fn output_filename(&self) -> Option<&str> {
        self.output_filename.as_deref()
    }

    pub fn error_message(&self) -> Option<&str> {
        self.error_message.as_deref()
    }

    pub fn metadata(&self) -> &Options {
        &self.metadata
    }

    pub fn created_at(&self) -> DateTime<Utc> {
        self.created_at
    }

    pub fn completed_at(&self) -> Option<DateTime<Utc>> {
        self.completed_at
    }
}

/// Capability description a converter reports about itself.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ConverterCapabilities {
    pub name: String,
    pub description: String,
    pub supported_formats: Vec<ConversionFormat>,
    #[serde(default)]
    pub features: Vec<String>,
    #[serde(default)]
    pub supported_options: Vec<String>,
    #[serde(default, skip_serializing_if = "serde_json::Value::is_null")]
    pub example_request: serde_json::Value,
    /// Converter-specific entries such as detected engines.
    #[serde(flatten)]
    pub extra: Options,
}

/// Build a job identifier of the form `{prefix}_{YYYYmmdd_HHMMSS}_{suffix}`.
pub fn generate_job_id(prefix: &str) -> String {
    let suffix = uuid::Uuid::new_v4().simple().to_string();
    format!("{}_{}_{}", prefix, Utc::now().format("%Y%m%d_%H%M%S"), &suffix[..8])
}
