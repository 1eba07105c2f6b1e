//! Built-in converters.
//!
//! | Converter | Output | Engine |
//! |-----------|--------|--------|
//! | [`MarkdownToPdfConverter`] | pdf | Chromium / WeasyPrint |
//! | [`HtmlToPdfConverter`] | pdf | Chromium / WeasyPrint |
//! | [`DocxToPdfConverter`] | pdf | LibreOffice |
//! | [`OfficeToPdfConverter`] | pdf | LibreOffice |
//! | [`DocxCompareConverter`] | comparison | built in |
//!
//! Every converter reports its own failures as a failed
//! [`ConversionResult`] rather than an `Err`.

pub mod compare;
pub mod content;
pub mod docx;
pub mod html;
pub mod markdown;
pub mod office;

use chrono::{DateTime, Utc};
use serde_json::Value;
use std::path::PathBuf;

use crate::Result;
use crate::render::PageSetup;
use crate::render::libreoffice::DEFAULT_CONVERSION_TIMEOUT;
use crate::types::{ConversionRequest, ConversionResult, Options};

pub use compare::DocxCompareConverter;
pub use content::ContentSource;
pub use docx::DocxToPdfConverter;
pub use html::HtmlToPdfConverter;
pub use markdown::MarkdownToPdfConverter;
pub use office::OfficeToPdfConverter;

/// Runtime settings shared by the built-in converters.
#[derive(Debug, Clone)]
pub struct ConverterSettings {
    /// Limit for each external engine run, in seconds.
    pub timeout_secs: u64,
    /// Base directory for per-job scratch directories.
    pub temp_dir: PathBuf,
    /// Page setup used when a request does not override it.
    pub page: PageSetup,
}

impl Default for ConverterSettings {
    fn default() -> Self {
        Self {
            timeout_secs: DEFAULT_CONVERSION_TIMEOUT,
            temp_dir: std::env::temp_dir().join("kanvert"),
            page: PageSetup::default(),
        }
    }
}

/// True when the request carries non-blank content for `format`.
pub(crate) fn has_content_for(request: &ConversionRequest, format: crate::types::ConversionFormat) -> bool {
    request.output_format == format && !request.content.trim().is_empty()
}

/// Standard metadata attached to a PDF result.
pub(crate) fn pdf_metadata(request: &ConversionRequest, pdf_size: usize) -> Options {
    let mut metadata = Options::new();
    metadata.insert("original_size".to_string(), Value::from(request.content.len()));
    metadata.insert("pdf_size".to_string(), Value::from(pdf_size));
    metadata.insert("options_used".to_string(), Value::Object(request.options.clone()));
    metadata
}

/// Turn the outcome of a conversion into a result, logging failures.
pub(crate) fn finish(
    converter: &str,
    job_id: String,
    created_at: DateTime<Utc>,
    outcome: Result<(Vec<u8>, String, Options)>,
) -> ConversionResult {
    match outcome {
        Ok((data, filename, metadata)) => {
            tracing::info!(converter, job_id = %job_id, size = data.len(), "Conversion completed");
            ConversionResult::completed(job_id, data, filename, metadata, created_at)
        }
        Err(e) => {
            tracing::error!(converter, job_id = %job_id, error = %e, "Conversion failed");
            ConversionResult::failed(job_id, e.to_string(), created_at)
        }
    }
}
