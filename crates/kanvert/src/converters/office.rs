//! Office documents (spreadsheets, presentations, OpenDocument) to PDF via LibreOffice.

use async_trait::async_trait;
use chrono::Utc;
use serde_json::json;

use super::{ContentSource, ConverterSettings, finish, has_content_for, pdf_metadata};
use crate::plugins::Converter;
use crate::render::ScratchDir;
use crate::render::libreoffice::{LibreOfficeJob, convert_to_pdf, is_libreoffice_available};
use crate::types::{ConversionFormat, ConversionRequest, ConversionResult, ConverterCapabilities, Options, generate_job_id};
use crate::{KanvertError, Result};

pub const NAME: &str = "office_to_pdf";

/// Input formats accepted by the converter, without the leading dot.
pub const SUPPORTED_INPUT_FORMATS: [&str; 9] = ["xlsx", "xls", "xlsm", "pptx", "ppt", "pptm", "ods", "odp", "odt"];

/// Write `bytes` as `input.{extension}` into a scratch directory and convert it to PDF.
pub(crate) async fn libreoffice_pdf(
    settings: &ConverterSettings,
    bytes: &[u8],
    extension: &str,
    input_filter: Option<&str>,
) -> Result<Vec<u8>> {
    let scratch = ScratchDir::new(&settings.temp_dir, "office").await?;
    let input = scratch.path().join(format!("input.{}", extension));
    tokio::fs::write(&input, bytes).await?;

    let output_dir = scratch.path().join("out");
    convert_to_pdf(&LibreOfficeJob {
        input: &input,
        output_dir: &output_dir,
        input_filter,
        timeout_secs: settings.timeout_secs,
    })
    .await
}

fn normalize_format(format: &str) -> String {
    format.trim().trim_start_matches('.').to_ascii_lowercase()
}

/// Input format from the `input_format` option, a data URL header, a file
/// suffix, or `xlsx` when nothing else says otherwise.
pub fn detect_input_format(source: &ContentSource, requested: Option<&str>) -> String {
    if let Some(format) = requested.filter(|f| !f.trim().is_empty()) {
        return normalize_format(format);
    }

    match source {
        ContentSource::DataUrl { media_type, .. } => {
            if media_type.contains("presentation") || media_type.contains("powerpoint") {
                return "pptx".to_string();
            }
            if media_type.contains("opendocument.text") {
                return "odt".to_string();
            }
        }
        ContentSource::File(_) => {
            if let Some(ext) = source.extension().filter(|ext| SUPPORTED_INPUT_FORMATS.contains(&ext.as_str())) {
                return ext;
            }
        }
        _ => {}
    }

    "xlsx".to_string()
}

pub struct OfficeToPdfConverter {
    settings: ConverterSettings,
    libreoffice: bool,
}

impl OfficeToPdfConverter {
    pub fn new(settings: ConverterSettings) -> Self {
        Self::with_libreoffice(settings, is_libreoffice_available())
    }

    pub fn with_libreoffice(settings: ConverterSettings, libreoffice: bool) -> Self {
        Self { settings, libreoffice }
    }

    async fn render(&self, request: &ConversionRequest, job_id: &str) -> Result<(Vec<u8>, String, Options)> {
        let source = ContentSource::classify(&request.content)?;
        let input_format = detect_input_format(&source, request.option_str("input_format"));
        if !SUPPORTED_INPUT_FORMATS.contains(&input_format.as_str()) {
            return Err(KanvertError::validation(format!("Unsupported input format '{}'", input_format)));
        }

        let bytes = match &source {
            ContentSource::Inline(_) => {
                return Err(KanvertError::validation(
                    "Invalid Office document content: expected a file path or a base64 data URL",
                ));
            }
            other => other.load_bytes().await?,
        };

        let pdf = libreoffice_pdf(&self.settings, &bytes, &input_format, request.option_str("export_filter")).await?;

        let mut metadata = pdf_metadata(request, pdf.len());
        metadata.insert("input_format".to_string(), json!(input_format));
        metadata.insert("conversion_method".to_string(), json!("libreoffice"));
        Ok((pdf, format!("{}.pdf", job_id), metadata))
    }
}

#[async_trait]
impl Converter for OfficeToPdfConverter {
    fn name(&self) -> &str {
        NAME
    }

    fn supported_formats(&self) -> &[ConversionFormat] {
        &[ConversionFormat::Pdf]
    }

    fn validate_request(&self, request: &ConversionRequest) -> bool {
        if !has_content_for(request, ConversionFormat::Pdf) {
            return false;
        }

        match request.option_str("input_format") {
            Some(format) if !format.trim().is_empty() => {
                SUPPORTED_INPUT_FORMATS.contains(&normalize_format(format).as_str())
            }
            _ => true,
        }
    }

    async fn convert(&self, request: &ConversionRequest) -> Result<ConversionResult> {
        let job_id = generate_job_id("office2pdf");
        let created_at = Utc::now();
        tracing::info!(job_id = %job_id, "Starting Office to PDF conversion");

        let outcome = if !self.validate_request(request) {
            Err(KanvertError::validation("Invalid Office to PDF conversion request"))
        } else if !self.libreoffice {
            Err(KanvertError::MissingDependency(
                "No Office conversion method available: LibreOffice is not installed".to_string(),
            ))
        } else {
            self.render(request, &job_id).await
        };

        Ok(finish(NAME, job_id, created_at, outcome))
    }

    fn capabilities(&self) -> ConverterCapabilities {
        let mut extra = Options::new();
        extra.insert("supported_input_formats".to_string(), json!(SUPPORTED_INPUT_FORMATS));
        let methods: Vec<&str> = if self.libreoffice { vec!["libreoffice"] } else { Vec::new() };
        extra.insert("conversion_methods".to_string(), json!(methods));
        extra.insert("timeout_secs".to_string(), json!(self.settings.timeout_secs));

        ConverterCapabilities {
            name: NAME.to_string(),
            description: "Convert Excel, PowerPoint and OpenDocument files to PDF".to_string(),
            supported_formats: self.supported_formats().to_vec(),
            features: ["Spreadsheets", "Presentations", "OpenDocument formats", "Import filter selection"]
                .map(String::from)
                .to_vec(),
            supported_options: ["input_format", "export_filter"].map(String::from).to_vec(),
            example_request: json!({
                "content": "data:application/vnd.openxmlformats-officedocument.spreadsheetml.sheet;base64,...",
                "output_format": "pdf",
                "options": {"input_format": "xlsx"}
            }),
            extra,
        }
    }

    fn is_initialized(&self) -> bool {
        self.libreoffice
    }

    fn initialization_errors(&self) -> Vec<String> {
        if self.libreoffice {
            Vec::new()
        } else {
            vec!["LibreOffice is not installed".to_string()]
        }
    }
}
