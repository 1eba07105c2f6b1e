//! DOCX to PDF via LibreOffice.
//!
//! Word documents arrive as a base64 data URL or a file path. Plain text
//! content is written out as a `.txt` file and converted the same way.

use async_trait::async_trait;
use chrono::Utc;
use serde_json::json;

use super::office::libreoffice_pdf;
use super::{ContentSource, ConverterSettings, finish, has_content_for, pdf_metadata};
use crate::plugins::Converter;
use crate::render::libreoffice::is_libreoffice_available;
use crate::types::{ConversionFormat, ConversionRequest, ConversionResult, ConverterCapabilities, Options, generate_job_id};
use crate::{KanvertError, Result};

pub const NAME: &str = "docx_to_pdf";

const ZIP_MAGIC: &[u8] = b"PK\x03\x04";
const OLE_MAGIC: &[u8] = &[0xD0, 0xCF, 0x11, 0xE0];
const RTF_MAGIC: &[u8] = b"{\\rtf";

/// File extension LibreOffice should see for these bytes.
pub fn sniff_extension(bytes: &[u8], hint: Option<&str>) -> &'static str {
    if bytes.starts_with(ZIP_MAGIC) {
        return if hint == Some("odt") { "odt" } else { "docx" };
    }
    if bytes.starts_with(OLE_MAGIC) {
        return "doc";
    }
    if bytes.starts_with(RTF_MAGIC) {
        return "rtf";
    }
    "txt"
}

pub struct DocxToPdfConverter {
    settings: ConverterSettings,
    libreoffice: bool,
}

impl DocxToPdfConverter {
    pub fn new(settings: ConverterSettings) -> Self {
        Self::with_libreoffice(settings, is_libreoffice_available())
    }

    pub fn with_libreoffice(settings: ConverterSettings, libreoffice: bool) -> Self {
        Self { settings, libreoffice }
    }

    async fn render(&self, request: &ConversionRequest, job_id: &str) -> Result<(Vec<u8>, String, Options)> {
        let source = ContentSource::classify(&request.content)?;
        let hint = source.extension();
        let bytes = source.load_bytes().await?;
        let extension = sniff_extension(&bytes, hint.as_deref());
        tracing::debug!(job_id, extension, size = bytes.len(), "Prepared DOCX input");

        let pdf = libreoffice_pdf(&self.settings, &bytes, extension, None).await?;

        let mut metadata = pdf_metadata(request, pdf.len());
        metadata.insert("input_type".to_string(), json!(extension));
        metadata.insert("conversion_method".to_string(), json!("libreoffice"));
        Ok((pdf, format!("{}.pdf", job_id), metadata))
    }
}

#[async_trait]
impl Converter for DocxToPdfConverter {
    fn name(&self) -> &str {
        NAME
    }

    fn supported_formats(&self) -> &[ConversionFormat] {
        &[ConversionFormat::Pdf]
    }

    fn validate_request(&self, request: &ConversionRequest) -> bool {
        has_content_for(request, ConversionFormat::Pdf)
    }

    async fn convert(&self, request: &ConversionRequest) -> Result<ConversionResult> {
        let job_id = generate_job_id("docx2pdf");
        let created_at = Utc::now();
        tracing::info!(job_id = %job_id, "Starting DOCX to PDF conversion");

        let outcome = if !self.validate_request(request) {
            Err(KanvertError::validation("Invalid DOCX to PDF conversion request"))
        } else if !self.libreoffice {
            Err(KanvertError::MissingDependency(
                "No DOCX conversion method available: LibreOffice is not installed".to_string(),
            ))
        } else {
            self.render(request, &job_id).await
        };

        Ok(finish(NAME, job_id, created_at, outcome))
    }

    fn capabilities(&self) -> ConverterCapabilities {
        let mut extra = Options::new();
        let methods: Vec<&str> = if self.libreoffice { vec!["libreoffice"] } else { Vec::new() };
        extra.insert("conversion_methods".to_string(), json!(methods));
        extra.insert("timeout_secs".to_string(), json!(self.settings.timeout_secs));

        ConverterCapabilities {
            name: NAME.to_string(),
            description: "Convert Word documents to PDF with LibreOffice".to_string(),
            supported_formats: self.supported_formats().to_vec(),
            features: ["DOCX, DOC, ODT and RTF input", "Plain text input", "Layout preserved by LibreOffice"]
                .map(String::from)
                .to_vec(),
            supported_options: Vec::new(),
            example_request: json!({
                "content": "data:application/vnd.openxmlformats-officedocument.wordprocessingml.document;base64,...",
                "output_format": "pdf"
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
