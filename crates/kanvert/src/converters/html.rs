//! HTML to PDF.

use async_trait::async_trait;
use chrono::Utc;
use serde_json::json;

use super::{ContentSource, ConverterSettings, finish, has_content_for, pdf_metadata};
use crate::plugins::Converter;
use crate::render::browser::{HtmlSource, RenderJob, render_pdf};
use crate::render::{PageSetup, PdfEngine};
use crate::types::{ConversionFormat, ConversionRequest, ConversionResult, ConverterCapabilities, Options, generate_job_id};
use crate::{KanvertError, Result};

pub const NAME: &str = "html_to_pdf";

/// Pick the requested engine, or the first installed one.
pub(crate) fn select_engine(available: &[PdfEngine], requested: Option<&str>) -> Result<PdfEngine> {
    match requested {
        Some(name) => {
            let engine: PdfEngine = name.parse()?;
            if available.contains(&engine) {
                Ok(engine)
            } else {
                Err(KanvertError::MissingDependency(format!(
                    "Requested PDF engine '{}' is not available",
                    engine
                )))
            }
        }
        None => available.first().copied().ok_or_else(|| {
            KanvertError::MissingDependency("No PDF engine available (install Chromium or WeasyPrint)".to_string())
        }),
    }
}

pub struct HtmlToPdfConverter {
    settings: ConverterSettings,
    engines: Vec<PdfEngine>,
}

impl HtmlToPdfConverter {
    pub fn new(settings: ConverterSettings) -> Self {
        Self::with_engines(settings, PdfEngine::available_engines())
    }

    pub fn with_engines(settings: ConverterSettings, engines: Vec<PdfEngine>) -> Self {
        if engines.is_empty() {
            tracing::warn!(converter = NAME, "No PDF engine found; conversions will fail");
        }
        Self { settings, engines }
    }

    async fn render(&self, request: &ConversionRequest, job_id: &str) -> Result<(Vec<u8>, String, Options)> {
        let source = match ContentSource::classify(&request.content)? {
            ContentSource::Url(url) => HtmlSource::Url(url),
            other => HtmlSource::Markup(other.load_text().await?),
        };
        let page = PageSetup::from_options(&request.options, &self.settings.page)?;
        let engine = select_engine(&self.engines, request.option_str("engine"))?;

        let pdf = render_pdf(&RenderJob {
            engine,
            source: &source,
            page: &page,
            scratch_base: &self.settings.temp_dir,
            timeout_secs: self.settings.timeout_secs,
        })
        .await?;

        let mut metadata = pdf_metadata(request, pdf.len());
        metadata.insert("engine".to_string(), json!(engine));
        let source_type = if matches!(source, HtmlSource::Url(_)) { "url" } else { "html" };
        metadata.insert("source_type".to_string(), json!(source_type));
        Ok((pdf, format!("{}.pdf", job_id), metadata))
    }
}

#[async_trait]
impl Converter for HtmlToPdfConverter {
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
        let job_id = generate_job_id("html2pdf");
        let created_at = Utc::now();
        tracing::info!(job_id = %job_id, "Starting HTML to PDF conversion");

        let outcome = if self.validate_request(request) {
            self.render(request, &job_id).await
        } else {
            Err(KanvertError::validation("Invalid HTML to PDF conversion request"))
        };

        Ok(finish(NAME, job_id, created_at, outcome))
    }

    fn capabilities(&self) -> ConverterCapabilities {
        let mut extra = Options::new();
        extra.insert("engines".to_string(), json!(self.engines));
        extra.insert("timeout_secs".to_string(), json!(self.settings.timeout_secs));

        ConverterCapabilities {
            name: NAME.to_string(),
            description: "Convert HTML documents or web pages to PDF".to_string(),
            supported_formats: self.supported_formats().to_vec(),
            features: [
                "HTML strings and URLs",
                "Chromium and WeasyPrint engines",
                "Custom page sizes and margins",
                "Landscape orientation",
                "Background printing",
            ]
            .map(String::from)
            .to_vec(),
            supported_options: [
                "engine",
                "page_size",
                "page_width",
                "page_height",
                "landscape",
                "margins",
                "print_background",
            ]
            .map(String::from)
            .to_vec(),
            example_request: json!({
                "content": "<html><body><h1>Hello World</h1></body></html>",
                "output_format": "pdf",
                "options": {
                    "page_size": "A4",
                    "margins": {"top": "2cm", "bottom": "2cm", "left": "1.5cm", "right": "1.5cm"}
                }
            }),
            extra,
        }
    }

    fn is_initialized(&self) -> bool {
        !self.engines.is_empty()
    }

    fn initialization_errors(&self) -> Vec<String> {
        if self.engines.is_empty() {
            vec!["No PDF engine available (install Chromium or WeasyPrint)".to_string()]
        } else {
            Vec::new()
        }
    }
}
