//! Markdown to PDF.
//!
//! Markdown is rendered to HTML with pulldown-cmark (tables, footnotes, task
//! lists, strikethrough), wrapped in a print-styled template with an optional
//! table of contents, and printed to PDF by a browser engine.

use async_trait::async_trait;
use chrono::Utc;
use pulldown_cmark::{CowStr, Event, HeadingLevel, Options as MdOptions, Parser, Tag, TagEnd, html};
use serde_json::json;

use super::html::select_engine;
use super::{ContentSource, ConverterSettings, finish, has_content_for, pdf_metadata};
use crate::Result;
use crate::plugins::Converter;
use crate::render::browser::{HtmlSource, RenderJob, render_pdf};
use crate::render::{PageSetup, PdfEngine};
use crate::types::{ConversionFormat, ConversionRequest, ConversionResult, ConverterCapabilities, generate_job_id};

pub const NAME: &str = "markdown_to_pdf";

const DEFAULT_CSS: &str = r#"
body { font-family: 'Times New Roman', serif; font-size: 11pt; line-height: 1.6; color: #333; margin: 0; padding: 0; }
h1, h2, h3, h4, h5, h6 { font-family: 'Arial', sans-serif; color: #2c3e50; margin-top: 1.5em; margin-bottom: 0.5em; page-break-after: avoid; }
h1 { font-size: 24pt; border-bottom: 2px solid #3498db; padding-bottom: 0.3em; }
h2 { font-size: 20pt; color: #34495e; }
h3 { font-size: 16pt; color: #7f8c8d; }
p { margin-bottom: 1em; text-align: justify; }
ul, ol { margin-left: 1.5em; margin-bottom: 1em; }
li { margin-bottom: 0.3em; }
pre { background-color: #f8f9fa; border: 1px solid #e9ecef; border-radius: 4px; padding: 1em; font-family: 'Courier New', monospace; font-size: 9pt; overflow-x: auto; page-break-inside: avoid; }
code { background-color: #f8f9fa; padding: 0.2em 0.4em; border-radius: 3px; font-family: 'Courier New', monospace; font-size: 9pt; }
pre code { padding: 0; }
table { width: 100%; border-collapse: collapse; margin: 1em 0; page-break-inside: avoid; }
th, td { border: 1px solid #ddd; padding: 0.5em; text-align: left; }
th { background-color: #f8f9fa; font-weight: bold; }
blockquote { margin: 1em 0; padding-left: 1em; border-left: 4px solid #3498db; background-color: #f8f9fa; font-style: italic; }
a { color: #3498db; text-decoration: none; }
img { max-width: 100%; height: auto; display: block; margin: 1em auto; }
#toc { background-color: #f8f9fa; border: 1px solid #e9ecef; border-radius: 4px; padding: 1em; margin-bottom: 2em; page-break-after: always; }
#toc h2 { margin-top: 0; color: #2c3e50; }
#toc ul { list-style-type: none; margin-left: 0; }
#toc a { color: #34495e; }
.page-break { page-break-before: always; }
"#;

/// A heading collected for the table of contents.
#[derive(Debug, Clone, PartialEq)]
pub struct TocEntry {
    pub level: u8,
    pub id: String,
    pub text: String,
}

/// Rendered Markdown body plus its headings.
#[derive(Debug, Clone)]
pub struct RenderedMarkdown {
    pub body: String,
    pub toc: Vec<TocEntry>,
}

fn heading_level(level: HeadingLevel) -> u8 {
    match level {
        HeadingLevel::H1 => 1,
        HeadingLevel::H2 => 2,
        HeadingLevel::H3 => 3,
        HeadingLevel::H4 => 4,
        HeadingLevel::H5 => 5,
        HeadingLevel::H6 => 6,
    }
}

/// Anchor id for a heading: lower-case alphanumerics joined by `-`.
pub fn slugify(text: &str) -> String {
    let mut slug = String::with_capacity(text.len());
    let mut pending_dash = false;

    for c in text.chars() {
        if c.is_alphanumeric() {
            if pending_dash && !slug.is_empty() {
                slug.push('-');
            }
            pending_dash = false;
            slug.extend(c.to_lowercase());
        } else if c.is_whitespace() || c == '-' || c == '_' {
            pending_dash = true;
        }
    }

    if slug.is_empty() { "section".to_string() } else { slug }
}

/// Render Markdown to an HTML fragment, giving every heading an anchor id.
pub fn render_markdown(markdown: &str) -> RenderedMarkdown {
    let mut options = MdOptions::empty();
    options.insert(MdOptions::ENABLE_TABLES);
    options.insert(MdOptions::ENABLE_FOOTNOTES);
    options.insert(MdOptions::ENABLE_STRIKETHROUGH);
    options.insert(MdOptions::ENABLE_TASKLISTS);
    options.insert(MdOptions::ENABLE_HEADING_ATTRIBUTES);

    let mut events: Vec<Event<'_>> = Parser::new_ext(markdown, options).collect();
    let mut toc = Vec::new();
    let mut used_ids = ahash::AHashSet::new();

    let mut i = 0;
    while i < events.len() {
        let Event::Start(Tag::Heading { level, id, .. }) = &events[i] else {
            i += 1;
            continue;
        };
        let level = heading_level(*level);
        let explicit_id = id.as_ref().map(|id| id.to_string());

        let mut text = String::new();
        let mut end = i + 1;
        while end < events.len() {
            match &events[end] {
                Event::End(TagEnd::Heading(_)) => break,
                Event::Text(t) | Event::Code(t) => text.push_str(t),
                _ => {}
            }
            end += 1;
        }

        let base = explicit_id.unwrap_or_else(|| slugify(&text));
        let mut anchor = base.clone();
        let mut suffix = 1;
        while !used_ids.insert(anchor.clone()) {
            anchor = format!("{}-{}", base, suffix);
            suffix += 1;
        }

        if let Event::Start(Tag::Heading { id, .. }) = &mut events[i] {
            *id = Some(CowStr::from(anchor.clone()));
        }

        toc.push(TocEntry {
            level,
            id: anchor,
            text: text.trim().to_string(),
        });
        i = end;
    }

    let mut body = String::with_capacity(markdown.len() * 3 / 2);
    html::push_html(&mut body, events.into_iter());

    RenderedMarkdown { body, toc }
}

fn toc_html(entries: &[TocEntry]) -> String {
    if entries.is_empty() {
        return String::new();
    }

    let mut out = String::from("<div id=\"toc\"><h2>Table of Contents</h2><ul>");
    for entry in entries {
        out.push_str(&format!(
            "<li class=\"toc-h{}\" style=\"margin-left: {}em\"><a href=\"#{}\">{}</a></li>",
            entry.level,
            (entry.level.saturating_sub(1)) as f32 * 1.2,
            html_escape::encode_double_quoted_attribute(&entry.id),
            html_escape::encode_text(&entry.text)
        ));
    }
    out.push_str("</ul></div>");
    out
}

/// Wrap a rendered body in the print template.
pub fn build_document(rendered: &RenderedMarkdown, title: &str, include_toc: bool, custom_css: &str) -> String {
    let toc = if include_toc { toc_html(&rendered.toc) } else { String::new() };

    format!(
        r#"<!DOCTYPE html>
<html lang="en">
<head>
<meta charset="UTF-8">
<meta name="viewport" content="width=device-width, initial-scale=1.0">
<title>{title}</title>
<style>{default_css}</style>
<style>{custom_css}</style>
</head>
<body>
{toc}
<div class="content">
{body}
</div>
</body>
</html>"#,
        title = html_escape::encode_text(title),
        default_css = DEFAULT_CSS,
        custom_css = custom_css,
        toc = toc,
        body = rendered.body,
    )
}

pub struct MarkdownToPdfConverter {
    settings: ConverterSettings,
    engines: Vec<PdfEngine>,
}

impl MarkdownToPdfConverter {
    pub fn new(settings: ConverterSettings) -> Self {
        Self::with_engines(settings, PdfEngine::available_engines())
    }

    pub fn with_engines(settings: ConverterSettings, engines: Vec<PdfEngine>) -> Self {
        if engines.is_empty() {
            tracing::warn!(converter = NAME, "No PDF engine found; conversions will fail");
        }
        Self { settings, engines }
    }

    async fn render(&self, request: &ConversionRequest, job_id: &str) -> Result<(Vec<u8>, String, crate::types::Options)> {
        let markdown = ContentSource::classify(&request.content)?.load_text().await?;
        let page = PageSetup::from_options(&request.options, &self.settings.page)?;
        let engine = select_engine(&self.engines, request.option_str("engine"))?;

        let rendered = render_markdown(&markdown);
        let document = build_document(
            &rendered,
            request.option_str("title").unwrap_or("Document"),
            request.option_bool("include_toc").unwrap_or(false),
            request.option_str("custom_css").unwrap_or(""),
        );
        tracing::debug!(job_id, engine = %engine, html_len = document.len(), "Rendered markdown to HTML");

        let source = HtmlSource::Markup(document);
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
        metadata.insert("headings".to_string(), json!(rendered.toc.len()));
        Ok((pdf, format!("{}.pdf", job_id), metadata))
    }
}

#[async_trait]
impl Converter for MarkdownToPdfConverter {
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
        let job_id = generate_job_id("md2pdf");
        let created_at = Utc::now();
        tracing::info!(job_id = %job_id, "Starting markdown to PDF conversion");

        let outcome = if self.validate_request(request) {
            self.render(request, &job_id).await
        } else {
            Err(crate::KanvertError::validation("Invalid markdown to PDF conversion request"))
        };

        Ok(finish(NAME, job_id, created_at, outcome))
    }

    fn capabilities(&self) -> ConverterCapabilities {
        let mut extra = crate::types::Options::new();
        extra.insert("engines".to_string(), json!(self.engines));
        extra.insert("timeout_secs".to_string(), json!(self.settings.timeout_secs));

        ConverterCapabilities {
            name: NAME.to_string(),
            description: "Convert Markdown to PDF with print styling".to_string(),
            supported_formats: self.supported_formats().to_vec(),
            features: [
                "Tables, footnotes and task lists",
                "Table of contents generation",
                "Custom CSS styling",
                "Page size, orientation and margins",
            ]
            .map(String::from)
            .to_vec(),
            supported_options: ["title", "include_toc", "custom_css", "engine", "page_size", "landscape", "margins"]
                .map(String::from)
                .to_vec(),
            example_request: json!({
                "content": "# My Document\n\nThis is **markdown** content.",
                "output_format": "pdf",
                "options": {"title": "My Document", "include_toc": true}
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

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::ConversionStatus;

    #[test]
    fn test_slugify() {
        assert_eq!(slugify("Getting Started"), "getting-started");
        assert_eq!(slugify("  API: v2 / Usage  "), "api-v2-usage");
        assert_eq!(slugify("!!!"), "section");
    }

    #[test]
    fn test_render_markdown_collects_headings_with_unique_ids() {
        let rendered = render_markdown("# Intro\n\ntext\n\n## Intro\n\n### Custom {#mine}\n\n| a | b |\n|---|---|\n| 1 | 2 |\n");
        let ids: Vec<&str> = rendered.toc.iter().map(|e| e.id.as_str()).collect();
        assert_eq!(ids, ["intro", "intro-1", "mine"]);
        assert_eq!(rendered.toc[1].level, 2);
        assert!(rendered.body.contains("<h1 id=\"intro\">Intro</h1>"));
        assert!(rendered.body.contains("<table>"));
    }

    #[test]
    fn test_build_document_with_toc() {
        let rendered = render_markdown("# A & B\n\n## Next");
        let doc = build_document(&rendered, "Report <1>", true, "body { color: red; }");
        assert!(doc.contains("<title>Report &lt;1&gt;</title>"));
        assert!(doc.contains("<div id=\"toc\">"));
        assert!(doc.contains("href=\"#a-b\""));
        assert!(doc.contains("body { color: red; }"));

        let without = build_document(&rendered, "Report", false, "");
        assert!(!without.contains("<div id=\"toc\">"));
    }

    #[tokio::test]
    async fn test_convert_without_engine_fails_gracefully() {
        let converter = MarkdownToPdfConverter::with_engines(ConverterSettings::default(), Vec::new());
        assert!(!converter.is_initialized());
        assert_eq!(converter.initialization_errors().len(), 1);

        let request = ConversionRequest::new("# Title", ConversionFormat::Pdf);
        let result = converter.convert(&request).await.unwrap();
        assert_eq!(result.status(), ConversionStatus::Failed);
        assert!(result.job_id().starts_with("md2pdf_"));
        assert!(result.error_message().unwrap().contains("No PDF engine"));
    }

    #[tokio::test]
    async fn test_convert_rejects_blank_content() {
        let converter = MarkdownToPdfConverter::with_engines(ConverterSettings::default(), vec![PdfEngine::Chromium]);
        let request = ConversionRequest::new("   ", ConversionFormat::Pdf);
        assert!(!converter.validate_request(&request));
        let result = converter.convert(&request).await.unwrap();
        assert!(result.error_message().unwrap().contains("Invalid markdown"));
    }
}
