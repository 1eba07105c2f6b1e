//! Built-in plugin list.
//!
//! Discovery works from this fixed list; there is no filesystem scanning.

use serde_json::json;
use std::sync::Arc;

use crate::Result;
use crate::converters::{
    ConverterSettings, DocxCompareConverter, DocxToPdfConverter, HtmlToPdfConverter, MarkdownToPdfConverter,
    OfficeToPdfConverter, compare, docx, html, markdown, office,
};
use crate::plugins::{Converter, ConverterFactory, ConverterPlugin, PluginMetadata};
use crate::render::PdfEngine;
use crate::render::libreoffice::is_libreoffice_available;
use crate::types::ConversionFormat;

/// Descriptor for one of the converters shipped with Kanvert.
pub struct BuiltinPlugin {
    name: &'static str,
    dependencies: &'static [&'static str],
    available: fn() -> bool,
    build: fn(ConverterSettings) -> Arc<dyn Converter>,
    metadata: fn() -> PluginMetadata,
    settings: ConverterSettings,
}

impl ConverterPlugin for BuiltinPlugin {
    fn name(&self) -> &str {
        self.name
    }

    fn dependencies(&self) -> &[&'static str] {
        self.dependencies
    }

    fn is_available(&self) -> Result<bool> {
        Ok((self.available)())
    }

    fn create_converter(&self) -> Result<Arc<dyn Converter>> {
        Ok((self.build)(self.settings.clone()))
    }

    fn metadata(&self) -> PluginMetadata {
        (self.metadata)()
    }
}

fn any_pdf_engine() -> bool {
    !PdfEngine::available_engines().is_empty()
}

fn always() -> bool {
    true
}

fn markdown_metadata() -> PluginMetadata {
    PluginMetadata::new(markdown::NAME, "Convert Markdown to PDF with print styling")
        .formats(&[ConversionFormat::Pdf])
        .features(&["Tables and footnotes", "Table of contents", "Custom CSS"])
        .dependencies(&["chromium", "weasyprint"])
        .example(json!({
            "content": "# Title\n\nSome **markdown**.",
            "output_format": "pdf",
            "options": {"title": "Title", "include_toc": true}
        }))
}

fn html_metadata() -> PluginMetadata {
    PluginMetadata::new(html::NAME, "Convert HTML documents or web pages to PDF")
        .formats(&[ConversionFormat::Pdf])
        .features(&["HTML strings and URLs", "Page size and margins", "Landscape orientation"])
        .dependencies(&["chromium", "weasyprint"])
        .example(json!({
            "content": "<h1>Hello</h1>",
            "output_format": "pdf",
            "options": {"page_size": "A4"}
        }))
}

fn docx_metadata() -> PluginMetadata {
    PluginMetadata::new(docx::NAME, "Convert Word documents to PDF")
        .formats(&[ConversionFormat::Pdf])
        .features(&["DOCX, DOC, ODT and RTF input", "Plain text input"])
        .dependencies(&["libreoffice"])
}

fn office_metadata() -> PluginMetadata {
    PluginMetadata::new(office::NAME, "Convert Excel, PowerPoint and OpenDocument files to PDF")
        .formats(&[ConversionFormat::Pdf])
        .features(&["Spreadsheets", "Presentations", "OpenDocument formats"])
        .dependencies(&["libreoffice"])
        .example(json!({
            "content": "data:application/vnd.openxmlformats-officedocument.spreadsheetml.sheet;base64,...",
            "output_format": "pdf",
            "options": {"input_format": "xlsx"}
        }))
}

fn compare_metadata() -> PluginMetadata {
    PluginMetadata::new(compare::NAME, "Compare two DOCX documents")
        .formats(&[ConversionFormat::Comparison])
        .features(&["Content differences", "Formatting differences", "Similarity scoring"])
}

fn plugin(
    name: &'static str,
    dependencies: &'static [&'static str],
    available: fn() -> bool,
    build: fn(ConverterSettings) -> Arc<dyn Converter>,
    metadata: fn() -> PluginMetadata,
    settings: &ConverterSettings,
) -> Arc<dyn ConverterPlugin> {
    Arc::new(BuiltinPlugin {
        name,
        dependencies,
        available,
        build,
        metadata,
        settings: settings.clone(),
    })
}

/// Descriptors for every built-in converter, in discovery order.
pub fn builtin_plugins(settings: &ConverterSettings) -> Vec<Arc<dyn ConverterPlugin>> {
    vec![
        plugin(
            markdown::NAME,
            &["chromium", "weasyprint"],
            any_pdf_engine,
            |s| Arc::new(MarkdownToPdfConverter::new(s)),
            markdown_metadata,
            settings,
        ),
        plugin(
            html::NAME,
            &["chromium", "weasyprint"],
            any_pdf_engine,
            |s| Arc::new(HtmlToPdfConverter::new(s)),
            html_metadata,
            settings,
        ),
        plugin(
            docx::NAME,
            &["libreoffice"],
            is_libreoffice_available,
            |s| Arc::new(DocxToPdfConverter::new(s)),
            docx_metadata,
            settings,
        ),
        plugin(
            office::NAME,
            &["libreoffice"],
            is_libreoffice_available,
            |s| Arc::new(OfficeToPdfConverter::new(s)),
            office_metadata,
            settings,
        ),
        plugin(
            compare::NAME,
            &[],
            always,
            |_| Arc::new(DocxCompareConverter::new()),
            compare_metadata,
            settings,
        ),
    ]
}

impl ConverterFactory {
    /// Factory over the built-in plugin list.
    pub fn with_builtin_plugins(settings: &ConverterSettings) -> Self {
        Self::new(builtin_plugins(settings))
    }
}
