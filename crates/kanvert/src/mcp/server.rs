//! MCP server implementation for Kanvert.
//!
//! Exposes document conversion as MCP tools for AI assistants. Converted
//! documents are returned base64-encoded inside a JSON payload.

use base64::prelude::*;
use rmcp::{
    ErrorData as McpError, ServerHandler, ServiceExt,
    handler::server::{router::tool::ToolRouter, wrapper::Parameters},
    model::*,
    schemars, tool, tool_handler, tool_router,
    transport::stdio,
};
use serde_json::json;
use std::sync::Arc;

use crate::converters::{compare, markdown};
use crate::core::Settings;
use crate::service::KanvertContext;
use crate::types::{ConversionFormat, ConversionRequest, ConversionResult, Options};
use crate::KanvertError;

/// Parameters for Markdown to PDF conversion.
#[derive(Debug, serde::Deserialize, serde::Serialize, schemars::JsonSchema)]
pub struct ConvertMarkdownParams {
    /// Markdown source text
    pub content: String,
    /// Document title
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub title: Option<String>,
    /// Prepend a table of contents
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub include_toc: Option<bool>,
    /// Extra CSS appended to the default stylesheet
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub custom_css: Option<String>,
}

/// Parameters for a generic conversion.
#[derive(Debug, serde::Deserialize, serde::Serialize, schemars::JsonSchema)]
pub struct ConvertDocumentParams {
    /// Raw text or markup, a file path, a URL, or a base64 data URL
    pub content: String,
    /// Target format, e.g. "pdf"
    pub output_format: String,
    /// Converter-specific options
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub options: Option<Options>,
    /// Use this converter instead of the first one that accepts the request
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub converter_name: Option<String>,
}

/// Parameters for DOCX comparison.
#[derive(Debug, serde::Deserialize, serde::Serialize, schemars::JsonSchema)]
pub struct CompareDocumentsParams {
    /// Original document as a base64 data URL or file path
    pub document_1: String,
    /// Modified document as a base64 data URL or file path
    pub document_2: String,
    /// "content", "formatting" or "both" (default)
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub comparison_type: Option<String>,
}

/// Map a Kanvert error to an MCP error.
///
/// - `Validation` → `INVALID_PARAMS` (-32602)
/// - everything else → `INTERNAL_ERROR` (-32603)
#[doc(hidden)]
pub fn map_kanvert_error_to_mcp(error: KanvertError) -> McpError {
    match error {
        KanvertError::Validation { message, source } => {
            let mut error_message = format!("Validation error: {}", message);
            if let Some(src) = source {
                error_message.push_str(&format!(" (caused by: {})", src));
            }
            McpError::invalid_params(error_message, None)
        }
        other => McpError::internal_error(other.to_string(), None),
    }
}

/// Tool payload for a conversion result.
fn format_conversion_result(result: &ConversionResult) -> CallToolResult {
    match result.output_data() {
        Some(data) => {
            let mut payload = json!({
                "success": true,
                "job_id": result.job_id(),
                "filename": result.output_filename(),
                "size_bytes": data.len(),
                "metadata": result.metadata(),
                "message": format!("Conversion completed ({} bytes)", data.len()),
                "data_base64": BASE64_STANDARD.encode(data),
            });
            if result.output_filename().is_some_and(|name| name.ends_with(".json"))
                && let Ok(report) = serde_json::from_slice::<serde_json::Value>(data)
            {
                payload["report"] = report;
            }
            CallToolResult::success(vec![Content::text(payload.to_string())])
        }
        None => {
            let payload = json!({
                "success": false,
                "error": result.error_message().unwrap_or("Conversion failed"),
                "job_id": result.job_id(),
            });
            CallToolResult::error(vec![Content::text(payload.to_string())])
        }
    }
}

/// Kanvert MCP server.
#[derive(Clone)]
pub struct KanvertMcp {
    tool_router: ToolRouter<KanvertMcp>,
    context: Arc<KanvertContext>,
}

#[tool_router]
impl KanvertMcp {
    /// Create a server over an initialized context.
    pub fn with_context(context: Arc<KanvertContext>) -> Self {
        Self {
            tool_router: Self::tool_router(),
            context,
        }
    }

    async fn run(&self, request: ConversionRequest, converter_name: Option<&str>) -> Result<CallToolResult, McpError> {
        let limit = self.context.max_content_size().await;
        if request.content.len() > limit {
            return Err(McpError::invalid_params(
                format!("Content size exceeds maximum limit of {} bytes", limit),
                None,
            ));
        }

        let result = self
            .context
            .convert(&request, converter_name)
            .await
            .map_err(map_kanvert_error_to_mcp)?;
        Ok(format_conversion_result(&result))
    }

    #[tool(
        description = "Convert Markdown to PDF. Supports tables, footnotes, an optional table of contents and custom CSS. Returns the PDF base64-encoded."
    )]
    async fn convert_markdown_to_pdf(
        &self,
        Parameters(params): Parameters<ConvertMarkdownParams>,
    ) -> Result<CallToolResult, McpError> {
        let mut request = ConversionRequest::new(params.content, ConversionFormat::Pdf);
        if let Some(title) = params.title {
            request = request.with_option("title", title);
        }
        if let Some(include_toc) = params.include_toc {
            request = request.with_option("include_toc", include_toc);
        }
        if let Some(custom_css) = params.custom_css {
            request = request.with_option("custom_css", custom_css);
        }

        self.run(request, Some(markdown::NAME)).await
    }

    #[tool(
        description = "Convert a document to another format. Content may be raw text or markup, a file path, a URL or a base64 data URL."
    )]
    async fn convert_document(
        &self,
        Parameters(params): Parameters<ConvertDocumentParams>,
    ) -> Result<CallToolResult, McpError> {
        let output_format: ConversionFormat = params.output_format.parse().map_err(map_kanvert_error_to_mcp)?;
        let mut request = ConversionRequest::new(params.content, output_format);
        request.options = params.options.unwrap_or_default();

        self.run(request, params.converter_name.as_deref()).await
    }

    #[tool(
        description = "Compare two DOCX documents and report content and formatting differences with a similarity score."
    )]
    async fn compare_documents(
        &self,
        Parameters(params): Parameters<CompareDocumentsParams>,
    ) -> Result<CallToolResult, McpError> {
        let mut request = ConversionRequest::new(params.document_1, ConversionFormat::Comparison)
            .with_option("document_2", params.document_2);
        if let Some(comparison_type) = params.comparison_type {
            request = request.with_option("comparison_type", comparison_type);
        }

        self.run(request, Some(compare::NAME)).await
    }

    #[tool(description = "List supported output formats and the converters that produce them.")]
    async fn list_supported_formats(&self, Parameters(_): Parameters<()>) -> Result<CallToolResult, McpError> {
        let payload = json!({
            "supported_formats": self.context.supported_formats().await,
            "converters": self.context.list_converters().await,
        });
        Ok(CallToolResult::success(vec![Content::text(payload.to_string())]))
    }

    #[tool(description = "Report converter health: healthy, degraded or unhealthy, with per-converter detail.")]
    async fn health_check(&self, Parameters(_): Parameters<()>) -> Result<CallToolResult, McpError> {
        let report = self.context.health_check().await;
        let payload = serde_json::to_string(&report)
            .map_err(|e| map_kanvert_error_to_mcp(KanvertError::from(e)))?;
        Ok(CallToolResult::success(vec![Content::text(payload)]))
    }
}

#[tool_handler]
impl ServerHandler for KanvertMcp {
    fn get_info(&self) -> ServerInfo {
        let settings = self.context.settings();
        ServerInfo {
            protocol_version: ProtocolVersion::default(),
            capabilities: ServerCapabilities {
                tools: Some(ToolsCapability::default()),
                ..Default::default()
            },
            server_info: Implementation {
                name: settings.mcp_server_name.clone(),
                title: Some("Kanvert Document Conversion MCP Server".to_string()),
                version: settings.app_version.clone(),
                icons: None,
                website_url: None,
            },
            instructions: Some(
                "Convert documents to PDF: Markdown, HTML (strings or URLs), Word and Office files. \
                 Binary inputs are passed as base64 data URLs. Results come back as JSON with the \
                 output base64-encoded in data_base64. Use compare_documents to diff two DOCX files."
                    .to_string(),
            ),
        }
    }
}

/// Initialize a context from `settings` and serve MCP over stdio until the client disconnects.
///
/// # Example
///
/// ```rust,no_run
/// use kanvert::{core::Settings, mcp::start_mcp_server};
///
/// #[tokio::main]
/// async fn main() -> Result<(), Box<dyn std::error::Error + Send + Sync>> {
///     start_mcp_server(Settings::load(None)?).await
/// }
/// ```
pub async fn start_mcp_server(settings: Settings) -> Result<(), Box<dyn std::error::Error + Send + Sync>> {
    let context = Arc::new(KanvertContext::initialize(settings)?);
    start_mcp_server_with_context(context).await
}

/// Serve an existing context over stdio. Converters are disposed on exit.
pub async fn start_mcp_server_with_context(
    context: Arc<KanvertContext>,
) -> Result<(), Box<dyn std::error::Error + Send + Sync>> {
    let service = KanvertMcp::with_context(Arc::clone(&context)).serve(stdio()).await?;

    service.waiting().await?;
    context.shutdown().await;
    Ok(())
}
