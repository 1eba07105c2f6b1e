//! API request and response types.

use serde::{Deserialize, Serialize};
use std::sync::Arc;

use crate::service::KanvertContext;
use crate::types::{ConversionFormat, ConverterCapabilities, Options};

/// Request body size limit for the router.
///
/// The limit applies to the whole JSON body. The `content` field is checked
/// separately against the configured `max_content_size`.
#[derive(Debug, Clone, Copy)]
pub struct ApiSizeLimits {
    pub max_request_body_bytes: usize,
}

impl Default for ApiSizeLimits {
    fn default() -> Self {
        Self {
            max_request_body_bytes: 10 * 1024 * 1024,
        }
    }
}

impl ApiSizeLimits {
    pub fn new(max_request_body_bytes: usize) -> Self {
        Self { max_request_body_bytes }
    }
}

/// Shared handler state.
#[derive(Clone)]
pub struct ApiState {
    pub context: Arc<KanvertContext>,
}

/// `GET /` response.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RootResponse {
    pub name: String,
    pub version: String,
    pub status: String,
    pub docs: String,
    pub health: String,
    pub mcp_enabled: bool,
}

/// Liveness response.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct HealthResponse {
    pub status: String,
    pub version: String,
    pub timestamp: chrono::DateTime<chrono::Utc>,
}

/// Error response.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ErrorResponse {
    /// Error type name
    pub error_type: String,
    pub message: String,
    /// Job that failed, for conversion failures
    #[serde(skip_serializing_if = "Option::is_none")]
    pub job_id: Option<String>,
    pub status_code: u16,
}

/// `POST {prefix}/convert/markdown-to-pdf` body.
///
/// `title`, `include_toc` and `custom_css` are folded into the conversion
/// options and take precedence over the same keys in `options`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MarkdownToPdfRequest {
    pub content: String,
    #[serde(default)]
    pub title: Option<String>,
    #[serde(default)]
    pub include_toc: Option<bool>,
    #[serde(default)]
    pub custom_css: Option<String>,
    #[serde(default)]
    pub options: Options,
}

/// `POST {prefix}/convert/compare` body.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CompareRequest {
    /// Original document: base64 data URL or file path
    pub document_1: String,
    /// Modified document: base64 data URL or file path
    pub document_2: String,
    /// `content`, `formatting` or `both` (default)
    #[serde(default)]
    pub comparison_type: Option<String>,
}

/// Query string of the generic convert route.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct ConvertQuery {
    pub converter_name: Option<String>,
}

#[derive(Debug, Clone, Serialize)]
pub struct FormatsResponse {
    pub supported_formats: Vec<ConversionFormat>,
    pub converters: Vec<ConverterCapabilities>,
}

#[derive(Debug, Clone, Serialize)]
pub struct ConvertersResponse {
    pub converters: Vec<ConverterCapabilities>,
    pub total: usize,
}
