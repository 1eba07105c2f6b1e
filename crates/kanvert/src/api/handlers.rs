//! API request handlers.

use axum::{
    Json,
    body::Body,
    extract::{Query, State, rejection::JsonRejection},
    http::{HeaderValue, StatusCode, header},
    response::{IntoResponse, Response},
};
use serde_json::json;

use crate::KanvertError;
use crate::converters::{compare, docx, html, markdown, office};
use crate::core::ConfigHealthStatus;
use crate::plugins::FactoryHealthReport;
use crate::types::{ConversionFormat, ConversionRequest, ConversionResult, HealthStatus};

use super::{
    error::ApiError,
    types::{
        ApiState, CompareRequest, ConvertQuery, ConvertersResponse, FormatsResponse, HealthResponse,
        MarkdownToPdfRequest, RootResponse,
    },
};

/// Unwrap a JSON body. Oversized bodies stay 413, every other rejection is a 400.
fn json_body<T>(state: &ApiState, payload: Result<Json<T>, JsonRejection>) -> Result<T, ApiError> {
    payload.map(|Json(body)| body).map_err(|rejection| {
        if rejection.status() == StatusCode::PAYLOAD_TOO_LARGE {
            ApiError::PayloadTooLarge {
                limit: state.context.settings().max_request_size,
            }
        } else {
            ApiError::validation(KanvertError::validation(rejection.body_text()))
        }
    })
}

fn header_value(value: &str) -> Result<HeaderValue, ApiError> {
    HeaderValue::from_str(value)
        .map_err(|e| ApiError::internal(KanvertError::Other(format!("Invalid header value: {}", e))))
}

/// Turn a conversion result into the download response, or a 500 for failed jobs.
fn conversion_response(result: ConversionResult, format: ConversionFormat, attachment: bool) -> Result<Response, ApiError> {
    if !result.is_success() {
        return Err(ApiError::ConversionFailed {
            job_id: result.job_id().to_string(),
            message: result.error_message().unwrap_or("Conversion failed").to_string(),
        });
    }

    let job_id = header_value(result.job_id())?;
    let disposition = header_value(&format!(
        "attachment; filename={}",
        result.output_filename().unwrap_or("output")
    ))?;
    let data = result.into_output().unwrap_or_default();
    let size = data.len();

    let mut response = Response::new(Body::from(data));
    let headers = response.headers_mut();
    headers.insert(header::CONTENT_TYPE, HeaderValue::from_static(format.media_type()));
    if attachment {
        headers.insert(header::CONTENT_DISPOSITION, disposition);
    }
    headers.insert("x-job-id", job_id);
    headers.insert("x-content-size", HeaderValue::from(size));
    Ok(response)
}

async fn run_conversion(
    state: &ApiState,
    request: ConversionRequest,
    converter_name: Option<&str>,
) -> Result<Response, ApiError> {
    let limit = state.context.max_content_size().await;
    if request.content.len() > limit {
        return Err(ApiError::PayloadTooLarge { limit });
    }
    if request.content.trim().is_empty() {
        return Err(ApiError::validation(KanvertError::validation("Content cannot be empty")));
    }

    let format = request.output_format;
    let result = state.context.convert(&request, converter_name).await?;
    conversion_response(result, format, format != ConversionFormat::Comparison)
}

/// GET /
pub async fn root_handler(State(state): State<ApiState>) -> Json<RootResponse> {
    let settings = state.context.settings();
    Json(RootResponse {
        name: settings.app_name.clone(),
        version: settings.app_version.clone(),
        status: "running".to_string(),
        docs: format!("{}/convert/converters", settings.api_prefix),
        health: "/health".to_string(),
        mcp_enabled: settings.mcp_enabled,
    })
}

/// GET /health
pub async fn health_handler() -> Json<HealthResponse> {
    Json(HealthResponse {
        status: "healthy".to_string(),
        version: env!("CARGO_PKG_VERSION").to_string(),
        timestamp: chrono::Utc::now(),
    })
}

/// POST {prefix}/convert/
///
/// Body is a [`ConversionRequest`]; `?converter_name=` pins the converter.
pub async fn convert_handler(
    State(state): State<ApiState>,
    Query(query): Query<ConvertQuery>,
    payload: Result<Json<ConversionRequest>, JsonRejection>,
) -> Result<Response, ApiError> {
    let request = json_body(&state, payload)?;
    run_conversion(&state, request, query.converter_name.as_deref()).await
}

/// POST {prefix}/convert/markdown-to-pdf
pub async fn markdown_to_pdf_handler(
    State(state): State<ApiState>,
    payload: Result<Json<MarkdownToPdfRequest>, JsonRejection>,
) -> Result<Response, ApiError> {
    let body = json_body(&state, payload)?;

    let mut request = ConversionRequest::new(body.content, ConversionFormat::Pdf);
    request.options = body.options;
    if let Some(title) = body.title {
        request.options.insert("title".to_string(), json!(title));
    }
    if let Some(include_toc) = body.include_toc {
        request.options.insert("include_toc".to_string(), json!(include_toc));
    }
    if let Some(custom_css) = body.custom_css {
        request.options.insert("custom_css".to_string(), json!(custom_css));
    }

    run_conversion(&state, request, Some(markdown::NAME)).await
}

/// POST {prefix}/convert/html-to-pdf
pub async fn html_to_pdf_handler(
    State(state): State<ApiState>,
    payload: Result<Json<ConversionRequest>, JsonRejection>,
) -> Result<Response, ApiError> {
    run_conversion(&state, json_body(&state, payload)?, Some(html::NAME)).await
}

/// POST {prefix}/convert/docx-to-pdf
pub async fn docx_to_pdf_handler(
    State(state): State<ApiState>,
    payload: Result<Json<ConversionRequest>, JsonRejection>,
) -> Result<Response, ApiError> {
    run_conversion(&state, json_body(&state, payload)?, Some(docx::NAME)).await
}

/// POST {prefix}/convert/office-to-pdf
pub async fn office_to_pdf_handler(
    State(state): State<ApiState>,
    payload: Result<Json<ConversionRequest>, JsonRejection>,
) -> Result<Response, ApiError> {
    run_conversion(&state, json_body(&state, payload)?, Some(office::NAME)).await
}

/// POST {prefix}/convert/compare
///
/// Responds with the JSON comparison report.
pub async fn compare_handler(
    State(state): State<ApiState>,
    payload: Result<Json<CompareRequest>, JsonRejection>,
) -> Result<Response, ApiError> {
    let body = json_body(&state, payload)?;

    let mut request = ConversionRequest::new(body.document_1, ConversionFormat::Comparison)
        .with_option("document_2", body.document_2);
    if let Some(comparison_type) = body.comparison_type {
        request = request.with_option("comparison_type", comparison_type);
    }

    run_conversion(&state, request, Some(compare::NAME)).await
}

/// GET {prefix}/convert/formats
pub async fn formats_handler(State(state): State<ApiState>) -> Json<FormatsResponse> {
    Json(FormatsResponse {
        supported_formats: state.context.supported_formats().await,
        converters: state.context.list_converters().await,
    })
}

/// GET {prefix}/convert/converters
pub async fn converters_handler(State(state): State<ApiState>) -> Json<ConvertersResponse> {
    let converters = state.context.list_converters().await;
    Json(ConvertersResponse {
        total: converters.len(),
        converters,
    })
}

/// GET {prefix}/convert/health
///
/// 200 when healthy, 207 when degraded, 503 when no converter is healthy.
pub async fn convert_health_handler(State(state): State<ApiState>) -> Response {
    let report = state.context.health_check().await;
    let status = match report.status {
        HealthStatus::Healthy => StatusCode::OK,
        HealthStatus::Degraded => StatusCode::MULTI_STATUS,
        HealthStatus::Unhealthy | HealthStatus::Unknown => StatusCode::SERVICE_UNAVAILABLE,
    };
    (status, Json(report)).into_response()
}

/// GET {prefix}/plugins/health
pub async fn plugins_health_handler(State(state): State<ApiState>) -> Json<FactoryHealthReport> {
    Json(state.context.plugin_health().await)
}

/// GET {prefix}/config/health
pub async fn config_health_handler(State(state): State<ApiState>) -> Json<ConfigHealthStatus> {
    Json(state.context.config_health().await)
}
