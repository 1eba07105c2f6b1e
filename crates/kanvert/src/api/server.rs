//! API server setup and configuration.

use std::{
    net::{IpAddr, SocketAddr},
    sync::Arc,
};

use axum::{
    Router,
    extract::DefaultBodyLimit,
    http::HeaderValue,
    middleware::{from_fn, from_fn_with_state},
    routing::{get, post},
};
use tower_http::{
    cors::{AllowOrigin, Any, CorsLayer},
    limit::RequestBodyLimitLayer,
    trace::TraceLayer,
};

use crate::core::Settings;
use crate::service::KanvertContext;
use crate::{KanvertError, Result};

use super::{
    handlers::{
        compare_handler, config_health_handler, convert_handler, convert_health_handler, converters_handler,
        docx_to_pdf_handler, formats_handler, health_handler, html_to_pdf_handler, markdown_to_pdf_handler,
        office_to_pdf_handler, plugins_health_handler, root_handler,
    },
    middleware::{ApiKey, RateLimiter, rate_limit, request_logging, require_api_key, with_security_headers},
    types::{ApiSizeLimits, ApiState},
};

/// CORS from the configured origins. `*` (the default) allows any origin.
fn cors_layer(origins: &[String]) -> CorsLayer {
    if origins.is_empty() || origins.iter().any(|origin| origin == "*") {
        tracing::warn!(
            "CORS configured to allow all origins. For production, set KANVERT_CORS_ORIGINS \
             to a comma-separated list of allowed origins"
        );
        return CorsLayer::new().allow_origin(Any).allow_methods(Any).allow_headers(Any);
    }

    let parsed: Vec<HeaderValue> = origins
        .iter()
        .filter_map(|origin| origin.trim().parse::<HeaderValue>().ok())
        .collect();

    if parsed.is_empty() {
        tracing::warn!("No valid CORS origins configured, falling back to permissive CORS");
        return CorsLayer::new().allow_origin(Any).allow_methods(Any).allow_headers(Any);
    }

    tracing::info!("CORS configured with {} explicit allowed origin(s)", parsed.len());
    CorsLayer::new()
        .allow_origin(AllowOrigin::list(parsed))
        .allow_methods(Any)
        .allow_headers(Any)
}

/// Create the API router, sized from the context's settings.
///
/// This is public to allow users to embed the router in their own applications.
///
/// # Examples
///
/// ```no_run
/// use std::sync::Arc;
/// use kanvert::{api::create_router, core::Settings, service::KanvertContext};
///
/// # fn main() -> kanvert::Result<()> {
/// let context = Arc::new(KanvertContext::initialize(Settings::default())?);
/// let router = create_router(context);
/// # Ok(())
/// # }
/// ```
pub fn create_router(context: Arc<KanvertContext>) -> Router {
    let limits = ApiSizeLimits::new(context.settings().max_request_size);
    create_router_with_limits(context, limits)
}

/// Create the API router with an explicit body size limit.
///
/// Layers, outermost first: tracing, request logging, security headers, CORS,
/// rate limiting (when `rate_limit_requests > 0`), API key check (when
/// `api_key` is set), body limits.
pub fn create_router_with_limits(context: Arc<KanvertContext>, limits: ApiSizeLimits) -> Router {
    let settings = context.settings();
    let prefix = settings.api_prefix.trim_end_matches('/').to_string();
    let cors = cors_layer(&settings.cors_origins);
    let api_key = settings.api_key.as_deref().filter(|key| !key.is_empty()).map(ApiKey::new);
    let rate_limit_requests = settings.rate_limit_requests;
    let state = ApiState { context };

    let api = Router::new()
        .route("/convert/", post(convert_handler))
        .route("/convert/markdown-to-pdf", post(markdown_to_pdf_handler))
        .route("/convert/html-to-pdf", post(html_to_pdf_handler))
        .route("/convert/docx-to-pdf", post(docx_to_pdf_handler))
        .route("/convert/office-to-pdf", post(office_to_pdf_handler))
        .route("/convert/compare", post(compare_handler))
        .route("/convert/formats", get(formats_handler))
        .route("/convert/converters", get(converters_handler))
        .route("/convert/health", get(convert_health_handler))
        .route("/plugins/health", get(plugins_health_handler))
        .route("/config/health", get(config_health_handler));

    let router = Router::new()
        .route("/", get(root_handler))
        .route("/health", get(health_handler));
    let router = if prefix.is_empty() {
        router.merge(api)
    } else {
        router.nest(&prefix, api)
    };

    let mut router = router
        .layer(DefaultBodyLimit::max(limits.max_request_body_bytes))
        .layer(RequestBodyLimitLayer::new(limits.max_request_body_bytes));
    if let Some(key) = api_key {
        router = router.layer(from_fn_with_state(key, require_api_key));
    }
    if rate_limit_requests > 0 {
        router = router.layer(from_fn_with_state(RateLimiter::new(rate_limit_requests), rate_limit));
    }

    with_security_headers(router.layer(cors))
        .layer(from_fn(request_logging))
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}

/// Initialize a context from `settings` and serve it until Ctrl-C.
pub async fn serve(settings: Settings) -> Result<()> {
    let context = Arc::new(KanvertContext::initialize(settings)?);
    serve_with_context(context).await
}

/// Serve an existing context on its configured host and port.
///
/// Converters are disposed once the server stops.
pub async fn serve_with_context(context: Arc<KanvertContext>) -> Result<()> {
    let settings = context.settings();
    let ip: IpAddr = settings
        .host
        .parse()
        .map_err(|e| KanvertError::validation(format!("Invalid host address: {}", e)))?;
    let addr = SocketAddr::new(ip, settings.port);

    let app = create_router(Arc::clone(&context));

    tracing::info!("Starting Kanvert API server on http://{}:{}", ip, settings.port);

    let listener = tokio::net::TcpListener::bind(addr).await.map_err(KanvertError::Io)?;

    axum::serve(listener, app.into_make_service_with_connect_info::<SocketAddr>())
        .with_graceful_shutdown(async {
            if let Err(e) = tokio::signal::ctrl_c().await {
                tracing::error!(error = %e, "Failed to listen for shutdown signal");
            }
        })
        .await
        .map_err(|e| KanvertError::Other(e.to_string()))?;

    context.shutdown().await;
    Ok(())
}
