//! Request middleware: API key check, per-client rate limiting, security
//! headers and request logging.

use std::collections::{HashMap, VecDeque};
use std::net::SocketAddr;
use std::sync::Arc;
use std::time::{Duration, Instant};

use axum::{
    Router,
    extract::{ConnectInfo, Request, State},
    http::{HeaderName, HeaderValue},
    middleware::Next,
    response::{IntoResponse, Response},
};
use chrono::Utc;
use tokio::sync::Mutex;
use tower_http::set_header::SetResponseHeaderLayer;

use super::error::ApiError;

const API_KEY_HEADER: &str = "x-api-key";

/// Length of the rate limiting window.
pub const RATE_LIMIT_WINDOW: Duration = Duration::from_secs(60);

const SECURITY_HEADERS: [(&str, &str); 5] = [
    ("x-content-type-options", "nosniff"),
    ("x-frame-options", "DENY"),
    ("x-xss-protection", "1; mode=block"),
    ("referrer-policy", "strict-origin-when-cross-origin"),
    ("content-security-policy", "default-src 'self'"),
];

/// Expected value of the `X-API-Key` header.
#[derive(Clone)]
pub struct ApiKey(Arc<str>);

impl ApiKey {
    pub fn new(key: &str) -> Self {
        Self(Arc::from(key))
    }
}

/// Reject requests whose `X-API-Key` header does not match.
pub async fn require_api_key(State(expected): State<ApiKey>, request: Request, next: Next) -> Response {
    let provided = request.headers().get(API_KEY_HEADER).and_then(|value| value.to_str().ok());
    if provided != Some(&*expected.0) {
        return ApiError::Unauthorized.into_response();
    }
    next.run(request).await
}

/// Sliding-window request counter keyed by client address.
#[derive(Debug, Clone)]
pub struct RateLimiter {
    requests: Arc<Mutex<HashMap<String, VecDeque<Instant>>>>,
    limit: u32,
    window: Duration,
}

impl RateLimiter {
    pub fn new(limit: u32) -> Self {
        Self::with_window(limit, RATE_LIMIT_WINDOW)
    }

    pub fn with_window(limit: u32, window: Duration) -> Self {
        Self {
            requests: Arc::new(Mutex::new(HashMap::new())),
            limit,
            window,
        }
    }

    /// Record a request from `client`.
    ///
    /// Returns the requests left in the window, or `None` when the client is
    /// over the limit. Rejected requests are not recorded.
    pub async fn check(&self, client: &str) -> Option<u32> {
        let now = Instant::now();
        let window = self.window;
        let mut requests = self.requests.lock().await;

        requests.retain(|_, times| {
            while times.front().is_some_and(|seen| now.duration_since(*seen) >= window) {
                times.pop_front();
            }
            !times.is_empty()
        });

        let times = requests.entry(client.to_string()).or_default();
        if times.len() >= self.limit as usize {
            return None;
        }
        times.push_back(now);
        Some(self.limit.saturating_sub(times.len() as u32))
    }
}

fn client_key(request: &Request) -> String {
    request
        .extensions()
        .get::<ConnectInfo<SocketAddr>>()
        .map(|ConnectInfo(addr)| addr.ip().to_string())
        .unwrap_or_else(|| "unknown".to_string())
}

/// Enforce the per-client limit and report it in `X-RateLimit-*` headers.
pub async fn rate_limit(State(limiter): State<RateLimiter>, request: Request, next: Next) -> Response {
    let client = client_key(&request);
    let reset = Utc::now().timestamp() + limiter.window.as_secs() as i64;

    let (mut response, remaining) = match limiter.check(&client).await {
        Some(remaining) => (next.run(request).await, remaining),
        None => (ApiError::RateLimited { limit: limiter.limit }.into_response(), 0),
    };

    let headers = response.headers_mut();
    headers.insert(HeaderName::from_static("x-ratelimit-limit"), HeaderValue::from(limiter.limit));
    headers.insert(HeaderName::from_static("x-ratelimit-remaining"), HeaderValue::from(remaining));
    headers.insert(HeaderName::from_static("x-ratelimit-reset"), HeaderValue::from(reset));
    response
}

/// Log every request with its status and duration, and add `X-Process-Time`
/// (seconds).
pub async fn request_logging(request: Request, next: Next) -> Response {
    let method = request.method().clone();
    let path = request.uri().path().to_string();
    let started = Instant::now();

    let mut response = next.run(request).await;

    let elapsed = started.elapsed();
    let status = response.status().as_u16();
    let duration_ms = (elapsed.as_secs_f64() * 100_000.0).round() / 100.0;
    if response.status().is_client_error() || response.status().is_server_error() {
        tracing::warn!(method = %method, path = %path, status, duration_ms, "Request completed with error");
    } else {
        tracing::info!(method = %method, path = %path, status, duration_ms, "Request completed");
    }

    if let Ok(value) = HeaderValue::from_str(&format!("{:.6}", elapsed.as_secs_f64())) {
        response.headers_mut().insert(HeaderName::from_static("x-process-time"), value);
    }
    response
}

/// Set the fixed security headers on every response.
pub fn with_security_headers<S>(mut router: Router<S>) -> Router<S>
where
    S: Clone + Send + Sync + 'static,
{
    for (name, value) in SECURITY_HEADERS {
        router = router.layer(SetResponseHeaderLayer::overriding(
            HeaderName::from_static(name),
            HeaderValue::from_static(value),
        ));
    }
    router
}
