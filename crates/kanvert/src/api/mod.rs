//! REST API server for Kanvert.
//!
//! Axum router over a shared [`KanvertContext`](crate::service::KanvertContext).
//!
//! # Endpoints
//!
//! Unprefixed:
//!
//! - `GET /` - Service information
//! - `GET /health` - Liveness
//!
//! Under the configured prefix (default `/api/v1`):
//!
//! - `POST /convert/` - Generic conversion (`?converter_name=` pins a converter)
//! - `POST /convert/markdown-to-pdf`, `/convert/html-to-pdf`,
//!   `/convert/docx-to-pdf`, `/convert/office-to-pdf` - Fixed converter
//! - `POST /convert/compare` - DOCX comparison report
//! - `GET /convert/formats`, `/convert/converters` - Capabilities
//! - `GET /convert/health` - Registry health (200, 207 or 503)
//! - `GET /plugins/health`, `/config/health` - Factory and configuration status
//!
//! # cURL Examples
//!
//! ```bash
//! curl -X POST http://localhost:8000/api/v1/convert/markdown-to-pdf \
//!      -H 'Content-Type: application/json' \
//!      -d '{"content": "# Hello", "title": "Hello", "include_toc": true}' \
//!      -o hello.pdf
//!
//! curl -X POST 'http://localhost:8000/api/v1/convert/?converter_name=html_to_pdf' \
//!      -H 'Content-Type: application/json' \
//!      -d '{"content": "https://example.com", "output_format": "pdf"}' \
//!      -o page.pdf
//!
//! curl http://localhost:8000/api/v1/convert/health
//! ```

mod error;
mod handlers;
mod middleware;
mod server;
mod types;

pub use error::ApiError;
pub use middleware::{RATE_LIMIT_WINDOW, RateLimiter};
pub use server::{create_router, create_router_with_limits, serve, serve_with_context};
pub use types::{
    ApiSizeLimits, ApiState, CompareRequest, ConvertersResponse, ErrorResponse, FormatsResponse, HealthResponse,
    MarkdownToPdfRequest, RootResponse,
};
