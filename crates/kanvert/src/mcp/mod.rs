//! Model Context Protocol (MCP) server implementation.
//!
//! Exposes Kanvert's converters as MCP tools over stdio.
//!
//! # Tools
//!
//! - **convert_markdown_to_pdf**: Markdown to PDF with optional TOC and CSS
//! - **convert_document**: Any registered conversion
//! - **compare_documents**: DOCX comparison report
//! - **list_supported_formats**: Formats and converter capabilities
//! - **health_check**: Registry health
//!
//! # Example
//!
//! ```rust,no_run
//! use kanvert::{core::Settings, mcp::start_mcp_server};
//!
//! #[tokio::main]
//! async fn main() -> Result<(), Box<dyn std::error::Error + Send + Sync>> {
//!     start_mcp_server(Settings::default()).await
//! }
//! ```

mod server;

pub use server::{start_mcp_server, start_mcp_server_with_context};

pub use server::{CompareDocumentsParams, ConvertDocumentParams, ConvertMarkdownParams, KanvertMcp};

// Re-export for testing
#[doc(hidden)]
pub use server::map_kanvert_error_to_mcp;
