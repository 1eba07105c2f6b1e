//! Kanvert - document conversion service
//!
//! Kanvert turns Markdown, HTML, Word and Office documents into PDF, and
//! compares DOCX files, through a registry of pluggable converters. The same
//! registry backs an HTTP API (`api` feature) and an MCP server (`mcp` feature).
//!
//! # Quick Start
//!
//! ```rust,no_run
//! use kanvert::{ConversionFormat, ConversionRequest, core::Settings, service::KanvertContext};
//!
//! # async fn example() -> kanvert::Result<()> {
//! let context = KanvertContext::initialize(Settings::load(None)?)?;
//!
//! let request = ConversionRequest::new("# Hello\n\nWorld", ConversionFormat::Pdf)
//!     .with_option("title", "Hello");
//! let result = context.convert(&request, Some("markdown_to_pdf")).await?;
//!
//! if let Some(pdf) = result.output_data() {
//!     std::fs::write("hello.pdf", pdf)?;
//! }
//! # Ok(())
//! # }
//! ```
//!
//! # Architecture
//!
//! - **Plugins** (`plugins`): converter trait, plugin descriptors, factory and registry
//! - **Converters** (`converters`): the built-in Markdown, HTML, DOCX, Office and comparison converters
//! - **Rendering** (`render`): headless Chromium, WeasyPrint and LibreOffice drivers
//! - **Core** (`core`): settings and the scoped configuration manager
//! - **Service** (`service`): the shared context used by the HTTP and MCP front-ends

#![deny(unsafe_code)]

pub mod converters;
pub mod core;
pub mod error;
pub mod plugins;
pub mod render;
pub mod service;
pub mod types;

#[cfg(feature = "api")]
pub mod api;

#[cfg(feature = "mcp")]
pub mod mcp;

pub use error::{KanvertError, Result};
pub use types::*;

pub use crate::core::{ConfigManager, Settings};
pub use plugins::{Converter, ConverterFactory, ConverterPlugin, ConverterRegistry};
pub use service::KanvertContext;
