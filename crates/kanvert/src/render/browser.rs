//! HTML to PDF rendering through a browser engine.
//!
//! Two engines are supported:
//!
//! - **Chromium** (`chromium`, `google-chrome`, ...) in headless mode with `--print-to-pdf`
//! - **WeasyPrint** (`weasyprint` CLI)
//!
//! Page geometry is passed as a CSS `@page` rule (see [`PageSetup`]). For inline
//! HTML the rule is injected into the document; for URLs WeasyPrint receives it as
//! an extra stylesheet, while Chromium uses the page's own CSS.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::path::{Path, PathBuf};
use std::str::FromStr;

use super::{BinarySearch, PageSetup, ScratchDir, engine_failure, read_engine_output, run_engine};
use crate::{KanvertError, Result};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum PdfEngine {
    Chromium,
    WeasyPrint,
}

impl PdfEngine {
    /// Engines in preference order.
    pub const ALL: [PdfEngine; 2] = [PdfEngine::Chromium, PdfEngine::WeasyPrint];

    pub fn as_str(&self) -> &'static str {
        match self {
            PdfEngine::Chromium => "chromium",
            PdfEngine::WeasyPrint => "weasyprint",
        }
    }

    fn search(&self) -> BinarySearch<'static> {
        match self {
            PdfEngine::Chromium => BinarySearch {
                env_vars: &["KANVERT_CHROMIUM_PATH", "CHROME_PATH"],
                names: &[
                    "chromium",
                    "chromium-browser",
                    "google-chrome",
                    "google-chrome-stable",
                    "chrome",
                ],
                install_paths: if cfg!(target_os = "macos") {
                    &[
                        "/Applications/Google Chrome.app/Contents/MacOS/Google Chrome",
                        "/Applications/Chromium.app/Contents/MacOS/Chromium",
                    ]
                } else if cfg!(target_os = "windows") {
                    &["C:\\Program Files\\Google\\Chrome\\Application\\chrome.exe"]
                } else {
                    &[]
                },
            },
            PdfEngine::WeasyPrint => BinarySearch {
                env_vars: &["KANVERT_WEASYPRINT_PATH"],
                names: &["weasyprint"],
                install_paths: &[],
            },
        }
    }

    pub fn locate(&self) -> Option<PathBuf> {
        self.search().locate()
    }

    pub fn is_available(&self) -> bool {
        self.locate().is_some()
    }

    /// Installed engines, in preference order.
    pub fn available_engines() -> Vec<PdfEngine> {
        PdfEngine::ALL.into_iter().filter(|engine| engine.is_available()).collect()
    }
}

impl fmt::Display for PdfEngine {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for PdfEngine {
    type Err = KanvertError;

    fn from_str(s: &str) -> Result<Self> {
        match s.trim().to_ascii_lowercase().as_str() {
            "chromium" | "chrome" | "playwright" | "selenium" => Ok(PdfEngine::Chromium),
            "weasyprint" => Ok(PdfEngine::WeasyPrint),
            other => Err(KanvertError::validation(format!("Unknown PDF engine '{}'", other))),
        }
    }
}

/// What to render.
#[derive(Debug, Clone, PartialEq)]
pub enum HtmlSource {
    Markup(String),
    Url(String),
}

/// True for `http://`, `https://`, and `file://` URLs.
pub fn is_url(content: &str) -> bool {
    let trimmed = content.trim_start();
    ["http://", "https://", "file://"]
        .iter()
        .any(|scheme| trimmed.len() > scheme.len() && trimmed[..scheme.len()].eq_ignore_ascii_case(scheme))
}

/// Insert `css` as a `<style>` element, inside `<head>` when there is one.
pub fn inject_style(html: &str, css: &str) -> String {
    let style = format!("<style>{}</style>", css);
    let lower = html.to_ascii_lowercase();

    if let Some(pos) = lower.find("</head>") {
        let mut out = String::with_capacity(html.len() + style.len());
        out.push_str(&html[..pos]);
        out.push_str(&style);
        out.push_str(&html[pos..]);
        out
    } else {
        format!("{}{}", style, html)
    }
}

/// One HTML to PDF rendering.
pub struct RenderJob<'a> {
    pub engine: PdfEngine,
    pub source: &'a HtmlSource,
    pub page: &'a PageSetup,
    pub scratch_base: &'a Path,
    pub timeout_secs: u64,
}

/// Render HTML or a URL to PDF bytes.
pub async fn render_pdf(job: &RenderJob<'_>) -> Result<Vec<u8>> {
    let binary = job.engine.locate().ok_or_else(|| {
        KanvertError::MissingDependency(format!(
            "PDF engine '{}' is not installed or not on PATH",
            job.engine
        ))
    })?;

    let scratch = ScratchDir::new(job.scratch_base, "render").await?;
    let output_path = scratch.path().join("output.pdf");
    let page_css = job.page.to_css()?;

    let target = match job.source {
        HtmlSource::Markup(html) => {
            let input_path = scratch.path().join("input.html");
            tokio::fs::write(&input_path, inject_style(html, &page_css)).await?;
            input_path.to_string_lossy().into_owned()
        }
        HtmlSource::Url(url) => url.clone(),
    };

    let operation = format!("{} rendering", job.engine);
    let args: Vec<String> = match job.engine {
        PdfEngine::Chromium => {
            let target = match job.source {
                HtmlSource::Markup(_) => format!("file://{}", target),
                HtmlSource::Url(_) => target,
            };
            vec![
                "--headless".to_string(),
                "--disable-gpu".to_string(),
                "--no-sandbox".to_string(),
                "--no-pdf-header-footer".to_string(),
                format!("--print-to-pdf={}", output_path.display()),
                target,
            ]
        }
        PdfEngine::WeasyPrint => {
            let mut args = Vec::new();
            if matches!(job.source, HtmlSource::Url(_)) {
                let stylesheet = scratch.path().join("page.css");
                tokio::fs::write(&stylesheet, &page_css).await?;
                args.push("--stylesheet".to_string());
                args.push(stylesheet.to_string_lossy().into_owned());
            }
            args.push(target);
            args.push(output_path.to_string_lossy().into_owned());
            args
        }
    };

    let output = run_engine(&binary, &args, &operation, job.timeout_secs).await?;
    if !output.status.success() {
        return Err(engine_failure(&operation, &output));
    }

    read_engine_output(&output_path, &operation).await
}
