//! LibreOffice headless conversion.
//!
//! Converts DOCX, spreadsheets, presentations, and OpenDocument files to PDF
//! with `soffice --headless --convert-to pdf`.
//!
//! # System Requirement
//!
//! LibreOffice must be installed and `soffice` (or `libreoffice`) must be
//! discoverable:
//! - **macOS**: `brew install --cask libreoffice`
//! - **Linux**: `apt install libreoffice` or `dnf install libreoffice`
//! - **Windows**: `winget install LibreOffice.LibreOffice`
//!
//! A custom install location can be given with `KANVERT_LIBREOFFICE_PATH`.
//!
//! # Example
//!
//! ```rust,no_run
//! use kanvert::render::libreoffice::{LibreOfficeJob, convert_to_pdf};
//! use std::path::Path;
//!
//! # async fn example() -> kanvert::Result<()> {
//! let job = LibreOfficeJob {
//!     input: Path::new("/tmp/report.docx"),
//!     output_dir: Path::new("/tmp/out"),
//!     input_filter: None,
//!     timeout_secs: 300,
//! };
//! let pdf = convert_to_pdf(&job).await?;
//! println!("Converted {} bytes", pdf.len());
//! # Ok(())
//! # }
//! ```

use std::path::{Path, PathBuf};

use super::{BinarySearch, engine_failure, read_engine_output, run_engine};
use crate::{KanvertError, Result};

/// Default timeout for LibreOffice conversion (300 seconds)
pub const DEFAULT_CONVERSION_TIMEOUT: u64 = 300;

const OPERATION: &str = "LibreOffice conversion";

fn libreoffice_install_message() -> String {
    "LibreOffice (soffice/libreoffice) is required for DOCX and Office conversion. \
Install: macOS: 'brew install --cask libreoffice', \
Linux: 'apt install libreoffice', \
Windows: 'winget install LibreOffice.LibreOffice'. \
If LibreOffice is installed in a custom location, set the KANVERT_LIBREOFFICE_PATH environment variable to the soffice executable."
        .to_string()
}

fn soffice_search() -> BinarySearch<'static> {
    const INSTALL_PATHS: &[&str] = if cfg!(target_os = "macos") {
        &[
            "/Applications/LibreOffice.app/Contents/MacOS/soffice",
            "/Applications/LibreOffice.app/Contents/MacOS/libreoffice",
        ]
    } else if cfg!(target_os = "windows") {
        &[
            "C:\\Program Files\\LibreOffice\\program\\soffice.exe",
            "C:\\Program Files\\LibreOffice\\program\\libreoffice.exe",
        ]
    } else {
        &[]
    };

    BinarySearch {
        env_vars: &["KANVERT_LIBREOFFICE_PATH", "SOFFICE_PATH", "LIBREOFFICE_PATH"],
        names: &["soffice", "libreoffice"],
        install_paths: INSTALL_PATHS,
    }
}

/// Path of the LibreOffice executable, if one is installed.
pub fn locate_soffice_binary() -> Result<PathBuf> {
    soffice_search()
        .locate()
        .ok_or_else(|| KanvertError::MissingDependency(libreoffice_install_message()))
}

/// Cheap availability probe: the executable exists. Does not run it.
pub fn is_libreoffice_available() -> bool {
    soffice_search().locate().is_some()
}

/// One LibreOffice PDF conversion.
#[derive(Debug, Clone)]
pub struct LibreOfficeJob<'a> {
    pub input: &'a Path,
    pub output_dir: &'a Path,
    /// Import filter passed as `--infilter` (e.g. `"Calc MS Excel 2007 XML"`).
    pub input_filter: Option<&'a str>,
    pub timeout_secs: u64,
}

/// Convert `job.input` to PDF and return the PDF bytes.
pub async fn convert_to_pdf(job: &LibreOfficeJob<'_>) -> Result<Vec<u8>> {
    let soffice_path = locate_soffice_binary()?;
    tokio::fs::create_dir_all(job.output_dir).await?;

    let mut args: Vec<std::ffi::OsString> = vec!["--headless".into(), "--convert-to".into(), "pdf".into()];
    if let Some(filter) = job.input_filter {
        args.push(format!("--infilter={}", filter).into());
    }
    args.push("--outdir".into());
    args.push(job.output_dir.as_os_str().to_owned());
    args.push(job.input.as_os_str().to_owned());

    let output = run_engine(&soffice_path, &args, OPERATION, job.timeout_secs).await?;
    if !output.status.success() {
        return Err(engine_failure(OPERATION, &output));
    }

    let input_stem = job
        .input
        .file_stem()
        .ok_or_else(|| KanvertError::processing("Invalid input file name"))?;
    let expected_output = job.output_dir.join(format!("{}.pdf", input_stem.to_string_lossy()));

    read_engine_output(&expected_output, OPERATION).await
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_availability_agrees_with_locate() {
        assert_eq!(is_libreoffice_available(), locate_soffice_binary().is_ok());
    }

    #[test]
    fn test_install_message_mentions_env_var() {
        assert!(libreoffice_install_message().contains("KANVERT_LIBREOFFICE_PATH"));
    }

    #[tokio::test]
    async fn test_convert_missing_input_fails() {
        if !is_libreoffice_available() {
            return;
        }
        let dir = tempfile::tempdir().unwrap();
        let job = LibreOfficeJob {
            input: &dir.path().join("does-not-exist.docx"),
            output_dir: dir.path(),
            input_filter: None,
            timeout_secs: 60,
        };
        assert!(convert_to_pdf(&job).await.is_err());
    }
}
