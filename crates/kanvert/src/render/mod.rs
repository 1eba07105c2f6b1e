//! External rendering engines.
//!
//! Kanvert does not render documents itself. PDF output is produced by
//! external programs run as child processes:
//!
//! - [`libreoffice`] - `soffice --headless --convert-to pdf` for DOCX and Office input
//! - [`browser`] - Chromium `--print-to-pdf` or WeasyPrint for HTML input
//!
//! Engine binaries are located once per probe from well-known environment
//! variables, platform install locations and `PATH`.

pub mod browser;
pub mod libreoffice;
pub mod page;

use std::collections::HashSet;
use std::env;
use std::ffi::OsStr;
use std::path::{Path, PathBuf};
use std::process::{Output, Stdio};
use tokio::process::Command;
use tokio::time::{Duration, timeout};

use crate::{KanvertError, Result};

pub use browser::{HtmlSource, PdfEngine};
pub use page::{Margins, PageSetup, parse_margin};

/// Where to look for an engine binary.
pub(crate) struct BinarySearch<'a> {
    /// Environment variables holding an explicit executable path.
    pub env_vars: &'a [&'a str],
    /// Executable names searched on `PATH` (and Homebrew's prefix).
    pub names: &'a [&'a str],
    /// Fixed install locations checked before `PATH`.
    pub install_paths: &'a [&'a str],
}

impl BinarySearch<'_> {
    fn candidates(&self) -> Vec<PathBuf> {
        let mut seen = HashSet::new();
        let mut candidates = Vec::new();

        let mut push_candidate = |path: PathBuf| {
            if seen.insert(path.clone()) {
                candidates.push(path);
            }
        };

        for var in self.env_vars {
            if let Some(value) = env::var_os(var).filter(|v| !v.is_empty()) {
                push_candidate(PathBuf::from(value));
            }
        }

        for path in self.install_paths {
            push_candidate(PathBuf::from(path));
        }

        if let Some(prefix) = env::var_os("HOMEBREW_PREFIX") {
            let prefix_path = PathBuf::from(prefix);
            for name in self.names {
                push_candidate(prefix_path.join("bin").join(name));
            }
        }

        if let Some(path_env) = env::var_os("PATH") {
            for dir in env::split_paths(&path_env) {
                for name in self.names {
                    push_candidate(dir.join(name));
                    if cfg!(target_os = "windows") {
                        push_candidate(dir.join(format!("{}.exe", name)));
                    }
                }
            }
        }

        candidates
    }

    /// First candidate that exists as a regular file.
    pub fn locate(&self) -> Option<PathBuf> {
        self.candidates().into_iter().find(|candidate| candidate.is_file())
    }
}

/// Per-conversion scratch directory, removed on drop.
pub(crate) struct ScratchDir {
    path: PathBuf,
}

impl ScratchDir {
    /// Create `{base}/{prefix}_{uuid}`.
    pub async fn new(base: &Path, prefix: &str) -> Result<Self> {
        let path = base.join(format!("{}_{}", prefix, uuid::Uuid::new_v4().simple()));
        tokio::fs::create_dir_all(&path).await?;
        Ok(Self { path })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }
}

impl Drop for ScratchDir {
    fn drop(&mut self) {
        if let Err(e) = std::fs::remove_dir_all(&self.path) {
            tracing::debug!(path = %self.path.display(), error = %e, "Failed to remove scratch directory");
        }
    }
}

/// Run an engine process to completion, killing it if `timeout_secs` elapses.
pub(crate) async fn run_engine<I, S>(program: &Path, args: I, operation: &str, timeout_secs: u64) -> Result<Output>
where
    I: IntoIterator<Item = S>,
    S: AsRef<OsStr>,
{
    let child = Command::new(program)
        .args(args)
        .stdin(Stdio::null())
        .stdout(Stdio::piped())
        .stderr(Stdio::piped())
        .kill_on_drop(true)
        .spawn()
        .map_err(|e| KanvertError::processing(format!("Failed to execute '{}': {}", program.display(), e)))?;

    let child_id = child.id();
    tracing::debug!(program = %program.display(), pid = ?child_id, operation, "Spawned engine process");

    match timeout(Duration::from_secs(timeout_secs), child.wait_with_output()).await {
        Ok(Ok(output)) => Ok(output),
        Ok(Err(e)) => Err(KanvertError::processing(format!("Failed to wait for {}: {}", operation, e))),
        Err(_) => Err(KanvertError::Timeout {
            operation: operation.to_string(),
            seconds: timeout_secs,
        }),
    }
}

/// Turn a failed engine run into a processing error carrying its output.
pub(crate) fn engine_failure(operation: &str, output: &Output) -> KanvertError {
    let stderr = String::from_utf8_lossy(&output.stderr);
    let stdout = String::from_utf8_lossy(&output.stdout);
    let detail = if !stderr.trim().is_empty() { stderr } else { stdout };
    KanvertError::processing(format!(
        "{} failed with return code {}: {}",
        operation,
        output.status.code().unwrap_or(-1),
        detail.trim()
    ))
}

/// Read an engine's output file, rejecting missing or empty output.
pub(crate) async fn read_engine_output(path: &Path, operation: &str) -> Result<Vec<u8>> {
    let bytes = tokio::fs::read(path).await.map_err(|e| {
        KanvertError::processing(format!("{} completed but output file not found: {}", operation, e))
    })?;

    if bytes.is_empty() {
        return Err(KanvertError::processing(format!("{} produced an empty file", operation)));
    }

    Ok(bytes)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_locate_finds_binary_in_install_paths() {
        let dir = tempfile::tempdir().unwrap();
        let fake = dir.path().join("fake-engine");
        std::fs::write(&fake, b"#!/bin/sh\n").unwrap();

        let search = BinarySearch {
            env_vars: &[],
            names: &[],
            install_paths: &[],
        };
        assert!(search.locate().is_none());

        let path_str = fake.to_string_lossy().to_string();
        let install_paths = [path_str.as_str()];
        let search = BinarySearch {
            env_vars: &[],
            names: &[],
            install_paths: &install_paths,
        };
        assert_eq!(search.locate(), Some(fake));
    }

    #[test]
    fn test_locate_skips_directories() {
        let dir = tempfile::tempdir().unwrap();
        let path_str = dir.path().to_string_lossy().to_string();
        let install_paths = [path_str.as_str()];
        let search = BinarySearch {
            env_vars: &[],
            names: &[],
            install_paths: &install_paths,
        };
        assert!(search.locate().is_none());
    }

    #[tokio::test]
    async fn test_scratch_dir_removed_on_drop() {
        let base = tempfile::tempdir().unwrap();
        let path = {
            let scratch = ScratchDir::new(base.path(), "job").await.unwrap();
            assert!(scratch.path().is_dir());
            scratch.path().to_path_buf()
        };
        assert!(!path.exists());
    }

    #[tokio::test]
    async fn test_read_engine_output_rejects_empty_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("out.pdf");
        tokio::fs::write(&path, b"").await.unwrap();
        let err = read_engine_output(&path, "Test engine").await.unwrap_err();
        assert!(err.to_string().contains("empty file"));

        let missing = read_engine_output(&dir.path().join("missing.pdf"), "Test engine").await;
        assert!(missing.is_err());
    }

    #[cfg(unix)]
    #[tokio::test]
    async fn test_run_engine_reports_failure_output() {
        let output = run_engine(Path::new("/bin/sh"), ["-c", "echo broken >&2; exit 3"], "Shell", 10)
            .await
            .unwrap();
        assert!(!output.status.success());
        let err = engine_failure("Shell", &output);
        assert!(err.to_string().contains("return code 3"));
        assert!(err.to_string().contains("broken"));
    }

    #[cfg(unix)]
    #[tokio::test]
    async fn test_run_engine_times_out() {
        let err = run_engine(Path::new("/bin/sh"), ["-c", "sleep 5"], "Sleep", 1)
            .await
            .unwrap_err();
        assert!(matches!(err, KanvertError::Timeout { seconds: 1, .. }));
    }
}
