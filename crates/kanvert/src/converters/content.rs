//! Request content sniffing.
//!
//! `ConversionRequest::content` is a plain string that may hold a base64
//! `data:` URL, a path to an existing file, a URL, or the document text itself.

use base64::prelude::*;
use std::path::{Path, PathBuf};

use crate::render::browser::is_url;
use crate::{KanvertError, Result};

/// Paths longer than this are never probed on disk.
const MAX_PATH_LEN: usize = 4096;

#[derive(Debug, Clone, PartialEq)]
pub enum ContentSource {
    /// Decoded payload of a `data:` URL.
    DataUrl { media_type: String, bytes: Vec<u8> },
    File(PathBuf),
    Url(String),
    Inline(String),
}

impl ContentSource {
    /// Sniff what `content` holds.
    ///
    /// A `data:` URL with a malformed base64 payload is a validation error.
    pub fn classify(content: &str) -> Result<Self> {
        if let Some(rest) = content.strip_prefix("data:") {
            return parse_data_url(rest);
        }

        if is_url(content) {
            return Ok(ContentSource::Url(content.trim().to_string()));
        }

        if looks_like_path(content) && Path::new(content).is_file() {
            return Ok(ContentSource::File(PathBuf::from(content)));
        }

        Ok(ContentSource::Inline(content.to_string()))
    }

    /// Lower-cased file extension for file sources.
    pub fn extension(&self) -> Option<String> {
        match self {
            ContentSource::File(path) => path
                .extension()
                .map(|ext| ext.to_string_lossy().to_ascii_lowercase()),
            _ => None,
        }
    }

    /// Raw bytes of the document. URLs are not fetched.
    pub async fn load_bytes(&self) -> Result<Vec<u8>> {
        match self {
            ContentSource::DataUrl { bytes, .. } => Ok(bytes.clone()),
            ContentSource::File(path) => Ok(tokio::fs::read(path).await?),
            ContentSource::Inline(text) => Ok(text.as_bytes().to_vec()),
            ContentSource::Url(url) => Err(KanvertError::validation(format!(
                "Remote content is not supported for this conversion: {}",
                url
            ))),
        }
    }

    /// Document text: inline content, or a file / data URL decoded as UTF-8.
    pub async fn load_text(&self) -> Result<String> {
        match self {
            ContentSource::Inline(text) => Ok(text.clone()),
            other => {
                let bytes = other.load_bytes().await?;
                String::from_utf8(bytes).map_err(|e| KanvertError::validation_with_source("Content is not valid UTF-8", e))
            }
        }
    }
}

fn looks_like_path(content: &str) -> bool {
    !content.is_empty() && content.len() <= MAX_PATH_LEN && !content.contains(['\n', '\r', '\0'])
}

fn parse_data_url(rest: &str) -> Result<ContentSource> {
    let (header, payload) = rest
        .split_once(',')
        .ok_or_else(|| KanvertError::validation("Malformed data URL: missing ','"))?;

    let (media_type, is_base64) = match header.strip_suffix(";base64") {
        Some(media_type) => (media_type, true),
        None => (header, false),
    };

    let bytes = if is_base64 {
        let cleaned: String = payload.chars().filter(|c| !c.is_ascii_whitespace()).collect();
        BASE64_STANDARD
            .decode(cleaned.as_bytes())
            .map_err(|e| KanvertError::validation_with_source("Invalid base64 payload in data URL", e))?
    } else {
        payload.as_bytes().to_vec()
    };

    Ok(ContentSource::DataUrl {
        media_type: media_type.to_ascii_lowercase(),
        bytes,
    })
}
