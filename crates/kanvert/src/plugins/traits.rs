//! Converter contract.
//!
//! Every converter implements [`Converter`]: it declares the output formats it
//! produces, decides whether it can handle a request, and performs the
//! conversion. Converters that hold resources needing explicit release also
//! implement [`Disposable`] and expose it through [`Converter::as_disposable`].

use async_trait::async_trait;

use crate::Result;
use crate::types::{ConversionFormat, ConversionRequest, ConversionResult, ConverterCapabilities};

#[async_trait]
pub trait Converter: Send + Sync {
    /// Unique converter name (e.g. `"markdown_to_pdf"`).
    fn name(&self) -> &str;

    /// Output formats this converter produces. Fixed for the converter's lifetime.
    fn supported_formats(&self) -> &[ConversionFormat];

    /// Whether this converter accepts `request`.
    ///
    /// Must be cheap and free of side effects; the registry calls it during
    /// selection and health probes.
    fn validate_request(&self, request: &ConversionRequest) -> bool;

    /// Convert `request`.
    ///
    /// Converter-level failures are normally reported as a failed
    /// [`ConversionResult`]. An `Err` is passed through the registry untouched.
    async fn convert(&self, request: &ConversionRequest) -> Result<ConversionResult>;

    fn capabilities(&self) -> ConverterCapabilities;

    fn supports_format(&self, format: ConversionFormat) -> bool {
        self.supported_formats().contains(&format)
    }

    /// Whether construction-time setup succeeded.
    fn is_initialized(&self) -> bool {
        true
    }

    /// Problems recorded while the converter was being set up.
    fn initialization_errors(&self) -> Vec<String> {
        Vec::new()
    }

    fn as_disposable(&self) -> Option<&dyn Disposable> {
        None
    }
}

/// Optional release hook for converters holding external resources.
pub trait Disposable: Send + Sync {
    fn dispose(&self) -> Result<()>;
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::Options;
    use chrono::Utc;
    use std::sync::atomic::{AtomicBool, Ordering};

    struct ScratchConverter {
        disposed: AtomicBool,
    }

    #[async_trait]
    impl Converter for ScratchConverter {
        fn name(&self) -> &str {
            "scratch"
        }

        fn supported_formats(&self) -> &[ConversionFormat] {
            &[ConversionFormat::Text, ConversionFormat::Html]
        }

        fn validate_request(&self, request: &ConversionRequest) -> bool {
            !request.content.is_empty()
        }

        async fn convert(&self, request: &ConversionRequest) -> Result<ConversionResult> {
            Ok(ConversionResult::completed(
                "scratch-job",
                request.content.as_bytes().to_vec(),
                "scratch-job.txt",
                Options::new(),
                Utc::now(),
            ))
        }

        fn capabilities(&self) -> ConverterCapabilities {
            ConverterCapabilities {
                name: self.name().to_string(),
                supported_formats: self.supported_formats().to_vec(),
                ..Default::default()
            }
        }

        fn as_disposable(&self) -> Option<&dyn Disposable> {
            Some(self)
        }
    }

    impl Disposable for ScratchConverter {
        fn dispose(&self) -> Result<()> {
            self.disposed.store(true, Ordering::Release);
            Ok(())
        }
    }

    #[test]
    fn test_supports_format_uses_declared_formats() {
        let converter = ScratchConverter {
            disposed: AtomicBool::new(false),
        };
        assert!(converter.supports_format(ConversionFormat::Html));
        assert!(!converter.supports_format(ConversionFormat::Pdf));
        assert!(converter.is_initialized());
        assert!(converter.initialization_errors().is_empty());
    }

    #[test]
    fn test_disposable_through_trait_object() {
        let converter = ScratchConverter {
            disposed: AtomicBool::new(false),
        };
        let dynamic: &dyn Converter = &converter;
        dynamic.as_disposable().unwrap().dispose().unwrap();
        assert!(converter.disposed.load(Ordering::Acquire));
    }

    #[tokio::test]
    async fn test_convert_returns_completed_result() {
        let converter = ScratchConverter {
            disposed: AtomicBool::new(false),
        };
        let request = ConversionRequest::new("hello", ConversionFormat::Text);
        assert!(converter.validate_request(&request));
        let result = converter.convert(&request).await.unwrap();
        assert_eq!(result.output_data(), Some(&b"hello"[..]));
    }
}
