//! Converter registry integration tests.
//!
//! Covers registration, the format index, first-match selection and dispatch,
//! and aggregated health reporting.

use async_trait::async_trait;
use chrono::Utc;
use kanvert::plugins::{Converter, ConverterRegistry};
use kanvert::types::{
    ConversionFormat, ConversionRequest, ConversionResult, ConversionStatus, ConverterCapabilities, HealthStatus,
    Options,
};
use kanvert::{KanvertError, Result};
use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};

struct MockConverter {
    name: String,
    formats: Vec<ConversionFormat>,
    accepts: bool,
    initialized: bool,
    calls: AtomicUsize,
}

impl MockConverter {
    fn new(name: &str, formats: &[ConversionFormat]) -> Self {
        Self {
            name: name.to_string(),
            formats: formats.to_vec(),
            accepts: true,
            initialized: true,
            calls: AtomicUsize::new(0),
        }
    }

    fn rejecting(mut self) -> Self {
        self.accepts = false;
        self
    }

    fn uninitialized(mut self) -> Self {
        self.initialized = false;
        self
    }

    fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl Converter for MockConverter {
    fn name(&self) -> &str {
        &self.name
    }

    fn supported_formats(&self) -> &[ConversionFormat] {
        &self.formats
    }

    fn validate_request(&self, request: &ConversionRequest) -> bool {
        self.accepts && self.supports_format(request.output_format)
    }

    async fn convert(&self, request: &ConversionRequest) -> Result<ConversionResult> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        let mut metadata = Options::new();
        metadata.insert("converter".to_string(), serde_json::json!(self.name));
        Ok(ConversionResult::completed(
            format!("{}-job", self.name),
            request.content.as_bytes().to_vec(),
            format!("{}-job.out", self.name),
            metadata,
            Utc::now(),
        ))
    }

    fn capabilities(&self) -> ConverterCapabilities {
        ConverterCapabilities {
            name: self.name.clone(),
            description: format!("Mock converter {}", self.name),
            supported_formats: self.formats.clone(),
            ..Default::default()
        }
    }

    fn is_initialized(&self) -> bool {
        self.initialized
    }
}

/// Converter whose conversion step reports a processing failure.
struct FailingConverter;

#[async_trait]
impl Converter for FailingConverter {
    fn name(&self) -> &str {
        "failing"
    }

    fn supported_formats(&self) -> &[ConversionFormat] {
        &[ConversionFormat::Html]
    }

    fn validate_request(&self, _request: &ConversionRequest) -> bool {
        true
    }

    async fn convert(&self, _request: &ConversionRequest) -> Result<ConversionResult> {
        Ok(ConversionResult::failed(
            "failing-job",
            "Processing error: engine crashed",
            Utc::now(),
        ))
    }

    fn capabilities(&self) -> ConverterCapabilities {
        ConverterCapabilities {
            name: "failing".to_string(),
            supported_formats: self.supported_formats().to_vec(),
            ..Default::default()
        }
    }
}

/// Converter whose validation panics, used to exercise probe isolation.
struct PanickingConverter;

#[async_trait]
impl Converter for PanickingConverter {
    fn name(&self) -> &str {
        "panicky"
    }

    fn supported_formats(&self) -> &[ConversionFormat] {
        &[ConversionFormat::Text]
    }

    fn validate_request(&self, _request: &ConversionRequest) -> bool {
        panic!("validator exploded");
    }

    async fn convert(&self, _request: &ConversionRequest) -> Result<ConversionResult> {
        Err(KanvertError::processing("unreachable"))
    }

    fn capabilities(&self) -> ConverterCapabilities {
        ConverterCapabilities::default()
    }
}

fn names(converters: &[Arc<dyn Converter>]) -> Vec<String> {
    converters.iter().map(|c| c.name().to_string()).collect()
}

#[tokio::test]
async fn test_convert_dispatches_to_only_matching_converter() {
    let mut registry = ConverterRegistry::new();
    let pdf_maker = Arc::new(MockConverter::new("pdf-maker", &[ConversionFormat::Pdf]));
    registry.register_converter(pdf_maker.clone()).unwrap();

    let request = ConversionRequest::new("x", ConversionFormat::Pdf);
    let result = registry.convert(&request, None).await.unwrap();

    assert_eq!(pdf_maker.calls(), 1);
    assert_eq!(result.job_id(), "pdf-maker-job");
    assert_eq!(result.status(), ConversionStatus::Completed);
    assert_eq!(result.output_data(), Some(&b"x"[..]));
    assert_eq!(result.metadata()["converter"], "pdf-maker");
}

#[tokio::test]
async fn test_convert_without_converter_for_format_fails() {
    let mut registry = ConverterRegistry::new();
    registry
        .register_converter(Arc::new(MockConverter::new("pdf-maker", &[ConversionFormat::Pdf])))
        .unwrap();

    let request = ConversionRequest::new("x", ConversionFormat::Docx);
    let err = registry.convert(&request, None).await.unwrap_err();

    assert!(matches!(err, KanvertError::Validation { .. }));
    assert!(err.to_string().contains("No converter available"));
    assert!(err.to_string().contains("docx"));
}

#[test]
fn test_find_best_converter_skips_rejecting_candidates() {
    let mut registry = ConverterRegistry::new();
    registry
        .register_converter(Arc::new(MockConverter::new("A", &[ConversionFormat::Pdf]).rejecting()))
        .unwrap();
    registry
        .register_converter(Arc::new(MockConverter::new("B", &[ConversionFormat::Pdf])))
        .unwrap();

    let request = ConversionRequest::new("x", ConversionFormat::Pdf);
    let best = registry.find_best_converter(&request).unwrap();
    assert_eq!(best.name(), "B");
}

#[test]
fn test_find_best_converter_prefers_registration_order() {
    let mut registry = ConverterRegistry::new();
    registry
        .register_converter(Arc::new(MockConverter::new("first", &[ConversionFormat::Pdf])))
        .unwrap();
    registry
        .register_converter(Arc::new(MockConverter::new("second", &[ConversionFormat::Pdf])))
        .unwrap();

    let request = ConversionRequest::new("x", ConversionFormat::Pdf);
    assert_eq!(registry.find_best_converter(&request).unwrap().name(), "first");
}

#[test]
fn test_find_best_converter_none_when_all_reject() {
    let mut registry = ConverterRegistry::new();
    registry
        .register_converter(Arc::new(MockConverter::new("A", &[ConversionFormat::Pdf]).rejecting()))
        .unwrap();

    let request = ConversionRequest::new("x", ConversionFormat::Pdf);
    assert!(registry.find_best_converter(&request).is_none());
}

#[test]
fn test_unregister_unknown_converter_is_noop() {
    let mut registry = ConverterRegistry::new();
    registry
        .register_converter(Arc::new(MockConverter::new("pdf-maker", &[ConversionFormat::Pdf])))
        .unwrap();

    assert!(!registry.unregister_converter("nonexistent"));

    assert_eq!(registry.len(), 1);
    assert_eq!(registry.list_names(), vec!["pdf-maker".to_string()]);
    assert_eq!(
        names(&registry.get_converters_for_format(ConversionFormat::Pdf)),
        vec!["pdf-maker".to_string()]
    );
}

#[test]
fn test_registered_converter_is_indexed_by_every_format() {
    let mut registry = ConverterRegistry::new();
    let converter: Arc<dyn Converter> = Arc::new(MockConverter::new(
        "multi",
        &[ConversionFormat::Pdf, ConversionFormat::Html, ConversionFormat::Text],
    ));
    registry.register_converter(Arc::clone(&converter)).unwrap();

    let fetched = registry.get_converter("multi").unwrap();
    assert!(Arc::ptr_eq(&fetched, &converter));

    for format in converter.supported_formats() {
        let candidates = registry.get_converters_for_format(*format);
        assert!(candidates.iter().any(|c| Arc::ptr_eq(c, &converter)));
    }
    assert!(registry.get_converters_for_format(ConversionFormat::Docx).is_empty());
}

#[test]
fn test_unregister_removes_name_from_index() {
    let mut registry = ConverterRegistry::new();
    registry
        .register_converter(Arc::new(MockConverter::new(
            "gone",
            &[ConversionFormat::Pdf, ConversionFormat::Html],
        )))
        .unwrap();
    registry
        .register_converter(Arc::new(MockConverter::new("stays", &[ConversionFormat::Pdf])))
        .unwrap();

    assert!(registry.unregister_converter("gone"));

    assert!(registry.get_converter("gone").is_none());
    for format in ConversionFormat::ALL {
        assert!(
            !names(&registry.get_converters_for_format(format)).contains(&"gone".to_string()),
            "format {} still references removed converter",
            format
        );
    }
    assert!(!registry.get_supported_formats().contains(&ConversionFormat::Html));
    assert_eq!(names(&registry.get_converters_for_format(ConversionFormat::Pdf)), vec!["stays"]);
}

#[test]
fn test_reregistration_replaces_without_duplicates() {
    let mut registry = ConverterRegistry::new();
    let first: Arc<dyn Converter> = Arc::new(MockConverter::new("dup", &[ConversionFormat::Pdf]));
    let second: Arc<dyn Converter> = Arc::new(MockConverter::new("dup", &[ConversionFormat::Pdf, ConversionFormat::Html]));

    registry.register_converter(Arc::clone(&first)).unwrap();
    registry.register_converter(Arc::clone(&second)).unwrap();

    assert_eq!(registry.len(), 1);
    assert!(Arc::ptr_eq(&registry.get_converter("dup").unwrap(), &second));
    assert_eq!(names(&registry.get_converters_for_format(ConversionFormat::Pdf)), vec!["dup"]);
    assert_eq!(names(&registry.get_converters_for_format(ConversionFormat::Html)), vec!["dup"]);
}

#[test]
fn test_register_rejects_invalid_names() {
    let mut registry = ConverterRegistry::new();
    let err = registry
        .register_converter(Arc::new(MockConverter::new("", &[ConversionFormat::Pdf])))
        .unwrap_err();
    assert!(matches!(err, KanvertError::Validation { .. }));

    let err = registry
        .register_converter(Arc::new(MockConverter::new("has space", &[ConversionFormat::Pdf])))
        .unwrap_err();
    assert!(err.to_string().contains("whitespace"));
    assert!(registry.is_empty());
}

#[tokio::test]
async fn test_named_convert_never_falls_back() {
    let mut registry = ConverterRegistry::new();
    let pdf_maker = Arc::new(MockConverter::new("pdf-maker", &[ConversionFormat::Pdf]));
    registry.register_converter(pdf_maker.clone()).unwrap();

    let request = ConversionRequest::new("x", ConversionFormat::Pdf);
    let err = registry.convert(&request, Some("missing")).await.unwrap_err();

    assert!(matches!(err, KanvertError::Validation { .. }));
    assert!(err.to_string().contains("Converter 'missing' not found"));
    assert_eq!(pdf_maker.calls(), 0);
}

#[tokio::test]
async fn test_named_convert_bypasses_validation() {
    let mut registry = ConverterRegistry::new();
    let picky = Arc::new(MockConverter::new("picky", &[ConversionFormat::Pdf]).rejecting());
    registry.register_converter(picky.clone()).unwrap();

    let request = ConversionRequest::new("x", ConversionFormat::Pdf);
    let result = registry.convert(&request, Some("picky")).await.unwrap();
    assert!(result.is_success());
    assert_eq!(picky.calls(), 1);
}

#[tokio::test]
async fn test_failed_result_is_returned_unchanged() {
    let mut registry = ConverterRegistry::new();
    registry.register_converter(Arc::new(FailingConverter)).unwrap();

    let request = ConversionRequest::new("<p>x</p>", ConversionFormat::Html);
    let result = registry.convert(&request, None).await.unwrap();

    assert_eq!(result.status(), ConversionStatus::Failed);
    assert_eq!(result.error_message(), Some("Processing error: engine crashed"));
    assert!(result.output_data().is_none());
}

#[test]
fn test_health_check_counts_add_up() {
    let mut registry = ConverterRegistry::new();
    registry
        .register_converter(Arc::new(MockConverter::new("healthy", &[ConversionFormat::Pdf])))
        .unwrap();
    registry
        .register_converter(Arc::new(MockConverter::new("degraded", &[ConversionFormat::Html]).rejecting()))
        .unwrap();
    registry
        .register_converter(Arc::new(MockConverter::new("broken", &[ConversionFormat::Docx]).uninitialized()))
        .unwrap();
    registry
        .register_converter(Arc::new(MockConverter::new("empty", &[])))
        .unwrap();
    registry.register_converter(Arc::new(PanickingConverter)).unwrap();

    let report = registry.health_check();

    assert_eq!(report.total_converters, 5);
    assert_eq!(
        report.healthy_converters + report.degraded_converters + report.unhealthy_converters,
        report.total_converters
    );
    assert_eq!(report.healthy_converters, 1);
    assert_eq!(report.degraded_converters, 1);
    assert_eq!(report.unhealthy_converters, 3);
    assert_eq!(report.status, HealthStatus::Degraded);

    assert_eq!(report.converters["healthy"].status, HealthStatus::Healthy);
    assert_eq!(report.converters["degraded"].probe_passed, Some(false));
    assert_eq!(report.converters["broken"].status, HealthStatus::Unhealthy);
    assert_eq!(report.converters["empty"].status, HealthStatus::Unhealthy);
    assert_eq!(report.converters["panicky"].status, HealthStatus::Unhealthy);
    assert!(!report.converters["panicky"].errors.is_empty());
}

#[test]
fn test_health_check_overall_status() {
    let mut registry = ConverterRegistry::new();
    assert_eq!(registry.health_check().status, HealthStatus::Unhealthy);

    registry
        .register_converter(Arc::new(MockConverter::new("degraded", &[ConversionFormat::Html]).rejecting()))
        .unwrap();
    assert_eq!(registry.health_check().status, HealthStatus::Unhealthy);

    registry
        .register_converter(Arc::new(MockConverter::new("healthy", &[ConversionFormat::Pdf])))
        .unwrap();
    assert_eq!(registry.health_check().status, HealthStatus::Degraded);

    registry.unregister_converter("degraded");
    let report = registry.health_check();
    assert_eq!(report.status, HealthStatus::Healthy);
    assert_eq!(report.supported_formats, vec![ConversionFormat::Pdf]);
}

#[test]
fn test_registration_snapshot_is_available_before_health_check() {
    let mut registry = ConverterRegistry::new();
    registry
        .register_converter(Arc::new(MockConverter::new("pdf-maker", &[ConversionFormat::Pdf])))
        .unwrap();

    let health = registry.converter_health("pdf-maker").unwrap();
    assert_eq!(health.status, HealthStatus::Healthy);
    assert!(health.initialized);
    assert!(registry.converter_health("missing").is_none());
}

#[test]
fn test_list_converters_reports_capabilities() {
    let mut registry = ConverterRegistry::new();
    registry
        .register_converter(Arc::new(MockConverter::new("one", &[ConversionFormat::Pdf])))
        .unwrap();
    registry
        .register_converter(Arc::new(MockConverter::new("two", &[ConversionFormat::Markdown])))
        .unwrap();

    let capabilities = registry.list_converters();
    assert_eq!(capabilities.len(), 2);
    assert_eq!(capabilities[0].name, "one");
    assert_eq!(capabilities[1].description, "Mock converter two");

    let formats = registry.get_supported_formats();
    assert!(formats.contains(&ConversionFormat::Pdf));
    assert!(formats.contains(&ConversionFormat::Markdown));
}
