//! Converter registry.
//!
//! The registry is the live directory of instantiated converters. It keeps a
//! name → converter map and a format → names index (registration order), probes
//! converter health, selects a converter for each request, and dispatches the
//! conversion.
//!
//! The registry is an ordinary owned value. Callers construct it and pass it
//! where it is needed; [`KanvertContext`](crate::service::KanvertContext) wraps
//! it in a lock for the HTTP and MCP front-ends.
//!
//! # Example
//!
//! ```rust,no_run
//! use kanvert::plugins::ConverterRegistry;
//! use kanvert::types::{ConversionFormat, ConversionRequest};
//!
//! # async fn demo(converter: std::sync::Arc<dyn kanvert::plugins::Converter>) -> kanvert::Result<()> {
//! let mut registry = ConverterRegistry::new();
//! registry.register_converter(converter)?;
//!
//! let request = ConversionRequest::new("# Hello", ConversionFormat::Pdf);
//! let result = registry.convert(&request, None).await?;
//! println!("{}", result.job_id());
//! # Ok(())
//! # }
//! ```

use chrono::{DateTime, Utc};
use indexmap::IndexMap;
use serde::Serialize;
use std::panic::{AssertUnwindSafe, catch_unwind};
use std::sync::Arc;

use crate::plugins::Converter;
use crate::types::{ConversionFormat, ConversionRequest, ConversionResult, ConverterCapabilities, HealthStatus};
use crate::{KanvertError, Result};

const HEALTH_PROBE_CONTENT: &str = "health_check";

/// Validate a converter or plugin name before registration.
///
/// # Rules
///
/// - Name cannot be empty
/// - Name cannot contain whitespace
pub(crate) fn validate_plugin_name(name: &str) -> Result<()> {
    if name.is_empty() {
        return Err(KanvertError::validation("Converter name cannot be empty"));
    }

    if name.contains(char::is_whitespace) {
        return Err(KanvertError::validation(format!(
            "Converter name '{}' cannot contain whitespace",
            name
        )));
    }

    Ok(())
}

/// Health snapshot of one converter.
#[derive(Debug, Clone, Serialize)]
pub struct ConverterHealth {
    pub status: HealthStatus,
    pub initialized: bool,
    /// Outcome of the synthetic `validate_request` probe, if it ran.
    pub probe_passed: Option<bool>,
    pub supported_formats: Vec<ConversionFormat>,
    pub errors: Vec<String>,
    pub checked_at: DateTime<Utc>,
}

/// Aggregated registry health.
#[derive(Debug, Clone, Serialize)]
pub struct RegistryHealthReport {
    pub status: HealthStatus,
    pub total_converters: usize,
    pub healthy_converters: usize,
    pub degraded_converters: usize,
    pub unhealthy_converters: usize,
    pub converters: IndexMap<String, ConverterHealth>,
    pub supported_formats: Vec<ConversionFormat>,
}

struct RegisteredConverter {
    converter: Arc<dyn Converter>,
    health: ConverterHealth,
}

/// Probe a converter's health.
///
/// Uninitialized converters and converters without formats are unhealthy. Otherwise
/// a throwaway request for the first declared format is validated: accepted means
/// healthy, rejected means degraded, a panic inside the probe means unhealthy.
pub fn probe_converter_health(converter: &dyn Converter) -> ConverterHealth {
    let supported_formats = converter.supported_formats().to_vec();
    let mut errors = converter.initialization_errors();
    let initialized = converter.is_initialized();

    let snapshot = |status: HealthStatus, probe_passed: Option<bool>, errors: Vec<String>| ConverterHealth {
        status,
        initialized,
        probe_passed,
        supported_formats: supported_formats.clone(),
        errors,
        checked_at: Utc::now(),
    };

    if !initialized {
        if errors.is_empty() {
            errors.push("Converter is not initialized".to_string());
        }
        return snapshot(HealthStatus::Unhealthy, None, errors);
    }

    let Some(first_format) = supported_formats.first().copied() else {
        errors.push("Converter declares no output formats".to_string());
        return snapshot(HealthStatus::Unhealthy, None, errors);
    };

    let probe = ConversionRequest::new(HEALTH_PROBE_CONTENT, first_format);
    match catch_unwind(AssertUnwindSafe(|| converter.validate_request(&probe))) {
        Ok(true) => snapshot(HealthStatus::Healthy, Some(true), errors),
        Ok(false) => {
            errors.push(format!("Converter rejected a minimal '{}' request", first_format));
            snapshot(HealthStatus::Degraded, Some(false), errors)
        }
        Err(_) => {
            errors.push("Health probe panicked during validate_request".to_string());
            snapshot(HealthStatus::Unhealthy, None, errors)
        }
    }
}

/// Live directory of converters and the format index used for dispatch.
pub struct ConverterRegistry {
    converters: IndexMap<String, RegisteredConverter>,
    format_index: IndexMap<ConversionFormat, Vec<String>>,
}

impl ConverterRegistry {
    pub fn new() -> Self {
        Self {
            converters: IndexMap::new(),
            format_index: IndexMap::new(),
        }
    }

    /// Register a converter, replacing any converter with the same name.
    ///
    /// A health snapshot is taken at registration time. Replacement keeps the
    /// name's position in the format index, adds it to any new formats, and
    /// drops it from formats the new converter no longer declares. The replaced
    /// converter is disposed unless it is the same instance.
    ///
    /// # Errors
    ///
    /// Returns `Validation` if the converter name is empty or contains whitespace.
    pub fn register_converter(&mut self, converter: Arc<dyn Converter>) -> Result<()> {
        let name = converter.name().to_string();
        validate_plugin_name(&name)?;

        let health = probe_converter_health(converter.as_ref());
        let formats = converter.supported_formats().to_vec();

        if self.converters.contains_key(&name) {
            tracing::warn!(converter = %name, "Converter already registered, replacing it");
            self.remove_from_index(&name, |format| !formats.contains(format));
        }

        for format in &formats {
            let names = self.format_index.entry(*format).or_default();
            if !names.iter().any(|existing| existing == &name) {
                names.push(name.clone());
            }
        }

        tracing::info!(
            converter = %name,
            status = %health.status,
            formats = ?formats,
            "Registered converter"
        );

        let replaced = self.converters.insert(
            name,
            RegisteredConverter {
                converter: converter.clone(),
                health,
            },
        );
        if let Some(previous) = replaced
            && !Arc::ptr_eq(&previous.converter, &converter)
        {
            dispose_converter(previous.converter.as_ref());
        }
        Ok(())
    }

    /// Remove a converter. Returns `false` (and changes nothing) if it was not registered.
    pub fn unregister_converter(&mut self, name: &str) -> bool {
        if !self.converters.contains_key(name) {
            tracing::warn!(converter = %name, "Cannot unregister unknown converter");
            return false;
        }

        self.remove_from_index(name, |_| true);

        if let Some(entry) = self.converters.shift_remove(name) {
            dispose_converter(entry.converter.as_ref());
        }

        tracing::info!(converter = %name, "Unregistered converter");
        true
    }

    fn remove_from_index(&mut self, name: &str, should_remove: impl Fn(&ConversionFormat) -> bool) {
        for (format, names) in self.format_index.iter_mut() {
            if should_remove(format) {
                names.retain(|existing| existing != name);
            }
        }
        self.format_index.retain(|_, names| !names.is_empty());
    }

    pub fn get_converter(&self, name: &str) -> Option<Arc<dyn Converter>> {
        self.converters.get(name).map(|entry| Arc::clone(&entry.converter))
    }

    /// Converters supporting `format`, in registration order.
    pub fn get_converters_for_format(&self, format: ConversionFormat) -> Vec<Arc<dyn Converter>> {
        self.format_index
            .get(&format)
            .map(|names| names.iter().filter_map(|name| self.get_converter(name)).collect())
            .unwrap_or_default()
    }

    /// First converter for the request's format whose `validate_request` accepts it.
    pub fn find_best_converter(&self, request: &ConversionRequest) -> Option<Arc<dyn Converter>> {
        self.get_converters_for_format(request.output_format)
            .into_iter()
            .find(|converter| converter.validate_request(request))
    }

    /// Resolve the converter that [`convert`](Self::convert) would use.
    ///
    /// # Errors
    ///
    /// - `Validation("Converter 'X' not found")` when a named converter is absent
    /// - `Validation("No converter available for format 'x'")` when nothing accepts the request
    pub fn select_converter(
        &self,
        request: &ConversionRequest,
        converter_name: Option<&str>,
    ) -> Result<Arc<dyn Converter>> {
        match converter_name {
            Some(name) => self
                .get_converter(name)
                .ok_or_else(|| KanvertError::validation(format!("Converter '{}' not found", name))),
            None => self.find_best_converter(request).ok_or_else(|| {
                KanvertError::validation(format!(
                    "No converter available for format '{}'",
                    request.output_format
                ))
            }),
        }
    }

    /// Convert `request` with the named converter, or the first one that accepts it.
    ///
    /// The converter's result (or error) is returned unchanged; the registry
    /// neither retries nor rewrites converter failures.
    pub async fn convert(&self, request: &ConversionRequest, converter_name: Option<&str>) -> Result<ConversionResult> {
        let converter = self.select_converter(request, converter_name)?;
        tracing::info!(
            converter = %converter.name(),
            format = %request.output_format,
            "Using converter"
        );
        converter.convert(request).await
    }

    /// Health snapshot recorded at registration or by the last health check.
    pub fn converter_health(&self, name: &str) -> Option<&ConverterHealth> {
        self.converters.get(name).map(|entry| &entry.health)
    }

    /// Re-probe every converter and aggregate the results.
    ///
    /// Overall status is `unhealthy` with zero healthy converters, otherwise
    /// `degraded` if any converter is degraded, otherwise `healthy`.
    pub fn health_check(&mut self) -> RegistryHealthReport {
        let mut converters = IndexMap::with_capacity(self.converters.len());
        let (mut healthy, mut degraded, mut unhealthy) = (0, 0, 0);

        for (name, entry) in self.converters.iter_mut() {
            entry.health = probe_converter_health(entry.converter.as_ref());
            match entry.health.status {
                HealthStatus::Healthy => healthy += 1,
                HealthStatus::Degraded => degraded += 1,
                HealthStatus::Unhealthy | HealthStatus::Unknown => unhealthy += 1,
            }
            converters.insert(name.clone(), entry.health.clone());
        }

        let status = if healthy == 0 {
            HealthStatus::Unhealthy
        } else if degraded > 0 {
            HealthStatus::Degraded
        } else {
            HealthStatus::Healthy
        };

        tracing::debug!(
            status = %status,
            healthy,
            degraded,
            unhealthy,
            "Registry health check complete"
        );

        RegistryHealthReport {
            status,
            total_converters: self.converters.len(),
            healthy_converters: healthy,
            degraded_converters: degraded,
            unhealthy_converters: unhealthy,
            converters,
            supported_formats: self.get_supported_formats(),
        }
    }

    pub fn list_converters(&self) -> Vec<ConverterCapabilities> {
        self.converters
            .values()
            .map(|entry| entry.converter.capabilities())
            .collect()
    }

    pub fn list_names(&self) -> Vec<String> {
        self.converters.keys().cloned().collect()
    }

    /// Formats with at least one registered converter, in enum order.
    pub fn get_supported_formats(&self) -> Vec<ConversionFormat> {
        let mut formats: Vec<ConversionFormat> = self.format_index.keys().copied().collect();
        formats.sort();
        formats
    }

    pub fn len(&self) -> usize {
        self.converters.len()
    }

    pub fn is_empty(&self) -> bool {
        self.converters.is_empty()
    }

    /// Unregister every converter, disposing each one.
    pub fn shutdown_all(&mut self) {
        for name in self.list_names() {
            self.unregister_converter(&name);
        }
    }
}

impl Default for ConverterRegistry {
    fn default() -> Self {
        Self::new()
    }
}

pub(crate) fn dispose_converter(converter: &dyn Converter) {
    if let Some(disposable) = converter.as_disposable()
        && let Err(e) = disposable.dispose()
    {
        tracing::warn!(converter = %converter.name(), error = %e, "Failed to dispose converter");
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::plugins::Disposable;
    use crate::types::Options;
    use async_trait::async_trait;
    use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};

    struct MockConverter {
        name: String,
        formats: Vec<ConversionFormat>,
        accepts: bool,
        initialized: bool,
        calls: AtomicUsize,
        disposed: AtomicBool,
    }

    impl MockConverter {
        fn new(name: &str, formats: &[ConversionFormat], accepts: bool) -> Self {
            Self {
                name: name.to_string(),
                formats: formats.to_vec(),
                accepts,
                initialized: true,
                calls: AtomicUsize::new(0),
                disposed: AtomicBool::new(false),
            }
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

        fn validate_request(&self, _: &ConversionRequest) -> bool {
            self.accepts
        }

        async fn convert(&self, _: &ConversionRequest) -> Result<ConversionResult> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            Ok(ConversionResult::completed(
                format!("{}-job", self.name),
                self.name.as_bytes().to_vec(),
                "out.bin",
                Options::new(),
                Utc::now(),
            ))
        }

        fn capabilities(&self) -> ConverterCapabilities {
            ConverterCapabilities {
                name: self.name.clone(),
                supported_formats: self.formats.clone(),
                ..Default::default()
            }
        }

        fn is_initialized(&self) -> bool {
            self.initialized
        }

        fn as_disposable(&self) -> Option<&dyn Disposable> {
            Some(self)
        }
    }

    impl Disposable for MockConverter {
        fn dispose(&self) -> Result<()> {
            self.disposed.store(true, Ordering::SeqCst);
            Ok(())
        }
    }

    struct PanickingProbe;

    #[async_trait]
    impl Converter for PanickingProbe {
        fn name(&self) -> &str {
            "panicky"
        }

        fn supported_formats(&self) -> &[ConversionFormat] {
            &[ConversionFormat::Html]
        }

        fn validate_request(&self, _: &ConversionRequest) -> bool {
            panic!("probe exploded")
        }

        async fn convert(&self, _: &ConversionRequest) -> Result<ConversionResult> {
            Err(KanvertError::processing("unreachable"))
        }

        fn capabilities(&self) -> ConverterCapabilities {
            ConverterCapabilities::default()
        }
    }

    #[test]
    fn test_register_indexes_every_format() {
        let mut registry = ConverterRegistry::new();
        let converter = Arc::new(MockConverter::new(
            "multi",
            &[ConversionFormat::Pdf, ConversionFormat::Html],
            true,
        ));
        registry.register_converter(converter.clone()).unwrap();

        let stored = registry.get_converter("multi").unwrap();
        assert!(Arc::ptr_eq(&stored, &(converter.clone() as Arc<dyn Converter>)));
        for format in [ConversionFormat::Pdf, ConversionFormat::Html] {
            let names: Vec<String> = registry
                .get_converters_for_format(format)
                .iter()
                .map(|c| c.name().to_string())
                .collect();
            assert_eq!(names, vec!["multi".to_string()]);
        }
        assert_eq!(
            registry.converter_health("multi").unwrap().status,
            HealthStatus::Healthy
        );
    }

    #[test]
    fn test_register_rejects_invalid_names() {
        let mut registry = ConverterRegistry::new();
        let result = registry.register_converter(Arc::new(MockConverter::new("", &[ConversionFormat::Pdf], true)));
        assert!(matches!(result, Err(KanvertError::Validation { .. })));

        let result =
            registry.register_converter(Arc::new(MockConverter::new("has space", &[ConversionFormat::Pdf], true)));
        assert!(matches!(result, Err(KanvertError::Validation { .. })));
        assert!(registry.is_empty());
    }

    #[test]
    fn test_reregistration_replaces_without_duplicates() {
        let mut registry = ConverterRegistry::new();
        registry
            .register_converter(Arc::new(MockConverter::new("dup", &[ConversionFormat::Pdf], true)))
            .unwrap();
        let second = Arc::new(MockConverter::new("dup", &[ConversionFormat::Pdf, ConversionFormat::Docx], true));
        registry.register_converter(second.clone()).unwrap();

        assert_eq!(registry.len(), 1);
        let stored = registry.get_converter("dup").unwrap();
        assert!(Arc::ptr_eq(&stored, &(second as Arc<dyn Converter>)));
        assert_eq!(registry.get_converters_for_format(ConversionFormat::Pdf).len(), 1);
        assert_eq!(registry.get_converters_for_format(ConversionFormat::Docx).len(), 1);
    }

    #[test]
    fn test_reregistration_prunes_dropped_formats() {
        let mut registry = ConverterRegistry::new();
        registry
            .register_converter(Arc::new(MockConverter::new(
                "shrinking",
                &[ConversionFormat::Pdf, ConversionFormat::Html],
                true,
            )))
            .unwrap();
        registry
            .register_converter(Arc::new(MockConverter::new("shrinking", &[ConversionFormat::Pdf], true)))
            .unwrap();

        assert!(registry.get_converters_for_format(ConversionFormat::Html).is_empty());
        assert_eq!(registry.get_supported_formats(), vec![ConversionFormat::Pdf]);
    }

    #[test]
    fn test_unregister_cascades_and_disposes() {
        let mut registry = ConverterRegistry::new();
        let converter = Arc::new(MockConverter::new("gone", &[ConversionFormat::Pdf, ConversionFormat::Html], true));
        registry.register_converter(converter.clone()).unwrap();
        registry
            .register_converter(Arc::new(MockConverter::new("stays", &[ConversionFormat::Pdf], true)))
            .unwrap();

        assert!(registry.unregister_converter("gone"));
        assert!(registry.get_converter("gone").is_none());
        assert!(registry.get_converters_for_format(ConversionFormat::Html).is_empty());
        assert_eq!(registry.get_supported_formats(), vec![ConversionFormat::Pdf]);
        assert!(converter.disposed.load(Ordering::SeqCst));
    }

    #[test]
    fn test_replacement_disposes_previous_instance() {
        let mut registry = ConverterRegistry::new();
        let original = Arc::new(MockConverter::new("swap", &[ConversionFormat::Pdf], true));
        registry.register_converter(original.clone()).unwrap();

        registry.register_converter(original.clone()).unwrap();
        assert!(!original.disposed.load(Ordering::SeqCst));

        let replacement = Arc::new(MockConverter::new("swap", &[ConversionFormat::Pdf], true));
        registry.register_converter(replacement.clone()).unwrap();
        assert!(original.disposed.load(Ordering::SeqCst));
        assert!(!replacement.disposed.load(Ordering::SeqCst));
        assert_eq!(registry.len(), 1);
    }

    #[test]
    fn test_unregister_unknown_is_noop() {
        let mut registry = ConverterRegistry::new();
        registry
            .register_converter(Arc::new(MockConverter::new("keep", &[ConversionFormat::Pdf], true)))
            .unwrap();
        assert!(!registry.unregister_converter("nonexistent"));
        assert_eq!(registry.list_names(), vec!["keep".to_string()]);
        assert_eq!(registry.get_supported_formats(), vec![ConversionFormat::Pdf]);
    }

    #[test]
    fn test_find_best_converter_first_match_in_registration_order() {
        let mut registry = ConverterRegistry::new();
        registry
            .register_converter(Arc::new(MockConverter::new("first", &[ConversionFormat::Pdf], true)))
            .unwrap();
        registry
            .register_converter(Arc::new(MockConverter::new("second", &[ConversionFormat::Pdf], true)))
            .unwrap();

        let request = ConversionRequest::new("x", ConversionFormat::Pdf);
        assert_eq!(registry.find_best_converter(&request).unwrap().name(), "first");
    }

    #[tokio::test]
    async fn test_convert_named_missing_never_dispatches() {
        let mut registry = ConverterRegistry::new();
        let converter = Arc::new(MockConverter::new("present", &[ConversionFormat::Pdf], true));
        registry.register_converter(converter.clone()).unwrap();

        let request = ConversionRequest::new("x", ConversionFormat::Pdf);
        let err = registry.convert(&request, Some("missing")).await.unwrap_err();
        assert!(matches!(err, KanvertError::Validation { .. }));
        assert!(err.to_string().contains("Converter 'missing' not found"));
        assert_eq!(converter.calls.load(Ordering::SeqCst), 0);
    }

    #[tokio::test]
    async fn test_convert_named_converter_bypasses_selection() {
        let mut registry = ConverterRegistry::new();
        registry
            .register_converter(Arc::new(MockConverter::new("picky", &[ConversionFormat::Pdf], false)))
            .unwrap();

        let request = ConversionRequest::new("x", ConversionFormat::Pdf);
        let result = registry.convert(&request, Some("picky")).await.unwrap();
        assert_eq!(result.job_id(), "picky-job");
    }

    #[test]
    fn test_health_statuses() {
        let mut registry = ConverterRegistry::new();
        registry
            .register_converter(Arc::new(MockConverter::new("ok", &[ConversionFormat::Pdf], true)))
            .unwrap();
        registry
            .register_converter(Arc::new(MockConverter::new("picky", &[ConversionFormat::Html], false)))
            .unwrap();
        let mut broken = MockConverter::new("broken", &[ConversionFormat::Docx], true);
        broken.initialized = false;
        registry.register_converter(Arc::new(broken)).unwrap();
        registry
            .register_converter(Arc::new(MockConverter::new("formatless", &[], true)))
            .unwrap();

        let report = registry.health_check();
        assert_eq!(report.total_converters, 4);
        assert_eq!(report.healthy_converters, 1);
        assert_eq!(report.degraded_converters, 1);
        assert_eq!(report.unhealthy_converters, 2);
        assert_eq!(report.status, HealthStatus::Degraded);
        assert_eq!(report.converters["broken"].status, HealthStatus::Unhealthy);
        assert!(!report.converters["broken"].errors.is_empty());
    }

    #[test]
    fn test_health_unhealthy_without_healthy_converters() {
        let mut registry = ConverterRegistry::new();
        assert_eq!(registry.health_check().status, HealthStatus::Unhealthy);

        registry
            .register_converter(Arc::new(MockConverter::new("picky", &[ConversionFormat::Pdf], false)))
            .unwrap();
        let report = registry.health_check();
        assert_eq!(report.status, HealthStatus::Unhealthy);
        assert_eq!(report.degraded_converters, 1);
    }

    #[test]
    fn test_panicking_probe_is_isolated() {
        let mut registry = ConverterRegistry::new();
        registry.register_converter(Arc::new(PanickingProbe)).unwrap();
        registry
            .register_converter(Arc::new(MockConverter::new("ok", &[ConversionFormat::Pdf], true)))
            .unwrap();

        let report = registry.health_check();
        assert_eq!(report.converters["panicky"].status, HealthStatus::Unhealthy);
        assert_eq!(report.converters["ok"].status, HealthStatus::Healthy);
        assert_eq!(report.status, HealthStatus::Healthy);
    }

    #[test]
    fn test_shutdown_all_disposes_everything() {
        let mut registry = ConverterRegistry::new();
        let a = Arc::new(MockConverter::new("a", &[ConversionFormat::Pdf], true));
        let b = Arc::new(MockConverter::new("b", &[ConversionFormat::Html], true));
        registry.register_converter(a.clone()).unwrap();
        registry.register_converter(b.clone()).unwrap();

        registry.shutdown_all();
        assert!(registry.is_empty());
        assert!(registry.get_supported_formats().is_empty());
        assert!(a.disposed.load(Ordering::SeqCst));
        assert!(b.disposed.load(Ordering::SeqCst));
    }
}
