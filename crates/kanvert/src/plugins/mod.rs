//! Converter plugin system.
//!
//! Conversion is organised around three pieces:
//!
//! - [`Converter`] - the capability surface of a live converter (convert,
//!   validate, capabilities, initialization state)
//! - [`ConverterPlugin`] - a descriptor bundling a converter's name,
//!   dependencies, availability probe, and factory method
//! - [`ConverterFactory`] and [`ConverterRegistry`] - discovery and
//!   instantiation, then name and format lookup with health checks
//!
//! # Lifecycle
//!
//! ```rust
//! use kanvert::converters::ConverterSettings;
//! use kanvert::plugins::{ConverterFactory, ConverterRegistry};
//!
//! let mut factory = ConverterFactory::with_builtin_plugins(&ConverterSettings::default());
//! factory.discover_plugins();
//!
//! let mut registry = ConverterRegistry::new();
//! for (_, converter) in factory.create_all_available_converters() {
//!     registry.register_converter(converter)?;
//! }
//!
//! let report = registry.health_check();
//! assert_eq!(
//!     report.healthy_converters + report.degraded_converters + report.unhealthy_converters,
//!     report.total_converters
//! );
//! # Ok::<(), kanvert::KanvertError>(())
//! ```
//!
//! Converters are shared as `Arc<dyn Converter>`; a converter may serve
//! concurrent requests, so any per-job state lives in the job, not in `self`.

pub mod builtin;
pub mod descriptor;
pub mod factory;
pub mod registry;
pub mod traits;

pub use builtin::{BuiltinPlugin, builtin_plugins};
pub use descriptor::{ConverterPlugin, PluginMetadata};
pub use factory::{ConverterFactory, FactoryHealthReport, PluginHealth};
pub use registry::{ConverterHealth, ConverterRegistry, RegistryHealthReport, probe_converter_health};
pub use traits::{Converter, Disposable};
