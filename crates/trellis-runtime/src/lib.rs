//! Runtime orchestration layer of the Trellis bot framework.
//!
//! Owns the [`Trellis`] root orchestrator — flattened dispatch caches,
//! client handles, publish flow, component building — plus configuration
//! loading, logging setup, and locale file reading.

pub mod config;
pub mod dispatch;
pub mod error;
pub mod locale_files;
pub mod logging;
pub mod root;

#[cfg(test)]
mod test_support;

pub use config::{ClientConfig, ConfigLoader, LogFormat, LogLevel, LoggingConfig, TrellisConfig};
pub use dispatch::MAX_AUTOCOMPLETE_CHOICES;
pub use error::{ConfigError, ConfigResult, RuntimeError, RuntimeResult};
pub use logging::LoggingBuilder;
pub use root::{ComponentBuild, Trellis, TrellisBuilder};
