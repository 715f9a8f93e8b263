//! Configuration loading and schema.

mod loader;
mod schema;

pub use loader::{ConfigLoader, Profile};
pub use schema::{ClientConfig, LogFormat, LogLevel, LoggingConfig, TrellisConfig};
