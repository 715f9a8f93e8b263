//! Error types for the Trellis runtime.

use std::path::PathBuf;

use thiserror::Error;

use trellis_core::error::{ClientError, LocaleError, PublishError, RegistryError};

/// Errors that can occur while loading configuration.
#[derive(Debug, Error)]
pub enum ConfigError {
    /// An explicitly named configuration file does not exist.
    #[error("configuration file not found: {0}")]
    FileNotFound(PathBuf),

    /// Configuration could not be parsed or extracted.
    #[error("configuration error: {0}")]
    ParseError(String),
}

/// Result type for configuration operations.
pub type ConfigResult<T> = Result<T, ConfigError>;

/// Errors surfaced by the runtime orchestration layer.
#[derive(Debug, Error)]
pub enum RuntimeError {
    /// Configuration loading failed.
    #[error(transparent)]
    Config(#[from] ConfigError),

    /// A registration failed while assembling the tree.
    #[error(transparent)]
    Registry(#[from] RegistryError),

    /// A locale file failed to load.
    #[error(transparent)]
    Locale(#[from] LocaleError),

    /// A platform client failed to log in or hand over its events.
    #[error(transparent)]
    Client(#[from] ClientError),

    /// Publishing failed for one or more clients.
    #[error(transparent)]
    Publish(#[from] PublishError),
}

/// Result type for runtime operations.
pub type RuntimeResult<T> = Result<T, RuntimeError>;
