//! Configuration schema definitions.

use std::collections::HashMap;

use serde::{Deserialize, Serialize};

use trellis_core::locale::DEFAULT_LANGUAGE;

/// Root configuration structure.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TrellisConfig {
    /// Language every other language falls back to.
    #[serde(default = "default_language")]
    pub default_language: String,

    /// Platform client configurations.
    #[serde(default)]
    pub clients: Vec<ClientConfig>,

    /// Logging settings.
    #[serde(default)]
    pub logging: LoggingConfig,
}

impl Default for TrellisConfig {
    fn default() -> Self {
        Self {
            default_language: default_language(),
            clients: Vec::new(),
            logging: LoggingConfig::default(),
        }
    }
}

fn default_language() -> String {
    DEFAULT_LANGUAGE.to_string()
}

/// Configuration for one platform client.
///
/// The runtime only matches these against the client handles the embedder
/// supplies; the credential and settings are consumed by the client
/// implementation itself.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ClientConfig {
    /// Unique identifier for this client.
    pub id: String,

    /// Platform credential, usually injected via `TRELLIS_CLIENTS__...`.
    #[serde(default)]
    pub token: Option<String>,

    /// Whether this client should be started.
    #[serde(default = "default_enabled")]
    pub enabled: bool,

    /// Client-specific settings, passed through opaquely.
    #[serde(default)]
    pub settings: HashMap<String, serde_json::Value>,
}

fn default_enabled() -> bool {
    true
}

/// Log verbosity level.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum LogLevel {
    Trace,
    Debug,
    #[default]
    Info,
    Warn,
    Error,
}

impl LogLevel {
    /// The lowercase name used in filter directives.
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Trace => "trace",
            Self::Debug => "debug",
            Self::Info => "info",
            Self::Warn => "warn",
            Self::Error => "error",
        }
    }

    /// Converts to a `tracing` level.
    pub fn to_tracing_level(self) -> tracing::Level {
        match self {
            Self::Trace => tracing::Level::TRACE,
            Self::Debug => tracing::Level::DEBUG,
            Self::Info => tracing::Level::INFO,
            Self::Warn => tracing::Level::WARN,
            Self::Error => tracing::Level::ERROR,
        }
    }
}

impl std::fmt::Display for LogLevel {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Log output format.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum LogFormat {
    /// Compact single-line output.
    #[default]
    Compact,
    /// Default `tracing` formatting.
    Full,
    /// Multi-line human-friendly output.
    Pretty,
    /// JSON output (requires the `json-log` feature).
    Json,
}

/// Logging settings.
#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct LoggingConfig {
    /// Global log level.
    #[serde(default)]
    pub level: LogLevel,

    /// Output format.
    #[serde(default)]
    pub format: LogFormat,

    /// Per-module level overrides (`"trellis_runtime" -> debug`).
    #[serde(default)]
    pub filters: HashMap<String, LogLevel>,

    /// Include thread ids in output.
    #[serde(default)]
    pub thread_ids: bool,

    /// Include file and line numbers in output.
    #[serde(default)]
    pub file_location: bool,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults() {
        let config = TrellisConfig::default();
        assert_eq!(config.default_language, "en");
        assert!(config.clients.is_empty());
        assert_eq!(config.logging.level, LogLevel::Info);
    }

    #[test]
    fn test_client_enabled_by_default() {
        let client: ClientConfig =
            serde_json::from_value(serde_json::json!({"id": "main"})).unwrap();
        assert!(client.enabled);
        assert!(client.token.is_none());
    }
}
