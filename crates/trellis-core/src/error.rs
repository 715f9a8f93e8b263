//! Unified error types for the Trellis core.
//!
//! Registration errors are synchronous and thrown at the registration call
//! site; they are the only errors expected to abort application startup.
//! Dispatch-time failures never surface here — they are reported through
//! error events on the bus.

use thiserror::Error;

/// Boxed error type carried by user handlers.
pub type BoxError = Box<dyn std::error::Error + Send + Sync>;

// =============================================================================
// Registration Errors
// =============================================================================

/// Errors raised while registering resources on a pack or inspector.
#[derive(Debug, Clone, Error)]
pub enum RegistryError {
    /// The id is already taken within this container.
    ///
    /// Commands and components share one namespace per pack.
    #[error("duplicate id '{id}' in '{owner}'")]
    DuplicateId {
        /// Owning pack or inspector id.
        owner: String,
        /// The rejected id.
        id: String,
    },

    /// The pack id is claimed by the root orchestrator.
    #[error("pack id '{id}' is reserved for the root")]
    ReservedId {
        /// The rejected id.
        id: String,
    },

    /// A command pattern expanded to zero combinations.
    #[error("pattern '{pattern}' expands to zero combinations")]
    EmptyPattern {
        /// The offending pattern.
        pattern: String,
    },

    /// A combination exceeds the platform word-count limit.
    #[error("combination '{combination}' has {words} words (limit {limit})")]
    TooManyWords {
        /// The offending combination.
        combination: String,
        /// Number of words in the combination.
        words: usize,
        /// The platform limit.
        limit: usize,
    },

    /// A word in a combination exceeds the platform length limit.
    #[error("word '{word}' in '{combination}' is {len} characters (limit {limit})")]
    WordTooLong {
        /// The combination containing the word.
        combination: String,
        /// The offending word.
        word: String,
        /// Length in characters.
        len: usize,
        /// The platform limit.
        limit: usize,
    },

    /// No registration exists for the given id.
    #[error("no registration with id '{id}'")]
    UnknownId {
        /// The missing id.
        id: String,
    },

    /// The id resolves to a registration of the wrong kind.
    #[error("registration '{id}' is not a {expected}")]
    KindMismatch {
        /// The id that was looked up.
        id: String,
        /// What the caller expected ("component", "chat input command", ...).
        expected: &'static str,
    },
}

/// Result type for registration operations.
pub type RegistryResult<T> = Result<T, RegistryError>;

// =============================================================================
// Locale Errors
// =============================================================================

/// Errors raised while loading or shaping locale data.
#[derive(Debug, Clone, Error)]
pub enum LocaleError {
    /// The file extension maps to no enabled format.
    #[error("unsupported locale file format: {path}")]
    UnsupportedFormat {
        /// Path as given by the caller.
        path: String,
    },

    /// The file does not exist or could not be read.
    #[error("locale file not found: {path}")]
    MissingPath {
        /// Path as given by the caller.
        path: String,
    },

    /// The document parsed but does not have the expected shape.
    #[error("invalid locale data in {path}: {reason}")]
    InvalidData {
        /// Path or fragment id the data came from.
        path: String,
        /// What went wrong.
        reason: String,
    },

    /// A `$`-rooted selector matched nothing in the document.
    #[error("selector '{selector}' matched nothing")]
    SelectorMiss {
        /// The selector that missed.
        selector: String,
    },
}

/// Result type for locale operations.
pub type LocaleResult<T> = Result<T, LocaleError>;

// =============================================================================
// Client / Publish Errors
// =============================================================================

/// Errors reported by a platform client handle.
#[derive(Debug, Clone, Error)]
pub enum ClientError {
    /// The client is not connected.
    #[error("client is not connected")]
    NotConnected,

    /// Login was rejected by the platform.
    #[error("login failed: {0}")]
    LoginFailed(String),

    /// The inbound event stream was already handed out.
    #[error("event stream already taken")]
    EventsTaken,

    /// Any other client-side failure.
    #[error("{0}")]
    Other(String),
}

/// Result type for client operations.
pub type ClientResult<T> = Result<T, ClientError>;

/// Errors reported while publishing command definitions.
#[derive(Debug, Clone, Error)]
pub enum PublishError {
    /// The platform rejected the upsert.
    #[error("publish rejected: {0}")]
    Rejected(String),

    /// Network or transport failure.
    #[error("publish transport failure: {0}")]
    Transport(String),

    /// One or more clients failed; every client was still attempted.
    #[error("publish failed for {failed} of {attempted} client(s)")]
    Aggregate {
        /// Total clients attempted.
        attempted: usize,
        /// Number of failing clients.
        failed: usize,
        /// `(client id, error message)` per failure.
        errors: Vec<(String, String)>,
    },
}

/// Result type for publish operations.
pub type PublishResult<T> = Result<T, PublishError>;

// =============================================================================
// Codec Errors
// =============================================================================

/// Errors raised while configuring the component codec registry.
#[derive(Debug, Clone, Error)]
pub enum CodecError {
    /// The tag character is already claimed by another entry.
    #[error("codec tag {tag:?} already registered for kind '{kind}'")]
    DuplicateTag {
        /// The contested tag character.
        tag: char,
        /// Kind that already owns it.
        kind: &'static str,
    },

    /// The kind name is already claimed by another entry.
    #[error("codec kind '{kind}' already registered")]
    DuplicateKind {
        /// The contested kind name.
        kind: &'static str,
    },
}

/// Result type for codec registry operations.
pub type CodecResult<T> = Result<T, CodecError>;
