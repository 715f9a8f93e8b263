//! Core registries and routing primitives for the Trellis bot framework.
//!
//! This crate holds everything the composable layer and the orchestrator
//! build on:
//!
//! - [`pattern`] — the command-name grammar and its expansion
//! - [`bus`] — the result-collecting event bus
//! - [`locale`] — locale fragments, merged trees, and resolution
//! - [`codec`] — custom-data encoding inside component identifiers
//! - [`interaction`] — interaction kinds, option schemas, publish descriptors
//! - [`client`] / [`publish`] — collaborator interfaces implemented outside
//!   this workspace
//! - [`event`] — the event-message union flowing through the pack tree
//! - [`error`] — registration and collaborator error types
//!
//! The platform connection itself (gateway transport, REST) is deliberately
//! absent: the core routes, it does not speak wire protocols.

pub mod bus;
pub mod client;
pub mod codec;
pub mod disposer;
pub mod error;
pub mod event;
pub mod interaction;
pub mod locale;
pub mod pattern;
pub mod publish;

/// Brand constant: event-name prefix and the reserved root pack id.
pub const BRAND: &str = "trellis";

pub use bus::{ListenerHandle, ResultBus};
pub use client::{GatewayBody, GatewayEvent, PlatformClient};
pub use codec::{CodecEntry, CodecRegistry, DataValue, DecodedId};
pub use disposer::Disposer;
pub use error::{
    BoxError, ClientError, ClientResult, CodecError, CodecResult, LocaleError, LocaleResult,
    PublishError, PublishResult, RegistryError, RegistryResult,
};
pub use event::{EventMessage, EventPayload, GatewayContext, LifecycleEvent};
pub use interaction::{
    AutocompleteChoice, CommandChoice, CommandDefinition, CommandOption, CommandOptionKind,
    ComponentDescriptor, FocusedOption, InteractionKind, InteractionPayload,
};
pub use locale::{
    CommandLocalization, InteractionLocaleFragment, LocaleFragment, LocaleNode, LocaleStore,
    LocaleText, OptionLocalization, ResolvedLocale, DEFAULT_LANGUAGE,
};
pub use publish::{CommandPublisher, NoopPublisher};
