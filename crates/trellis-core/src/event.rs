//! Event messages flowing through the pack tree.
//!
//! Every event is an [`EventMessage`]: a name plus a closed payload union.
//! Lifecycle events are emitted by packs themselves on registration,
//! composition, and teardown; gateway events are wrapped inbound platform
//! events; custom events are whatever the embedding application emits.

use std::sync::Arc;

use serde_json::Value;

use crate::client::{GatewayBody, PlatformClient};
use crate::locale::ResolvedLocale;

// =============================================================================
// Lifecycle Events
// =============================================================================

/// Typed lifecycle notifications emitted by packs and the orchestrator.
#[derive(Clone, Debug)]
pub enum LifecycleEvent {
    /// A sub-pack was mounted.
    PackLoaded {
        /// Id of the mounted pack.
        id: String,
    },
    /// A sub-pack was unmounted.
    PackUnloaded {
        /// Id of the unmounted pack.
        id: String,
    },
    /// An inspector was mounted.
    InspectorRegistered {
        /// Inspector id.
        id: String,
    },
    /// An inspector was unmounted.
    InspectorUnregistered {
        /// Inspector id.
        id: String,
    },
    /// A locale fragment was registered.
    LocaleLoaded {
        /// Fragment id.
        id: String,
        /// Fragment language.
        language: String,
    },
    /// A locale fragment was removed.
    LocaleUnloaded {
        /// Fragment id.
        id: String,
        /// Fragment language.
        language: String,
    },
    /// A pack finished tearing down.
    PackDestroyed {
        /// Id of the destroyed pack.
        id: String,
    },
    /// A registered event handler returned an error.
    HandlerError {
        /// Event name the handler was registered for.
        event: String,
        /// Error message.
        message: String,
    },
    /// An interaction handler returned an error.
    InteractionHandlerError {
        /// Registration id of the handler.
        id: String,
        /// Error message.
        message: String,
    },
    /// An autocomplete handler failed; an empty choice list was sent.
    AutocompleteError {
        /// Full command name.
        command: String,
        /// Focused option name.
        option: String,
        /// Error message.
        message: String,
    },
    /// Commands were published for a client.
    PublishSuccess {
        /// Client id.
        client_id: String,
    },
    /// Publishing failed for a client.
    PublishFailed {
        /// Client id.
        client_id: String,
        /// Error message.
        message: String,
    },
}

impl LifecycleEvent {
    /// The event name listeners register under.
    pub fn name(&self) -> &'static str {
        match self {
            Self::PackLoaded { .. } => "pack:loaded",
            Self::PackUnloaded { .. } => "pack:unloaded",
            Self::InspectorRegistered { .. } => "inspector:registered",
            Self::InspectorUnregistered { .. } => "inspector:unregistered",
            Self::LocaleLoaded { .. } => "locale:loaded",
            Self::LocaleUnloaded { .. } => "locale:unloaded",
            Self::PackDestroyed { .. } => "pack:destroyed",
            Self::HandlerError { .. } => "handler:error",
            Self::InteractionHandlerError { .. } => "interaction:error",
            Self::AutocompleteError { .. } => "autocomplete:error",
            Self::PublishSuccess { .. } => "publish:success",
            Self::PublishFailed { .. } => "publish:error",
        }
    }
}

// =============================================================================
// Gateway Context
// =============================================================================

/// An inbound platform event enriched for handlers.
#[derive(Clone)]
pub struct GatewayContext {
    /// Client the event arrived on.
    pub client: Arc<dyn PlatformClient>,
    /// Platform event name.
    pub event_name: String,
    /// Locale resolved from the payload's guild/user hints.
    pub locale: ResolvedLocale,
    /// Event body.
    pub body: GatewayBody,
}

impl std::fmt::Debug for GatewayContext {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("GatewayContext")
            .field("client", &self.client.id())
            .field("event_name", &self.event_name)
            .field("locale", &self.locale)
            .finish()
    }
}

// =============================================================================
// Event Messages
// =============================================================================

/// Payload union of one event message.
#[derive(Clone, Debug)]
pub enum EventPayload {
    /// A typed lifecycle notification.
    Lifecycle(LifecycleEvent),
    /// An enriched inbound platform event.
    Gateway(Arc<GatewayContext>),
    /// Application-defined data.
    Custom(Value),
}

/// One named event delivered through the pack tree.
#[derive(Clone, Debug)]
pub struct EventMessage {
    /// Event name listeners register under.
    pub name: String,
    /// The payload.
    pub payload: EventPayload,
}

impl EventMessage {
    /// Wraps a lifecycle event under its canonical name.
    pub fn lifecycle(event: LifecycleEvent) -> Self {
        Self {
            name: event.name().to_string(),
            payload: EventPayload::Lifecycle(event),
        }
    }

    /// Wraps an enriched gateway context under its platform event name.
    pub fn gateway(context: Arc<GatewayContext>) -> Self {
        Self {
            name: context.event_name.clone(),
            payload: EventPayload::Gateway(context),
        }
    }

    /// Wraps application-defined data under an arbitrary name.
    pub fn custom(name: impl Into<String>, data: Value) -> Self {
        Self {
            name: name.into(),
            payload: EventPayload::Custom(data),
        }
    }

    /// The lifecycle event, if this message carries one.
    pub fn as_lifecycle(&self) -> Option<&LifecycleEvent> {
        match &self.payload {
            EventPayload::Lifecycle(event) => Some(event),
            _ => None,
        }
    }

    /// The gateway context, if this message carries one.
    pub fn as_gateway(&self) -> Option<&Arc<GatewayContext>> {
        match &self.payload {
            EventPayload::Gateway(context) => Some(context),
            _ => None,
        }
    }
}
