//! Platform client collaborator interface.
//!
//! The gateway transport (connection, heartbeat, rate limits) lives outside
//! this workspace. A [`PlatformClient`] is the handle the orchestrator holds
//! per configured client id: it can log in, hand over its inbound event
//! stream once, and answer autocomplete queries. Everything else about the
//! platform connection is the implementor's business.

use async_trait::async_trait;
use serde_json::Value;
use tokio::sync::mpsc;

use crate::error::ClientResult;
use crate::interaction::{AutocompleteChoice, InteractionPayload};

/// One inbound low-level event from the platform.
#[derive(Clone, Debug)]
pub struct GatewayEvent {
    /// Platform event name, e.g. `"messageCreate"` or `"interactionCreate"`.
    pub name: String,
    /// Event body.
    pub body: GatewayBody,
}

/// Body of a gateway event.
#[derive(Clone, Debug)]
pub enum GatewayBody {
    /// An inbound interaction with its documented fields extracted.
    Interaction(InteractionPayload),
    /// Any other event, passed through opaquely.
    Raw(Value),
}

impl GatewayEvent {
    /// Wraps an interaction payload under the conventional event name.
    pub fn interaction(payload: InteractionPayload) -> Self {
        Self {
            name: "interactionCreate".to_string(),
            body: GatewayBody::Interaction(payload),
        }
    }

    /// Wraps an opaque platform event.
    pub fn raw(name: impl Into<String>, payload: Value) -> Self {
        Self {
            name: name.into(),
            body: GatewayBody::Raw(payload),
        }
    }

    /// The interaction payload, if this event carries one.
    pub fn as_interaction(&self) -> Option<&InteractionPayload> {
        match &self.body {
            GatewayBody::Interaction(payload) => Some(payload),
            GatewayBody::Raw(_) => None,
        }
    }
}

/// Handle to one platform connection.
#[async_trait]
pub trait PlatformClient: Send + Sync {
    /// Configured client id.
    fn id(&self) -> &str;

    /// Authenticates against the platform.
    async fn login(&self) -> ClientResult<()>;

    /// Hands over the inbound event stream.
    ///
    /// Called once by the orchestrator at start; a second call returns
    /// [`ClientError::EventsTaken`](crate::error::ClientError::EventsTaken).
    fn take_events(&self) -> ClientResult<mpsc::Receiver<GatewayEvent>>;

    /// Answers an autocomplete query with up to 25 choices.
    async fn respond_autocomplete(
        &self,
        payload: &InteractionPayload,
        choices: &[AutocompleteChoice],
    ) -> ClientResult<()>;
}
