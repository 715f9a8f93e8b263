//! Command publishing collaborator interface.

use std::sync::Arc;

use async_trait::async_trait;
use tracing::debug;

use crate::client::PlatformClient;
use crate::error::PublishResult;
use crate::interaction::CommandDefinition;

/// Performs the authoritative command upsert against the platform.
///
/// The orchestrator hands the publisher its flattened command definitions
/// (with locale metadata already applied) and an optional guild scope; the
/// publisher owns the REST conversation and reports success or failure per
/// client. Publishing is never retried here — failures go back to the
/// caller and onto the event bus.
#[async_trait]
pub trait CommandPublisher: Send + Sync {
    /// Upserts the given definitions for one client.
    ///
    /// `guild_id` scopes the upsert to a single guild; `None` publishes
    /// globally.
    async fn publish(
        &self,
        client: Arc<dyn PlatformClient>,
        commands: &[CommandDefinition],
        guild_id: Option<&str>,
    ) -> PublishResult<()>;
}

/// Publisher that publishes nothing.
///
/// Used when an embedder only wants local dispatch; every call succeeds and
/// logs what would have been published.
#[derive(Debug, Default, Clone, Copy)]
pub struct NoopPublisher;

#[async_trait]
impl CommandPublisher for NoopPublisher {
    async fn publish(
        &self,
        client: Arc<dyn PlatformClient>,
        commands: &[CommandDefinition],
        guild_id: Option<&str>,
    ) -> PublishResult<()> {
        debug!(
            client = client.id(),
            commands = commands.len(),
            guild = guild_id.unwrap_or("global"),
            "noop publisher: skipping upsert"
        );
        Ok(())
    }
}
