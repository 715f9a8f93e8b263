//! Shared mocks for runtime tests.

use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};

use async_trait::async_trait;
use parking_lot::Mutex;
use tokio::sync::mpsc;

use trellis_core::client::{GatewayEvent, PlatformClient};
use trellis_core::error::{ClientError, ClientResult, PublishError, PublishResult};
use trellis_core::interaction::{AutocompleteChoice, CommandDefinition, InteractionPayload};
use trellis_core::publish::CommandPublisher;

/// A platform client fed from a test-held channel sender.
pub(crate) struct MockClient {
    id: String,
    sender: mpsc::Sender<GatewayEvent>,
    receiver: Mutex<Option<mpsc::Receiver<GatewayEvent>>>,
    pub logins: AtomicUsize,
    pub autocomplete_responses: Mutex<Vec<Vec<AutocompleteChoice>>>,
}

impl MockClient {
    pub fn new(id: &str) -> Arc<Self> {
        let (sender, receiver) = mpsc::channel(16);
        Arc::new(Self {
            id: id.to_string(),
            sender,
            receiver: Mutex::new(Some(receiver)),
            logins: AtomicUsize::new(0),
            autocomplete_responses: Mutex::new(Vec::new()),
        })
    }

    /// Sender the test uses to feed inbound events.
    pub fn sender(&self) -> mpsc::Sender<GatewayEvent> {
        self.sender.clone()
    }
}

#[async_trait]
impl PlatformClient for MockClient {
    fn id(&self) -> &str {
        &self.id
    }

    async fn login(&self) -> ClientResult<()> {
        self.logins.fetch_add(1, Ordering::SeqCst);
        Ok(())
    }

    fn take_events(&self) -> ClientResult<mpsc::Receiver<GatewayEvent>> {
        self.receiver.lock().take().ok_or(ClientError::EventsTaken)
    }

    async fn respond_autocomplete(
        &self,
        _payload: &InteractionPayload,
        choices: &[AutocompleteChoice],
    ) -> ClientResult<()> {
        self.autocomplete_responses.lock().push(choices.to_vec());
        Ok(())
    }
}

/// A publisher that records calls and fails for selected client ids.
#[derive(Default)]
pub(crate) struct RecordingPublisher {
    pub fail_for: Vec<String>,
    pub calls: Mutex<Vec<(String, usize, Option<String>)>>,
}

impl RecordingPublisher {
    pub fn failing_for(ids: &[&str]) -> Arc<Self> {
        Arc::new(Self {
            fail_for: ids.iter().map(|s| s.to_string()).collect(),
            ..Default::default()
        })
    }
}

#[async_trait]
impl CommandPublisher for RecordingPublisher {
    async fn publish(
        &self,
        client: Arc<dyn PlatformClient>,
        commands: &[CommandDefinition],
        guild_id: Option<&str>,
    ) -> PublishResult<()> {
        self.calls.lock().push((
            client.id().to_string(),
            commands.len(),
            guild_id.map(str::to_string),
        ));
        if self.fail_for.iter().any(|id| id == client.id()) {
            return Err(PublishError::Transport("simulated outage".to_string()));
        }
        Ok(())
    }
}
