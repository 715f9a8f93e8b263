//! Secondary pattern/id-keyed handler registries.
//!
//! An [`Inspector`] is consulted by the root dispatcher only when no direct
//! registration matched an inbound interaction. Unlike pack registrations,
//! inspector routes are grouped by interaction category on one object, and
//! handler errors never escape [`emit`](Inspector::emit) — scanning several
//! inspectors must stay safe even when one of them misbehaves.

use std::collections::HashMap;
use std::sync::Arc;

use parking_lot::RwLock;
use serde_json::Value;
use tracing::warn;

use trellis_core::error::{RegistryError, RegistryResult};
use trellis_core::interaction::InteractionKind;
use trellis_core::pattern;
use trellis_core::Disposer;

use crate::context::{HandlerOutput, InteractionContext, InteractionHandler};

/// How far down the tree an inspector reaches.
///
/// Declarative metadata only: the root dispatcher decides which inspectors
/// apply during its scan; the inspector itself never checks it.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum InspectorDomain {
    /// Only the pack the inspector is mounted on.
    CurrentPack,
    /// The mounted pack and its whole subtree.
    AllSubPacks,
}

#[derive(Default)]
struct InspectorState {
    routes: HashMap<(InteractionKind, String), InteractionHandler>,
    /// Reverse map: literal combination -> original pattern (commands only).
    patterns: HashMap<String, String>,
}

/// A pattern/id-keyed handler registry for fallback dispatch.
pub struct Inspector {
    id: String,
    domain: InspectorDomain,
    state: Arc<RwLock<InspectorState>>,
}

impl Inspector {
    /// Creates an empty inspector.
    pub fn new(id: impl Into<String>, domain: InspectorDomain) -> Arc<Self> {
        Arc::new(Self {
            id: id.into(),
            domain,
            state: Arc::new(RwLock::new(InspectorState::default())),
        })
    }

    /// The inspector id.
    pub fn id(&self) -> &str {
        &self.id
    }

    /// The declared domain.
    pub fn domain(&self) -> InspectorDomain {
        self.domain
    }

    fn boxed<F, Fut>(handler: F) -> InteractionHandler
    where
        F: Fn(Arc<InteractionContext>) -> Fut + Send + Sync + 'static,
        Fut: Future<Output = HandlerOutput> + Send + 'static,
    {
        Arc::new(move |ctx| -> futures::future::BoxFuture<'static, HandlerOutput> {
            Box::pin(handler(ctx))
        })
    }

    fn register(
        &self,
        kind: InteractionKind,
        id: &str,
        handler: InteractionHandler,
    ) -> RegistryResult<Disposer> {
        let key = (kind, id.to_string());
        {
            let mut state = self.state.write();
            if state.routes.contains_key(&key) {
                return Err(RegistryError::DuplicateId {
                    owner: self.id.clone(),
                    id: id.to_string(),
                });
            }
            state.routes.insert(key.clone(), handler);
        }

        let state = Arc::clone(&self.state);
        Ok(Disposer::new(move || {
            state.write().routes.remove(&key);
        }))
    }

    /// Registers a pattern-keyed command route.
    ///
    /// The pattern is expanded and validated like a pack command; every
    /// literal combination routes back to the one handler keyed by the
    /// original pattern.
    pub fn command<F, Fut>(&self, pattern_str: &str, handler: F) -> RegistryResult<Disposer>
    where
        F: Fn(Arc<InteractionContext>) -> Fut + Send + Sync + 'static,
        Fut: Future<Output = HandlerOutput> + Send + 'static,
    {
        let combinations = pattern::expand(pattern_str);
        pattern::validate(pattern_str, &combinations)?;

        {
            let state = self.state.read();
            if let Some(literal) = combinations.iter().find(|c| state.patterns.contains_key(*c)) {
                return Err(RegistryError::DuplicateId {
                    owner: self.id.clone(),
                    id: literal.clone(),
                });
            }
        }

        let route = self.register(
            InteractionKind::ChatInput,
            pattern_str,
            Self::boxed(handler),
        )?;
        {
            let mut state = self.state.write();
            for combination in &combinations {
                state
                    .patterns
                    .insert(combination.clone(), pattern_str.to_string());
            }
        }

        let state = Arc::clone(&self.state);
        let pattern_owned = pattern_str.to_string();
        Ok(Disposer::new(move || {
            route.dispose();
            state
                .write()
                .patterns
                .retain(|_, pattern| pattern != &pattern_owned);
        }))
    }

    /// Registers a user context-menu route by name.
    pub fn user_context_menu<F, Fut>(&self, name: &str, handler: F) -> RegistryResult<Disposer>
    where
        F: Fn(Arc<InteractionContext>) -> Fut + Send + Sync + 'static,
        Fut: Future<Output = HandlerOutput> + Send + 'static,
    {
        self.register(InteractionKind::UserContextMenu, name, Self::boxed(handler))
    }

    /// Registers a message context-menu route by name.
    pub fn message_context_menu<F, Fut>(&self, name: &str, handler: F) -> RegistryResult<Disposer>
    where
        F: Fn(Arc<InteractionContext>) -> Fut + Send + Sync + 'static,
        Fut: Future<Output = HandlerOutput> + Send + 'static,
    {
        self.register(
            InteractionKind::MessageContextMenu,
            name,
            Self::boxed(handler),
        )
    }

    /// Registers a button route by component id.
    pub fn button<F, Fut>(&self, id: &str, handler: F) -> RegistryResult<Disposer>
    where
        F: Fn(Arc<InteractionContext>) -> Fut + Send + Sync + 'static,
        Fut: Future<Output = HandlerOutput> + Send + 'static,
    {
        self.register(InteractionKind::Button, id, Self::boxed(handler))
    }

    /// Registers a select-menu route by component id.
    pub fn select_menu<F, Fut>(
        &self,
        kind: InteractionKind,
        id: &str,
        handler: F,
    ) -> RegistryResult<Disposer>
    where
        F: Fn(Arc<InteractionContext>) -> Fut + Send + Sync + 'static,
        Fut: Future<Output = HandlerOutput> + Send + 'static,
    {
        debug_assert!(kind.is_select());
        self.register(kind, id, Self::boxed(handler))
    }

    /// Registers a modal route by component id.
    pub fn modal<F, Fut>(&self, id: &str, handler: F) -> RegistryResult<Disposer>
    where
        F: Fn(Arc<InteractionContext>) -> Fut + Send + Sync + 'static,
        Fut: Future<Output = HandlerOutput> + Send + 'static,
    {
        self.register(InteractionKind::Modal, id, Self::boxed(handler))
    }

    /// Looks up and invokes the handler for `(kind, id)`.
    ///
    /// For the command category, `id` is a literal combination and resolves
    /// through the reverse pattern map. Returns the handler's value, or
    /// `None` when nothing matched. Handler errors are swallowed here —
    /// logged, never propagated — so the caller can keep scanning other
    /// inspectors.
    pub async fn emit(
        &self,
        kind: InteractionKind,
        id: &str,
        ctx: Arc<InteractionContext>,
    ) -> Option<Value> {
        let handler = {
            let state = self.state.read();
            let key = if kind == InteractionKind::ChatInput {
                state.patterns.get(id)?.clone()
            } else {
                id.to_string()
            };
            Arc::clone(state.routes.get(&(kind, key))?)
        };

        match handler(ctx).await {
            Ok(value) => value,
            Err(error) => {
                warn!(
                    inspector = %self.id,
                    kind = %kind,
                    id,
                    %error,
                    "inspector handler failed; continuing"
                );
                None
            }
        }
    }
}

impl std::fmt::Debug for Inspector {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Inspector")
            .field("id", &self.id)
            .field("domain", &self.domain)
            .field("routes", &self.state.read().routes.len())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use trellis_core::interaction::InteractionPayload;
    use trellis_core::locale::ResolvedLocale;

    mod mock {
        use super::*;
        use async_trait::async_trait;
        use tokio::sync::mpsc;
        use trellis_core::client::{GatewayEvent, PlatformClient};
        use trellis_core::error::{ClientError, ClientResult};
        use trellis_core::interaction::AutocompleteChoice;

        pub struct MockClient;

        #[async_trait]
        impl PlatformClient for MockClient {
            fn id(&self) -> &str {
                "mock"
            }

            async fn login(&self) -> ClientResult<()> {
                Ok(())
            }

            fn take_events(&self) -> ClientResult<mpsc::Receiver<GatewayEvent>> {
                Err(ClientError::EventsTaken)
            }

            async fn respond_autocomplete(
                &self,
                _payload: &InteractionPayload,
                _choices: &[AutocompleteChoice],
            ) -> ClientResult<()> {
                Ok(())
            }
        }
    }

    fn context(kind: InteractionKind, matched: &str) -> Arc<InteractionContext> {
        Arc::new(InteractionContext::assemble(
            Arc::new(mock::MockClient),
            ResolvedLocale::empty("en"),
            InteractionPayload::new(kind),
            matched,
            None,
        ))
    }

    #[tokio::test]
    async fn test_command_literal_resolves_to_pattern_handler() {
        let inspector = Inspector::new("test", InspectorDomain::AllSubPacks);
        let calls = Arc::new(AtomicUsize::new(0));
        let c = Arc::clone(&calls);
        inspector
            .command("mod (ban|kick)", move |_| {
                let c = Arc::clone(&c);
                async move {
                    c.fetch_add(1, Ordering::SeqCst);
                    Ok(Some(json!("handled")))
                }
            })
            .unwrap();

        let result = inspector
            .emit(
                InteractionKind::ChatInput,
                "mod kick",
                context(InteractionKind::ChatInput, "mod kick"),
            )
            .await;

        assert_eq!(result, Some(json!("handled")));
        assert_eq!(calls.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn test_unmatched_emit_returns_none() {
        let inspector = Inspector::new("test", InspectorDomain::CurrentPack);
        let result = inspector
            .emit(
                InteractionKind::Button,
                "missing",
                context(InteractionKind::Button, "missing"),
            )
            .await;
        assert!(result.is_none());
    }

    #[tokio::test]
    async fn test_handler_errors_are_swallowed() {
        let inspector = Inspector::new("test", InspectorDomain::AllSubPacks);
        inspector
            .button("boom", |_| async { Err("exploded".into()) })
            .unwrap();

        let result = inspector
            .emit(
                InteractionKind::Button,
                "boom",
                context(InteractionKind::Button, "boom"),
            )
            .await;
        assert!(result.is_none());
    }

    #[test]
    fn test_duplicate_routes_rejected() {
        let inspector = Inspector::new("test", InspectorDomain::CurrentPack);
        inspector.button("b", |_| async { Ok(None) }).unwrap();
        let err = inspector.button("b", |_| async { Ok(None) }).unwrap_err();
        assert!(matches!(err, RegistryError::DuplicateId { .. }));
    }

    #[test]
    fn test_overlapping_command_literals_rejected() {
        let inspector = Inspector::new("test", InspectorDomain::CurrentPack);
        inspector
            .command("mod (ban|kick)", |_| async { Ok(None) })
            .unwrap();
        let err = inspector
            .command("mod (kick|mute)", |_| async { Ok(None) })
            .unwrap_err();
        assert!(matches!(err, RegistryError::DuplicateId { .. }));
    }

    #[test]
    fn test_dispose_removes_route() {
        let inspector = Inspector::new("test", InspectorDomain::CurrentPack);
        let disposer = inspector.button("b", |_| async { Ok(None) }).unwrap();
        disposer.dispose();

        let result = tokio_test::block_on(inspector.emit(
            InteractionKind::Button,
            "b",
            context(InteractionKind::Button, "b"),
        ));
        assert!(result.is_none());
    }
}
