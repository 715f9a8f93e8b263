//! Composable containers ("packs").
//!
//! A [`Pack`] owns five keyed collections — interactions, event listeners,
//! locale fragments, sub-packs, and inspectors — and can be mounted into
//! another pack to form a tree. Registration methods reject duplicate ids at
//! the call site and return a [`Disposer`] that reverses exactly that
//! registration. Events propagate depth-first through the whole subtree;
//! the root orchestrator flattens the tree into dispatch caches on
//! `refresh()`.

use std::collections::HashMap;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Weak};

use futures::future::BoxFuture;
use parking_lot::RwLock;
use serde_json::Value;
use tracing::{debug, error};

use trellis_core::bus::{ListenerHandle, ResultBus};
use trellis_core::error::{BoxError, RegistryError, RegistryResult};
use trellis_core::event::{EventMessage, LifecycleEvent};
use trellis_core::interaction::{CommandOption, InteractionKind};
use trellis_core::locale::{InteractionLocaleFragment, LocaleFragment, LocaleStore};
use trellis_core::pattern;
use trellis_core::{Disposer, BRAND};

use crate::context::{AutocompleteHandler, HandlerOutput, InteractionContext, InteractionHandler};
use crate::inspector::Inspector;

// =============================================================================
// Registration Configs
// =============================================================================

/// Configuration for a slash command registration.
#[derive(Clone, Debug)]
pub struct ChatInput {
    /// Author-assigned id, unique per pack across commands and components.
    pub id: String,
    /// Command-name pattern (`"mod (ban|kick) (user)?"`).
    pub pattern: String,
    /// Description shown by the platform.
    pub description: String,
    /// Declarative option schemas.
    pub options: Vec<CommandOption>,
}

/// Configuration for a context-menu command registration.
#[derive(Clone, Debug)]
pub struct ContextMenu {
    /// Author-assigned id, unique per pack.
    pub id: String,
    /// Display name shown in the context menu.
    pub name: String,
}

/// Configuration for a component registration (buttons, selects, modals).
#[derive(Clone, Debug)]
pub struct Component {
    /// Author-assigned id, unique per pack.
    pub id: String,
    /// Declarative platform options (style, label, choices, ...), passed
    /// through opaquely and merged into built descriptors.
    pub options: Value,
}

/// One live interaction registration.
pub struct InteractionRegistration {
    /// Author-assigned id.
    pub id: String,
    /// Interaction category.
    pub kind: InteractionKind,
    /// Original pattern, for the chat-input kind.
    pub pattern: Option<String>,
    /// Every literal name the registration answers to (command family).
    pub combinations: Vec<String>,
    /// Description (command family).
    pub description: String,
    /// Declarative option schemas (chat input).
    pub options: Vec<CommandOption>,
    /// Declarative component options (component family).
    pub component_options: Value,
    /// The handler.
    pub handler: InteractionHandler,
}

impl std::fmt::Debug for InteractionRegistration {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("InteractionRegistration")
            .field("id", &self.id)
            .field("kind", &self.kind)
            .field("combinations", &self.combinations)
            .finish()
    }
}

// =============================================================================
// Extensions
// =============================================================================

/// Anything that can be mounted into a pack.
pub enum PackExtension {
    /// A sub-pack.
    Pack(Arc<Pack>),
    /// An inspector.
    Inspector(Arc<Inspector>),
    /// A content locale fragment.
    Locale(LocaleFragment),
    /// An interaction locale fragment.
    InteractionLocale(InteractionLocaleFragment),
}

impl From<Arc<Pack>> for PackExtension {
    fn from(pack: Arc<Pack>) -> Self {
        Self::Pack(pack)
    }
}

impl From<Arc<Inspector>> for PackExtension {
    fn from(inspector: Arc<Inspector>) -> Self {
        Self::Inspector(inspector)
    }
}

impl From<LocaleFragment> for PackExtension {
    fn from(fragment: LocaleFragment) -> Self {
        Self::Locale(fragment)
    }
}

impl From<InteractionLocaleFragment> for PackExtension {
    fn from(fragment: InteractionLocaleFragment) -> Self {
        Self::InteractionLocale(fragment)
    }
}

// =============================================================================
// Pack
// =============================================================================

#[derive(Default)]
struct PackState {
    interactions: Vec<Arc<InteractionRegistration>>,
    autocomplete: HashMap<(String, String), AutocompleteHandler>,
    event_buses: HashMap<String, ResultBus<EventMessage, Value>>,
    /// Synthetic registration id -> (event name, bus handle).
    event_index: HashMap<String, (String, ListenerHandle)>,
    children: Vec<Arc<Pack>>,
    inspectors: Vec<Arc<Inspector>>,
    /// Everything teardown must unwind, in registration order.
    disposers: Vec<Disposer>,
}

/// Snapshot of one pack's collections, taken by the root while flattening.
pub struct PackSnapshot {
    /// Interaction registrations in registration order.
    pub interactions: Vec<Arc<InteractionRegistration>>,
    /// Autocomplete handlers keyed by (registration id, option name).
    pub autocomplete: Vec<(String, String, AutocompleteHandler)>,
    /// Event buses by name.
    pub event_buses: Vec<(String, ResultBus<EventMessage, Value>)>,
    /// Mounted inspectors in mount order.
    pub inspectors: Vec<Arc<Inspector>>,
    /// Mounted sub-packs in mount order.
    pub children: Vec<Arc<Pack>>,
}

/// A composable container of commands, components, events, and locales.
pub struct Pack {
    id: String,
    self_ref: Weak<Pack>,
    state: RwLock<PackState>,
    locales: LocaleStore,
    event_seq: AtomicU64,
}

impl Pack {
    /// Creates a pack.
    ///
    /// The id must be unique enough among siblings; the literal id
    /// `"trellis"` is rejected because the root orchestrator claims it.
    pub fn new(id: impl Into<String>) -> RegistryResult<Arc<Pack>> {
        let id = id.into();
        if id == BRAND {
            return Err(RegistryError::ReservedId { id });
        }
        Ok(Self::build(id))
    }

    /// Creates a pack without the reserved-id check. Root use only.
    #[doc(hidden)]
    pub fn reserved(id: impl Into<String>) -> Arc<Pack> {
        Self::build(id.into())
    }

    fn build(id: String) -> Arc<Pack> {
        Arc::new_cyclic(|weak| Pack {
            id,
            self_ref: weak.clone(),
            state: RwLock::new(PackState::default()),
            locales: LocaleStore::new(),
            event_seq: AtomicU64::new(0),
        })
    }

    /// The pack id.
    pub fn id(&self) -> &str {
        &self.id
    }

    /// This pack's locale store.
    pub fn locales(&self) -> &LocaleStore {
        &self.locales
    }

    /// Snapshot of the pack's collections, for the root's flattening walk.
    pub fn snapshot(&self) -> PackSnapshot {
        let state = self.state.read();
        let mut event_buses: Vec<(String, ResultBus<EventMessage, Value>)> = state
            .event_buses
            .iter()
            .map(|(name, bus)| (name.clone(), bus.clone()))
            .collect();
        event_buses.sort_by(|a, b| a.0.cmp(&b.0));
        PackSnapshot {
            interactions: state.interactions.clone(),
            autocomplete: state
                .autocomplete
                .iter()
                .map(|((id, option), handler)| {
                    (id.clone(), option.clone(), Arc::clone(handler))
                })
                .collect(),
            event_buses,
            inspectors: state.inspectors.clone(),
            children: state.children.clone(),
        }
    }

    // =========================================================================
    // Interaction Registration
    // =========================================================================

    fn boxed<F, Fut>(handler: F) -> InteractionHandler
    where
        F: Fn(Arc<InteractionContext>) -> Fut + Send + Sync + 'static,
        Fut: Future<Output = HandlerOutput> + Send + 'static,
    {
        Arc::new(move |ctx| -> BoxFuture<'static, HandlerOutput> { Box::pin(handler(ctx)) })
    }

    fn register_interaction(
        &self,
        registration: InteractionRegistration,
    ) -> RegistryResult<Disposer> {
        let id = registration.id.clone();
        {
            let mut state = self.state.write();
            if state.interactions.iter().any(|r| r.id == id) {
                return Err(RegistryError::DuplicateId {
                    owner: self.id.clone(),
                    id,
                });
            }
            state.interactions.push(Arc::new(registration));
        }
        debug!(pack = %self.id, id = %id, "interaction registered");

        let weak = self.self_ref.clone();
        let removed_id = id;
        let disposer = Disposer::new(move || {
            if let Some(pack) = weak.upgrade() {
                pack.state
                    .write()
                    .interactions
                    .retain(|r| r.id != removed_id);
            }
        });
        self.state.write().disposers.push(disposer.clone());
        Ok(disposer)
    }

    /// Registers a slash command.
    ///
    /// The pattern is expanded once; the mapping from every literal
    /// combination back to this registration is what dispatch later routes
    /// by. Expansion and naming-limit violations are distinct errors.
    pub fn chat_input<F, Fut>(&self, config: ChatInput, handler: F) -> RegistryResult<Disposer>
    where
        F: Fn(Arc<InteractionContext>) -> Fut + Send + Sync + 'static,
        Fut: Future<Output = HandlerOutput> + Send + 'static,
    {
        let combinations = pattern::expand(&config.pattern);
        pattern::validate(&config.pattern, &combinations)?;

        self.register_interaction(InteractionRegistration {
            id: config.id,
            kind: InteractionKind::ChatInput,
            pattern: Some(config.pattern),
            combinations,
            description: config.description,
            options: config.options,
            component_options: Value::Null,
            handler: Self::boxed(handler),
        })
    }

    fn context_menu<F, Fut>(
        &self,
        kind: InteractionKind,
        config: ContextMenu,
        handler: F,
    ) -> RegistryResult<Disposer>
    where
        F: Fn(Arc<InteractionContext>) -> Fut + Send + Sync + 'static,
        Fut: Future<Output = HandlerOutput> + Send + 'static,
    {
        // Context-menu names obey the same platform naming limits.
        let combinations = vec![config.name.clone()];
        pattern::validate(&config.name, &combinations)?;

        self.register_interaction(InteractionRegistration {
            id: config.id,
            kind,
            pattern: None,
            combinations,
            description: String::new(),
            options: Vec::new(),
            component_options: Value::Null,
            handler: Self::boxed(handler),
        })
    }

    /// Registers a context-menu command on users.
    pub fn user_context_menu<F, Fut>(
        &self,
        config: ContextMenu,
        handler: F,
    ) -> RegistryResult<Disposer>
    where
        F: Fn(Arc<InteractionContext>) -> Fut + Send + Sync + 'static,
        Fut: Future<Output = HandlerOutput> + Send + 'static,
    {
        self.context_menu(InteractionKind::UserContextMenu, config, handler)
    }

    /// Registers a context-menu command on messages.
    pub fn message_context_menu<F, Fut>(
        &self,
        config: ContextMenu,
        handler: F,
    ) -> RegistryResult<Disposer>
    where
        F: Fn(Arc<InteractionContext>) -> Fut + Send + Sync + 'static,
        Fut: Future<Output = HandlerOutput> + Send + 'static,
    {
        self.context_menu(InteractionKind::MessageContextMenu, config, handler)
    }

    fn component<F, Fut>(
        &self,
        kind: InteractionKind,
        config: Component,
        handler: F,
    ) -> RegistryResult<Disposer>
    where
        F: Fn(Arc<InteractionContext>) -> Fut + Send + Sync + 'static,
        Fut: Future<Output = HandlerOutput> + Send + 'static,
    {
        self.register_interaction(InteractionRegistration {
            id: config.id,
            kind,
            pattern: None,
            combinations: Vec::new(),
            description: String::new(),
            options: Vec::new(),
            component_options: config.options,
            handler: Self::boxed(handler),
        })
    }

    /// Registers a button.
    pub fn button<F, Fut>(&self, config: Component, handler: F) -> RegistryResult<Disposer>
    where
        F: Fn(Arc<InteractionContext>) -> Fut + Send + Sync + 'static,
        Fut: Future<Output = HandlerOutput> + Send + 'static,
    {
        self.component(InteractionKind::Button, config, handler)
    }

    /// Registers a string select menu.
    pub fn string_select<F, Fut>(&self, config: Component, handler: F) -> RegistryResult<Disposer>
    where
        F: Fn(Arc<InteractionContext>) -> Fut + Send + Sync + 'static,
        Fut: Future<Output = HandlerOutput> + Send + 'static,
    {
        self.component(InteractionKind::StringSelect, config, handler)
    }

    /// Registers a user select menu.
    pub fn user_select<F, Fut>(&self, config: Component, handler: F) -> RegistryResult<Disposer>
    where
        F: Fn(Arc<InteractionContext>) -> Fut + Send + Sync + 'static,
        Fut: Future<Output = HandlerOutput> + Send + 'static,
    {
        self.component(InteractionKind::UserSelect, config, handler)
    }

    /// Registers a role select menu.
    pub fn role_select<F, Fut>(&self, config: Component, handler: F) -> RegistryResult<Disposer>
    where
        F: Fn(Arc<InteractionContext>) -> Fut + Send + Sync + 'static,
        Fut: Future<Output = HandlerOutput> + Send + 'static,
    {
        self.component(InteractionKind::RoleSelect, config, handler)
    }

    /// Registers a mentionable select menu.
    pub fn mentionable_select<F, Fut>(
        &self,
        config: Component,
        handler: F,
    ) -> RegistryResult<Disposer>
    where
        F: Fn(Arc<InteractionContext>) -> Fut + Send + Sync + 'static,
        Fut: Future<Output = HandlerOutput> + Send + 'static,
    {
        self.component(InteractionKind::MentionableSelect, config, handler)
    }

    /// Registers a channel select menu.
    pub fn channel_select<F, Fut>(&self, config: Component, handler: F) -> RegistryResult<Disposer>
    where
        F: Fn(Arc<InteractionContext>) -> Fut + Send + Sync + 'static,
        Fut: Future<Output = HandlerOutput> + Send + 'static,
    {
        self.component(InteractionKind::ChannelSelect, config, handler)
    }

    /// Registers a modal.
    pub fn modal<F, Fut>(&self, config: Component, handler: F) -> RegistryResult<Disposer>
    where
        F: Fn(Arc<InteractionContext>) -> Fut + Send + Sync + 'static,
        Fut: Future<Output = HandlerOutput> + Send + 'static,
    {
        self.component(InteractionKind::Modal, config, handler)
    }

    /// Registers an autocomplete handler for one option of a registered
    /// slash command.
    pub fn autocomplete<F, Fut>(
        &self,
        command_id: &str,
        option: &str,
        handler: F,
    ) -> RegistryResult<Disposer>
    where
        F: Fn(Arc<crate::context::AutocompleteContext>) -> Fut + Send + Sync + 'static,
        Fut: Future<Output = Result<Vec<trellis_core::interaction::AutocompleteChoice>, BoxError>>
            + Send
            + 'static,
    {
        let key = (command_id.to_string(), option.to_string());
        {
            let mut state = self.state.write();
            let kind = state
                .interactions
                .iter()
                .find(|r| r.id == command_id)
                .map(|r| r.kind)
                .ok_or_else(|| RegistryError::UnknownId {
                    id: command_id.to_string(),
                })?;
            if kind != InteractionKind::ChatInput {
                return Err(RegistryError::KindMismatch {
                    id: command_id.to_string(),
                    expected: "chat input command",
                });
            }
            if state.autocomplete.contains_key(&key) {
                return Err(RegistryError::DuplicateId {
                    owner: self.id.clone(),
                    id: format!("{command_id}#{option}"),
                });
            }
            let boxed: AutocompleteHandler = Arc::new(move |ctx| Box::pin(handler(ctx)));
            state.autocomplete.insert(key.clone(), boxed);
        }

        let weak = self.self_ref.clone();
        let disposer = Disposer::new(move || {
            if let Some(pack) = weak.upgrade() {
                pack.state.write().autocomplete.remove(&key);
            }
        });
        self.state.write().disposers.push(disposer.clone());
        Ok(disposer)
    }

    // =========================================================================
    // Event Registration
    // =========================================================================

    fn bus_for(&self, event: &str) -> ResultBus<EventMessage, Value> {
        self.state
            .write()
            .event_buses
            .entry(event.to_string())
            .or_default()
            .clone()
    }

    fn next_event_id(&self, event: &str) -> String {
        let seq = self.event_seq.fetch_add(1, Ordering::Relaxed);
        format!("{}/{}#{}", self.id, event, seq)
    }

    fn index_event_listener(
        &self,
        event: &str,
        bus: ResultBus<EventMessage, Value>,
        handle: ListenerHandle,
    ) -> Disposer {
        let registration_id = self.next_event_id(event);
        self.state
            .write()
            .event_index
            .insert(registration_id.clone(), (event.to_string(), handle));

        let weak = self.self_ref.clone();
        Disposer::new(move || {
            bus.off(handle);
            if let Some(pack) = weak.upgrade() {
                pack.state.write().event_index.remove(&registration_id);
            }
        })
    }

    /// Registers an async listener for a named event.
    ///
    /// The same event may be registered any number of times; each
    /// registration gets its own synthetic id and disposer. Handler errors
    /// are logged and surfaced as a `handler:error` event; the listener's
    /// result becomes `None`.
    pub fn on_event<F, Fut>(&self, event: &str, handler: F) -> Disposer
    where
        F: Fn(Arc<EventMessage>) -> Fut + Send + Sync + 'static,
        Fut: Future<Output = HandlerOutput> + Send + 'static,
    {
        let bus = self.bus_for(event);
        let weak = self.self_ref.clone();
        let event_name = event.to_string();
        let handle = bus.on_async(move |message: Arc<EventMessage>| {
            let fut = handler(message);
            let weak = weak.clone();
            let event_name = event_name.clone();
            async move {
                match fut.await {
                    Ok(value) => value,
                    Err(err) => {
                        error!(event = %event_name, error = %err, "event handler failed");
                        report_handler_error(&weak, &event_name, &err);
                        None
                    }
                }
            }
        });
        self.index_event_listener(event, bus, handle)
    }

    /// Registers a synchronous listener for a named event.
    ///
    /// Sync listeners also run during synchronous propagation, which is how
    /// lifecycle events emitted by registration methods are delivered.
    pub fn on_event_sync<F>(&self, event: &str, handler: F) -> Disposer
    where
        F: Fn(&EventMessage) -> HandlerOutput + Send + Sync + 'static,
    {
        let bus = self.bus_for(event);
        let weak = self.self_ref.clone();
        let event_name = event.to_string();
        let handle = bus.on(move |message: &EventMessage| match handler(message) {
            Ok(value) => value,
            Err(err) => {
                error!(event = %event_name, error = %err, "event handler failed");
                report_handler_error(&weak, &event_name, &err);
                None
            }
        });
        self.index_event_listener(event, bus, handle)
    }

    // =========================================================================
    // Composition
    // =========================================================================

    /// Mounts a sub-pack, inspector, or locale fragment.
    ///
    /// Emits the matching lifecycle event and returns a disposer that
    /// removes the extension again (and emits the matching `*:unloaded`
    /// event).
    pub fn mount(&self, extension: impl Into<PackExtension>) -> RegistryResult<Disposer> {
        match extension.into() {
            PackExtension::Pack(child) => self.mount_pack(child),
            PackExtension::Inspector(inspector) => self.mount_inspector(inspector),
            PackExtension::Locale(fragment) => Ok(self.mount_locale(fragment)),
            PackExtension::InteractionLocale(fragment) => {
                Ok(self.mount_interaction_locale(fragment))
            }
        }
    }

    /// Mounts several extensions; one disposer reverses them all.
    ///
    /// On a duplicate-id error, extensions mounted so far are unwound before
    /// the error is returned.
    pub fn mount_many(
        &self,
        extensions: impl IntoIterator<Item = PackExtension>,
    ) -> RegistryResult<Disposer> {
        let mut mounted = Vec::new();
        for extension in extensions {
            match self.mount(extension) {
                Ok(disposer) => mounted.push(disposer),
                Err(err) => {
                    for disposer in mounted.iter().rev() {
                        disposer.dispose();
                    }
                    return Err(err);
                }
            }
        }
        Ok(Disposer::merge(mounted))
    }

    fn mount_pack(&self, child: Arc<Pack>) -> RegistryResult<Disposer> {
        let child_id = child.id().to_string();
        {
            let mut state = self.state.write();
            if state.children.iter().any(|c| c.id() == child_id) {
                return Err(RegistryError::DuplicateId {
                    owner: self.id.clone(),
                    id: child_id,
                });
            }
            state.children.push(child);
        }
        self.emit_lifecycle(LifecycleEvent::PackLoaded {
            id: child_id.clone(),
        });

        let weak = self.self_ref.clone();
        let disposer = Disposer::new(move || {
            let Some(pack) = weak.upgrade() else {
                return;
            };
            pack.state.write().children.retain(|c| c.id() != child_id);
            pack.emit_lifecycle(LifecycleEvent::PackUnloaded {
                id: child_id.clone(),
            });
        });
        self.state.write().disposers.push(disposer.clone());
        Ok(disposer)
    }

    fn mount_inspector(&self, inspector: Arc<Inspector>) -> RegistryResult<Disposer> {
        let inspector_id = inspector.id().to_string();
        {
            let mut state = self.state.write();
            if state.inspectors.iter().any(|i| i.id() == inspector_id) {
                return Err(RegistryError::DuplicateId {
                    owner: self.id.clone(),
                    id: inspector_id,
                });
            }
            state.inspectors.push(inspector);
        }
        self.emit_lifecycle(LifecycleEvent::InspectorRegistered {
            id: inspector_id.clone(),
        });

        let weak = self.self_ref.clone();
        let disposer = Disposer::new(move || {
            let Some(pack) = weak.upgrade() else {
                return;
            };
            pack.state
                .write()
                .inspectors
                .retain(|i| i.id() != inspector_id);
            pack.emit_lifecycle(LifecycleEvent::InspectorUnregistered {
                id: inspector_id.clone(),
            });
        });
        self.state.write().disposers.push(disposer.clone());
        Ok(disposer)
    }

    fn mount_locale(&self, fragment: LocaleFragment) -> Disposer {
        let id = fragment.id.clone();
        let language = fragment.language.clone();
        let removal = self.locales.add_fragment(fragment);
        self.emit_lifecycle(LifecycleEvent::LocaleLoaded {
            id: id.clone(),
            language: language.clone(),
        });

        let weak = self.self_ref.clone();
        let disposer = Disposer::new(move || {
            removal.dispose();
            if let Some(pack) = weak.upgrade() {
                pack.emit_lifecycle(LifecycleEvent::LocaleUnloaded {
                    id: id.clone(),
                    language: language.clone(),
                });
            }
        });
        self.state.write().disposers.push(disposer.clone());
        disposer
    }

    fn mount_interaction_locale(&self, fragment: InteractionLocaleFragment) -> Disposer {
        let id = fragment.id.clone();
        let language = fragment.language.clone();
        let removal = self.locales.add_interaction_fragment(fragment);
        self.emit_lifecycle(LifecycleEvent::LocaleLoaded {
            id: id.clone(),
            language: language.clone(),
        });

        let weak = self.self_ref.clone();
        let disposer = Disposer::new(move || {
            removal.dispose();
            if let Some(pack) = weak.upgrade() {
                pack.emit_lifecycle(LifecycleEvent::LocaleUnloaded {
                    id: id.clone(),
                    language: language.clone(),
                });
            }
        });
        self.state.write().disposers.push(disposer.clone());
        disposer
    }

    // =========================================================================
    // Event Propagation
    // =========================================================================

    fn emit_lifecycle(&self, event: LifecycleEvent) {
        self.emit_event_sync(&EventMessage::lifecycle(event));
    }

    /// Emits an event through this pack and its whole subtree.
    ///
    /// A pack's own listeners fully resolve — strictly sequentially —
    /// before its children are descended into, in mount order. Every
    /// listener's return value ends up in one flat list.
    pub async fn emit_event(&self, message: EventMessage) -> Vec<Option<Value>> {
        self.propagate(&Arc::new(message)).await
    }

    fn propagate<'a>(
        &'a self,
        message: &'a Arc<EventMessage>,
    ) -> BoxFuture<'a, Vec<Option<Value>>> {
        Box::pin(async move {
            let (bus, children) = self.listeners_for(&message.name);
            let mut results = match bus {
                Some(bus) => bus.emit_seq(message).await,
                None => Vec::new(),
            };
            for child in children {
                results.extend(child.propagate(message).await);
            }
            results
        })
    }

    /// Synchronous propagation: sync listeners only.
    pub fn emit_event_sync(&self, message: &EventMessage) -> Vec<Option<Value>> {
        self.propagate_sync(&Arc::new(message.clone()))
    }

    fn propagate_sync(&self, message: &Arc<EventMessage>) -> Vec<Option<Value>> {
        let (bus, children) = self.listeners_for(&message.name);
        let mut results = match bus {
            Some(bus) => bus.emit(message),
            None => Vec::new(),
        };
        for child in children {
            results.extend(child.propagate_sync(message));
        }
        results
    }

    /// Emits an event, stopping at the first pack whose own listeners yield
    /// a defined value.
    ///
    /// Scanning order is self first, then children in mount order. Packs
    /// after the one that produced the value are never visited.
    pub async fn emit_event_until(&self, message: EventMessage) -> Option<Value> {
        self.propagate_until(&Arc::new(message)).await
    }

    fn propagate_until<'a>(
        &'a self,
        message: &'a Arc<EventMessage>,
    ) -> BoxFuture<'a, Option<Value>> {
        Box::pin(async move {
            let (bus, children) = self.listeners_for(&message.name);
            if let Some(bus) = bus
                && let Some(value) = bus.emit_until_seq(message).await
            {
                return Some(value);
            }
            for child in children {
                if let Some(value) = child.propagate_until(message).await {
                    return Some(value);
                }
            }
            None
        })
    }

    /// Synchronous until-first-result propagation: sync listeners only.
    pub fn emit_event_until_sync(&self, message: &EventMessage) -> Option<Value> {
        self.propagate_until_sync(&Arc::new(message.clone()))
    }

    fn propagate_until_sync(&self, message: &Arc<EventMessage>) -> Option<Value> {
        let (bus, children) = self.listeners_for(&message.name);
        if let Some(bus) = bus
            && let Some(value) = bus.emit_until(message)
        {
            return Some(value);
        }
        children
            .into_iter()
            .find_map(|child| child.propagate_until_sync(message))
    }

    /// Bus and children snapshot; never holds the lock across emission.
    fn listeners_for(
        &self,
        event: &str,
    ) -> (Option<ResultBus<EventMessage, Value>>, Vec<Arc<Pack>>) {
        let state = self.state.read();
        (state.event_buses.get(event).cloned(), state.children.clone())
    }

    // =========================================================================
    // Teardown
    // =========================================================================

    /// Tears the pack down.
    ///
    /// Runs every accumulated disposer (unwinding registrations and
    /// unmounting extensions with their lifecycle events), clears all
    /// collections, emits `pack:destroyed`, then detaches every listener.
    pub fn destroy(&self) {
        let disposers = {
            let mut state = self.state.write();
            std::mem::take(&mut state.disposers)
        };
        for disposer in disposers.iter().rev() {
            disposer.dispose();
        }

        {
            let mut state = self.state.write();
            state.interactions.clear();
            state.autocomplete.clear();
            state.event_index.clear();
            state.children.clear();
            state.inspectors.clear();
        }
        self.locales.clear();

        self.emit_lifecycle(LifecycleEvent::PackDestroyed {
            id: self.id.clone(),
        });

        let buses = {
            let mut state = self.state.write();
            std::mem::take(&mut state.event_buses)
        };
        for bus in buses.values() {
            bus.clear();
        }
    }
}

/// Surfaces a handler failure as a `handler:error` event on the pack tree.
///
/// Errors inside `handler:error` listeners themselves are only logged, never
/// re-emitted.
fn report_handler_error(weak: &Weak<Pack>, event: &str, err: &BoxError) {
    if event == "handler:error" {
        return;
    }
    if let Some(pack) = weak.upgrade() {
        pack.emit_event_sync(&EventMessage::lifecycle(LifecycleEvent::HandlerError {
            event: event.to_string(),
            message: err.to_string(),
        }));
    }
}

impl std::fmt::Debug for Pack {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let state = self.state.read();
        f.debug_struct("Pack")
            .field("id", &self.id)
            .field("interactions", &state.interactions.len())
            .field("children", &state.children.len())
            .field("inspectors", &state.inspectors.len())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::inspector::InspectorDomain;
    use serde_json::json;
    use std::sync::atomic::AtomicUsize;
    use trellis_core::locale::LocaleNode;

    fn chat_input(id: &str, pattern: &str) -> ChatInput {
        ChatInput {
            id: id.to_string(),
            pattern: pattern.to_string(),
            description: "test command".to_string(),
            options: Vec::new(),
        }
    }

    fn noop_handler(
        _ctx: Arc<InteractionContext>,
    ) -> impl Future<Output = HandlerOutput> + Send + 'static {
        async { Ok(None) }
    }

    #[test]
    fn test_reserved_id_rejected() {
        let err = Pack::new("trellis").unwrap_err();
        assert!(matches!(err, RegistryError::ReservedId { .. }));
    }

    #[test]
    fn test_duplicate_id_in_one_pack_rejected() {
        let pack = Pack::new("a").unwrap();
        pack.chat_input(chat_input("cmd", "ping"), noop_handler)
            .unwrap();
        let err = pack
            .chat_input(chat_input("cmd", "pong"), noop_handler)
            .unwrap_err();
        assert!(matches!(err, RegistryError::DuplicateId { .. }));
    }

    #[test]
    fn test_commands_and_components_share_namespace() {
        let pack = Pack::new("a").unwrap();
        pack.chat_input(chat_input("shared", "ping"), noop_handler)
            .unwrap();
        let err = pack
            .button(
                Component {
                    id: "shared".to_string(),
                    options: Value::Null,
                },
                noop_handler,
            )
            .unwrap_err();
        assert!(matches!(err, RegistryError::DuplicateId { .. }));
    }

    #[test]
    fn test_same_id_in_sibling_packs_allowed() {
        let a = Pack::new("a").unwrap();
        let b = Pack::new("b").unwrap();
        a.chat_input(chat_input("cmd", "ping"), noop_handler)
            .unwrap();
        b.chat_input(chat_input("cmd", "ping"), noop_handler)
            .unwrap();
    }

    #[test]
    fn test_dispose_frees_id() {
        let pack = Pack::new("a").unwrap();
        let disposer = pack
            .chat_input(chat_input("cmd", "ping"), noop_handler)
            .unwrap();
        disposer.dispose();
        pack.chat_input(chat_input("cmd", "pong"), noop_handler)
            .unwrap();
    }

    #[test]
    fn test_four_word_combination_rejected() {
        let pack = Pack::new("a").unwrap();
        let err = pack
            .chat_input(chat_input("cmd", "a b c (d)?"), noop_handler)
            .unwrap_err();
        assert!(matches!(err, RegistryError::TooManyWords { .. }));
    }

    #[test]
    fn test_long_word_rejected() {
        let pack = Pack::new("a").unwrap();
        let long = "x".repeat(33);
        let err = pack
            .chat_input(chat_input("cmd", &long), noop_handler)
            .unwrap_err();
        assert!(matches!(err, RegistryError::WordTooLong { .. }));
    }

    #[test]
    fn test_empty_pattern_rejected() {
        let pack = Pack::new("a").unwrap();
        let err = pack
            .chat_input(chat_input("cmd", "(a|) b"), noop_handler)
            .unwrap_err();
        assert!(matches!(err, RegistryError::EmptyPattern { .. }));
    }

    #[test]
    fn test_autocomplete_requires_chat_input() {
        let pack = Pack::new("a").unwrap();
        pack.button(
            Component {
                id: "btn".to_string(),
                options: Value::Null,
            },
            noop_handler,
        )
        .unwrap();

        let err = pack
            .autocomplete("btn", "query", |_| async { Ok(Vec::new()) })
            .unwrap_err();
        assert!(matches!(err, RegistryError::KindMismatch { .. }));

        let err = pack
            .autocomplete("missing", "query", |_| async { Ok(Vec::new()) })
            .unwrap_err();
        assert!(matches!(err, RegistryError::UnknownId { .. }));
    }

    #[tokio::test]
    async fn test_event_propagation_parent_before_child() {
        let parent = Pack::new("parent").unwrap();
        let child = Pack::new("child").unwrap();
        child.on_event("custom", |_| async { Ok(Some(json!("child"))) });
        parent.mount(child).unwrap();
        parent.on_event("custom", |_| async { Ok(Some(json!("parent"))) });

        let results = parent
            .emit_event(EventMessage::custom("custom", Value::Null))
            .await;
        assert_eq!(results, vec![Some(json!("parent")), Some(json!("child"))]);
    }

    #[tokio::test]
    async fn test_emit_until_stops_at_first_defined_result() {
        let parent = Pack::new("parent").unwrap();
        let child = Pack::new("child").unwrap();
        let child_calls = Arc::new(AtomicUsize::new(0));
        let c = Arc::clone(&child_calls);
        child.on_event("custom", move |_| {
            let c = Arc::clone(&c);
            async move {
                c.fetch_add(1, Ordering::SeqCst);
                Ok(Some(json!("child")))
            }
        });
        parent.mount(child).unwrap();
        parent.on_event("custom", |_| async { Ok(Some(json!("parent"))) });

        let result = parent
            .emit_event_until(EventMessage::custom("custom", Value::Null))
            .await;
        assert_eq!(result, Some(json!("parent")));
        // The child's listener must not have been invoked.
        assert_eq!(child_calls.load(Ordering::SeqCst), 0);
    }

    #[tokio::test]
    async fn test_handler_error_surfaces_as_event() {
        let pack = Pack::new("a").unwrap();
        let seen = Arc::new(AtomicUsize::new(0));
        let s = Arc::clone(&seen);
        pack.on_event_sync("handler:error", move |message| {
            if let Some(LifecycleEvent::HandlerError { event, .. }) = message.as_lifecycle() {
                assert_eq!(event, "custom");
                s.fetch_add(1, Ordering::SeqCst);
            }
            Ok(None)
        });
        pack.on_event("custom", |_| async { Err("boom".into()) });

        let results = pack
            .emit_event(EventMessage::custom("custom", Value::Null))
            .await;
        assert_eq!(results, vec![None]);
        assert_eq!(seen.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn test_mount_emits_lifecycle_events() {
        let parent = Pack::new("parent").unwrap();
        let loaded = Arc::new(AtomicUsize::new(0));
        let unloaded = Arc::new(AtomicUsize::new(0));
        let l = Arc::clone(&loaded);
        let u = Arc::clone(&unloaded);
        parent.on_event_sync("pack:loaded", move |_| {
            l.fetch_add(1, Ordering::SeqCst);
            Ok(None)
        });
        parent.on_event_sync("pack:unloaded", move |_| {
            u.fetch_add(1, Ordering::SeqCst);
            Ok(None)
        });

        let disposer = parent.mount(Pack::new("child").unwrap()).unwrap();
        assert_eq!(loaded.load(Ordering::SeqCst), 1);

        disposer.dispose();
        assert_eq!(unloaded.load(Ordering::SeqCst), 1);
        assert!(parent.snapshot().children.is_empty());
    }

    #[test]
    fn test_mount_duplicate_child_id_rejected() {
        let parent = Pack::new("parent").unwrap();
        parent.mount(Pack::new("child").unwrap()).unwrap();
        let err = parent.mount(Pack::new("child").unwrap()).unwrap_err();
        assert!(matches!(err, RegistryError::DuplicateId { .. }));
    }

    #[test]
    fn test_mount_many_reverses_in_one_call() {
        let parent = Pack::new("parent").unwrap();
        let inspector = Inspector::new("scan", InspectorDomain::AllSubPacks);
        let disposer = parent
            .mount_many(vec![
                PackExtension::from(Pack::new("child").unwrap()),
                PackExtension::from(inspector),
                PackExtension::from(LocaleFragment {
                    id: "strings".to_string(),
                    language: "en".to_string(),
                    data: LocaleNode::leaf("hi"),
                }),
            ])
            .unwrap();

        let snapshot = parent.snapshot();
        assert_eq!(snapshot.children.len(), 1);
        assert_eq!(snapshot.inspectors.len(), 1);

        disposer.dispose();
        let snapshot = parent.snapshot();
        assert!(snapshot.children.is_empty());
        assert!(snapshot.inspectors.is_empty());
        assert!(parent.locales().languages().is_empty());
    }

    #[test]
    fn test_destroy_clears_everything_and_notifies() {
        let pack = Pack::new("a").unwrap();
        pack.chat_input(chat_input("cmd", "ping"), noop_handler)
            .unwrap();
        pack.mount(Pack::new("child").unwrap()).unwrap();

        let destroyed = Arc::new(AtomicUsize::new(0));
        let d = Arc::clone(&destroyed);
        pack.on_event_sync("pack:destroyed", move |_| {
            d.fetch_add(1, Ordering::SeqCst);
            Ok(None)
        });

        pack.destroy();

        assert_eq!(destroyed.load(Ordering::SeqCst), 1);
        let snapshot = pack.snapshot();
        assert!(snapshot.interactions.is_empty());
        assert!(snapshot.children.is_empty());
        assert!(snapshot.event_buses.is_empty());

        // Listeners are detached: a second destroy event reaches nobody.
        pack.emit_event_sync(&EventMessage::custom("pack:destroyed", Value::Null));
        assert_eq!(destroyed.load(Ordering::SeqCst), 1);
    }
}
