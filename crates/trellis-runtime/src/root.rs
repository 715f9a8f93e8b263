//! The root orchestrator.
//!
//! [`Trellis`] is the top of the pack tree: it owns the root pack (id
//! `"trellis"`), one platform-client handle per configured client, the
//! component codec registry, and the flattened dispatch caches. The caches
//! are a pure derived view — [`refresh`](Trellis::refresh) clears and
//! rebuilds them with a depth-first walk, and staleness between refreshes is
//! the documented contract, not a bug.
//!
//! # Quick Start
//!
//! ```rust,ignore
//! use trellis_runtime::Trellis;
//!
//! let trellis = Trellis::builder()
//!     .config_file("trellis.toml")
//!     .client(my_client)
//!     .publisher(my_publisher)
//!     .build()?;
//!
//! trellis.chat_input(ping_config, ping_handler)?;
//! trellis.run().await?;
//! ```

use std::collections::HashMap;
use std::ops::Deref;
use std::sync::Arc;

use parking_lot::{Mutex, RwLock};
use serde_json::{Map, Value};
use tokio::signal;
use tokio::task::JoinHandle;
use tracing::{debug, error, info, warn};

use trellis_core::bus::ResultBus;
use trellis_core::client::{GatewayBody, GatewayEvent, PlatformClient};
use trellis_core::codec::{CodecRegistry, DataValue};
use trellis_core::error::{PublishError, PublishResult, RegistryError, RegistryResult};
use trellis_core::event::{EventMessage, GatewayContext, LifecycleEvent};
use trellis_core::interaction::{CommandDefinition, ComponentDescriptor, InteractionKind};
use trellis_core::locale::{CommandLocalization, LocaleNode, ResolvedLocale};
use trellis_core::publish::{CommandPublisher, NoopPublisher};
use trellis_core::{Disposer, BRAND};
use trellis_framework::context::AutocompleteHandler;
use trellis_framework::inspector::Inspector;
use trellis_framework::pack::{InteractionRegistration, Pack};

use crate::config::{ConfigLoader, TrellisConfig};
use crate::error::{RuntimeError, RuntimeResult};
use crate::logging;

// =============================================================================
// Flattened Caches
// =============================================================================

/// One interaction registration as seen from the root.
pub(crate) struct CachedInteraction {
    /// Ancestor pack ids, root first.
    pub path: Vec<String>,
    /// The registration itself.
    pub registration: Arc<InteractionRegistration>,
    /// Autocomplete handlers of the owning pack, keyed by option name.
    pub autocomplete: HashMap<String, AutocompleteHandler>,
}

/// One event-listener bus as seen from the root.
pub(crate) struct CachedEvent {
    /// Ancestor pack ids, root first.
    #[allow(dead_code)]
    pub path: Vec<String>,
    /// Event name the bus listens for.
    pub name: String,
    /// Handle onto the pack's bus for that name.
    pub bus: ResultBus<EventMessage, Value>,
}

/// One inspector as seen from the root.
pub(crate) struct CachedInspector {
    /// Ancestor pack ids, root first.
    pub path: Vec<String>,
    /// The inspector.
    pub inspector: Arc<Inspector>,
}

/// Cross-pack merged locales with default-language back-fill applied.
#[derive(Default)]
pub(crate) struct RootLocales {
    pub default_language: String,
    pub content: HashMap<String, Arc<LocaleNode>>,
    pub interaction: HashMap<String, HashMap<String, CommandLocalization>>,
}

impl RootLocales {
    /// Resolves the first known tag, trying exact match then the primary
    /// subtag (`"en-US"` → `"en"`), falling back to the default language.
    pub fn resolve(&self, preferred: &[Option<&str>]) -> ResolvedLocale {
        for tag in preferred.iter().flatten() {
            if let Some(tree) = self.content.get(*tag) {
                return ResolvedLocale::new(*tag, Arc::clone(tree));
            }
            if let Some((primary, _)) = tag.split_once('-')
                && let Some(tree) = self.content.get(primary)
            {
                return ResolvedLocale::new(primary, Arc::clone(tree));
            }
        }
        self.default_locale()
    }

    /// The default language's locale (possibly empty).
    pub fn default_locale(&self) -> ResolvedLocale {
        match self.content.get(&self.default_language) {
            Some(tree) => ResolvedLocale::new(self.default_language.clone(), Arc::clone(tree)),
            None => ResolvedLocale::empty(self.default_language.clone()),
        }
    }
}

/// The flattened view of the whole pack tree.
#[derive(Default)]
pub(crate) struct Caches {
    pub interactions: Vec<CachedInteraction>,
    /// `(kind, lookup key)` -> index into `interactions`. First
    /// registration in depth-first order wins.
    pub by_key: HashMap<(InteractionKind, String), usize>,
    pub events: Vec<CachedEvent>,
    pub inspectors: Vec<CachedInspector>,
    pub locales: RootLocales,
}

// =============================================================================
// Component Build Pipeline
// =============================================================================

/// Shared payload of the `component:build` pass.
///
/// Listeners post-process the descriptor through the mutex; sequential
/// emission guarantees later listeners see earlier edits.
pub struct ComponentBuild {
    /// The registered component id being built.
    pub component_id: String,
    /// The descriptor under construction.
    pub descriptor: Mutex<ComponentDescriptor>,
}

// =============================================================================
// Trellis
// =============================================================================

/// The root orchestrator: root pack, clients, caches, dispatch.
///
/// Dereferences to its root [`Pack`], so every pack registration method is
/// available directly on `Trellis`.
pub struct Trellis {
    pack: Arc<Pack>,
    config: TrellisConfig,
    clients: RwLock<Vec<Arc<dyn PlatformClient>>>,
    publisher: Arc<dyn CommandPublisher>,
    codec: Arc<CodecRegistry>,
    pub(crate) caches: RwLock<Caches>,
    build_bus: ResultBus<ComponentBuild, Value>,
    running: Mutex<bool>,
    tasks: Mutex<Vec<JoinHandle<()>>>,
}

impl Deref for Trellis {
    type Target = Pack;

    fn deref(&self) -> &Pack {
        &self.pack
    }
}

impl Trellis {
    /// Creates an orchestrator with automatic configuration loading.
    ///
    /// Searches the current directory for `trellis.toml` / `trellis.yaml`;
    /// falls back to defaults when nothing is found.
    pub fn new() -> Arc<Self> {
        let config = ConfigLoader::new()
            .with_current_dir()
            .load()
            .unwrap_or_else(|e| {
                eprintln!("Warning: failed to load config ({e}), using defaults");
                TrellisConfig::default()
            });
        Self::from_config(config)
    }

    /// Creates an orchestrator builder.
    pub fn builder() -> TrellisBuilder {
        TrellisBuilder::new()
    }

    /// Creates an orchestrator from configuration.
    pub fn from_config(config: TrellisConfig) -> Arc<Self> {
        logging::init_from_config(&config.logging);
        Arc::new(Self {
            pack: Pack::reserved(BRAND),
            config,
            clients: RwLock::new(Vec::new()),
            publisher: Arc::new(NoopPublisher),
            codec: Arc::new(CodecRegistry::new()),
            caches: RwLock::new(Caches::default()),
            build_bus: ResultBus::new(),
            running: Mutex::new(false),
            tasks: Mutex::new(Vec::new()),
        })
    }

    /// The root pack.
    pub fn pack(&self) -> &Arc<Pack> {
        &self.pack
    }

    /// The loaded configuration.
    pub fn config(&self) -> &TrellisConfig {
        &self.config
    }

    /// The component codec registry.
    pub fn codec(&self) -> &Arc<CodecRegistry> {
        &self.codec
    }

    /// Adds a platform client handle.
    pub fn add_client(&self, client: Arc<dyn PlatformClient>) {
        self.clients.write().push(client);
    }

    /// The registered client handles.
    pub fn clients(&self) -> Vec<Arc<dyn PlatformClient>> {
        self.clients.read().clone()
    }

    // =========================================================================
    // Refresh
    // =========================================================================

    /// Rebuilds the flattened caches from scratch.
    ///
    /// Walks the subtree depth-first recording every interaction, event
    /// bus, and inspector with the path it was found at, then merges every
    /// pack's locales (first pack wins per key) and back-fills non-default
    /// languages from the default language so present-but-untranslated keys
    /// fall back silently.
    pub fn refresh(&self) {
        let mut caches = Caches::default();
        let mut content: HashMap<String, LocaleNode> = HashMap::new();
        let mut interaction: HashMap<String, HashMap<String, CommandLocalization>> =
            HashMap::new();

        let mut path = Vec::new();
        Self::walk(&self.pack, &mut path, &mut caches, &mut content, &mut interaction);

        let default_language = self.config.default_language.clone();

        // Back-fill every non-default language from the default tree.
        let default_tree = content
            .remove(&default_language)
            .unwrap_or_else(LocaleNode::empty);
        for tree in content.values_mut() {
            tree.fill_missing_from(&default_tree);
        }
        content.insert(default_language.clone(), default_tree);

        let default_records = interaction.get(&default_language).cloned().unwrap_or_default();
        for (language, records) in interaction.iter_mut() {
            if language == &default_language {
                continue;
            }
            for (command_id, record) in &default_records {
                records
                    .entry(command_id.clone())
                    .or_insert_with(|| record.clone());
            }
        }

        caches.locales = RootLocales {
            default_language,
            content: content
                .into_iter()
                .map(|(language, tree)| (language, Arc::new(tree)))
                .collect(),
            interaction,
        };

        let interactions = caches.interactions.len();
        let inspectors = caches.inspectors.len();
        *self.caches.write() = caches;
        debug!(interactions, inspectors, "caches refreshed");
    }

    fn walk(
        pack: &Arc<Pack>,
        path: &mut Vec<String>,
        caches: &mut Caches,
        content: &mut HashMap<String, LocaleNode>,
        interaction: &mut HashMap<String, HashMap<String, CommandLocalization>>,
    ) {
        path.push(pack.id().to_string());
        let snapshot = pack.snapshot();

        for registration in snapshot.interactions {
            let index = caches.interactions.len();
            let kind = registration.kind;
            if kind.is_command() {
                for combination in &registration.combinations {
                    caches
                        .by_key
                        .entry((kind, combination.clone()))
                        .or_insert(index);
                }
            } else {
                caches
                    .by_key
                    .entry((kind, registration.id.clone()))
                    .or_insert(index);
            }
            caches.interactions.push(CachedInteraction {
                path: path.clone(),
                registration,
                autocomplete: HashMap::new(),
            });
        }

        for (id, option, handler) in snapshot.autocomplete {
            if let Some(entry) = caches
                .interactions
                .iter_mut()
                .find(|e| e.path == *path && e.registration.id == id)
            {
                entry.autocomplete.insert(option, handler);
            }
        }

        for (name, bus) in snapshot.event_buses {
            caches.events.push(CachedEvent {
                path: path.clone(),
                name,
                bus,
            });
        }

        for inspector in snapshot.inspectors {
            caches.inspectors.push(CachedInspector {
                path: path.clone(),
                inspector,
            });
        }

        let locales = pack.locales();
        for language in locales.languages() {
            if let Some(tree) = locales.content(&language) {
                content
                    .entry(language.clone())
                    .or_insert_with(LocaleNode::empty)
                    .fill_missing_from(&tree);
            }
            if let Some(records) = locales.interaction(&language) {
                let merged = interaction.entry(language.clone()).or_default();
                for (command_id, record) in records {
                    // First pack in walk order wins, like content keys.
                    merged.entry(command_id).or_insert(record);
                }
            }
        }

        for child in snapshot.children {
            Self::walk(&child, path, caches, content, interaction);
        }
        path.pop();
    }

    /// Resolves a locale from payload hints (user first, then guild).
    pub fn resolve_locale(
        &self,
        user_locale: Option<&str>,
        guild_locale: Option<&str>,
    ) -> ResolvedLocale {
        self.caches
            .read()
            .locales
            .resolve(&[user_locale, guild_locale])
    }

    /// The default language's locale.
    pub fn default_locale(&self) -> ResolvedLocale {
        self.caches.read().locales.default_locale()
    }

    // =========================================================================
    // Start / Stop
    // =========================================================================

    fn client_enabled(&self, id: &str) -> bool {
        self.config
            .clients
            .iter()
            .find(|c| c.id == id)
            .map(|c| c.enabled)
            .unwrap_or(true)
    }

    /// Refreshes, logs in every enabled client, and starts their event
    /// pumps.
    pub async fn start(self: &Arc<Self>) -> RuntimeResult<()> {
        {
            let mut running = self.running.lock();
            if *running {
                warn!("trellis is already running");
                return Ok(());
            }
            *running = true;
        }

        self.refresh();

        let clients = self.clients();
        for client in clients {
            if !self.client_enabled(client.id()) {
                info!(client = client.id(), "client disabled by configuration");
                continue;
            }

            client.login().await.map_err(RuntimeError::Client)?;
            info!(client = client.id(), "client logged in");

            let mut events = client.take_events().map_err(RuntimeError::Client)?;
            let root = Arc::clone(self);
            let pump_client = Arc::clone(&client);
            let task = tokio::spawn(async move {
                while let Some(event) = events.recv().await {
                    root.dispatch_gateway(Arc::clone(&pump_client), event).await;
                }
                debug!(client = pump_client.id(), "event stream closed");
            });
            self.tasks.lock().push(task);
        }

        info!("trellis started");
        Ok(())
    }

    /// Stops the event pumps.
    pub fn stop(&self) {
        {
            let mut running = self.running.lock();
            if !*running {
                warn!("trellis is not running");
                return;
            }
            *running = false;
        }
        for task in self.tasks.lock().drain(..) {
            task.abort();
        }
        info!("trellis stopped");
    }

    /// Runs until Ctrl+C (or SIGTERM on unix), then stops.
    pub async fn run(self: &Arc<Self>) -> RuntimeResult<()> {
        self.start().await?;
        info!("trellis is running, press Ctrl+C to stop");
        Self::wait_for_shutdown().await;
        self.stop();
        Ok(())
    }

    /// Runs until the given future resolves, then stops.
    pub async fn run_until<F>(self: &Arc<Self>, shutdown: F) -> RuntimeResult<()>
    where
        F: Future<Output = ()>,
    {
        self.start().await?;
        shutdown.await;
        self.stop();
        Ok(())
    }

    async fn wait_for_shutdown() {
        #[cfg(unix)]
        {
            let mut sigterm = match signal::unix::signal(signal::unix::SignalKind::terminate()) {
                Ok(sigterm) => sigterm,
                Err(e) => {
                    error!(error = %e, "failed to register SIGTERM handler");
                    let _ = signal::ctrl_c().await;
                    return;
                }
            };

            tokio::select! {
                _ = signal::ctrl_c() => {
                    info!("received Ctrl+C, shutting down");
                }
                _ = sigterm.recv() => {
                    info!("received SIGTERM, shutting down");
                }
            }
        }

        #[cfg(not(unix))]
        {
            let _ = signal::ctrl_c().await;
            info!("received Ctrl+C, shutting down");
        }
    }

    // =========================================================================
    // Gateway Handling
    // =========================================================================

    /// Routes one inbound gateway event.
    ///
    /// The event is wrapped into an enriched context with its resolved
    /// locale, delivered to every cached listener bus registered for its
    /// name (strictly sequentially per bus), and — when it is an
    /// interaction — forwarded to interaction or autocomplete dispatch.
    pub async fn dispatch_gateway(&self, client: Arc<dyn PlatformClient>, event: GatewayEvent) {
        let locale = match event.as_interaction() {
            Some(payload) => self.resolve_locale(
                payload.user_locale.as_deref(),
                payload.guild_locale.as_deref(),
            ),
            None => self.default_locale(),
        };

        let context = Arc::new(GatewayContext {
            client: Arc::clone(&client),
            event_name: event.name.clone(),
            locale: locale.clone(),
            body: event.body.clone(),
        });
        let message = Arc::new(EventMessage::gateway(context));

        let buses: Vec<ResultBus<EventMessage, Value>> = {
            let caches = self.caches.read();
            caches
                .events
                .iter()
                .filter(|entry| entry.name == event.name)
                .map(|entry| entry.bus.clone())
                .collect()
        };
        for bus in buses {
            bus.emit_seq(&message).await;
        }

        if let GatewayBody::Interaction(payload) = event.body {
            if payload.focused.is_some() {
                crate::dispatch::autocomplete(self, client, payload, locale).await;
            } else {
                crate::dispatch::interaction(self, client, payload, locale).await;
            }
        }
    }

    // =========================================================================
    // Publish
    // =========================================================================

    /// Builds publishable definitions for every cached command-family
    /// registration, applying interaction locales.
    pub fn command_definitions(&self) -> Vec<CommandDefinition> {
        let caches = self.caches.read();
        caches
            .interactions
            .iter()
            .filter(|entry| entry.registration.kind.is_command())
            .map(|entry| {
                let registration = &entry.registration;
                let mut name_localizations = HashMap::new();
                let mut description_localizations = HashMap::new();
                let mut option_localizations = HashMap::new();

                for (language, records) in &caches.locales.interaction {
                    let Some(record) = records.get(&registration.id) else {
                        continue;
                    };
                    if !record.names.is_empty()
                        && let Some(combination) = registration.combinations.first()
                    {
                        name_localizations.insert(
                            language.clone(),
                            localize_name(combination, &record.names),
                        );
                    }
                    if let Some(description) = &record.description {
                        description_localizations.insert(language.clone(), description.clone());
                    }
                    if !record.options.is_empty() {
                        option_localizations.insert(language.clone(), record.options.clone());
                    }
                }

                CommandDefinition {
                    id: registration.id.clone(),
                    kind: registration.kind,
                    combinations: registration.combinations.clone(),
                    description: registration.description.clone(),
                    options: registration.options.clone(),
                    name_localizations,
                    description_localizations,
                    option_localizations,
                    path: entry.path.clone(),
                }
            })
            .collect()
    }

    /// Publishes command definitions through the publish collaborator.
    ///
    /// Every client is attempted; per-client failures are reported on the
    /// event bus and aggregated into one error returned after the last
    /// attempt. Nothing is retried.
    pub async fn publish(&self, guild_id: Option<&str>) -> PublishResult<()> {
        self.refresh();
        let commands = self.command_definitions();
        let clients = self.clients();
        let attempted = clients.len();
        let mut errors = Vec::new();

        for client in clients {
            let client_id = client.id().to_string();
            match self
                .publisher
                .publish(Arc::clone(&client), &commands, guild_id)
                .await
            {
                Ok(()) => {
                    info!(client = %client_id, commands = commands.len(), "commands published");
                    self.pack
                        .emit_event(EventMessage::lifecycle(LifecycleEvent::PublishSuccess {
                            client_id,
                        }))
                        .await;
                }
                Err(err) => {
                    error!(client = %client_id, error = %err, "publish failed");
                    self.pack
                        .emit_event(EventMessage::lifecycle(LifecycleEvent::PublishFailed {
                            client_id: client_id.clone(),
                            message: err.to_string(),
                        }))
                        .await;
                    errors.push((client_id, err.to_string()));
                }
            }
        }

        if errors.is_empty() {
            Ok(())
        } else {
            Err(PublishError::Aggregate {
                attempted,
                failed: errors.len(),
                errors,
            })
        }
    }

    // =========================================================================
    // Component Building
    // =========================================================================

    /// Registers a synchronous `component:build` extension.
    pub fn on_component_build(
        &self,
        f: impl Fn(&ComponentBuild) -> Option<Value> + Send + Sync + 'static,
    ) -> Disposer {
        let bus = self.build_bus.clone();
        let handle = bus.on(f);
        Disposer::new(move || {
            bus.off(handle);
        })
    }

    /// Registers an asynchronous `component:build` extension.
    ///
    /// Async extensions only run during
    /// [`build_component_async`](Trellis::build_component_async).
    pub fn on_component_build_async<F, Fut>(&self, f: F) -> Disposer
    where
        F: Fn(Arc<ComponentBuild>) -> Fut + Send + Sync + 'static,
        Fut: Future<Output = Option<Value>> + Send + 'static,
    {
        let bus = self.build_bus.clone();
        let handle = bus.on_async(f);
        Disposer::new(move || {
            bus.off(handle);
        })
    }

    fn prepare_component(
        &self,
        id: &str,
        data: &[DataValue],
        overrides: Option<Value>,
    ) -> RegistryResult<ComponentDescriptor> {
        let caches = self.caches.read();
        let entry = caches
            .interactions
            .iter()
            .find(|entry| entry.registration.id == id)
            .ok_or_else(|| RegistryError::UnknownId { id: id.to_string() })?;
        if !entry.registration.kind.is_component() {
            return Err(RegistryError::KindMismatch {
                id: id.to_string(),
                expected: "component",
            });
        }

        let mut options = match &entry.registration.component_options {
            Value::Object(map) => map.clone(),
            _ => Map::new(),
        };
        if let Some(Value::Object(override_map)) = overrides {
            // Shallow: top-level override keys replace declared ones.
            for (key, value) in override_map {
                options.insert(key, value);
            }
        }

        Ok(ComponentDescriptor {
            kind: entry.registration.kind,
            custom_id: self.codec.encode(id, data),
            options: Value::Object(options),
        })
    }

    /// Builds a platform-ready component descriptor.
    ///
    /// The registered declarative options are shallow-merged with
    /// `overrides`, the custom identifier is encoded from `id` + `data`,
    /// and synchronous `component:build` extensions get one pass over the
    /// result. Uses the flattened cache: refresh first.
    pub fn build_component(
        &self,
        id: &str,
        data: &[DataValue],
        overrides: Option<Value>,
    ) -> RegistryResult<ComponentDescriptor> {
        let descriptor = self.prepare_component(id, data, overrides)?;
        let build = Arc::new(ComponentBuild {
            component_id: id.to_string(),
            descriptor: Mutex::new(descriptor),
        });
        self.build_bus.emit(&build);
        let descriptor = build.descriptor.lock().clone();
        Ok(descriptor)
    }

    /// Builds a component descriptor, running every `component:build`
    /// extension strictly sequentially.
    pub async fn build_component_async(
        &self,
        id: &str,
        data: &[DataValue],
        overrides: Option<Value>,
    ) -> RegistryResult<ComponentDescriptor> {
        let descriptor = self.prepare_component(id, data, overrides)?;
        let build = Arc::new(ComponentBuild {
            component_id: id.to_string(),
            descriptor: Mutex::new(descriptor),
        });
        self.build_bus.emit_seq(&build).await;
        let descriptor = build.descriptor.lock().clone();
        Ok(descriptor)
    }
}

fn localize_name(combination: &str, names: &HashMap<String, String>) -> String {
    combination
        .split(' ')
        .map(|word| names.get(word).map(String::as_str).unwrap_or(word))
        .collect::<Vec<_>>()
        .join(" ")
}

// =============================================================================
// TrellisBuilder
// =============================================================================

/// Builder for a [`Trellis`] with custom configuration and collaborators.
pub struct TrellisBuilder {
    config_loader: ConfigLoader,
    config: Option<TrellisConfig>,
    clients: Vec<Arc<dyn PlatformClient>>,
    publisher: Option<Arc<dyn CommandPublisher>>,
    codec: Option<CodecRegistry>,
}

impl Default for TrellisBuilder {
    fn default() -> Self {
        Self::new()
    }
}

impl TrellisBuilder {
    /// Creates a builder that searches the current directory for config.
    pub fn new() -> Self {
        Self {
            config_loader: ConfigLoader::new().with_current_dir(),
            config: None,
            clients: Vec::new(),
            publisher: None,
            codec: None,
        }
    }

    /// Uses a pre-loaded configuration instead of the loader.
    pub fn config(mut self, config: TrellisConfig) -> Self {
        self.config = Some(config);
        self
    }

    /// Sets a specific configuration file to load.
    pub fn config_file<P: AsRef<std::path::Path>>(mut self, path: P) -> Self {
        self.config_loader = self.config_loader.file(path);
        self
    }

    /// Sets the configuration profile.
    pub fn profile(mut self, profile: impl Into<String>) -> Self {
        self.config_loader = self.config_loader.profile(profile);
        self
    }

    /// Adds a configuration search path.
    pub fn search_path<P: AsRef<std::path::Path>>(mut self, path: P) -> Self {
        self.config_loader = self.config_loader.search_path(path);
        self
    }

    /// Disables environment variable loading.
    pub fn without_env(mut self) -> Self {
        self.config_loader = self.config_loader.without_env();
        self
    }

    /// Adds a platform client handle.
    pub fn client(mut self, client: Arc<dyn PlatformClient>) -> Self {
        self.clients.push(client);
        self
    }

    /// Sets the publish collaborator.
    pub fn publisher(mut self, publisher: Arc<dyn CommandPublisher>) -> Self {
        self.publisher = Some(publisher);
        self
    }

    /// Sets the component codec registry.
    pub fn codec(mut self, codec: CodecRegistry) -> Self {
        self.codec = Some(codec);
        self
    }

    /// Builds the orchestrator.
    pub fn build(self) -> RuntimeResult<Arc<Trellis>> {
        let config = match self.config {
            Some(config) => config,
            None => self.config_loader.load()?,
        };
        logging::init_from_config(&config.logging);

        let trellis = Arc::new(Trellis {
            pack: Pack::reserved(BRAND),
            config,
            clients: RwLock::new(self.clients),
            publisher: self.publisher.unwrap_or_else(|| Arc::new(NoopPublisher)),
            codec: Arc::new(self.codec.unwrap_or_default()),
            caches: RwLock::new(Caches::default()),
            build_bus: ResultBus::new(),
            running: Mutex::new(false),
            tasks: Mutex::new(Vec::new()),
        });
        Ok(trellis)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_support::{MockClient, RecordingPublisher};
    use serde_json::json;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use trellis_core::locale::{LocaleFragment, InteractionLocaleFragment};
    use trellis_framework::pack::{ChatInput, Component};

    fn fragment(id: &str, language: &str, data: serde_json::Value) -> LocaleFragment {
        LocaleFragment {
            id: id.to_string(),
            language: language.to_string(),
            data: LocaleNode::from_json(id, &data).unwrap(),
        }
    }

    fn trellis() -> Arc<Trellis> {
        Trellis::builder()
            .config(TrellisConfig::default())
            .build()
            .unwrap()
    }

    #[test]
    fn test_refresh_backfills_missing_keys_from_default() {
        let trellis = trellis();
        trellis
            .mount(fragment("en", "en", json!({"a": {"b": "hello"}})))
            .unwrap();
        trellis
            .mount(fragment("tr", "tr", json!({"a": {"c": "merhaba"}})))
            .unwrap();

        trellis.refresh();

        let locale = trellis.resolve_locale(Some("tr"), None);
        assert_eq!(locale.language(), "tr");
        // Untranslated key falls back to the default language's value.
        assert_eq!(locale.text("a.b"), Some("hello"));
        assert_eq!(locale.text("a.c"), Some("merhaba"));
    }

    #[test]
    fn test_refresh_merges_packs_first_wins() {
        let trellis = trellis();
        trellis
            .mount(fragment("root", "en", json!({"x": "1"})))
            .unwrap();
        let child = Pack::new("child").unwrap();
        child
            .mount(fragment("child", "en", json!({"x": "2", "y": "2"})))
            .unwrap();
        trellis.mount(child).unwrap();

        trellis.refresh();

        let locale = trellis.resolve_locale(Some("en"), None);
        assert_eq!(locale.text("x"), Some("1"));
        assert_eq!(locale.text("y"), Some("2"));
    }

    #[test]
    fn test_resolve_locale_prefers_user_then_guild_then_default() {
        let trellis = trellis();
        trellis
            .mount(fragment("en", "en", json!({"k": "en"})))
            .unwrap();
        trellis
            .mount(fragment("tr", "tr", json!({"k": "tr"})))
            .unwrap();
        trellis.refresh();

        assert_eq!(trellis.resolve_locale(Some("tr"), Some("en")).language(), "tr");
        assert_eq!(trellis.resolve_locale(None, Some("tr")).language(), "tr");
        assert_eq!(trellis.resolve_locale(None, None).language(), "en");
        // Regional tags resolve through their primary subtag.
        assert_eq!(trellis.resolve_locale(Some("tr-TR"), None).language(), "tr");
        // Unknown tags fall back to the default language.
        assert_eq!(trellis.resolve_locale(Some("xx"), None).language(), "en");
    }

    #[test]
    fn test_command_definitions_apply_interaction_locales() {
        let trellis = trellis();
        trellis
            .chat_input(
                ChatInput {
                    id: "user-info".to_string(),
                    pattern: "user info".to_string(),
                    description: "Shows user info".to_string(),
                    options: Vec::new(),
                },
                |_| async { Ok(None) },
            )
            .unwrap();
        trellis
            .mount(InteractionLocaleFragment {
                id: "tr-commands".to_string(),
                language: "tr".to_string(),
                commands: HashMap::from([(
                    "user-info".to_string(),
                    CommandLocalization {
                        names: HashMap::from([
                            ("user".to_string(), "kullanıcı".to_string()),
                            ("info".to_string(), "bilgi".to_string()),
                        ]),
                        description: Some("Kullanıcı bilgisi".to_string()),
                        ..Default::default()
                    },
                )]),
            })
            .unwrap();

        trellis.refresh();
        let definitions = trellis.command_definitions();
        assert_eq!(definitions.len(), 1);
        let definition = &definitions[0];
        assert_eq!(definition.combinations, vec!["user info"]);
        assert_eq!(definition.name_localizations["tr"], "kullanıcı bilgi");
        assert_eq!(
            definition.description_localizations["tr"],
            "Kullanıcı bilgisi"
        );
        assert_eq!(definition.path, vec!["trellis"]);
    }

    #[tokio::test]
    async fn test_publish_aggregates_per_client_failures() {
        let publisher = RecordingPublisher::failing_for(&["bad"]);
        let trellis = Trellis::builder()
            .config(TrellisConfig::default())
            .client(MockClient::new("good"))
            .client(MockClient::new("bad"))
            .publisher(Arc::clone(&publisher) as Arc<dyn CommandPublisher>)
            .build()
            .unwrap();

        let successes = Arc::new(AtomicUsize::new(0));
        let failures = Arc::new(AtomicUsize::new(0));
        let s = Arc::clone(&successes);
        let f = Arc::clone(&failures);
        trellis.on_event_sync("publish:success", move |_| {
            s.fetch_add(1, Ordering::SeqCst);
            Ok(None)
        });
        trellis.on_event_sync("publish:error", move |_| {
            f.fetch_add(1, Ordering::SeqCst);
            Ok(None)
        });

        let err = trellis.publish(Some("guild-1")).await.unwrap_err();
        match err {
            PublishError::Aggregate {
                attempted,
                failed,
                errors,
            } => {
                assert_eq!(attempted, 2);
                assert_eq!(failed, 1);
                assert_eq!(errors[0].0, "bad");
            }
            other => panic!("unexpected error: {other}"),
        }

        // Every client was attempted despite the failure.
        assert_eq!(publisher.calls.lock().len(), 2);
        assert_eq!(successes.load(Ordering::SeqCst), 1);
        assert_eq!(failures.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn test_build_component_merges_overrides() {
        let trellis = trellis();
        trellis
            .button(
                Component {
                    id: "vote".to_string(),
                    options: json!({"style": "primary", "label": "Vote"}),
                },
                |_| async { Ok(None) },
            )
            .unwrap();
        trellis.refresh();

        let descriptor = trellis
            .build_component(
                "vote",
                &[DataValue::Text("a".to_string()), DataValue::Number(3.0)],
                Some(json!({"label": "Vote now"})),
            )
            .unwrap();

        assert_eq!(descriptor.kind, InteractionKind::Button);
        assert_eq!(descriptor.options["style"], "primary");
        assert_eq!(descriptor.options["label"], "Vote now");

        let decoded = trellis.codec().decode(&descriptor.custom_id);
        assert_eq!(decoded.id, "vote");
        assert_eq!(
            decoded.data,
            vec![DataValue::Text("a".to_string()), DataValue::Number(3.0)]
        );
    }

    #[test]
    fn test_build_component_runs_sync_extensions() {
        let trellis = trellis();
        trellis
            .button(
                Component {
                    id: "vote".to_string(),
                    options: json!({}),
                },
                |_| async { Ok(None) },
            )
            .unwrap();
        trellis.refresh();

        trellis.on_component_build(|build| {
            if let Value::Object(options) = &mut build.descriptor.lock().options {
                options.insert("decorated".to_string(), json!(true));
            }
            None
        });

        let descriptor = trellis.build_component("vote", &[], None).unwrap();
        assert_eq!(descriptor.options["decorated"], json!(true));
    }

    #[test]
    fn test_build_component_errors() {
        let trellis = trellis();
        trellis
            .chat_input(
                ChatInput {
                    id: "cmd".to_string(),
                    pattern: "ping".to_string(),
                    description: "ping".to_string(),
                    options: Vec::new(),
                },
                |_| async { Ok(None) },
            )
            .unwrap();
        trellis.refresh();

        assert!(matches!(
            trellis.build_component("missing", &[], None).unwrap_err(),
            RegistryError::UnknownId { .. }
        ));
        assert!(matches!(
            trellis.build_component("cmd", &[], None).unwrap_err(),
            RegistryError::KindMismatch { .. }
        ));
    }

    #[tokio::test]
    async fn test_start_pumps_events_to_listeners() {
        let client = MockClient::new("main");
        let sender = client.sender();
        let trellis = Trellis::builder()
            .config(TrellisConfig::default())
            .client(Arc::clone(&client) as Arc<dyn PlatformClient>)
            .build()
            .unwrap();

        let (seen_tx, mut seen_rx) = tokio::sync::mpsc::channel(1);
        trellis.on_event("messageCreate", move |message| {
            let seen_tx = seen_tx.clone();
            let name = message.name.clone();
            async move {
                seen_tx.send(name).await.ok();
                Ok(None)
            }
        });

        trellis.start().await.unwrap();
        assert_eq!(client.logins.load(Ordering::SeqCst), 1);

        sender
            .send(GatewayEvent::raw("messageCreate", json!({"content": "hi"})))
            .await
            .unwrap();

        let name = tokio::time::timeout(std::time::Duration::from_secs(1), seen_rx.recv())
            .await
            .expect("event pump delivered nothing")
            .unwrap();
        assert_eq!(name, "messageCreate");

        trellis.stop();
    }

    #[tokio::test]
    async fn test_disabled_client_is_not_started() {
        let client = MockClient::new("secondary");
        let config = TrellisConfig {
            clients: vec![crate::config::ClientConfig {
                id: "secondary".to_string(),
                token: None,
                enabled: false,
                settings: HashMap::new(),
            }],
            ..Default::default()
        };
        let trellis = Trellis::builder()
            .config(config)
            .client(Arc::clone(&client) as Arc<dyn PlatformClient>)
            .build()
            .unwrap();

        trellis.start().await.unwrap();
        assert_eq!(client.logins.load(Ordering::SeqCst), 0);
        trellis.stop();
    }
}
