//! Interaction dispatch resolution.
//!
//! One algorithm covers every interaction kind:
//!
//! 1. Derive the lookup key — the space-joined command path for the command
//!    family, the decoded id portion of the custom identifier for the
//!    component family.
//! 2. Look the key up in the flattened cache (`(kind, key)`, first
//!    depth-first registration wins); on a hit, invoke its handler with a
//!    freshly assembled per-kind context and stop.
//! 3. Otherwise scan the cached inspectors in depth-first order — the first
//!    one returning a defined value wins.
//! 4. Otherwise the interaction is silently ignored; unmatched is not an
//!    error.
//!
//! Autocomplete is the parallel path keyed by (full command name, focused
//! option name): it answers with at most [`MAX_AUTOCOMPLETE_CHOICES`]
//! choices, and on handler failure responds with an empty list instead of
//! leaving the platform interaction unanswered.

use std::sync::Arc;

use tracing::{error, trace};

use trellis_core::client::PlatformClient;
use trellis_core::codec::DecodedId;
use trellis_core::event::{EventMessage, LifecycleEvent};
use trellis_core::interaction::{InteractionKind, InteractionPayload};
use trellis_core::locale::ResolvedLocale;
use trellis_framework::context::{AutocompleteContext, InteractionContext};
use trellis_framework::inspector::{Inspector, InspectorDomain};

use crate::root::Trellis;

/// Platform limit on autocomplete suggestions.
pub const MAX_AUTOCOMPLETE_CHOICES: usize = 25;

/// Decides whether an inspector takes part in a root-driven scan.
///
/// `AllSubPacks` inspectors apply wherever they sit in the tree.
/// `CurrentPack` inspectors only apply when mounted directly on the
/// dispatch origin — the root pack — since the root dispatches on behalf of
/// the whole tree.
fn inspector_applies(domain: InspectorDomain, path_len: usize) -> bool {
    match domain {
        InspectorDomain::AllSubPacks => true,
        InspectorDomain::CurrentPack => path_len == 1,
    }
}

/// Resolves and invokes the handler for an inbound interaction.
pub(crate) async fn interaction(
    root: &Trellis,
    client: Arc<dyn PlatformClient>,
    payload: InteractionPayload,
    locale: ResolvedLocale,
) {
    let kind = payload.kind;

    let (key, decoded): (String, Option<DecodedId>) = if kind.is_command() {
        match &payload.command_name {
            Some(name) => (name.clone(), None),
            None => {
                trace!(%kind, "interaction without a command name ignored");
                return;
            }
        }
    } else {
        match &payload.custom_id {
            Some(raw) => {
                let decoded = root.codec().decode(raw);
                (decoded.id.clone(), Some(decoded))
            }
            None => {
                trace!(%kind, "interaction without a custom id ignored");
                return;
            }
        }
    };

    // Step 2: direct registration from the flattened cache.
    let registration = {
        let caches = root.caches.read();
        caches
            .by_key
            .get(&(kind, key.clone()))
            .map(|&index| Arc::clone(&caches.interactions[index].registration))
    };

    let context = Arc::new(InteractionContext::assemble(
        client, locale, payload, &key, decoded,
    ));

    if let Some(registration) = registration {
        trace!(%kind, key = %key, id = %registration.id, "interaction matched");
        if let Err(err) = (registration.handler)(Arc::clone(&context)).await {
            error!(id = %registration.id, error = %err, "interaction handler failed");
            root.pack()
                .emit_event(EventMessage::lifecycle(
                    LifecycleEvent::InteractionHandlerError {
                        id: registration.id.clone(),
                        message: err.to_string(),
                    },
                ))
                .await;
        }
        return;
    }

    // Step 3: inspector fallback, first defined result wins.
    let inspectors: Vec<Arc<Inspector>> = {
        let caches = root.caches.read();
        caches
            .inspectors
            .iter()
            .filter(|entry| inspector_applies(entry.inspector.domain(), entry.path.len()))
            .map(|entry| Arc::clone(&entry.inspector))
            .collect()
    };
    for inspector in inspectors {
        if inspector
            .emit(kind, &key, Arc::clone(&context))
            .await
            .is_some()
        {
            trace!(%kind, key = %key, inspector = inspector.id(), "inspector handled interaction");
            return;
        }
    }

    // Step 4: silent no-op.
    trace!(%kind, key = %key, "unmatched interaction ignored");
}

/// Resolves and invokes an autocomplete handler.
pub(crate) async fn autocomplete(
    root: &Trellis,
    client: Arc<dyn PlatformClient>,
    payload: InteractionPayload,
    locale: ResolvedLocale,
) {
    let Some(command) = payload.command_name.clone() else {
        trace!("autocomplete without a command name ignored");
        return;
    };
    let Some(focused) = payload.focused.clone() else {
        return;
    };

    let handler = {
        let caches = root.caches.read();
        caches
            .by_key
            .get(&(InteractionKind::ChatInput, command.clone()))
            .and_then(|&index| {
                caches.interactions[index]
                    .autocomplete
                    .get(&focused.name)
                    .cloned()
            })
    };
    let Some(handler) = handler else {
        trace!(command = %command, option = %focused.name, "unmatched autocomplete ignored");
        return;
    };

    let option = focused.name.clone();
    let context = Arc::new(AutocompleteContext {
        client: Arc::clone(&client),
        locale,
        payload: payload.clone(),
        command: command.clone(),
        focused,
    });

    match handler(context).await {
        Ok(mut choices) => {
            choices.truncate(MAX_AUTOCOMPLETE_CHOICES);
            if let Err(err) = client.respond_autocomplete(&payload, &choices).await {
                error!(command = %command, error = %err, "autocomplete response failed");
            }
        }
        Err(err) => {
            error!(command = %command, option = %option, error = %err, "autocomplete handler failed");
            // Never leave the interaction unanswered.
            if let Err(respond_err) = client.respond_autocomplete(&payload, &[]).await {
                error!(command = %command, error = %respond_err, "empty autocomplete response failed");
            }
            root.pack()
                .emit_event(EventMessage::lifecycle(LifecycleEvent::AutocompleteError {
                    command,
                    option,
                    message: err.to_string(),
                }))
                .await;
        }
    }
}
