//! Trellis: a composable command/interaction-routing layer for chat-bot
//! platforms.
//!
//! Applications register command patterns, UI-component handlers, and
//! localized strings on composable [`Pack`]s, mount packs into a tree, and
//! let the [`Trellis`] root flatten the tree into dispatch caches and route
//! inbound platform events to the right handler with a resolved locale
//! attached.
//!
//! ```rust,ignore
//! use trellis::prelude::*;
//!
//! let pack = Pack::new("moderation")?;
//! pack.chat_input(
//!     ChatInput {
//!         id: "mod".into(),
//!         pattern: "mod (ban|kick) (user)?".into(),
//!         description: "Moderation commands".into(),
//!         options: vec![],
//!     },
//!     |ctx| async move {
//!         // ...
//!         Ok(None)
//!     },
//! )?;
//!
//! let trellis = Trellis::builder()
//!     .client(my_client)
//!     .publisher(my_publisher)
//!     .build()?;
//! trellis.mount(pack)?;
//! trellis.publish(None).await?;
//! trellis.run().await?;
//! ```
//!
//! The platform connection itself is a collaborator: implement
//! [`PlatformClient`] (and [`CommandPublisher`]) for your gateway/REST
//! stack of choice.

pub use trellis_core as core;
pub use trellis_framework as framework;
pub use trellis_runtime as runtime;

pub use trellis_core::{
    AutocompleteChoice, CodecEntry, CodecRegistry, CommandChoice, CommandDefinition,
    CommandLocalization, CommandOption, CommandOptionKind, CommandPublisher, DataValue, DecodedId,
    Disposer, EventMessage, EventPayload, FocusedOption, GatewayBody, GatewayContext,
    GatewayEvent, InteractionKind, InteractionLocaleFragment, InteractionPayload, LifecycleEvent,
    LocaleFragment, LocaleNode, LocaleStore, LocaleText, OptionLocalization, PlatformClient,
    ResolvedLocale,
};
pub use trellis_framework::{
    AutocompleteContext, ChatInput, CommandContext, Component, ComponentContext, ContextMenu,
    InteractionContext, Inspector, InspectorDomain, ModalContext, Pack, PackExtension,
    SelectContext,
};
pub use trellis_runtime::{
    ConfigLoader, LoggingBuilder, Trellis, TrellisBuilder, TrellisConfig,
};

/// Commonly used imports.
pub mod prelude {
    pub use trellis_core::error::{
        BoxError, ClientResult, LocaleResult, PublishResult, RegistryResult,
    };
    pub use trellis_core::{
        AutocompleteChoice, CommandOption, CommandOptionKind, CommandPublisher, DataValue,
        Disposer, EventMessage, GatewayEvent, InteractionKind, InteractionPayload, LocaleFragment,
        PlatformClient, ResolvedLocale,
    };
    pub use trellis_framework::{
        AutocompleteContext, ChatInput, Component, ContextMenu, InteractionContext, Inspector,
        InspectorDomain, Pack, PackExtension,
    };
    pub use trellis_runtime::{Trellis, TrellisBuilder, TrellisConfig};
}
