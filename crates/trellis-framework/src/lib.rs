//! Composable layer of the Trellis bot framework.
//!
//! This crate provides the pieces an application composes its routing tree
//! from:
//!
//! - [`Pack`] — the container node owning commands, components, events,
//!   locales, sub-packs, and inspectors
//! - [`Inspector`] — the fallback pattern/id registry consulted when no
//!   direct registration matches
//! - [`InteractionContext`] — the closed union handed to handlers
//!
//! The root orchestrator that flattens a pack tree and drives dispatch lives
//! in `trellis-runtime`.

pub mod context;
pub mod inspector;
pub mod pack;

pub use context::{
    AutocompleteContext, AutocompleteHandler, CommandContext, ComponentContext, HandlerOutput,
    InteractionContext, InteractionHandler, ModalContext, SelectContext,
};
pub use inspector::{Inspector, InspectorDomain};
pub use pack::{
    ChatInput, Component, ContextMenu, InteractionRegistration, Pack, PackExtension, PackSnapshot,
};
