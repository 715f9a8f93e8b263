//! Typed handler contexts.
//!
//! Every dispatched interaction reaches its handler as one variant of
//! [`InteractionContext`] — a closed union in which each variant carries
//! exactly the fields its kind guarantees. There is no open, spreadable
//! context object: a button handler cannot see select values because
//! buttons do not have any.

use std::sync::Arc;

use futures::future::BoxFuture;
use serde_json::Value;

use trellis_core::codec::{DataValue, DecodedId};
use trellis_core::error::BoxError;
use trellis_core::interaction::{
    AutocompleteChoice, FocusedOption, InteractionKind, InteractionPayload,
};
use trellis_core::locale::ResolvedLocale;
use trellis_core::client::PlatformClient;

/// What a handler returns: an optional result value, or an error the
/// dispatch boundary reports.
pub type HandlerOutput = Result<Option<Value>, BoxError>;

/// Boxed interaction handler stored in registrations.
pub type InteractionHandler =
    Arc<dyn Fn(Arc<InteractionContext>) -> BoxFuture<'static, HandlerOutput> + Send + Sync>;

/// Boxed autocomplete handler stored per (command id, option name).
pub type AutocompleteHandler = Arc<
    dyn Fn(Arc<AutocompleteContext>) -> BoxFuture<'static, Result<Vec<AutocompleteChoice>, BoxError>>
        + Send
        + Sync,
>;

/// Context for the command family (slash and context-menu commands).
#[derive(Clone)]
pub struct CommandContext {
    /// Client the interaction arrived on.
    pub client: Arc<dyn PlatformClient>,
    /// Locale resolved from the payload's guild/user hints.
    pub locale: ResolvedLocale,
    /// The inbound payload.
    pub payload: InteractionPayload,
    /// The literal command name that matched.
    pub command: String,
}

/// Context for buttons.
#[derive(Clone)]
pub struct ComponentContext {
    /// Client the interaction arrived on.
    pub client: Arc<dyn PlatformClient>,
    /// Locale resolved from the payload's guild/user hints.
    pub locale: ResolvedLocale,
    /// The inbound payload.
    pub payload: InteractionPayload,
    /// Registered component id decoded from the custom identifier.
    pub component_id: String,
    /// Custom data decoded from the custom identifier.
    pub data: Vec<DataValue>,
}

/// Context for every select-menu kind: a component plus the selection.
#[derive(Clone)]
pub struct SelectContext {
    /// Client the interaction arrived on.
    pub client: Arc<dyn PlatformClient>,
    /// Locale resolved from the payload's guild/user hints.
    pub locale: ResolvedLocale,
    /// The inbound payload.
    pub payload: InteractionPayload,
    /// Registered component id decoded from the custom identifier.
    pub component_id: String,
    /// Custom data decoded from the custom identifier.
    pub data: Vec<DataValue>,
    /// Selected values.
    pub values: Vec<String>,
}

/// Context for modal submissions.
#[derive(Clone)]
pub struct ModalContext {
    /// Client the interaction arrived on.
    pub client: Arc<dyn PlatformClient>,
    /// Locale resolved from the payload's guild/user hints.
    pub locale: ResolvedLocale,
    /// The inbound payload.
    pub payload: InteractionPayload,
    /// Registered component id decoded from the custom identifier.
    pub component_id: String,
    /// Custom data decoded from the custom identifier.
    pub data: Vec<DataValue>,
    /// Submitted field values, passed through opaquely.
    pub fields: Value,
}

/// Context for autocomplete queries (a parallel dispatch path, not an
/// [`InteractionContext`] variant).
#[derive(Clone)]
pub struct AutocompleteContext {
    /// Client the interaction arrived on.
    pub client: Arc<dyn PlatformClient>,
    /// Locale resolved from the payload's guild/user hints.
    pub locale: ResolvedLocale,
    /// The inbound payload.
    pub payload: InteractionPayload,
    /// The literal command name that matched.
    pub command: String,
    /// The option being typed.
    pub focused: FocusedOption,
}

/// The closed union handed to interaction handlers.
#[derive(Clone)]
pub enum InteractionContext {
    /// Slash command.
    ChatInput(CommandContext),
    /// User context-menu command.
    UserContextMenu(CommandContext),
    /// Message context-menu command.
    MessageContextMenu(CommandContext),
    /// Button press.
    Button(ComponentContext),
    /// String select.
    StringSelect(SelectContext),
    /// User select.
    UserSelect(SelectContext),
    /// Role select.
    RoleSelect(SelectContext),
    /// Mentionable select.
    MentionableSelect(SelectContext),
    /// Channel select.
    ChannelSelect(SelectContext),
    /// Modal submission.
    Modal(ModalContext),
}

impl InteractionContext {
    /// Assembles the right variant for an inbound payload.
    ///
    /// `matched` is the resolved lookup key: the literal command name for
    /// the command family, or the decoded identifier for the component
    /// family.
    pub fn assemble(
        client: Arc<dyn PlatformClient>,
        locale: ResolvedLocale,
        payload: InteractionPayload,
        matched: &str,
        decoded: Option<DecodedId>,
    ) -> Self {
        let kind = payload.kind;
        match kind {
            InteractionKind::ChatInput
            | InteractionKind::UserContextMenu
            | InteractionKind::MessageContextMenu => {
                let ctx = CommandContext {
                    client,
                    locale,
                    payload,
                    command: matched.to_string(),
                };
                match kind {
                    InteractionKind::ChatInput => Self::ChatInput(ctx),
                    InteractionKind::UserContextMenu => Self::UserContextMenu(ctx),
                    _ => Self::MessageContextMenu(ctx),
                }
            }
            InteractionKind::Button => {
                let decoded = decoded.unwrap_or(DecodedId {
                    id: matched.to_string(),
                    data: Vec::new(),
                });
                Self::Button(ComponentContext {
                    client,
                    locale,
                    payload,
                    component_id: decoded.id,
                    data: decoded.data,
                })
            }
            InteractionKind::Modal => {
                let decoded = decoded.unwrap_or(DecodedId {
                    id: matched.to_string(),
                    data: Vec::new(),
                });
                let fields = payload
                    .raw
                    .get("fields")
                    .cloned()
                    .unwrap_or(Value::Null);
                Self::Modal(ModalContext {
                    client,
                    locale,
                    payload,
                    component_id: decoded.id,
                    data: decoded.data,
                    fields,
                })
            }
            _ => {
                let decoded = decoded.unwrap_or(DecodedId {
                    id: matched.to_string(),
                    data: Vec::new(),
                });
                let values = payload.values.clone();
                let ctx = SelectContext {
                    client,
                    locale,
                    payload,
                    component_id: decoded.id,
                    data: decoded.data,
                    values,
                };
                match kind {
                    InteractionKind::StringSelect => Self::StringSelect(ctx),
                    InteractionKind::UserSelect => Self::UserSelect(ctx),
                    InteractionKind::RoleSelect => Self::RoleSelect(ctx),
                    InteractionKind::MentionableSelect => Self::MentionableSelect(ctx),
                    _ => Self::ChannelSelect(ctx),
                }
            }
        }
    }

    /// The interaction kind of this context.
    pub fn kind(&self) -> InteractionKind {
        match self {
            Self::ChatInput(_) => InteractionKind::ChatInput,
            Self::UserContextMenu(_) => InteractionKind::UserContextMenu,
            Self::MessageContextMenu(_) => InteractionKind::MessageContextMenu,
            Self::Button(_) => InteractionKind::Button,
            Self::StringSelect(_) => InteractionKind::StringSelect,
            Self::UserSelect(_) => InteractionKind::UserSelect,
            Self::RoleSelect(_) => InteractionKind::RoleSelect,
            Self::MentionableSelect(_) => InteractionKind::MentionableSelect,
            Self::ChannelSelect(_) => InteractionKind::ChannelSelect,
            Self::Modal(_) => InteractionKind::Modal,
        }
    }

    /// The resolved locale, whatever the variant.
    pub fn locale(&self) -> &ResolvedLocale {
        match self {
            Self::ChatInput(c) | Self::UserContextMenu(c) | Self::MessageContextMenu(c) => {
                &c.locale
            }
            Self::Button(c) => &c.locale,
            Self::StringSelect(c)
            | Self::UserSelect(c)
            | Self::RoleSelect(c)
            | Self::MentionableSelect(c)
            | Self::ChannelSelect(c) => &c.locale,
            Self::Modal(c) => &c.locale,
        }
    }

    /// The client handle, whatever the variant.
    pub fn client(&self) -> &Arc<dyn PlatformClient> {
        match self {
            Self::ChatInput(c) | Self::UserContextMenu(c) | Self::MessageContextMenu(c) => {
                &c.client
            }
            Self::Button(c) => &c.client,
            Self::StringSelect(c)
            | Self::UserSelect(c)
            | Self::RoleSelect(c)
            | Self::MentionableSelect(c)
            | Self::ChannelSelect(c) => &c.client,
            Self::Modal(c) => &c.client,
        }
    }

    /// The inbound payload, whatever the variant.
    pub fn payload(&self) -> &InteractionPayload {
        match self {
            Self::ChatInput(c) | Self::UserContextMenu(c) | Self::MessageContextMenu(c) => {
                &c.payload
            }
            Self::Button(c) => &c.payload,
            Self::StringSelect(c)
            | Self::UserSelect(c)
            | Self::RoleSelect(c)
            | Self::MentionableSelect(c)
            | Self::ChannelSelect(c) => &c.payload,
            Self::Modal(c) => &c.payload,
        }
    }
}

impl std::fmt::Debug for InteractionContext {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("InteractionContext")
            .field("kind", &self.kind())
            .field("locale", self.locale())
            .finish()
    }
}
