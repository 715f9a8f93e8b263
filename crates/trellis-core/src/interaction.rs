//! Interaction classification and declarative schemas.
//!
//! Inbound payloads are treated opaquely except for the documented fields
//! carried by [`InteractionPayload`]. Everything the platform needs to know
//! about a registered command ahead of time (option schemas, localized
//! names) travels as a [`CommandDefinition`] to the publish collaborator.

use std::collections::HashMap;

use serde::{Deserialize, Serialize};
use serde_json::Value;

// =============================================================================
// Interaction Kinds
// =============================================================================

/// Every interaction category the dispatcher routes.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum InteractionKind {
    /// Slash command (including subcommand paths).
    ChatInput,
    /// Context-menu command on a user.
    UserContextMenu,
    /// Context-menu command on a message.
    MessageContextMenu,
    /// Button component.
    Button,
    /// Select menu over free-form string choices.
    StringSelect,
    /// Select menu over users.
    UserSelect,
    /// Select menu over roles.
    RoleSelect,
    /// Select menu over users and roles.
    MentionableSelect,
    /// Select menu over channels.
    ChannelSelect,
    /// Modal submission.
    Modal,
}

impl InteractionKind {
    /// Command family: routed by command name.
    pub fn is_command(self) -> bool {
        matches!(
            self,
            Self::ChatInput | Self::UserContextMenu | Self::MessageContextMenu
        )
    }

    /// Component family: routed by decoded custom identifier.
    pub fn is_component(self) -> bool {
        !self.is_command()
    }

    /// Select-menu subfamily.
    pub fn is_select(self) -> bool {
        matches!(
            self,
            Self::StringSelect
                | Self::UserSelect
                | Self::RoleSelect
                | Self::MentionableSelect
                | Self::ChannelSelect
        )
    }

    /// Stable lowercase name for logs and events.
    pub fn as_str(self) -> &'static str {
        match self {
            Self::ChatInput => "chat-input",
            Self::UserContextMenu => "user-context-menu",
            Self::MessageContextMenu => "message-context-menu",
            Self::Button => "button",
            Self::StringSelect => "string-select",
            Self::UserSelect => "user-select",
            Self::RoleSelect => "role-select",
            Self::MentionableSelect => "mentionable-select",
            Self::ChannelSelect => "channel-select",
            Self::Modal => "modal",
        }
    }
}

impl std::fmt::Display for InteractionKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

// =============================================================================
// Command Option Schemas
// =============================================================================

/// Value type of a command option.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum CommandOptionKind {
    String,
    Integer,
    Number,
    Boolean,
    User,
    Channel,
    Role,
    Mentionable,
    Attachment,
}

/// One predefined choice of a command option.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct CommandChoice {
    /// Display name.
    pub name: String,
    /// Value sent back by the platform.
    pub value: Value,
}

/// Declarative schema of one command option.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct CommandOption {
    /// Option name.
    pub name: String,
    /// Option description.
    pub description: String,
    /// Value type.
    pub kind: CommandOptionKind,
    /// Whether the option must be supplied.
    #[serde(default)]
    pub required: bool,
    /// Predefined choices, if any.
    #[serde(default)]
    pub choices: Vec<CommandChoice>,
    /// Whether the option offers autocomplete.
    #[serde(default)]
    pub autocomplete: bool,
}

// =============================================================================
// Inbound Payloads
// =============================================================================

/// The option currently being typed in an autocomplete interaction.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct FocusedOption {
    /// Name of the focused option.
    pub name: String,
    /// Partial value typed so far.
    pub value: Value,
}

/// One autocomplete suggestion.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct AutocompleteChoice {
    /// Display name.
    pub name: String,
    /// Value submitted when picked.
    pub value: Value,
}

/// Documented fields of an inbound interaction.
///
/// The full platform payload rides along in `raw` and is never interpreted
/// by the core.
#[derive(Clone, Debug)]
pub struct InteractionPayload {
    /// Interaction category.
    pub kind: InteractionKind,
    /// Space-joined command / subcommand-group / subcommand name
    /// (command family only).
    pub command_name: Option<String>,
    /// Custom identifier (component family only), still encoded.
    pub custom_id: Option<String>,
    /// Guild the interaction came from, if any.
    pub guild_id: Option<String>,
    /// User who triggered the interaction.
    pub user_id: Option<String>,
    /// Guild's preferred locale.
    pub guild_locale: Option<String>,
    /// User's preferred locale.
    pub user_locale: Option<String>,
    /// Selected values (select-menu kinds).
    pub values: Vec<String>,
    /// Focused option; present exactly when this is an autocomplete query.
    pub focused: Option<FocusedOption>,
    /// The untouched platform payload.
    pub raw: Value,
}

impl InteractionPayload {
    /// A minimal payload of the given kind; fields are filled in by the
    /// client adapter (or by tests).
    pub fn new(kind: InteractionKind) -> Self {
        Self {
            kind,
            command_name: None,
            custom_id: None,
            guild_id: None,
            user_id: None,
            guild_locale: None,
            user_locale: None,
            values: Vec::new(),
            focused: None,
            raw: Value::Null,
        }
    }
}

// =============================================================================
// Publish Descriptors
// =============================================================================

/// Everything the publish collaborator needs to upsert one command.
#[derive(Clone, Debug, Serialize)]
pub struct CommandDefinition {
    /// Registration id (author-assigned, not a platform id).
    pub id: String,
    /// Command family kind.
    pub kind: InteractionKind,
    /// Every literal name combination the registration answers to.
    pub combinations: Vec<String>,
    /// Description shown by the platform.
    pub description: String,
    /// Declarative option schemas.
    pub options: Vec<CommandOption>,
    /// Per-language localized full names, keyed by language tag.
    pub name_localizations: HashMap<String, String>,
    /// Per-language localized descriptions.
    pub description_localizations: HashMap<String, String>,
    /// Per-language option localizations, keyed by language then option
    /// name.
    pub option_localizations: HashMap<String, HashMap<String, crate::locale::OptionLocalization>>,
    /// Ancestor pack ids from the root to the owning pack.
    pub path: Vec<String>,
}

/// A platform-ready UI component descriptor produced by the root's
/// `build_component`.
#[derive(Clone, Debug, Serialize)]
pub struct ComponentDescriptor {
    /// Component kind.
    pub kind: InteractionKind,
    /// Fully encoded custom identifier (id + custom data).
    pub custom_id: String,
    /// Declarative options with any overrides applied.
    pub options: Value,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_kind_families() {
        assert!(InteractionKind::ChatInput.is_command());
        assert!(InteractionKind::UserContextMenu.is_command());
        assert!(InteractionKind::Button.is_component());
        assert!(InteractionKind::ChannelSelect.is_select());
        assert!(!InteractionKind::Modal.is_select());
        assert!(InteractionKind::Modal.is_component());
    }

    #[test]
    fn test_option_schema_serde_defaults() {
        let option: CommandOption = serde_json::from_value(serde_json::json!({
            "name": "query",
            "description": "what to search",
            "kind": "string"
        }))
        .unwrap();
        assert!(!option.required);
        assert!(option.choices.is_empty());
        assert!(!option.autocomplete);
    }
}
