//! Built-in command catalog and permission tiers.

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;
use std::str::FromStr;

use crate::domain::foundation::ValidationError;

/// Who may run a command.
///
/// Ordered from least to most privileged.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum CommandTier {
    /// Anyone in the group.
    Public,
    /// Group admins and superadmins.
    Admin,
    /// The tenant owner (elevated role plus a linked account).
    Owner,
}

impl CommandTier {
    pub fn as_str(&self) -> &'static str {
        match self {
            CommandTier::Public => "public",
            CommandTier::Admin => "admin",
            CommandTier::Owner => "owner",
        }
    }
}

impl fmt::Display for CommandTier {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for CommandTier {
    type Err = ValidationError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "public" => Ok(CommandTier::Public),
            "admin" => Ok(CommandTier::Admin),
            "owner" => Ok(CommandTier::Owner),
            other => Err(ValidationError::invalid_format(
                "tier",
                format!("unknown command tier '{other}'"),
            )),
        }
    }
}

/// Per-group enablement and tier of one command.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct CommandSetting {
    pub tier: CommandTier,
    pub enabled: bool,
}

/// Static description of a built-in command.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CommandSpec {
    pub name: &'static str,
    pub tier: CommandTier,
    pub description: &'static str,
}

const BUILTIN: &[CommandSpec] = &[
    CommandSpec { name: "menu", tier: CommandTier::Public, description: "Show available commands" },
    CommandSpec { name: "rules", tier: CommandTier::Public, description: "Display group rules" },
    CommandSpec { name: "info", tier: CommandTier::Public, description: "Bot information" },
    CommandSpec { name: "group", tier: CommandTier::Public, description: "Group information" },
    CommandSpec { name: "ban", tier: CommandTier::Admin, description: "Ban a user from the group" },
    CommandSpec { name: "kick", tier: CommandTier::Admin, description: "Remove a user from the group" },
    CommandSpec { name: "add", tier: CommandTier::Admin, description: "Add a user to the group" },
    CommandSpec { name: "promote", tier: CommandTier::Admin, description: "Promote a user to admin" },
    CommandSpec { name: "demote", tier: CommandTier::Admin, description: "Demote a user from admin" },
    CommandSpec { name: "mute", tier: CommandTier::Admin, description: "Enable admin-only mode" },
    CommandSpec { name: "unmute", tier: CommandTier::Admin, description: "Disable admin-only mode" },
    CommandSpec { name: "clear", tier: CommandTier::Admin, description: "Delete recent messages" },
    CommandSpec { name: "setwelcome", tier: CommandTier::Admin, description: "Set the welcome message" },
    CommandSpec { name: "antilink", tier: CommandTier::Admin, description: "Toggle anti-link protection" },
    CommandSpec { name: "warn", tier: CommandTier::Admin, description: "Warn a user" },
    CommandSpec { name: "groups", tier: CommandTier::Owner, description: "List all groups" },
];

/// All built-in commands in catalog order.
pub fn builtin_commands() -> &'static [CommandSpec] {
    BUILTIN
}

/// Looks up a built-in command by its lower-case name.
pub fn lookup(name: &str) -> Option<&'static CommandSpec> {
    BUILTIN.iter().find(|spec| spec.name == name)
}

/// Default command settings for a freshly discovered group.
pub fn default_command_settings() -> BTreeMap<String, CommandSetting> {
    BUILTIN
        .iter()
        .map(|spec| {
            (
                spec.name.to_string(),
                CommandSetting {
                    tier: spec.tier,
                    enabled: true,
                },
            )
        })
        .collect()
}
