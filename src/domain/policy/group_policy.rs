//! GroupPolicy: the moderation and command ruleset of one group.

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

use crate::domain::commands::{default_command_settings, CommandSetting};
use crate::domain::foundation::{GroupId, SessionId};

use super::{AntiFloodRule, AntiLinkRule, AntiProfanityRule, AutoResponse, GroupKey};

pub const DEFAULT_PREFIX: &str = "!";

/// Typed, validated policy for a single group.
///
/// Serialized in the flat camelCase shape used by the configuration API.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct GroupPolicy {
    pub group_id: GroupId,
    pub session_id: SessionId,
    pub prefix: String,
    #[serde(default)]
    pub welcome_message: Option<String>,
    #[serde(default)]
    pub rules_message: Option<String>,
    #[serde(flatten)]
    pub anti_link: AntiLinkRule,
    #[serde(flatten)]
    pub anti_profanity: AntiProfanityRule,
    #[serde(flatten)]
    pub anti_flood: AntiFloodRule,
    pub admin_only_mode: bool,
    pub auto_responses: Vec<AutoResponse>,
    pub active_commands: BTreeMap<String, CommandSetting>,
}

impl GroupPolicy {
    /// Default policy: every rule off, `delete` actions, built-in commands.
    pub fn new(group_id: GroupId, session_id: SessionId) -> Self {
        Self {
            group_id,
            session_id,
            prefix: DEFAULT_PREFIX.to_string(),
            welcome_message: None,
            rules_message: None,
            anti_link: AntiLinkRule::default(),
            anti_profanity: AntiProfanityRule::default(),
            anti_flood: AntiFloodRule::default(),
            admin_only_mode: false,
            auto_responses: Vec::new(),
            active_commands: default_command_settings(),
        }
    }

    pub fn for_key(key: &GroupKey) -> Self {
        Self::new(key.group_id.clone(), key.session_id.clone())
    }

    pub fn key(&self) -> GroupKey {
        GroupKey::new(self.session_id.clone(), self.group_id.clone())
    }

    /// Setting for `name` if the command is present and enabled.
    pub fn enabled_command(&self, name: &str) -> Option<&CommandSetting> {
        self.active_commands.get(name).filter(|s| s.enabled)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::policy::RuleAction;

    fn policy() -> GroupPolicy {
        GroupPolicy::new(
            GroupId::new("g1@g.us").unwrap(),
            SessionId::new("s1").unwrap(),
        )
    }

    #[test]
    fn defaults_are_inactive() {
        let p = policy();
        assert_eq!(p.prefix, "!");
        assert!(!p.anti_link.active);
        assert!(!p.anti_profanity.active);
        assert!(!p.anti_flood.active);
        assert_eq!(p.anti_link.action, RuleAction::Delete);
        assert!(p.enabled_command("menu").is_some());
    }

    #[test]
    fn serializes_flat_camel_case() {
        let json = serde_json::to_value(policy()).unwrap();
        assert_eq!(json["prefix"], "!");
        assert_eq!(json["antiLinkActive"], false);
        assert_eq!(json["antiFloodAction"], "delete");
        assert_eq!(json["limit"], 5);
        assert_eq!(json["timeframeSeconds"], 60);
        assert_eq!(json["adminOnlyMode"], false);
        assert_eq!(json["activeCommands"]["ban"]["tier"], "admin");
        assert!(json.get("antiLink").is_none());
    }

    #[test]
    fn deserializes_persisted_shape() {
        let json = serde_json::to_string(&policy()).unwrap();
        let back: GroupPolicy = serde_json::from_str(&json).unwrap();
        assert_eq!(back, policy());
    }

    #[test]
    fn disabled_command_is_not_enabled() {
        let mut p = policy();
        if let Some(setting) = p.active_commands.get_mut("menu") {
            setting.enabled = false;
        }
        assert!(p.enabled_command("menu").is_none());
        assert!(p.enabled_command("nope").is_none());
    }
}
