//! Partial policy updates arriving from the configuration API.
//!
//! Patch fields are loosely typed on purpose: this is the trust boundary
//! where strings and integers become a typed [`GroupPolicy`]. Nothing
//! downstream re-validates.

use serde::Deserialize;
use std::collections::BTreeMap;

use crate::domain::commands::{lookup, CommandSetting, CommandTier};
use crate::domain::foundation::ValidationError;

use super::{AutoResponse, GroupPolicy, MatchMode, RuleAction, WhitelistEntry};

pub const MAX_PREFIX_LEN: usize = 10;
pub const MAX_FLOOD_LIMIT: i64 = 1_000;
pub const MAX_FLOOD_TIMEFRAME_SECS: i64 = 86_400;

const PREFIX_CHARSET: &str = "!@#$%^&*()_+-=[]{};':\"\\|,.<>/?";

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct WhitelistEntryPatch {
    #[serde(alias = "url")]
    pub pattern: String,
    #[serde(default, alias = "type")]
    pub match_mode: Option<String>,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct AutoResponsePatch {
    pub keyword: String,
    pub response: String,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct CommandSettingPatch {
    #[serde(default)]
    pub tier: Option<String>,
    #[serde(default)]
    pub enabled: Option<bool>,
}

/// Partial update of a [`GroupPolicy`]. Absent fields are left unchanged.
///
/// An empty `welcomeMessage` or `rulesMessage` clears the text.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase", deny_unknown_fields)]
pub struct PolicyPatch {
    pub prefix: Option<String>,
    pub welcome_message: Option<String>,
    pub rules_message: Option<String>,
    pub anti_link_active: Option<bool>,
    pub anti_link_action: Option<String>,
    pub whitelist: Option<Vec<WhitelistEntryPatch>>,
    pub anti_profanity_active: Option<bool>,
    pub anti_profanity_action: Option<String>,
    pub prohibited_words: Option<Vec<String>>,
    pub anti_flood_active: Option<bool>,
    pub anti_flood_action: Option<String>,
    pub limit: Option<i64>,
    pub timeframe_seconds: Option<i64>,
    pub admin_only_mode: Option<bool>,
    pub auto_responses: Option<Vec<AutoResponsePatch>>,
    pub active_commands: Option<BTreeMap<String, CommandSettingPatch>>,
}

impl PolicyPatch {
    /// Patch that only flips admin-only mode.
    pub fn admin_only(enabled: bool) -> Self {
        Self {
            admin_only_mode: Some(enabled),
            ..Self::default()
        }
    }

    /// Whether applying this patch changes who may speak in the group.
    pub fn touches_admin_only(&self) -> bool {
        self.admin_only_mode.is_some()
    }

    /// Validates the patch and returns the merged policy.
    ///
    /// `current` is never modified; on error the caller keeps it as is.
    pub fn apply(&self, current: &GroupPolicy) -> Result<GroupPolicy, ValidationError> {
        let mut next = current.clone();

        if let Some(prefix) = &self.prefix {
            next.prefix = validate_prefix(prefix)?;
        }
        if let Some(text) = &self.welcome_message {
            next.welcome_message = optional_text(text);
        }
        if let Some(text) = &self.rules_message {
            next.rules_message = optional_text(text);
        }

        if let Some(active) = self.anti_link_active {
            next.anti_link.active = active;
        }
        if let Some(action) = &self.anti_link_action {
            next.anti_link.action = parse_action("antiLinkAction", action)?;
        }
        if let Some(entries) = &self.whitelist {
            next.anti_link.whitelist = entries
                .iter()
                .map(validate_whitelist_entry)
                .collect::<Result<_, _>>()?;
        }

        if let Some(active) = self.anti_profanity_active {
            next.anti_profanity.active = active;
        }
        if let Some(action) = &self.anti_profanity_action {
            next.anti_profanity.action = parse_action("antiProfanityAction", action)?;
        }
        if let Some(words) = &self.prohibited_words {
            next.anti_profanity.prohibited_words = words
                .iter()
                .map(|w| non_blank("prohibitedWords", w))
                .collect::<Result<_, _>>()?;
        }

        if let Some(active) = self.anti_flood_active {
            next.anti_flood.active = active;
        }
        if let Some(action) = &self.anti_flood_action {
            next.anti_flood.action = parse_action("antiFloodAction", action)?;
        }
        if let Some(limit) = self.limit {
            next.anti_flood.limit = in_range("limit", limit, MAX_FLOOD_LIMIT)? as u32;
        }
        if let Some(secs) = self.timeframe_seconds {
            next.anti_flood.timeframe_seconds =
                in_range("timeframeSeconds", secs, MAX_FLOOD_TIMEFRAME_SECS)? as u64;
        }

        if let Some(admin_only) = self.admin_only_mode {
            next.admin_only_mode = admin_only;
        }
        if let Some(responses) = &self.auto_responses {
            next.auto_responses = responses
                .iter()
                .map(|r| {
                    Ok(AutoResponse {
                        keyword: non_blank("autoResponses.keyword", &r.keyword)?,
                        response: non_blank("autoResponses.response", &r.response)?,
                    })
                })
                .collect::<Result<_, ValidationError>>()?;
        }
        if let Some(commands) = &self.active_commands {
            for (name, patch) in commands {
                let name = name.trim().to_lowercase();
                let spec = lookup(&name).ok_or_else(|| {
                    ValidationError::invalid_format(
                        "activeCommands",
                        format!("unknown command '{name}'"),
                    )
                })?;
                let current = next
                    .active_commands
                    .get(&name)
                    .copied()
                    .unwrap_or(CommandSetting {
                        tier: spec.tier,
                        enabled: true,
                    });
                let tier = match &patch.tier {
                    Some(raw) => raw.parse::<CommandTier>()?,
                    None => current.tier,
                };
                let enabled = patch.enabled.unwrap_or(current.enabled);
                next.active_commands
                    .insert(name, CommandSetting { tier, enabled });
            }
        }

        Ok(next)
    }
}

fn validate_prefix(raw: &str) -> Result<String, ValidationError> {
    let prefix = raw.trim();
    if prefix.is_empty() {
        return Err(ValidationError::empty_field("prefix"));
    }
    if prefix.chars().count() > MAX_PREFIX_LEN {
        return Err(ValidationError::invalid_format(
            "prefix",
            format!("at most {MAX_PREFIX_LEN} characters"),
        ));
    }
    if !prefix.chars().all(|c| PREFIX_CHARSET.contains(c)) {
        return Err(ValidationError::invalid_format(
            "prefix",
            "only punctuation characters are allowed",
        ));
    }
    Ok(prefix.to_string())
}

fn optional_text(raw: &str) -> Option<String> {
    let text = raw.trim();
    (!text.is_empty()).then(|| text.to_string())
}

fn non_blank(field: &str, raw: &str) -> Result<String, ValidationError> {
    let text = raw.trim();
    if text.is_empty() {
        return Err(ValidationError::empty_field(field));
    }
    Ok(text.to_string())
}

fn parse_action(field: &str, raw: &str) -> Result<RuleAction, ValidationError> {
    raw.parse::<RuleAction>()
        .map_err(|_| ValidationError::invalid_format(field, format!("unknown action '{raw}'")))
}

fn in_range(field: &str, value: i64, max: i64) -> Result<i64, ValidationError> {
    if !(1..=max).contains(&value) {
        return Err(ValidationError::out_of_range(field, 1, max, value));
    }
    Ok(value)
}

fn validate_whitelist_entry(entry: &WhitelistEntryPatch) -> Result<WhitelistEntry, ValidationError> {
    let pattern = non_blank("whitelist.pattern", &entry.pattern)?;
    let match_mode = match &entry.match_mode {
        Some(raw) => raw.parse::<MatchMode>()?,
        None => MatchMode::default(),
    };
    Ok(WhitelistEntry::new(pattern, match_mode))
}
