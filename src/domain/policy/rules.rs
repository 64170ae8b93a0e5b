//! Rule building blocks of a group policy.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;
use std::time::Duration;

use crate::domain::foundation::ValidationError;

/// Action taken when a moderation rule triggers.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum RuleAction {
    #[default]
    Delete,
    Warn,
    Mute,
    Ban,
}

impl RuleAction {
    pub fn as_str(&self) -> &'static str {
        match self {
            RuleAction::Delete => "delete",
            RuleAction::Warn => "warn",
            RuleAction::Mute => "mute",
            RuleAction::Ban => "ban",
        }
    }
}

impl fmt::Display for RuleAction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for RuleAction {
    type Err = ValidationError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "delete" => Ok(RuleAction::Delete),
            "warn" => Ok(RuleAction::Warn),
            "mute" => Ok(RuleAction::Mute),
            "ban" => Ok(RuleAction::Ban),
            other => Err(ValidationError::invalid_format(
                "action",
                format!("unknown action '{other}'"),
            )),
        }
    }
}

/// How a whitelist pattern is compared against a detected link.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum MatchMode {
    /// Whole link equals the pattern, ignoring scheme, `www.` and host case.
    Exact,
    /// Pattern appears anywhere in the link.
    #[default]
    #[serde(alias = "contains")]
    Substring,
    /// Link contains the pattern's leading domain label.
    #[serde(alias = "similar")]
    Token,
}

impl MatchMode {
    pub fn as_str(&self) -> &'static str {
        match self {
            MatchMode::Exact => "exact",
            MatchMode::Substring => "substring",
            MatchMode::Token => "token",
        }
    }
}

impl FromStr for MatchMode {
    type Err = ValidationError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "exact" => Ok(MatchMode::Exact),
            "substring" | "contains" => Ok(MatchMode::Substring),
            "token" | "similar" => Ok(MatchMode::Token),
            other => Err(ValidationError::invalid_format(
                "matchMode",
                format!("unknown match mode '{other}'"),
            )),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct WhitelistEntry {
    pub pattern: String,
    pub match_mode: MatchMode,
}

impl WhitelistEntry {
    pub fn new(pattern: impl Into<String>, match_mode: MatchMode) -> Self {
        Self {
            pattern: pattern.into(),
            match_mode,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AutoResponse {
    pub keyword: String,
    pub response: String,
}

/// Link filter settings.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct AntiLinkRule {
    #[serde(rename = "antiLinkActive")]
    pub active: bool,
    #[serde(rename = "antiLinkAction")]
    pub action: RuleAction,
    pub whitelist: Vec<WhitelistEntry>,
}

/// Prohibited-word filter settings.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct AntiProfanityRule {
    #[serde(rename = "antiProfanityActive")]
    pub active: bool,
    #[serde(rename = "antiProfanityAction")]
    pub action: RuleAction,
    #[serde(rename = "prohibitedWords")]
    pub prohibited_words: Vec<String>,
}

pub const DEFAULT_FLOOD_LIMIT: u32 = 5;
pub const DEFAULT_FLOOD_TIMEFRAME_SECS: u64 = 60;

/// Per-sender rate settings.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AntiFloodRule {
    #[serde(rename = "antiFloodActive")]
    pub active: bool,
    #[serde(rename = "antiFloodAction")]
    pub action: RuleAction,
    pub limit: u32,
    #[serde(rename = "timeframeSeconds")]
    pub timeframe_seconds: u64,
}

impl AntiFloodRule {
    pub fn timeframe(&self) -> Duration {
        Duration::from_secs(self.timeframe_seconds)
    }
}

impl Default for AntiFloodRule {
    fn default() -> Self {
        Self {
            active: false,
            action: RuleAction::Delete,
            limit: DEFAULT_FLOOD_LIMIT,
            timeframe_seconds: DEFAULT_FLOOD_TIMEFRAME_SECS,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn legacy_match_mode_names_deserialize() {
        let entry: WhitelistEntry =
            serde_json::from_str(r#"{"pattern":"a.com","matchMode":"contains"}"#).unwrap();
        assert_eq!(entry.match_mode, MatchMode::Substring);
        let entry: WhitelistEntry =
            serde_json::from_str(r#"{"pattern":"a.com","matchMode":"similar"}"#).unwrap();
        assert_eq!(entry.match_mode, MatchMode::Token);
    }

    #[test]
    fn action_parses_case_insensitively() {
        assert_eq!("BAN".parse::<RuleAction>().unwrap(), RuleAction::Ban);
        let err = "kick".parse::<RuleAction>().unwrap_err();
        assert_eq!(err.field(), "action");
    }

    #[test]
    fn flood_defaults() {
        let rule = AntiFloodRule::default();
        assert!(!rule.active);
        assert_eq!(rule.limit, 5);
        assert_eq!(rule.timeframe(), Duration::from_secs(60));
    }
}
