//! Pure moderation rules.
//!
//! Everything here is synchronous and side-effect free. Rules that need
//! collaborators (group admin lookup, flood windows) are evaluated by the
//! moderation pipeline in the application layer.

mod links;

pub use links::{find_links, first_unwhitelisted, host_of, normalize_link};

use serde::{Deserialize, Serialize};
use std::fmt;

use crate::domain::policy::{AutoResponse, RuleAction};

/// Moderation rule that produced a decision, used as the audit tag.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RuleTag {
    AdminOnly,
    AntiLink,
    AntiProfanity,
    AntiFlood,
}

impl RuleTag {
    pub fn as_str(&self) -> &'static str {
        match self {
            RuleTag::AdminOnly => "admin_only",
            RuleTag::AntiLink => "anti_link",
            RuleTag::AntiProfanity => "anti_profanity",
            RuleTag::AntiFlood => "anti_flood",
        }
    }

    /// Reason shown to the group when a warning is sent.
    pub fn reason(&self) -> &'static str {
        match self {
            RuleTag::AdminOnly => "admin-only mode",
            RuleTag::AntiLink => "anti-link violation",
            RuleTag::AntiProfanity => "prohibited language",
            RuleTag::AntiFlood => "message flooding",
        }
    }
}

impl fmt::Display for RuleTag {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A triggered rule and the action it asks for.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Violation {
    pub rule: RuleTag,
    pub action: RuleAction,
}

/// First prohibited word contained in `body`, case-insensitively.
pub fn find_prohibited<'a>(body: &str, words: &'a [String]) -> Option<&'a str> {
    let lower = body.to_lowercase();
    words
        .iter()
        .map(String::as_str)
        .find(|word| !word.is_empty() && lower.contains(&word.to_lowercase()))
}

/// First auto-response whose keyword occurs in `body`, case-insensitively.
pub fn match_auto_response<'a>(body: &str, responses: &'a [AutoResponse]) -> Option<&'a AutoResponse> {
    let lower = body.to_lowercase();
    responses
        .iter()
        .find(|r| !r.keyword.is_empty() && lower.contains(&r.keyword.to_lowercase()))
}
