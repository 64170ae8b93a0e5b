//! Group policy domain module.
//!
//! The typed per-group ruleset, the patch type that produces it, and the
//! group records discovered for each session.

mod errors;
mod group_policy;
mod patch;
mod record;
mod rules;

pub use errors::PolicyError;
pub use group_policy::{GroupPolicy, DEFAULT_PREFIX};
pub use patch::{
    AutoResponsePatch, CommandSettingPatch, PolicyPatch, WhitelistEntryPatch, MAX_FLOOD_LIMIT,
    MAX_FLOOD_TIMEFRAME_SECS, MAX_PREFIX_LEN,
};
pub use record::{GroupKey, GroupRecord};
pub use rules::{
    AntiFloodRule, AntiLinkRule, AntiProfanityRule, AutoResponse, MatchMode, RuleAction,
    WhitelistEntry, DEFAULT_FLOOD_LIMIT, DEFAULT_FLOOD_TIMEFRAME_SECS,
};
