//! Domain layer containing business logic and domain types.
//!
//! # Module Organization
//!
//! - `foundation` - Shared domain primitives (IDs, timestamps, errors, state machine)
//! - `session` - Tenant session lifecycle
//! - `policy` - Typed per-group policy, patches and group records
//! - `moderation` - Pure moderation rules (links, prohibited words, auto-responses)
//! - `commands` - Command catalog, permission tiers and parsing
//! - `audit` - Audit entries

pub mod audit;
pub mod commands;
pub mod foundation;
pub mod moderation;
pub mod policy;
pub mod session;
