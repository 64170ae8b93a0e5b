//! Prefixed administrative commands.

mod builtins;
mod dispatcher;

pub use dispatcher::{BotProfile, CommandDispatcher, CommandOutcome};
