//! Administrative command vocabulary: catalog, tiers and parsing.

mod catalog;
mod parser;

pub use catalog::{
    builtin_commands, default_command_settings, lookup, CommandSetting, CommandSpec, CommandTier,
};
pub use parser::ParsedCommand;
