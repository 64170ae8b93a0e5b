//! Bot identity shown by the `info` command

use serde::Deserialize;

#[derive(Debug, Clone, Deserialize)]
pub struct BotConfig {
    #[serde(default = "default_name")]
    pub name: String,

    #[serde(default = "default_version")]
    pub version: String,
}

impl Default for BotConfig {
    fn default() -> Self {
        Self {
            name: default_name(),
            version: default_version(),
        }
    }
}

fn default_name() -> String {
    "Group Sentinel".to_string()
}

fn default_version() -> String {
    env!("CARGO_PKG_VERSION").to_string()
}
