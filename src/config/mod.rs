//! Application configuration module
//!
//! Configuration is loaded from environment variables with the
//! `GROUP_SENTINEL` prefix using the `config` and `dotenvy` crates.
//! Nested values use double underscores as separators.
//!
//! # Example
//!
//! ```no_run
//! use group_sentinel::config::AppConfig;
//!
//! let config = AppConfig::load().expect("Failed to load configuration");
//! config.validate().expect("Invalid configuration");
//! ```

mod bot;
mod error;
mod moderation;
mod orchestrator;
mod realtime;
mod server;

pub use bot::BotConfig;
pub use error::{ConfigError, ValidationError};
pub use moderation::ModerationConfig;
pub use orchestrator::OrchestratorConfig;
pub use realtime::RealtimeConfig;
pub use server::{Environment, ServerConfig};

use serde::Deserialize;

/// Root application configuration
///
/// Every section has defaults; only `realtime.jwt_secret` must be supplied
/// for [`AppConfig::validate`] to pass.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct AppConfig {
    /// Server configuration (host, port, environment)
    #[serde(default)]
    pub server: ServerConfig,

    /// Session worker queues and reconnect backoff
    #[serde(default)]
    pub orchestrator: OrchestratorConfig,

    /// Operator channel fan-out
    #[serde(default)]
    pub realtime: RealtimeConfig,

    /// Flood window housekeeping
    #[serde(default)]
    pub moderation: ModerationConfig,

    #[serde(default)]
    pub bot: BotConfig,
}

impl AppConfig {
    /// Load configuration from environment variables
    ///
    /// - `GROUP_SENTINEL__SERVER__PORT=8080` -> `server.port = 8080`
    /// - `GROUP_SENTINEL__REALTIME__JWT_SECRET=...` -> `realtime.jwt_secret = ...`
    ///
    /// # Errors
    ///
    /// Returns `ConfigError` if values cannot be parsed into expected types.
    pub fn load() -> Result<Self, ConfigError> {
        // Load .env file if present (development)
        dotenvy::dotenv().ok();

        let config = config::Config::builder()
            .add_source(
                config::Environment::default()
                    .prefix("GROUP_SENTINEL")
                    .prefix_separator("__")
                    .separator("__"),
            )
            .build()?
            .try_deserialize()?;

        Ok(config)
    }

    /// Validate all configuration values
    pub fn validate(&self) -> Result<(), ValidationError> {
        self.server.validate()?;
        self.orchestrator.validate()?;
        self.realtime.validate(&self.server.environment)?;
        self.moderation.validate()?;
        Ok(())
    }

    /// Check if running in production environment
    pub fn is_production(&self) -> bool {
        self.server.is_production()
    }
}
