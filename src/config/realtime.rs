//! Realtime fan-out configuration

use serde::Deserialize;

use super::error::ValidationError;
use super::server::Environment;

const MIN_PRODUCTION_SECRET_LEN: usize = 32;

/// Operator channel settings
#[derive(Debug, Clone, Deserialize)]
pub struct RealtimeConfig {
    /// Per-channel buffer; a channel that fills up is dropped
    #[serde(default = "default_channel_capacity")]
    pub channel_capacity: usize,

    /// HS256 secret for operator channel tokens
    #[serde(default)]
    pub jwt_secret: String,
}

impl RealtimeConfig {
    pub fn validate(&self, environment: &Environment) -> Result<(), ValidationError> {
        if self.channel_capacity == 0 {
            return Err(ValidationError::MustBePositive("realtime.channel_capacity"));
        }
        if self.jwt_secret.is_empty() {
            return Err(ValidationError::MissingRequired("REALTIME__JWT_SECRET"));
        }
        if *environment == Environment::Production
            && self.jwt_secret.len() < MIN_PRODUCTION_SECRET_LEN
        {
            return Err(ValidationError::WeakJwtSecret(MIN_PRODUCTION_SECRET_LEN));
        }
        Ok(())
    }
}

impl Default for RealtimeConfig {
    fn default() -> Self {
        Self {
            channel_capacity: default_channel_capacity(),
            jwt_secret: String::new(),
        }
    }
}

fn default_channel_capacity() -> usize {
    64
}
