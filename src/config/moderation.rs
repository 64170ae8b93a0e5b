//! Moderation runtime configuration

use serde::Deserialize;
use std::time::Duration;

use super::error::ValidationError;

/// Flood window housekeeping
#[derive(Debug, Clone, Deserialize)]
pub struct ModerationConfig {
    /// How often idle flood windows are swept
    #[serde(default = "default_sweep_interval")]
    pub flood_sweep_interval_secs: u64,

    /// Windows with no entry newer than this are dropped by the sweep
    #[serde(default = "default_flood_idle")]
    pub flood_idle_secs: u64,
}

impl ModerationConfig {
    pub fn flood_sweep_interval(&self) -> Duration {
        Duration::from_secs(self.flood_sweep_interval_secs)
    }

    pub fn flood_idle(&self) -> Duration {
        Duration::from_secs(self.flood_idle_secs)
    }

    pub fn validate(&self) -> Result<(), ValidationError> {
        if self.flood_sweep_interval_secs == 0 {
            return Err(ValidationError::MustBePositive(
                "moderation.flood_sweep_interval_secs",
            ));
        }
        if self.flood_idle_secs < self.flood_sweep_interval_secs {
            return Err(ValidationError::InvalidFloodSweep);
        }
        Ok(())
    }
}

impl Default for ModerationConfig {
    fn default() -> Self {
        Self {
            flood_sweep_interval_secs: default_sweep_interval(),
            flood_idle_secs: default_flood_idle(),
        }
    }
}

fn default_sweep_interval() -> u64 {
    300
}

fn default_flood_idle() -> u64 {
    3600
}
