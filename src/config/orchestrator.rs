//! Session orchestrator configuration

use serde::Deserialize;
use std::time::Duration;

use super::error::ValidationError;

/// Queue sizes and reconnect backoff for session workers
#[derive(Debug, Clone, Deserialize)]
pub struct OrchestratorConfig {
    /// Fixed delay before reconnecting an involuntarily dropped session
    #[serde(default = "default_reconnect_delay")]
    pub reconnect_delay_secs: u64,

    /// Buffer of each session worker's event queue
    #[serde(default = "default_event_buffer")]
    pub event_buffer: usize,

    /// Buffer of each per-group lane
    #[serde(default = "default_lane_buffer")]
    pub lane_buffer: usize,

    /// Buffer of the audit trail queue
    #[serde(default = "default_audit_buffer")]
    pub audit_buffer: usize,
}

impl OrchestratorConfig {
    pub fn reconnect_delay(&self) -> Duration {
        Duration::from_secs(self.reconnect_delay_secs)
    }

    pub fn validate(&self) -> Result<(), ValidationError> {
        if self.event_buffer == 0 {
            return Err(ValidationError::MustBePositive("orchestrator.event_buffer"));
        }
        if self.lane_buffer == 0 {
            return Err(ValidationError::MustBePositive("orchestrator.lane_buffer"));
        }
        if self.audit_buffer == 0 {
            return Err(ValidationError::MustBePositive("orchestrator.audit_buffer"));
        }
        Ok(())
    }
}

impl Default for OrchestratorConfig {
    fn default() -> Self {
        Self {
            reconnect_delay_secs: default_reconnect_delay(),
            event_buffer: default_event_buffer(),
            lane_buffer: default_lane_buffer(),
            audit_buffer: default_audit_buffer(),
        }
    }
}

fn default_reconnect_delay() -> u64 {
    5
}

fn default_event_buffer() -> usize {
    256
}

fn default_lane_buffer() -> usize {
    64
}

fn default_audit_buffer() -> usize {
    1024
}
