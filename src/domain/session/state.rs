//! SessionState enum for the connection lifecycle of a tenant session.

use serde::{Deserialize, Serialize};
use std::fmt;

use crate::domain::foundation::StateMachine;

/// Lifecycle state of a tenant session.
///
/// ```text
/// Initializing ──► AwaitingScan ──► Connected
///      │  └──────────────────────────▲   │
///      ▼              (any) ──► Disconnected ──► Initializing (reconnect)
///    Failed ◄─────────────────────────┘  (explicit logout)
/// ```
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
#[serde(rename_all = "snake_case")]
pub enum SessionState {
    #[default]
    Initializing,
    AwaitingScan,
    Connected,
    Disconnected,
    Failed,
}

impl SessionState {
    /// True for every state except `Failed`.
    ///
    /// A tenant may hold at most one live session at a time.
    pub fn is_live(&self) -> bool {
        !self.is_terminal()
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            SessionState::Initializing => "initializing",
            SessionState::AwaitingScan => "awaiting_scan",
            SessionState::Connected => "connected",
            SessionState::Disconnected => "disconnected",
            SessionState::Failed => "failed",
        }
    }
}

impl StateMachine for SessionState {
    fn valid_transitions(&self) -> Vec<Self> {
        use SessionState::*;
        match self {
            Initializing => vec![AwaitingScan, Connected, Disconnected, Failed],
            AwaitingScan => vec![Connected, Disconnected],
            Connected => vec![Disconnected],
            Disconnected => vec![Initializing, Failed],
            Failed => vec![],
        }
    }
}

impl fmt::Display for SessionState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}
