//! TenantSession aggregate.
//!
//! A session is one authenticated connection of a tenant to the messaging
//! network. The aggregate only tracks lifecycle facts; the live connection
//! handle and worker tasks are owned by the orchestrator.

use serde::{Deserialize, Serialize};

use crate::domain::foundation::{ParticipantId, SessionId, StateMachine, TenantId, Timestamp};

use super::{SessionError, SessionState};

/// Number of state changes retained for diagnostics.
pub const MAX_HISTORY: usize = 32;

/// One-time scannable payload used to pair a new session.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct PairingArtifact(String);

impl PairingArtifact {
    pub fn new(payload: impl Into<String>) -> Self {
        Self(payload.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

/// Account identity reported once a session is connected.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SessionIdentity {
    pub account: ParticipantId,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub display_name: Option<String>,
}

/// Tenant session aggregate.
///
/// # Invariants
///
/// - `state` only changes along the [`SessionState`] graph
/// - `pairing` is present only while `AwaitingScan`
/// - `history` holds the most recent states, oldest first
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TenantSession {
    id: SessionId,
    tenant_id: TenantId,
    state: SessionState,
    #[serde(skip_serializing_if = "Option::is_none")]
    pairing: Option<PairingArtifact>,
    #[serde(skip_serializing_if = "Option::is_none")]
    identity: Option<SessionIdentity>,
    /// Set when an operator asked for the disconnect; suppresses reconnects.
    operator_disconnected: bool,
    reconnect_attempts: u32,
    last_activity: Timestamp,
    created_at: Timestamp,
    history: Vec<SessionState>,
}

impl TenantSession {
    /// Create a new session in `Initializing`.
    pub fn new(id: SessionId, tenant_id: TenantId) -> Self {
        let now = Timestamp::now();
        Self {
            id,
            tenant_id,
            state: SessionState::Initializing,
            pairing: None,
            identity: None,
            operator_disconnected: false,
            reconnect_attempts: 0,
            last_activity: now,
            created_at: now,
            history: vec![SessionState::Initializing],
        }
    }

    // ─────────────────────────────────────────────────────────────────────────
    // Accessors
    // ─────────────────────────────────────────────────────────────────────────

    pub fn id(&self) -> &SessionId {
        &self.id
    }

    pub fn tenant_id(&self) -> &TenantId {
        &self.tenant_id
    }

    pub fn state(&self) -> SessionState {
        self.state
    }

    pub fn pairing(&self) -> Option<&PairingArtifact> {
        self.pairing.as_ref()
    }

    pub fn identity(&self) -> Option<&SessionIdentity> {
        self.identity.as_ref()
    }

    pub fn is_operator_disconnected(&self) -> bool {
        self.operator_disconnected
    }

    pub fn reconnect_attempts(&self) -> u32 {
        self.reconnect_attempts
    }

    pub fn last_activity(&self) -> &Timestamp {
        &self.last_activity
    }

    pub fn created_at(&self) -> &Timestamp {
        &self.created_at
    }

    /// Recent states, oldest first.
    pub fn history(&self) -> &[SessionState] {
        &self.history
    }

    // ─────────────────────────────────────────────────────────────────────────
    // Lifecycle
    // ─────────────────────────────────────────────────────────────────────────

    /// Record a fresh pairing artifact.
    ///
    /// A refreshed artifact while already `AwaitingScan` replaces the old
    /// one without a state change.
    pub fn await_scan(&mut self, artifact: PairingArtifact) -> Result<(), SessionError> {
        if self.state != SessionState::AwaitingScan {
            self.transition(SessionState::AwaitingScan)?;
        }
        self.pairing = Some(artifact);
        Ok(())
    }

    /// Mark the session connected and capture its identity.
    pub fn connect(&mut self, identity: Option<SessionIdentity>) -> Result<(), SessionError> {
        self.transition(SessionState::Connected)?;
        self.pairing = None;
        if identity.is_some() {
            self.identity = identity;
        }
        self.reconnect_attempts = 0;
        self.operator_disconnected = false;
        Ok(())
    }

    /// Move to `Disconnected`.
    ///
    /// Returns `false` when the session was already disconnected (no-op).
    pub fn disconnect(&mut self, by_operator: bool) -> Result<bool, SessionError> {
        if self.state == SessionState::Disconnected {
            self.operator_disconnected |= by_operator;
            return Ok(false);
        }
        self.transition(SessionState::Disconnected)?;
        self.pairing = None;
        self.operator_disconnected = by_operator;
        Ok(true)
    }

    /// Re-enter `Initializing` from `Disconnected` (reconnect or restart).
    pub fn reinitialize(&mut self, is_retry: bool) -> Result<(), SessionError> {
        self.transition(SessionState::Initializing)?;
        self.operator_disconnected = false;
        if is_retry {
            self.reconnect_attempts = self.reconnect_attempts.saturating_add(1);
        } else {
            self.reconnect_attempts = 0;
        }
        Ok(())
    }

    /// Terminal failure (construction failure or explicit logout).
    pub fn fail(&mut self) -> Result<(), SessionError> {
        self.transition(SessionState::Failed)?;
        self.pairing = None;
        Ok(())
    }

    /// Refresh the last-activity timestamp.
    pub fn touch(&mut self) {
        self.last_activity = Timestamp::now();
    }

    fn transition(&mut self, target: SessionState) -> Result<(), SessionError> {
        self.state
            .transition_to(target)
            .map_err(|_| SessionError::InvalidTransition {
                from: self.state,
                to: target,
            })?;
        self.state = target;
        if self.history.len() == MAX_HISTORY {
            self.history.remove(0);
        }
        self.history.push(target);
        Ok(())
    }
}
