//! ConnectionProvider port - the chat network as a supplied capability.
//!
//! The wire protocol is out of our hands. A provider opens one session at a
//! time and hands back a handle for outbound calls plus an ordered stream of
//! tagged events. Each session's event stream is consumed by exactly one
//! worker task in the orchestrator.

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::sync::Arc;
use thiserror::Error;
use tokio::sync::mpsc;

use crate::domain::foundation::{GroupId, MessageRef, ParticipantId, SessionId, Timestamp};
use crate::domain::session::{PairingArtifact, SessionIdentity};

/// Errors from the connection provider.
///
/// Transient while a session is open; fatal when raised by `open`.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ProviderError {
    #[error("Provider unavailable: {0}")]
    Unavailable(String),

    #[error("Provider rejected the request: {0}")]
    Rejected(String),

    #[error("Provider call timed out")]
    Timeout,

    #[error("Connection closed")]
    Closed,
}

/// Connection state as reported by the provider.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConnectionState {
    Connecting,
    Open,
    Closed { logged_out: bool },
}

/// A message received in a conversation the session participates in.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct InboundMessage {
    pub conversation_id: GroupId,
    pub sender: ParticipantId,
    pub message_ref: MessageRef,
    pub body: String,
    pub from_self: bool,
    pub is_group: bool,
    pub timestamp: Timestamp,
}

/// Membership or subject change in a group.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct GroupDelta {
    pub group_id: GroupId,
    pub subject: Option<String>,
    pub joined: Vec<ParticipantId>,
}

/// Tagged events emitted by a provider session, in order.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ProviderEvent {
    QrReady(PairingArtifact),
    StateChanged {
        state: ConnectionState,
        identity: Option<SessionIdentity>,
    },
    InboundMessage(InboundMessage),
    GroupMetadataChanged(GroupDelta),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ParticipantRole {
    Member,
    Admin,
    SuperAdmin,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct GroupParticipant {
    pub id: ParticipantId,
    pub role: ParticipantRole,
}

/// Group metadata as reported by the provider.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct GroupMetadata {
    pub id: GroupId,
    pub subject: String,
    pub description: Option<String>,
    pub created_at: Option<Timestamp>,
    pub participants: Vec<GroupParticipant>,
}

impl GroupMetadata {
    /// Whether `participant` is an admin or superadmin of this group.
    pub fn is_admin(&self, participant: &ParticipantId) -> bool {
        self.participants.iter().any(|p| {
            &p.id == participant && matches!(p.role, ParticipantRole::Admin | ParticipantRole::SuperAdmin)
        })
    }

    pub fn admin_count(&self) -> usize {
        self.participants
            .iter()
            .filter(|p| p.role != ParticipantRole::Member)
            .count()
    }
}

/// Participant mutation requested through the handle.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ParticipantOp {
    Add,
    Remove,
    Promote,
    Demote,
}

impl fmt::Display for ParticipantOp {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            ParticipantOp::Add => "add",
            ParticipantOp::Remove => "remove",
            ParticipantOp::Promote => "promote",
            ParticipantOp::Demote => "demote",
        };
        f.write_str(s)
    }
}

/// Outbound operations on an open session.
///
/// Calls may fail or block; callers treat failure as recoverable.
#[async_trait]
pub trait ConnectionHandle: Send + Sync {
    async fn send_text(&self, conversation: &GroupId, text: &str) -> Result<(), ProviderError>;

    async fn delete_message(
        &self,
        conversation: &GroupId,
        message: &MessageRef,
    ) -> Result<(), ProviderError>;

    async fn update_participants(
        &self,
        group: &GroupId,
        participants: &[ParticipantId],
        op: ParticipantOp,
    ) -> Result<(), ProviderError>;

    async fn fetch_group_metadata(&self, group: &GroupId) -> Result<GroupMetadata, ProviderError>;

    async fn fetch_all_groups(&self) -> Result<Vec<GroupMetadata>, ProviderError>;

    async fn logout(&self) -> Result<(), ProviderError>;
}

/// An opened provider session.
pub struct ProviderSession {
    pub handle: Arc<dyn ConnectionHandle>,
    pub events: mpsc::Receiver<ProviderEvent>,
}

impl fmt::Debug for ProviderSession {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ProviderSession").finish_non_exhaustive()
    }
}

/// Port for opening sessions against the chat network.
#[async_trait]
pub trait ConnectionProvider: Send + Sync {
    /// Open (or resume) the connection for `session`.
    ///
    /// Stored credentials let the provider connect without pairing; otherwise
    /// it emits `QrReady` first.
    async fn open(&self, session: &SessionId) -> Result<ProviderSession, ProviderError>;
}
