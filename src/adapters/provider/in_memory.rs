//! In-memory connection provider.
//!
//! Simulates the chat network for development and tests. Every opened
//! session gets an event channel the test (or the dev binary) drives with
//! [`InMemoryConnectionProvider::emit`]; every outbound call made through a
//! handle is recorded for verification.
//!
//! # Features
//!
//! - Scripted events per session
//! - Shared group metadata
//! - Error injection for `open` and individual handle operations
//! - Stalling every call that targets one group
//! - Call tracking
//!
//! # Example
//!
//! ```ignore
//! let provider = Arc::new(InMemoryConnectionProvider::new());
//! provider.set_group(metadata).await;
//! // ... orchestrator opens a session ...
//! provider.connect(&session_id, Some(identity)).await;
//! assert!(provider.sent_texts(&session_id).await.is_empty());
//! ```

use async_trait::async_trait;
use std::collections::{HashMap, HashSet};
use std::sync::Arc;
use tokio::sync::{mpsc, Mutex, Semaphore};

use crate::domain::foundation::{GroupId, MessageRef, ParticipantId, SessionId, Timestamp};
use crate::domain::session::{PairingArtifact, SessionIdentity};
use crate::ports::{
    ConnectionHandle, ConnectionProvider, ConnectionState, GroupDelta, GroupMetadata,
    InboundMessage, ParticipantOp, ProviderError, ProviderEvent, ProviderSession,
};

const DEFAULT_EVENT_BUFFER: usize = 64;

/// Outbound call recorded by a simulated handle.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum OutboundCall {
    Sent {
        session: SessionId,
        group: GroupId,
        text: String,
    },
    Deleted {
        session: SessionId,
        group: GroupId,
        message: MessageRef,
    },
    Participants {
        session: SessionId,
        group: GroupId,
        participants: Vec<ParticipantId>,
        op: ParticipantOp,
    },
    LoggedOut {
        session: SessionId,
    },
}

impl OutboundCall {
    pub fn session(&self) -> &SessionId {
        match self {
            OutboundCall::Sent { session, .. }
            | OutboundCall::Deleted { session, .. }
            | OutboundCall::Participants { session, .. }
            | OutboundCall::LoggedOut { session } => session,
        }
    }
}

/// Handle operations that can be made to fail.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum HandleOp {
    Send,
    Delete,
    Participants,
    GroupMetadata,
    AllGroups,
    Logout,
}

#[derive(Debug, Default)]
struct SimState {
    senders: HashMap<SessionId, mpsc::Sender<ProviderEvent>>,
    open_counts: HashMap<SessionId, usize>,
    failing_opens: usize,
    failing_ops: HashSet<HandleOp>,
    groups: HashMap<GroupId, GroupMetadata>,
    /// Zero-permit gates; closing one releases every waiter.
    stalled: HashMap<GroupId, Arc<Semaphore>>,
    calls: Vec<OutboundCall>,
}

/// Simulated connection provider.
#[derive(Debug, Clone)]
pub struct InMemoryConnectionProvider {
    state: Arc<Mutex<SimState>>,
    event_buffer: usize,
    auto_pairing: bool,
}

impl Default for InMemoryConnectionProvider {
    fn default() -> Self {
        Self::new()
    }
}

impl InMemoryConnectionProvider {
    pub fn new() -> Self {
        Self {
            state: Arc::new(Mutex::new(SimState::default())),
            event_buffer: DEFAULT_EVENT_BUFFER,
            auto_pairing: false,
        }
    }

    /// Emit a pairing artifact as soon as a session is opened.
    pub fn with_auto_pairing(mut self) -> Self {
        self.auto_pairing = true;
        self
    }

    pub fn with_event_buffer(mut self, size: usize) -> Self {
        self.event_buffer = size.max(1);
        self
    }

    // === Scripting ===

    /// Deliver `event` to the session's stream. Returns false if the session
    /// was never opened or its stream is gone.
    pub async fn emit(&self, session: &SessionId, event: ProviderEvent) -> bool {
        let sender = self.state.lock().await.senders.get(session).cloned();
        match sender {
            Some(tx) => tx.send(event).await.is_ok(),
            None => false,
        }
    }

    pub async fn pair(&self, session: &SessionId, artifact: &str) -> bool {
        self.emit(session, ProviderEvent::QrReady(PairingArtifact::new(artifact)))
            .await
    }

    pub async fn connect(&self, session: &SessionId, identity: Option<SessionIdentity>) -> bool {
        self.emit(
            session,
            ProviderEvent::StateChanged {
                state: ConnectionState::Open,
                identity,
            },
        )
        .await
    }

    pub async fn drop_connection(&self, session: &SessionId, logged_out: bool) -> bool {
        self.emit(
            session,
            ProviderEvent::StateChanged {
                state: ConnectionState::Closed { logged_out },
                identity: None,
            },
        )
        .await
    }

    pub async fn deliver(&self, session: &SessionId, message: InboundMessage) -> bool {
        self.emit(session, ProviderEvent::InboundMessage(message)).await
    }

    pub async fn group_changed(&self, session: &SessionId, delta: GroupDelta) -> bool {
        self.emit(session, ProviderEvent::GroupMetadataChanged(delta))
            .await
    }

    // === Network state ===

    pub async fn set_group(&self, metadata: GroupMetadata) {
        self.state
            .lock()
            .await
            .groups
            .insert(metadata.id.clone(), metadata);
    }

    pub async fn remove_group(&self, group: &GroupId) {
        self.state.lock().await.groups.remove(group);
    }

    // === Error injection ===

    /// Fail the next `count` calls to `open`.
    pub async fn fail_next_opens(&self, count: usize) {
        self.state.lock().await.failing_opens = count;
    }

    pub async fn fail_operation(&self, op: HandleOp, fail: bool) {
        let mut state = self.state.lock().await;
        if fail {
            state.failing_ops.insert(op);
        } else {
            state.failing_ops.remove(&op);
        }
    }

    /// Hold every handle call that targets `group` until released.
    pub async fn stall_group(&self, group: &GroupId) {
        self.state
            .lock()
            .await
            .stalled
            .entry(group.clone())
            .or_insert_with(|| Arc::new(Semaphore::new(0)));
    }

    pub async fn release_group(&self, group: &GroupId) {
        if let Some(gate) = self.state.lock().await.stalled.remove(group) {
            gate.close();
        }
    }

    // === Call tracking ===

    pub async fn calls(&self) -> Vec<OutboundCall> {
        self.state.lock().await.calls.clone()
    }

    pub async fn sent_texts(&self, session: &SessionId) -> Vec<String> {
        self.state
            .lock()
            .await
            .calls
            .iter()
            .filter_map(|call| match call {
                OutboundCall::Sent { session: s, text, .. } if s == session => Some(text.clone()),
                _ => None,
            })
            .collect()
    }

    pub async fn open_count(&self, session: &SessionId) -> usize {
        self.state
            .lock()
            .await
            .open_counts
            .get(session)
            .copied()
            .unwrap_or(0)
    }
}

#[async_trait]
impl ConnectionProvider for InMemoryConnectionProvider {
    async fn open(&self, session: &SessionId) -> Result<ProviderSession, ProviderError> {
        let (tx, rx) = mpsc::channel(self.event_buffer);
        {
            let mut state = self.state.lock().await;
            *state.open_counts.entry(session.clone()).or_insert(0) += 1;
            if state.failing_opens > 0 {
                state.failing_opens -= 1;
                return Err(ProviderError::Unavailable("simulated open failure".into()));
            }
            state.senders.insert(session.clone(), tx.clone());
        }

        if self.auto_pairing {
            let artifact = format!("pair:{}:{}", session, Timestamp::now().as_unix_secs());
            // Fresh channel with spare capacity; cannot be full.
            let _ = tx.try_send(ProviderEvent::QrReady(PairingArtifact::new(artifact)));
        }

        Ok(ProviderSession {
            handle: Arc::new(InMemoryHandle {
                session: session.clone(),
                state: Arc::clone(&self.state),
            }),
            events: rx,
        })
    }
}

struct InMemoryHandle {
    session: SessionId,
    state: Arc<Mutex<SimState>>,
}

impl InMemoryHandle {
    async fn wait_if_stalled(&self, group: &GroupId) {
        let gate = self.state.lock().await.stalled.get(group).cloned();
        if let Some(gate) = gate {
            // Fails once the gate is closed, which is the release signal.
            let _ = gate.acquire().await;
        }
    }

    fn check(state: &SimState, op: HandleOp) -> Result<(), ProviderError> {
        if state.failing_ops.contains(&op) {
            return Err(ProviderError::Unavailable(format!("simulated {op:?} failure")));
        }
        Ok(())
    }
}

#[async_trait]
impl ConnectionHandle for InMemoryHandle {
    async fn send_text(&self, conversation: &GroupId, text: &str) -> Result<(), ProviderError> {
        self.wait_if_stalled(conversation).await;
        let mut state = self.state.lock().await;
        Self::check(&state, HandleOp::Send)?;
        state.calls.push(OutboundCall::Sent {
            session: self.session.clone(),
            group: conversation.clone(),
            text: text.to_string(),
        });
        Ok(())
    }

    async fn delete_message(
        &self,
        conversation: &GroupId,
        message: &MessageRef,
    ) -> Result<(), ProviderError> {
        self.wait_if_stalled(conversation).await;
        let mut state = self.state.lock().await;
        Self::check(&state, HandleOp::Delete)?;
        state.calls.push(OutboundCall::Deleted {
            session: self.session.clone(),
            group: conversation.clone(),
            message: message.clone(),
        });
        Ok(())
    }

    async fn update_participants(
        &self,
        group: &GroupId,
        participants: &[ParticipantId],
        op: ParticipantOp,
    ) -> Result<(), ProviderError> {
        self.wait_if_stalled(group).await;
        let mut state = self.state.lock().await;
        Self::check(&state, HandleOp::Participants)?;
        state.calls.push(OutboundCall::Participants {
            session: self.session.clone(),
            group: group.clone(),
            participants: participants.to_vec(),
            op,
        });
        Ok(())
    }

    async fn fetch_group_metadata(&self, group: &GroupId) -> Result<GroupMetadata, ProviderError> {
        self.wait_if_stalled(group).await;
        let state = self.state.lock().await;
        Self::check(&state, HandleOp::GroupMetadata)?;
        state
            .groups
            .get(group)
            .cloned()
            .ok_or_else(|| ProviderError::Rejected(format!("unknown group {group}")))
    }

    async fn fetch_all_groups(&self) -> Result<Vec<GroupMetadata>, ProviderError> {
        let state = self.state.lock().await;
        Self::check(&state, HandleOp::AllGroups)?;
        let mut groups: Vec<_> = state.groups.values().cloned().collect();
        groups.sort_by(|a, b| a.id.cmp(&b.id));
        Ok(groups)
    }

    async fn logout(&self) -> Result<(), ProviderError> {
        let mut state = self.state.lock().await;
        Self::check(&state, HandleOp::Logout)?;
        state.calls.push(OutboundCall::LoggedOut {
            session: self.session.clone(),
        });
        state.senders.remove(&self.session);
        Ok(())
    }
}
