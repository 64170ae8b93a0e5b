//! Shared fixtures for application-layer tests.

use std::sync::{Arc, Mutex};

use crate::adapters::provider::InMemoryConnectionProvider;
use crate::domain::foundation::{GroupId, MessageRef, ParticipantId, SessionId, TenantId, Timestamp};
use crate::domain::policy::GroupKey;
use crate::ports::{
    ConnectionHandle, ConnectionProvider, GroupMetadata, GroupParticipant, InboundMessage,
    LiveEvent, LiveEventKind, LiveEventPublisher, ParticipantRole, ProviderSession,
};

use super::MessageContext;

/// Publisher that keeps every event for inspection.
#[derive(Debug, Default)]
pub struct RecordingPublisher {
    events: Mutex<Vec<LiveEvent>>,
}

impl RecordingPublisher {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn events(&self) -> Vec<LiveEvent> {
        self.events.lock().unwrap().clone()
    }

    pub fn of_kind(&self, kind: LiveEventKind) -> Vec<LiveEvent> {
        self.events()
            .into_iter()
            .filter(|e| e.kind == kind)
            .collect()
    }
}

impl LiveEventPublisher for RecordingPublisher {
    fn publish(&self, event: LiveEvent) {
        self.events.lock().unwrap().push(event);
    }
}

pub fn tenant() -> TenantId {
    TenantId::new("tenant-1").unwrap()
}

pub fn session() -> SessionId {
    SessionId::new("session-1").unwrap()
}

pub fn group() -> GroupId {
    GroupId::new("120363@g.us").unwrap()
}

/// The default group as seen through the default session.
pub fn key() -> GroupKey {
    GroupKey::new(session(), group())
}

pub fn participant(id: &str) -> ParticipantId {
    ParticipantId::new(id).unwrap()
}

pub fn message(sender: &str, body: &str) -> InboundMessage {
    InboundMessage {
        conversation_id: group(),
        sender: participant(sender),
        message_ref: MessageRef::new(format!("msg-{}", body.len())).unwrap(),
        body: body.to_string(),
        from_self: false,
        is_group: true,
        timestamp: Timestamp::now(),
    }
}

/// Group with `admin@s.net` as admin and `member@s.net` as member.
pub fn metadata() -> GroupMetadata {
    GroupMetadata {
        id: group(),
        subject: "Test Group".to_string(),
        description: Some("A group for tests".to_string()),
        created_at: Some(Timestamp::from_unix_secs(1_700_000_000)),
        participants: vec![
            GroupParticipant {
                id: participant("admin@s.net"),
                role: ParticipantRole::Admin,
            },
            GroupParticipant {
                id: participant("member@s.net"),
                role: ParticipantRole::Member,
            },
        ],
    }
}

/// Opens a simulated session with the default group installed.
pub async fn open_handle(provider: &InMemoryConnectionProvider) -> (Arc<dyn ConnectionHandle>, ProviderSession) {
    provider.set_group(metadata()).await;
    let opened = provider.open(&session()).await.unwrap();
    (Arc::clone(&opened.handle), opened)
}

pub fn context(handle: Arc<dyn ConnectionHandle>, message: InboundMessage) -> MessageContext {
    MessageContext {
        tenant_id: tenant(),
        session_id: session(),
        identity: None,
        handle,
        message,
    }
}
