//! Session worker and per-group lanes.
//!
//! The worker is the only consumer of a provider event stream. Lifecycle
//! events are applied inline; group traffic is forwarded to a lane task per
//! group. Lanes and the discovery sync live in the worker's `JoinSet`, so
//! they stop with the worker.

use serde_json::json;
use std::collections::HashMap;
use std::sync::Arc;
use tokio::sync::mpsc;
use tokio::task::JoinSet;

use crate::application::MessageContext;
use crate::domain::audit::{AuditEntry, AuditKind};
use crate::domain::commands::ParsedCommand;
use crate::domain::foundation::GroupId;
use crate::domain::policy::{GroupKey, GroupRecord};
use crate::domain::session::{PairingArtifact, SessionIdentity};
use crate::ports::{ConnectionHandle, ConnectionState, GroupDelta, InboundMessage, ProviderEvent};

use super::entry::SessionEntry;
use super::Inner;

enum LaneItem {
    Message(InboundMessage),
    Delta(GroupDelta),
}

/// Everything a lane needs to act on behalf of the session.
#[derive(Clone)]
struct Shared {
    inner: Arc<Inner>,
    entry: Arc<SessionEntry>,
    handle: Arc<dyn ConnectionHandle>,
}

struct Worker {
    shared: Shared,
    lanes: HashMap<GroupId, mpsc::Sender<LaneItem>>,
    tasks: JoinSet<()>,
}

pub(super) async fn run(
    inner: Arc<Inner>,
    entry: Arc<SessionEntry>,
    handle: Arc<dyn ConnectionHandle>,
    mut events: mpsc::Receiver<ProviderEvent>,
) {
    let mut worker = Worker {
        shared: Shared {
            inner,
            entry,
            handle,
        },
        lanes: HashMap::new(),
        tasks: JoinSet::new(),
    };

    let mut logged_out = false;
    let mut closed = false;
    while let Some(event) = events.recv().await {
        if let Some(logout) = worker.handle_event(event).await {
            logged_out = logout;
            closed = true;
            break;
        }
        worker.reap();
    }
    if !closed {
        tracing::warn!(session_id = %worker.shared.entry.id, "Provider event stream ended");
    }
    worker.tasks.abort_all();
    worker.shared.closed(logged_out);
}

impl Worker {
    /// Apply one event. Returns `Some(logged_out)` when the connection closed.
    async fn handle_event(&mut self, event: ProviderEvent) -> Option<bool> {
        match event {
            ProviderEvent::QrReady(artifact) => self.shared.pairing(artifact),
            ProviderEvent::StateChanged { state, identity } => match state {
                ConnectionState::Open => {
                    if self.shared.connected(identity) {
                        let shared = self.shared.clone();
                        self.tasks.spawn(async move { shared.sync_groups().await });
                    }
                }
                ConnectionState::Connecting => {
                    tracing::debug!(session_id = %self.shared.entry.id, "Provider connecting");
                }
                ConnectionState::Closed { logged_out } => return Some(logged_out),
            },
            ProviderEvent::InboundMessage(message) => {
                if message.from_self || !message.is_group {
                    return None;
                }
                self.shared.entry.state().touch();
                let group = message.conversation_id.clone();
                self.route(group, LaneItem::Message(message)).await;
            }
            ProviderEvent::GroupMetadataChanged(delta) => {
                let group = delta.group_id.clone();
                self.route(group, LaneItem::Delta(delta)).await;
            }
        }
        None
    }

    async fn route(&mut self, group: GroupId, item: LaneItem) {
        let lane = match self.lanes.get(&group) {
            Some(lane) if !lane.is_closed() => lane.clone(),
            _ => self.open_lane(group.clone()),
        };
        if lane.send(item).await.is_err() {
            tracing::warn!(group_id = %group, "Group lane closed; item dropped");
            self.lanes.remove(&group);
        }
    }

    fn open_lane(&mut self, group: GroupId) -> mpsc::Sender<LaneItem> {
        let (tx, mut rx) = mpsc::channel(self.shared.inner.settings.lane_buffer.max(1));
        let shared = self.shared.clone();
        self.tasks.spawn(async move {
            while let Some(item) = rx.recv().await {
                match item {
                    LaneItem::Message(message) => shared.process_message(message).await,
                    LaneItem::Delta(delta) => shared.process_delta(delta).await,
                }
            }
        });
        tracing::debug!(session_id = %self.shared.entry.id, group_id = %group, "Opened group lane");
        self.lanes.insert(group, tx.clone());
        tx
    }

    fn reap(&mut self) {
        while let Some(result) = self.tasks.try_join_next() {
            if let Err(err) = result {
                if err.is_panic() {
                    tracing::error!(session_id = %self.shared.entry.id, "Session task panicked");
                }
            }
        }
    }
}

impl Shared {
    fn pairing(&self, artifact: PairingArtifact) {
        let snapshot = {
            let mut state = self.entry.state();
            if let Err(err) = state.await_scan(artifact) {
                tracing::warn!(session_id = %self.entry.id, error = %err, "Ignoring pairing artifact");
                return;
            }
            state.clone()
        };
        tracing::info!(session_id = %self.entry.id, "Pairing artifact ready");
        self.inner.broadcast(&snapshot);
    }

    fn connected(&self, identity: Option<SessionIdentity>) -> bool {
        let snapshot = {
            let mut state = self.entry.state();
            if let Err(err) = state.connect(identity) {
                tracing::warn!(session_id = %self.entry.id, error = %err, "Ignoring open event");
                return false;
            }
            state.clone()
        };
        tracing::info!(session_id = %self.entry.id, "Session connected");
        self.inner.broadcast(&snapshot);
        true
    }

    fn closed(&self, logged_out: bool) {
        let snapshot = {
            let mut state = self.entry.state();
            if let Err(err) = state.disconnect(false) {
                tracing::warn!(session_id = %self.entry.id, error = %err, "Ignoring close event");
                return;
            }
            if logged_out {
                if let Err(err) = state.fail() {
                    tracing::warn!(session_id = %self.entry.id, error = %err, "Cannot fail session");
                }
            }
            state.clone()
        };
        self.entry.runtime().handle = None;
        self.inner.broadcast(&snapshot);

        if logged_out {
            tracing::warn!(session_id = %self.entry.id, "Session logged out");
        } else if !snapshot.is_operator_disconnected() && self.inner.is_current(&self.entry) {
            tracing::info!(session_id = %self.entry.id, "Connection lost");
            self.inner.schedule_reconnect(&self.entry);
        }
    }

    /// Register every group the account participates in.
    async fn sync_groups(&self) {
        let groups = match self.handle.fetch_all_groups().await {
            Ok(groups) => groups,
            Err(err) => {
                tracing::warn!(session_id = %self.entry.id, error = %err, "Group discovery failed");
                return;
            }
        };

        let mut synced = Vec::with_capacity(groups.len());
        for metadata in groups {
            let record = GroupRecord::discovered(
                metadata.id.clone(),
                self.entry.id.clone(),
                metadata.subject.clone(),
            );
            match self.inner.policies.record_group(record).await {
                Ok(_) => synced.push(json!({ "groupId": metadata.id, "subject": metadata.subject })),
                Err(err) => {
                    tracing::warn!(group_id = %metadata.id, error = %err, "Failed to record group");
                }
            }
        }

        tracing::info!(session_id = %self.entry.id, groups = synced.len(), "Groups synced");
        self.inner.audit.record(
            AuditEntry::new(
                self.entry.tenant_id.clone(),
                AuditKind::GroupsSynced,
                format!("Synced {} groups", synced.len()),
            )
            .for_session(self.entry.id.clone()),
        );
        self.inner
            .policies
            .publish_group_update(&self.entry.id, json!({ "groups": synced }));
    }

    /// Route one group message to the dispatcher or the pipeline.
    ///
    /// Messages of unknown or inactive groups are ignored. Every other
    /// message is audited as received. Anything starting with the group's
    /// prefix is a command and never reaches moderation.
    async fn process_message(&self, message: InboundMessage) {
        let key = GroupKey::new(self.entry.id.clone(), message.conversation_id.clone());
        let group = &key.group_id;
        match self.inner.policies.group(&key).await {
            Ok(Some(record)) if record.active => {}
            Ok(_) => {
                tracing::debug!(group_id = %group, "Ignoring message from unmanaged group");
                return;
            }
            Err(err) => {
                tracing::warn!(group_id = %group, error = %err, "Group lookup failed");
                return;
            }
        }
        let policy = match self.inner.policies.ensure_policy(&key).await {
            Ok(policy) => policy,
            Err(err) => {
                tracing::warn!(group_id = %group, error = %err, "Policy lookup failed");
                return;
            }
        };

        self.inner.audit.record(
            AuditEntry::new(
                self.entry.tenant_id.clone(),
                AuditKind::MessageReceived,
                format!("Message from {}: {}", message.sender, message.body),
            )
            .for_session(self.entry.id.clone())
            .in_group(group.clone())
            .by(message.sender.clone())
            .for_message(message.message_ref.clone()),
        );

        let ctx = MessageContext {
            tenant_id: self.entry.tenant_id.clone(),
            session_id: self.entry.id.clone(),
            identity: self.entry.state().identity().cloned(),
            handle: Arc::clone(&self.handle),
            message,
        };

        if let Some(command) = ParsedCommand::parse(ctx.body(), &policy.prefix) {
            let outcome = self.inner.dispatcher.dispatch(&ctx, &policy, &command).await;
            tracing::debug!(group_id = %group, ?outcome, "Command handled");
        } else {
            let outcome = self.inner.pipeline.evaluate(&ctx, &policy).await;
            tracing::debug!(group_id = %group, ?outcome, "Message moderated");
        }
    }

    /// Apply a subject or membership change.
    ///
    /// Unknown groups are registered on first sight. Joins trigger the
    /// group's welcome message when one is set.
    async fn process_delta(&self, delta: GroupDelta) {
        let key = GroupKey::new(self.entry.id.clone(), delta.group_id.clone());
        let group = &key.group_id;
        let known = match self.inner.policies.group(&key).await {
            Ok(known) => known,
            Err(err) => {
                tracing::warn!(group_id = %group, error = %err, "Group lookup failed");
                return;
            }
        };

        let active = match known {
            Some(record) => {
                if let Some(subject) = delta.subject.as_deref().filter(|s| *s != record.subject) {
                    if let Err(err) = self.inner.policies.rename_group(&key, subject).await {
                        tracing::warn!(group_id = %group, error = %err, "Failed to rename group");
                    }
                }
                record.active
            }
            None => {
                if !self.register(group, delta.subject.clone()).await {
                    return;
                }
                true
            }
        };

        if delta.joined.is_empty() || !active {
            return;
        }
        let policy = match self.inner.policies.ensure_policy(&key).await {
            Ok(policy) => policy,
            Err(err) => {
                tracing::warn!(group_id = %group, error = %err, "Policy lookup failed");
                return;
            }
        };
        let Some(welcome) = policy.welcome_message.as_deref().filter(|w| !w.trim().is_empty()) else {
            return;
        };
        if let Err(err) = self.handle.send_text(group, welcome).await {
            tracing::warn!(group_id = %group, error = %err, "Failed to send welcome message");
        }
    }

    async fn register(&self, group: &GroupId, subject: Option<String>) -> bool {
        let subject = match subject {
            Some(subject) => subject,
            None => match self.handle.fetch_group_metadata(group).await {
                Ok(metadata) => metadata.subject,
                Err(err) => {
                    tracing::debug!(group_id = %group, error = %err, "No metadata for new group");
                    group.to_string()
                }
            },
        };
        let record = GroupRecord::discovered(group.clone(), self.entry.id.clone(), subject.clone());
        if let Err(err) = self.inner.policies.record_group(record).await {
            tracing::warn!(group_id = %group, error = %err, "Failed to register group");
            return false;
        }
        tracing::info!(session_id = %self.entry.id, group_id = %group, "Group registered");
        self.inner.policies.publish_group_update(
            &self.entry.id,
            json!({ "groupId": group, "subject": subject, "discovered": true }),
        );
        true
    }
}
