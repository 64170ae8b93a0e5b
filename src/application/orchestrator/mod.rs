//! SessionOrchestrator - owns every tenant session and its background work.
//!
//! Each opened provider session gets one worker task that consumes the
//! provider's event stream in order. Inbound group traffic is fanned out to
//! per-group lanes so one slow group never stalls the others, while messages
//! of a single group are handled strictly in arrival order.
//!
//! The registry lock is held only to look up, insert or remove entries;
//! lifecycle state lives behind each entry's own lock.

mod entry;
mod worker;

use serde_json::json;
use std::collections::HashMap;
use std::sync::{Arc, PoisonError, RwLock};
use std::time::Duration;

use crate::config::OrchestratorConfig;
use crate::domain::audit::{AuditEntry, AuditKind};
use crate::domain::foundation::{GroupId, SessionId, TenantId};
use crate::domain::session::{SessionError, SessionState, TenantSession};
use crate::ports::{
    ConnectionProvider, FloodTracker, LiveEvent, LiveEventKind, LiveEventPublisher,
    ProviderSession, TenantDirectory,
};

use super::{
    AuditTrail, BotProfile, CommandDispatcher, ModerationPipeline, PolicyService,
};
use entry::SessionEntry;

/// Runtime knobs of the orchestrator.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct OrchestratorSettings {
    /// Fixed delay before reconnecting an involuntarily dropped session.
    pub reconnect_delay: Duration,
    /// Queue depth of each per-group lane.
    pub lane_buffer: usize,
}

impl Default for OrchestratorSettings {
    fn default() -> Self {
        Self {
            reconnect_delay: Duration::from_secs(5),
            lane_buffer: 64,
        }
    }
}

impl From<&OrchestratorConfig> for OrchestratorSettings {
    fn from(config: &OrchestratorConfig) -> Self {
        Self {
            reconnect_delay: config.reconnect_delay(),
            lane_buffer: config.lane_buffer,
        }
    }
}

/// Collaborators the orchestrator wires together.
pub struct OrchestratorParts {
    pub provider: Arc<dyn ConnectionProvider>,
    pub tenants: Arc<dyn TenantDirectory>,
    pub policies: Arc<PolicyService>,
    pub flood: Arc<dyn FloodTracker>,
    pub publisher: Arc<dyn LiveEventPublisher>,
    pub audit: AuditTrail,
    pub bot: BotProfile,
}

struct Inner {
    provider: Arc<dyn ConnectionProvider>,
    tenants: Arc<dyn TenantDirectory>,
    policies: Arc<PolicyService>,
    pipeline: ModerationPipeline,
    dispatcher: CommandDispatcher,
    publisher: Arc<dyn LiveEventPublisher>,
    audit: AuditTrail,
    settings: OrchestratorSettings,
    sessions: RwLock<HashMap<SessionId, Arc<SessionEntry>>>,
}

/// What `create_session` found in the registry for the requested id.
enum Admission {
    Fresh(Arc<SessionEntry>),
    Restart(Arc<SessionEntry>),
    Existing(TenantSession),
}

/// Cheaply cloneable front of the session registry.
#[derive(Clone)]
pub struct SessionOrchestrator {
    inner: Arc<Inner>,
}

impl SessionOrchestrator {
    pub fn new(parts: OrchestratorParts, settings: OrchestratorSettings) -> Self {
        let pipeline = ModerationPipeline::new(parts.flood, parts.audit.clone());
        let dispatcher = CommandDispatcher::new(
            Arc::clone(&parts.policies),
            Arc::clone(&parts.tenants),
            parts.audit.clone(),
            parts.bot,
        );
        Self {
            inner: Arc::new(Inner {
                provider: parts.provider,
                tenants: parts.tenants,
                policies: parts.policies,
                pipeline,
                dispatcher,
                publisher: parts.publisher,
                audit: parts.audit,
                settings,
                sessions: RwLock::new(HashMap::new()),
            }),
        }
    }

    // ─────────────────────────────────────────────────────────────────────────
    // Lifecycle
    // ─────────────────────────────────────────────────────────────────────────

    /// Create (or restart) a session for `tenant` and open it.
    ///
    /// A tenant may hold one live session unless its role is elevated. A
    /// `Disconnected` session with the same id is restarted in place and a
    /// `Failed` one is replaced. Asking for an id that is already live
    /// returns its current snapshot.
    ///
    /// # Errors
    ///
    /// - `Conflict` if the tenant already holds another live session
    /// - `Provider` if the connection could not be opened; the session is
    ///   left in `Failed`
    #[tracing::instrument(skip(self), fields(tenant_id = %tenant))]
    pub async fn create_session(
        &self,
        tenant: &TenantId,
        session_id: Option<SessionId>,
    ) -> Result<TenantSession, SessionError> {
        let id = session_id.unwrap_or_else(|| SessionId::generate(tenant));
        let elevated = match self.inner.tenants.role(tenant).await {
            Ok(role) => role.is_elevated(),
            Err(err) => {
                tracing::warn!(error = %err, "Tenant role lookup failed; applying default limits");
                false
            }
        };

        let entry = match self.inner.admit(tenant, &id, elevated)? {
            Admission::Existing(snapshot) => return Ok(snapshot),
            Admission::Restart(entry) => {
                let snapshot = {
                    let mut state = entry.state();
                    state.reinitialize(false)?;
                    state.clone()
                };
                tracing::info!(session_id = %id, "Restarting session");
                self.inner.broadcast(&snapshot);
                entry
            }
            Admission::Fresh(entry) => {
                tracing::info!(session_id = %id, "Session created");
                self.inner.audit.record(
                    AuditEntry::new(tenant.clone(), AuditKind::SessionCreated, "Session created")
                        .for_session(id.clone()),
                );
                self.inner.broadcast(&entry.snapshot());
                entry
            }
        };

        match self.inner.provider.open(&id).await {
            Ok(opened) => {
                self.inner.attach(&entry, opened);
                Ok(entry.snapshot())
            }
            Err(err) => {
                tracing::error!(session_id = %id, error = %err, "Failed to open session");
                let snapshot = {
                    let mut state = entry.state();
                    if let Err(transition) = state.fail() {
                        tracing::warn!(session_id = %id, error = %transition, "Session changed while opening");
                    }
                    state.clone()
                };
                self.inner.broadcast(&snapshot);
                Err(SessionError::provider(err.to_string()))
            }
        }
    }

    /// Operator-requested disconnect. Idempotent.
    ///
    /// Stops the worker and any pending reconnect, logs the connection out
    /// and leaves the session `Disconnected` without automatic reconnects.
    /// A `Failed` session is returned unchanged.
    #[tracing::instrument(skip(self), fields(session_id = %id))]
    pub async fn disconnect_session(&self, id: &SessionId) -> Result<TenantSession, SessionError> {
        let entry = self
            .inner
            .lookup(id)
            .ok_or_else(|| SessionError::NotFound(id.clone()))?;

        let handle = entry.runtime().stop();
        if let Some(handle) = handle {
            if let Err(err) = handle.logout().await {
                tracing::warn!(error = %err, "Logout failed during disconnect");
            }
        }

        let (changed, snapshot) = {
            let mut state = entry.state();
            let changed = if state.state() == SessionState::Failed {
                false
            } else {
                state.disconnect(true)?
            };
            (changed, state.clone())
        };
        if changed {
            tracing::info!("Session disconnected by operator");
            self.inner.broadcast(&snapshot);
        }
        Ok(snapshot)
    }

    /// Remove a session and everything scheduled on its behalf.
    #[tracing::instrument(skip(self), fields(session_id = %id))]
    pub async fn delete_session(&self, id: &SessionId) -> Result<(), SessionError> {
        let entry = self
            .inner
            .sessions
            .write()
            .unwrap_or_else(PoisonError::into_inner)
            .remove(id)
            .ok_or_else(|| SessionError::NotFound(id.clone()))?;

        let handle = entry.runtime().stop();
        let live_connection = !matches!(
            entry.state().state(),
            SessionState::Disconnected | SessionState::Failed
        );
        if let (Some(handle), true) = (handle, live_connection) {
            if let Err(err) = handle.logout().await {
                tracing::warn!(error = %err, "Logout failed during delete");
            }
        }

        let cancelled = self.inner.policies.mutes().cancel_for_session(id);
        if cancelled > 0 {
            tracing::debug!(cancelled, "Cancelled auto-unmute jobs");
        }

        self.inner.audit.record(
            AuditEntry::new(entry.tenant_id.clone(), AuditKind::SessionDeleted, "Session deleted")
                .for_session(id.clone()),
        );
        self.inner.publisher.publish(LiveEvent::new(
            LiveEventKind::SessionUpdate,
            json!({ "sessionId": id, "tenantId": entry.tenant_id, "deleted": true }),
        ));
        tracing::info!("Session deleted");
        Ok(())
    }

    /// Stop every worker and pending job. Sessions are not logged out.
    pub fn shutdown(&self) {
        let entries: Vec<_> = self
            .inner
            .sessions
            .write()
            .unwrap_or_else(PoisonError::into_inner)
            .drain()
            .map(|(_, entry)| entry)
            .collect();
        for entry in &entries {
            entry.runtime().stop();
        }
        self.inner.policies.mutes().shutdown();
        tracing::info!(sessions = entries.len(), "Orchestrator stopped");
    }

    // ─────────────────────────────────────────────────────────────────────────
    // Queries
    // ─────────────────────────────────────────────────────────────────────────

    pub fn session(&self, id: &SessionId) -> Option<TenantSession> {
        self.inner.lookup(id).map(|entry| entry.snapshot())
    }

    /// Sessions of a tenant, oldest first.
    pub fn sessions_for(&self, tenant: &TenantId) -> Vec<TenantSession> {
        let mut sessions: Vec<_> = self
            .inner
            .entries()
            .into_iter()
            .filter(|entry| &entry.tenant_id == tenant)
            .map(|entry| entry.snapshot())
            .collect();
        sessions.sort_by(|a, b| a.created_at().cmp(b.created_at()));
        sessions
    }

    pub fn session_count(&self) -> usize {
        self.inner
            .sessions
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .len()
    }

    /// Send a text into a group through an open session.
    pub async fn send_to_group(
        &self,
        id: &SessionId,
        group: &GroupId,
        text: &str,
    ) -> Result<(), SessionError> {
        let entry = self
            .inner
            .lookup(id)
            .ok_or_else(|| SessionError::NotFound(id.clone()))?;
        let handle = entry
            .handle()
            .ok_or_else(|| SessionError::provider("session is not connected"))?;
        handle
            .send_text(group, text)
            .await
            .map_err(|err| SessionError::provider(err.to_string()))
    }
}

impl std::fmt::Debug for SessionOrchestrator {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SessionOrchestrator")
            .field("sessions", &self.session_count())
            .finish_non_exhaustive()
    }
}

impl Inner {
    fn lookup(&self, id: &SessionId) -> Option<Arc<SessionEntry>> {
        self.sessions
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .get(id)
            .cloned()
    }

    fn entries(&self) -> Vec<Arc<SessionEntry>> {
        self.sessions
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .values()
            .cloned()
            .collect()
    }

    /// Whether `entry` is still the registered entry for its id.
    fn is_current(&self, entry: &Arc<SessionEntry>) -> bool {
        self.lookup(&entry.id)
            .is_some_and(|current| Arc::ptr_eq(&current, entry))
    }

    /// Decide under the registry lock how a create request is admitted.
    fn admit(
        &self,
        tenant: &TenantId,
        id: &SessionId,
        elevated: bool,
    ) -> Result<Admission, SessionError> {
        let mut sessions = self.sessions.write().unwrap_or_else(PoisonError::into_inner);

        if let Some(existing) = sessions.get(id) {
            if &existing.tenant_id != tenant {
                return Err(SessionError::Conflict {
                    tenant: tenant.clone(),
                    existing: id.clone(),
                });
            }
        }

        if !elevated {
            let other_live = sessions.values().find(|entry| {
                &entry.tenant_id == tenant && &entry.id != id && entry.state().state().is_live()
            });
            if let Some(other) = other_live {
                return Err(SessionError::Conflict {
                    tenant: tenant.clone(),
                    existing: other.id.clone(),
                });
            }
        }

        if let Some(existing) = sessions.get(id) {
            let current = existing.state().state();
            match current {
                SessionState::Disconnected => {
                    // Cleared under the registry lock; a later delete sets it again.
                    existing.runtime().stopped = false;
                    return Ok(Admission::Restart(Arc::clone(existing)));
                }
                SessionState::Failed => {
                    existing.runtime().stop();
                }
                _ => return Ok(Admission::Existing(existing.snapshot())),
            }
        }

        let entry = SessionEntry::new(TenantSession::new(id.clone(), tenant.clone()));
        sessions.insert(id.clone(), Arc::clone(&entry));
        Ok(Admission::Fresh(entry))
    }

    /// Bind an opened provider session to `entry` and start its worker.
    ///
    /// The connection is logged out and dropped when the entry was stopped,
    /// deleted or changed state while the provider was opening. The stop
    /// flag and the state are checked under the runtime lock, so a
    /// concurrent `stop` either sees the new worker and aborts it or makes
    /// this call discard the connection.
    fn attach(self: &Arc<Self>, entry: &Arc<SessionEntry>, opened: ProviderSession) {
        let ProviderSession { handle, events } = opened;
        if self.is_current(entry) {
            let mut runtime = entry.runtime();
            if !runtime.stopped && entry.state().state() == SessionState::Initializing {
                runtime.handle = Some(Arc::clone(&handle));
                let worker = tokio::spawn(worker::run(
                    Arc::clone(self),
                    Arc::clone(entry),
                    handle,
                    events,
                ));
                if let Some(previous) = runtime.worker.replace(worker) {
                    previous.abort();
                }
                return;
            }
        }

        tracing::debug!(session_id = %entry.id, "Discarding connection opened for a stale session");
        drop(events);
        let session_id = entry.id.clone();
        tokio::spawn(async move {
            if let Err(err) = handle.logout().await {
                tracing::warn!(session_id = %session_id, error = %err, "Logout of discarded connection failed");
            }
        });
    }

    /// Reopen an involuntarily dropped session after the configured delay.
    fn schedule_reconnect(self: &Arc<Self>, entry: &Arc<SessionEntry>) {
        let mut runtime = entry.runtime();
        if runtime.stopped {
            return;
        }
        runtime.next_job += 1;
        let job_id = runtime.next_job;
        let inner = Arc::clone(self);
        let target = Arc::clone(entry);
        let delay = self.settings.reconnect_delay;
        let job = tokio::spawn(async move {
            tokio::time::sleep(delay).await;
            {
                let mut runtime = target.runtime();
                if runtime.reconnect.as_ref().map(|(id, _)| *id) == Some(job_id) {
                    runtime.reconnect = None;
                }
            }
            inner.reconnect(&target).await;
        });
        if let Some((_, previous)) = runtime.reconnect.replace((job_id, job)) {
            previous.abort();
        }
        tracing::info!(session_id = %entry.id, delay_secs = delay.as_secs(), "Reconnect scheduled");
    }

    async fn reconnect(self: &Arc<Self>, entry: &Arc<SessionEntry>) {
        if !self.is_current(entry) {
            return;
        }
        let snapshot = {
            let mut state = entry.state();
            if state.state() != SessionState::Disconnected || state.is_operator_disconnected() {
                return;
            }
            if let Err(err) = state.reinitialize(true) {
                tracing::warn!(session_id = %entry.id, error = %err, "Cannot reconnect");
                return;
            }
            state.clone()
        };
        tracing::info!(
            session_id = %entry.id,
            attempt = snapshot.reconnect_attempts(),
            "Reconnecting session"
        );
        self.broadcast(&snapshot);

        match self.provider.open(&entry.id).await {
            Ok(opened) => self.attach(entry, opened),
            Err(err) => {
                tracing::warn!(session_id = %entry.id, error = %err, "Reconnect failed");
                let snapshot = {
                    let mut state = entry.state();
                    if state.state() != SessionState::Initializing {
                        return;
                    }
                    if let Err(err) = state.disconnect(false) {
                        tracing::warn!(session_id = %entry.id, error = %err, "Cannot mark session disconnected");
                        return;
                    }
                    state.clone()
                };
                self.broadcast(&snapshot);
                if self.is_current(entry) {
                    self.schedule_reconnect(entry);
                }
            }
        }
    }

    fn broadcast(&self, session: &TenantSession) {
        self.publisher.publish(LiveEvent::new(
            LiveEventKind::SessionUpdate,
            json!({ "sessionId": session.id(), "session": session }),
        ));
    }
}

#[cfg(test)]
mod tests;
