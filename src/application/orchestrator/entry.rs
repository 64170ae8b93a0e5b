//! Registry entry for one tenant session.

use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use tokio::task::JoinHandle;

use crate::domain::foundation::{SessionId, TenantId};
use crate::domain::session::TenantSession;
use crate::ports::ConnectionHandle;

/// Tasks and the provider handle attached to a session.
#[derive(Default)]
pub(super) struct SessionRuntime {
    pub handle: Option<Arc<dyn ConnectionHandle>>,
    pub worker: Option<JoinHandle<()>>,
    pub reconnect: Option<(u64, JoinHandle<()>)>,
    pub next_job: u64,
    /// Set by [`stop`](Self::stop). No worker or reconnect may be attached
    /// to a stopped runtime until a restart clears it.
    pub stopped: bool,
}

impl SessionRuntime {
    /// Abort the worker and any pending reconnect, returning the handle.
    pub fn stop(&mut self) -> Option<Arc<dyn ConnectionHandle>> {
        self.stopped = true;
        if let Some(worker) = self.worker.take() {
            worker.abort();
        }
        if let Some((_, job)) = self.reconnect.take() {
            job.abort();
        }
        self.handle.take()
    }
}

/// One registered session.
///
/// Identity matters: background jobs hold an `Arc<SessionEntry>` and
/// compare it against the registry with `Arc::ptr_eq` before acting, so a
/// deleted and re-created session is never touched by stale jobs.
pub(super) struct SessionEntry {
    pub id: SessionId,
    pub tenant_id: TenantId,
    state: Mutex<TenantSession>,
    runtime: Mutex<SessionRuntime>,
}

impl SessionEntry {
    pub fn new(session: TenantSession) -> Arc<Self> {
        Arc::new(Self {
            id: session.id().clone(),
            tenant_id: session.tenant_id().clone(),
            state: Mutex::new(session),
            runtime: Mutex::new(SessionRuntime::default()),
        })
    }

    pub fn state(&self) -> MutexGuard<'_, TenantSession> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }

    pub fn runtime(&self) -> MutexGuard<'_, SessionRuntime> {
        self.runtime.lock().unwrap_or_else(PoisonError::into_inner)
    }

    pub fn snapshot(&self) -> TenantSession {
        self.state().clone()
    }

    pub fn handle(&self) -> Option<Arc<dyn ConnectionHandle>> {
        self.runtime().handle.clone()
    }
}
