//! MuteScheduler - cancellable auto-unmute jobs keyed by session and group.
//!
//! At most one job exists per [`GroupKey`]. Scheduling a new job for a key
//! aborts the previous one. A job that fires removes itself from the map
//! before running its action, so the action may freely reconfigure the
//! group without aborting its own task.

use std::collections::HashMap;
use std::future::Future;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex, PoisonError};
use std::time::Duration;
use tokio::task::JoinHandle;

use crate::domain::foundation::SessionId;
use crate::domain::policy::GroupKey;

struct MuteJob {
    id: u64,
    handle: JoinHandle<()>,
}

#[derive(Default)]
pub struct MuteScheduler {
    jobs: Mutex<HashMap<GroupKey, MuteJob>>,
    next_id: AtomicU64,
}

impl MuteScheduler {
    pub fn new() -> Self {
        Self::default()
    }

    /// Run `action` after `delay` unless cancelled first.
    pub fn schedule<F>(self: &Arc<Self>, key: GroupKey, delay: Duration, action: F)
    where
        F: Future<Output = ()> + Send + 'static,
    {
        let id = self.next_id.fetch_add(1, Ordering::Relaxed);
        let scheduler = Arc::downgrade(self);
        let job_key = key.clone();

        // Held across spawn so a zero delay cannot fire before insertion.
        let mut jobs = self.lock();
        let handle = tokio::spawn(async move {
            tokio::time::sleep(delay).await;
            let Some(scheduler) = scheduler.upgrade() else {
                return;
            };
            if scheduler.take_if_current(&job_key, id) {
                tracing::debug!(group = %job_key, "Auto-unmute job firing");
                action.await;
            }
        });

        let previous = jobs.insert(key.clone(), MuteJob { id, handle });
        drop(jobs);
        if let Some(previous) = previous {
            previous.handle.abort();
            tracing::debug!(group = %key, "Replaced pending auto-unmute job");
        }
    }

    /// Abort the pending job of `key`. Returns whether one existed.
    pub fn cancel(&self, key: &GroupKey) -> bool {
        match self.lock().remove(key) {
            Some(job) => {
                job.handle.abort();
                tracing::debug!(group = %key, "Cancelled auto-unmute job");
                true
            }
            None => false,
        }
    }

    /// Abort every pending job that belongs to `session`.
    pub fn cancel_for_session(&self, session: &SessionId) -> usize {
        let mut jobs = self.lock();
        let before = jobs.len();
        jobs.retain(|key, job| {
            if &key.session_id == session {
                job.handle.abort();
                false
            } else {
                true
            }
        });
        before - jobs.len()
    }

    pub fn is_scheduled(&self, key: &GroupKey) -> bool {
        self.lock().contains_key(key)
    }

    pub fn pending(&self) -> usize {
        self.lock().len()
    }

    /// Abort every job.
    pub fn shutdown(&self) {
        for (_, job) in self.lock().drain() {
            job.handle.abort();
        }
    }

    fn take_if_current(&self, key: &GroupKey, id: u64) -> bool {
        let mut jobs = self.lock();
        match jobs.get(key) {
            Some(job) if job.id == id => {
                jobs.remove(key);
                true
            }
            _ => false,
        }
    }

    fn lock(&self) -> std::sync::MutexGuard<'_, HashMap<GroupKey, MuteJob>> {
        self.jobs.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

impl std::fmt::Debug for MuteScheduler {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("MuteScheduler")
            .field("pending", &self.pending())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::foundation::GroupId;
    use std::sync::atomic::AtomicUsize;

    fn key(session: &str, group: &str) -> GroupKey {
        GroupKey::new(SessionId::new(session).unwrap(), GroupId::new(group).unwrap())
    }

    fn counter_action(counter: &Arc<AtomicUsize>) -> impl Future<Output = ()> + Send + 'static {
        let counter = Arc::clone(counter);
        async move {
            counter.fetch_add(1, Ordering::SeqCst);
        }
    }

    #[tokio::test(start_paused = true)]
    async fn job_fires_after_delay_and_removes_itself() {
        let scheduler = Arc::new(MuteScheduler::new());
        let fired = Arc::new(AtomicUsize::new(0));

        scheduler.schedule(key("s1", "g1"), Duration::from_secs(60), counter_action(&fired));
        assert!(scheduler.is_scheduled(&key("s1", "g1")));

        tokio::time::sleep(Duration::from_secs(61)).await;

        assert_eq!(fired.load(Ordering::SeqCst), 1);
        assert!(!scheduler.is_scheduled(&key("s1", "g1")));
    }

    #[tokio::test(start_paused = true)]
    async fn cancelled_job_never_fires() {
        let scheduler = Arc::new(MuteScheduler::new());
        let fired = Arc::new(AtomicUsize::new(0));

        scheduler.schedule(key("s1", "g1"), Duration::from_secs(60), counter_action(&fired));
        assert!(scheduler.cancel(&key("s1", "g1")));
        assert!(!scheduler.cancel(&key("s1", "g1")));

        tokio::time::sleep(Duration::from_secs(120)).await;
        assert_eq!(fired.load(Ordering::SeqCst), 0);
    }

    #[tokio::test(start_paused = true)]
    async fn rescheduling_replaces_previous_job() {
        let scheduler = Arc::new(MuteScheduler::new());
        let fired = Arc::new(AtomicUsize::new(0));

        scheduler.schedule(key("s1", "g1"), Duration::from_secs(10), counter_action(&fired));
        scheduler.schedule(key("s1", "g1"), Duration::from_secs(100), counter_action(&fired));
        assert_eq!(scheduler.pending(), 1);

        tokio::time::sleep(Duration::from_secs(50)).await;
        assert_eq!(fired.load(Ordering::SeqCst), 0);

        tokio::time::sleep(Duration::from_secs(60)).await;
        assert_eq!(fired.load(Ordering::SeqCst), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn sessions_in_the_same_group_have_separate_jobs() {
        let scheduler = Arc::new(MuteScheduler::new());
        let fired = Arc::new(AtomicUsize::new(0));

        scheduler.schedule(key("s1", "g1"), Duration::from_secs(10), counter_action(&fired));
        scheduler.schedule(key("s2", "g1"), Duration::from_secs(10), counter_action(&fired));
        assert_eq!(scheduler.pending(), 2);

        assert!(scheduler.cancel(&key("s2", "g1")));
        tokio::time::sleep(Duration::from_secs(11)).await;
        assert_eq!(fired.load(Ordering::SeqCst), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn cancel_for_session_only_touches_that_session() {
        let scheduler = Arc::new(MuteScheduler::new());
        let fired = Arc::new(AtomicUsize::new(0));

        scheduler.schedule(key("s1", "g1"), Duration::from_secs(10), counter_action(&fired));
        scheduler.schedule(key("s1", "g2"), Duration::from_secs(10), counter_action(&fired));
        scheduler.schedule(key("s2", "g3"), Duration::from_secs(10), counter_action(&fired));

        assert_eq!(scheduler.cancel_for_session(&SessionId::new("s1").unwrap()), 2);
        tokio::time::sleep(Duration::from_secs(11)).await;

        assert_eq!(fired.load(Ordering::SeqCst), 1);
        assert_eq!(scheduler.pending(), 0);
    }
}
