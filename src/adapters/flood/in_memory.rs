//! In-memory flood tracker.
//!
//! Sliding windows of `Instant`s per [`FloodKey`]. The key map lock is
//! held only to look up or insert a window; the per-window mutex serializes
//! checks for that key alone. A window is only pruned while the map is its
//! sole owner, so a record that already holds the window never writes into
//! a detached copy.

use async_trait::async_trait;
use std::collections::{HashMap, VecDeque};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError, RwLock};
use std::time::{Duration, Instant};

use crate::ports::{FloodCheck, FloodKey, FloodTracker};

type Window = Arc<Mutex<VecDeque<Instant>>>;

/// In-memory flood tracker for single-process deployments.
#[derive(Debug, Default)]
pub struct InMemoryFloodTracker {
    windows: RwLock<HashMap<FloodKey, Window>>,
}

fn lock(window: &Window) -> MutexGuard<'_, VecDeque<Instant>> {
    window.lock().unwrap_or_else(PoisonError::into_inner)
}

impl InMemoryFloodTracker {
    pub fn new() -> Self {
        Self::default()
    }

    fn window(&self, key: &FloodKey) -> Window {
        if let Some(window) = self
            .windows
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .get(key)
        {
            return Arc::clone(window);
        }
        let mut windows = self.windows.write().unwrap_or_else(PoisonError::into_inner);
        Arc::clone(windows.entry(key.clone()).or_default())
    }

    /// Record a message for `key` at `now` and evaluate the window.
    ///
    /// Entries with `now - t >= timeframe` are evicted before counting.
    pub fn record_at(
        &self,
        key: &FloodKey,
        now: Instant,
        limit: u32,
        timeframe: Duration,
    ) -> FloodCheck {
        let window = self.window(key);
        let mut entries = lock(&window);
        entries.push_back(now);
        while let Some(oldest) = entries.front() {
            if now.saturating_duration_since(*oldest) >= timeframe {
                entries.pop_front();
            } else {
                break;
            }
        }
        let count = entries.len();
        FloodCheck {
            count,
            triggered: count > limit as usize,
        }
    }

    /// Drop windows whose newest entry is at least `max_idle` old at `now`.
    pub fn prune_at(&self, now: Instant, max_idle: Duration) -> usize {
        let mut windows = self.windows.write().unwrap_or_else(PoisonError::into_inner);
        let before = windows.len();
        windows.retain(|_, window| {
            // Clones are only taken under the map lock, which is held here.
            Arc::strong_count(window) > 1
                || lock(window)
                    .back()
                    .is_some_and(|newest| now.saturating_duration_since(*newest) < max_idle)
        });
        before - windows.len()
    }

    /// Number of tracked keys.
    pub fn len(&self) -> usize {
        self.windows.read().unwrap_or_else(PoisonError::into_inner).len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Entries currently retained for `key`.
    pub fn window_len(&self, key: &FloodKey) -> usize {
        self.windows
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .get(key)
            .map(|w| lock(w).len())
            .unwrap_or(0)
    }
}

#[async_trait]
impl FloodTracker for InMemoryFloodTracker {
    async fn record(&self, key: &FloodKey, limit: u32, timeframe: Duration) -> FloodCheck {
        self.record_at(key, Instant::now(), limit, timeframe)
    }

    async fn reset(&self, key: &FloodKey) {
        self.windows
            .write()
            .unwrap_or_else(PoisonError::into_inner)
            .remove(key);
    }

    async fn prune(&self, max_idle: Duration) -> usize {
        self.prune_at(Instant::now(), max_idle)
    }
}
