//! Flood tracking port for per-sender message rate windows.
//!
//! A sliding window per (session, group, sender): every check appends the current
//! instant, evicts entries older than the timeframe and reports whether the
//! remaining count exceeds the limit.

use async_trait::async_trait;
use std::time::Duration;

use crate::domain::foundation::ParticipantId;
use crate::domain::policy::GroupKey;

/// Port for flood window tracking.
///
/// Implementations must serialize checks per key only; different keys
/// proceed in parallel.
#[async_trait]
pub trait FloodTracker: Send + Sync {
    /// Record one message for `key` and evaluate the window.
    async fn record(&self, key: &FloodKey, limit: u32, timeframe: Duration) -> FloodCheck;

    /// Forget the window of one key.
    async fn reset(&self, key: &FloodKey);

    /// Drop keys with no entry newer than `max_idle`. Returns the number removed.
    async fn prune(&self, max_idle: Duration) -> usize;
}

/// Key identifying one sender in one group, as seen by one session.
#[derive(Debug, Clone, Hash, Eq, PartialEq)]
pub struct FloodKey {
    pub group: GroupKey,
    pub sender: ParticipantId,
}

impl FloodKey {
    pub fn new(group: GroupKey, sender: ParticipantId) -> Self {
        Self { group, sender }
    }
}

/// Outcome of one flood check.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FloodCheck {
    /// Messages in the window, including the one just recorded.
    pub count: usize,
    /// True when `count` exceeds the limit.
    pub triggered: bool,
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::foundation::{GroupId, SessionId};

    #[allow(dead_code)]
    fn assert_object_safe(_: &dyn FloodTracker) {}

    #[test]
    fn keys_differ_by_sender_and_session() {
        let group = GroupId::new("g").unwrap();
        let in_s1 = GroupKey::new(SessionId::new("s1").unwrap(), group.clone());
        let in_s2 = GroupKey::new(SessionId::new("s2").unwrap(), group);
        let a = FloodKey::new(in_s1.clone(), ParticipantId::new("a").unwrap());
        let b = FloodKey::new(in_s1, ParticipantId::new("b").unwrap());
        let a_elsewhere = FloodKey::new(in_s2, ParticipantId::new("a").unwrap());
        assert_ne!(a, b);
        assert_ne!(a, a_elsewhere);
    }
}
