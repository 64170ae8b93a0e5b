use serde::{Deserialize, Serialize};
use std::fmt;

use crate::domain::foundation::{GroupId, SessionId, Timestamp};

/// A group as seen through one session.
///
/// Two sessions in the same network group hold separate records and
/// policies, so every group lookup is scoped by the session as well.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct GroupKey {
    pub session_id: SessionId,
    pub group_id: GroupId,
}

impl GroupKey {
    pub fn new(session_id: SessionId, group_id: GroupId) -> Self {
        Self {
            session_id,
            group_id,
        }
    }
}

impl fmt::Display for GroupKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}/{}", self.session_id, self.group_id)
    }
}

/// A group known to a session, as discovered through the provider.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct GroupRecord {
    pub group_id: GroupId,
    pub session_id: SessionId,
    pub subject: String,
    /// Inactive groups stay known but are not moderated.
    pub active: bool,
    pub discovered_at: Timestamp,
}

impl GroupRecord {
    pub fn discovered(group_id: GroupId, session_id: SessionId, subject: impl Into<String>) -> Self {
        Self {
            group_id,
            session_id,
            subject: subject.into(),
            active: true,
            discovered_at: Timestamp::now(),
        }
    }

    pub fn key(&self) -> GroupKey {
        GroupKey::new(self.session_id.clone(), self.group_id.clone())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn same_group_under_two_sessions_gives_distinct_keys() {
        let group = GroupId::new("120363@g.us").unwrap();
        let a = GroupRecord::discovered(group.clone(), SessionId::new("s1").unwrap(), "A");
        let b = GroupRecord::discovered(group, SessionId::new("s2").unwrap(), "A");

        assert_ne!(a.key(), b.key());
        assert_eq!(a.key().to_string(), "s1/120363@g.us");
    }
}
