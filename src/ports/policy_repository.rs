//! PolicyRepository port - persistence for group policies and group records.
//!
//! Policies and group records are keyed by [`GroupKey`]: the same network
//! group seen through two sessions is two independent entries.

use async_trait::async_trait;

use crate::domain::foundation::{DomainError, SessionId};
use crate::domain::policy::{GroupKey, GroupPolicy, GroupRecord};

#[async_trait]
pub trait PolicyRepository: Send + Sync {
    async fn get_policy(&self, key: &GroupKey) -> Result<Option<GroupPolicy>, DomainError>;

    /// Insert or replace the policy under `policy.key()`.
    async fn save_policy(&self, policy: &GroupPolicy) -> Result<(), DomainError>;

    /// Insert a group record, or refresh the subject of an existing one.
    ///
    /// An existing record keeps its discovery time and its `active` flag.
    async fn upsert_group(&self, record: GroupRecord) -> Result<(), DomainError>;

    /// Set the `active` flag of a known group. Returns false if unknown.
    async fn set_group_active(&self, key: &GroupKey, active: bool) -> Result<bool, DomainError>;

    async fn get_group(&self, key: &GroupKey) -> Result<Option<GroupRecord>, DomainError>;

    /// Active groups of a session, ordered by subject.
    async fn list_groups(&self, session: &SessionId) -> Result<Vec<GroupRecord>, DomainError>;

    /// Remove a group record and its policy. Returns whether it existed.
    async fn remove_group(&self, key: &GroupKey) -> Result<bool, DomainError>;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[allow(dead_code)]
    fn assert_object_safe(_: &dyn PolicyRepository) {}
}
