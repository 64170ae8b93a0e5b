//! In-memory policy repository.

use async_trait::async_trait;
use std::collections::HashMap;
use tokio::sync::RwLock;

use crate::domain::foundation::{DomainError, SessionId};
use crate::domain::policy::{GroupKey, GroupPolicy, GroupRecord};
use crate::ports::PolicyRepository;

/// Policies and group records held in process memory.
#[derive(Debug, Default)]
pub struct InMemoryPolicyRepository {
    policies: RwLock<HashMap<GroupKey, GroupPolicy>>,
    groups: RwLock<HashMap<GroupKey, GroupRecord>>,
}

impl InMemoryPolicyRepository {
    pub fn new() -> Self {
        Self::default()
    }

    pub async fn policy_count(&self) -> usize {
        self.policies.read().await.len()
    }
}

#[async_trait]
impl PolicyRepository for InMemoryPolicyRepository {
    async fn get_policy(&self, key: &GroupKey) -> Result<Option<GroupPolicy>, DomainError> {
        Ok(self.policies.read().await.get(key).cloned())
    }

    async fn save_policy(&self, policy: &GroupPolicy) -> Result<(), DomainError> {
        self.policies
            .write()
            .await
            .insert(policy.key(), policy.clone());
        Ok(())
    }

    async fn upsert_group(&self, record: GroupRecord) -> Result<(), DomainError> {
        let mut groups = self.groups.write().await;
        match groups.get_mut(&record.key()) {
            Some(existing) => existing.subject = record.subject,
            None => {
                groups.insert(record.key(), record);
            }
        }
        Ok(())
    }

    async fn set_group_active(&self, key: &GroupKey, active: bool) -> Result<bool, DomainError> {
        match self.groups.write().await.get_mut(key) {
            Some(record) => {
                record.active = active;
                Ok(true)
            }
            None => Ok(false),
        }
    }

    async fn get_group(&self, key: &GroupKey) -> Result<Option<GroupRecord>, DomainError> {
        Ok(self.groups.read().await.get(key).cloned())
    }

    async fn list_groups(&self, session: &SessionId) -> Result<Vec<GroupRecord>, DomainError> {
        let mut records: Vec<GroupRecord> = self
            .groups
            .read()
            .await
            .values()
            .filter(|r| &r.session_id == session && r.active)
            .cloned()
            .collect();
        records.sort_by(|a, b| a.subject.cmp(&b.subject));
        Ok(records)
    }

    async fn remove_group(&self, key: &GroupKey) -> Result<bool, DomainError> {
        self.policies.write().await.remove(key);
        Ok(self.groups.write().await.remove(key).is_some())
    }
}
