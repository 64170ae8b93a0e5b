//! PolicyService - reads and writes group policies and group records.
//!
//! Every write goes through [`PolicyPatch::apply`], so the stored policy is
//! always the validated, typed form. Successful writes publish a
//! `policy_update` event; discovery and removal publish `group_update`.

use serde_json::json;
use std::sync::Arc;
use tokio::sync::Mutex;

use crate::domain::foundation::SessionId;
use crate::domain::policy::{GroupKey, GroupPolicy, GroupRecord, PolicyError, PolicyPatch};
use crate::ports::{LiveEvent, LiveEventKind, LiveEventPublisher, PolicyRepository};

use super::MuteScheduler;

pub struct PolicyService {
    repository: Arc<dyn PolicyRepository>,
    publisher: Arc<dyn LiveEventPublisher>,
    mutes: Arc<MuteScheduler>,
    /// Serializes read-modify-write cycles on policies.
    write_lock: Mutex<()>,
}

impl PolicyService {
    pub fn new(
        repository: Arc<dyn PolicyRepository>,
        publisher: Arc<dyn LiveEventPublisher>,
        mutes: Arc<MuteScheduler>,
    ) -> Self {
        Self {
            repository,
            publisher,
            mutes,
            write_lock: Mutex::new(()),
        }
    }

    pub fn mutes(&self) -> &Arc<MuteScheduler> {
        &self.mutes
    }

    /// Policy of a known group.
    ///
    /// A discovered group without a stored policy gets the default one.
    pub async fn get_policy(&self, key: &GroupKey) -> Result<GroupPolicy, PolicyError> {
        if let Some(policy) = self.repository.get_policy(key).await? {
            return Ok(policy);
        }
        if self.repository.get_group(key).await?.is_none() {
            return Err(PolicyError::NotFound(key.clone()));
        }
        self.ensure_policy(key).await
    }

    /// Policy of `key`, created with defaults on first use.
    pub async fn ensure_policy(&self, key: &GroupKey) -> Result<GroupPolicy, PolicyError> {
        if let Some(policy) = self.repository.get_policy(key).await? {
            return Ok(policy);
        }
        let _guard = self.write_lock.lock().await;
        // Re-check under the lock; another lane may have created it.
        if let Some(policy) = self.repository.get_policy(key).await? {
            return Ok(policy);
        }
        let policy = GroupPolicy::for_key(key);
        self.repository.save_policy(&policy).await?;
        tracing::debug!(group_id = %key.group_id, session_id = %key.session_id, "Created default policy");
        Ok(policy)
    }

    /// Validate and apply `patch`, returning the stored policy.
    ///
    /// On error the previous policy is left untouched. Changing admin-only
    /// mode cancels any pending auto-unmute job of the group.
    pub async fn set_policy(
        &self,
        key: &GroupKey,
        patch: &PolicyPatch,
    ) -> Result<GroupPolicy, PolicyError> {
        let policy = self.update(key, patch).await?;
        if patch.touches_admin_only() {
            self.mutes.cancel(key);
        }
        Ok(policy)
    }

    /// Lift admin-only mode from a firing auto-unmute job.
    ///
    /// Unlike [`set_policy`](Self::set_policy) this leaves the scheduler
    /// alone; the job has already removed itself.
    pub async fn auto_unmute(&self, key: &GroupKey) -> Result<GroupPolicy, PolicyError> {
        self.update(key, &PolicyPatch::admin_only(false)).await
    }

    async fn update(&self, key: &GroupKey, patch: &PolicyPatch) -> Result<GroupPolicy, PolicyError> {
        let _guard = self.write_lock.lock().await;
        let current = match self.repository.get_policy(key).await? {
            Some(policy) => policy,
            None if self.repository.get_group(key).await?.is_some() => GroupPolicy::for_key(key),
            None => return Err(PolicyError::NotFound(key.clone())),
        };

        let next = patch.apply(&current).map_err(|err| {
            tracing::debug!(group_id = %key.group_id, field = err.field(), "Rejected policy patch");
            PolicyError::from(err)
        })?;
        self.repository.save_policy(&next).await?;

        tracing::info!(group_id = %key.group_id, session_id = %key.session_id, "Policy updated");
        self.publisher.publish(LiveEvent::new(
            LiveEventKind::PolicyUpdate,
            json!({ "sessionId": key.session_id, "groupId": key.group_id, "policy": next }),
        ));
        Ok(next)
    }

    // ════════════════════════════════════════════════════════════════════════════
    // Group records
    // ════════════════════════════════════════════════════════════════════════════

    /// Register a discovered group and make sure it has a policy.
    pub async fn record_group(&self, record: GroupRecord) -> Result<GroupPolicy, PolicyError> {
        let key = record.key();
        self.repository.upsert_group(record).await?;
        self.ensure_policy(&key).await
    }

    /// Update the subject of a known group. Returns false for unknown groups.
    pub async fn rename_group(&self, key: &GroupKey, subject: &str) -> Result<bool, PolicyError> {
        let Some(mut record) = self.repository.get_group(key).await? else {
            return Ok(false);
        };
        record.subject = subject.to_string();
        self.repository.upsert_group(record).await?;
        self.publish_group_update(
            &key.session_id,
            json!({ "groupId": key.group_id, "subject": subject }),
        );
        Ok(true)
    }

    /// Turn moderation of a known group on or off without forgetting it.
    ///
    /// Returns false for unknown groups.
    pub async fn set_group_active(&self, key: &GroupKey, active: bool) -> Result<bool, PolicyError> {
        if !self.repository.set_group_active(key, active).await? {
            return Ok(false);
        }
        if !active {
            self.mutes.cancel(key);
        }
        tracing::info!(group_id = %key.group_id, session_id = %key.session_id, active, "Group activity changed");
        self.publish_group_update(
            &key.session_id,
            json!({ "groupId": key.group_id, "active": active }),
        );
        Ok(true)
    }

    pub async fn group(&self, key: &GroupKey) -> Result<Option<GroupRecord>, PolicyError> {
        Ok(self.repository.get_group(key).await?)
    }

    /// Active groups of a session, ordered by subject.
    pub async fn groups_for(&self, session: &SessionId) -> Result<Vec<GroupRecord>, PolicyError> {
        Ok(self.repository.list_groups(session).await?)
    }

    /// Forget a group and its policy, cancelling its auto-unmute job.
    pub async fn remove_group(&self, key: &GroupKey) -> Result<bool, PolicyError> {
        self.mutes.cancel(key);
        let removed = self.repository.remove_group(key).await?;
        if removed {
            self.publish_group_update(
                &key.session_id,
                json!({ "groupId": key.group_id, "removed": true }),
            );
        }
        Ok(removed)
    }

    pub fn publish_group_update(&self, session: &SessionId, data: serde_json::Value) {
        self.publisher.publish(LiveEvent::new(
            LiveEventKind::GroupUpdate,
            json!({ "sessionId": session, "update": data }),
        ));
    }
}

impl std::fmt::Debug for PolicyService {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("PolicyService").finish_non_exhaustive()
    }
}
