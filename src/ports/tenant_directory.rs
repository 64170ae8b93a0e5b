//! TenantDirectory port - tenant roles and linked chat accounts.

use async_trait::async_trait;
use serde::{Deserialize, Serialize};

use crate::domain::foundation::{DomainError, ParticipantId, TenantId};

/// Platform role of a tenant.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TenantRole {
    #[default]
    User,
    /// Elevated role: bypasses the one-live-session rule and may run owner commands.
    Admin,
}

impl TenantRole {
    pub fn is_elevated(&self) -> bool {
        matches!(self, TenantRole::Admin)
    }
}

#[async_trait]
pub trait TenantDirectory: Send + Sync {
    /// Role of `tenant`; unknown tenants are ordinary users.
    async fn role(&self, tenant: &TenantId) -> Result<TenantRole, DomainError>;

    /// Chat accounts the tenant has linked to its platform account.
    async fn linked_accounts(&self, tenant: &TenantId) -> Result<Vec<ParticipantId>, DomainError>;
}
