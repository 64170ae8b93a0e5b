//! In-memory tenant directory.

use async_trait::async_trait;
use std::collections::HashMap;
use tokio::sync::RwLock;

use crate::domain::foundation::{DomainError, ParticipantId, TenantId};
use crate::ports::{TenantDirectory, TenantRole};

#[derive(Debug, Clone, Default)]
struct TenantProfile {
    role: TenantRole,
    linked_accounts: Vec<ParticipantId>,
}

#[derive(Debug, Default)]
pub struct InMemoryTenantDirectory {
    tenants: RwLock<HashMap<TenantId, TenantProfile>>,
}

impl InMemoryTenantDirectory {
    pub fn new() -> Self {
        Self::default()
    }

    pub async fn set_role(&self, tenant: TenantId, role: TenantRole) {
        self.tenants.write().await.entry(tenant).or_default().role = role;
    }

    pub async fn link_account(&self, tenant: TenantId, account: ParticipantId) {
        let mut tenants = self.tenants.write().await;
        let profile = tenants.entry(tenant).or_default();
        if !profile.linked_accounts.contains(&account) {
            profile.linked_accounts.push(account);
        }
    }
}

#[async_trait]
impl TenantDirectory for InMemoryTenantDirectory {
    async fn role(&self, tenant: &TenantId) -> Result<TenantRole, DomainError> {
        Ok(self
            .tenants
            .read()
            .await
            .get(tenant)
            .map(|p| p.role)
            .unwrap_or_default())
    }

    async fn linked_accounts(&self, tenant: &TenantId) -> Result<Vec<ParticipantId>, DomainError> {
        Ok(self
            .tenants
            .read()
            .await
            .get(tenant)
            .map(|p| p.linked_accounts.clone())
            .unwrap_or_default())
    }
}
