//! LogRepository port - append-only audit history.

use async_trait::async_trait;

use crate::domain::audit::AuditEntry;
use crate::domain::foundation::DomainError;

#[async_trait]
pub trait LogRepository: Send + Sync {
    /// Persist one audit entry.
    async fn append(&self, entry: AuditEntry) -> Result<(), DomainError>;
}
