//! In-memory audit log.

use async_trait::async_trait;
use std::sync::atomic::{AtomicBool, Ordering};
use tokio::sync::RwLock;

use crate::domain::audit::{AuditEntry, AuditKind};
use crate::domain::foundation::DomainError;
use crate::ports::LogRepository;

/// Audit entries held in process memory, with optional failure injection.
#[derive(Debug, Default)]
pub struct InMemoryLogRepository {
    entries: RwLock<Vec<AuditEntry>>,
    fail_appends: AtomicBool,
}

impl InMemoryLogRepository {
    pub fn new() -> Self {
        Self::default()
    }

    /// Make every subsequent append fail.
    pub fn fail_appends(&self, fail: bool) {
        self.fail_appends.store(fail, Ordering::SeqCst);
    }

    pub async fn entries(&self) -> Vec<AuditEntry> {
        self.entries.read().await.clone()
    }

    pub async fn entries_of(&self, kind: AuditKind) -> Vec<AuditEntry> {
        self.entries
            .read()
            .await
            .iter()
            .filter(|e| e.kind == kind)
            .cloned()
            .collect()
    }
}

#[async_trait]
impl LogRepository for InMemoryLogRepository {
    async fn append(&self, entry: AuditEntry) -> Result<(), DomainError> {
        if self.fail_appends.load(Ordering::SeqCst) {
            return Err(DomainError::repository("audit log unavailable"));
        }
        self.entries.write().await.push(entry);
        Ok(())
    }
}
