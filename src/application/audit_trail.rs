//! AuditTrail - fire-and-forget writer in front of the log repository.
//!
//! Callers enqueue entries without awaiting storage. One background task
//! drains the queue in order; repository failures are logged and dropped.

use std::sync::Arc;
use tokio::sync::{mpsc, oneshot};
use tokio::task::JoinHandle;

use crate::domain::audit::AuditEntry;
use crate::ports::LogRepository;

enum AuditCommand {
    Append(AuditEntry),
    Flush(oneshot::Sender<()>),
}

/// Cloneable sender side of the audit queue.
#[derive(Clone)]
pub struct AuditTrail {
    tx: mpsc::Sender<AuditCommand>,
}

impl AuditTrail {
    /// Start the drain task. It ends once every `AuditTrail` clone is dropped.
    pub fn spawn(repository: Arc<dyn LogRepository>, buffer: usize) -> (Self, JoinHandle<()>) {
        let (tx, mut rx) = mpsc::channel(buffer.max(1));

        let task = tokio::spawn(async move {
            while let Some(command) = rx.recv().await {
                match command {
                    AuditCommand::Append(entry) => {
                        let kind = entry.kind;
                        if let Err(err) = repository.append(entry).await {
                            tracing::warn!(kind = %kind, error = %err, "Failed to persist audit entry");
                        }
                    }
                    AuditCommand::Flush(ack) => {
                        let _ = ack.send(());
                    }
                }
            }
            tracing::debug!("Audit trail drained");
        });

        (Self { tx }, task)
    }

    /// Enqueue an entry. Never blocks; a full queue drops the entry.
    pub fn record(&self, entry: AuditEntry) {
        match self.tx.try_send(AuditCommand::Append(entry)) {
            Ok(()) => {}
            Err(mpsc::error::TrySendError::Full(AuditCommand::Append(entry))) => {
                tracing::warn!(kind = %entry.kind, tenant_id = %entry.tenant_id, "Audit queue full, entry dropped");
            }
            Err(_) => {
                tracing::warn!("Audit trail stopped, entry dropped");
            }
        }
    }

    /// Wait until every entry enqueued before this call has been handled.
    pub async fn flush(&self) {
        let (ack_tx, ack_rx) = oneshot::channel();
        if self.tx.send(AuditCommand::Flush(ack_tx)).await.is_ok() {
            let _ = ack_rx.await;
        }
    }
}

impl std::fmt::Debug for AuditTrail {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("AuditTrail").finish_non_exhaustive()
    }
}
