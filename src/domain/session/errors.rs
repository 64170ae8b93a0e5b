//! Session-specific error types.

use thiserror::Error;

use crate::domain::foundation::{DomainError, ErrorCode, SessionId, TenantId};

use super::SessionState;

/// Errors surfaced by session lifecycle operations.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum SessionError {
    /// Tenant already holds a live session.
    #[error("Tenant {tenant} already has an active session ({existing})")]
    Conflict { tenant: TenantId, existing: SessionId },

    /// Session was not found.
    #[error("Session not found: {0}")]
    NotFound(SessionId),

    /// Connection provider failed while opening the session.
    #[error("Connection provider error: {0}")]
    Provider(String),

    /// Requested transition is not on the lifecycle graph.
    #[error("Invalid session transition from {from} to {to}")]
    InvalidTransition {
        from: SessionState,
        to: SessionState,
    },
}

impl SessionError {
    pub fn provider(message: impl Into<String>) -> Self {
        SessionError::Provider(message.into())
    }

    pub fn code(&self) -> ErrorCode {
        match self {
            SessionError::Conflict { .. } => ErrorCode::SessionConflict,
            SessionError::NotFound(_) => ErrorCode::SessionNotFound,
            SessionError::Provider(_) => ErrorCode::ProviderError,
            SessionError::InvalidTransition { .. } => ErrorCode::InvalidStateTransition,
        }
    }
}

impl From<SessionError> for DomainError {
    fn from(err: SessionError) -> Self {
        DomainError::new(err.code(), err.to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn conflict_maps_to_conflict_code() {
        let err = SessionError::Conflict {
            tenant: TenantId::new("t1").unwrap(),
            existing: SessionId::new("s1").unwrap(),
        };
        assert_eq!(err.code(), ErrorCode::SessionConflict);
        assert!(err.to_string().contains("s1"));
    }

    #[test]
    fn converts_into_domain_error() {
        let err: DomainError = SessionError::NotFound(SessionId::new("s9").unwrap()).into();
        assert_eq!(err.code, ErrorCode::SessionNotFound);
    }
}
