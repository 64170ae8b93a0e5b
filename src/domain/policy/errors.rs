//! Policy-specific error types.

use thiserror::Error;

use crate::domain::foundation::{DomainError, ErrorCode, ValidationError};

use super::GroupKey;

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum PolicyError {
    #[error("Group not found: {0}")]
    NotFound(GroupKey),

    #[error("Invalid policy: {0}")]
    Validation(#[from] ValidationError),

    #[error("Policy repository error: {0}")]
    Repository(String),
}

impl PolicyError {
    pub fn code(&self) -> ErrorCode {
        match self {
            PolicyError::NotFound(_) => ErrorCode::GroupNotFound,
            PolicyError::Validation(_) => ErrorCode::ValidationFailed,
            PolicyError::Repository(_) => ErrorCode::RepositoryError,
        }
    }
}

impl From<DomainError> for PolicyError {
    fn from(err: DomainError) -> Self {
        PolicyError::Repository(err.message)
    }
}

impl From<PolicyError> for DomainError {
    fn from(err: PolicyError) -> Self {
        DomainError::new(err.code(), err.to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn validation_error_converts() {
        let err: PolicyError = ValidationError::empty_field("prefix").into();
        assert_eq!(err.code(), ErrorCode::ValidationFailed);
        assert!(err.to_string().contains("prefix"));
    }
}
