use std::fmt::Display;

use super::lifecycle::InvalidStateTransition;
use super::repository::{AuditError, RepositoryError};

/// Error taxonomy shared by the exam, marks, and attainment services.
#[derive(Debug, thiserror::Error)]
pub enum AcademicError {
    #[error("{entity} '{id}' not found")]
    EntityNotFound { entity: &'static str, id: String },
    #[error("invalid {field}: {message}")]
    Validation { field: &'static str, message: String },
    #[error("{0}")]
    BusinessRuleViolation(String),
    #[error(transparent)]
    InvalidStateTransition(#[from] InvalidStateTransition),
    #[error(transparent)]
    Repository(#[from] RepositoryError),
    #[error(transparent)]
    Audit(#[from] AuditError),
    #[error("attainment export failed: {0}")]
    Export(String),
}

impl AcademicError {
    pub fn not_found(entity: &'static str, id: impl Display) -> Self {
        Self::EntityNotFound {
            entity,
            id: id.to_string(),
        }
    }

    pub fn validation(field: &'static str, message: impl Into<String>) -> Self {
        Self::Validation {
            field,
            message: message.into(),
        }
    }

    pub fn rule(message: impl Into<String>) -> Self {
        Self::BusinessRuleViolation(message.into())
    }
}
