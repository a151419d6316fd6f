use thiserror::Error;

use crate::domain::validation::FieldErrors;

#[derive(Debug, Error)]
pub enum DomainError {
    #[error("invalid item fields: {0}")]
    InvalidFields(FieldErrors),
    #[error("domain validation failed: {message}")]
    Validation { message: String },
}

impl DomainError {
    pub fn validation(message: impl Into<String>) -> Self {
        Self::Validation {
            message: message.into(),
        }
    }
}
