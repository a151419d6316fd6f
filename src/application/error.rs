use std::error::Error as StdError;

use thiserror::Error;
use tracing::error;

use crate::{
    application::{pagination::PaginationError, repos::RepoError},
    domain::error::DomainError,
    infra::error::InfraError,
};

/// Flattened error chain, outermost message first.
#[derive(Debug, Clone)]
pub struct ErrorReport {
    pub source: &'static str,
    pub messages: Vec<String>,
}

impl ErrorReport {
    pub fn from_error(source: &'static str, error: &dyn StdError) -> Self {
        let mut messages = Vec::new();
        messages.push(error.to_string());
        let mut current = error.source();
        while let Some(inner) = current {
            messages.push(inner.to_string());
            current = inner.source();
        }
        Self { source, messages }
    }

    pub fn chain(&self) -> String {
        self.messages.join(": ")
    }
}

#[derive(Debug, Error)]
pub enum AppError {
    #[error("precondition failed: {message}")]
    Precondition { message: String },
    #[error(transparent)]
    Domain(#[from] DomainError),
    #[error("{entity} `{id}` not found")]
    NotFound { entity: &'static str, id: String },
    #[error("operation `{operation}` failed")]
    OperationFailed {
        operation: &'static str,
        #[source]
        source: RepoError,
    },
    #[error("local cache inconsistency: {message}")]
    Consistency { message: String },
    #[error(transparent)]
    Pagination(#[from] PaginationError),
    #[error(transparent)]
    Infra(#[from] InfraError),
}

impl AppError {
    pub fn precondition(message: impl Into<String>) -> Self {
        Self::Precondition {
            message: message.into(),
        }
    }

    pub fn not_found(entity: &'static str, id: impl Into<String>) -> Self {
        Self::NotFound {
            entity,
            id: id.into(),
        }
    }

    pub fn consistency(message: impl Into<String>) -> Self {
        Self::Consistency {
            message: message.into(),
        }
    }

    pub fn is_precondition(&self) -> bool {
        matches!(self, AppError::Precondition { .. })
    }
}

/// Map a backend failure at a mutation boundary, logging it once.
pub(crate) fn operation_failed(operation: &'static str) -> impl FnOnce(RepoError) -> AppError {
    move |source| {
        let report = ErrorReport::from_error("application::error::operation_failed", &source);
        error!(
            target = "bidhall::remote",
            operation,
            error = %report.chain(),
            "remote operation failed"
        );
        AppError::OperationFailed { operation, source }
    }
}
