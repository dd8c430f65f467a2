//! Domain error types

use thiserror::Error;

/// Domain-level errors
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum DomainError {
    #[error("Invalid question: {0}")]
    InvalidQuestion(String),

    #[error("Invalid model: {0:?}")]
    InvalidModel(String),

    #[error("Invalid language tag: {0:?}")]
    InvalidLanguage(String),
}
