use thiserror::Error;

/// Errors produced by type operations.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum TypeError {
    #[error("unsupported HTTP method: {0}")]
    InvalidMethod(String),

    #[error("invalid artifact kind: {0:?}")]
    InvalidKind(String),

    #[error("serialization error: {0}")]
    Serialization(String),
}
