use std::path::PathBuf;

use thiserror::Error;

#[derive(Debug, Error)]
pub enum ProtocolError {
    #[error("unknown operation: {name}")]
    UnknownOperation { name: String },

    #[error("{host} is not an administration interface")]
    NotAdministrationInterface { host: String },

    #[error("invalid registry entry {name}: {reason}")]
    InvalidRegistryEntry { name: String, reason: String },

    #[error("operation {operation} needs {expected} path parameters, got {actual}")]
    MissingPathParams { operation: String, expected: usize, actual: usize },

    #[error("cannot read request body from {path:?}: {source}")]
    BodySource {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("invalid URL {url}: {reason}")]
    InvalidUrl { url: String, reason: String },

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("type error: {0}")]
    Type(#[from] ccs_types::TypeError),
}

pub type ProtocolResult<T> = Result<T, ProtocolError>;
