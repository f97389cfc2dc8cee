use std::path::PathBuf;

use thiserror::Error;

#[derive(Debug, Error)]
pub enum SyncError {
    #[error("client error: {0}")]
    Client(#[from] ccs_client::ClientError),

    #[error("protocol error: {0}")]
    Protocol(#[from] ccs_protocol::ProtocolError),

    #[error("type error: {0}")]
    Type(#[from] ccs_types::TypeError),

    #[error("invalid layout for {kind}: {reason}")]
    InvalidLayout { kind: String, reason: String },

    #[error("unknown artifact kind: {0}")]
    UnknownKind(String),

    #[error("{path} is not part of any known artifact layout")]
    Unclassified { path: PathBuf },

    #[error("{path} is outside the mirror root")]
    OutsideRoot { path: PathBuf },

    #[error("unexpected listing shape from {operation}: {reason}")]
    InvalidListing { operation: String, reason: String },

    #[error("no remote artifact matches {path}")]
    NotFound { path: PathBuf },

    #[error("I/O error on {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("walk error: {0}")]
    Walk(#[from] walkdir::Error),
}

impl SyncError {
    pub fn io(path: impl Into<PathBuf>, source: std::io::Error) -> Self {
        Self::Io { path: path.into(), source }
    }
}

pub type SyncResult<T> = Result<T, SyncError>;
