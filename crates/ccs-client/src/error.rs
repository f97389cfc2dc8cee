use ccs_protocol::ProtocolError;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum ClientError {
    #[error("protocol error: {0}")]
    Protocol(#[from] ProtocolError),

    #[error("transport error: {message}")]
    Transport { message: String, transient: bool },

    #[error("login failed with status {status}")]
    LoginFailed { status: u16 },

    #[error("{operation} returned status {status}")]
    Status { operation: String, status: u16, body: String },

    #[error("locale not recognized: {name}")]
    LocaleNotRecognized { name: String },

    #[error("type error: {0}")]
    Type(#[from] ccs_types::TypeError),
}

impl ClientError {
    pub fn transient(message: impl Into<String>) -> Self {
        Self::Transport { message: message.into(), transient: true }
    }

    pub fn fatal_transport(message: impl Into<String>) -> Self {
        Self::Transport { message: message.into(), transient: false }
    }

    /// HTTP status carried by this error, if it came from a response.
    pub fn status(&self) -> Option<u16> {
        match self {
            Self::Status { status, .. } | Self::LoginFailed { status } => Some(*status),
            _ => None,
        }
    }

    pub fn is_session_expired(&self) -> bool {
        matches!(self, Self::Status { status: 401, .. })
    }

    pub fn is_transient(&self) -> bool {
        matches!(self, Self::Transport { transient: true, .. })
    }

    pub fn is_not_found(&self) -> bool {
        matches!(self, Self::Status { status: 404, .. })
    }
}

pub type ClientResult<T> = Result<T, ClientError>;
