//! Error types for the sync engine.

use thiserror::Error;

/// All possible errors from the sync engine.
#[derive(Debug, Error)]
pub enum Error {
    /// Operation before `initialize` or after `destroy`
    #[error("engine is not initialized")]
    NotInitialized,

    /// A reconciliation pass is already running
    #[error("a sync pass is already in progress")]
    SyncInProgress,

    /// Point operation while offline, with no queue fallback
    #[error("not connected")]
    Disconnected,

    /// Network-level failure, with the HTTP status when one was received
    #[error("transport failure: {message}")]
    Transport {
        status: Option<u16>,
        message: String,
    },

    /// Semantic failure reported by the remote
    #[error("backend error: {message}")]
    Backend {
        status: Option<u16>,
        message: String,
    },

    #[error("serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error("resolver error: {0}")]
    Resolver(#[from] tether_merge::Error),

    /// Local store failure
    #[error("local store error: {0}")]
    Storage(String),
}

impl Error {
    /// A transport failure with no HTTP status (connection refused, timeout).
    pub fn transport(message: impl Into<String>) -> Self {
        Error::Transport {
            status: None,
            message: message.into(),
        }
    }

    /// A transport failure carrying an HTTP status.
    pub fn transport_status(status: u16, message: impl Into<String>) -> Self {
        Error::Transport {
            status: Some(status),
            message: message.into(),
        }
    }

    /// A semantic backend failure.
    pub fn backend(message: impl Into<String>) -> Self {
        Error::Backend {
            status: None,
            message: message.into(),
        }
    }

    /// A semantic backend failure carrying an HTTP status.
    pub fn backend_status(status: u16, message: impl Into<String>) -> Self {
        Error::Backend {
            status: Some(status),
            message: message.into(),
        }
    }

    pub fn storage(message: impl Into<String>) -> Self {
        Error::Storage(message.into())
    }

    /// Whether the retry scheduler should try again: plain transport errors
    /// always retry, status-carrying failures only for listed codes.
    pub fn is_retryable(&self, retry_on_status_codes: &[u16]) -> bool {
        match self {
            Error::Transport { status: None, .. } => true,
            Error::Transport {
                status: Some(code), ..
            }
            | Error::Backend {
                status: Some(code), ..
            } => retry_on_status_codes.contains(code),
            _ => false,
        }
    }
}

/// Result type for engine operations.
pub type Result<T> = std::result::Result<T, Error>;
