use std::fmt;

use chat_core::{SessionId, StreamEvent, StreamId};

/// Events the engine worker reports back to the driver loop.
#[derive(Debug, Clone, PartialEq)]
pub enum EngineEvent {
    Chat {
        session_id: SessionId,
        stream_id: StreamId,
        event: StreamEvent,
    },
    Download {
        filename: String,
        event: StreamEvent,
    },
    TitleGenerated {
        session_id: SessionId,
        title: String,
    },
    /// Title generation is best effort; failures are only reported.
    TitleFailed {
        session_id: SessionId,
        error: TransportError,
    },
}

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("{kind}: {message}")]
pub struct TransportError {
    pub kind: FailureKind,
    pub message: String,
}

impl TransportError {
    pub fn new(kind: FailureKind, message: impl Into<String>) -> Self {
        Self {
            kind,
            message: message.into(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum FailureKind {
    InvalidUrl,
    HttpStatus(u16),
    Timeout,
    Network,
    InvalidResponse,
}

impl fmt::Display for FailureKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            FailureKind::InvalidUrl => write!(f, "invalid url"),
            FailureKind::HttpStatus(code) => write!(f, "http status {code}"),
            FailureKind::Timeout => write!(f, "timeout"),
            FailureKind::Network => write!(f, "network error"),
            FailureKind::InvalidResponse => write!(f, "invalid response"),
        }
    }
}
