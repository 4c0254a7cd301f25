use crate::{SessionId, StreamId};

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Effect {
    /// Open a generation stream; `regenerate` asks the backend to replace its last answer.
    OpenChatStream {
        session_id: SessionId,
        stream_id: StreamId,
        prompt: String,
        regenerate: bool,
    },
    /// Close the transport of a cancelled or abandoned stream.
    CloseStream { stream_id: StreamId },
    StartDownload { repo_id: String, filename: String },
    /// Consumed by the model-list refresher.
    DownloadFinished { filename: String },
    /// Emitted once per conversation after its first completed exchange.
    RequestTitle { session_id: SessionId },
    /// Move the viewport to the bottom once the new content is laid out.
    ScrollToBottom,
    /// Transient, non-blocking user notification.
    Notify { severity: Severity, text: String },
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Severity {
    Info,
    Success,
    Error,
}
