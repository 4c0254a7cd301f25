use crate::{Message, ScrollMetrics, SessionId, StreamEvent, StreamId};

#[derive(Debug, Clone, PartialEq)]
pub enum Msg {
    /// A model finished loading on the backend.
    ModelSelected(String),
    /// A session became the active one, with its persisted history.
    SessionOpened {
        session_id: SessionId,
        messages: Vec<Message>,
    },
    /// A session was deleted; any stream it owns is closed.
    SessionDeleted { session_id: SessionId },
    /// User sent a prompt in the active session.
    PromptSubmitted(String),
    /// User asked to stop the active session's generation.
    CancelClicked,
    /// User asked to regenerate the last answer of the active session.
    RegenerateClicked,
    /// Event from a chat generation stream.
    ChatEvent {
        session_id: SessionId,
        stream_id: StreamId,
        event: StreamEvent,
    },
    /// User started a model-file download.
    DownloadRequested { repo_id: String, filename: String },
    /// Event from a download stream, keyed by filename.
    DownloadEvent { filename: String, event: StreamEvent },
    /// Title produced by the summarization endpoint.
    TitleGenerated { session_id: SessionId, title: String },
    /// Scroll position observation from the viewport.
    ViewportScrolled(ScrollMetrics),
    /// UI/render tick to coalesce rendering.
    Tick,
    /// Fallback for placeholder wiring.
    NoOp,
}
