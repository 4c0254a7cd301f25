use crate::{Role, SessionId};

#[derive(Debug, Clone, PartialEq, Default)]
pub struct AppViewModel {
    pub session_id: Option<SessionId>,
    pub title: Option<String>,
    pub model: Option<String>,
    pub messages: Vec<MessageView>,
    pub is_streaming: bool,
    /// Stream open but nothing applied yet; the view shows a loading indicator.
    pub awaiting_first_token: bool,
    pub can_regenerate: bool,
    pub downloads: Vec<DownloadRowView>,
    /// Requested downloads that have not reported progress yet.
    pub pending_downloads: Vec<String>,
    pub pinned: bool,
    pub parse_failures: u64,
    pub dirty: bool,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MessageView {
    pub index: usize,
    pub role: Role,
    pub content: String,
    pub thought: Option<String>,
    /// False only for the record a live stream is still writing into.
    pub finalized: bool,
}

#[derive(Debug, Clone, PartialEq)]
pub struct DownloadRowView {
    pub filename: String,
    pub percent: f32,
}
