use std::collections::{BTreeMap, BTreeSet};

use crate::view_model::{AppViewModel, DownloadRowView, MessageView};
use crate::{Message, Role, ScrollAnchor};

pub type SessionId = String;
pub type StreamId = u64;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum StreamPhase {
    #[default]
    Idle,
    Streaming,
    Completed,
    Errored,
    Cancelled,
}

impl StreamPhase {
    pub fn is_terminal(self) -> bool {
        matches!(
            self,
            StreamPhase::Completed | StreamPhase::Errored | StreamPhase::Cancelled
        )
    }
}

/// What started a stream; decides how much a failed stream rolls back.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StreamOrigin {
    Send,
    Regenerate,
}

/// Reconciliation record of the latest stream of a conversation.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ActiveStream {
    pub id: StreamId,
    pub origin: StreamOrigin,
    pub phase: StreamPhase,
    pub cancelled: bool,
    /// Count of `Token`/`ThoughtToken` events applied to the record.
    pub tokens_applied: usize,
    pub parse_failures: usize,
}

impl ActiveStream {
    fn new(id: StreamId, origin: StreamOrigin) -> Self {
        Self {
            id,
            origin,
            phase: StreamPhase::Streaming,
            cancelled: false,
            tokens_applied: 0,
            parse_failures: 0,
        }
    }

    /// Events are applied only while this holds; checked before every event.
    pub fn accepts_events(&self) -> bool {
        self.phase == StreamPhase::Streaming && !self.cancelled
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct Conversation {
    messages: Vec<Message>,
    stream: Option<ActiveStream>,
    title: Option<String>,
    title_requested: bool,
}

impl Conversation {
    pub fn with_history(messages: Vec<Message>) -> Self {
        // Persisted sessions already went through title generation.
        let title_requested = !messages.is_empty();
        Self {
            messages,
            stream: None,
            title: None,
            title_requested,
        }
    }

    pub fn messages(&self) -> &[Message] {
        &self.messages
    }

    pub fn stream(&self) -> Option<&ActiveStream> {
        self.stream.as_ref()
    }

    pub fn title(&self) -> Option<&str> {
        self.title.as_deref()
    }

    pub fn is_streaming(&self) -> bool {
        self.stream
            .as_ref()
            .is_some_and(|stream| stream.phase == StreamPhase::Streaming)
    }

    pub(crate) fn active_stream_mut(&mut self) -> Option<&mut ActiveStream> {
        self.stream.as_mut()
    }

    pub(crate) fn stream_mut(&mut self, stream_id: StreamId) -> Option<&mut ActiveStream> {
        self.stream.as_mut().filter(|stream| stream.id == stream_id)
    }

    /// Appends the user message and the assistant placeholder together.
    pub(crate) fn begin_exchange(&mut self, prompt: String, stream_id: StreamId) {
        self.messages.push(Message::user(prompt));
        self.messages.push(Message::placeholder());
        self.stream = Some(ActiveStream::new(stream_id, StreamOrigin::Send));
    }

    /// Replaces the last assistant record with a fresh placeholder.
    ///
    /// Returns the prompt that produced it, or `None` if the transcript does
    /// not end in a user/assistant pair.
    pub(crate) fn begin_regenerate(&mut self, stream_id: StreamId) -> Option<String> {
        let len = self.messages.len();
        if len < 2 {
            return None;
        }
        if self.messages[len - 1].role != Role::Assistant || self.messages[len - 2].role != Role::User
        {
            return None;
        }
        let prompt = self.messages[len - 2].content.clone();
        self.messages[len - 1] = Message::placeholder();
        self.stream = Some(ActiveStream::new(stream_id, StreamOrigin::Regenerate));
        Some(prompt)
    }

    pub(crate) fn last_assistant_mut(&mut self) -> Option<&mut Message> {
        self.messages
            .last_mut()
            .filter(|message| message.role == Role::Assistant)
    }

    /// Removes the records added when the stream started.
    pub(crate) fn roll_back(&mut self, origin: StreamOrigin) {
        if self.messages.last().is_some_and(|m| m.role == Role::Assistant) {
            self.messages.pop();
        }
        if origin == StreamOrigin::Send
            && self.messages.last().is_some_and(|m| m.role == Role::User)
        {
            self.messages.pop();
        }
    }

    /// Marks the title trigger as fired; true the first time only.
    pub(crate) fn take_title_trigger(&mut self) -> bool {
        !std::mem::replace(&mut self.title_requested, true)
    }

    pub(crate) fn set_title(&mut self, title: String) {
        self.title = Some(title);
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct Diagnostics {
    pub parse_failures: u64,
    pub dropped_events: u64,
}

#[derive(Debug, Clone, PartialEq, Default)]
pub struct AppState {
    conversations: BTreeMap<SessionId, Conversation>,
    active_session: Option<SessionId>,
    selected_model: Option<String>,
    downloads: BTreeMap<String, f32>,
    pending_downloads: BTreeSet<String>,
    scroll: ScrollAnchor,
    last_stream_id: StreamId,
    diagnostics: Diagnostics,
    dirty: bool,
}

impl AppState {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn view(&self) -> AppViewModel {
        let conversation = self.active_conversation();
        let stream = conversation.and_then(Conversation::stream);
        let is_streaming = conversation.is_some_and(Conversation::is_streaming);
        let messages = conversation
            .map(|conv| {
                let last = conv.messages.len().saturating_sub(1);
                conv.messages
                    .iter()
                    .enumerate()
                    .map(|(index, message)| MessageView {
                        index,
                        role: message.role,
                        content: message.content.clone(),
                        thought: message.thought.clone(),
                        finalized: !(is_streaming && index == last),
                    })
                    .collect()
            })
            .unwrap_or_default();
        let can_regenerate = !is_streaming
            && conversation.is_some_and(|conv| {
                conv.messages
                    .last()
                    .is_some_and(|m| m.role == Role::Assistant)
            });

        AppViewModel {
            session_id: self.active_session.clone(),
            title: conversation.and_then(|conv| conv.title.clone()),
            model: self.selected_model.clone(),
            messages,
            is_streaming,
            awaiting_first_token: is_streaming
                && stream.is_some_and(|stream| stream.tokens_applied == 0),
            can_regenerate,
            downloads: self
                .downloads
                .iter()
                .map(|(filename, percent)| DownloadRowView {
                    filename: filename.clone(),
                    percent: *percent,
                })
                .collect(),
            pending_downloads: self.pending_downloads.iter().cloned().collect(),
            pinned: self.scroll.is_pinned(),
            parse_failures: self.diagnostics.parse_failures,
            dirty: self.dirty,
        }
    }

    pub fn conversation(&self, session_id: &str) -> Option<&Conversation> {
        self.conversations.get(session_id)
    }

    pub fn active_session(&self) -> Option<&str> {
        self.active_session.as_deref()
    }

    pub fn active_conversation(&self) -> Option<&Conversation> {
        self.active_session
            .as_deref()
            .and_then(|id| self.conversations.get(id))
    }

    pub fn download_progress(&self, filename: &str) -> Option<f32> {
        self.downloads.get(filename).copied()
    }

    pub fn diagnostics(&self) -> Diagnostics {
        self.diagnostics
    }

    pub fn scroll(&self) -> &ScrollAnchor {
        &self.scroll
    }

    pub fn consume_dirty(&mut self) -> bool {
        std::mem::take(&mut self.dirty)
    }

    pub(crate) fn mark_dirty(&mut self) {
        self.dirty = true;
    }

    pub(crate) fn selected_model(&self) -> Option<&str> {
        self.selected_model.as_deref()
    }

    pub(crate) fn select_model(&mut self, model: String) {
        self.selected_model = Some(model);
        self.dirty = true;
    }

    pub(crate) fn scroll_mut(&mut self) -> &mut ScrollAnchor {
        &mut self.scroll
    }

    pub(crate) fn is_active(&self, session_id: &str) -> bool {
        self.active_session.as_deref() == Some(session_id)
    }

    /// Makes `session_id` the viewed session, keeping a conversation that is
    /// still streaming instead of overwriting it with persisted history.
    pub(crate) fn open_session(&mut self, session_id: SessionId, messages: Vec<Message>) {
        let keep_live = self
            .conversations
            .get(&session_id)
            .is_some_and(Conversation::is_streaming);
        if !keep_live {
            self.conversations
                .insert(session_id.clone(), Conversation::with_history(messages));
        }
        self.active_session = Some(session_id);
        self.scroll = ScrollAnchor::new();
        self.dirty = true;
    }

    pub(crate) fn remove_session(&mut self, session_id: &str) -> Option<Conversation> {
        let removed = self.conversations.remove(session_id);
        if self.is_active(session_id) {
            self.active_session = None;
        }
        if removed.is_some() {
            self.dirty = true;
        }
        removed
    }

    pub(crate) fn conversation_mut(&mut self, session_id: &str) -> Option<&mut Conversation> {
        self.conversations.get_mut(session_id)
    }

    pub(crate) fn next_stream_id(&mut self) -> StreamId {
        self.last_stream_id += 1;
        self.last_stream_id
    }

    pub(crate) fn is_download_tracked(&self, filename: &str) -> bool {
        self.pending_downloads.contains(filename) || self.downloads.contains_key(filename)
    }

    pub(crate) fn mark_download_pending(&mut self, filename: String) {
        self.pending_downloads.insert(filename);
        self.dirty = true;
    }

    pub(crate) fn set_download_progress(&mut self, filename: &str, percent: f32) {
        self.pending_downloads.remove(filename);
        self.downloads
            .insert(filename.to_string(), percent.clamp(0.0, 100.0));
        self.dirty = true;
    }

    pub(crate) fn clear_download(&mut self, filename: &str) {
        self.pending_downloads.remove(filename);
        self.downloads.remove(filename);
        self.dirty = true;
    }

    pub(crate) fn record_parse_failure(&mut self) {
        self.diagnostics.parse_failures += 1;
    }

    pub(crate) fn record_dropped_event(&mut self) {
        self.diagnostics.dropped_events += 1;
    }
}
