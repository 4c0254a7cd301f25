/// One decoded event from a backend NDJSON stream.
#[derive(Debug, Clone, PartialEq)]
pub enum StreamEvent {
    /// Main response text.
    Token(String),
    /// Auxiliary reasoning text for the thought channel.
    ThoughtToken(String),
    /// Download progress, clamped to 0..=100.
    Progress(f32),
    /// In-band completion, or transport end for chat streams.
    Complete,
    /// Transport failure or in-band error message.
    Error(String),
    /// A line that could not be decoded; carries the raw line.
    ParseFailure(String),
}

impl StreamEvent {
    /// Terminal events end a stream; nothing is applied after them.
    pub fn is_terminal(&self) -> bool {
        matches!(self, StreamEvent::Complete | StreamEvent::Error(_))
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Role {
    User,
    Assistant,
}

impl Role {
    pub fn as_str(self) -> &'static str {
        match self {
            Role::User => "user",
            Role::Assistant => "assistant",
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Message {
    pub role: Role,
    pub content: String,
    pub thought: Option<String>,
}

impl Message {
    pub fn user(content: impl Into<String>) -> Self {
        Self {
            role: Role::User,
            content: content.into(),
            thought: None,
        }
    }

    pub fn assistant(content: impl Into<String>) -> Self {
        Self {
            role: Role::Assistant,
            content: content.into(),
            thought: None,
        }
    }

    /// Empty assistant record a new stream writes into.
    pub fn placeholder() -> Self {
        Self::assistant(String::new())
    }
}
