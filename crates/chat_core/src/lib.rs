//! Chat core: pure state machine reconciling stream events into transcripts,
//! download progress and scroll decisions.
mod effect;
mod event;
mod msg;
mod scroll;
mod state;
mod update;
mod view_model;

pub use effect::{Effect, Severity};
pub use event::{Message, Role, StreamEvent};
pub use msg::Msg;
pub use scroll::{ScrollAnchor, ScrollDecision, ScrollMetrics, SCROLL_PIN_TOLERANCE};
pub use state::{
    ActiveStream, AppState, Conversation, Diagnostics, SessionId, StreamId, StreamOrigin,
    StreamPhase,
};
pub use update::update;
pub use view_model::{AppViewModel, DownloadRowView, MessageView};
