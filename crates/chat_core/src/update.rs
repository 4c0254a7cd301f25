use chat_logging::{chat_debug, chat_info, chat_warn};

use crate::{
    AppState, Effect, Msg, ScrollDecision, SessionId, Severity, StreamEvent, StreamId,
    StreamOrigin, StreamPhase,
};

const TRANSPORT_ERROR_TEXT: &str = "An error occurred while communicating with the model";

/// Pure update function: applies a message to state and returns any effects.
pub fn update(mut state: AppState, msg: Msg) -> (AppState, Vec<Effect>) {
    let effects = match msg {
        Msg::ModelSelected(model) => {
            state.select_model(model);
            Vec::new()
        }
        Msg::SessionOpened {
            session_id,
            messages,
        } => {
            state.open_session(session_id, messages);
            vec![Effect::ScrollToBottom]
        }
        Msg::SessionDeleted { session_id } => match state.remove_session(&session_id) {
            Some(conversation) => conversation
                .stream()
                .filter(|stream| stream.phase == StreamPhase::Streaming)
                .map(|stream| {
                    vec![Effect::CloseStream {
                        stream_id: stream.id,
                    }]
                })
                .unwrap_or_default(),
            None => Vec::new(),
        },
        Msg::PromptSubmitted(prompt) => submit_prompt(&mut state, prompt),
        Msg::CancelClicked => cancel_active_stream(&mut state),
        Msg::RegenerateClicked => regenerate(&mut state),
        Msg::ChatEvent {
            session_id,
            stream_id,
            event,
        } => apply_chat_event(&mut state, session_id, stream_id, event),
        Msg::DownloadRequested { repo_id, filename } => {
            if state.is_download_tracked(&filename) {
                chat_debug!("Download of {} already in progress; ignoring", filename);
                return (state, Vec::new());
            }
            state.mark_download_pending(filename.clone());
            vec![
                Effect::Notify {
                    severity: Severity::Info,
                    text: format!("Downloading {filename}..."),
                },
                Effect::StartDownload { repo_id, filename },
            ]
        }
        Msg::DownloadEvent { filename, event } => apply_download_event(&mut state, filename, event),
        Msg::TitleGenerated { session_id, title } => {
            if let Some(conversation) = state.conversation_mut(&session_id) {
                conversation.set_title(title);
                state.mark_dirty();
            }
            Vec::new()
        }
        Msg::ViewportScrolled(metrics) => {
            state.scroll_mut().observe(metrics);
            Vec::new()
        }
        Msg::Tick | Msg::NoOp => Vec::new(),
    };

    (state, effects)
}

fn notify_error(text: impl Into<String>) -> Effect {
    Effect::Notify {
        severity: Severity::Error,
        text: text.into(),
    }
}

/// Scroll effect for a mutation of `session_id`, decided before it is rendered.
fn scroll_effect(state: &AppState, session_id: &str) -> Option<Effect> {
    if !state.is_active(session_id) {
        return None;
    }
    match state.scroll().begin_update() {
        ScrollDecision::FollowBottom => Some(Effect::ScrollToBottom),
        ScrollDecision::Hold => None,
    }
}

fn submit_prompt(state: &mut AppState, prompt: String) -> Vec<Effect> {
    if prompt.trim().is_empty() {
        return Vec::new();
    }
    if state.selected_model().is_none() {
        return vec![notify_error("Please select a model first.")];
    }
    let Some(session_id) = state.active_session().map(ToOwned::to_owned) else {
        return vec![notify_error("Please start a new chat first.")];
    };
    if state
        .active_conversation()
        .is_some_and(|conversation| conversation.is_streaming())
    {
        chat_debug!("Prompt ignored: session {} is still streaming", session_id);
        return Vec::new();
    }

    let scroll = scroll_effect(state, &session_id);
    let stream_id = state.next_stream_id();
    let Some(conversation) = state.conversation_mut(&session_id) else {
        return vec![notify_error("Please start a new chat first.")];
    };
    conversation.begin_exchange(prompt.clone(), stream_id);
    state.mark_dirty();

    let mut effects = Vec::with_capacity(2);
    effects.push(Effect::OpenChatStream {
        session_id,
        stream_id,
        prompt,
        regenerate: false,
    });
    effects.extend(scroll);
    effects
}

fn regenerate(state: &mut AppState) -> Vec<Effect> {
    let Some(session_id) = state.active_session().map(ToOwned::to_owned) else {
        return Vec::new();
    };
    if state.selected_model().is_none() {
        return vec![notify_error("Please select a model first.")];
    }
    if state
        .active_conversation()
        .is_some_and(|conversation| conversation.is_streaming())
    {
        return Vec::new();
    }

    let scroll = scroll_effect(state, &session_id);
    let stream_id = state.next_stream_id();
    let Some(prompt) = state
        .conversation_mut(&session_id)
        .and_then(|conversation| conversation.begin_regenerate(stream_id))
    else {
        chat_debug!("Nothing to regenerate in session {}", session_id);
        return Vec::new();
    };
    state.mark_dirty();

    let mut effects = Vec::with_capacity(2);
    effects.push(Effect::OpenChatStream {
        session_id,
        stream_id,
        prompt,
        regenerate: true,
    });
    effects.extend(scroll);
    effects
}

fn cancel_active_stream(state: &mut AppState) -> Vec<Effect> {
    let Some(session_id) = state.active_session().map(ToOwned::to_owned) else {
        return Vec::new();
    };
    let Some(stream) = state
        .conversation_mut(&session_id)
        .and_then(|conversation| conversation.active_stream_mut())
        .filter(|stream| stream.phase == StreamPhase::Streaming)
    else {
        return Vec::new();
    };

    stream.cancelled = true;
    stream.phase = StreamPhase::Cancelled;
    let stream_id = stream.id;
    chat_info!(
        "Cancelled stream {} in session {} after {} tokens",
        stream_id,
        session_id,
        stream.tokens_applied
    );
    state.mark_dirty();
    vec![Effect::CloseStream { stream_id }]
}

fn apply_chat_event(
    state: &mut AppState,
    session_id: SessionId,
    stream_id: StreamId,
    event: StreamEvent,
) -> Vec<Effect> {
    // Captured before the mutation so a user who scrolled away is not yanked back.
    let scroll = scroll_effect(state, &session_id);

    let Some(conversation) = state.conversation_mut(&session_id) else {
        state.record_dropped_event();
        return Vec::new();
    };
    let accepts = conversation
        .stream_mut(stream_id)
        .is_some_and(|stream| stream.accepts_events());
    if !accepts {
        chat_debug!(
            "Dropping event for inactive stream {} in session {}",
            stream_id,
            session_id
        );
        state.record_dropped_event();
        return Vec::new();
    }

    match event {
        StreamEvent::Token(text) => {
            let Some(record) = conversation.last_assistant_mut() else {
                return Vec::new();
            };
            record.content.push_str(&text);
            if let Some(stream) = conversation.stream_mut(stream_id) {
                stream.tokens_applied += 1;
            }
            state.mark_dirty();
            scroll.into_iter().collect()
        }
        StreamEvent::ThoughtToken(text) => {
            let Some(record) = conversation.last_assistant_mut() else {
                return Vec::new();
            };
            record
                .thought
                .get_or_insert_with(String::new)
                .push_str(&text);
            if let Some(stream) = conversation.stream_mut(stream_id) {
                stream.tokens_applied += 1;
            }
            state.mark_dirty();
            scroll.into_iter().collect()
        }
        StreamEvent::ParseFailure(raw) => {
            if let Some(stream) = conversation.stream_mut(stream_id) {
                stream.parse_failures += 1;
            }
            chat_debug!("Skipping malformed line in stream {}: {}", stream_id, raw);
            state.record_parse_failure();
            Vec::new()
        }
        StreamEvent::Progress(_) => {
            chat_debug!("Ignoring progress event on chat stream {}", stream_id);
            Vec::new()
        }
        StreamEvent::Complete => {
            if let Some(stream) = conversation.stream_mut(stream_id) {
                stream.phase = StreamPhase::Completed;
            }
            let request_title = conversation.take_title_trigger();
            state.mark_dirty();
            if request_title {
                vec![Effect::RequestTitle { session_id }]
            } else {
                Vec::new()
            }
        }
        StreamEvent::Error(message) => {
            let Some(stream) = conversation.stream_mut(stream_id) else {
                return Vec::new();
            };
            stream.phase = StreamPhase::Errored;
            let origin: StreamOrigin = stream.origin;
            if stream.tokens_applied == 0 {
                conversation.roll_back(origin);
                chat_warn!(
                    "Stream {} failed before any token; rolled back: {}",
                    stream_id,
                    message
                );
            } else {
                chat_warn!(
                    "Stream {} failed after {} tokens; keeping partial content: {}",
                    stream_id,
                    stream.tokens_applied,
                    message
                );
            }
            state.mark_dirty();
            vec![notify_error(format!("{TRANSPORT_ERROR_TEXT}: {message}"))]
        }
    }
}

fn apply_download_event(state: &mut AppState, filename: String, event: StreamEvent) -> Vec<Effect> {
    if !state.is_download_tracked(&filename) {
        chat_debug!("Dropping event for untracked download {}", filename);
        state.record_dropped_event();
        return Vec::new();
    }

    match event {
        StreamEvent::Progress(percent) => {
            state.set_download_progress(&filename, percent);
            Vec::new()
        }
        StreamEvent::Complete => {
            state.clear_download(&filename);
            chat_info!("Download of {} finished", filename);
            vec![
                Effect::Notify {
                    severity: Severity::Success,
                    text: format!("{filename} downloaded successfully!"),
                },
                Effect::DownloadFinished { filename },
            ]
        }
        StreamEvent::Error(message) => {
            state.clear_download(&filename);
            chat_warn!("Download of {} failed: {}", filename, message);
            vec![notify_error(message)]
        }
        StreamEvent::ParseFailure(raw) => {
            chat_debug!("Skipping malformed progress line for {}: {}", filename, raw);
            state.record_parse_failure();
            Vec::new()
        }
        StreamEvent::Token(_) | StreamEvent::ThoughtToken(_) => Vec::new(),
    }
}
