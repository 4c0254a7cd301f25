use chat_core::{Effect, Msg, Severity};
use chat_engine::{ClientSettings, EngineEvent, EngineHandle, TransportError};
use chat_logging::{chat_info, chat_trace, chat_warn};

/// A notification to show the user.
pub(crate) type Notice = (Severity, String);

/// Executes core effects against the engine and turns engine events back into messages.
pub(crate) struct EffectRunner {
    engine: EngineHandle,
}

impl EffectRunner {
    pub(crate) fn new(settings: &ClientSettings) -> Result<Self, TransportError> {
        Ok(Self {
            engine: EngineHandle::with_settings(settings)?,
        })
    }

    /// Runs `effects` in order; notifications are handed back for display.
    pub(crate) fn run(&self, effects: Vec<Effect>) -> Vec<Notice> {
        let mut notices = Vec::new();
        for effect in effects {
            match effect {
                Effect::OpenChatStream {
                    session_id,
                    stream_id,
                    prompt,
                    regenerate,
                } => {
                    chat_info!(
                        "OpenChatStream session={} stream={} prompt_len={} regenerate={}",
                        session_id,
                        stream_id,
                        prompt.len(),
                        regenerate
                    );
                    self.engine.open_chat(session_id, stream_id, prompt, regenerate);
                }
                Effect::CloseStream { stream_id } => {
                    chat_info!("CloseStream stream={}", stream_id);
                    self.engine.close_stream(stream_id);
                }
                Effect::StartDownload { repo_id, filename } => {
                    chat_info!("StartDownload repo={} file={}", repo_id, filename);
                    self.engine.start_download(repo_id, filename);
                }
                Effect::RequestTitle { session_id } => {
                    self.engine.request_title(session_id);
                }
                Effect::ScrollToBottom => {
                    // A terminal is always at the bottom.
                    chat_trace!("ScrollToBottom");
                }
                Effect::DownloadFinished { filename } => {
                    chat_info!("Model file {} is ready", filename);
                }
                Effect::Notify { severity, text } => notices.push((severity, text)),
            }
        }
        notices
    }

    /// Drains every waiting engine event as core messages.
    pub(crate) fn drain(&self) -> Vec<Msg> {
        std::iter::from_fn(|| self.engine.try_recv())
            .filter_map(into_msg)
            .collect()
    }
}

fn into_msg(event: EngineEvent) -> Option<Msg> {
    match event {
        EngineEvent::Chat {
            session_id,
            stream_id,
            event,
        } => Some(Msg::ChatEvent {
            session_id,
            stream_id,
            event,
        }),
        EngineEvent::Download { filename, event } => Some(Msg::DownloadEvent { filename, event }),
        EngineEvent::TitleGenerated { session_id, title } => {
            Some(Msg::TitleGenerated { session_id, title })
        }
        EngineEvent::TitleFailed { session_id, error } => {
            chat_warn!("Title for session {} failed: {}", session_id, error);
            None
        }
    }
}
