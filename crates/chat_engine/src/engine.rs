use std::collections::HashMap;
use std::sync::{mpsc, Arc, Mutex};
use std::thread;
use std::time::Duration;

use chat_core::{SessionId, StreamEvent, StreamId};
use chat_logging::{chat_debug, chat_error, chat_info, chat_warn};
use tokio_util::sync::CancellationToken;

use crate::client::{BackendClient, ChatRequest, ClientSettings, ReqwestBackend};
use crate::stream::EventStream;
use crate::{EngineEvent, TransportError};

const DOWNLOAD_CLOSED_EARLY: &str = "download stream closed before completion";

enum EngineCommand {
    OpenChat {
        session_id: SessionId,
        stream_id: StreamId,
        request: ChatRequest,
    },
    StartDownload {
        repo_id: String,
        filename: String,
    },
    CloseStream {
        stream_id: StreamId,
    },
    RequestTitle {
        session_id: SessionId,
    },
}

type CancelMap = Arc<Mutex<HashMap<StreamId, CancellationToken>>>;

/// Handle to the engine worker thread; commands in, `EngineEvent`s out.
pub struct EngineHandle {
    cmd_tx: mpsc::Sender<EngineCommand>,
    event_rx: mpsc::Receiver<EngineEvent>,
}

impl EngineHandle {
    pub fn new(backend: Arc<dyn BackendClient>) -> Self {
        let (cmd_tx, cmd_rx) = mpsc::channel();
        let (event_tx, event_rx) = mpsc::channel();

        thread::spawn(move || {
            let runtime = match tokio::runtime::Builder::new_multi_thread()
                .enable_all()
                .build()
            {
                Ok(runtime) => runtime,
                Err(err) => {
                    chat_error!("Failed to start engine runtime: {}", err);
                    return;
                }
            };
            let cancels: CancelMap = Arc::default();
            while let Ok(command) = cmd_rx.recv() {
                handle_command(&runtime, &backend, &cancels, command, &event_tx);
            }
            chat_debug!("Engine command channel closed; worker exiting");
        });

        Self { cmd_tx, event_rx }
    }

    pub fn with_settings(settings: &ClientSettings) -> Result<Self, TransportError> {
        let backend = ReqwestBackend::new(settings)?;
        Ok(Self::new(Arc::new(backend)))
    }

    pub fn open_chat(
        &self,
        session_id: impl Into<SessionId>,
        stream_id: StreamId,
        prompt: impl Into<String>,
        regenerate: bool,
    ) {
        let session_id = session_id.into();
        let request = ChatRequest {
            session_id: session_id.clone(),
            prompt: prompt.into(),
            regenerate,
        };
        self.send(EngineCommand::OpenChat {
            session_id,
            stream_id,
            request,
        });
    }

    pub fn start_download(&self, repo_id: impl Into<String>, filename: impl Into<String>) {
        self.send(EngineCommand::StartDownload {
            repo_id: repo_id.into(),
            filename: filename.into(),
        });
    }

    /// Closes the transport of a stream; nothing more is reported for it.
    pub fn close_stream(&self, stream_id: StreamId) {
        self.send(EngineCommand::CloseStream { stream_id });
    }

    pub fn request_title(&self, session_id: impl Into<SessionId>) {
        self.send(EngineCommand::RequestTitle {
            session_id: session_id.into(),
        });
    }

    pub fn try_recv(&self) -> Option<EngineEvent> {
        self.event_rx.try_recv().ok()
    }

    pub fn recv_timeout(&self, timeout: Duration) -> Option<EngineEvent> {
        self.event_rx.recv_timeout(timeout).ok()
    }

    fn send(&self, command: EngineCommand) {
        if self.cmd_tx.send(command).is_err() {
            chat_warn!("Engine worker is gone; command dropped");
        }
    }
}

fn handle_command(
    runtime: &tokio::runtime::Runtime,
    backend: &Arc<dyn BackendClient>,
    cancels: &CancelMap,
    command: EngineCommand,
    event_tx: &mpsc::Sender<EngineEvent>,
) {
    let backend = backend.clone();
    let event_tx = event_tx.clone();
    match command {
        EngineCommand::OpenChat {
            session_id,
            stream_id,
            request,
        } => {
            let token = CancellationToken::new();
            if let Ok(mut map) = cancels.lock() {
                map.insert(stream_id, token.clone());
            }
            let cancels = cancels.clone();
            runtime.spawn(async move {
                pump_chat(backend.as_ref(), &session_id, stream_id, &request, &token, &event_tx)
                    .await;
                if let Ok(mut map) = cancels.lock() {
                    map.remove(&stream_id);
                }
            });
        }
        EngineCommand::CloseStream { stream_id } => {
            let token = cancels.lock().ok().and_then(|mut map| map.remove(&stream_id));
            match token {
                Some(token) => {
                    chat_info!("Closing stream {}", stream_id);
                    token.cancel();
                }
                None => chat_debug!("Close requested for finished stream {}", stream_id),
            }
        }
        EngineCommand::StartDownload { repo_id, filename } => {
            runtime.spawn(async move {
                pump_download(backend.as_ref(), &repo_id, &filename, &event_tx).await;
            });
        }
        EngineCommand::RequestTitle { session_id } => {
            runtime.spawn(async move {
                let event = match backend.generate_title(&session_id).await {
                    Ok(title) => EngineEvent::TitleGenerated { session_id, title },
                    Err(error) => EngineEvent::TitleFailed { session_id, error },
                };
                let _ = event_tx.send(event);
            });
        }
    }
}

async fn pump_chat(
    backend: &dyn BackendClient,
    session_id: &str,
    stream_id: StreamId,
    request: &ChatRequest,
    token: &CancellationToken,
    event_tx: &mpsc::Sender<EngineEvent>,
) {
    let forward = |event: StreamEvent| {
        event_tx
            .send(EngineEvent::Chat {
                session_id: session_id.to_string(),
                stream_id,
                event,
            })
            .is_ok()
    };

    let opened = tokio::select! {
        biased;
        _ = token.cancelled() => return,
        opened = backend.open_chat_stream(request) => opened,
    };
    let source = match opened {
        Ok(source) => source,
        Err(err) => {
            chat_warn!("Chat stream {} failed to open: {}", stream_id, err);
            forward(StreamEvent::Error(err.to_string()));
            return;
        }
    };

    let mut events = EventStream::new(source);
    loop {
        // Checked before every read; dropping `events` closes the transport.
        let next = tokio::select! {
            biased;
            _ = token.cancelled() => {
                chat_debug!("Chat stream {} cancelled", stream_id);
                return;
            }
            next = events.next_event() => next,
        };
        // Only the transport decides when a chat stream is over.
        let event = match next {
            None => {
                forward(StreamEvent::Complete);
                return;
            }
            Some(event @ StreamEvent::Error(_)) if events.transport_failed() => {
                forward(event);
                return;
            }
            Some(StreamEvent::Complete) => {
                chat_debug!("Ignoring in-band complete line on chat stream {}", stream_id);
                continue;
            }
            Some(StreamEvent::Error(message)) => {
                chat_warn!("Ignoring in-band error line on chat stream {}: {}", stream_id, message);
                continue;
            }
            Some(event) => event,
        };
        if !forward(event) {
            return;
        }
    }
}

async fn pump_download(
    backend: &dyn BackendClient,
    repo_id: &str,
    filename: &str,
    event_tx: &mpsc::Sender<EngineEvent>,
) {
    let forward = |event: StreamEvent| {
        event_tx
            .send(EngineEvent::Download {
                filename: filename.to_string(),
                event,
            })
            .is_ok()
    };

    let source = match backend.open_download_stream(repo_id, filename).await {
        Ok(source) => source,
        Err(err) => {
            chat_warn!("Download of {} failed to start: {}", filename, err);
            forward(StreamEvent::Error(err.to_string()));
            return;
        }
    };

    let mut events = EventStream::new(source);
    while let Some(event) = events.next_event().await {
        let terminal = event.is_terminal();
        if !forward(event) || terminal {
            return;
        }
    }
    forward(StreamEvent::Error(DOWNLOAD_CLOSED_EARLY.to_string()));
}
