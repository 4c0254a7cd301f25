//! Chat engine: stream transport, frame decoding, rendering and clipboard dispatch.
mod client;
mod clipboard;
mod engine;
mod export;
mod frame;
mod render;
mod stream;
mod types;

pub use client::{
    BackendClient, ByteStream, ChatRequest, ClientSettings, ReqwestBackend, CHAT_STREAM_PATH,
    DOWNLOAD_PATH, TITLE_PATH,
};
pub use clipboard::{
    copy_control_ids, Clipboard, ClipboardDispatcher, ClipboardError, CopyKind, CopyOutcome, CopyState,
    MemoryClipboard, COPY_FEEDBACK_DURATION,
};
pub use engine::EngineHandle;
pub use export::{export_transcript, transcript_html, ExportError};
pub use frame::{parse_line, FrameReader, LineError};
pub use render::{
    escape_html, normalize_language, render_literal, resolve_language, CopyStates, LanguageRegistry,
    MarkdownRenderer, PlainRegistry, RenderError, SyntectRegistry, PLAINTEXT,
};
pub use stream::EventStream;
pub use types::{EngineEvent, FailureKind, TransportError};
