use chat_engine::{Clipboard, ClipboardError, MemoryClipboard};
use chat_logging::chat_warn;

/// Clipboard used by the terminal driver.
///
/// The system clipboard when one can be opened; otherwise copies stay in
/// process, e.g. on a headless machine.
pub(crate) enum AppClipboard {
    System(arboard::Clipboard),
    Memory(MemoryClipboard),
}

impl AppClipboard {
    pub(crate) fn detect() -> Self {
        match arboard::Clipboard::new() {
            Ok(clipboard) => AppClipboard::System(clipboard),
            Err(err) => {
                chat_warn!("System clipboard unavailable ({}); copies stay in memory", err);
                AppClipboard::Memory(MemoryClipboard::default())
            }
        }
    }

    pub(crate) fn is_system(&self) -> bool {
        matches!(self, AppClipboard::System(_))
    }
}

impl Clipboard for AppClipboard {
    fn write_text(&mut self, text: &str) -> Result<(), ClipboardError> {
        match self {
            AppClipboard::System(clipboard) => clipboard
                .set_text(text)
                .map_err(|err| ClipboardError::Write(err.to_string())),
            AppClipboard::Memory(clipboard) => clipboard.write_text(text),
        }
    }
}
