use std::collections::BTreeMap;
use std::io::{self, Write};

use chat_core::{AppViewModel, MessageView, Role, Severity};

/// Where the last written text ended up.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Cursor {
    LineStart,
    Content(usize),
    Thought(usize),
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
struct Printed {
    content: String,
    thought: String,
    /// Finalized and fully written; nothing more to print unless replaced.
    closed: bool,
}

/// Append-only terminal rendering of the view model.
///
/// A stream only ever appends to the last message, so each render writes the
/// new suffix; a message that changed any other way is printed again in full.
pub(crate) struct TerminalView<W> {
    out: W,
    session: Option<String>,
    title: Option<String>,
    printed: Vec<Printed>,
    cursor: Cursor,
    loading_shown: bool,
    /// Last reported ten-percent step per file; `None` while waiting.
    downloads: BTreeMap<String, Option<u32>>,
}

impl<W: Write> TerminalView<W> {
    pub(crate) fn new(out: W) -> Self {
        Self {
            out,
            session: None,
            title: None,
            printed: Vec::new(),
            cursor: Cursor::LineStart,
            loading_shown: false,
            downloads: BTreeMap::new(),
        }
    }

    #[cfg(test)]
    pub(crate) fn output(&self) -> &W {
        &self.out
    }

    pub(crate) fn render(&mut self, view: &AppViewModel) -> io::Result<()> {
        if view.session_id != self.session {
            self.session = view.session_id.clone();
            self.title = None;
            self.printed.clear();
            self.loading_shown = false;
            self.end_line()?;
            match &view.session_id {
                Some(id) => writeln!(self.out, "== session {id} ==")?,
                None => writeln!(self.out, "== no session ==")?,
            }
        }
        if view.title != self.title {
            self.title = view.title.clone();
            if let Some(title) = &view.title {
                self.end_line()?;
                writeln!(self.out, "== {title} ==")?;
            }
        }

        if view.messages.len() < self.printed.len() {
            self.end_line()?;
            let withdrawn = self.printed.len() - view.messages.len();
            writeln!(self.out, "[{withdrawn} message(s) withdrawn]")?;
            self.printed.truncate(view.messages.len());
        }
        for message in &view.messages {
            self.render_message(message)?;
        }

        if view.awaiting_first_token && !self.loading_shown {
            self.loading_shown = true;
            self.line("assistant> ...")?;
        }
        if !view.is_streaming {
            self.loading_shown = false;
            self.end_line()?;
        }

        self.render_downloads(view)?;
        self.out.flush()
    }

    pub(crate) fn notify(&mut self, severity: Severity, text: &str) -> io::Result<()> {
        let label = match severity {
            Severity::Info => "info",
            Severity::Success => "ok",
            Severity::Error => "error",
        };
        self.line(&format!("[{label}] {text}"))
    }

    /// Writes a full line of its own, outside any message.
    pub(crate) fn line(&mut self, text: &str) -> io::Result<()> {
        self.end_line()?;
        writeln!(self.out, "{text}")?;
        self.out.flush()
    }

    fn render_message(&mut self, message: &MessageView) -> io::Result<()> {
        let index = message.index;
        let thought = message.thought.as_deref().unwrap_or_default();
        if self.printed.len() <= index {
            self.printed.resize(index + 1, Printed::default());
        }

        let prev = &self.printed[index];
        let replaced = !message.content.starts_with(&prev.content)
            || !thought.starts_with(&prev.thought);
        if replaced {
            self.end_line()?;
            writeln!(self.out, "[message {index} replaced]")?;
            self.printed[index] = Printed::default();
        }
        let prev = self.printed[index].clone();
        if prev.closed {
            return Ok(());
        }

        if message.role == Role::User {
            self.end_line()?;
            writeln!(self.out, "you> {}", message.content)?;
        } else {
            if thought.len() > prev.thought.len() {
                self.write_text(Cursor::Thought(index), "  [thinking] ", &thought[prev.thought.len()..])?;
            }
            if message.content.len() > prev.content.len() {
                self.write_text(
                    Cursor::Content(index),
                    "assistant> ",
                    &message.content[prev.content.len()..],
                )?;
            }
            if message.finalized && message.content.is_empty() && thought.is_empty() {
                // Ended before any text arrived, e.g. cancelled.
                self.line("assistant> (no answer)")?;
            }
        }

        self.printed[index] = Printed {
            content: message.content.clone(),
            thought: thought.to_string(),
            closed: message.finalized,
        };
        Ok(())
    }

    fn render_downloads(&mut self, view: &AppViewModel) -> io::Result<()> {
        for filename in &view.pending_downloads {
            if !self.downloads.contains_key(filename) {
                self.downloads.insert(filename.clone(), None);
                self.line(&format!("[download] {filename}: waiting"))?;
            }
        }
        for row in &view.downloads {
            // Report in steps of ten percent.
            let step = (row.percent / 10.0).floor() as u32 * 10;
            let last = self.downloads.insert(row.filename.clone(), Some(step));
            if last != Some(Some(step)) {
                self.line(&format!("[download] {}: {:.1}%", row.filename, row.percent))?;
            }
        }
        self.downloads.retain(|filename, _| {
            view.pending_downloads.contains(filename)
                || view.downloads.iter().any(|row| &row.filename == filename)
        });
        Ok(())
    }

    fn write_text(&mut self, cursor: Cursor, prefix: &str, text: &str) -> io::Result<()> {
        if self.cursor != cursor {
            self.end_line()?;
            write!(self.out, "{prefix}")?;
        }
        write!(self.out, "{text}")?;
        self.cursor = cursor;
        Ok(())
    }

    fn end_line(&mut self) -> io::Result<()> {
        if self.cursor != Cursor::LineStart {
            writeln!(self.out)?;
            self.cursor = Cursor::LineStart;
        }
        Ok(())
    }
}
