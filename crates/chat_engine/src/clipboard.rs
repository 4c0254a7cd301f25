use std::collections::HashMap;
use std::time::{Duration, Instant};

use chat_logging::{chat_debug, chat_info};
use ego_tree::NodeRef;
use scraper::node::Node;
use scraper::{ElementRef, Html, Selector};

/// How long a control shows its "Copied" state.
pub const COPY_FEEDBACK_DURATION: Duration = Duration::from_millis(2000);

const KIND_ATTR: &str = "data-copy-kind";
const ID_ATTR: &str = "data-control-id";
const CODE_ATTR: &str = "data-code";
/// Wrappers of copy controls; never part of copied message text.
const CONTROL_CHROME: [&str; 3] = ["code-header", "table-header", "message-actions"];

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum CopyKind {
    Code,
    Table,
    Message,
}

impl CopyKind {
    pub fn parse(value: &str) -> Option<Self> {
        match value {
            "code" => Some(CopyKind::Code),
            "table" => Some(CopyKind::Table),
            "message" => Some(CopyKind::Message),
            _ => None,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum CopyState {
    #[default]
    Idle,
    Copied,
}

impl CopyState {
    pub fn label(self) -> &'static str {
        match self {
            CopyState::Idle => "Copy",
            CopyState::Copied => "Copied",
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum ClipboardError {
    #[error("no copy control with id {0}")]
    UnknownControl(String),
    #[error("{kind:?} control {control_id} has nothing to copy")]
    MissingSource { kind: CopyKind, control_id: String },
    #[error("clipboard write failed: {0}")]
    Write(String),
}

pub trait Clipboard {
    fn write_text(&mut self, text: &str) -> Result<(), ClipboardError>;
}

/// Clipboard that keeps the last written text.
#[derive(Debug, Default, Clone)]
pub struct MemoryClipboard {
    contents: Option<String>,
}

impl MemoryClipboard {
    pub fn contents(&self) -> Option<&str> {
        self.contents.as_deref()
    }
}

impl Clipboard for MemoryClipboard {
    fn write_text(&mut self, text: &str) -> Result<(), ClipboardError> {
        self.contents = Some(text.to_string());
        Ok(())
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CopyOutcome {
    Copied { kind: CopyKind, text: String },
    /// The control is still showing its feedback; activation ignored.
    AlreadyCopied,
    /// The target is not inside any copy control.
    NotAControl,
}

type Extractor = fn(ElementRef<'_>) -> Option<String>;

/// Maps each control kind to the function that finds its payload.
const DISPATCH: [(CopyKind, Extractor); 3] = [
    (CopyKind::Code, extract_code),
    (CopyKind::Table, extract_table),
    (CopyKind::Message, extract_message),
];

/// Routes activations of rendered copy controls to their payload.
pub struct ClipboardDispatcher<C> {
    clipboard: C,
    copied_at: HashMap<String, Instant>,
}

impl<C: Clipboard> ClipboardDispatcher<C> {
    pub fn new(clipboard: C) -> Self {
        Self {
            clipboard,
            copied_at: HashMap::new(),
        }
    }

    pub fn clipboard(&self) -> &C {
        &self.clipboard
    }

    pub fn state(&self, control_id: &str) -> CopyState {
        if self.copied_at.contains_key(control_id) {
            CopyState::Copied
        } else {
            CopyState::Idle
        }
    }

    /// Handles an activation on `target` or any element inside a copy control.
    pub fn activate(
        &mut self,
        target: ElementRef<'_>,
        now: Instant,
    ) -> Result<CopyOutcome, ClipboardError> {
        let Some((control, kind)) = find_control(target) else {
            return Ok(CopyOutcome::NotAControl);
        };
        let control_id = control.value().attr(ID_ATTR).unwrap_or_default().to_string();
        if self.state(&control_id) == CopyState::Copied {
            chat_debug!("Copy control {} still showing feedback", control_id);
            return Ok(CopyOutcome::AlreadyCopied);
        }

        let text = DISPATCH
            .iter()
            .find(|(candidate, _)| *candidate == kind)
            .and_then(|(_, extract)| extract(control))
            .ok_or_else(|| ClipboardError::MissingSource {
                kind,
                control_id: control_id.clone(),
            })?;
        self.clipboard.write_text(&text)?;
        chat_info!("Copied {} bytes from {:?} control {}", text.len(), kind, control_id);
        self.copied_at.insert(control_id, now);
        Ok(CopyOutcome::Copied { kind, text })
    }

    /// Activates the control with the given id in `document`.
    pub fn activate_id(
        &mut self,
        document: &Html,
        control_id: &str,
        now: Instant,
    ) -> Result<CopyOutcome, ClipboardError> {
        let target = Selector::parse("[data-control-id]")
            .ok()
            .and_then(|selector| {
                document
                    .select(&selector)
                    .find(|element| element.value().attr(ID_ATTR) == Some(control_id))
            })
            .ok_or_else(|| ClipboardError::UnknownControl(control_id.to_string()))?;
        self.activate(target, now)
    }

    /// Parses rendered `markup` and activates the control with the given id.
    pub fn activate_in_markup(
        &mut self,
        markup: &str,
        control_id: &str,
        now: Instant,
    ) -> Result<CopyOutcome, ClipboardError> {
        let document = Html::parse_document(markup);
        self.activate_id(&document, control_id, now)
    }

    /// Reverts controls whose feedback has run its course; returns their ids.
    pub fn expire(&mut self, now: Instant) -> Vec<String> {
        let mut expired: Vec<String> = self
            .copied_at
            .iter()
            .filter(|(_, copied)| now.saturating_duration_since(**copied) >= COPY_FEEDBACK_DURATION)
            .map(|(id, _)| id.clone())
            .collect();
        expired.sort();
        for id in &expired {
            self.copied_at.remove(id);
        }
        expired
    }
}

/// Ids of every copy control in rendered `markup`, in document order.
pub fn copy_control_ids(markup: &str) -> Vec<String> {
    let document = Html::parse_document(markup);
    let Ok(selector) = Selector::parse("[data-copy-kind]") else {
        return Vec::new();
    };
    document
        .select(&selector)
        .filter_map(|element| element.value().attr(ID_ATTR))
        .map(str::to_string)
        .collect()
}

/// The nearest enclosing element (or the target itself) carrying a known kind.
fn find_control(target: ElementRef<'_>) -> Option<(ElementRef<'_>, CopyKind)> {
    std::iter::once(*target)
        .chain(target.ancestors())
        .filter_map(ElementRef::wrap)
        .find_map(|element| {
            element
                .value()
                .attr(KIND_ATTR)
                .and_then(CopyKind::parse)
                .map(|kind| (element, kind))
        })
}

fn closest<'a>(element: ElementRef<'a>, class: &str) -> Option<ElementRef<'a>> {
    element
        .ancestors()
        .filter_map(ElementRef::wrap)
        .find(|ancestor| ancestor.value().has_class(class, scraper::CaseSensitivity::CaseSensitive))
}

fn extract_code(control: ElementRef<'_>) -> Option<String> {
    control.value().attr(CODE_ATTR).map(str::to_string)
}

fn extract_table(control: ElementRef<'_>) -> Option<String> {
    let selector = Selector::parse("table").ok()?;
    let container = closest(control, "table-container")?;
    let table = container.select(&selector).next()?;
    Some(table.html())
}

fn extract_message(control: ElementRef<'_>) -> Option<String> {
    let selector = Selector::parse(".prose").ok()?;
    let message = closest(control, "message")?;
    let prose = message.select(&selector).next()?;
    let mut text = String::new();
    for child in prose.children() {
        push_text(child, &mut text);
    }
    Some(text.trim().to_string())
}

/// Text content of `node`, skipping control chrome.
///
/// Rendered markup always writes a line feed after `<br>`, so the break
/// element itself adds nothing.
fn push_text(node: NodeRef<'_, Node>, out: &mut String) {
    match node.value() {
        Node::Text(text) => out.push_str(text),
        Node::Element(element) => {
            if CONTROL_CHROME
                .iter()
                .any(|class| element.has_class(class, scraper::CaseSensitivity::CaseSensitive))
            {
                return;
            }
            for child in node.children() {
                push_text(child, out);
            }
        }
        _ => {}
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_known_kinds_only() {
        assert_eq!(CopyKind::parse("code"), Some(CopyKind::Code));
        assert_eq!(CopyKind::parse("table"), Some(CopyKind::Table));
        assert_eq!(CopyKind::parse("message"), Some(CopyKind::Message));
        assert_eq!(CopyKind::parse("image"), None);
    }

    #[test]
    fn labels_follow_state() {
        assert_eq!(CopyState::Idle.label(), "Copy");
        assert_eq!(CopyState::Copied.label(), "Copied");
    }
}
