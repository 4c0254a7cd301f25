use std::panic::{catch_unwind, AssertUnwindSafe};

use chat_core::{Message, MessageView, Role};
use chat_logging::{chat_debug, chat_warn};
use pulldown_cmark::{html, Alignment, CodeBlockKind, CowStr, Event, Options, Parser, Tag, TagEnd};

use super::highlight::{resolve_language, LanguageRegistry, SyntectRegistry};
use super::{escape_attribute, escape_html};
use crate::clipboard::CopyState;

/// Current feedback state of a copy control, by control id.
pub type CopyStates<'a> = &'a dyn Fn(&str) -> CopyState;

fn all_idle(_control_id: &str) -> CopyState {
    CopyState::Idle
}

const BLOCKED_SCHEMES: [&str; 3] = ["javascript:", "vbscript:", "data:"];

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum RenderError {
    #[error("markdown renderer panicked: {0}")]
    Panicked(String),
}

/// Escaped literal text with line breaks preserved; never parsed as markdown.
pub fn render_literal(text: &str) -> String {
    escape_html(text).replace('\n', "<br>\n")
}

/// Turns message text into sanitized markup.
///
/// Assistant text is re-parsed in full on every call, so the output for a
/// growing stream is always the rendering of the whole text so far.
pub struct MarkdownRenderer {
    registry: Box<dyn LanguageRegistry>,
}

impl MarkdownRenderer {
    pub fn new(registry: Box<dyn LanguageRegistry>) -> Self {
        Self { registry }
    }

    pub fn render(&self, role: Role, text: &str) -> String {
        self.render_with_ids(role, text, "m", &all_idle)
    }

    /// Full markup of one transcript entry, every copy control idle.
    ///
    /// `finalized` adds the whole-message copy control; it is left out while
    /// a stream is still writing into the message.
    pub fn render_message(&self, index: usize, message: &Message, finalized: bool) -> String {
        self.entry(
            index,
            message.role,
            &message.content,
            message.thought.as_deref(),
            finalized,
            &all_idle,
        )
    }

    /// Markup of a view-model entry; copy controls are labelled from `states`.
    pub fn render_view(&self, message: &MessageView, states: CopyStates<'_>) -> String {
        self.entry(
            message.index,
            message.role,
            &message.content,
            message.thought.as_deref(),
            message.finalized,
            states,
        )
    }

    fn entry(
        &self,
        index: usize,
        role: Role,
        content: &str,
        thought: Option<&str>,
        finalized: bool,
        states: CopyStates<'_>,
    ) -> String {
        let prefix = format!("m{index}");
        let mut out = format!(
            "<article class=\"message {}\" data-message-index=\"{index}\">\n",
            role.as_str()
        );
        if let Some(thought) = thought.filter(|t| !t.is_empty()) {
            out.push_str("<details class=\"thought\"><summary>Thinking</summary>");
            out.push_str("<div class=\"thought-body\">");
            out.push_str(&render_literal(thought));
            out.push_str("</div></details>\n");
        }
        out.push_str("<div class=\"prose\">");
        out.push_str(&self.render_with_ids(role, content, &prefix, states));
        out.push_str("</div>\n");
        if finalized {
            out.push_str("<div class=\"message-actions\">");
            out.push_str(&copy_control("message", &format!("{prefix}-message"), None, states));
            out.push_str("</div>\n");
        }
        out.push_str("</article>\n");
        out
    }

    /// Renders assistant markdown, reporting a renderer panic instead of
    /// falling back.
    pub fn try_render_markdown(&self, text: &str) -> Result<String, RenderError> {
        self.markdown_checked(text, "m", &all_idle)
    }

    fn render_with_ids(&self, role: Role, text: &str, prefix: &str, states: CopyStates<'_>) -> String {
        match role {
            Role::User => render_literal(text),
            Role::Assistant => match self.markdown_checked(text, prefix, states) {
                Ok(markup) => markup,
                Err(err) => {
                    chat_warn!("Rendering as literal text: {}", err);
                    render_literal(text)
                }
            },
        }
    }

    fn markdown_checked(
        &self,
        text: &str,
        prefix: &str,
        states: CopyStates<'_>,
    ) -> Result<String, RenderError> {
        catch_unwind(AssertUnwindSafe(|| self.markdown_to_html(text, prefix, states))).map_err(|payload| {
            let reason = payload
                .downcast_ref::<&str>()
                .map(|s| s.to_string())
                .or_else(|| payload.downcast_ref::<String>().cloned())
                .unwrap_or_else(|| "unknown panic".to_string());
            RenderError::Panicked(reason)
        })
    }

    fn markdown_to_html(&self, text: &str, prefix: &str, states: CopyStates<'_>) -> String {
        let mut events = Parser::new_ext(text, markdown_options()).map(sanitize);
        let mut output_events: Vec<Event<'_>> = Vec::new();
        let mut code_blocks = 0usize;
        let mut tables = 0usize;

        while let Some(event) = events.next() {
            match event {
                Event::Start(Tag::CodeBlock(kind)) => {
                    let info = match kind {
                        CodeBlockKind::Fenced(info) => info.into_string(),
                        CodeBlockKind::Indented => String::new(),
                    };
                    let code = collect_code(&mut events);
                    code_blocks += 1;
                    let id = format!("{prefix}-code-{code_blocks}");
                    output_events.push(Event::Html(self.code_block(&info, &code, &id, states).into()));
                }
                Event::Start(Tag::Table(alignments)) => {
                    let table = collect_table(&mut events, alignments);
                    tables += 1;
                    let id = format!("{prefix}-table-{tables}");
                    output_events.push(Event::Html(table.to_html(&id, states).into()));
                }
                Event::Rule => {}
                other => output_events.push(other),
            }
        }

        let mut out = String::with_capacity(text.len() * 3 / 2);
        html::push_html(&mut out, output_events.into_iter());
        out
    }

    fn code_block(&self, info: &str, code: &str, control_id: &str, states: CopyStates<'_>) -> String {
        let language = resolve_language(self.registry.as_ref(), info);
        let body = self.registry.highlight(&language, code).unwrap_or_else(|| {
            chat_debug!("Highlighting {} failed; using plain text", language);
            escape_html(code)
        });
        let language = escape_html(&language);
        format!(
            "<div class=\"code-block\">\
             <div class=\"code-header\"><span class=\"code-language\">{language}</span>{control}</div>\
             <pre><code class=\"language-{language}\">{body}</code></pre></div>\n",
            control = copy_control("code", control_id, Some(copy_payload(code)), states),
        )
    }
}

impl Default for MarkdownRenderer {
    fn default() -> Self {
        Self::new(Box::new(SyntectRegistry::new()))
    }
}

fn markdown_options() -> Options {
    let mut options = Options::empty();
    options.insert(Options::ENABLE_TABLES);
    options.insert(Options::ENABLE_STRIKETHROUGH);
    options.insert(Options::ENABLE_TASKLISTS);
    options
}

fn copy_control(kind: &str, control_id: &str, code: Option<&str>, states: CopyStates<'_>) -> String {
    let payload = code
        .map(|code| format!(" data-code=\"{}\"", escape_attribute(code)))
        .unwrap_or_default();
    let state = states(control_id);
    let class = match state {
        CopyState::Idle => "copy-control",
        CopyState::Copied => "copy-control copied",
    };
    format!(
        "<button type=\"button\" class=\"{class}\" data-copy-kind=\"{kind}\" \
         data-control-id=\"{control_id}\"{payload}>{label}</button>",
        label = state.label(),
    )
}

/// Raw HTML becomes text, unsafe link targets are neutralised, and single
/// newlines render as line breaks.
fn sanitize(event: Event<'_>) -> Event<'_> {
    match event {
        Event::Html(raw) | Event::InlineHtml(raw) => Event::Text(raw),
        Event::SoftBreak => Event::HardBreak,
        Event::Start(Tag::Link {
            link_type,
            dest_url,
            title,
            id,
        }) => Event::Start(Tag::Link {
            link_type,
            dest_url: safe_url(dest_url),
            title,
            id,
        }),
        Event::Start(Tag::Image {
            link_type,
            dest_url,
            title,
            id,
        }) => Event::Start(Tag::Image {
            link_type,
            dest_url: safe_url(dest_url),
            title,
            id,
        }),
        other => other,
    }
}

fn safe_url(url: CowStr<'_>) -> CowStr<'_> {
    let lowered = url.trim_start().to_ascii_lowercase();
    if BLOCKED_SCHEMES
        .iter()
        .any(|scheme| lowered.starts_with(scheme))
    {
        CowStr::Borrowed("#")
    } else {
        url
    }
}

/// Code block text without the line ending the parser adds after the last line.
fn copy_payload(code: &str) -> &str {
    code.strip_suffix("\r\n")
        .or_else(|| code.strip_suffix('\n'))
        .unwrap_or(code)
}

fn collect_code<'a>(events: &mut impl Iterator<Item = Event<'a>>) -> String {
    let mut code = String::new();
    for event in events.by_ref() {
        match event {
            Event::End(TagEnd::CodeBlock) => break,
            Event::Text(text) => code.push_str(&text),
            _ => {}
        }
    }
    code
}

struct TableMarkup {
    alignments: Vec<Alignment>,
    head: Vec<String>,
    rows: Vec<Vec<String>>,
}

impl TableMarkup {
    fn to_html(&self, control_id: &str, states: CopyStates<'_>) -> String {
        let mut out = String::from("<div class=\"table-container\">");
        out.push_str("<div class=\"table-header\">");
        out.push_str(&copy_control("table", control_id, None, states));
        out.push_str("</div>\n<table class=\"bordered\">\n");
        if !self.head.is_empty() {
            out.push_str("<thead><tr>");
            self.push_cells(&mut out, "th", &self.head);
            out.push_str("</tr></thead>\n");
        }
        out.push_str("<tbody>\n");
        for row in &self.rows {
            out.push_str("<tr>");
            self.push_cells(&mut out, "td", row);
            out.push_str("</tr>\n");
        }
        out.push_str("</tbody></table></div>\n");
        out
    }

    fn push_cells(&self, out: &mut String, tag: &str, cells: &[String]) {
        for (column, cell) in cells.iter().enumerate() {
            let style = match self.alignments.get(column) {
                Some(Alignment::Left) => " style=\"text-align: left\"",
                Some(Alignment::Center) => " style=\"text-align: center\"",
                Some(Alignment::Right) => " style=\"text-align: right\"",
                _ => "",
            };
            out.push_str(&format!("<{tag}{style}>{cell}</{tag}>"));
        }
    }
}

/// Consumes a table's events; each cell is rendered on its own as inline markdown.
fn collect_table<'a>(
    events: &mut impl Iterator<Item = Event<'a>>,
    alignments: Vec<Alignment>,
) -> TableMarkup {
    let mut table = TableMarkup {
        alignments,
        head: Vec::new(),
        rows: Vec::new(),
    };
    let mut row: Vec<String> = Vec::new();
    let mut cell: Option<Vec<Event<'a>>> = None;

    for event in events.by_ref() {
        match event {
            Event::End(TagEnd::Table) => break,
            Event::Start(Tag::TableHead) | Event::Start(Tag::TableRow) => row.clear(),
            Event::End(TagEnd::TableHead) => table.head = std::mem::take(&mut row),
            Event::End(TagEnd::TableRow) => table.rows.push(std::mem::take(&mut row)),
            Event::Start(Tag::TableCell) => cell = Some(Vec::new()),
            Event::End(TagEnd::TableCell) => {
                let mut markup = String::new();
                html::push_html(&mut markup, cell.take().unwrap_or_default().into_iter());
                row.push(markup);
            }
            other => {
                if let Some(cell) = cell.as_mut() {
                    cell.push(other);
                }
            }
        }
    }
    table
}
