//! Message rendering: markdown for assistant text, literal text for users.
mod highlight;
mod markdown;

pub use highlight::{
    normalize_language, resolve_language, LanguageRegistry, PlainRegistry, SyntectRegistry,
    PLAINTEXT,
};
pub use markdown::{render_literal, CopyStates, MarkdownRenderer, RenderError};

/// Escapes text for element bodies and quoted attribute values.
///
/// Carriage returns and line feeds are written as references so attribute
/// values survive HTML newline normalization byte for byte.
pub fn escape_html(text: &str) -> String {
    let mut out = String::with_capacity(text.len() + text.len() / 8);
    for ch in text.chars() {
        match ch {
            '&' => out.push_str("&amp;"),
            '<' => out.push_str("&lt;"),
            '>' => out.push_str("&gt;"),
            '"' => out.push_str("&quot;"),
            '\'' => out.push_str("&#39;"),
            '\r' => out.push_str("&#13;"),
            other => out.push(other),
        }
    }
    out
}

/// Like [`escape_html`], additionally encoding line feeds for attribute values.
pub(crate) fn escape_attribute(text: &str) -> String {
    escape_html(text).replace('\n', "&#10;")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn escapes_markup_characters() {
        assert_eq!(
            escape_html(r#"a&b<c>"d"'e'"#),
            "a&amp;b&lt;c&gt;&quot;d&quot;&#39;e&#39;"
        );
    }

    #[test]
    fn attribute_escape_encodes_line_breaks() {
        assert_eq!(escape_attribute("a\r\nb"), "a&#13;&#10;b");
    }
}
