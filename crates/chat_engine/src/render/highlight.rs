use std::sync::OnceLock;

use syntect::html::{ClassStyle, ClassedHTMLGenerator};
use syntect::parsing::SyntaxSet;
use syntect::util::LinesWithEndings;

use super::escape_html;

/// Language every registry accepts; rendered as escaped text.
pub const PLAINTEXT: &str = "plaintext";

/// Syntax highlighters available to fenced code blocks.
pub trait LanguageRegistry: Send + Sync {
    /// Whether `language` (already normalized) can be highlighted.
    fn supports(&self, language: &str) -> bool;

    /// Highlighted markup for `code`, or `None` if highlighting failed.
    fn highlight(&self, language: &str, code: &str) -> Option<String>;
}

/// Registry that knows nothing but [`PLAINTEXT`].
#[derive(Debug, Clone, Copy, Default)]
pub struct PlainRegistry;

impl LanguageRegistry for PlainRegistry {
    fn supports(&self, language: &str) -> bool {
        language == PLAINTEXT
    }

    fn highlight(&self, _language: &str, code: &str) -> Option<String> {
        Some(escape_html(code))
    }
}

fn syntax_set() -> &'static SyntaxSet {
    static SYNTAXES: OnceLock<SyntaxSet> = OnceLock::new();
    SYNTAXES.get_or_init(SyntaxSet::load_defaults_newlines)
}

/// Registry backed by syntect's bundled syntaxes, emitting class-based spans.
#[derive(Debug, Clone, Copy, Default)]
pub struct SyntectRegistry;

impl SyntectRegistry {
    pub fn new() -> Self {
        Self
    }
}

impl LanguageRegistry for SyntectRegistry {
    fn supports(&self, language: &str) -> bool {
        language == PLAINTEXT || syntax_set().find_syntax_by_token(language).is_some()
    }

    fn highlight(&self, language: &str, code: &str) -> Option<String> {
        if language == PLAINTEXT {
            return Some(escape_html(code));
        }
        let syntaxes = syntax_set();
        let syntax = syntaxes.find_syntax_by_token(language)?;
        let mut generator =
            ClassedHTMLGenerator::new_with_class_style(syntax, syntaxes, ClassStyle::Spaced);
        for line in LinesWithEndings::from(code) {
            generator
                .parse_html_for_line_which_includes_newline(line)
                .ok()?;
        }
        Some(generator.finalize())
    }
}

/// First word of a fence info string, lowercased; empty means none given.
pub fn normalize_language(info: &str) -> String {
    info.split(|c: char| c.is_whitespace() || c == ',' || c == '{')
        .next()
        .unwrap_or_default()
        .to_ascii_lowercase()
}

/// The language actually used for a block: the requested one if supported,
/// otherwise [`PLAINTEXT`].
pub fn resolve_language(registry: &dyn LanguageRegistry, info: &str) -> String {
    let language = normalize_language(info);
    if !language.is_empty() && registry.supports(&language) {
        language
    } else {
        PLAINTEXT.to_string()
    }
}
