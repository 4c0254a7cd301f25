use std::time::{Duration, Instant};

use chat_core::{Message, MessageView, Role};
use chat_engine::{
    transcript_html, Clipboard, ClipboardDispatcher, ClipboardError, CopyKind, CopyOutcome,
    CopyState, MarkdownRenderer, MemoryClipboard, COPY_FEEDBACK_DURATION,
};
use pretty_assertions::assert_eq;
use scraper::{Html, Selector};

const ANSWER: &str = "Intro text.\n\n```rust\nlet a = 1 & 2;\n```\n\n| k | v |\n|---|---|\n| x | **y** |\n";

fn rendered_document() -> Html {
    let renderer = MarkdownRenderer::default();
    let html = renderer.render_message(0, &Message::assistant(ANSWER), true);
    Html::parse_fragment(&html)
}

fn dispatcher() -> ClipboardDispatcher<MemoryClipboard> {
    ClipboardDispatcher::new(MemoryClipboard::default())
}

#[test]
fn code_control_copies_original_source() {
    let document = rendered_document();
    let mut dispatcher = dispatcher();
    let now = Instant::now();

    let outcome = dispatcher.activate_id(&document, "m0-code-1", now).unwrap();
    assert_eq!(
        outcome,
        CopyOutcome::Copied {
            kind: CopyKind::Code,
            text: "let a = 1 & 2;".to_string(),
        }
    );
    assert_eq!(dispatcher.clipboard().contents(), Some("let a = 1 & 2;"));
    assert_eq!(dispatcher.state("m0-code-1"), CopyState::Copied);
}

#[test]
fn table_control_copies_table_markup() {
    let document = rendered_document();
    let mut dispatcher = dispatcher();

    let outcome = dispatcher
        .activate_id(&document, "m0-table-1", Instant::now())
        .unwrap();
    let CopyOutcome::Copied { kind, text } = outcome else {
        panic!("expected copy, got {outcome:?}");
    };
    assert_eq!(kind, CopyKind::Table);
    assert!(text.starts_with("<table class=\"bordered\">"), "{text}");
    assert!(text.contains("<strong>y</strong>"), "{text}");
    assert!(!text.contains("Copy"), "{text}");
}

#[test]
fn message_control_copies_prose_text_without_control_labels() {
    let document = rendered_document();
    let mut dispatcher = dispatcher();

    let outcome = dispatcher
        .activate_id(&document, "m0-message", Instant::now())
        .unwrap();
    let CopyOutcome::Copied { kind, text } = outcome else {
        panic!("expected copy, got {outcome:?}");
    };
    assert_eq!(kind, CopyKind::Message);
    assert!(text.starts_with("Intro text."), "{text}");
    assert!(text.contains("let a = 1 & 2;"), "{text}");
    assert!(!text.contains("Copy"), "{text}");
    assert!(!text.contains("rust"), "{text}");
}

#[test]
fn activation_inside_a_control_finds_the_control() {
    let document = Html::parse_fragment(
        "<button class=\"copy-control\" data-copy-kind=\"code\" data-control-id=\"c1\" \
         data-code=\"x\"><span class=\"icon\">i</span></button><p>elsewhere</p>",
    );
    let icon = document
        .select(&Selector::parse("span.icon").unwrap())
        .next()
        .unwrap();
    let paragraph = document
        .select(&Selector::parse("p").unwrap())
        .next()
        .unwrap();
    let mut dispatcher = dispatcher();
    let now = Instant::now();

    assert_eq!(
        dispatcher.activate(paragraph, now).unwrap(),
        CopyOutcome::NotAControl
    );
    assert_eq!(
        dispatcher.activate(icon, now).unwrap(),
        CopyOutcome::Copied {
            kind: CopyKind::Code,
            text: "x".to_string(),
        }
    );
}

#[test]
fn repeated_activation_is_ignored_until_feedback_expires() {
    let document = rendered_document();
    let mut dispatcher = dispatcher();
    let start = Instant::now();

    dispatcher.activate_id(&document, "m0-code-1", start).unwrap();
    let again = dispatcher
        .activate_id(&document, "m0-code-1", start + Duration::from_millis(500))
        .unwrap();
    assert_eq!(again, CopyOutcome::AlreadyCopied);

    assert!(dispatcher
        .expire(start + COPY_FEEDBACK_DURATION - Duration::from_millis(1))
        .is_empty());
    assert_eq!(dispatcher.state("m0-code-1"), CopyState::Copied);

    assert_eq!(
        dispatcher.expire(start + COPY_FEEDBACK_DURATION),
        vec!["m0-code-1".to_string()]
    );
    assert_eq!(dispatcher.state("m0-code-1"), CopyState::Idle);

    let after = dispatcher
        .activate_id(&document, "m0-code-1", start + COPY_FEEDBACK_DURATION)
        .unwrap();
    assert!(matches!(after, CopyOutcome::Copied { .. }));
}

#[test]
fn controls_have_independent_feedback() {
    let document = rendered_document();
    let mut dispatcher = dispatcher();
    let start = Instant::now();

    dispatcher.activate_id(&document, "m0-code-1", start).unwrap();
    let table = dispatcher
        .activate_id(&document, "m0-table-1", start + Duration::from_millis(1500))
        .unwrap();
    assert!(matches!(table, CopyOutcome::Copied { kind: CopyKind::Table, .. }));

    assert_eq!(
        dispatcher.expire(start + Duration::from_millis(2000)),
        vec!["m0-code-1".to_string()]
    );
    assert_eq!(dispatcher.state("m0-table-1"), CopyState::Copied);
    assert_eq!(
        dispatcher.expire(start + Duration::from_millis(3500)),
        vec!["m0-table-1".to_string()]
    );
}

#[test]
fn unknown_control_id_is_an_error() {
    let document = rendered_document();
    let mut dispatcher = dispatcher();

    assert_eq!(
        dispatcher.activate_id(&document, "m9-code-1", Instant::now()),
        Err(ClipboardError::UnknownControl("m9-code-1".to_string()))
    );
}

#[test]
fn failed_clipboard_write_leaves_control_idle() {
    struct Broken;
    impl Clipboard for Broken {
        fn write_text(&mut self, _text: &str) -> Result<(), ClipboardError> {
            Err(ClipboardError::Write("denied".to_string()))
        }
    }

    let document = rendered_document();
    let mut dispatcher = ClipboardDispatcher::new(Broken);
    let result = dispatcher.activate_id(&document, "m0-code-1", Instant::now());

    assert_eq!(result, Err(ClipboardError::Write("denied".to_string())));
    assert_eq!(dispatcher.state("m0-code-1"), CopyState::Idle);
}

fn answer_view(index: usize, content: &str, finalized: bool) -> MessageView {
    MessageView {
        index,
        role: Role::Assistant,
        content: content.to_string(),
        thought: None,
        finalized,
    }
}

fn button_label(markup: &str, control_id: &str) -> Option<String> {
    let document = Html::parse_document(markup);
    let selector = Selector::parse("[data-control-id]").unwrap();
    let label = document
        .select(&selector)
        .find(|element| element.value().attr("data-control-id") == Some(control_id))
        .map(|element| element.text().collect());
    label
}

#[test]
fn message_copy_keeps_single_line_breaks() {
    let renderer = MarkdownRenderer::default();
    let html = renderer.render_message(0, &Message::assistant("one\ntwo"), true);
    let mut dispatcher = dispatcher();

    let outcome = dispatcher
        .activate_in_markup(&html, "m0-message", Instant::now())
        .unwrap();
    assert_eq!(
        outcome,
        CopyOutcome::Copied {
            kind: CopyKind::Message,
            text: "one\ntwo".to_string(),
        }
    );
}

#[test]
fn byte_exact_code_copy_through_rendered_message() {
    let renderer = MarkdownRenderer::default();
    let html = renderer.render_message(0, &Message::assistant("```\na&b<c>\n```"), true);
    let mut dispatcher = dispatcher();

    dispatcher
        .activate_in_markup(&html, "m0-code-1", Instant::now())
        .unwrap();
    assert_eq!(dispatcher.clipboard().contents(), Some("a&b<c>"));
}

#[test]
fn rendered_label_follows_copy_feedback() {
    let renderer = MarkdownRenderer::default();
    let messages = vec![answer_view(0, ANSWER, true)];
    let mut dispatcher = dispatcher();
    let start = Instant::now();
    let page = |dispatcher: &ClipboardDispatcher<MemoryClipboard>| {
        transcript_html(&renderer, "t", &messages, &|id| dispatcher.state(id))
    };

    let before = page(&dispatcher);
    assert_eq!(button_label(&before, "m0-code-1").as_deref(), Some("Copy"));

    dispatcher.activate_in_markup(&before, "m0-code-1", start).unwrap();
    let copied = page(&dispatcher);
    assert_eq!(button_label(&copied, "m0-code-1").as_deref(), Some("Copied"));
    assert_eq!(button_label(&copied, "m0-table-1").as_deref(), Some("Copy"));

    dispatcher.expire(start + COPY_FEEDBACK_DURATION);
    let reverted = page(&dispatcher);
    assert_eq!(button_label(&reverted, "m0-code-1").as_deref(), Some("Copy"));
}

#[test]
fn streaming_message_has_no_message_control() {
    let renderer = MarkdownRenderer::default();
    let messages = vec![
        answer_view(0, "done", true),
        answer_view(1, "still writing", false),
    ];
    let page = transcript_html(&renderer, "t", &messages, &|_| CopyState::Idle);

    assert_eq!(button_label(&page, "m0-message").as_deref(), Some("Copy"));
    assert_eq!(button_label(&page, "m1-message"), None);
    assert_eq!(
        dispatcher().activate_in_markup(&page, "m1-message", Instant::now()),
        Err(ClipboardError::UnknownControl("m1-message".to_string()))
    );
}
