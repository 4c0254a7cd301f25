use std::fs;

use chat_core::{MessageView, Role};
use chat_engine::{export_transcript, ExportError, MarkdownRenderer};
use tempfile::tempdir;

fn entry(index: usize, role: Role, content: &str, thought: Option<&str>) -> MessageView {
    MessageView {
        index,
        role,
        content: content.to_string(),
        thought: thought.map(str::to_string),
        finalized: true,
    }
}

#[test]
fn transcript_is_written_as_html_page() {
    let dir = tempdir().unwrap();
    let renderer = MarkdownRenderer::default();
    let messages = vec![
        entry(0, Role::User, "how do I <run> it?", None),
        entry(
            1,
            Role::Assistant,
            "Use `cargo`:\n\n```sh\ncargo run\n```",
            Some("user wants a command"),
        ),
    ];

    let path = export_transcript(&renderer, dir.path(), "chat.html", "Run & build", &messages)
        .expect("export");

    assert_eq!(path, dir.path().join("chat.html"));
    let page = fs::read_to_string(&path).unwrap();
    assert!(page.starts_with("<!DOCTYPE html>"));
    assert!(page.contains("<title>Run &amp; build</title>"));
    assert!(page.contains("how do I &lt;run&gt; it?"));
    assert!(page.contains("data-control-id=\"m1-code-1\""));
    assert!(page.contains("data-code=\"cargo run\""));
    assert!(page.contains("<summary>Thinking</summary>"));
}

#[test]
fn export_replaces_previous_snapshot_and_creates_directory() {
    let dir = tempdir().unwrap();
    let nested = dir.path().join("exports").join("today");
    let renderer = MarkdownRenderer::default();

    export_transcript(&renderer, &nested, "t.html", "t", &[entry(0, Role::User, "first", None)])
        .unwrap();
    let path = export_transcript(
        &renderer,
        &nested,
        "t.html",
        "t",
        &[entry(0, Role::User, "second", None)],
    )
    .unwrap();

    let page = fs::read_to_string(path).unwrap();
    assert!(page.contains("second") && !page.contains("first"));
    let leftovers: Vec<_> = fs::read_dir(&nested).unwrap().collect();
    assert_eq!(leftovers.len(), 1);
}

#[test]
fn export_into_a_file_path_fails() {
    let dir = tempdir().unwrap();
    let file = dir.path().join("not-a-dir");
    fs::write(&file, "x").unwrap();

    let err = export_transcript(&MarkdownRenderer::default(), &file, "t.html", "t", &[])
        .unwrap_err();
    assert!(matches!(err, ExportError::NotADirectory(path) if path == file));
}
