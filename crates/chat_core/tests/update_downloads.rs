use chat_core::{update, AppState, Effect, Msg, Severity, StreamEvent};
use pretty_assertions::assert_eq;

fn request(state: AppState, filename: &str) -> (AppState, Vec<Effect>) {
    update(
        state,
        Msg::DownloadRequested {
            repo_id: "org/repo".to_string(),
            filename: filename.to_string(),
        },
    )
}

fn progress(state: AppState, filename: &str, event: StreamEvent) -> (AppState, Vec<Effect>) {
    update(
        state,
        Msg::DownloadEvent {
            filename: filename.to_string(),
            event,
        },
    )
}

#[test]
fn request_notifies_and_starts_download() {
    let (state, effects) = request(AppState::new(), "m.gguf");

    assert_eq!(
        effects,
        vec![
            Effect::Notify {
                severity: Severity::Info,
                text: "Downloading m.gguf...".to_string(),
            },
            Effect::StartDownload {
                repo_id: "org/repo".to_string(),
                filename: "m.gguf".to_string(),
            },
        ]
    );
    assert_eq!(state.view().pending_downloads, vec!["m.gguf".to_string()]);
    assert!(state.view().downloads.is_empty());
}

#[test]
fn duplicate_request_is_ignored() {
    let (state, _) = request(AppState::new(), "m.gguf");
    let (state, effects) = request(state, "m.gguf");
    assert!(effects.is_empty());

    let (state, _) = progress(state, "m.gguf", StreamEvent::Progress(10.0));
    let (_, effects) = request(state, "m.gguf");
    assert!(effects.is_empty());
}

#[test]
fn progress_entries_are_independent_per_file() {
    let (state, _) = request(AppState::new(), "a.gguf");
    let (state, _) = request(state, "b.gguf");
    let (state, _) = progress(state, "a.gguf", StreamEvent::Progress(25.0));
    let (state, _) = progress(state, "b.gguf", StreamEvent::Progress(70.0));
    let (state, _) = progress(state, "a.gguf", StreamEvent::Progress(50.0));

    assert_eq!(state.download_progress("a.gguf"), Some(50.0));
    assert_eq!(state.download_progress("b.gguf"), Some(70.0));
    assert!(state.view().pending_downloads.is_empty());
}

#[test]
fn completion_removes_entry_and_reports_success() {
    let (state, _) = request(AppState::new(), "m.gguf");
    let (state, _) = progress(state, "m.gguf", StreamEvent::Progress(99.0));
    let (state, effects) = progress(state, "m.gguf", StreamEvent::Complete);

    assert_eq!(state.download_progress("m.gguf"), None);
    assert_eq!(
        effects,
        vec![
            Effect::Notify {
                severity: Severity::Success,
                text: "m.gguf downloaded successfully!".to_string(),
            },
            Effect::DownloadFinished {
                filename: "m.gguf".to_string(),
            },
        ]
    );
}

#[test]
fn error_removes_entry_and_surfaces_message() {
    let (state, _) = request(AppState::new(), "m.gguf");
    let (state, _) = progress(state, "m.gguf", StreamEvent::Progress(40.0));
    let (state, effects) = progress(state, "m.gguf", StreamEvent::Error("disk full".to_string()));

    assert_eq!(state.download_progress("m.gguf"), None);
    assert_eq!(
        effects,
        vec![Effect::Notify {
            severity: Severity::Error,
            text: "disk full".to_string(),
        }]
    );

    // A failed download can be retried.
    let (_, effects) = request(state, "m.gguf");
    assert_eq!(effects.len(), 2);
}

#[test]
fn events_for_unknown_download_are_dropped() {
    let (state, effects) = progress(AppState::new(), "ghost.gguf", StreamEvent::Progress(5.0));

    assert!(effects.is_empty());
    assert_eq!(state.download_progress("ghost.gguf"), None);
    assert_eq!(state.diagnostics().dropped_events, 1);
}

#[test]
fn out_of_range_progress_is_clamped() {
    let (state, _) = request(AppState::new(), "m.gguf");
    let (state, _) = progress(state, "m.gguf", StreamEvent::Progress(140.0));

    assert_eq!(state.download_progress("m.gguf"), Some(100.0));
}
