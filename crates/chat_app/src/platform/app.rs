use std::io::{self, BufRead, Stdout};
use std::sync::mpsc::{self, RecvTimeoutError};
use std::thread;
use std::time::Instant;

use anyhow::Context;
use chat_core::{update, AppState, Msg, Severity};
use chat_engine::{
    copy_control_ids, export_transcript, transcript_html, ClipboardDispatcher, CopyOutcome,
    MarkdownRenderer,
};
use chat_logging::{chat_debug, chat_info};
use chrono::Local;

use super::clipboard::AppClipboard;
use super::commands::{self, Command, HELP};
use super::config::{self, AppConfig};
use super::effects::EffectRunner;
use super::logging;
use super::view::TerminalView;

pub fn run_app() -> anyhow::Result<()> {
    let cwd = std::env::current_dir().context("resolving working directory")?;
    let (config, warning) = config::load_config(&cwd);
    logging::initialize(&config);
    config::report_config(&config, warning.as_deref());

    let runner = EffectRunner::new(&config.client_settings())
        .with_context(|| format!("connecting to {}", config.base_url))?;
    let mut app = App::new(config, runner);
    app.view.line(HELP)?;

    let (line_tx, line_rx) = mpsc::channel::<String>();
    thread::spawn(move || {
        for line in io::stdin().lock().lines() {
            let Ok(line) = line else { break };
            if line_tx.send(line).is_err() {
                break;
            }
        }
    });

    let tick = app.config.tick();
    loop {
        match line_rx.recv_timeout(tick) {
            Ok(line) => {
                if !app.handle_command(commands::parse(&line))? {
                    break;
                }
            }
            Err(RecvTimeoutError::Timeout) => {}
            Err(RecvTimeoutError::Disconnected) => {
                chat_info!("Input closed; exiting");
                break;
            }
        }
        for msg in app.runner.drain() {
            app.dispatch_msg(msg)?;
        }
        app.dispatch_msg(Msg::Tick)?;
        for control_id in app.clipboard.expire(Instant::now()) {
            chat_debug!("Copy control {} reverted", control_id);
        }
    }
    Ok(())
}

struct App {
    config: AppConfig,
    state: AppState,
    runner: EffectRunner,
    view: TerminalView<Stdout>,
    renderer: MarkdownRenderer,
    clipboard: ClipboardDispatcher<AppClipboard>,
}

impl App {
    fn new(config: AppConfig, runner: EffectRunner) -> Self {
        Self {
            config,
            state: AppState::new(),
            runner,
            view: TerminalView::new(io::stdout()),
            renderer: MarkdownRenderer::default(),
            clipboard: ClipboardDispatcher::new(AppClipboard::detect()),
        }
    }

    fn dispatch_msg(&mut self, msg: Msg) -> io::Result<()> {
        let state = std::mem::take(&mut self.state);
        let (state, effects) = update(state, msg);
        self.state = state;

        let notices = self.runner.run(effects);
        if self.state.consume_dirty() {
            self.view.render(&self.state.view())?;
        }
        for (severity, text) in notices {
            self.view.notify(severity, &text)?;
        }
        Ok(())
    }

    /// Returns `false` once the user asked to quit.
    fn handle_command(&mut self, command: Command) -> io::Result<bool> {
        match command {
            Command::Prompt(prompt) if prompt.trim().is_empty() => {}
            Command::Prompt(prompt) => self.dispatch_msg(Msg::PromptSubmitted(prompt))?,
            Command::Model(model) => {
                self.dispatch_msg(Msg::ModelSelected(model.clone()))?;
                self.view.notify(Severity::Info, &format!("Using model {model}"))?;
            }
            Command::New(id) => {
                let session_id = id.unwrap_or_else(|| {
                    Local::now().format("session-%Y%m%d-%H%M%S").to_string()
                });
                self.dispatch_msg(Msg::SessionOpened {
                    session_id,
                    messages: Vec::new(),
                })?;
            }
            Command::Download { repo_id, filename } => {
                self.dispatch_msg(Msg::DownloadRequested { repo_id, filename })?;
            }
            Command::Regenerate => self.dispatch_msg(Msg::RegenerateClicked)?,
            Command::Cancel => self.dispatch_msg(Msg::CancelClicked)?,
            Command::Save => self.save_transcript()?,
            Command::Copy(control_id) => self.copy(control_id)?,
            Command::Help => self.view.line(HELP)?,
            Command::Quit => return Ok(false),
            Command::Invalid(reason) => self.view.notify(Severity::Error, &reason)?,
        }
        Ok(true)
    }

    /// Rendered page of the active conversation, the document copy controls live in.
    fn active_markup(&self) -> Option<String> {
        let model = self.state.view();
        let session_id = model.session_id.as_deref()?;
        let title = model.title.as_deref().unwrap_or(session_id);
        Some(transcript_html(&self.renderer, title, &model.messages, &|id| {
            self.clipboard.state(id)
        }))
    }

    fn save_transcript(&mut self) -> io::Result<()> {
        let model = self.state.view();
        let Some(session_id) = model.session_id.as_deref() else {
            return self.view.notify(Severity::Error, "Please start a new chat first.");
        };
        let title = model.title.as_deref().unwrap_or(session_id);
        let filename = format!("{session_id}-{}.html", Local::now().format("%Y%m%d-%H%M%S"));

        match export_transcript(
            &self.renderer,
            &self.config.export_dir,
            &filename,
            title,
            &model.messages,
        ) {
            Ok(path) => {
                chat_info!("Transcript of {} saved to {:?}", session_id, path);
                self.view
                    .notify(Severity::Success, &format!("Saved {}", path.display()))
            }
            Err(err) => self.view.notify(Severity::Error, &format!("Save failed: {err}")),
        }
    }

    fn copy(&mut self, control_id: Option<String>) -> io::Result<()> {
        let Some(markup) = self.active_markup() else {
            return self.view.notify(Severity::Error, "Please start a new chat first.");
        };
        let Some(control_id) = control_id else {
            let ids = copy_control_ids(&markup);
            if ids.is_empty() {
                return self.view.notify(Severity::Info, "Nothing to copy yet.");
            }
            let listed: Vec<String> = ids
                .iter()
                .map(|id| format!("{id} [{}]", self.clipboard.state(id).label()))
                .collect();
            return self.view.line(&format!("Copy controls: {}", listed.join(" ")));
        };

        match self
            .clipboard
            .activate_in_markup(&markup, &control_id, Instant::now())
        {
            Ok(CopyOutcome::Copied { kind, text }) => {
                self.view
                    .notify(Severity::Success, &format!("Copied {kind:?} {control_id}"))?;
                if self.clipboard.clipboard().is_system() {
                    Ok(())
                } else {
                    // Nowhere else to paste it from.
                    self.view.line(&text)
                }
            }
            Ok(CopyOutcome::AlreadyCopied) => self.view.notify(Severity::Info, "Copied"),
            Ok(CopyOutcome::NotAControl) => self
                .view
                .notify(Severity::Error, &format!("{control_id} is not a copy control")),
            Err(err) => self.view.notify(Severity::Error, &err.to_string()),
        }
    }
}
