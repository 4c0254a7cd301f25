//! Logger setup for chat_app, driven by `chat_app.ron`.
//!
//! Logs go to `chat.log` in the working directory unless configured otherwise;
//! the terminal targets share stdout with the transcript.

use super::config::AppConfig;

pub(crate) fn initialize(config: &AppConfig) {
    chat_logging::initialize(&config.log_destination(), config.log_level());
}
