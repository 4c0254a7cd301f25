use std::fs;
use std::path::{Path, PathBuf};
use std::time::Duration;

use chat_engine::ClientSettings;
use chat_logging::{chat_info, chat_warn, LogDestination};
use log::LevelFilter;
use serde::{Deserialize, Serialize};

pub(crate) const CONFIG_FILENAME: &str = "chat_app.ron";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
pub(crate) enum LogTarget {
    #[default]
    File,
    Terminal,
    Both,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub(crate) struct AppConfig {
    pub base_url: String,
    pub connect_timeout_secs: u64,
    pub export_dir: PathBuf,
    pub log_target: LogTarget,
    pub log_file: PathBuf,
    pub log_level: String,
    /// Interval of the render/feedback tick.
    pub tick_ms: u64,
}

impl Default for AppConfig {
    fn default() -> Self {
        let client = ClientSettings::default();
        Self {
            base_url: client.base_url,
            connect_timeout_secs: client.connect_timeout.as_secs(),
            export_dir: PathBuf::from("transcripts"),
            log_target: LogTarget::File,
            log_file: PathBuf::from(chat_logging::DEFAULT_LOG_FILE),
            log_level: "info".to_string(),
            tick_ms: 75,
        }
    }
}

impl AppConfig {
    pub(crate) fn client_settings(&self) -> ClientSettings {
        ClientSettings {
            base_url: self.base_url.clone(),
            connect_timeout: Duration::from_secs(self.connect_timeout_secs),
            ..ClientSettings::default()
        }
    }

    pub(crate) fn log_destination(&self) -> LogDestination {
        match self.log_target {
            LogTarget::File => LogDestination::File(self.log_file.clone()),
            LogTarget::Terminal => LogDestination::Terminal,
            LogTarget::Both => LogDestination::Both(self.log_file.clone()),
        }
    }

    pub(crate) fn log_level(&self) -> LevelFilter {
        self.log_level.parse().unwrap_or(LevelFilter::Info)
    }

    pub(crate) fn tick(&self) -> Duration {
        Duration::from_millis(self.tick_ms.max(10))
    }
}

/// Reads `chat_app.ron` from `dir`; a missing or broken file means defaults.
///
/// Runs before the logger exists, so problems are returned as warnings for
/// the caller to log once logging is up.
pub(crate) fn load_config(dir: &Path) -> (AppConfig, Option<String>) {
    let path = dir.join(CONFIG_FILENAME);
    let content = match fs::read_to_string(&path) {
        Ok(text) => text,
        Err(err) if err.kind() == std::io::ErrorKind::NotFound => {
            return (AppConfig::default(), None);
        }
        Err(err) => {
            let warning = format!("Failed to read config from {path:?}: {err}");
            return (AppConfig::default(), Some(warning));
        }
    };

    match ron::from_str(&content) {
        Ok(config) => (config, None),
        Err(err) => {
            let warning = format!("Failed to parse config from {path:?}: {err}");
            (AppConfig::default(), Some(warning))
        }
    }
}

pub(crate) fn report_config(config: &AppConfig, warning: Option<&str>) {
    if let Some(warning) = warning {
        chat_warn!("{}; using defaults", warning);
    }
    chat_info!(
        "Backend {} (connect timeout {}s), transcripts in {:?}",
        config.base_url,
        config.connect_timeout_secs,
        config.export_dir
    );
}
