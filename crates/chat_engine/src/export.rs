use std::fs;
use std::io::{self, Write};
use std::path::{Path, PathBuf};

use chat_core::MessageView;
use chat_logging::chat_debug;
use tempfile::NamedTempFile;

use crate::clipboard::CopyState;
use crate::render::{escape_html, CopyStates, MarkdownRenderer};

#[derive(Debug, thiserror::Error)]
pub enum ExportError {
    #[error("{0:?} exists and is not a directory")]
    NotADirectory(PathBuf),
    #[error("cannot create transcript directory {dir:?}: {source}")]
    CreateDir { dir: PathBuf, source: io::Error },
    #[error("io error: {0}")]
    Io(#[from] io::Error),
}

/// Standalone HTML page of a transcript, rendered exactly as in the view.
pub fn transcript_html(
    renderer: &MarkdownRenderer,
    title: &str,
    messages: &[MessageView],
    states: CopyStates<'_>,
) -> String {
    let title = escape_html(title);
    let mut page = format!(
        "<!DOCTYPE html>\n<html>\n<head>\n<meta charset=\"utf-8\">\n<title>{title}</title>\n</head>\n<body>\n<h1>{title}</h1>\n"
    );
    for message in messages {
        page.push_str(&renderer.render_view(message, states));
    }
    page.push_str("</body>\n</html>\n");
    page
}

/// Saves the transcript page as `{dir}/{filename}`, creating `dir` as needed.
///
/// The page is staged in a temp file beside the target and renamed over it,
/// so an existing snapshot is replaced whole or not at all.
pub fn export_transcript(
    renderer: &MarkdownRenderer,
    dir: &Path,
    filename: &str,
    title: &str,
    messages: &[MessageView],
) -> Result<PathBuf, ExportError> {
    if dir.exists() && !dir.is_dir() {
        return Err(ExportError::NotADirectory(dir.to_path_buf()));
    }
    fs::create_dir_all(dir).map_err(|source| ExportError::CreateDir {
        dir: dir.to_path_buf(),
        source,
    })?;

    let page = transcript_html(renderer, title, messages, &|_| CopyState::Idle);
    let target = dir.join(filename);
    let mut staged = NamedTempFile::new_in(dir)?;
    staged.write_all(page.as_bytes())?;
    staged.as_file().sync_all()?;
    staged.persist(&target).map_err(|err| ExportError::Io(err.error))?;
    chat_debug!("Wrote {} bytes of transcript to {:?}", page.len(), target);
    Ok(target)
}
