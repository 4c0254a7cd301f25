/// One line of terminal input.
#[derive(Debug, Clone, PartialEq, Eq)]
pub(crate) enum Command {
    Prompt(String),
    Model(String),
    /// Start a fresh local session, optionally with an explicit id.
    New(Option<String>),
    Download { repo_id: String, filename: String },
    Regenerate,
    Cancel,
    Save,
    /// Activate a copy control; `None` lists the available ids.
    Copy(Option<String>),
    Help,
    Quit,
    Invalid(String),
}

pub(crate) const HELP: &str = "\
Commands:
  /model <name>                select the model to chat with
  /new [session-id]            start a new chat session
  /download <repo-id> <file>   download a model file
  /regen                       regenerate the last answer
  /cancel                      stop the current answer
  /save                        export the transcript as HTML
  /copy [control-id]           copy a code block, table or message
  /help                        show this help
  /quit                        exit
Anything else is sent as a prompt.";

pub(crate) fn parse(line: &str) -> Command {
    let line = line.trim_end_matches(['\r', '\n']);
    let Some(rest) = line.strip_prefix('/') else {
        return Command::Prompt(line.to_string());
    };
    let mut words = rest.split_whitespace();
    let name = words.next().unwrap_or_default();
    let args: Vec<&str> = words.collect();

    match (name, args.as_slice()) {
        ("model", [model]) => Command::Model((*model).to_string()),
        ("model", _) => Command::Invalid("usage: /model <name>".to_string()),
        ("new", []) => Command::New(None),
        ("new", [id]) => Command::New(Some((*id).to_string())),
        ("download", [repo_id, filename]) => Command::Download {
            repo_id: (*repo_id).to_string(),
            filename: (*filename).to_string(),
        },
        ("download", _) => Command::Invalid("usage: /download <repo-id> <file>".to_string()),
        ("regen" | "regenerate", []) => Command::Regenerate,
        ("cancel" | "stop", []) => Command::Cancel,
        ("save", []) => Command::Save,
        ("copy", []) => Command::Copy(None),
        ("copy", [id]) => Command::Copy(Some((*id).to_string())),
        ("help", _) => Command::Help,
        ("quit" | "exit", []) => Command::Quit,
        _ => Command::Invalid(format!("unknown command /{rest}; try /help")),
    }
}
