//! Slash-command parsing for stdin lines.

#[derive(Debug, Clone, PartialEq, Eq)]
pub(crate) enum Command {
    /// Plain text for the companion.
    Say(String),
    Quit,
    Reload,
    Snapshot,
    Name(String),
    Help,
    Unknown(String),
}

pub(crate) const HELP_TEXT: &str = "commands: /reload  /snapshot  /name <name>  /help  /quit";

/// Classify one input line. Anything not starting with `/` is an utterance.
pub(crate) fn parse_line(line: &str) -> Command {
    let trimmed = line.trim();
    let Some(rest) = trimmed.strip_prefix('/') else {
        return Command::Say(trimmed.to_string());
    };
    let (word, arg) = match rest.split_once(char::is_whitespace) {
        Some((word, arg)) => (word, arg.trim()),
        None => (rest, ""),
    };
    match word.to_ascii_lowercase().as_str() {
        "quit" | "exit" | "q" => Command::Quit,
        "reload" => Command::Reload,
        "snapshot" | "memory" => Command::Snapshot,
        "name" if !arg.is_empty() => Command::Name(arg.to_string()),
        "help" | "?" => Command::Help,
        _ => Command::Unknown(trimmed.to_string()),
    }
}
