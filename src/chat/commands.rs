//! Input token parsing for the chat application.
//!
//! A handful of reserved tokens control the session; everything else typed at
//! the prompt is sent to the model as a message.

use std::fs;
use std::path::{Path, PathBuf};

use crate::error::{Error, Result};

/// Token that opens and closes a multiline block.
pub const MULTILINE_TOKEN: &str = "::";

/// A parsed line of user input.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ChatInput {
    /// Blank line; prompt again.
    Empty,

    /// Exit the chat, saving the session.
    Quit,

    /// Begin collecting a multiline message.
    Multiline,

    /// Display help information.
    Help,

    /// Display session statistics.
    Stats,

    /// Send the contents of a file.
    File {
        /// Path as typed; `~` is expanded when the file is read.
        path: String,
        /// Optional text to send ahead of the contents.
        description: String,
    },

    /// Report a usage error back to the user.
    Invalid(String),

    /// A regular message for the model.
    Message(String),
}

/// Parses one line typed at the prompt.
///
/// # Examples
///
/// ```
/// # use gemchat::chat::{ChatInput, parse_input};
/// assert_eq!(parse_input("QUIT"), ChatInput::Quit);
/// assert_eq!(parse_input("::"), ChatInput::Multiline);
/// assert_eq!(parse_input("Hello"), ChatInput::Message("Hello".to_string()));
/// ```
pub fn parse_input(line: &str) -> ChatInput {
    let input = line.trim();
    if input.is_empty() {
        return ChatInput::Empty;
    }
    if matches!(input.to_lowercase().as_str(), "q" | "quit" | "exit") {
        return ChatInput::Quit;
    }
    if input == MULTILINE_TOKEN {
        return ChatInput::Multiline;
    }
    if input == ".help" {
        return ChatInput::Help;
    }
    if input == ".stats" {
        return ChatInput::Stats;
    }
    if input == ".file" || input.starts_with(".file ") {
        return parse_file_command(&input[".file".len()..]);
    }
    ChatInput::Message(input.to_string())
}

fn parse_file_command(rest: &str) -> ChatInput {
    let rest = rest.trim_start();
    let mut parts = rest.splitn(2, char::is_whitespace);
    let Some(path) = parts.next().filter(|p| !p.is_empty()) else {
        return ChatInput::Invalid("Usage: .file <path> [description]".to_string());
    };
    let description = parts.next().map(str::trim).unwrap_or_default();
    ChatInput::File {
        path: path.to_string(),
        description: description.to_string(),
    }
}

/// Expands a leading `~` and environment variables in a user-supplied path.
pub fn expand_path(path: &str) -> PathBuf {
    match shellexpand::full(path) {
        Ok(expanded) => PathBuf::from(expanded.as_ref()),
        Err(_) => PathBuf::from(shellexpand::tilde(path).as_ref()),
    }
}

/// Reads `path` and builds the message that carries its contents.
///
/// # Errors
///
/// Returns `Error::Io` if the file cannot be read; nothing is sent in that
/// case.
pub fn compose_file_message(path: &str, description: &str) -> Result<String> {
    let path = expand_path(path);
    let content = fs::read_to_string(&path)
        .map_err(|err| Error::io(format!("cannot read {}", path.display()), err))?;
    Ok(file_message(&path, description, &content))
}

fn file_message(path: &Path, description: &str, content: &str) -> String {
    let name = path
        .file_name()
        .map(|name| name.to_string_lossy().into_owned())
        .unwrap_or_else(|| path.display().to_string());
    let body = format!("Contents of file {name}:\n```\n{content}\n```");
    let description = description.trim();
    if description.is_empty() {
        body
    } else {
        format!("{description}\n\n{body}")
    }
}

/// Returns help text describing the reserved input tokens.
pub fn help_text() -> &'static str {
    r#"Available commands:
  .help                  Show this help message
  .file <path> [desc]    Send the contents of a file, with an optional description
  .stats                 Show session statistics
  ::                     Start multiline input; a line with :: alone sends it
  q | quit | exit        Save the session and exit (Ctrl+C and Ctrl+D also work)"#
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parse_quit_tokens() {
        assert_eq!(parse_input("q"), ChatInput::Quit);
        assert_eq!(parse_input("quit"), ChatInput::Quit);
        assert_eq!(parse_input("exit"), ChatInput::Quit);
        assert_eq!(parse_input("  EXIT  "), ChatInput::Quit);
        assert_eq!(parse_input("Quit"), ChatInput::Quit);
    }

    #[test]
    fn parse_empty() {
        assert_eq!(parse_input(""), ChatInput::Empty);
        assert_eq!(parse_input("   \t"), ChatInput::Empty);
    }

    #[test]
    fn parse_reserved_tokens() {
        assert_eq!(parse_input("::"), ChatInput::Multiline);
        assert_eq!(parse_input(" :: "), ChatInput::Multiline);
        assert_eq!(parse_input(".help"), ChatInput::Help);
        assert_eq!(parse_input(".stats"), ChatInput::Stats);
    }

    #[test]
    fn parse_file_command_variants() {
        assert_eq!(
            parse_input(".file notes.txt"),
            ChatInput::File {
                path: "notes.txt".to_string(),
                description: String::new(),
            }
        );
        assert_eq!(
            parse_input(".file ~/src/main.rs explain this code"),
            ChatInput::File {
                path: "~/src/main.rs".to_string(),
                description: "explain this code".to_string(),
            }
        );
        assert!(matches!(parse_input(".file"), ChatInput::Invalid(msg) if msg.contains("Usage")));
        assert!(matches!(parse_input(".file   "), ChatInput::Invalid(_)));
    }

    #[test]
    fn near_misses_are_messages() {
        assert_eq!(
            parse_input(".filex foo"),
            ChatInput::Message(".filex foo".to_string())
        );
        assert_eq!(
            parse_input("quit now"),
            ChatInput::Message("quit now".to_string())
        );
        assert_eq!(
            parse_input(":: hi"),
            ChatInput::Message(":: hi".to_string())
        );
        assert_eq!(parse_input("  hello  "), ChatInput::Message("hello".to_string()));
    }

    #[test]
    fn file_message_layout() {
        let message = file_message(Path::new("/tmp/a.py"), "review", "print(1)");
        assert_eq!(
            message,
            "review\n\nContents of file a.py:\n```\nprint(1)\n```"
        );
        let message = file_message(Path::new("a.py"), "  ", "x");
        assert_eq!(message, "Contents of file a.py:\n```\nx\n```");
    }

    #[test]
    fn compose_reads_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("hello.txt");
        fs::write(&path, "hi there").unwrap();
        let message = compose_file_message(path.to_str().unwrap(), "what is this?").unwrap();
        assert_eq!(
            message,
            "what is this?\n\nContents of file hello.txt:\n```\nhi there\n```"
        );
    }

    #[test]
    fn compose_missing_file_is_io_error() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("absent.txt");
        let err = compose_file_message(path.to_str().unwrap(), "").unwrap_err();
        assert!(matches!(err, Error::Io { .. }));
        assert!(err.to_string().contains("absent.txt"));
    }

    #[test]
    fn expand_path_handles_tilde() {
        let expanded = expand_path("~/notes.txt");
        assert!(!expanded.to_string_lossy().starts_with('~'));
        assert!(expanded.ends_with("notes.txt"));
        assert_eq!(expand_path("plain.txt"), PathBuf::from("plain.txt"));
    }

    #[test]
    fn help_text_lists_tokens() {
        let help = help_text();
        assert!(help.contains(".help"));
        assert!(help.contains(".file"));
        assert!(help.contains("::"));
        assert!(help.contains("quit"));
    }
}
