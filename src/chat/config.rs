//! Configuration types for the chat application.
//!
//! This module provides CLI argument parsing via `arrrg` and configuration
//! structures for controlling chat behavior, plus the startup files the chat
//! depends on (the credential file and the role marker).

use std::fs::{self, OpenOptions};
use std::io::ErrorKind;
use std::path::{Path, PathBuf};
use std::time::Duration;

use arrrg_derive::CommandLine;

use crate::chat::commands::expand_path;
use crate::client::{DEFAULT_MODEL, DEFAULT_TIMEOUT};
use crate::error::{Error, Result};
use crate::history::MAX_HISTORY_CHARS;
use crate::render::DEFAULT_WIDTH;

/// Credential file used when `--key-file` is not given.
pub const DEFAULT_KEY_FILE: &str = "~/.gemchat/key";
/// History file used when `--history-file` is not given.
pub const DEFAULT_HISTORY_FILE: &str = "~/.gemchat/session.json";
/// Role marker file used when `--role-file` is not given.
pub const DEFAULT_ROLE_FILE: &str = "~/.gemchat/role";

/// Command-line arguments for the gemchat tool.
#[derive(CommandLine, Debug, Default, PartialEq, Eq)]
pub struct ChatArgs {
    /// Model to use for chat.
    #[arrrg(optional, "Model to use (default: gemini-2.5-flash)", "MODEL")]
    pub model: Option<String>,

    /// File holding the API key.
    #[arrrg(optional, "File holding the API key (default: ~/.gemchat/key)", "PATH")]
    pub key_file: Option<String>,

    /// File the conversation is saved to.
    #[arrrg(optional, "Conversation file (default: ~/.gemchat/session.json)", "PATH")]
    pub history_file: Option<String>,

    /// Role marker file created on startup.
    #[arrrg(optional, "Role marker file (default: ~/.gemchat/role)", "PATH")]
    pub role_file: Option<String>,

    /// Character budget for the history sent with each request.
    #[arrrg(optional, "History characters sent per request (default: 25000)", "CHARS")]
    pub max_history_chars: Option<usize>,

    /// Request deadline in seconds.
    #[arrrg(optional, "Request timeout in seconds (default: 45)", "SECONDS")]
    pub timeout_secs: Option<u64>,

    /// Column width for code blocks.
    #[arrrg(optional, "Render width in columns (default: $COLUMNS or 100)", "COLUMNS")]
    pub width: Option<usize>,

    /// Disable ANSI colors and styles.
    #[arrrg(flag, "Disable ANSI colors/styles")]
    pub no_color: bool,

    /// Disable the progress animation.
    #[arrrg(flag, "Disable the Thinking animation")]
    pub no_progress: bool,

    /// Append request/response records to this file.
    #[arrrg(optional, "Append API exchanges as JSON lines to this file", "PATH")]
    pub log_file: Option<String>,
}

/// Configuration for a chat session.
///
/// This struct holds the resolved configuration values after processing
/// command-line arguments with appropriate defaults.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ChatConfig {
    /// The model to use for generating responses.
    pub model: String,

    /// Where the API key is read from.
    pub key_file: PathBuf,

    /// Where the conversation is persisted.
    pub history_file: PathBuf,

    /// Marker file created on startup and never read.
    pub role_file: PathBuf,

    /// Character budget applied to each request's history.
    pub max_history_chars: usize,

    /// Deadline for a single request.
    pub timeout: Duration,

    /// Column width used for soft-wrapping code.
    pub width: usize,

    /// Whether to use ANSI colors and styles in output.
    pub use_color: bool,

    /// Whether to animate while a request is outstanding.
    pub show_progress: bool,

    /// Optional JSON-lines log of API exchanges.
    pub log_file: Option<PathBuf>,
}

impl ChatConfig {
    /// Creates a new ChatConfig with default values.
    ///
    /// Defaults:
    /// - Model: gemini-2.5-flash
    /// - Files: under ~/.gemchat
    /// - History budget: 25,000 characters
    /// - Timeout: 45 seconds
    /// - Color and progress animation: enabled
    pub fn new() -> Self {
        Self {
            model: DEFAULT_MODEL.to_string(),
            key_file: expand_path(DEFAULT_KEY_FILE),
            history_file: expand_path(DEFAULT_HISTORY_FILE),
            role_file: expand_path(DEFAULT_ROLE_FILE),
            max_history_chars: MAX_HISTORY_CHARS,
            timeout: DEFAULT_TIMEOUT,
            width: terminal_width(),
            use_color: true,
            show_progress: true,
            log_file: None,
        }
    }

    /// Sets the model to use.
    pub fn with_model(mut self, model: impl Into<String>) -> Self {
        self.model = model.into();
        self
    }

    /// Sets the credential file.
    pub fn with_key_file(mut self, path: impl Into<PathBuf>) -> Self {
        self.key_file = path.into();
        self
    }

    /// Sets the history file.
    pub fn with_history_file(mut self, path: impl Into<PathBuf>) -> Self {
        self.history_file = path.into();
        self
    }

    /// Sets the role marker file.
    pub fn with_role_file(mut self, path: impl Into<PathBuf>) -> Self {
        self.role_file = path.into();
        self
    }

    /// Sets the per-request history budget.
    pub fn with_max_history_chars(mut self, max_chars: usize) -> Self {
        self.max_history_chars = max_chars;
        self
    }

    /// Sets the request deadline.
    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    /// Sets the render width.
    pub fn with_width(mut self, width: usize) -> Self {
        self.width = width;
        self
    }

    /// Disables ANSI color output.
    pub fn without_color(mut self) -> Self {
        self.use_color = false;
        self
    }

    /// Disables the progress animation.
    pub fn without_progress(mut self) -> Self {
        self.show_progress = false;
        self
    }

    /// Sets the exchange log file.
    pub fn with_log_file(mut self, path: Option<PathBuf>) -> Self {
        self.log_file = path;
        self
    }
}

impl Default for ChatConfig {
    fn default() -> Self {
        Self::new()
    }
}

impl From<ChatArgs> for ChatConfig {
    fn from(args: ChatArgs) -> Self {
        let defaults = ChatConfig::new();
        ChatConfig {
            model: args.model.unwrap_or(defaults.model),
            key_file: args
                .key_file
                .map(|p| expand_path(&p))
                .unwrap_or(defaults.key_file),
            history_file: args
                .history_file
                .map(|p| expand_path(&p))
                .unwrap_or(defaults.history_file),
            role_file: args
                .role_file
                .map(|p| expand_path(&p))
                .unwrap_or(defaults.role_file),
            max_history_chars: args.max_history_chars.unwrap_or(defaults.max_history_chars),
            timeout: args
                .timeout_secs
                .map(Duration::from_secs)
                .unwrap_or(defaults.timeout),
            width: args.width.unwrap_or(defaults.width),
            use_color: !args.no_color,
            show_progress: !args.no_progress,
            log_file: args.log_file.map(|p| expand_path(&p)),
        }
    }
}

fn terminal_width() -> usize {
    std::env::var("COLUMNS")
        .ok()
        .and_then(|cols| cols.trim().parse::<usize>().ok())
        .filter(|cols| *cols > 0)
        .unwrap_or(DEFAULT_WIDTH)
}

/// Reads the API key from `path`.
///
/// Surrounding whitespace is removed.
///
/// # Errors
///
/// Returns `Error::Config` when the file is missing, unreadable, or empty.
pub fn load_api_key<P: AsRef<Path>>(path: P) -> Result<String> {
    let path = path.as_ref();
    let contents = match fs::read_to_string(path) {
        Ok(contents) => contents,
        Err(err) if err.kind() == ErrorKind::NotFound => {
            return Err(Error::config(format!(
                "API key file {} not found",
                path.display()
            )));
        }
        Err(err) => {
            return Err(Error::config(format!(
                "cannot read API key file {}: {err}",
                path.display()
            )));
        }
    };
    let key = contents.trim();
    if key.is_empty() {
        return Err(Error::config(format!(
            "API key file {} is empty",
            path.display()
        )));
    }
    Ok(key.to_string())
}

/// Creates the role marker file, empty, if it does not exist.
///
/// Returns `true` when the file was created by this call.
///
/// # Errors
///
/// Returns `Error::Io` if the directory or file cannot be created.
pub fn ensure_role_file<P: AsRef<Path>>(path: P) -> Result<bool> {
    let path = path.as_ref();
    if path.exists() {
        return Ok(false);
    }
    if let Some(parent) = path.parent()
        && !parent.as_os_str().is_empty()
    {
        fs::create_dir_all(parent)
            .map_err(|err| Error::io(format!("cannot create {}", parent.display()), err))?;
    }
    match OpenOptions::new().write(true).create_new(true).open(path) {
        Ok(_) => Ok(true),
        Err(err) if err.kind() == ErrorKind::AlreadyExists => Ok(false),
        Err(err) => Err(Error::io(
            format!("cannot create role file {}", path.display()),
            err,
        )),
    }
}
