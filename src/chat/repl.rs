//! The read-eval-print loop that drives a chat session.
//!
//! The loop is a small state machine: read a line (or a multiline block),
//! send it, let the session render the reply, and go back to reading.  Every
//! way out of the loop saves the conversation first.

use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};

use rustyline::DefaultEditor;
use rustyline::error::ReadlineError;

use crate::chat::commands::{
    ChatInput, MULTILINE_TOKEN, compose_file_message, help_text, parse_input,
};
use crate::chat::session::ChatSession;
use crate::client::GenerateContent;
use crate::error::Error;
use crate::render::Renderer;

/// Prompt shown when waiting for a message.
pub const USER_PROMPT: &str = "User >>>: ";
/// Prompt shown for each line of a multiline block.
pub const CONTINUATION_PROMPT: &str = "... ";

/// Result of asking for one line of input.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ReadOutcome {
    /// A line, without its terminator.
    Line(String),
    /// The user pressed Ctrl+C.
    Interrupted,
    /// Input is exhausted (Ctrl+D or closed stdin).
    Eof,
    /// The terminal could not be read.
    Failed(String),
}

/// Source of user input.
pub trait LineReader {
    /// Reads one line, showing `prompt`.
    fn read_line(&mut self, prompt: &str) -> ReadOutcome;

    /// Records a line for recall.  The default does nothing.
    fn add_history(&mut self, _line: &str) {}
}

impl LineReader for DefaultEditor {
    fn read_line(&mut self, prompt: &str) -> ReadOutcome {
        match self.readline(prompt) {
            Ok(line) => ReadOutcome::Line(line),
            Err(ReadlineError::Interrupted) => ReadOutcome::Interrupted,
            Err(ReadlineError::Eof) => ReadOutcome::Eof,
            Err(err) => ReadOutcome::Failed(err.to_string()),
        }
    }

    fn add_history(&mut self, line: &str) {
        let _ = self.add_history_entry(line);
    }
}

/// Why the loop ended.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ExitReason {
    /// A quit token was entered.
    Quit,
    /// Input ran out.
    EndOfInput,
    /// Ctrl+C at the prompt, or during a request.
    Interrupted,
    /// Reading input failed.
    ReadFailed,
}

#[derive(Debug)]
enum State {
    AwaitingInput,
    AwaitingMultiline(Vec<String>),
    Sending(String),
    Exiting(ExitReason),
}

/// Interactive loop over a [`LineReader`] and a [`ChatSession`].
pub struct Repl<R: LineReader, B: GenerateContent> {
    reader: R,
    session: ChatSession<B>,
    interrupted: Arc<AtomicBool>,
}

impl<R: LineReader, B: GenerateContent> Repl<R, B> {
    /// Creates a loop reading from `reader`.
    pub fn new(reader: R, session: ChatSession<B>) -> Self {
        Self {
            reader,
            session,
            interrupted: Arc::new(AtomicBool::new(false)),
        }
    }

    /// Uses `flag` to learn about Ctrl+C while a request is outstanding.
    ///
    /// The request is allowed to finish; the loop then saves and exits.
    pub fn with_interrupt_flag(mut self, flag: Arc<AtomicBool>) -> Self {
        self.interrupted = flag;
        self
    }

    /// Returns the session.
    pub fn session(&self) -> &ChatSession<B> {
        &self.session
    }

    /// Consumes the loop, returning the session.
    pub fn into_session(self) -> ChatSession<B> {
        self.session
    }

    /// Runs until the user quits or input ends.
    pub async fn run(&mut self, renderer: &mut dyn Renderer) -> ExitReason {
        renderer.print_info(&format!("=== Gemini chat ({}) ===", self.session.model()));
        renderer.print_info(
            "Type q/exit/Ctrl+C/Ctrl+D to quit, :: for multiline input, .help for help.",
        );

        let mut state = State::AwaitingInput;
        loop {
            state = match state {
                State::AwaitingInput => {
                    self.interrupted.store(false, Ordering::Relaxed);
                    match self.reader.read_line(USER_PROMPT) {
                        ReadOutcome::Line(line) => {
                            if !line.trim().is_empty() {
                                self.reader.add_history(line.trim());
                            }
                            self.dispatch(&line, renderer)
                        }
                        other => Self::end_of_input(other, renderer),
                    }
                }
                State::AwaitingMultiline(mut lines) => {
                    match self.reader.read_line(CONTINUATION_PROMPT) {
                        ReadOutcome::Line(line) if line.trim() == MULTILINE_TOKEN => {
                            let text = lines.join("\n");
                            if text.trim().is_empty() {
                                State::AwaitingInput
                            } else {
                                State::Sending(text)
                            }
                        }
                        ReadOutcome::Line(line) => {
                            lines.push(line);
                            State::AwaitingMultiline(lines)
                        }
                        other => Self::end_of_input(other, renderer),
                    }
                }
                State::Sending(text) => {
                    if let Err(err) = self.session.send(&text, renderer).await {
                        let message = format!("API request failed: {err}");
                        match failure_detail(&err) {
                            Some(detail) => renderer.print_error_detail(&message, &detail),
                            None => renderer.print_error(&message),
                        }
                    }
                    if self.interrupted.swap(false, Ordering::Relaxed) {
                        State::Exiting(ExitReason::Interrupted)
                    } else {
                        State::AwaitingInput
                    }
                }
                State::Exiting(reason) => {
                    renderer.print_info("Exiting...");
                    if let Err(err) = self.session.save() {
                        renderer.print_error(&format!("Failed to save history: {err}"));
                    }
                    return reason;
                }
            };
        }
    }

    fn dispatch(&mut self, line: &str, renderer: &mut dyn Renderer) -> State {
        match parse_input(line) {
            ChatInput::Empty => State::AwaitingInput,
            ChatInput::Quit => State::Exiting(ExitReason::Quit),
            ChatInput::Multiline => {
                renderer.print_info("Multiline mode. Enter :: on its own line to send.");
                State::AwaitingMultiline(Vec::new())
            }
            ChatInput::Help => {
                renderer.print_info(help_text());
                State::AwaitingInput
            }
            ChatInput::Stats => {
                renderer.print_info(&self.session.stats().summary());
                State::AwaitingInput
            }
            ChatInput::File { path, description } => {
                match compose_file_message(&path, &description) {
                    Ok(message) => State::Sending(message),
                    Err(err) => {
                        renderer.print_error(&format!("Failed to read file: {err}"));
                        State::AwaitingInput
                    }
                }
            }
            ChatInput::Invalid(message) => {
                renderer.print_warning(&message);
                State::AwaitingInput
            }
            ChatInput::Message(text) => State::Sending(text),
        }
    }

    fn end_of_input(outcome: ReadOutcome, renderer: &mut dyn Renderer) -> State {
        match outcome {
            ReadOutcome::Interrupted => State::Exiting(ExitReason::Interrupted),
            ReadOutcome::Failed(err) => {
                renderer.print_error(&format!("Failed to read input: {err}"));
                State::Exiting(ExitReason::ReadFailed)
            }
            ReadOutcome::Eof | ReadOutcome::Line(_) => State::Exiting(ExitReason::EndOfInput),
        }
    }
}

/// A dimmed second line for a failed request: the HTTP status, or the root
/// cause of a transport failure.
fn failure_detail(err: &Error) -> Option<String> {
    if let Some(code) = err.status_code() {
        let reason = reqwest::StatusCode::from_u16(code)
            .ok()
            .and_then(|status| status.canonical_reason());
        return Some(match reason {
            Some(reason) => format!("HTTP {code} {reason}"),
            None => format!("HTTP {code}"),
        });
    }
    if !err.is_transport() {
        return None;
    }
    let mut cause = std::error::Error::source(err)?;
    while let Some(next) = cause.source() {
        cause = next;
    }
    Some(cause.to_string())
}
