//! Core chat session management.
//!
//! This module provides the `ChatSession` struct which owns the conversation
//! and sequences one turn: append, prune, send, render, persist.

use std::io::{self, Write};
use std::path::Path;

use crate::chat::config::ChatConfig;
use crate::client::GenerateContent;
use crate::error::Result;
use crate::history::History;
use crate::indicator::ProgressIndicator;
use crate::observability::{
    CLIENT_EMPTY_REPLIES, HISTORY_PRUNED_MESSAGES, HISTORY_SAVE_ERRORS, HISTORY_SAVES,
    SESSION_FAILED_TURNS, SESSION_TURNS,
};
use crate::render::Renderer;
use crate::types::{GenerateContentRequest, Message, UsageMetadata};

/// Opens the stream the progress indicator draws on, once per request.
pub type IndicatorOutput = Box<dyn Fn() -> Box<dyn Write + Send> + Send + Sync>;

/// A chat session that manages conversation state and API interactions.
///
/// The session keeps the full history; only the request is pruned to the
/// configured character budget.
pub struct ChatSession<B: GenerateContent> {
    backend: B,
    history: History,
    config: ChatConfig,
    indicator_output: IndicatorOutput,
    usage_totals: UsageMetadata,
    last_turn_usage: Option<UsageMetadata>,
    request_count: u64,
    failed_request_count: u64,
}

/// What a successful turn did.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TurnOutcome {
    /// The reply text; empty when the response had no usable text.
    pub reply: String,
    /// Messages included in the request.
    pub sent_messages: usize,
    /// Older messages left out of the request by pruning.
    pub pruned_messages: usize,
    /// Token accounting, when the response reported it.
    pub usage: Option<UsageMetadata>,
    /// Whether the history was written to disk after the turn.
    pub saved: bool,
}

/// Aggregated stats for a chat session.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SessionStats {
    /// The model used for the session.
    pub model: String,
    /// The number of messages in the conversation.
    pub message_count: usize,
    /// Characters of text across the whole conversation.
    pub history_chars: usize,
    /// Character budget applied to each request.
    pub max_history_chars: usize,
    /// Total number of API requests made.
    pub total_requests: u64,
    /// Requests that ended in an error.
    pub failed_requests: u64,
    /// Prompt tokens across all requests.
    pub total_prompt_tokens: u64,
    /// Reply tokens across all requests.
    pub total_candidates_tokens: u64,
    /// Prompt tokens for the last turn, if available.
    pub last_turn_prompt_tokens: Option<u64>,
    /// Reply tokens for the last turn, if available.
    pub last_turn_candidates_tokens: Option<u64>,
}

impl SessionStats {
    /// Formats the stats for display.
    pub fn summary(&self) -> String {
        let mut lines = vec![
            format!("Model: {}", self.model),
            format!(
                "Messages: {} ({} characters, {} sent per request at most)",
                self.message_count, self.history_chars, self.max_history_chars
            ),
            format!(
                "Requests: {} ({} failed)",
                self.total_requests, self.failed_requests
            ),
            format!(
                "Tokens: {} prompt, {} reply",
                self.total_prompt_tokens, self.total_candidates_tokens
            ),
        ];
        if let (Some(prompt), Some(reply)) = (
            self.last_turn_prompt_tokens,
            self.last_turn_candidates_tokens,
        ) {
            lines.push(format!("Last turn: {prompt} prompt, {reply} reply"));
        }
        lines.join("\n")
    }
}

impl<B: GenerateContent> ChatSession<B> {
    /// Creates a session continuing `history`.
    pub fn new(backend: B, history: History, config: ChatConfig) -> Self {
        Self {
            backend,
            history,
            config,
            indicator_output: Box::new(|| Box::new(io::stdout())),
            usage_totals: UsageMetadata::default(),
            last_turn_usage: None,
            request_count: 0,
            failed_request_count: 0,
        }
    }

    /// Draws the progress indicator on streams from `output` instead of stdout.
    pub fn with_indicator_output<F>(mut self, output: F) -> Self
    where
        F: Fn() -> Box<dyn Write + Send> + Send + Sync + 'static,
    {
        self.indicator_output = Box::new(output);
        self
    }

    /// Sends a user message and renders the reply.
    ///
    /// This method:
    /// 1. Adds the user message to history
    /// 2. Prunes a copy of the history to the character budget
    /// 3. Sends the request while the progress indicator runs
    /// 4. Adds the reply (possibly empty) to history and renders it
    /// 5. Saves the history
    ///
    /// A failed save is reported through `renderer` and does not fail the turn.
    ///
    /// # Errors
    ///
    /// Returns an error if the API request fails.  The user message stays in
    /// the history and no model message is added.
    pub async fn send(&mut self, text: &str, renderer: &mut dyn Renderer) -> Result<TurnOutcome> {
        SESSION_TURNS.click();
        self.history.push(Message::user(text));

        let window = self.history.pruned(self.config.max_history_chars);
        let sent_messages = window.len();
        let pruned_messages = self.history.len() - sent_messages;
        if pruned_messages > 0 {
            HISTORY_PRUNED_MESSAGES.count(pruned_messages as u64);
        }
        let request = GenerateContentRequest::from_history(window);

        let indicator = self.config.show_progress.then(|| {
            ProgressIndicator::start((self.indicator_output)(), self.config.use_color)
        });
        let result = self.backend.generate_content(&request).await;
        if let Some(indicator) = indicator {
            indicator.stop();
        }
        self.request_count = self.request_count.saturating_add(1);

        let response = match result {
            Ok(response) => response,
            Err(err) => {
                SESSION_FAILED_TURNS.click();
                self.failed_request_count = self.failed_request_count.saturating_add(1);
                return Err(err);
            }
        };

        let reply = response.reply_text().unwrap_or_default();
        if reply.trim().is_empty() {
            CLIENT_EMPTY_REPLIES.click();
        }
        let usage = response.usage();
        if let Some(usage) = usage {
            self.usage_totals = self.usage_totals + usage;
        }
        self.last_turn_usage = usage;
        self.history.push(Message::model(reply.clone()));

        renderer.start_reply();
        renderer.print_reply(&reply);

        let saved = match self.save() {
            Ok(()) => true,
            Err(err) => {
                renderer.print_error(&format!("Failed to save history: {err}"));
                false
            }
        };

        Ok(TurnOutcome {
            reply,
            sent_messages,
            pruned_messages,
            usage,
            saved,
        })
    }

    /// Writes the full history to the configured history file.
    pub fn save(&self) -> Result<()> {
        self.save_to(&self.config.history_file)
    }

    /// Writes the full history to `path`.
    pub fn save_to<P: AsRef<Path>>(&self, path: P) -> Result<()> {
        match self.history.save(path) {
            Ok(()) => {
                HISTORY_SAVES.click();
                Ok(())
            }
            Err(err) => {
                HISTORY_SAVE_ERRORS.click();
                Err(err)
            }
        }
    }

    /// Returns the conversation so far.
    pub fn history(&self) -> &History {
        &self.history
    }

    /// Returns the number of messages in the conversation.
    pub fn message_count(&self) -> usize {
        self.history.len()
    }

    /// Returns the session configuration.
    pub fn config(&self) -> &ChatConfig {
        &self.config
    }

    /// Returns the current model.
    pub fn model(&self) -> &str {
        &self.config.model
    }

    /// Returns the backend requests are sent to.
    pub fn backend(&self) -> &B {
        &self.backend
    }

    /// Returns the current session statistics snapshot.
    pub fn stats(&self) -> SessionStats {
        SessionStats {
            model: self.config.model.clone(),
            message_count: self.history.len(),
            history_chars: self.history.char_count(),
            max_history_chars: self.config.max_history_chars,
            total_requests: self.request_count,
            failed_requests: self.failed_request_count,
            total_prompt_tokens: self.usage_totals.prompt_token_count,
            total_candidates_tokens: self.usage_totals.candidates_token_count,
            last_turn_prompt_tokens: self.last_turn_usage.map(|u| u.prompt_token_count),
            last_turn_candidates_tokens: self.last_turn_usage.map(|u| u.candidates_token_count),
        }
    }
}

#[cfg(test)]
mod tests {
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::{Arc, Mutex};

    use serde_json::json;

    use super::*;
    use crate::error::Error;
    use crate::history::HistoryLoad;
    use crate::indicator::CLEAR_WIDTH;
    use crate::render::TerminalRenderer;
    use crate::types::{GenerateContentResponse, Role};

    /// Replays canned results and records every request it receives.
    struct ScriptedBackend {
        results: Mutex<Vec<Result<GenerateContentResponse>>>,
        requests: Mutex<Vec<GenerateContentRequest>>,
    }

    impl ScriptedBackend {
        fn new(results: Vec<Result<GenerateContentResponse>>) -> Self {
            Self {
                results: Mutex::new(results.into_iter().rev().collect()),
                requests: Mutex::new(Vec::new()),
            }
        }

        fn requests(&self) -> Vec<GenerateContentRequest> {
            self.requests.lock().unwrap().clone()
        }
    }

    #[async_trait::async_trait]
    impl GenerateContent for ScriptedBackend {
        async fn generate_content(
            &self,
            request: &GenerateContentRequest,
        ) -> Result<GenerateContentResponse> {
            self.requests.lock().unwrap().push(request.clone());
            self.results
                .lock()
                .unwrap()
                .pop()
                .unwrap_or_else(|| Err(Error::connection("script exhausted", None)))
        }
    }

    fn reply(text: &str) -> Result<GenerateContentResponse> {
        Ok(GenerateContentResponse::new(json!({
            "candidates": [{"content": {"role": "model", "parts": [{"text": text}]}}],
            "usageMetadata": {"promptTokenCount": 7, "candidatesTokenCount": 3, "totalTokenCount": 10}
        })))
    }

    fn config(dir: &tempfile::TempDir) -> ChatConfig {
        ChatConfig::new()
            .with_history_file(dir.path().join("session.json"))
            .without_color()
            .without_progress()
            .with_width(80)
    }

    fn renderer() -> TerminalRenderer<Vec<u8>> {
        TerminalRenderer::new(Vec::new(), false, 80)
    }

    #[tokio::test]
    async fn successful_turn_appends_renders_and_saves() {
        let dir = tempfile::tempdir().unwrap();
        let config = config(&dir);
        let history_file = config.history_file.clone();
        let backend = ScriptedBackend::new(vec![reply("Hi!")]);
        let mut session = ChatSession::new(backend, History::new(), config);
        let mut out = renderer();

        let outcome = session.send("Hello", &mut out).await.unwrap();
        assert_eq!(outcome.reply, "Hi!");
        assert_eq!(outcome.sent_messages, 1);
        assert_eq!(outcome.pruned_messages, 0);
        assert!(outcome.saved);

        let messages = session.history().messages();
        assert_eq!(messages.len(), 2);
        assert_eq!(messages[0], Message::user("Hello"));
        assert_eq!(messages[1], Message::model("Hi!"));

        assert_eq!(String::from_utf8(out.into_inner()).unwrap(), "\nAI >>>:\nHi!\n");

        let HistoryLoad::Loaded(saved) = History::load(&history_file).unwrap() else {
            panic!("history was not saved");
        };
        assert_eq!(saved.messages(), session.history().messages());
    }

    #[tokio::test]
    async fn failed_turn_keeps_user_message_only() {
        let dir = tempfile::tempdir().unwrap();
        let config = config(&dir).with_max_history_chars(100);
        let history_file = config.history_file.clone();
        let backend = ScriptedBackend::new(vec![Err(Error::timeout(
            "request timed out",
            Some(std::time::Duration::from_secs(45)),
        ))]);
        let mut session = ChatSession::new(backend, History::new(), config);
        let mut out = renderer();

        let err = session.send("Hello", &mut out).await.unwrap_err();
        assert!(err.is_timeout());
        assert_eq!(session.history().messages(), &[Message::user("Hello")]);
        assert!(out.into_inner().is_empty());
        assert!(!history_file.exists());

        let stats = session.stats();
        assert_eq!(stats.total_requests, 1);
        assert_eq!(stats.failed_requests, 1);
    }

    /// Shared byte sink so the indicator thread and the renderer write to one
    /// ordered transcript.
    #[derive(Clone, Default)]
    struct Transcript(Arc<Mutex<Vec<u8>>>);

    impl Transcript {
        fn contents(&self) -> String {
            String::from_utf8(self.0.lock().unwrap().clone()).unwrap()
        }
    }

    impl Write for Transcript {
        fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
            self.0.lock().unwrap().extend_from_slice(buf);
            Ok(buf.len())
        }

        fn flush(&mut self) -> io::Result<()> {
            Ok(())
        }
    }

    #[tokio::test]
    async fn indicator_starts_and_stops_once_per_turn() {
        let dir = tempfile::tempdir().unwrap();
        let mut config = config(&dir);
        config.show_progress = true;
        let transcript = Transcript::default();
        let starts = Arc::new(AtomicUsize::new(0));
        let sink = transcript.clone();
        let opened = Arc::clone(&starts);
        let backend = ScriptedBackend::new(vec![
            reply("Hi!"),
            Err(Error::timeout("request timed out", None)),
        ]);
        let mut session = ChatSession::new(backend, History::new(), config)
            .with_indicator_output(move || {
                opened.fetch_add(1, Ordering::SeqCst);
                Box::new(sink.clone())
            });
        let mut out = TerminalRenderer::new(transcript.clone(), false, 80);
        let clear = format!("{}\r", " ".repeat(CLEAR_WIDTH));

        session.send("Hello", &mut out).await.unwrap();
        assert_eq!(starts.load(Ordering::SeqCst), 1);
        let text = transcript.contents();
        assert_eq!(text.matches(&clear).count(), 1);
        let cleared_at = text.find(&clear).unwrap();
        let reply_at = text.find("\nAI >>>:\nHi!\n").unwrap();
        assert!(cleared_at < reply_at, "reply rendered before the indicator stopped");

        assert!(session.send("Again", &mut out).await.is_err());
        assert_eq!(starts.load(Ordering::SeqCst), 2);
        let text = transcript.contents();
        assert_eq!(text.matches(&clear).count(), 2);
        assert!(text.ends_with(&clear));
        assert_eq!(session.message_count(), 3);
    }

    #[tokio::test]
    async fn indicator_is_not_started_when_disabled() {
        let dir = tempfile::tempdir().unwrap();
        let starts = Arc::new(AtomicUsize::new(0));
        let opened = Arc::clone(&starts);
        let backend = ScriptedBackend::new(vec![reply("Hi!")]);
        let mut session = ChatSession::new(backend, History::new(), config(&dir))
            .with_indicator_output(move || {
                opened.fetch_add(1, Ordering::SeqCst);
                Box::new(io::sink())
            });
        session.send("Hello", &mut renderer()).await.unwrap();
        assert_eq!(starts.load(Ordering::SeqCst), 0);
    }

    #[tokio::test]
    async fn malformed_reply_becomes_empty_model_message() {
        let dir = tempfile::tempdir().unwrap();
        let backend = ScriptedBackend::new(vec![Ok(GenerateContentResponse::new(
            json!({"candidates": []}),
        ))]);
        let mut session = ChatSession::new(backend, History::new(), config(&dir));
        let mut out = renderer();

        let outcome = session.send("Hello", &mut out).await.unwrap();
        assert_eq!(outcome.reply, "");
        assert_eq!(outcome.usage, None);
        assert_eq!(session.history().messages()[1], Message::model(""));
        assert_eq!(
            String::from_utf8(out.into_inner()).unwrap(),
            "\nAI >>>:\nWarning: Empty response.\n"
        );
    }

    #[tokio::test]
    async fn request_is_pruned_but_history_is_not() {
        let dir = tempfile::tempdir().unwrap();
        let config = config(&dir);
        let mut history = History::new();
        for i in 0..4 {
            let role = if i % 2 == 0 { Role::User } else { Role::Model };
            history.push(Message::new_with_text(role, "x".repeat(6000)));
        }
        let backend = ScriptedBackend::new(vec![reply("ok")]);
        let mut session = ChatSession::new(backend, history, config);
        let mut out = renderer();

        let outcome = session.send(&"y".repeat(6000), &mut out).await.unwrap();
        assert_eq!(outcome.sent_messages, 4);
        assert_eq!(outcome.pruned_messages, 1);
        assert_eq!(session.message_count(), 6);

        let requests = session.backend().requests();
        assert_eq!(requests.len(), 1);
        assert_eq!(requests[0].contents.len(), 4);
        assert_eq!(requests[0].char_count(), 24_000);
        assert_eq!(requests[0].contents[3].role, Role::User);
    }

    #[tokio::test]
    async fn save_failure_is_reported_not_fatal() {
        let dir = tempfile::tempdir().unwrap();
        let blocker = dir.path().join("blocker");
        std::fs::write(&blocker, "").unwrap();
        let config = config(&dir).with_history_file(blocker.join("session.json"));
        let backend = ScriptedBackend::new(vec![reply("Hi")]);
        let mut session = ChatSession::new(backend, History::new(), config);
        let mut out = renderer();

        let outcome = session.send("Hello", &mut out).await.unwrap();
        assert!(!outcome.saved);
        assert_eq!(session.message_count(), 2);
        let text = String::from_utf8(out.into_inner()).unwrap();
        assert!(text.contains("Error: Failed to save history"));
    }

    #[tokio::test]
    async fn stats_accumulate_usage() {
        let dir = tempfile::tempdir().unwrap();
        let backend = ScriptedBackend::new(vec![reply("a"), reply("b")]);
        let mut session = ChatSession::new(backend, History::new(), config(&dir));
        let mut out = renderer();
        session.send("one", &mut out).await.unwrap();
        session.send("two", &mut out).await.unwrap();

        let stats = session.stats();
        assert_eq!(stats.model, "gemini-2.5-flash");
        assert_eq!(stats.message_count, 4);
        assert_eq!(stats.history_chars, 8);
        assert_eq!(stats.total_requests, 2);
        assert_eq!(stats.failed_requests, 0);
        assert_eq!(stats.total_prompt_tokens, 14);
        assert_eq!(stats.total_candidates_tokens, 6);
        assert_eq!(stats.last_turn_prompt_tokens, Some(7));
        let summary = stats.summary();
        assert!(summary.contains("Requests: 2 (0 failed)"));
        assert!(summary.contains("Last turn: 7 prompt, 3 reply"));
    }

    #[tokio::test]
    async fn second_turn_carries_first_turn_context() {
        let dir = tempfile::tempdir().unwrap();
        let backend = ScriptedBackend::new(vec![reply("first"), reply("second")]);
        let mut session = ChatSession::new(backend, History::new(), config(&dir));
        let mut out = renderer();
        session.send("one", &mut out).await.unwrap();
        session.send("two", &mut out).await.unwrap();

        let requests = session.backend().requests();
        assert_eq!(requests[1].contents.len(), 3);
        assert_eq!(requests[1].contents[1].role, Role::Model);
        assert_eq!(requests[1].contents[1].parts[0].text, "first");
    }
}
