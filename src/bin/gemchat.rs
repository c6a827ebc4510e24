//! Interactive terminal chat with Gemini.
//!
//! # Usage
//!
//! ```bash
//! # Chat using the key in ~/.gemchat/key, continuing ~/.gemchat/session.json
//! gemchat
//!
//! # Use another model and keep a separate conversation
//! gemchat --model gemini-2.5-pro --history-file ~/work-chat.json
//!
//! # Plain output, no animation (useful for piping output)
//! gemchat --no-color --no-progress
//! ```
//!
//! # Commands
//!
//! - `.help` - Show available commands
//! - `.file <path> [description]` - Send a file's contents
//! - `.stats` - Show session statistics
//! - `::` - Start or finish a multiline message
//! - `q`, `quit`, `exit`, Ctrl+C, Ctrl+D - Save and exit

use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};

use arrrg::CommandLine;
use rustyline::DefaultEditor;

use gemchat::chat::{
    ChatArgs, ChatConfig, ChatSession, Renderer, Repl, TerminalRenderer, ensure_role_file,
    load_api_key,
};
use gemchat::{Gemini, History, HistoryLoad, JsonlLogger};

/// Main entry point for the gemchat application.
#[tokio::main(flavor = "current_thread")]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let (args, _) = ChatArgs::from_command_line_relaxed("gemchat [OPTIONS]");
    let config = ChatConfig::from(args);
    let mut renderer = TerminalRenderer::stdout(config.use_color, config.width);

    let api_key = match load_api_key(&config.key_file) {
        Ok(key) => key,
        Err(err) => {
            renderer.print_error(&err.to_string());
            std::process::exit(1);
        }
    };

    if let Err(err) = ensure_role_file(&config.role_file) {
        renderer.print_error(&format!("Failed to create role file: {err}"));
    }

    let history = match History::load(&config.history_file) {
        Ok(HistoryLoad::Loaded(history)) => history,
        Ok(HistoryLoad::Missing) => History::new(),
        Ok(HistoryLoad::Corrupt { reason }) => {
            renderer.print_warning(&format!("History is corrupt, starting fresh ({reason})."));
            History::new()
        }
        Err(err) => {
            renderer.print_warning(&format!("Could not read history, starting fresh ({err})."));
            History::new()
        }
    };

    let mut client = match Gemini::with_options(
        api_key,
        None,
        Some(config.model.clone()),
        Some(config.timeout),
    ) {
        Ok(client) => client,
        Err(err) => {
            renderer.print_error(&err.to_string());
            std::process::exit(1);
        }
    };
    if let Some(path) = &config.log_file {
        match JsonlLogger::open(path) {
            Ok(logger) => client = client.with_logger(Arc::new(logger)),
            Err(err) => renderer.print_warning(&format!("Exchange log disabled: {err}")),
        }
    }

    // Ctrl+C while a request is outstanding; rustyline reports it at the prompt.
    let interrupted = Arc::new(AtomicBool::new(false));
    let interrupted_clone = interrupted.clone();
    ctrlc::set_handler(move || {
        interrupted_clone.store(true, Ordering::Relaxed);
    })?;

    let session = ChatSession::new(client, history, config);
    let mut repl = Repl::new(DefaultEditor::new()?, session).with_interrupt_flag(interrupted);
    repl.run(&mut renderer).await;

    Ok(())
}
