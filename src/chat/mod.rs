//! Chat application module for interactive conversations with Gemini.
//!
//! This module provides the REPL chat interface built on top of the gemchat
//! client library. It supports:
//!
//! - A conversation persisted to disk between runs
//! - Multiline input and file ingestion
//! - ANSI-styled rendering of code and markdown replies
//!
//! # Architecture
//!
//! The module is organized into several components:
//!
//! - [`config`]: CLI argument parsing, configuration, and startup files
//! - [`session`]: Core chat session management and API interaction
//! - [`commands`]: Input token parsing and file messages
//! - [`repl`]: The interactive loop

pub mod commands;
pub mod config;
pub mod repl;
pub mod session;

pub use crate::render::{Renderer, TerminalRenderer};
pub use commands::{ChatInput, compose_file_message, help_text, parse_input};
pub use config::{ChatArgs, ChatConfig, ensure_role_file, load_api_key};
pub use repl::{ExitReason, LineReader, ReadOutcome, Repl};
pub use session::{ChatSession, IndicatorOutput, SessionStats, TurnOutcome};
