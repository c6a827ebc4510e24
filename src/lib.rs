// Public modules
pub mod chat;
pub mod client;
pub mod client_logger;
pub mod error;
pub mod history;
pub mod indicator;
pub mod observability;
pub mod render;
pub mod types;
pub mod utils;

// Re-exports
pub use client::{GenerateContent, Gemini};
pub use client_logger::{ClientLogger, JsonlLogger};
pub use error::{Error, Result};
pub use history::{History, HistoryLoad, prune};
pub use indicator::ProgressIndicator;
pub use observability::register_biometrics;
pub use render::{Renderer, ReplyKind, TerminalRenderer, classify};
pub use types::*;
