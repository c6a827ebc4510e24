use serde::{Deserialize, Serialize};

use crate::types::{Message, Role, TextPart};

/// A sanitized conversation turn ready for the wire.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Content {
    /// The author of the turn.
    pub role: Role,

    /// Non-empty text parts, in order.
    pub parts: Vec<TextPart>,
}

/// Body of a `generateContent` call.
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
pub struct GenerateContentRequest {
    /// The conversation, oldest turn first.
    pub contents: Vec<Content>,
}

impl GenerateContentRequest {
    /// Builds a request from stored history.
    ///
    /// Every part is reduced to its sanitized text and messages left without
    /// any text are omitted.  The history itself is not modified.
    pub fn from_history(messages: &[Message]) -> Self {
        let contents = messages
            .iter()
            .filter_map(|message| {
                let parts = message.text_parts();
                if parts.is_empty() {
                    None
                } else {
                    Some(Content {
                        role: message.role,
                        parts,
                    })
                }
            })
            .collect();
        Self { contents }
    }

    /// Returns true if there is nothing to send.
    pub fn is_empty(&self) -> bool {
        self.contents.is_empty()
    }

    /// Total characters of text carried by the request.
    pub fn char_count(&self) -> usize {
        self.contents
            .iter()
            .flat_map(|content| content.parts.iter())
            .map(|part| part.text.chars().count())
            .sum()
    }
}
