use std::borrow::Cow;

use serde::{Deserialize, Serialize};

use crate::types::{Part, Role, TextPart};

/// One conversation turn as stored in the session history.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Message {
    /// The author of the turn.
    #[serde(default)]
    pub role: Role,

    /// The content of the turn, in order.
    #[serde(default)]
    pub parts: Vec<Part>,
}

impl Message {
    /// Create a new `Message` with the given role and parts.
    pub fn new(role: Role, parts: Vec<Part>) -> Self {
        Self { role, parts }
    }

    /// Create a new `Message` holding a single text part.
    pub fn new_with_text(role: Role, text: impl Into<String>) -> Self {
        Self::new(role, vec![Part::Text(TextPart::new(text))])
    }

    /// Create a new user `Message` with a single text part.
    pub fn user(text: impl Into<String>) -> Self {
        Self::new_with_text(Role::User, text)
    }

    /// Create a new model `Message` with a single text part.
    pub fn model(text: impl Into<String>) -> Self {
        Self::new_with_text(Role::Model, text)
    }

    /// Iterates over the sanitized text of every part that has one.
    pub fn texts(&self) -> impl Iterator<Item = Cow<'_, str>> {
        self.parts.iter().filter_map(Part::text)
    }

    /// Returns the sanitized parts of this message.
    pub fn text_parts(&self) -> Vec<TextPart> {
        self.texts().map(|text| TextPart::new(text)).collect()
    }

    /// Number of characters this message contributes to a request.
    pub fn char_count(&self) -> usize {
        self.texts().map(|text| text.chars().count()).sum()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::{from_value, json, to_value};

    #[test]
    fn message_serialization() {
        let message = Message::user("Hello");
        assert_eq!(
            to_value(&message).unwrap(),
            json!({"role": "user", "parts": [{"text": "Hello"}]})
        );
    }

    #[test]
    fn missing_fields_default() {
        let message: Message = from_value(json!({})).unwrap();
        assert_eq!(message.role, Role::User);
        assert!(message.parts.is_empty());
        assert_eq!(message.char_count(), 0);
    }

    #[test]
    fn char_count_uses_characters_not_bytes() {
        let message = Message::model("héllo wörld");
        assert_eq!(message.char_count(), 11);
    }

    #[test]
    fn char_count_ignores_non_text_parts() {
        let message: Message = from_value(json!({
            "role": "user",
            "parts": [{"text": "abc"}, {"inline_data": {}}, "de"]
        }))
        .unwrap();
        assert_eq!(message.char_count(), 5);
        assert_eq!(
            message.text_parts(),
            vec![TextPart::new("abc"), TextPart::new("de")]
        );
    }
}
