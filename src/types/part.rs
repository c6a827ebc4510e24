use std::borrow::Cow;

use serde::{Deserialize, Serialize};
use serde_json::Value;

/// A leaf unit of message content.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(deny_unknown_fields)]
pub struct TextPart {
    /// The text content.
    pub text: String,
}

impl TextPart {
    /// Create a new `TextPart` with the given text.
    pub fn new(text: impl Into<String>) -> Self {
        Self { text: text.into() }
    }
}

/// One entry of a stored message's `parts` list.
///
/// Persisted history may carry entries that are not well-formed text parts
/// (hand edits, older versions, non-text parts).  They are kept verbatim so a
/// save after a load writes them back unchanged; only [`Part::text`] decides
/// what is sent to the API.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(untagged)]
pub enum Part {
    /// A well-formed `{"text": "..."}` part.
    Text(TextPart),

    /// A bare string used as a part.
    Bare(String),

    /// Anything else.
    Other(Value),
}

impl Part {
    /// Returns the sanitized text of this part.
    ///
    /// Scalar `text` values are coerced to strings.  Empty text and entries
    /// without a usable `text` field yield `None`.
    pub fn text(&self) -> Option<Cow<'_, str>> {
        let text = match self {
            Part::Text(part) => Cow::Borrowed(part.text.as_str()),
            Part::Bare(text) => Cow::Borrowed(text.as_str()),
            Part::Other(Value::Object(map)) => match map.get("text")? {
                Value::String(text) => Cow::Borrowed(text.as_str()),
                Value::Number(number) => Cow::Owned(number.to_string()),
                Value::Bool(flag) => Cow::Owned(flag.to_string()),
                _ => return None,
            },
            Part::Other(_) => return None,
        };
        if text.is_empty() { None } else { Some(text) }
    }
}

impl From<TextPart> for Part {
    fn from(part: TextPart) -> Self {
        Part::Text(part)
    }
}
