use serde::{Deserialize, Serialize};
use serde_json::Value;

/// Token accounting reported alongside a reply.
#[derive(Debug, Default, Copy, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase", default)]
pub struct UsageMetadata {
    /// Tokens in the prompt, including history.
    pub prompt_token_count: u64,

    /// Tokens in the generated candidates.
    pub candidates_token_count: u64,

    /// Total tokens billed for the call.
    pub total_token_count: u64,
}

impl std::ops::Add for UsageMetadata {
    type Output = Self;

    fn add(self, rhs: Self) -> Self {
        Self {
            prompt_token_count: self.prompt_token_count + rhs.prompt_token_count,
            candidates_token_count: self.candidates_token_count + rhs.candidates_token_count,
            total_token_count: self.total_token_count + rhs.total_token_count,
        }
    }
}

/// Parsed body of a successful `generateContent` call.
///
/// Reply bodies are loosely structured, so the body is kept as JSON and the
/// accessors report `None` instead of failing when the shape is unexpected.
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
#[serde(transparent)]
pub struct GenerateContentResponse(Value);

impl GenerateContentResponse {
    /// Wraps a parsed response body.
    pub fn new(body: Value) -> Self {
        Self(body)
    }

    /// Returns the raw response body.
    pub fn as_json(&self) -> &Value {
        &self.0
    }

    /// Returns the reply text of the first candidate.
    ///
    /// All `text` fields of `candidates[0].content.parts` are joined with
    /// newlines.  Parts without a `text` key are skipped; a missing path or a
    /// non-string `text` yields `None`.
    pub fn reply_text(&self) -> Option<String> {
        let parts = self
            .0
            .get("candidates")?
            .as_array()?
            .first()?
            .get("content")?
            .get("parts")?
            .as_array()?;
        let mut texts = Vec::with_capacity(parts.len());
        for part in parts {
            if let Some(text) = part.get("text") {
                texts.push(text.as_str()?);
            }
        }
        Some(texts.join("\n"))
    }

    /// Returns token usage, if the body reports it.
    pub fn usage(&self) -> Option<UsageMetadata> {
        let usage = self.0.get("usageMetadata")?;
        serde_json::from_value(usage.clone()).ok()
    }
}
