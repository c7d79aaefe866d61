//! LLM response shapes.
//!
//! Providers return text in different envelopes. They are folded into one
//! tagged union here and flattened to a string by [`LlmResponse::normalize`].
//! Traits and HTTP clients live in askdb-llm.

use serde::{Deserialize, Serialize};

/// Returned by [`LlmResponse::normalize`] when no textual payload exists.
pub const NO_RESPONSE_FALLBACK: &str = "No response generated.";

/// One element of a multi-part response.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum ContentPart {
    /// A textual part
    Text(String),
    /// Any non-text part (function call, inline data, ...), kept raw
    Other(serde_json::Value),
}

impl ContentPart {
    fn text(&self) -> Option<&str> {
        match self {
            ContentPart::Text(t) if !t.trim().is_empty() => Some(t.as_str()),
            _ => None,
        }
    }
}

/// Provider-agnostic generation result.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum LlmResponse {
    /// Bare string reply
    PlainText(String),
    /// Structured content carrying a single text field
    Text(String),
    /// Structured content carrying an ordered list of parts
    Parts(Vec<ContentPart>),
}

impl LlmResponse {
    /// Flatten to a string.
    ///
    /// Priority: plain text, then structured text, then the first textual
    /// part, then the first non-text part serialized as JSON. Blank payloads
    /// are skipped and the result is never empty.
    pub fn normalize(&self) -> String {
        let extracted = match self {
            LlmResponse::PlainText(text) | LlmResponse::Text(text) => {
                Some(text.as_str()).filter(|t| !t.trim().is_empty()).map(str::to_string)
            }
            LlmResponse::Parts(parts) => parts
                .iter()
                .find_map(ContentPart::text)
                .map(str::to_string)
                .or_else(|| {
                    parts.iter().find_map(|p| match p {
                        ContentPart::Other(value) if !value.is_null() => Some(value.to_string()),
                        _ => None,
                    })
                }),
        };

        extracted.unwrap_or_else(|| NO_RESPONSE_FALLBACK.to_string())
    }
}

impl From<String> for LlmResponse {
    fn from(text: String) -> Self {
        LlmResponse::PlainText(text)
    }
}

impl From<&str> for LlmResponse {
    fn from(text: &str) -> Self {
        LlmResponse::PlainText(text.to_string())
    }
}
