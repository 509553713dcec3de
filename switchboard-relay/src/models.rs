//! Minimal OpenAI-compatible chat types.
//!
//! Forwarded client traffic is passed through as raw JSON, so only the
//! prober needs typed request and response shapes: a tiny outbound payload
//! and just enough of the completion envelope to judge whether the answer
//! carries content.

use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Message {
    pub role: String,
    pub content: String,
}

impl Message {
    pub fn user(content: impl Into<String>) -> Self {
        Self {
            role: "user".to_string(),
            content: content.into(),
        }
    }
}

/// Outbound body of a health-check request.
#[derive(Debug, Clone, Serialize)]
pub struct ProbeRequest {
    pub model: String,
    pub messages: Vec<Message>,
    pub max_tokens: u32,
    pub temperature: f32,
}

impl ProbeRequest {
    /// The canonical minimal probe: one "ping" turn, five tokens back.
    pub fn for_model(model: impl Into<String>) -> Self {
        Self {
            model: model.into(),
            messages: vec![Message::user("ping")],
            max_tokens: 5,
            temperature: 0.1,
        }
    }
}

/// The slice of a chat-completion response the prober inspects.
#[derive(Debug, Clone, Deserialize)]
pub struct ChatCompletion {
    #[serde(default)]
    pub choices: Vec<Choice>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct Choice {
    pub message: ResponseMessage,
}

#[derive(Debug, Clone, Deserialize)]
pub struct ResponseMessage {
    #[serde(default)]
    pub content: Option<String>,
}

impl ChatCompletion {
    /// True when the first choice carries non-empty content.
    pub fn has_content(&self) -> bool {
        self.choices
            .first()
            .and_then(|choice| choice.message.content.as_deref())
            .is_some_and(|content| !content.is_empty())
    }
}
