use serde::{Deserialize, Serialize};
use tokio::sync::oneshot;

use crate::errors::ProviderError;

// One piece of a multi-part (vision) message
#[derive(Deserialize, Serialize, Clone, Debug, PartialEq, Eq)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum MessagePart {
    Text { text: String },
    ImageUrl { image_url: ImageUrl },
}

#[derive(Deserialize, Serialize, Clone, Debug, PartialEq, Eq)]
pub struct ImageUrl {
    pub url: String,
}

/// A user message: plain text, or a list of text and image parts.
#[derive(Deserialize, Serialize, Clone, Debug, PartialEq, Eq)]
#[serde(untagged)]
pub enum ChatMessage {
    Text(String),
    Parts(Vec<MessagePart>),
}

impl ChatMessage {
    /// All text content joined with newlines. Images are skipped.
    pub fn text(&self) -> String {
        match self {
            ChatMessage::Text(text) => text.clone(),
            ChatMessage::Parts(parts) => parts
                .iter()
                .filter_map(|part| match part {
                    MessagePart::Text { text } => Some(text.as_str()),
                    MessagePart::ImageUrl { .. } => None,
                })
                .collect::<Vec<_>>()
                .join("\n"),
        }
    }

    pub fn image_urls(&self) -> Vec<&str> {
        match self {
            ChatMessage::Text(_) => Vec::new(),
            ChatMessage::Parts(parts) => parts
                .iter()
                .filter_map(|part| match part {
                    MessagePart::ImageUrl { image_url } => Some(image_url.url.as_str()),
                    MessagePart::Text { .. } => None,
                })
                .collect(),
        }
    }

    pub fn is_blank(&self) -> bool {
        self.text().trim().is_empty() && self.image_urls().iter().all(|u| u.trim().is_empty())
    }
}

#[derive(Deserialize, Serialize, Clone, Copy, Debug, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    System,
    User,
    Assistant,
}

// A prior turn of the conversation, as sent by the client
#[derive(Deserialize, Serialize, Clone, Debug, PartialEq, Eq)]
pub struct HistoryTurn {
    pub role: Role,
    pub content: ChatMessage,
}

fn default_live_only() -> bool {
    true
}

// POST /api/chat body
#[derive(Deserialize, Serialize, Clone, Debug)]
#[serde(rename_all = "camelCase")]
pub struct ChatRequest {
    pub message: ChatMessage,
    #[serde(default)]
    pub history: Vec<HistoryTurn>,
    #[serde(default = "default_live_only")]
    pub live_only: bool,
    #[serde(default)]
    pub model: Option<String>,
}

// POST /api/chat reply envelope
#[derive(Deserialize, Serialize, Clone, Debug, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct ChatResponse {
    pub response: String,
    pub is_fallback: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub note: Option<String>,
}

// What a provider needs to produce one answer
#[derive(Clone, Debug)]
pub struct ProviderRequest {
    pub history: Vec<HistoryTurn>,
    pub message: ChatMessage,
    pub model: Option<String>,
}

impl From<ChatRequest> for ProviderRequest {
    fn from(req: ChatRequest) -> Self {
        Self {
            history: req.history,
            message: req.message,
            model: req.model,
        }
    }
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Completion {
    pub provider: &'static str,
    pub text: String,
}

// Queued chat request - holds request + response channel
pub struct ChatJob {
    pub request: ProviderRequest,
    pub reply_tx: oneshot::Sender<Result<Completion, ProviderError>>,
}
