//! Wire types shared by the chat-completions gateway.

use reqwest::StatusCode;
use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Errors returned while talking to the language model backend.
#[derive(Debug, Error)]
pub enum GatewayError {
    /// Endpoint URL failed to parse or normalize.
    #[error("Invalid endpoint URL: {0}")]
    InvalidUrl(String),
    /// HTTP layer failed before receiving a response (includes timeouts).
    #[error("HTTP request failed: {0}")]
    Http(#[from] reqwest::Error),
    /// Backend responded with a non-success status code.
    #[error("Unexpected backend response ({status}): {body}")]
    UnexpectedStatus {
        /// HTTP status returned from the backend.
        status: StatusCode,
        /// Body payload associated with the failing response.
        body: String,
    },
    /// Backend returned a payload without any completion choices.
    #[error("Backend response contained no choices")]
    EmptyResponse,
}

/// One message in a chat-completions request.
#[derive(Debug, Serialize)]
pub struct ChatMessage {
    /// Role the message is attributed to (`system` or `user`).
    pub role: &'static str,
    /// Message content: plain text or multimodal parts.
    pub content: MessageContent,
}

impl ChatMessage {
    /// Build a plain-text system message.
    pub fn system(text: impl Into<String>) -> Self {
        Self {
            role: "system",
            content: MessageContent::Text(text.into()),
        }
    }

    /// Build a plain-text user message.
    pub fn user(text: impl Into<String>) -> Self {
        Self {
            role: "user",
            content: MessageContent::Text(text.into()),
        }
    }
}

/// Message content, either a bare string or an array of multimodal parts.
#[derive(Debug, Serialize)]
#[serde(untagged)]
pub enum MessageContent {
    /// Plain text content.
    Text(String),
    /// Multimodal content parts (text plus image URLs).
    Parts(Vec<ContentPart>),
}

/// One part of a multimodal user message.
#[derive(Debug, Serialize)]
#[serde(tag = "type")]
pub enum ContentPart {
    /// Text fragment.
    #[serde(rename = "text")]
    Text {
        /// The text fragment itself.
        text: String,
    },
    /// Image reference delivered as a data URL.
    #[serde(rename = "image_url")]
    ImageUrl {
        /// Wrapped data-URL payload.
        image_url: ImageUrlContent,
    },
}

/// Data-URL payload for an image content part.
#[derive(Debug, Serialize)]
pub struct ImageUrlContent {
    /// `data:<mime>;base64,<payload>` URL for the image bytes.
    pub url: String,
}

/// Request body for the chat-completions endpoint.
#[derive(Debug, Serialize)]
pub struct ChatRequest {
    /// Model/deployment name.
    pub model: String,
    /// Ordered conversation messages.
    pub messages: Vec<ChatMessage>,
    /// Sampling temperature; 0.0 requests deterministic decoding.
    pub temperature: f32,
}

/// Response body from the chat-completions endpoint.
#[derive(Debug, Deserialize)]
pub struct ChatResponse {
    /// Completion choices; the first is used.
    pub choices: Vec<ChatChoice>,
}

/// One completion choice.
#[derive(Debug, Deserialize)]
pub struct ChatChoice {
    /// Generated assistant message.
    pub message: ResponseMessage,
}

/// Assistant message inside a completion choice.
#[derive(Debug, Deserialize)]
pub struct ResponseMessage {
    /// Generated text content.
    pub content: String,
}
