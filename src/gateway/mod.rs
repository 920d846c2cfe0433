//! Uniform interface to the language model backend.
//!
//! The gateway exposes four capabilities over one chat-completions
//! transport: image explanation, context-conditioned page summarization,
//! persona generation, and general completion for question answering.
//! Every call is bounded by a timeout and never retried; callers decide
//! whether a failure degrades to a sentinel or surfaces to the user.

mod client;
pub mod types;

pub use client::{AzureChatGateway, LanguageModel, SummarizeRequest, detect_image_mime};
pub use types::GatewayError;
