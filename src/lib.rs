#![deny(missing_docs)]

//! Core library for the docwise document analysis pipeline.

/// Environment-driven configuration management.
pub mod config;
/// Language model gateway: chat-completions client and trait seam.
pub mod gateway;
/// Knowledge base aggregation and question answering.
pub mod knowledge;
/// Structured logging and tracing setup.
pub mod logging;
/// Pipeline activity counters.
pub mod metrics;
/// Document analysis pipeline: classification, batching, orchestration.
pub mod pipeline;
/// Page-addressable document sources and format conversion.
pub mod source;
