//! Document analysis pipeline: page classification, batched processing,
//! and per-document orchestration.

pub mod batch;
pub mod classifier;
mod document;
pub mod types;

pub use batch::{BatchProcessor, BatchSettings};
pub use classifier::needs_image_analysis;
pub use document::DocumentPipeline;
pub use types::{
    ConversationTurn, DocumentAnalysis, IMAGE_FAILURE_SENTINEL, ImageFinding,
    PAGE_FAILURE_SENTINEL, Page, Persona, PipelineError, SUMMARY_FAILURE_SENTINEL,
};
