//! Core data types and error definitions for the analysis pipeline.

use crate::source::{ConvertError, SourceError};
use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Summary text substituted when the model call for a page fails.
pub const SUMMARY_FAILURE_SENTINEL: &str =
    "Summary unavailable: the language model request for this page failed.";

/// Summary text substituted when the page itself could not be processed.
pub const PAGE_FAILURE_SENTINEL: &str =
    "Processing error: this page could not be read from the document.";

/// Explanation text substituted when image interpretation fails.
pub const IMAGE_FAILURE_SENTINEL: &str =
    "Image analysis unavailable: the language model request failed.";

/// One interpreted piece of page imagery.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ImageFinding {
    /// Page the imagery belongs to (1-based).
    pub page_number: u32,
    /// Model-generated explanation of the imagery.
    pub explanation: String,
}

/// One fully processed page. Immutable once its batch completes.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Page {
    /// 1-based page number within the source document.
    pub page_number: u32,
    /// Raw text extracted from the page.
    pub full_text: String,
    /// Model-generated summary conditioned on the previous page's summary
    /// within the same batch. Always populated; a sentinel marks failures.
    pub text_summary: String,
    /// Image interpretations for the page; populated only when the
    /// classifier flagged the page.
    pub image_analysis: Vec<ImageFinding>,
}

/// Instruction profile steering summaries for one document.
///
/// Derived once per document from a content sample; falls back to a fixed
/// default when generation or parsing fails.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Persona {
    /// Subject-matter domain of the document.
    pub domain: String,
    /// Specific subject the document covers.
    pub subject: String,
    /// Expertise the assistant should project.
    pub expertise: String,
    /// Qualification backing that expertise.
    pub qualification: String,
    /// Writing style for generated text.
    pub style: String,
    /// Tone for generated text.
    pub tone: String,
    /// Narrative voice for generated text.
    pub voice: String,
}

impl Default for Persona {
    fn default() -> Self {
        Self {
            domain: "general".to_string(),
            subject: "document analysis".to_string(),
            expertise: "generalist".to_string(),
            qualification: "experienced document analyst".to_string(),
            style: "clear and concise".to_string(),
            tone: "neutral".to_string(),
            voice: "third person".to_string(),
        }
    }
}

impl Persona {
    /// Render the persona as a system-prompt instruction.
    pub fn as_instruction(&self) -> String {
        format!(
            "You are a {expertise} assistant ({qualification}) working in the {domain} domain \
             on the subject of {subject}. Write in a {style} style, with a {tone} tone, \
             in the {voice} voice.",
            expertise = self.expertise,
            qualification = self.qualification,
            domain = self.domain,
            subject = self.subject,
            style = self.style,
            tone = self.tone,
            voice = self.voice,
        )
    }
}

/// Canonical analysis record for one processed document.
///
/// Serializing this value yields the exportable analysis record
/// (`document_name` plus `pages`); the persona is exported separately.
#[derive(Debug, Clone, Serialize)]
pub struct DocumentAnalysis {
    /// File name the document was ingested under; unique within a knowledge base.
    pub document_name: String,
    /// Pages sorted ascending by page number, covering exactly `1..=N`.
    pub pages: Vec<Page>,
    /// Persona derived for this document.
    #[serde(skip)]
    pub persona: Persona,
}

/// One question/answer exchange, append-only within a session.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ConversationTurn {
    /// Question asked by the user.
    pub question: String,
    /// Answer produced against the knowledge base.
    pub answer: String,
}

/// Errors that are fatal for a single document.
#[derive(Debug, Error)]
pub enum PipelineError {
    /// The file extension is not a recognized document format.
    #[error("Unsupported document format for '{file_name}'")]
    UnsupportedFormat {
        /// File the failure is attributed to.
        file_name: String,
    },
    /// Office-to-PDF conversion failed.
    #[error("Failed to convert '{file_name}' to PDF: {source}")]
    Convert {
        /// File the failure is attributed to.
        file_name: String,
        /// Underlying converter error.
        #[source]
        source: ConvertError,
    },
    /// Conversion was required but no converter collaborator was supplied.
    #[error("'{file_name}' requires office-to-PDF conversion but no converter is configured")]
    ConverterMissing {
        /// File the failure is attributed to.
        file_name: String,
    },
    /// The document could not be opened as a page-addressable source.
    #[error("Failed to open '{file_name}': {source}")]
    Open {
        /// File the failure is attributed to.
        file_name: String,
        /// Underlying source error.
        #[source]
        source: SourceError,
    },
}
