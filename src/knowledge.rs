//! Knowledge base aggregation and question answering.
//!
//! A [`KnowledgeBase`] is an explicit value object owned by whoever drives
//! the interaction; there is no ambient store. Registered analyses and the
//! conversation history are never mutated after insertion, so context
//! assembly is a pure function of the stored state. Callers processing
//! documents concurrently must serialize registration themselves (for
//! example behind a mutex).

use crate::gateway::{GatewayError, LanguageModel};
use crate::pipeline::types::{ConversationTurn, DocumentAnalysis};
use std::fmt::Write as _;

const ANSWER_SYSTEM_PROMPT: &str =
    "You are an assistant that answers questions based strictly on the provided document \
     knowledge base.";

/// Accumulated per-document analyses plus the session conversation history.
#[derive(Default)]
pub struct KnowledgeBase {
    documents: Vec<DocumentAnalysis>,
    history: Vec<ConversationTurn>,
}

impl KnowledgeBase {
    /// Create an empty knowledge base.
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a document analysis.
    ///
    /// Document names are unique: re-registering a name replaces the prior
    /// analysis in place, keeping its position in the formatting order.
    pub fn register(&mut self, analysis: DocumentAnalysis) {
        match self
            .documents
            .iter_mut()
            .find(|existing| existing.document_name == analysis.document_name)
        {
            Some(existing) => {
                tracing::info!(document = %analysis.document_name, "Replacing registered document");
                *existing = analysis;
            }
            None => {
                tracing::info!(document = %analysis.document_name, "Registering document");
                self.documents.push(analysis);
            }
        }
    }

    /// Append a completed conversation turn to the history.
    pub fn append(&mut self, turn: ConversationTurn) {
        self.history.push(turn);
    }

    /// Registered analyses in registration order.
    pub fn documents(&self) -> &[DocumentAnalysis] {
        &self.documents
    }

    /// Conversation turns in order of occurrence.
    pub fn history(&self) -> &[ConversationTurn] {
        &self.history
    }

    /// Whether any documents have been registered.
    pub fn is_empty(&self) -> bool {
        self.documents.is_empty()
    }

    /// Render every document's pages and the conversation history into the
    /// bounded textual context used for answering.
    ///
    /// Pure over the stored state: two calls without an intervening
    /// mutation produce byte-identical output.
    pub fn render_context(&self) -> String {
        let mut context = String::new();

        for analysis in &self.documents {
            let _ = writeln!(context, "Document: {}", analysis.document_name);
            for page in &analysis.pages {
                let _ = writeln!(context, "Page {}", page.page_number);
                let _ = writeln!(context, "Text: {}", page.full_text);
                let _ = writeln!(context, "Summary: {}", page.text_summary);
                if page.image_analysis.is_empty() {
                    let _ = writeln!(context, "Image Analysis: No image analysis.");
                } else {
                    let findings = page
                        .image_analysis
                        .iter()
                        .map(|finding| {
                            format!("Page {}: {}", finding.page_number, finding.explanation)
                        })
                        .collect::<Vec<_>>()
                        .join("\n");
                    let _ = writeln!(context, "Image Analysis: {findings}");
                }
                context.push('\n');
            }
        }

        context.push_str("Conversation so far:\n");
        for turn in &self.history {
            let _ = writeln!(context, "User: {}", turn.question);
            let _ = writeln!(context, "Assistant: {}", turn.answer);
        }

        context
    }

    /// Answer a question against the accumulated context.
    ///
    /// Unlike page-level operations, a backend failure here surfaces as an
    /// error so the caller can report it; it is never replaced by a
    /// sentinel. The turn is not appended to the history automatically.
    pub async fn answer(
        &self,
        model: &dyn LanguageModel,
        question: &str,
    ) -> Result<String, GatewayError> {
        let prompt = format!(
            "Using the following document analysis as context, answer the question. Derive the \
             answer strictly from the context; if the information is not available there, state \
             that explicitly. Cite the document name and page number(s) for any factual claim.\n\n\
             Context:\n{context}\n\
             Question: {question}\n",
            context = self.render_context(),
        );

        tracing::debug!(
            documents = self.documents.len(),
            turns = self.history.len(),
            "Answering question against knowledge base"
        );
        model.complete(ANSWER_SYSTEM_PROMPT, &prompt, 0.0).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::pipeline::types::{ImageFinding, Page, Persona};

    fn analysis(name: &str, pages: Vec<Page>) -> DocumentAnalysis {
        DocumentAnalysis {
            document_name: name.to_string(),
            pages,
            persona: Persona::default(),
        }
    }

    fn page(number: u32, image: Option<&str>) -> Page {
        Page {
            page_number: number,
            full_text: format!("text {number}"),
            text_summary: format!("summary {number}"),
            image_analysis: image
                .map(|explanation| {
                    vec![ImageFinding {
                        page_number: number,
                        explanation: explanation.to_string(),
                    }]
                })
                .unwrap_or_default(),
        }
    }

    #[test]
    fn context_renders_pages_and_image_markers() {
        let mut kb = KnowledgeBase::new();
        kb.register(analysis("a.pdf", vec![page(1, None), page(2, Some("a chart"))]));

        let context = kb.render_context();
        assert!(context.contains("Document: a.pdf"));
        assert!(context.contains("Page 1\nText: text 1\nSummary: summary 1"));
        assert!(context.contains("Image Analysis: No image analysis."));
        assert!(context.contains("Image Analysis: Page 2: a chart"));
    }

    #[test]
    fn context_preserves_registration_order_and_history() {
        let mut kb = KnowledgeBase::new();
        kb.register(analysis("b.pdf", vec![page(1, None)]));
        kb.register(analysis("a.pdf", vec![page(1, None)]));
        kb.append(ConversationTurn {
            question: "What is b?".to_string(),
            answer: "A document.".to_string(),
        });

        let context = kb.render_context();
        let b_pos = context.find("Document: b.pdf").expect("b.pdf present");
        let a_pos = context.find("Document: a.pdf").expect("a.pdf present");
        assert!(b_pos < a_pos);
        assert!(context.contains("User: What is b?\nAssistant: A document.\n"));
    }

    #[test]
    fn context_assembly_is_deterministic() {
        let mut kb = KnowledgeBase::new();
        kb.register(analysis("a.pdf", vec![page(1, Some("diagram")), page(2, None)]));
        kb.append(ConversationTurn {
            question: "q".to_string(),
            answer: "a".to_string(),
        });

        assert_eq!(kb.render_context(), kb.render_context());
    }

    #[test]
    fn reregistering_a_name_replaces_in_place() {
        let mut kb = KnowledgeBase::new();
        kb.register(analysis("a.pdf", vec![page(1, None)]));
        kb.register(analysis("b.pdf", vec![page(1, None)]));
        kb.register(analysis("a.pdf", vec![page(1, None), page(2, None)]));

        assert_eq!(kb.documents().len(), 2);
        assert_eq!(kb.documents()[0].document_name, "a.pdf");
        assert_eq!(kb.documents()[0].pages.len(), 2);
    }
}
