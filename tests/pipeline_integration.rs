//! End-to-end pipeline tests against scripted fakes and synthetic PDFs.

use async_trait::async_trait;
use docwise::gateway::{GatewayError, LanguageModel, SummarizeRequest};
use docwise::knowledge::KnowledgeBase;
use docwise::pipeline::{
    BatchProcessor, BatchSettings, ConversationTurn, DocumentPipeline, Persona, PipelineError,
    SUMMARY_FAILURE_SENTINEL,
};
use docwise::source::{PageContent, PageLayout, PageSource, SourceError};
use std::collections::HashSet;
use std::sync::{Arc, Mutex};
use std::time::Duration;

/// In-memory page source with configurable failing pages.
struct FakeSource {
    pages: usize,
    failing_pages: HashSet<u32>,
}

impl FakeSource {
    fn with_pages(pages: usize) -> Self {
        Self {
            pages,
            failing_pages: HashSet::new(),
        }
    }
}

impl PageSource for FakeSource {
    fn page_count(&self) -> usize {
        self.pages
    }

    fn load_page(&self, page_number: u32) -> Result<PageContent, SourceError> {
        if self.failing_pages.contains(&page_number) {
            return Err(SourceError::MissingPage(page_number));
        }
        Ok(PageContent {
            text: format!("page {page_number} text"),
            layout: PageLayout {
                page_area: 612.0 * 792.0,
                text_area: 400_000.0,
                embedded_image_count: 0,
                vector_graphics: false,
            },
        })
    }

    fn page_image(&self, _page_number: u32) -> Result<Option<Vec<u8>>, SourceError> {
        Ok(None)
    }
}

/// Scripted model that records every summarization request it receives.
#[derive(Default)]
struct ScriptedModel {
    requests: Mutex<Vec<SummarizeRequest>>,
    fail_summaries: bool,
    fail_persona: bool,
    fail_completions: bool,
    /// Extra per-call latency applied to pages below this number, used to
    /// force later batches to finish before earlier ones.
    slow_pages_below: u32,
}

impl ScriptedModel {
    fn recorded(&self) -> Vec<SummarizeRequest> {
        self.requests.lock().expect("requests lock").clone()
    }
}

#[async_trait]
impl LanguageModel for ScriptedModel {
    async fn complete(
        &self,
        _system: &str,
        user: &str,
        _temperature: f32,
    ) -> Result<String, GatewayError> {
        if self.fail_completions {
            return Err(GatewayError::EmptyResponse);
        }
        Ok(format!("answer to: {user}"))
    }

    async fn explain_image(
        &self,
        _document_name: &str,
        _image_bytes: &[u8],
    ) -> Result<String, GatewayError> {
        Ok("an illustration".to_string())
    }

    async fn summarize_page(&self, request: &SummarizeRequest) -> Result<String, GatewayError> {
        if request.page_number < self.slow_pages_below {
            tokio::time::sleep(Duration::from_millis(25)).await;
        }
        self.requests
            .lock()
            .expect("requests lock")
            .push(request.clone());
        if self.fail_summaries {
            return Err(GatewayError::EmptyResponse);
        }
        Ok(format!("summary {}", request.page_number))
    }

    async fn generate_persona(&self, _sample_text: &str) -> Result<Persona, GatewayError> {
        if self.fail_persona {
            return Err(GatewayError::EmptyResponse);
        }
        Ok(Persona {
            domain: "finance".to_string(),
            ..Persona::default()
        })
    }
}

fn processor(model: Arc<ScriptedModel>, settings: BatchSettings) -> BatchProcessor {
    BatchProcessor::new(
        model,
        Arc::new(docwise::metrics::PipelineMetrics::new()),
        settings,
    )
}

#[tokio::test]
async fn every_page_yields_exactly_one_record_in_order() {
    let model = Arc::new(ScriptedModel {
        // Slowing the first batch lets the second and third finish first.
        slow_pages_below: 6,
        ..ScriptedModel::default()
    });
    let source = FakeSource::with_pages(12);
    let settings = BatchSettings {
        batch_size: 5,
        ..BatchSettings::default()
    };

    let pages = processor(model.clone(), settings)
        .process(&source, "report.pdf", &Persona::default())
        .await;

    assert_eq!(pages.len(), 12);
    let numbers: Vec<u32> = pages.iter().map(|page| page.page_number).collect();
    assert_eq!(numbers, (1..=12).collect::<Vec<u32>>());
    assert_eq!(pages[0].text_summary, "summary 1");
    assert_eq!(pages[11].text_summary, "summary 12");
}

#[tokio::test]
async fn summary_chain_resets_at_batch_boundaries() {
    let model = Arc::new(ScriptedModel::default());
    let source = FakeSource::with_pages(12);
    let settings = BatchSettings {
        batch_size: 5,
        ..BatchSettings::default()
    };

    processor(model.clone(), settings)
        .process(&source, "report.pdf", &Persona::default())
        .await;

    let mut requests = model.recorded();
    requests.sort_by_key(|request| request.page_number);
    assert_eq!(requests.len(), 12);

    // Batches are 1-5, 6-10, 11-12; each leading page starts a fresh chain.
    for request in &requests {
        let expected = match request.page_number {
            1 | 6 | 11 => String::new(),
            n => format!("summary {}", n - 1),
        };
        assert_eq!(
            request.previous_summary, expected,
            "previous summary for page {}",
            request.page_number
        );
    }
}

#[tokio::test]
async fn model_failures_degrade_to_sentinel_summaries() {
    let model = Arc::new(ScriptedModel {
        fail_summaries: true,
        ..ScriptedModel::default()
    });
    let source = FakeSource::with_pages(7);
    let settings = BatchSettings {
        batch_size: 3,
        ..BatchSettings::default()
    };

    let pages = processor(model.clone(), settings)
        .process(&source, "report.pdf", &Persona::default())
        .await;

    assert_eq!(pages.len(), 7);
    for page in &pages {
        assert_eq!(page.text_summary, SUMMARY_FAILURE_SENTINEL);
        assert!(!page.full_text.is_empty());
    }

    // The chain threads the sentinel forward within a batch.
    let mut requests = model.recorded();
    requests.sort_by_key(|request| request.page_number);
    assert_eq!(requests[1].previous_summary, SUMMARY_FAILURE_SENTINEL);
    assert_eq!(requests[3].previous_summary, "");
}

#[tokio::test]
async fn unreadable_pages_become_error_markers_without_aborting_the_batch() {
    let model = Arc::new(ScriptedModel::default());
    let mut source = FakeSource::with_pages(4);
    source.failing_pages.insert(2);

    let pages = processor(model.clone(), BatchSettings::default())
        .process(&source, "report.pdf", &Persona::default())
        .await;

    assert_eq!(pages.len(), 4);
    assert!(pages[1].full_text.is_empty());
    assert_ne!(pages[1].text_summary, "summary 2");
    assert_eq!(pages[2].text_summary, "summary 3");
}

#[tokio::test]
async fn unsupported_formats_fail_with_the_file_name() {
    let model = Arc::new(ScriptedModel::default());
    let pipeline = DocumentPipeline::new(model, None, BatchSettings::default());

    let error = pipeline
        .run(b"not a document", "notes.txt")
        .await
        .expect_err("txt is not a supported format");
    assert!(matches!(error, PipelineError::UnsupportedFormat { .. }));
    assert!(error.to_string().contains("notes.txt"));

    let pipeline = DocumentPipeline::new(
        Arc::new(ScriptedModel::default()),
        None,
        BatchSettings::default(),
    );
    let error = pipeline
        .run(b"office bytes", "sheet.xlsx")
        .await
        .expect_err("no converter is configured");
    assert!(matches!(error, PipelineError::ConverterMissing { .. }));
    assert!(error.to_string().contains("sheet.xlsx"));
}

#[tokio::test]
async fn pdf_documents_run_end_to_end() {
    let model = Arc::new(ScriptedModel::default());
    let pipeline = DocumentPipeline::new(model.clone(), None, BatchSettings::default());

    let bytes = fixtures::pdf_with_text_pages(&["first page words", "second page words"]);
    let analysis = pipeline.run(&bytes, "report.pdf").await.expect("analysis");

    assert_eq!(analysis.document_name, "report.pdf");
    assert_eq!(analysis.pages.len(), 2);
    assert_eq!(analysis.pages[0].page_number, 1);
    assert!(analysis.pages[0].full_text.contains("first page words"));
    assert_eq!(analysis.pages[1].text_summary, "summary 2");
    assert_eq!(analysis.persona.domain, "finance");

    let snapshot = pipeline.metrics();
    assert_eq!(snapshot.documents_processed, 1);
    assert_eq!(snapshot.pages_processed, 2);
    assert_eq!(snapshot.model_failures, 0);
}

#[tokio::test]
async fn persona_failures_fall_back_to_the_default() {
    let model = Arc::new(ScriptedModel {
        fail_persona: true,
        ..ScriptedModel::default()
    });
    let pipeline = DocumentPipeline::new(model, None, BatchSettings::default());

    let bytes = fixtures::pdf_with_text_pages(&["only page"]);
    let analysis = pipeline.run(&bytes, "report.pdf").await.expect("analysis");

    assert_eq!(analysis.persona, Persona::default());
    assert_eq!(pipeline.metrics().model_failures, 1);
}

#[tokio::test]
async fn knowledge_base_answers_and_surfaces_failures() {
    let model = ScriptedModel::default();
    let pipeline = DocumentPipeline::new(
        Arc::new(ScriptedModel::default()),
        None,
        BatchSettings::default(),
    );

    let bytes = fixtures::pdf_with_text_pages(&["quarterly results"]);
    let analysis = pipeline.run(&bytes, "report.pdf").await.expect("analysis");

    let mut kb = KnowledgeBase::new();
    kb.register(analysis);

    let answer = kb.answer(&model, "What are the results?").await.expect("answer");
    assert!(answer.contains("Document: report.pdf"));
    kb.append(ConversationTurn {
        question: "What are the results?".to_string(),
        answer,
    });
    assert_eq!(kb.history().len(), 1);

    let failing = ScriptedModel {
        fail_completions: true,
        ..ScriptedModel::default()
    };
    kb.answer(&failing, "Anything else?")
        .await
        .expect_err("backend failures surface to the caller");
    // A failed turn never lands in the history.
    assert_eq!(kb.history().len(), 1);
}

mod fixtures {
    use lopdf::content::{Content, Operation};
    use lopdf::{Document, Object, Stream, dictionary};

    /// Build a minimal PDF with one text page per entry.
    pub fn pdf_with_text_pages(texts: &[&str]) -> Vec<u8> {
        let mut doc = Document::with_version("1.5");
        let pages_id = doc.new_object_id();
        let font_id = doc.add_object(dictionary! {
            "Type" => "Font",
            "Subtype" => "Type1",
            "BaseFont" => "Helvetica",
        });
        let resources_id = doc.add_object(dictionary! {
            "Font" => dictionary! { "F1" => font_id },
        });

        let mut kids = Vec::new();
        for text in texts {
            let content = Content {
                operations: vec![
                    Operation::new("BT", vec![]),
                    Operation::new("Tf", vec!["F1".into(), 24.into()]),
                    Operation::new("Td", vec![100.into(), 600.into()]),
                    Operation::new("Tj", vec![Object::string_literal(*text)]),
                    Operation::new("ET", vec![]),
                ],
            };
            let content_id = doc.add_object(Stream::new(
                dictionary! {},
                content.encode().expect("encode content"),
            ));
            let page_id = doc.add_object(dictionary! {
                "Type" => "Page",
                "Parent" => pages_id,
                "Contents" => content_id,
            });
            kids.push(page_id.into());
        }

        let count = kids.len() as i64;
        doc.objects.insert(
            pages_id,
            Object::Dictionary(dictionary! {
                "Type" => "Pages",
                "Kids" => kids,
                "Count" => count,
                "Resources" => resources_id,
                "MediaBox" => vec![0.into(), 0.into(), 612.into(), 792.into()],
            }),
        );
        let catalog_id = doc.add_object(dictionary! {
            "Type" => "Catalog",
            "Pages" => pages_id,
        });
        doc.trailer.set("Root", catalog_id);

        let mut bytes = Vec::new();
        doc.save_to(&mut bytes).expect("save pdf");
        bytes
    }
}
