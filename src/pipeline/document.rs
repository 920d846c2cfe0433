//! Top-level per-document orchestration.

use crate::gateway::LanguageModel;
use crate::metrics::{MetricsSnapshot, PipelineMetrics};
use crate::pipeline::batch::{BatchProcessor, BatchSettings, normalize_text};
use crate::pipeline::types::{DocumentAnalysis, Persona, PipelineError};
use crate::source::{OfficeConverter, PageSource, PdfSource, SourceFormat};
use std::borrow::Cow;
use std::sync::Arc;

/// Number of leading pages sampled for persona generation.
const PERSONA_SAMPLE_PAGES: u32 = 3;

/// Orchestrates the full analysis of a single document: conversion, persona
/// derivation, batched page processing, and record assembly.
///
/// The service owns long-lived handles to the model gateway, the optional
/// office converter, and the metrics registry; construct it once and share
/// it through an `Arc` across concurrently processed documents.
pub struct DocumentPipeline {
    model: Arc<dyn LanguageModel>,
    converter: Option<Arc<dyn OfficeConverter>>,
    metrics: Arc<PipelineMetrics>,
    settings: BatchSettings,
}

impl DocumentPipeline {
    /// Build a pipeline around a model gateway and an optional converter.
    pub fn new(
        model: Arc<dyn LanguageModel>,
        converter: Option<Arc<dyn OfficeConverter>>,
        settings: BatchSettings,
    ) -> Self {
        Self {
            model,
            converter,
            metrics: Arc::new(PipelineMetrics::new()),
            settings,
        }
    }

    /// Analyze one document and produce its canonical analysis record.
    ///
    /// Failures to convert or open the source are fatal for this document
    /// only and carry the file name; they never affect sibling documents a
    /// caller may be processing concurrently. The opened source is released
    /// when this call returns, on success or failure.
    pub async fn run(
        &self,
        source_bytes: &[u8],
        file_name: &str,
    ) -> Result<DocumentAnalysis, PipelineError> {
        let format = SourceFormat::from_file_name(file_name).ok_or_else(|| {
            PipelineError::UnsupportedFormat {
                file_name: file_name.to_string(),
            }
        })?;

        let pdf_bytes: Cow<'_, [u8]> = if format.needs_conversion() {
            let converter =
                self.converter
                    .as_ref()
                    .ok_or_else(|| PipelineError::ConverterMissing {
                        file_name: file_name.to_string(),
                    })?;
            tracing::info!(document = file_name, ?format, "Converting document to PDF");
            let converted = converter
                .convert_to_pdf(source_bytes, format)
                .await
                .map_err(|source| PipelineError::Convert {
                    file_name: file_name.to_string(),
                    source,
                })?;
            Cow::Owned(converted)
        } else {
            Cow::Borrowed(source_bytes)
        };

        let source = PdfSource::open(&pdf_bytes).map_err(|source| PipelineError::Open {
            file_name: file_name.to_string(),
            source,
        })?;

        let persona = self.derive_persona(&source, file_name).await;

        let processor = BatchProcessor::new(
            self.model.clone(),
            self.metrics.clone(),
            self.settings.clone(),
        );
        let pages = processor.process(&source, file_name, &persona).await;
        self.metrics.record_document(pages.len() as u64);
        tracing::info!(
            document = file_name,
            pages = pages.len(),
            "Document analysis complete"
        );

        Ok(DocumentAnalysis {
            document_name: file_name.to_string(),
            pages,
            persona,
        })
    }

    /// Derive the document persona from a sample of the leading pages.
    ///
    /// Sample-page read failures and persona generation failures both fall
    /// back gracefully; persona derivation never fails a document.
    async fn derive_persona(&self, source: &dyn PageSource, file_name: &str) -> Persona {
        let last_sample_page = (source.page_count() as u32).min(PERSONA_SAMPLE_PAGES);
        let mut sample = String::new();
        for page_number in 1..=last_sample_page {
            match source.load_page(page_number) {
                Ok(content) => {
                    sample.push_str(&normalize_text(&content.text));
                    sample.push('\n');
                }
                Err(error) => {
                    tracing::debug!(
                        document = file_name,
                        page = page_number,
                        error = %error,
                        "Skipping unreadable sample page"
                    );
                }
            }
        }

        match self.model.generate_persona(&sample).await {
            Ok(persona) => persona,
            Err(error) => {
                self.metrics.record_model_failure();
                tracing::warn!(
                    document = file_name,
                    error = %error,
                    "Persona generation failed; using default persona"
                );
                Persona::default()
            }
        }
    }

    /// Return the current pipeline metrics snapshot.
    pub fn metrics(&self) -> MetricsSnapshot {
        self.metrics.snapshot()
    }
}
