//! Batched page processing.
//!
//! Pages are partitioned into contiguous fixed-size batches. Batches run
//! concurrently, bounded by a worker limit, while pages inside one batch are
//! processed strictly in order because each page's summary is conditioned
//! on the previous page's summary. The chain resets at every batch
//! boundary: the first page of a batch summarizes against an empty previous
//! summary. Cross-batch continuity is intentionally not preserved; callers
//! relying on summary flow should treat batch edges as context breaks.

use crate::config::get_config;
use crate::gateway::{LanguageModel, SummarizeRequest};
use crate::metrics::PipelineMetrics;
use crate::pipeline::classifier::needs_image_analysis;
use crate::pipeline::types::{
    IMAGE_FAILURE_SENTINEL, ImageFinding, PAGE_FAILURE_SENTINEL, Page, Persona,
    SUMMARY_FAILURE_SENTINEL,
};
use crate::source::{PageSource, compress_for_model};
use futures_util::StreamExt;
use std::ops::RangeInclusive;
use std::sync::Arc;

/// Tunables controlling batching and image handling.
#[derive(Debug, Clone)]
pub struct BatchSettings {
    /// Number of pages per sequential batch.
    pub batch_size: usize,
    /// Text-coverage ratio below which pages are flagged for image analysis.
    pub coverage_threshold: f64,
    /// Bound on concurrently running batches; `None` runs every batch at once.
    pub max_concurrent_batches: Option<usize>,
    /// Longest image edge, in pixels, sent to the model.
    pub image_max_edge: u32,
    /// JPEG quality for recompressed page imagery.
    pub image_jpeg_quality: u8,
}

impl Default for BatchSettings {
    fn default() -> Self {
        Self {
            batch_size: 5,
            coverage_threshold: 0.3,
            max_concurrent_batches: None,
            image_max_edge: 1024,
            image_jpeg_quality: 55,
        }
    }
}

impl BatchSettings {
    /// Build settings from the loaded environment configuration.
    pub fn from_config() -> Self {
        let config = get_config();
        Self {
            batch_size: config.page_batch_size,
            coverage_threshold: config.text_coverage_threshold,
            max_concurrent_batches: config.max_concurrent_batches,
            image_max_edge: config.image_max_edge,
            image_jpeg_quality: config.image_jpeg_quality,
        }
    }
}

/// Processes a document's pages in concurrent batches.
pub struct BatchProcessor {
    model: Arc<dyn LanguageModel>,
    metrics: Arc<PipelineMetrics>,
    settings: BatchSettings,
}

impl BatchProcessor {
    /// Build a processor around a model gateway and shared metrics.
    pub fn new(
        model: Arc<dyn LanguageModel>,
        metrics: Arc<PipelineMetrics>,
        settings: BatchSettings,
    ) -> Self {
        Self {
            model,
            metrics,
            settings,
        }
    }

    /// Process every page of the source and return the records sorted by
    /// page number.
    ///
    /// Every scheduled page yields exactly one record: page-level failures
    /// become error-marker pages instead of aborting their batch, and the
    /// final sort makes the output independent of batch completion order.
    pub async fn process(
        &self,
        source: &dyn PageSource,
        document_name: &str,
        persona: &Persona,
    ) -> Vec<Page> {
        let total_pages = source.page_count() as u32;
        if total_pages == 0 {
            tracing::warn!(document = document_name, "Document has no pages");
            return Vec::new();
        }

        let batches = page_batches(total_pages, self.settings.batch_size);
        let batch_count = batches.len();
        let concurrency = self
            .settings
            .max_concurrent_batches
            .unwrap_or(batch_count)
            .max(1);
        tracing::info!(
            document = document_name,
            pages = total_pages,
            batches = batch_count,
            concurrency,
            "Processing document pages"
        );

        let results: Vec<Vec<Page>> = futures_util::stream::iter(
            batches
                .into_iter()
                .map(|batch| self.process_batch(source, document_name, persona, batch)),
        )
        .buffer_unordered(concurrency)
        .collect()
        .await;

        let mut pages: Vec<Page> = results.into_iter().flatten().collect();
        pages.sort_by_key(|page| page.page_number);
        pages
    }

    /// Process one batch strictly in page order, threading the summary chain.
    async fn process_batch(
        &self,
        source: &dyn PageSource,
        document_name: &str,
        persona: &Persona,
        batch: RangeInclusive<u32>,
    ) -> Vec<Page> {
        let mut previous_summary = String::new();
        let mut pages = Vec::with_capacity(batch.clone().count());

        for page_number in batch {
            let page = self
                .process_page(source, document_name, persona, page_number, &previous_summary)
                .await;
            previous_summary = page.text_summary.clone();
            pages.push(page);
        }

        pages
    }

    async fn process_page(
        &self,
        source: &dyn PageSource,
        document_name: &str,
        persona: &Persona,
        page_number: u32,
        previous_summary: &str,
    ) -> Page {
        let content = match source.load_page(page_number) {
            Ok(content) => content,
            Err(error) => {
                tracing::warn!(
                    document = document_name,
                    page = page_number,
                    error = %error,
                    "Failed to load page; emitting error-marker record"
                );
                return Page {
                    page_number,
                    full_text: String::new(),
                    text_summary: PAGE_FAILURE_SENTINEL.to_string(),
                    image_analysis: Vec::new(),
                };
            }
        };

        let request = SummarizeRequest {
            document_name: document_name.to_string(),
            page_number,
            page_text: normalize_text(&content.text),
            previous_summary: previous_summary.to_string(),
            persona: persona.clone(),
        };
        let text_summary = match self.model.summarize_page(&request).await {
            Ok(summary) => summary,
            Err(error) => {
                self.metrics.record_model_failure();
                tracing::warn!(
                    document = document_name,
                    page = page_number,
                    error = %error,
                    "Page summarization failed; substituting sentinel summary"
                );
                SUMMARY_FAILURE_SENTINEL.to_string()
            }
        };

        let mut image_analysis = Vec::new();
        if needs_image_analysis(&content.layout, self.settings.coverage_threshold) {
            self.metrics.record_flagged_page();
            if let Some(finding) = self
                .interpret_page_image(source, document_name, page_number)
                .await
            {
                image_analysis.push(finding);
            }
        }

        Page {
            page_number,
            full_text: content.text,
            text_summary,
            image_analysis,
        }
    }

    async fn interpret_page_image(
        &self,
        source: &dyn PageSource,
        document_name: &str,
        page_number: u32,
    ) -> Option<ImageFinding> {
        let bytes = match source.page_image(page_number) {
            Ok(Some(bytes)) => bytes,
            Ok(None) => {
                tracing::debug!(
                    document = document_name,
                    page = page_number,
                    "Flagged page has no extractable imagery"
                );
                return None;
            }
            Err(error) => {
                tracing::warn!(
                    document = document_name,
                    page = page_number,
                    error = %error,
                    "Failed to extract page imagery"
                );
                return None;
            }
        };

        let bytes = compress_for_model(
            &bytes,
            self.settings.image_max_edge,
            self.settings.image_jpeg_quality,
        );

        let explanation = match self.model.explain_image(document_name, &bytes).await {
            Ok(explanation) => explanation,
            Err(error) => {
                self.metrics.record_model_failure();
                tracing::warn!(
                    document = document_name,
                    page = page_number,
                    error = %error,
                    "Image explanation failed; substituting sentinel"
                );
                IMAGE_FAILURE_SENTINEL.to_string()
            }
        };

        Some(ImageFinding {
            page_number,
            explanation,
        })
    }
}

/// Partition pages `1..=total_pages` into contiguous batches.
fn page_batches(total_pages: u32, batch_size: usize) -> Vec<RangeInclusive<u32>> {
    let step = batch_size.max(1) as u32;
    let mut batches = Vec::new();
    let mut start = 1u32;
    while start <= total_pages {
        let end = (start + step - 1).min(total_pages);
        batches.push(start..=end);
        start = end + 1;
    }
    batches
}

/// Collapse runs of whitespace before text is sent for summarization.
pub(crate) fn normalize_text(text: &str) -> String {
    text.split_whitespace().collect::<Vec<_>>().join(" ")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn batches_cover_all_pages_contiguously() {
        let batches = page_batches(12, 5);
        assert_eq!(batches, vec![1..=5, 6..=10, 11..=12]);
    }

    #[test]
    fn short_documents_fit_in_one_batch() {
        assert_eq!(page_batches(3, 5), vec![1..=3]);
        assert_eq!(page_batches(5, 5), vec![1..=5]);
    }

    #[test]
    fn zero_batch_size_is_clamped() {
        assert_eq!(page_batches(2, 0), vec![1..=1, 2..=2]);
    }

    #[test]
    fn normalization_collapses_whitespace() {
        assert_eq!(normalize_text("  a\n\tb   c "), "a b c");
        assert_eq!(normalize_text(""), "");
    }
}
