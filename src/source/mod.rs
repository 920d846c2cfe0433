//! Page-addressable document sources.
//!
//! The pipeline only ever sees the [`PageSource`] trait: a read-only view of
//! an opened document that hands out per-page text, layout statistics, and
//! optional imagery. Page reads are independent and must tolerate concurrent
//! access from multiple batch workers; the lopdf-backed implementation
//! satisfies this because all reads borrow the document immutably.

mod compress;
mod convert;
mod pdf;

pub use compress::compress_for_model;
pub use convert::{ConvertError, OfficeConverter, SourceFormat};
pub use pdf::PdfSource;

use thiserror::Error;

/// Errors raised while reading from a document source.
#[derive(Debug, Error)]
pub enum SourceError {
    /// The document bytes could not be parsed.
    #[error("Malformed document: {0}")]
    Malformed(#[from] lopdf::Error),
    /// The requested page number does not exist in the document.
    #[error("Page {0} not present in document")]
    MissingPage(u32),
}

/// Geometry and content statistics for one page, consumed by the classifier.
#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct PageLayout {
    /// Total page area in PDF units squared.
    pub page_area: f64,
    /// Estimated area covered by text blocks.
    pub text_area: f64,
    /// Number of embedded raster images on the page.
    pub embedded_image_count: usize,
    /// Whether the page paints any vector graphics.
    pub vector_graphics: bool,
}

/// Extracted content for one page.
#[derive(Debug, Clone)]
pub struct PageContent {
    /// Raw text extracted from the page.
    pub text: String,
    /// Layout statistics for image-analysis classification.
    pub layout: PageLayout,
}

/// Read-only, page-addressable view of an opened document.
pub trait PageSource: Send + Sync {
    /// Number of pages in the document.
    fn page_count(&self) -> usize;

    /// Load text and layout statistics for a page (1-based).
    fn load_page(&self, page_number: u32) -> Result<PageContent, SourceError>;

    /// Extract representative imagery for a page (1-based), if any.
    fn page_image(&self, page_number: u32) -> Result<Option<Vec<u8>>, SourceError>;
}
