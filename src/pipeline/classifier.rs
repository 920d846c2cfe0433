//! Heuristic deciding whether a page's visual content needs model-based
//! image interpretation.

use crate::source::PageLayout;

/// Decide whether a page warrants image-level interpretation.
///
/// A page dominated by imagery relative to its text footprint likely
/// carries information text extraction alone misses (scanned pages,
/// diagrams, charts). Rules:
///
/// - zero page area or zero text area: flag only when embedded imagery or
///   vector graphics exist;
/// - otherwise: flag when imagery exists and the text coverage ratio is
///   strictly below `threshold`.
pub fn needs_image_analysis(layout: &PageLayout, threshold: f64) -> bool {
    let has_embedded = layout.embedded_image_count > 0 || layout.vector_graphics;

    if layout.page_area <= 0.0 || layout.text_area <= 0.0 {
        return has_embedded;
    }

    let coverage = layout.text_area / layout.page_area;
    has_embedded && coverage < threshold
}

#[cfg(test)]
mod tests {
    use super::*;

    fn layout(page_area: f64, text_area: f64, images: usize, vectors: bool) -> PageLayout {
        PageLayout {
            page_area,
            text_area,
            embedded_image_count: images,
            vector_graphics: vectors,
        }
    }

    #[test]
    fn textless_page_without_imagery_is_not_flagged() {
        assert!(!needs_image_analysis(&layout(1000.0, 0.0, 0, false), 0.3));
    }

    #[test]
    fn textless_page_with_embedded_image_is_flagged() {
        assert!(needs_image_analysis(&layout(1000.0, 0.0, 1, false), 0.3));
    }

    #[test]
    fn zero_page_area_never_divides() {
        assert!(!needs_image_analysis(&layout(0.0, 0.0, 0, false), 0.3));
        assert!(needs_image_analysis(&layout(0.0, 0.0, 0, true), 0.3));
    }

    #[test]
    fn low_coverage_with_imagery_is_flagged() {
        assert!(needs_image_analysis(&layout(1000.0, 100.0, 1, false), 0.3));
        assert!(needs_image_analysis(&layout(1000.0, 100.0, 0, true), 0.3));
    }

    #[test]
    fn coverage_at_threshold_is_not_flagged() {
        // Strict less-than semantics at the boundary.
        assert!(!needs_image_analysis(&layout(1000.0, 300.0, 1, false), 0.3));
    }

    #[test]
    fn high_coverage_is_not_flagged_even_with_imagery() {
        assert!(!needs_image_analysis(&layout(1000.0, 800.0, 2, true), 0.3));
    }

    #[test]
    fn text_heavy_page_without_imagery_is_not_flagged() {
        assert!(!needs_image_analysis(&layout(1000.0, 100.0, 0, false), 0.3));
    }
}
