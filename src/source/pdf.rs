//! lopdf-backed page source.
//!
//! Computes the per-page statistics the classifier needs by walking the
//! decoded content stream: text footprint is estimated from text-showing
//! operators and the active font size, vector graphics are detected from
//! painted path operators. Embedded raster images stand in for page
//! rasterization when a page is flagged for image interpretation.

use crate::source::{PageContent, PageLayout, PageSource, SourceError};
use flate2::read::ZlibDecoder;
use lopdf::content::Content;
use lopdf::xobject::PdfImage;
use lopdf::{Document, Object, ObjectId};
use std::collections::BTreeMap;
use std::io::Read;

// US Letter, used when no MediaBox is present anywhere in the page tree.
const FALLBACK_MEDIA_BOX: [f64; 4] = [0.0, 0.0, 612.0, 792.0];

// Rough glyph footprint used to estimate painted text area.
const GLYPH_WIDTH_FACTOR: f64 = 0.5;
const LINE_HEIGHT_FACTOR: f64 = 1.2;

// Images below this edge length are decoration, not page content.
const MIN_IMAGE_DIMENSION: i64 = 50;

/// Read-only PDF document opened from raw bytes.
pub struct PdfSource {
    document: Document,
    pages: BTreeMap<u32, ObjectId>,
}

impl PdfSource {
    /// Parse a PDF from memory.
    pub fn open(bytes: &[u8]) -> Result<Self, SourceError> {
        let document = Document::load_mem(bytes)?;
        let pages = document.get_pages();
        Ok(Self { document, pages })
    }

    fn page_id(&self, page_number: u32) -> Result<ObjectId, SourceError> {
        self.pages
            .get(&page_number)
            .copied()
            .ok_or(SourceError::MissingPage(page_number))
    }

    fn page_layout(&self, page_id: ObjectId) -> PageLayout {
        let media_box = self.media_box(page_id).unwrap_or(FALLBACK_MEDIA_BOX);
        let page_area = ((media_box[2] - media_box[0]) * (media_box[3] - media_box[1])).abs();

        let embedded_image_count = match self.document.get_page_images(page_id) {
            Ok(images) => images
                .iter()
                .filter(|image| {
                    image.width >= MIN_IMAGE_DIMENSION && image.height >= MIN_IMAGE_DIMENSION
                })
                .count(),
            Err(error) => {
                tracing::debug!(error = %error, "Failed to enumerate page images");
                0
            }
        };

        let (text_area, vector_graphics) = match self
            .document
            .get_page_content(page_id)
            .and_then(|data| Content::decode(&data))
        {
            Ok(content) => scan_content(&content),
            Err(error) => {
                tracing::debug!(error = %error, "Failed to decode page content stream");
                (0.0, false)
            }
        };

        PageLayout {
            page_area,
            text_area,
            embedded_image_count,
            vector_graphics,
        }
    }

    /// Look up the page's MediaBox, walking up the page tree for inherited
    /// values.
    fn media_box(&self, page_id: ObjectId) -> Option<[f64; 4]> {
        let mut current = page_id;
        for _ in 0..32 {
            let dict = self.document.get_dictionary(current).ok()?;
            if let Ok(object) = dict.get(b"MediaBox") {
                return rectangle(&self.document, object);
            }
            current = dict.get(b"Parent").ok()?.as_reference().ok()?;
        }
        None
    }
}

impl PageSource for PdfSource {
    fn page_count(&self) -> usize {
        self.pages.len()
    }

    fn load_page(&self, page_number: u32) -> Result<PageContent, SourceError> {
        let page_id = self.page_id(page_number)?;
        let text = self
            .document
            .extract_text(&[page_number])
            .unwrap_or_else(|error| {
                tracing::debug!(
                    page = page_number,
                    error = %error,
                    "Text extraction failed; treating page as textless"
                );
                String::new()
            });

        Ok(PageContent {
            text,
            layout: self.page_layout(page_id),
        })
    }

    fn page_image(&self, page_number: u32) -> Result<Option<Vec<u8>>, SourceError> {
        let page_id = self.page_id(page_number)?;
        let images = match self.document.get_page_images(page_id) {
            Ok(images) => images,
            Err(error) => {
                tracing::debug!(page = page_number, error = %error, "Failed to read page images");
                return Ok(None);
            }
        };

        let largest = images
            .iter()
            .filter(|image| {
                image.width >= MIN_IMAGE_DIMENSION && image.height >= MIN_IMAGE_DIMENSION
            })
            .max_by_key(|image| image.width.max(0) * image.height.max(0));

        Ok(largest.and_then(decode_embedded_image))
    }
}

/// Estimate painted text area and detect vector graphics in one pass over
/// the content stream.
fn scan_content(content: &Content) -> (f64, bool) {
    let mut font_size = 12.0_f64;
    let mut text_area = 0.0_f64;
    let mut path_pending = false;
    let mut vector_graphics = false;

    for operation in &content.operations {
        match operation.operator.as_str() {
            "Tf" => {
                if let Some(size) = operation.operands.get(1).and_then(object_number) {
                    if size > 0.0 {
                        font_size = size;
                    }
                }
            }
            "Tj" | "'" => {
                let glyphs = operation.operands.first().map_or(0, string_len);
                text_area += glyph_area(glyphs, font_size);
            }
            "\"" => {
                let glyphs = operation.operands.get(2).map_or(0, string_len);
                text_area += glyph_area(glyphs, font_size);
            }
            "TJ" => {
                if let Some(Object::Array(elements)) = operation.operands.first() {
                    let glyphs: usize = elements.iter().map(string_len).sum();
                    text_area += glyph_area(glyphs, font_size);
                }
            }
            "re" | "m" | "l" | "c" | "v" | "y" => path_pending = true,
            "S" | "s" | "f" | "F" | "f*" | "B" | "B*" | "b" | "b*" => {
                if path_pending {
                    vector_graphics = true;
                }
                path_pending = false;
            }
            // Path consumed for clipping only; nothing is painted.
            "n" => path_pending = false,
            _ => {}
        }
    }

    (text_area, vector_graphics)
}

fn glyph_area(glyphs: usize, font_size: f64) -> f64 {
    glyphs as f64 * font_size * GLYPH_WIDTH_FACTOR * font_size * LINE_HEIGHT_FACTOR
}

fn string_len(object: &Object) -> usize {
    match object {
        Object::String(bytes, _) => bytes.len(),
        _ => 0,
    }
}

fn object_number(object: &Object) -> Option<f64> {
    match object {
        Object::Integer(value) => Some(*value as f64),
        Object::Real(value) => Some(f64::from(*value)),
        _ => None,
    }
}

fn rectangle(document: &Document, object: &Object) -> Option<[f64; 4]> {
    let resolved = match object
        .as_reference()
        .ok()
        .and_then(|id| document.get_object(id).ok())
    {
        Some(target) => target,
        None => object,
    };
    let array = resolved.as_array().ok()?;
    if array.len() != 4 {
        return None;
    }
    let mut rect = [0.0; 4];
    for (slot, value) in rect.iter_mut().zip(array) {
        *slot = object_number(value)?;
    }
    Some(rect)
}

/// Turn an embedded PDF image into bytes the model backend can consume.
///
/// JPEG streams pass through untouched; flate-compressed raw pixels are
/// re-encoded as PNG (CMYK converted to RGB); anything else is skipped.
fn decode_embedded_image(pdf_image: &PdfImage) -> Option<Vec<u8>> {
    let filters = pdf_image.filters.as_ref()?;

    if filters.iter().any(|filter| filter == "DCTDecode") {
        return Some(pdf_image.content.to_vec());
    }
    if filters.iter().any(|filter| filter == "JPXDecode") {
        return Some(pdf_image.content.to_vec());
    }
    if filters.iter().any(|filter| filter == "FlateDecode") {
        return match decode_flate_image(pdf_image) {
            Ok(png) => Some(png),
            Err(error) => {
                tracing::debug!(error = %error, "Failed to decode FlateDecode image");
                None
            }
        };
    }

    tracing::debug!(filters = ?filters, "Unsupported embedded image filter");
    None
}

fn decode_flate_image(pdf_image: &PdfImage) -> Result<Vec<u8>, String> {
    let mut decoder = ZlibDecoder::new(pdf_image.content);
    let mut decompressed = Vec::new();
    decoder
        .read_to_end(&mut decompressed)
        .map_err(|error| format!("decompression failed: {error}"))?;

    let color_space = pdf_image.color_space.as_deref().unwrap_or("DeviceRGB");
    let width = pdf_image.width as u32;
    let height = pdf_image.height as u32;

    let img = match color_space {
        "DeviceGray" | "Gray" => image::GrayImage::from_raw(width, height, decompressed)
            .map(image::DynamicImage::ImageLuma8),
        "DeviceCMYK" | "CMYK" => {
            let rgb = cmyk_to_rgb(&decompressed);
            image::RgbImage::from_raw(width, height, rgb).map(image::DynamicImage::ImageRgb8)
        }
        // DeviceRGB and anything unrecognized: attempt RGB.
        _ => image::RgbImage::from_raw(width, height, decompressed)
            .map(image::DynamicImage::ImageRgb8),
    };

    let img = img.ok_or_else(|| "raw pixel data did not match declared dimensions".to_string())?;

    let mut png = Vec::new();
    img.write_to(&mut std::io::Cursor::new(&mut png), image::ImageFormat::Png)
        .map_err(|error| format!("PNG encoding failed: {error}"))?;
    Ok(png)
}

fn cmyk_to_rgb(cmyk: &[u8]) -> Vec<u8> {
    let mut rgb = Vec::with_capacity((cmyk.len() / 4) * 3);
    for chunk in cmyk.chunks_exact(4) {
        let c = f32::from(chunk[0]) / 255.0;
        let m = f32::from(chunk[1]) / 255.0;
        let y = f32::from(chunk[2]) / 255.0;
        let k = f32::from(chunk[3]) / 255.0;

        rgb.push((255.0 * (1.0 - c) * (1.0 - k)) as u8);
        rgb.push((255.0 * (1.0 - m) * (1.0 - k)) as u8);
        rgb.push((255.0 * (1.0 - y) * (1.0 - k)) as u8);
    }
    rgb
}
