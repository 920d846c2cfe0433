//! Bounded recompression of page imagery before transmission to the model.

use image::codecs::jpeg::JpegEncoder;
use image::imageops::FilterType;
use std::io::Cursor;

/// Downscale to the given longest edge and re-encode as JPEG.
///
/// This is a cost control, not a correctness requirement: any decode or
/// encode failure falls back to the original bytes so the page still gets
/// interpreted.
pub fn compress_for_model(bytes: &[u8], max_edge: u32, quality: u8) -> Vec<u8> {
    match try_compress(bytes, max_edge, quality) {
        Ok(compressed) => compressed,
        Err(error) => {
            tracing::debug!(error = %error, "Image recompression failed; sending original bytes");
            bytes.to_vec()
        }
    }
}

fn try_compress(bytes: &[u8], max_edge: u32, quality: u8) -> Result<Vec<u8>, image::ImageError> {
    let decoded = image::load_from_memory(bytes)?;
    let bounded = if decoded.width().max(decoded.height()) > max_edge {
        decoded.resize(max_edge, max_edge, FilterType::Triangle)
    } else {
        decoded
    };

    let rgb = bounded.to_rgb8();
    let mut output = Vec::new();
    let mut encoder = JpegEncoder::new_with_quality(Cursor::new(&mut output), quality);
    encoder.encode_image(&rgb)?;
    Ok(output)
}
