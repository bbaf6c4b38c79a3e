use base64::{engine::general_purpose::STANDARD, Engine as _};
use image::{ImageFormat, RgbImage};
use std::io::Cursor;

use crate::core::errors::{AnnotateError, AnnotateResult};

/// Decode an encoded image (PNG, JPEG, ...) into a 3-channel RGB raster.
///
/// Alpha is dropped, matching a "load as colour" read.
pub fn decode_rgb(bytes: &[u8]) -> AnnotateResult<RgbImage> {
    if bytes.is_empty() {
        return Err(AnnotateError::InvalidInput("image buffer is empty".to_string()));
    }
    let img = image::load_from_memory(bytes).map_err(AnnotateError::Decode)?;
    Ok(img.to_rgb8())
}

/// Asynchronously decode an image using spawn_blocking.
///
/// Image decoding is CPU-intensive, especially for large images.
pub async fn decode_rgb_async(bytes: Vec<u8>) -> AnnotateResult<RgbImage> {
    tokio::task::spawn_blocking(move || decode_rgb(&bytes))
        .await
        .map_err(|e| AnnotateError::TaskJoin(e.to_string()))?
}

/// Encode an RGB raster as PNG bytes.
pub fn encode_png(img: &RgbImage) -> AnnotateResult<Vec<u8>> {
    let mut png_bytes = Vec::new();
    let mut cursor = Cursor::new(&mut png_bytes);
    img.write_to(&mut cursor, ImageFormat::Png)
        .map_err(AnnotateError::Encode)?;
    Ok(png_bytes)
}

/// Drop a data-URL header (`data:image/png;base64,`) if present.
pub fn strip_data_url_header(payload: &str) -> &str {
    match payload.split_once(',') {
        Some((_, data)) => data,
        None => payload,
    }
}

/// Decode a base64 image payload, tolerating a data-URL header and embedded whitespace.
pub fn decode_base64_image(payload: &str) -> Result<Vec<u8>, base64::DecodeError> {
    let data = strip_data_url_header(payload);
    if data.bytes().any(|b| b.is_ascii_whitespace()) {
        let compact: String = data.chars().filter(|c| !c.is_ascii_whitespace()).collect();
        STANDARD.decode(compact)
    } else {
        STANDARD.decode(data)
    }
}
