//! Image transcoding to PNG.

use image::ImageFormat;
use std::io::Cursor;

#[derive(Debug, thiserror::Error)]
pub enum ConvertError {
    #[error("could not decode image: {0}")]
    Decode(#[source] image::ImageError),
    #[error("could not encode PNG: {0}")]
    Encode(#[source] image::ImageError),
}

/// Decodes `input` (format guessed from its content) and re-encodes it as PNG.
pub fn to_png(input: &[u8]) -> Result<Vec<u8>, ConvertError> {
    let img = image::load_from_memory(input).map_err(ConvertError::Decode)?;
    let mut out = Cursor::new(Vec::new());
    img.write_to(&mut out, ImageFormat::Png)
        .map_err(ConvertError::Encode)?;
    Ok(out.into_inner())
}

/// Name of the PNG produced for an uploaded file: extension replaced, or `.png` appended.
pub fn png_name(uploaded: &str) -> String {
    let stem = match uploaded.rfind('.') {
        Some(i) if i > 0 => &uploaded[..i],
        _ => uploaded,
    };
    let stem = if stem.is_empty() { "converted" } else { stem };
    format!("{}.png", stem)
}
