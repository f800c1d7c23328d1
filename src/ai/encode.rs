//! Image encoding: `DynamicImage` → base64 PNG wrapped in `ImageData`.
//!
//! Embedded PDF images can be print resolution; anything larger than the
//! configured edge cap is downscaled first so a single figure never blows the
//! provider's request size limit.

use base64::{engine::general_purpose::STANDARD, Engine as _};
use edgequake_llm::ImageData;
use image::imageops::FilterType;
use image::DynamicImage;
use std::io::Cursor;
use tracing::debug;

/// Encode an extracted image as a base64 PNG ready for the vision API.
///
/// `detail: "low"` is enough to describe a figure; alt text never needs the
/// fine print.
pub fn encode_image(img: &DynamicImage, max_edge: u32) -> Result<ImageData, image::ImageError> {
    let scaled;
    let img = if img.width() > max_edge || img.height() > max_edge {
        scaled = img.resize(max_edge, max_edge, FilterType::Triangle);
        &scaled
    } else {
        img
    };

    let mut buf = Vec::new();
    img.write_to(&mut Cursor::new(&mut buf), image::ImageFormat::Png)?;

    let b64 = STANDARD.encode(&buf);
    debug!(
        "Encoded {}x{} image → {} bytes base64",
        img.width(),
        img.height(),
        b64.len()
    );

    Ok(ImageData::new(b64, "image/png").with_detail("low"))
}
