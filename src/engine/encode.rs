//! Image encoding for the vision engine: file or `DynamicImage` → base64 PNG
//! wrapped in `ImageData`.
//!
//! Inputs arrive as jpg/png/bmp/tiff/gif. Everything is decoded and
//! re-encoded as PNG so providers only ever see one lossless format, and
//! oversized scans are scaled down to `MAX_IMAGE_EDGE` on the longest side.

use crate::error::RecognitionError;
use base64::{engine::general_purpose::STANDARD, Engine as _};
use edgequake_llm::ImageData;
use image::{imageops::FilterType, DynamicImage};
use std::io::Cursor;
use std::path::Path;
use tracing::debug;

/// Longest edge sent to a provider, in pixels.
pub const MAX_IMAGE_EDGE: u32 = 2048;

/// Encode an in-memory image as a base64 PNG ready for the VLM API.
///
/// `detail: "high"` keeps small print readable on OpenAI-style tiling.
pub fn encode_image(img: &DynamicImage) -> Result<ImageData, image::ImageError> {
    let mut buf = Vec::new();
    img.write_to(&mut Cursor::new(&mut buf), image::ImageFormat::Png)?;

    let b64 = STANDARD.encode(&buf);
    debug!("Encoded image → {} bytes base64", b64.len());

    Ok(ImageData::new(b64, "image/png").with_detail("high"))
}

/// Decode an image file, cap its size and encode it.
///
/// Blocking; call from `spawn_blocking`.
pub fn encode_image_file(path: &Path) -> Result<ImageData, RecognitionError> {
    let decode_err = |e: image::ImageError| RecognitionError::Decode {
        path: path.to_path_buf(),
        detail: e.to_string(),
    };

    let img = image::open(path).map_err(decode_err)?;
    let img = cap_size(img, MAX_IMAGE_EDGE);
    encode_image(&img).map_err(decode_err)
}

fn cap_size(img: DynamicImage, max_edge: u32) -> DynamicImage {
    if img.width().max(img.height()) <= max_edge {
        return img;
    }
    debug!(
        "Downscaling {}x{} image to fit {} px",
        img.width(),
        img.height(),
        max_edge
    );
    img.resize(max_edge, max_edge, FilterType::Triangle)
}
