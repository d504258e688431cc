use std::io::Cursor;

use image::ImageFormat;

use crate::types::SourceImage;
use crate::{Result, TriptychError};

/// Hard ceiling on the encoded PNG accepted by the image edit endpoint.
pub const EDIT_IMAGE_MAX_BYTES: usize = 4 * 1024 * 1024;

/// Re-encode a source image as PNG, keeping its original pixel dimensions.
///
/// Undecodable input and output over [`EDIT_IMAGE_MAX_BYTES`] are
/// validation failures; neither reaches the network.
pub fn normalize_to_png(source: &SourceImage) -> Result<Vec<u8>> {
    let decoded = image::load_from_memory(&source.data)
        .map_err(|err| TriptychError::Validation(format!("failed to load image: {err}")))?;

    let mut out = Vec::new();
    decoded
        .write_to(&mut Cursor::new(&mut out), ImageFormat::Png)
        .map_err(|err| TriptychError::Validation(format!("failed to convert to png: {err}")))?;

    if out.len() > EDIT_IMAGE_MAX_BYTES {
        return Err(TriptychError::Validation(format!(
            "image too large: encoded png is {} bytes, editing requires images under {} bytes",
            out.len(),
            EDIT_IMAGE_MAX_BYTES
        )));
    }

    tracing::debug!(
        bytes = out.len(),
        width = decoded.width(),
        height = decoded.height(),
        "normalized source image to png"
    );
    Ok(out)
}
