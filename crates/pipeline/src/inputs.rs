//! Input image staging.
//!
//! Images are decoded and re-encoded as PNG under the fixed names the
//! workflow templates' `LoadImage` nodes reference.

use std::path::{Path, PathBuf};

use styler_core::error::CoreError;

/// File name the templates load the style image from.
pub const STYLE_IMAGE_NAME: &str = "image.png";
/// File name the structure template loads the structure image from.
pub const STRUCTURE_IMAGE_NAME: &str = "structure.png";

/// Decode `source` and write it as PNG to `input_dir/name`.
pub async fn stage_image(source: &Path, input_dir: &Path, name: &str) -> Result<PathBuf, CoreError> {
    let source = source.to_path_buf();
    let dest = input_dir.join(name);
    let target = dest.clone();

    tokio::task::spawn_blocking(move || reencode_png(&source, &target))
        .await
        .map_err(|e| CoreError::Internal(format!("Image staging task failed: {e}")))??;

    tracing::debug!(path = %dest.display(), "Input image staged");
    Ok(dest)
}

fn reencode_png(source: &Path, dest: &Path) -> Result<(), CoreError> {
    let img = image::ImageReader::open(source)?
        .with_guessed_format()?
        .decode()
        .map_err(|e| {
            CoreError::Validation(format!("Cannot decode image {}: {e}", source.display()))
        })?;

    img.save_with_format(dest, image::ImageFormat::Png)
        .map_err(|e| CoreError::Image(format!("Cannot write {}: {e}", dest.display())))
}
