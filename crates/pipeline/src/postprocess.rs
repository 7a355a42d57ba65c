//! Output re-encoding into the requested format and quality.

use std::fs::File;
use std::io::{BufWriter, Write};
use std::path::{Path, PathBuf};

use image::codecs::jpeg::JpegEncoder;
use image::{DynamicImage, ImageFormat};
use styler_core::error::CoreError;
use styler_core::params::{OutputFormat, MAX_OUTPUT_QUALITY};

use crate::outputs::OutputFile;

/// Extensions that are decoded and re-encoded; anything else passes through.
const REENCODED_EXTENSIONS: [&str; 3] = ["jpg", "jpeg", "png"];

/// Whether a pass over the outputs is needed at all.
pub fn needs_postprocessing(format: OutputFormat, quality: u8) -> bool {
    quality < MAX_OUTPUT_QUALITY || format.is_compressed()
}

/// Re-encode image outputs to `{stem}.{format}`.
///
/// Returns the same number of files in the same order. JPEG and WebP are
/// written lossy at `quality`; PNG stays lossless.
pub async fn postprocess(
    files: Vec<OutputFile>,
    format: OutputFormat,
    quality: u8,
) -> Result<Vec<OutputFile>, CoreError> {
    if !needs_postprocessing(format, quality) {
        return Ok(files);
    }

    tokio::task::spawn_blocking(move || {
        files
            .into_iter()
            .map(|file| postprocess_one(file, format, quality))
            .collect::<Result<Vec<_>, CoreError>>()
    })
    .await
    .map_err(|e| CoreError::Internal(format!("Post-processing task failed: {e}")))?
}

fn postprocess_one(
    file: OutputFile,
    format: OutputFormat,
    quality: u8,
) -> Result<OutputFile, CoreError> {
    let reencode = file.path.is_file()
        && file
            .extension()
            .is_some_and(|ext| REENCODED_EXTENSIONS.contains(&ext.as_str()));
    if !reencode {
        return Ok(file);
    }

    let img = image::open(&file.path).map_err(|e| {
        CoreError::Image(format!("Cannot decode output {}: {e}", file.path.display()))
    })?;
    let dest: PathBuf = file.path.with_extension(format.extension());
    encode(&img, &dest, format, quality)?;

    tracing::debug!(
        source = %file.path.display(),
        dest = %dest.display(),
        %format,
        quality,
        "Output re-encoded",
    );
    Ok(OutputFile::new(dest))
}

fn encode(img: &DynamicImage, dest: &Path, format: OutputFormat, quality: u8) -> Result<(), CoreError> {
    let image_err = |e: image::ImageError| {
        CoreError::Image(format!("Cannot encode {}: {e}", dest.display()))
    };

    match format {
        OutputFormat::Jpg => {
            let mut writer = BufWriter::new(File::create(dest)?);
            JpegEncoder::new_with_quality(&mut writer, quality.max(1))
                .encode_image(&img.to_rgb8())
                .map_err(image_err)?;
            writer.flush()?;
            Ok(())
        }
        OutputFormat::Png => img.save_with_format(dest, ImageFormat::Png).map_err(image_err),
        OutputFormat::Webp => {
            let rgba = DynamicImage::ImageRgba8(img.to_rgba8());
            let encoder = webp::Encoder::from_image(&rgba).map_err(|e| {
                CoreError::Image(format!("Cannot encode {}: {e}", dest.display()))
            })?;
            let encoded = encoder.encode(f32::from(quality));
            std::fs::write(dest, &*encoded)?;
            Ok(())
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn write_png(path: &Path) {
        image::RgbImage::from_pixel(8, 8, image::Rgb([10, 120, 200]))
            .save_with_format(path, ImageFormat::Png)
            .unwrap();
    }

    /// Busy enough that lossy quality settings produce different sizes.
    fn write_detailed_png(path: &Path) {
        image::RgbImage::from_fn(128, 128, |x, y| {
            image::Rgb([
                (x * 7 + y * 13) as u8,
                (x * x + y * 3) as u8,
                (x ^ y).wrapping_mul(5) as u8,
            ])
        })
        .save_with_format(path, ImageFormat::Png)
        .unwrap();
    }

    async fn encoded_len(format: OutputFormat, quality: u8) -> u64 {
        let dir = tempfile::tempdir().unwrap();
        let png = dir.path().join("out.png");
        write_detailed_png(&png);
        let out = postprocess(vec![OutputFile::new(png)], format, quality)
            .await
            .unwrap();
        std::fs::metadata(&out[0].path).unwrap().len()
    }

    #[test]
    fn png_at_full_quality_skips_the_pass() {
        assert!(!needs_postprocessing(OutputFormat::Png, 100));
        assert!(needs_postprocessing(OutputFormat::Png, 99));
        assert!(needs_postprocessing(OutputFormat::Webp, 100));
        assert!(needs_postprocessing(OutputFormat::Jpg, 100));
    }

    #[tokio::test]
    async fn skipped_pass_returns_input_unchanged() {
        let files = vec![OutputFile::new("/nonexistent/a.png".into())];
        let out = postprocess(files.clone(), OutputFormat::Png, 100).await.unwrap();
        assert_eq!(out, files);
    }

    #[tokio::test]
    async fn png_becomes_jpg_and_other_files_pass_through() {
        let dir = tempfile::tempdir().unwrap();
        let png = dir.path().join("out_00001_.png");
        write_png(&png);
        let txt = dir.path().join("notes.txt");
        std::fs::write(&txt, b"hello").unwrap();

        let files = vec![OutputFile::new(png), OutputFile::new(txt.clone())];
        let out = postprocess(files, OutputFormat::Jpg, 80).await.unwrap();

        assert_eq!(out.len(), 2);
        assert_eq!(out[0].path, dir.path().join("out_00001_.jpg"));
        assert_eq!(out[0].media_type, "image/jpeg");
        assert_eq!(image::image_dimensions(&out[0].path).unwrap(), (8, 8));
        assert_eq!(out[1].path, txt);
    }

    #[tokio::test]
    async fn jpeg_becomes_webp() {
        let dir = tempfile::tempdir().unwrap();
        let jpeg = dir.path().join("a.jpeg");
        image::RgbImage::from_pixel(5, 7, image::Rgb([1, 2, 3]))
            .save_with_format(&jpeg, ImageFormat::Jpeg)
            .unwrap();

        let out = postprocess(vec![OutputFile::new(jpeg)], OutputFormat::Webp, 80)
            .await
            .unwrap();

        assert_eq!(out[0].path, dir.path().join("a.webp"));
        assert_eq!(image::image_dimensions(&out[0].path).unwrap(), (5, 7));
    }

    #[tokio::test]
    async fn webp_output_follows_quality() {
        let low = encoded_len(OutputFormat::Webp, 10).await;
        let high = encoded_len(OutputFormat::Webp, 90).await;
        assert!(low < high, "quality 10 gave {low} bytes, quality 90 gave {high}");
    }

    #[tokio::test]
    async fn jpeg_output_follows_quality() {
        let low = encoded_len(OutputFormat::Jpg, 10).await;
        let high = encoded_len(OutputFormat::Jpg, 90).await;
        assert!(low < high, "quality 10 gave {low} bytes, quality 90 gave {high}");
    }

    #[tokio::test]
    async fn png_rewritten_in_place_below_full_quality() {
        let dir = tempfile::tempdir().unwrap();
        let png = dir.path().join("a.png");
        write_png(&png);

        let out = postprocess(vec![OutputFile::new(png.clone())], OutputFormat::Png, 50)
            .await
            .unwrap();
        assert_eq!(out[0].path, png);
    }
}
