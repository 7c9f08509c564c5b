use std::collections::BTreeMap;

use base64::Engine;
use image::{imageops::FilterType, DynamicImage, GenericImageView, ImageFormat, RgbaImage};

use super::DiffOutcome;
use crate::core::errors::WcError;

const DEFAULT_MSE_THRESHOLD: f64 = 2.5;

/// Pixel-level image comparison (§4.4 `image`): decode both snapshots,
/// resize to their shared smaller dimensions, overlay per-pixel greyscale
/// deltas in yellow, and gate reporting on the mean squared error against
/// `mse_threshold` (default 2.5). Below threshold the images are treated as
/// unchanged; above it, the overlay is reported as a base64 PNG data URI.
pub fn diff(old_data: &[u8], new_data: &[u8], args: &BTreeMap<String, serde_yaml::Value>) -> Result<DiffOutcome, WcError> {
    let mse_threshold = args
        .get("mse_threshold")
        .and_then(|v| v.as_f64())
        .unwrap_or(DEFAULT_MSE_THRESHOLD);

    let old_image = image::load_from_memory(old_data)
        .map_err(|e| WcError::MalformedJob(0, format!("image differ: failed to decode old snapshot: {e}")))?;
    let new_image = image::load_from_memory(new_data)
        .map_err(|e| WcError::MalformedJob(0, format!("image differ: failed to decode new snapshot: {e}")))?;

    let (old_w, old_h) = old_image.dimensions();
    let (new_w, new_h) = new_image.dimensions();
    let width = old_w.min(new_w);
    let height = old_h.min(new_h);

    let old_grey = image::imageops::resize(&old_image.to_luma8(), width, height, FilterType::Lanczos3);
    let new_grey = image::imageops::resize(&new_image.to_luma8(), width, height, FilterType::Lanczos3);

    let mut overlay = RgbaImage::new(width, height);
    let mut squared_error_sum: f64 = 0.0;
    let pixel_count = (width as u64 * height as u64).max(1);

    for y in 0..height {
        for x in 0..width {
            let old_px = old_grey.get_pixel(x, y).0[0] as f64;
            let new_px = new_grey.get_pixel(x, y).0[0] as f64;
            let delta = old_px - new_px;
            squared_error_sum += delta * delta;

            let pixel = if delta != 0.0 {
                image::Rgba([255, 255, 0, 255])
            } else {
                let grey = new_px as u8;
                image::Rgba([grey, grey, grey, 255])
            };
            overlay.put_pixel(x, y, pixel);
        }
    }

    let mse = squared_error_sum / pixel_count as f64;
    if mse < mse_threshold {
        return Ok(DiffOutcome::NoReport);
    }

    let mut png_bytes = Vec::new();
    DynamicImage::ImageRgba8(overlay)
        .write_to(&mut std::io::Cursor::new(&mut png_bytes), ImageFormat::Png)
        .map_err(|e| WcError::MalformedJob(0, format!("image differ: failed to encode overlay: {e}")))?;
    let encoded = base64::engine::general_purpose::STANDARD.encode(&png_bytes);

    Ok(DiffOutcome::Diff(format!(
        "<img alt=\"image diff (mse={mse:.2})\" src=\"data:image/png;base64,{encoded}\">"
    )))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn encode_png(pixels: &[[u8; 4]], width: u32, height: u32) -> Vec<u8> {
        let mut img = RgbaImage::new(width, height);
        for (i, px) in pixels.iter().enumerate() {
            let x = i as u32 % width;
            let y = i as u32 / width;
            img.put_pixel(x, y, image::Rgba(*px));
        }
        let mut bytes = Vec::new();
        DynamicImage::ImageRgba8(img)
            .write_to(&mut std::io::Cursor::new(&mut bytes), ImageFormat::Png)
            .unwrap();
        bytes
    }

    #[test]
    fn test_identical_images_below_threshold_are_no_report() {
        let solid = [[10, 20, 30, 255]; 4];
        let png = encode_png(&solid, 2, 2);
        let outcome = diff(&png, &png, &BTreeMap::new()).unwrap();
        assert_eq!(outcome, DiffOutcome::NoReport);
    }

    #[test]
    fn test_large_change_produces_data_uri() {
        let black = [[0, 0, 0, 255]; 4];
        let white = [[255, 255, 255, 255]; 4];
        let old_png = encode_png(&black, 2, 2);
        let new_png = encode_png(&white, 2, 2);
        let outcome = diff(&old_png, &new_png, &BTreeMap::new()).unwrap();
        match outcome {
            DiffOutcome::Diff(body) => {
                assert!(body.contains("data:image/png;base64,"));
            }
            other => panic!("expected Diff, got {other:?}"),
        }
    }

    #[test]
    fn test_mse_threshold_override_suppresses_small_change() {
        let black = [[0, 0, 0, 255]; 4];
        let white = [[255, 255, 255, 255]; 4];
        let old_png = encode_png(&black, 2, 2);
        let new_png = encode_png(&white, 2, 2);
        let mut args = BTreeMap::new();
        args.insert(
            "mse_threshold".to_string(),
            serde_yaml::Value::Number(serde_yaml::Number::from(100000)),
        );
        let outcome = diff(&old_png, &new_png, &args).unwrap();
        assert_eq!(outcome, DiffOutcome::NoReport);
    }

    #[test]
    fn test_malformed_image_bytes_is_error() {
        let err = diff(b"not an image", b"not an image either", &BTreeMap::new()).unwrap_err();
        assert!(matches!(err, WcError::MalformedJob(_, _)));
    }
}
