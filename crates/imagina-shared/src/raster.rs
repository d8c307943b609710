//! Raster helpers: dimension probing and resizing of stored images.

use std::io::Cursor;

use image::codecs::jpeg::JpegEncoder;
use image::imageops::FilterType;
use image::{DynamicImage, ImageFormat};

use crate::constants::{JPEG_RESIZE_QUALITY, MAX_RESIZE_DIMENSION};
use crate::error::RasterError;
use crate::types::ImageData;

/// Read the pixel dimensions of an encoded image.
pub fn probe_dimensions(image: &ImageData) -> Result<(u32, u32), RasterError> {
    let format = format_for(image)?;
    let reader = image::ImageReader::with_format(Cursor::new(&image.bytes), format);
    Ok(reader.into_dimensions()?)
}

/// Resample to exactly `width` x `height` and re-encode in the source format.
pub fn resize(image: &ImageData, width: u32, height: u32) -> Result<ImageData, RasterError> {
    if width == 0 || height == 0 || width > MAX_RESIZE_DIMENSION || height > MAX_RESIZE_DIMENSION
    {
        return Err(RasterError::InvalidDimensions { width, height });
    }

    let format = format_for(image)?;
    let decoded = image::load_from_memory_with_format(&image.bytes, format)?;
    let resized = decoded.resize_exact(width, height, FilterType::Lanczos3);

    let mut out = Cursor::new(Vec::new());
    match format {
        ImageFormat::Jpeg => {
            // JPEG has no alpha channel
            let rgb = DynamicImage::ImageRgb8(resized.to_rgb8());
            rgb.write_with_encoder(JpegEncoder::new_with_quality(&mut out, JPEG_RESIZE_QUALITY))?;
        }
        ImageFormat::WebP => {
            // the lossless WebP encoder only accepts 8-bit RGB(A)
            DynamicImage::ImageRgba8(resized.to_rgba8()).write_to(&mut out, format)?;
        }
        _ => resized.write_to(&mut out, format)?,
    }

    Ok(ImageData {
        mime_type: image.mime_type.clone(),
        bytes: out.into_inner(),
    })
}

/// Height matching `width` under the original aspect ratio.
pub fn scale_to_width(orig_width: u32, orig_height: u32, width: u32) -> Option<u32> {
    if orig_width == 0 || orig_height == 0 {
        return None;
    }
    let ratio = orig_width as f64 / orig_height as f64;
    Some(((width as f64 / ratio).round() as u32).max(1))
}

/// Width matching `height` under the original aspect ratio.
pub fn scale_to_height(orig_width: u32, orig_height: u32, height: u32) -> Option<u32> {
    if orig_width == 0 || orig_height == 0 {
        return None;
    }
    let ratio = orig_width as f64 / orig_height as f64;
    Some(((height as f64 * ratio).round() as u32).max(1))
}

fn format_for(image: &ImageData) -> Result<ImageFormat, RasterError> {
    let mime = image.mime_type.trim().to_ascii_lowercase();
    let format = match mime.as_str() {
        "image/png" => ImageFormat::Png,
        "image/jpeg" | "image/jpg" => ImageFormat::Jpeg,
        "image/webp" => ImageFormat::WebP,
        // unknown or generic MIME: sniff the magic bytes
        _ => image::guess_format(&image.bytes)
            .map_err(|_| RasterError::UnsupportedFormat(image.mime_type.clone()))?,
    };

    match format {
        ImageFormat::Png | ImageFormat::Jpeg | ImageFormat::WebP => Ok(format),
        other => Err(RasterError::UnsupportedFormat(format!("{other:?}"))),
    }
}
