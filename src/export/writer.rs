use std::fs::File;
use std::io::BufWriter;
use std::path::Path;

use image::ImageEncoder;
use image::codecs::jpeg::JpegEncoder;
use image::codecs::png::{CompressionType, FilterType as PngFilterType, PngEncoder};
use image::codecs::tiff::TiffEncoder;

use crate::foundation::core::{
    EXPORT_THUMB_LANDSCAPE, EXPORT_THUMB_PORTRAIT, Extent,
};
use crate::foundation::error::{StrataError, StrataResult};
use crate::raster::image::RasterImage;

/// Raster output format, derived from the target file extension.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum ExportFormat {
    /// JPEG with quality 0..=100. Alpha is dropped.
    Jpeg {
        /// Encoder quality, 0..=100.
        quality: u8,
    },
    /// PNG with compression level 0..=9.
    Png {
        /// Compression level, 0..=9.
        compression: u8,
    },
    /// Uncompressed RGB TIFF. Alpha is dropped.
    Tiff,
}

impl ExportFormat {
    /// Pick the format from the extension of `path`. Anything outside
    /// the supported set is an [`StrataError::Io`].
    pub fn from_path(path: &Path, quality: u8, compression: u8) -> StrataResult<Self> {
        let ext = path
            .extension()
            .and_then(|e| e.to_str())
            .map(str::to_ascii_lowercase)
            .unwrap_or_default();
        match ext.as_str() {
            "jpg" | "jpeg" => Ok(Self::Jpeg { quality: quality.min(100) }),
            "png" => Ok(Self::Png { compression: compression.min(9) }),
            "tif" | "tiff" => Ok(Self::Tiff),
            _ => Err(StrataError::io(
                "invalid file format: valid formats are jpg, png, tif",
            )),
        }
    }
}

/// Write `image` to `path`, cropping first when a crop rectangle is
/// given, and return a thumbnail bounded to 160x120 or 120x160 depending
/// on the written image's aspect. Write failures propagate as
/// [`StrataError::Io`].
pub fn write_composite(
    image: &RasterImage,
    path: &Path,
    format: ExportFormat,
    crop: Option<kurbo::Rect>,
) -> StrataResult<RasterImage> {
    let cropped;
    let img = match crop {
        Some(rect) => {
            cropped = crop_to(image, rect)?;
            &cropped
        }
        None => image,
    };

    let file = File::create(path).map_err(|e| {
        StrataError::io(format!("cannot write file {}: {e}", path.display()))
    })?;
    let mut out = BufWriter::new(file);
    let extent = img.extent();

    let written = match format {
        ExportFormat::Jpeg { quality } => {
            let rgb = image::DynamicImage::ImageRgba8(img.as_image().clone()).to_rgb8();
            JpegEncoder::new_with_quality(&mut out, quality.min(100)).write_image(
                rgb.as_raw(),
                extent.width,
                extent.height,
                image::ExtendedColorType::Rgb8,
            )
        }
        ExportFormat::Png { compression } => {
            let level = match compression {
                0..=3 => CompressionType::Fast,
                4..=6 => CompressionType::Default,
                _ => CompressionType::Best,
            };
            PngEncoder::new_with_quality(&mut out, level, PngFilterType::Adaptive).write_image(
                img.as_image().as_raw(),
                extent.width,
                extent.height,
                image::ExtendedColorType::Rgba8,
            )
        }
        ExportFormat::Tiff => {
            let rgb = image::DynamicImage::ImageRgba8(img.as_image().clone()).to_rgb8();
            TiffEncoder::new(&mut out).write_image(
                rgb.as_raw(),
                extent.width,
                extent.height,
                image::ExtendedColorType::Rgb8,
            )
        }
    };
    written.map_err(|e| StrataError::io(format!("cannot write file {}: {e}", path.display())))?;

    let bounds = if extent.is_landscape() {
        EXPORT_THUMB_LANDSCAPE
    } else {
        EXPORT_THUMB_PORTRAIT
    };
    Ok(img.scaled(extent.fit_within(bounds)))
}

fn crop_to(image: &RasterImage, rect: kurbo::Rect) -> StrataResult<RasterImage> {
    let extent = image.extent();
    let x0 = rect.x0.max(0.0).floor() as u32;
    let y0 = rect.y0.max(0.0).floor() as u32;
    let x1 = (rect.x1.ceil() as u32).min(extent.width);
    let y1 = (rect.y1.ceil() as u32).min(extent.height);
    if x1 <= x0 || y1 <= y0 {
        return Err(StrataError::configuration(format!(
            "empty crop rectangle {rect:?}"
        )));
    }
    image.cropped(x0, y0, Extent { width: x1 - x0, height: y1 - y0 })
}

#[cfg(test)]
#[path = "../../tests/unit/export/writer.rs"]
mod tests;
