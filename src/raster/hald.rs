use image::RgbaImage;

use crate::foundation::core::PixelFormat;
use crate::raster::image::RasterImage;

/// Entry count per axis of the identity 3D LUT.
pub const IDENTITY_LUT_SIZE: u32 = 33;

/// Side of the square hald image holding an `n`-entry 3D LUT:
/// `floor(n^1.5) + 1`.
pub fn hald_side(n: u32) -> u32 {
    f64::from(n).powf(1.5) as u32 + 1
}

/// Render the identity 3D LUT as a square hald image.
///
/// Entry `i < n^3` decodes to `r = i % n`, `g = (i / n) % n`,
/// `b = i / n^2`, with channel values spread over 0..=255. The tail
/// pixels past `n^3` are opaque black.
pub fn identity_hald() -> RasterImage {
    let n = IDENTITY_LUT_SIZE;
    let side = hald_side(n);
    let entries = u64::from(n) * u64::from(n) * u64::from(n);
    let step = 255.0 / f64::from(n - 1);

    let mut buf = RgbaImage::new(side, side);
    for (idx, px) in buf.pixels_mut().enumerate() {
        let i = idx as u64;
        if i < entries {
            let r = (i % u64::from(n)) as f64;
            let g = ((i / u64::from(n)) % u64::from(n)) as f64;
            let b = (i / (u64::from(n) * u64::from(n))) as f64;
            px.0 = [
                (r * step).round() as u8,
                (g * step).round() as u8,
                (b * step).round() as u8,
                255,
            ];
        } else {
            px.0 = [0, 0, 0, 255];
        }
    }

    RasterImage::from_rgba(buf, PixelFormat::Rgba8)
}

#[cfg(test)]
#[path = "../../tests/unit/raster/hald.rs"]
mod tests;
