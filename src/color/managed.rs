use std::fmt;

use crate::foundation::error::{StrataError, StrataResult};
use crate::raster::image::RasterImage;

/// Opaque device-to-display transform handle.
///
/// Color management internals live outside the engine; the document only
/// invokes the transform when refreshing the presentation pixmap. The
/// transform is a pure function and is permitted to discard alpha — the
/// engine restores it afterwards.
pub struct ColorTransform {
    func: Box<dyn Fn(&RasterImage) -> RasterImage + Send + Sync>,
}

impl ColorTransform {
    /// Wrap a transform function.
    pub fn new(func: impl Fn(&RasterImage) -> RasterImage + Send + Sync + 'static) -> Self {
        Self { func: Box::new(func) }
    }

    /// Transform that passes pixels through unchanged.
    pub fn identity() -> Self {
        Self::new(|img| img.clone())
    }

    /// Run the transform and restore the source alpha channel exactly.
    /// The transform must preserve dimensions.
    pub fn apply_preserving_alpha(&self, image: &RasterImage) -> StrataResult<RasterImage> {
        let mut out = (self.func)(image);
        if out.extent() != image.extent() {
            return Err(StrataError::configuration(
                "color transform changed image dimensions",
            ));
        }
        let src = image.as_image().as_raw();
        let dst = out.buffer_mut();
        for (d, s) in dst.chunks_exact_mut(4).zip(src.chunks_exact(4)) {
            d[3] = s[3];
        }
        Ok(out)
    }
}

impl fmt::Debug for ColorTransform {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ColorTransform").finish_non_exhaustive()
    }
}

#[cfg(test)]
#[path = "../../tests/unit/color/managed.rs"]
mod tests;
