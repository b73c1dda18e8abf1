use crate::color::managed::ColorTransform;
use crate::foundation::core::{Extent, PixelFormat, RenderMode, Rgba8};
use crate::foundation::error::StrataResult;
use crate::raster::image::RasterImage;
use crate::stack::stack::LayerStack;

/// The presentation layer: the final composite as shown to the user.
///
/// Not a stack member — it sits conceptually above the last visible
/// layer, its transform is always identity (it only recomposites), and it
/// is the sole layer whose device pixmap is color-managed.
pub struct Presentation {
    image: RasterImage,
    pixmap: Option<RasterImage>,
}

impl Presentation {
    pub(crate) fn new(extent: Extent) -> Self {
        Self {
            image: RasterImage::new(extent, Rgba8::TRANSPARENT, PixelFormat::Rgba8),
            pixmap: None,
        }
    }

    /// The composited raster at the current working resolution. Not
    /// color managed.
    pub fn image(&self) -> &RasterImage {
        &self.image
    }

    /// The color-managed device pixmap, when a transform is installed.
    pub fn pixmap(&self) -> Option<&RasterImage> {
        self.pixmap.as_ref()
    }

    /// The device-ready image: the color-managed pixmap when present,
    /// the raw composite otherwise.
    pub fn device_image(&self) -> &RasterImage {
        self.pixmap.as_ref().unwrap_or(&self.image)
    }

    /// Displayed pixel color; opaque black outside the image.
    pub fn pixel_or_black(&self, x: i64, y: i64) -> Rgba8 {
        self.image.pixel_or_black(x, y)
    }

    /// Recomposite from the stack's topmost visible layer and rebuild
    /// the device pixmap. The composite is copied out of the stack's
    /// container, so the presentation holds a stable snapshot.
    pub(crate) fn refresh(
        &mut self,
        stack: &mut LayerStack,
        mode: RenderMode,
        transform: Option<&ColorTransform>,
    ) -> StrataResult<()> {
        match stack.top_visible() {
            Some(top) => {
                let composite = stack.composite_up_to(top, mode)?;
                self.image = composite.clone();
            }
            None => {
                self.image.fill(Rgba8::TRANSPARENT);
            }
        }
        self.pixmap = match transform {
            Some(t) => Some(t.apply_preserving_alpha(&self.image)?),
            None => None,
        };
        Ok(())
    }
}

#[cfg(test)]
#[path = "../../tests/unit/document/presentation.rs"]
mod tests;
