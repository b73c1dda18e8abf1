use crate::foundation::error::{StrataError, StrataResult};

pub use kurbo::{Affine, Point, Rect, Vec2};

/// Pixel dimensions of an image or container.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, serde::Serialize, serde::Deserialize)]
pub struct Extent {
    /// Width in pixels.
    pub width: u32,
    /// Height in pixels.
    pub height: u32,
}

impl Extent {
    /// Build a validated non-degenerate extent.
    pub fn new(width: u32, height: u32) -> StrataResult<Self> {
        if width == 0 || height == 0 {
            return Err(StrataError::configuration("Extent sides must be > 0"));
        }
        Ok(Self { width, height })
    }

    /// Whether width >= height.
    pub fn is_landscape(self) -> bool {
        self.width >= self.height
    }

    /// Total pixel count.
    pub fn area(self) -> u64 {
        u64::from(self.width) * u64::from(self.height)
    }

    /// Aspect-preserving fit inside `bounds`. Never upscales; sides stay
    /// at least 1.
    pub fn fit_within(self, bounds: Extent) -> Extent {
        let sx = f64::from(bounds.width) / f64::from(self.width);
        let sy = f64::from(bounds.height) / f64::from(self.height);
        let s = sx.min(sy).min(1.0);
        Extent {
            width: ((f64::from(self.width) * s).round() as u32).max(1),
            height: ((f64::from(self.height) * s).round() as u32).max(1),
        }
    }
}

/// Source channel layout of a raster buffer. Buffers are held as RGBA8
/// internally; the format records whether the source carried alpha, which
/// export encoders consult.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, serde::Serialize, serde::Deserialize)]
pub enum PixelFormat {
    /// Three 8-bit channels, no alpha.
    Rgb8,
    /// Four 8-bit channels, straight alpha.
    #[default]
    Rgba8,
}

/// Straight-alpha RGBA8 color value.
#[derive(Clone, Copy, Debug, PartialEq, Eq, serde::Serialize, serde::Deserialize)]
pub struct Rgba8 {
    /// Red channel.
    pub r: u8,
    /// Green channel.
    pub g: u8,
    /// Blue channel.
    pub b: u8,
    /// Straight alpha channel.
    pub a: u8,
}

impl Rgba8 {
    /// Opaque black, also the out-of-bounds sampling sentinel.
    pub const BLACK: Self = Self { r: 0, g: 0, b: 0, a: 255 };
    /// Opaque white, the default mask and fill color.
    pub const WHITE: Self = Self { r: 255, g: 255, b: 255, a: 255 };
    /// Fully transparent black.
    pub const TRANSPARENT: Self = Self { r: 0, g: 0, b: 0, a: 0 };

    /// Build a color from channel values.
    pub fn new(r: u8, g: u8, b: u8, a: u8) -> Self {
        Self { r, g, b, a }
    }
}

impl From<Rgba8> for image::Rgba<u8> {
    fn from(c: Rgba8) -> Self {
        image::Rgba([c.r, c.g, c.b, c.a])
    }
}

impl From<image::Rgba<u8>> for Rgba8 {
    fn from(p: image::Rgba<u8>) -> Self {
        Self { r: p.0[0], g: p.0[1], b: p.0[2], a: p.0[3] }
    }
}

/// Working resolution selected by the document display-mode flags.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash, serde::Serialize, serde::Deserialize)]
pub enum RenderMode {
    /// Full-size raster pipeline.
    #[default]
    Full,
    /// Bounded-size preview pipeline.
    Thumbnail,
    /// Identity-LUT hald pipeline.
    Hald,
}

/// Explicit composite-cache validity carried by every layer. Set to
/// `Dirty` by any mutation of the layer or a layer below it; cleared by
/// the stack executor after recomputation.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub enum CacheState {
    /// Cached composite containers may be reused.
    Clean,
    /// Containers must be recomputed before use.
    #[default]
    Dirty,
}

/// Working-thumbnail bounds for landscape images.
pub const THUMB_BOX_LANDSCAPE: Extent = Extent { width: 1200, height: 900 };
/// Working-thumbnail bounds for portrait images.
pub const THUMB_BOX_PORTRAIT: Extent = Extent { width: 900, height: 1200 };
/// Export-thumbnail bounds for landscape images.
pub const EXPORT_THUMB_LANDSCAPE: Extent = Extent { width: 160, height: 120 };
/// Export-thumbnail bounds for portrait images.
pub const EXPORT_THUMB_PORTRAIT: Extent = Extent { width: 120, height: 160 };

/// Thumbnail bounds matching the aspect of `source`.
pub fn thumb_box_for(source: Extent) -> Extent {
    if source.is_landscape() {
        THUMB_BOX_LANDSCAPE
    } else {
        THUMB_BOX_PORTRAIT
    }
}

#[cfg(test)]
#[path = "../../tests/unit/foundation/core.rs"]
mod tests;
