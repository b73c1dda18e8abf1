use std::fmt;

use image::RgbaImage;
use image::imageops::{self, FilterType};
use rayon::prelude::*;

use crate::foundation::core::{Extent, PixelFormat, RenderMode, Rgba8, thumb_box_for};
use crate::foundation::error::{StrataError, StrataResult};
use crate::raster::blend::{BlendMode, blend_pixel};
use crate::raster::hald::{hald_side, identity_hald, IDENTITY_LUT_SIZE};

/// Owned 2D pixel buffer with lazily derived views.
///
/// The buffer is straight-alpha RGBA8, contiguous and row-major. Derived
/// caches (working thumbnail, identity hald) are computed on first use and
/// dropped together whenever the owning buffer changes. Geometric
/// operations (`scaled`, `resized`, rotations, `cropped`) always build a
/// new image so caches never leak across resolution domains.
pub struct RasterImage {
    buf: RgbaImage,
    format: PixelFormat,
    thumbnail: Option<Box<RasterImage>>,
    hald: Option<Box<RasterImage>>,
}

impl Clone for RasterImage {
    fn clone(&self) -> Self {
        // Derived caches are cheap to rebuild and stay with the original.
        Self {
            buf: self.buf.clone(),
            format: self.format,
            thumbnail: None,
            hald: None,
        }
    }
}

impl fmt::Debug for RasterImage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("RasterImage")
            .field("width", &self.buf.width())
            .field("height", &self.buf.height())
            .field("format", &self.format)
            .finish()
    }
}

impl RasterImage {
    /// Build a solid-color image.
    pub fn new(extent: Extent, fill: Rgba8, format: PixelFormat) -> Self {
        Self {
            buf: RgbaImage::from_pixel(extent.width, extent.height, fill.into()),
            format,
            thumbnail: None,
            hald: None,
        }
    }

    /// Wrap an existing RGBA8 buffer.
    pub fn from_buffer(buf: RgbaImage, format: PixelFormat) -> StrataResult<Self> {
        if buf.width() == 0 || buf.height() == 0 {
            return Err(StrataError::configuration(
                "raster buffer sides must be > 0",
            ));
        }
        Ok(Self { buf, format, thumbnail: None, hald: None })
    }

    pub(crate) fn from_rgba(buf: RgbaImage, format: PixelFormat) -> Self {
        Self { buf, format, thumbnail: None, hald: None }
    }

    /// Width in pixels.
    pub fn width(&self) -> u32 {
        self.buf.width()
    }

    /// Height in pixels.
    pub fn height(&self) -> u32 {
        self.buf.height()
    }

    /// Pixel dimensions.
    pub fn extent(&self) -> Extent {
        Extent { width: self.buf.width(), height: self.buf.height() }
    }

    /// Source channel layout.
    pub fn format(&self) -> PixelFormat {
        self.format
    }

    /// Borrow the underlying buffer.
    pub fn as_image(&self) -> &RgbaImage {
        &self.buf
    }

    /// Mutable access to the underlying buffer. Derived caches are
    /// invalidated up front since the caller is about to change pixels.
    pub fn buffer_mut(&mut self) -> &mut RgbaImage {
        self.invalidate_caches();
        &mut self.buf
    }

    /// Drop the derived caches. Must be called after any buffer mutation
    /// that bypasses [`RasterImage::buffer_mut`].
    pub fn invalidate_caches(&mut self) {
        self.thumbnail = None;
        self.hald = None;
    }

    /// Fill with a solid color.
    pub fn fill(&mut self, color: Rgba8) {
        self.invalidate_caches();
        let px: image::Rgba<u8> = color.into();
        for p in self.buf.pixels_mut() {
            *p = px;
        }
    }

    /// Pixel at `(x, y)`, if in bounds.
    pub fn try_pixel(&self, x: u32, y: u32) -> Option<Rgba8> {
        if x < self.buf.width() && y < self.buf.height() {
            Some((*self.buf.get_pixel(x, y)).into())
        } else {
            None
        }
    }

    /// Pixel at `(x, y)`; coordinates outside the image yield opaque
    /// black rather than an error.
    pub fn pixel_or_black(&self, x: i64, y: i64) -> Rgba8 {
        let (Ok(x), Ok(y)) = (u32::try_from(x), u32::try_from(y)) else {
            return Rgba8::BLACK;
        };
        self.try_pixel(x, y).unwrap_or(Rgba8::BLACK)
    }

    /// Write one pixel.
    pub fn put_pixel(&mut self, x: u32, y: u32, color: Rgba8) -> StrataResult<()> {
        if x >= self.buf.width() || y >= self.buf.height() {
            return Err(StrataError::configuration(format!(
                "pixel ({x}, {y}) outside {}x{}",
                self.buf.width(),
                self.buf.height()
            )));
        }
        self.invalidate_caches();
        self.buf.put_pixel(x, y, color.into());
        Ok(())
    }

    /// The extent the image renders at under `mode`.
    pub fn current_extent(&self, mode: RenderMode) -> Extent {
        match mode {
            RenderMode::Full => self.extent(),
            RenderMode::Thumbnail => self.extent().fit_within(thumb_box_for(self.extent())),
            RenderMode::Hald => {
                let side = hald_side(IDENTITY_LUT_SIZE);
                Extent { width: side, height: side }
            }
        }
    }

    /// Working thumbnail, computed on first use.
    pub fn thumbnail(&mut self) -> &RasterImage {
        if self.thumbnail.is_none() {
            let target = self.extent().fit_within(thumb_box_for(self.extent()));
            let scaled = self.scaled(target);
            self.thumbnail = Some(Box::new(scaled));
        }
        match &self.thumbnail {
            Some(t) => t,
            None => self,
        }
    }

    /// Identity-LUT hald image, computed on first use.
    pub fn hald(&mut self) -> &RasterImage {
        if self.hald.is_none() {
            self.hald = Some(Box::new(identity_hald()));
        }
        match &self.hald {
            Some(h) => h,
            None => self,
        }
    }

    /// Image for the given working resolution, lazily deriving the
    /// thumbnail or hald view.
    pub fn current(&mut self, mode: RenderMode) -> &RasterImage {
        match mode {
            RenderMode::Full => self,
            RenderMode::Thumbnail => self.thumbnail(),
            RenderMode::Hald => self.hald(),
        }
    }

    /// Cached view for `mode` without computing it. `Full` always
    /// resolves; the derived views resolve only after a
    /// [`RasterImage::current`] call.
    pub fn current_cached(&self, mode: RenderMode) -> Option<&RasterImage> {
        match mode {
            RenderMode::Full => Some(self),
            RenderMode::Thumbnail => self.thumbnail.as_deref(),
            RenderMode::Hald => self.hald.as_deref(),
        }
    }

    /// Mutable image for the given working resolution. Writing the full
    /// raster invalidates its derived views; writing a derived view
    /// leaves the full raster untouched.
    pub fn current_mut(&mut self, mode: RenderMode) -> StrataResult<&mut RasterImage> {
        match mode {
            RenderMode::Full => {
                self.invalidate_caches();
                Ok(self)
            }
            RenderMode::Thumbnail => {
                self.thumbnail();
                self.thumbnail
                    .as_deref_mut()
                    .ok_or_else(|| StrataError::configuration("thumbnail view unavailable"))
            }
            RenderMode::Hald => {
                self.hald();
                self.hald
                    .as_deref_mut()
                    .ok_or_else(|| StrataError::configuration("hald view unavailable"))
            }
        }
    }

    /// Aspect-agnostic rescale (Triangle filter), as used for preview
    /// surfaces.
    pub fn scaled(&self, extent: Extent) -> RasterImage {
        let buf = imageops::resize(&self.buf, extent.width, extent.height, FilterType::Triangle);
        Self { buf, format: self.format, thumbnail: None, hald: None }
    }

    /// Geometric resize (Catmull-Rom filter). Always a new image.
    pub fn resized(&self, extent: Extent) -> RasterImage {
        let buf = imageops::resize(&self.buf, extent.width, extent.height, FilterType::CatmullRom);
        Self { buf, format: self.format, thumbnail: None, hald: None }
    }

    /// Quarter-turn clockwise rotation. Always a new image.
    pub fn rotated90(&self) -> RasterImage {
        Self {
            buf: imageops::rotate90(&self.buf),
            format: self.format,
            thumbnail: None,
            hald: None,
        }
    }

    /// Half-turn rotation. Always a new image.
    pub fn rotated180(&self) -> RasterImage {
        Self {
            buf: imageops::rotate180(&self.buf),
            format: self.format,
            thumbnail: None,
            hald: None,
        }
    }

    /// Quarter-turn counter-clockwise rotation. Always a new image.
    pub fn rotated270(&self) -> RasterImage {
        Self {
            buf: imageops::rotate270(&self.buf),
            format: self.format,
            thumbnail: None,
            hald: None,
        }
    }

    /// Copy of the `extent`-sized region at `(x, y)`.
    pub fn cropped(&self, x: u32, y: u32, extent: Extent) -> StrataResult<RasterImage> {
        if x.saturating_add(extent.width) > self.buf.width()
            || y.saturating_add(extent.height) > self.buf.height()
        {
            return Err(StrataError::configuration(format!(
                "crop {}x{}+{x}+{y} outside {}x{}",
                extent.width,
                extent.height,
                self.buf.width(),
                self.buf.height()
            )));
        }
        let buf = imageops::crop_imm(&self.buf, x, y, extent.width, extent.height).to_image();
        Ok(Self { buf, format: self.format, thumbnail: None, hald: None })
    }

    /// Replace-paint `src` over the whole surface, ignoring destination
    /// content and alpha. Sources of a different size are rescaled.
    pub fn replace_with(&mut self, src: &RasterImage) {
        self.invalidate_caches();
        if src.extent() == self.extent() {
            self.buf.copy_from_slice(src.buf.as_raw());
        } else {
            let scaled = src.scaled(self.extent());
            self.buf.copy_from_slice(scaled.buf.as_raw());
        }
    }

    /// Paint `src` over the whole surface with the given opacity and
    /// blend mode. Sources of a different size are rescaled first.
    /// Row-parallel.
    pub fn draw_over(&mut self, src: &RasterImage, opacity: f32, mode: BlendMode) {
        self.invalidate_caches();
        let extent = self.extent();
        let scaled;
        let src_buf = if src.extent() == extent {
            &src.buf
        } else {
            scaled = src.scaled(extent);
            &scaled.buf
        };

        let row = extent.width as usize * 4;
        let dst: &mut [u8] = &mut self.buf;
        dst.par_chunks_mut(row)
            .zip(src_buf.as_raw().par_chunks(row))
            .for_each(|(drow, srow)| {
                for (d, s) in drow.chunks_exact_mut(4).zip(srow.chunks_exact(4)) {
                    let out = blend_pixel(
                        Rgba8::new(d[0], d[1], d[2], d[3]),
                        Rgba8::new(s[0], s[1], s[2], s[3]),
                        mode,
                        opacity,
                    );
                    d[0] = out.r;
                    d[1] = out.g;
                    d[2] = out.b;
                    d[3] = out.a;
                }
            });
    }

    /// Destination-in masking: keep destination pixels where the mask
    /// alpha says keep, erase elsewhere. Masks of a different size are
    /// rescaled first. Row-parallel.
    pub fn apply_opacity_mask(&mut self, mask: &RasterImage) {
        self.invalidate_caches();
        let extent = self.extent();
        let scaled;
        let mask_buf = if mask.extent() == extent {
            &mask.buf
        } else {
            scaled = mask.scaled(extent);
            &scaled.buf
        };

        let row = extent.width as usize * 4;
        let dst: &mut [u8] = &mut self.buf;
        dst.par_chunks_mut(row)
            .zip(mask_buf.as_raw().par_chunks(row))
            .for_each(|(drow, mrow)| {
                for (d, m) in drow.chunks_exact_mut(4).zip(mrow.chunks_exact(4)) {
                    d[3] = ((u16::from(d[3]) * u16::from(m[3]) + 127) / 255) as u8;
                }
            });
    }

    /// Display aid: paint the mask colors over the image at half
    /// strength, so a selected mask reads as a color overlay instead of
    /// an opacity cut.
    pub fn overlay_mask_color(&mut self, mask: &RasterImage) {
        self.invalidate_caches();
        let extent = self.extent();
        let scaled;
        let mask_buf = if mask.extent() == extent {
            &mask.buf
        } else {
            scaled = mask.scaled(extent);
            &scaled.buf
        };

        let row = extent.width as usize * 4;
        let dst: &mut [u8] = &mut self.buf;
        dst.par_chunks_mut(row)
            .zip(mask_buf.as_raw().par_chunks(row))
            .for_each(|(drow, mrow)| {
                for (d, m) in drow.chunks_exact_mut(4).zip(mrow.chunks_exact(4)) {
                    let out = blend_pixel(
                        Rgba8::new(d[0], d[1], d[2], d[3]),
                        Rgba8::new(m[0], m[1], m[2], 128),
                        BlendMode::Normal,
                        1.0,
                    );
                    d[0] = out.r;
                    d[1] = out.g;
                    d[2] = out.b;
                    d[3] = out.a;
                }
            });
    }
}

#[cfg(test)]
#[path = "../../tests/unit/raster/image.rs"]
mod tests;
