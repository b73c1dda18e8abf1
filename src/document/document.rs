use std::path::Path;

use crate::color::managed::ColorTransform;
use crate::document::presentation::Presentation;
use crate::document::script::StackScript;
use crate::export::writer::{self, ExportFormat};
use crate::foundation::core::{Extent, RenderMode, Rgba8, thumb_box_for};
use crate::foundation::error::{StrataError, StrataResult};
use crate::raster::blend::BlendMode;
use crate::raster::image::RasterImage;
use crate::stack::compositor;
use crate::stack::executor;
use crate::stack::layer::{
    AdjustmentKernel, AdjustmentKind, InputSource, Layer, LayerRole, SEG_MASK_UNMARKED,
};
use crate::stack::stack::LayerStack;

/// Fill behind transparent pixels when flattening visible layers.
pub const DEFAULT_BG_COLOR: Rgba8 = Rgba8 { r: 191, g: 191, b: 191, a: 255 };

/// An editable multi-layer image document.
///
/// Owns the layer stack, the presentation layer, and the document-wide
/// display-mode flags. All edits flow through the document so that cache
/// invalidation and stack re-execution stay consistent: mutate layer
/// state via [`Document::edit_layer`] / [`Document::edit_mask`], then
/// propagate with [`Document::apply_from`].
pub struct Document {
    stack: LayerStack,
    presentation: Presentation,
    extent: Extent,
    use_thumbnail: bool,
    use_hald: bool,
    color_transform: Option<ColorTransform>,
    modified: bool,
    executing: bool,
}

impl Document {
    /// Build a document around `background`. The background layer sits
    /// permanently at stack position 0 with its clipping flag set, and
    /// the presentation is composited immediately.
    pub fn new(background: RasterImage) -> StrataResult<Self> {
        let extent = background.extent();
        let mut bg = Layer::new(background, LayerRole::Background);
        bg.set_clipping(true);
        bg.set_action_id("background");
        let stack = LayerStack::new(bg, "Background")?;
        let mut doc = Self {
            stack,
            presentation: Presentation::new(extent),
            extent,
            use_thumbnail: false,
            use_hald: false,
            color_transform: None,
            modified: false,
            executing: false,
        };
        doc.apply_from(0)?;
        doc.modified = false;
        Ok(doc)
    }

    /// Full-resolution document extent, shared by every layer.
    pub fn extent(&self) -> Extent {
        self.extent
    }

    /// The layer stack.
    pub fn stack(&self) -> &LayerStack {
        &self.stack
    }

    /// The presentation layer.
    pub fn presentation(&self) -> &Presentation {
        &self.presentation
    }

    /// Whether the document changed since the last reset.
    pub fn is_modified(&self) -> bool {
        self.modified
    }

    /// Reset or set the modified flag.
    pub fn set_modified(&mut self, modified: bool) {
        self.modified = modified;
    }

    /// Whether the thumbnail (preview) pipeline is active.
    pub fn use_thumbnail(&self) -> bool {
        self.use_thumbnail
    }

    /// Whether the identity-LUT hald pipeline is active.
    pub fn use_hald(&self) -> bool {
        self.use_hald
    }

    /// Working resolution implied by the display-mode flags.
    pub fn render_mode(&self) -> RenderMode {
        if self.use_hald {
            RenderMode::Hald
        } else if self.use_thumbnail {
            RenderMode::Thumbnail
        } else {
            RenderMode::Full
        }
    }

    /// Install or remove the device color transform and rebuild the
    /// presentation pixmap.
    pub fn set_color_transform(&mut self, transform: Option<ColorTransform>) -> StrataResult<()> {
        self.color_transform = transform;
        let mode = self.render_mode();
        self.presentation
            .refresh(&mut self.stack, mode, self.color_transform.as_ref())
    }

    /// Index of the active layer.
    pub fn active_index(&self) -> usize {
        self.stack.active_index()
    }

    /// Select the active layer.
    pub fn set_active_layer(&mut self, index: usize) -> StrataResult<()> {
        self.stack.set_active(index)
    }

    /// Borrow the active layer.
    pub fn active_layer(&self) -> StrataResult<&Layer> {
        self.stack.active_layer()
    }

    /// Mutate the layer at `index`. The layer and everything above it
    /// are invalidated; call [`Document::apply_from`] afterwards to
    /// propagate.
    pub fn edit_layer<R>(
        &mut self,
        index: usize,
        f: impl FnOnce(&mut Layer) -> R,
    ) -> StrataResult<R> {
        let layer = self.stack.layer_mut(index)?;
        let out = f(layer);
        self.modified = true;
        Ok(out)
    }

    /// Mutate the mask of the layer at `index`. When the layer is
    /// grouped, the change is visible through every group member.
    pub fn edit_mask<R>(
        &mut self,
        index: usize,
        f: impl FnOnce(&mut RasterImage) -> R,
    ) -> StrataResult<R> {
        let mask = self.stack.mask_mut(index)?;
        let out = f(mask);
        self.modified = true;
        Ok(out)
    }

    /// Add a plain image layer. A missing `image` means a white layer of
    /// the document extent. Inserts above the active layer unless an
    /// index is given; the new layer becomes active.
    pub fn add_layer(
        &mut self,
        image: Option<RasterImage>,
        name: &str,
        index: Option<usize>,
    ) -> StrataResult<usize> {
        let image = match image {
            Some(img) => img,
            None => RasterImage::new(
                self.extent,
                Rgba8::WHITE,
                crate::foundation::core::PixelFormat::Rgba8,
            ),
        };
        let layer = Layer::new(image, LayerRole::Image);
        let index = self.stack.insert(layer, name, index)?;
        self.modified = true;
        Ok(index)
    }

    /// Add an adjustment layer above the layer at `index` (default: the
    /// active layer). The new layer starts from a copy of that layer's
    /// raster and joins its mask group when it has one.
    pub fn add_adjustment_layer(
        &mut self,
        name: &str,
        kind: AdjustmentKind,
        kernel: Box<dyn AdjustmentKernel + Send>,
        index: Option<usize>,
    ) -> StrataResult<usize> {
        let base_index = index.unwrap_or_else(|| self.stack.active_index());
        let base = self.stack.layer(base_index)?;
        let image = base.image().clone();
        let base_mask = base.mask_id();
        let base_grouped = match base_mask {
            Some(id) => self.stack.arena().is_shared(id),
            None => false,
        };

        let mut layer = Layer::new(image, LayerRole::Adjustment(kind));
        layer.set_kernel(kernel);
        let new_index = self.stack.insert(layer, name, Some(base_index + 1))?;

        if base_grouped && let Some(base_id) = base_mask {
            let fresh = self.stack.layer(new_index)?.mask_id();
            self.stack.arena_mut().acquire(base_id)?;
            if let Some(fresh_id) = fresh {
                self.stack.arena_mut().release(fresh_id)?;
            }
            let layer = self.stack.layer_mut(new_index)?;
            layer.set_mask_id(Some(base_id));
            layer.set_mask_enabled(true);
        }

        self.modified = true;
        Ok(new_index)
    }

    /// Add an image-source layer whose input is the externally supplied
    /// `source`, rescaled to the working resolution.
    pub fn add_image_layer(
        &mut self,
        name: &str,
        source: RasterImage,
        index: Option<usize>,
    ) -> StrataResult<usize> {
        let base_index = index.unwrap_or_else(|| self.stack.active_index());
        let image = self.stack.layer(base_index)?.image().clone();
        let layer = Layer::with_source(image, source);
        let new_index = self.stack.insert(layer, name, Some(base_index + 1))?;
        self.modified = true;
        Ok(new_index)
    }

    /// Add a segmentation layer above the layer at `index` (default: the
    /// active layer). Its mask starts enabled and selected, filled with
    /// the unmarked color until pixels are painted as foreground or
    /// background.
    pub fn add_segmentation_layer(
        &mut self,
        name: &str,
        index: Option<usize>,
    ) -> StrataResult<usize> {
        let base_index = index.unwrap_or_else(|| self.stack.active_index());
        let image = self.stack.layer(base_index)?.image().clone();
        let mut layer = Layer::new(image, LayerRole::Segmentation);
        layer.set_mask_enabled(true);
        layer.set_mask_selected(true);
        let new_index = self.stack.insert(layer, name, Some(base_index + 1))?;
        self.stack.mask_mut(new_index)?.fill(SEG_MASK_UNMARKED);
        self.modified = true;
        Ok(new_index)
    }

    /// Duplicate the layer at `index` (default: top of stack) right
    /// above itself. Adjustment layers are not duplicated.
    pub fn dup_layer(&mut self, index: Option<usize>) -> StrataResult<usize> {
        let index = match index {
            Some(i) => i,
            None => self.stack.len().saturating_sub(1),
        };
        let original = self.stack.layer(index)?;
        if original.role().is_adjustment() {
            return Err(StrataError::invalid_operation(
                "adjustment layers cannot be duplicated",
            ));
        }
        let name = original.name().to_owned();
        let image = original.image().clone();
        let layer = Layer::new(image, LayerRole::Image);
        let new_index = self.stack.insert(layer, &name, Some(index + 1))?;
        self.modified = true;
        Ok(new_index)
    }

    /// Remove and return the layer at `index`. The background layer is
    /// only destroyed with the document itself.
    pub fn remove_layer(&mut self, index: usize) -> StrataResult<Layer> {
        if self.stack.layer(index)?.role() == LayerRole::Background {
            return Err(StrataError::invalid_operation(
                "the background layer cannot be removed",
            ));
        }
        let layer = self.stack.remove(index)?;
        self.modified = true;
        Ok(layer)
    }

    /// Merge the layer at `index` into the next lower visible layer.
    ///
    /// Rejected, leaving the stack untouched, when the target is an
    /// adjustment layer or while the thumbnail pipeline is active.
    pub fn merge_down(&mut self, index: usize) -> StrataResult<()> {
        let target_index = self.stack.lower_visible_below(index).ok_or_else(|| {
            StrataError::invalid_operation("no visible layer below to merge into")
        })?;
        if self.use_thumbnail {
            return Err(StrataError::invalid_operation(
                "uncheck preview before merging layers",
            ));
        }
        if self.stack.layer(target_index)?.role().is_adjustment() {
            return Err(StrataError::invalid_operation(
                "merge target must be a background or image layer",
            ));
        }

        // Flatten against up-to-date content.
        self.apply_from(0)?;

        let (opacity, blend) = {
            let layer = self.stack.layer(index)?;
            (layer.opacity(), layer.blend_mode())
        };
        let src = self.stack.layer(index)?.image().clone();
        self.stack
            .layer_mut(target_index)?
            .image_mut()
            .draw_over(&src, opacity, blend);
        self.stack.remove(index)?;
        self.stack.set_active(target_index)?;
        self.apply_from(target_index)
    }

    /// Re-execute the stack from `index` upward and refresh the
    /// presentation. Non-reentrant: a second entry while a pass runs is
    /// an [`StrataError::InvalidOperation`].
    pub fn apply_from(&mut self, index: usize) -> StrataResult<()> {
        if self.executing {
            return Err(StrataError::invalid_operation(
                "stack execution already in progress",
            ));
        }
        self.executing = true;
        let result = self.run_pass(index);
        self.executing = false;
        self.modified = true;
        result
    }

    /// Re-execute the whole stack.
    pub fn apply_all(&mut self) -> StrataResult<()> {
        self.apply_from(0)
    }

    fn run_pass(&mut self, index: usize) -> StrataResult<()> {
        let mode = self.render_mode();
        executor::run_from(&mut self.stack, index, mode)?;
        self.presentation
            .refresh(&mut self.stack, mode, self.color_transform.as_ref())
    }

    /// Switch the thumbnail (preview) pipeline. Every cached
    /// resolution-specific container is invalid under the new mode, so
    /// the whole stack is re-executed.
    pub fn set_thumbnail_mode(&mut self, value: bool) -> StrataResult<()> {
        if value == self.use_thumbnail {
            return Ok(());
        }
        self.use_thumbnail = value;
        self.stack.invalidate_all();
        self.apply_from(0)
    }

    /// Switch the identity-LUT hald pipeline, re-executing the stack.
    pub fn set_hald_mode(&mut self, value: bool) -> StrataResult<()> {
        if value == self.use_hald {
            return Ok(());
        }
        self.use_hald = value;
        self.stack.invalidate_all();
        self.apply_from(0)
    }

    /// Color of the active layer's pixel at full-image coordinates
    /// `(x, y)`: from its effective input image when `from_input` is
    /// set, from its current image otherwise. Out-of-range coordinates
    /// yield opaque black.
    pub fn active_pixel(&mut self, x: i64, y: i64, from_input: bool) -> StrataResult<Rgba8> {
        let index = self.stack.active_index();
        let mode = self.render_mode();
        let (cx, cy) = self.full_to_current(x, y);

        if !from_input {
            let (layers, _) = self.stack.parts_mut();
            let layer = layers
                .get_mut(index)
                .ok_or_else(|| StrataError::configuration(format!("no layer at index {index}")))?;
            return Ok(layer.image_for_mode(mode).pixel_or_black(cx, cy));
        }

        let external = matches!(self.stack.layer(index)?.input(), InputSource::External(_));
        if external {
            let target_extent = self.stack.layer(index)?.image().current_extent(mode);
            if let InputSource::External(source) = self.stack.layer(index)?.input() {
                return Ok(source.scaled(target_extent).pixel_or_black(cx, cy));
            }
        }

        let (layers, masks) = self.stack.parts_mut();
        let (lower, rest) = layers.split_at_mut(index);
        let layer = rest
            .first_mut()
            .ok_or_else(|| StrataError::configuration(format!("no layer at index {index}")))?;
        let value = match compositor::input_up_to(lower, masks, mode)? {
            Some(input) => input.pixel_or_black(cx, cy),
            None => layer.image_for_mode(mode).pixel_or_black(cx, cy),
        };
        Ok(value)
    }

    /// Displayed (presentation) pixel color at full-image coordinates.
    /// Out-of-range coordinates yield opaque black.
    pub fn presentation_pixel(&self, x: i64, y: i64) -> Rgba8 {
        let (cx, cy) = self.full_to_current(x, y);
        self.presentation.pixel_or_black(cx, cy)
    }

    /// The final composited raster at the working resolution.
    pub fn composited_image(&self) -> &RasterImage {
        self.presentation.image()
    }

    /// The device-ready (color-managed when a transform is installed)
    /// composite.
    pub fn device_image(&self) -> &RasterImage {
        self.presentation.device_image()
    }

    /// Flatten the visible masked layers over the default background
    /// fill and return the result.
    pub fn merge_visible(&mut self) -> StrataResult<RasterImage> {
        let mode = self.render_mode();
        let top = self
            .stack
            .top_visible()
            .ok_or_else(|| StrataError::invalid_operation("no visible layers to merge"))?;
        let composite = self.stack.composite_up_to(top, mode)?.clone();
        let mut out = RasterImage::new(
            composite.extent(),
            DEFAULT_BG_COLOR,
            crate::foundation::core::PixelFormat::Rgba8,
        );
        out.draw_over(&composite, 1.0, BlendMode::Normal);
        Ok(out)
    }

    /// Write the final composite to `path` and return an export
    /// thumbnail. Rejected while the thumbnail pipeline is active, since
    /// the composite would be preview-resolution.
    pub fn export(
        &self,
        path: impl AsRef<Path>,
        format: ExportFormat,
        crop: Option<kurbo::Rect>,
    ) -> StrataResult<RasterImage> {
        if self.use_thumbnail {
            return Err(StrataError::invalid_operation(
                "uncheck preview before exporting",
            ));
        }
        writer::write_composite(self.presentation.image(), path.as_ref(), format, crop)
    }

    /// Share the mask of the layer at `index` with its lower neighbor.
    pub fn link_mask_to_lower(&mut self, index: usize) -> StrataResult<bool> {
        let linked = self.stack.link_mask_to_lower(index)?;
        if linked {
            self.modified = true;
        }
        Ok(linked)
    }

    /// Detach the layer at `index` from its mask group.
    pub fn unlink_mask(&mut self, index: usize) -> StrataResult<()> {
        self.stack.unlink_mask(index)?;
        self.modified = true;
        Ok(())
    }

    /// The persisted stack script: one action identifier per layer, in
    /// stack order.
    pub fn write_stack_script(&self) -> StackScript {
        StackScript {
            actions: self.stack.iter().map(|l| l.action_id().to_owned()).collect(),
        }
    }

    /// Replay a stack script: `factory` recreates the layer for each
    /// action identifier, in order, then the stack is re-executed.
    pub fn replay_stack_script<F>(&mut self, script: &StackScript, mut factory: F) -> StrataResult<()>
    where
        F: FnMut(&str, &mut Document) -> StrataResult<()>,
    {
        for action in &script.actions {
            factory(action, self)?;
        }
        self.apply_all()
    }

    /// New document with every layer and mask resized to `extent`.
    /// Adjustment kernels are collaborator-owned and must be
    /// re-attached by the caller.
    pub fn resized(&self, extent: Extent) -> StrataResult<Document> {
        self.transformed(|img| img.resized(extent))
    }

    /// New document with every layer and mask rotated a quarter turn
    /// clockwise.
    pub fn rotated90(&self) -> StrataResult<Document> {
        self.transformed(RasterImage::rotated90)
    }

    /// New document with every layer and mask rotated a half turn.
    pub fn rotated180(&self) -> StrataResult<Document> {
        self.transformed(RasterImage::rotated180)
    }

    /// New document with every layer and mask rotated a quarter turn
    /// counter-clockwise.
    pub fn rotated270(&self) -> StrataResult<Document> {
        self.transformed(RasterImage::rotated270)
    }

    /// Geometric transforms always build an entirely new document; the
    /// transformed layers carry fresh rasters and masks so no cache ever
    /// crosses a resolution domain.
    fn transformed(
        &self,
        f: impl Fn(&RasterImage) -> RasterImage,
    ) -> StrataResult<Document> {
        let background = f(self.stack.layer(0)?.image());
        let mut doc = Document::new(background)?;
        doc.use_thumbnail = self.use_thumbnail;
        doc.use_hald = self.use_hald;

        for i in 1..self.stack.len() {
            let original = self.stack.layer(i)?;
            let image = f(original.image());
            let mut layer = Layer::new(image, original.role());
            layer.set_visible(original.visible());
            layer.set_opacity(original.opacity());
            layer.set_blend_mode(original.blend_mode());
            layer.set_clipping(original.is_clipping());
            layer.set_mask_enabled(original.mask_enabled());
            layer.set_mask_selected(original.mask_selected());
            layer.set_action_id(original.action_id());
            let idx = doc.stack.insert(layer, original.name(), Some(i))?;
            let mask = f(self.stack.mask(i)?);
            *doc.stack.mask_mut(idx)? = mask;
        }

        doc.apply_all()?;
        doc.modified = false;
        Ok(doc)
    }

    /// Copy full-image coordinates into the current working resolution.
    fn full_to_current(&self, x: i64, y: i64) -> (i64, i64) {
        if !self.use_thumbnail {
            return (x, y);
        }
        let cur = self.extent.fit_within(thumb_box_for(self.extent));
        (
            x * i64::from(cur.width) / i64::from(self.extent.width),
            y * i64::from(cur.height) / i64::from(self.extent.height),
        )
    }
}

#[cfg(test)]
#[path = "../../tests/unit/document/document.rs"]
mod tests;
