use crate::foundation::core::{Extent, RenderMode, Rgba8};
use crate::foundation::error::{StrataError, StrataResult};
use crate::raster::image::RasterImage;
use crate::stack::compositor;
use crate::stack::layer::Layer;
use crate::stack::mask::{MaskArena, MaskId};

/// Ordered sequence of layers owned by a document.
///
/// The stack owns the mask arena and keeps the active-layer index valid
/// (`0 <= active < len`) whenever it is non-empty. Index misuse is an
/// explicit [`StrataError::Configuration`] error, never a silent no-op or
/// a guessed sentinel.
pub struct LayerStack {
    layers: Vec<Layer>,
    masks: MaskArena,
    active: usize,
}

impl LayerStack {
    /// Build a stack seeded with `background` at position 0.
    pub fn new(background: Layer, name: &str) -> StrataResult<Self> {
        let mut stack = Self {
            layers: Vec::new(),
            masks: MaskArena::new(),
            active: 0,
        };
        stack.insert(background, name, Some(0))?;
        Ok(stack)
    }

    /// Number of layers.
    pub fn len(&self) -> usize {
        self.layers.len()
    }

    /// Whether the stack holds no layers.
    pub fn is_empty(&self) -> bool {
        self.layers.is_empty()
    }

    /// Full-resolution extent shared by every layer.
    pub fn extent(&self) -> Option<Extent> {
        self.layers.first().map(Layer::extent)
    }

    /// Borrow the layer at `index`.
    pub fn layer(&self, index: usize) -> StrataResult<&Layer> {
        self.layers
            .get(index)
            .ok_or_else(|| StrataError::configuration(format!("no layer at index {index}")))
    }

    /// Mutably borrow the layer at `index`. The layer and everything
    /// above it are marked dirty, since any mutation invalidates their
    /// composites.
    pub fn layer_mut(&mut self, index: usize) -> StrataResult<&mut Layer> {
        if index >= self.layers.len() {
            return Err(StrataError::configuration(format!(
                "no layer at index {index}"
            )));
        }
        self.invalidate_from(index);
        Ok(&mut self.layers[index])
    }

    /// Iterate the layers bottom to top.
    pub fn iter(&self) -> impl Iterator<Item = &Layer> {
        self.layers.iter()
    }

    /// Index of the active layer.
    pub fn active_index(&self) -> usize {
        self.active
    }

    /// Select the active layer.
    pub fn set_active(&mut self, index: usize) -> StrataResult<()> {
        if index >= self.layers.len() {
            return Err(StrataError::configuration(format!(
                "active index {index} out of range 0..{}",
                self.layers.len()
            )));
        }
        self.active = index;
        Ok(())
    }

    /// Borrow the active layer.
    pub fn active_layer(&self) -> StrataResult<&Layer> {
        self.layer(self.active)
    }

    /// Insert `layer` at `index`, defaulting to immediately above the
    /// active layer. Assigns a stack-unique name derived from `name` and
    /// makes the inserted layer active. Returns the insertion index.
    pub fn insert(
        &mut self,
        mut layer: Layer,
        name: &str,
        index: Option<usize>,
    ) -> StrataResult<usize> {
        if let Some(extent) = self.extent()
            && layer.extent() != extent
        {
            return Err(StrataError::configuration(format!(
                "layer extent {}x{} does not match stack extent {}x{}",
                layer.extent().width,
                layer.extent().height,
                extent.width,
                extent.height
            )));
        }

        let index = match index {
            Some(i) => {
                if i > self.layers.len() {
                    return Err(StrataError::configuration(format!(
                        "insertion index {i} out of range 0..={}",
                        self.layers.len()
                    )));
                }
                i
            }
            None => {
                if self.layers.is_empty() {
                    0
                } else {
                    self.active + 1
                }
            }
        };

        layer.set_name(self.unique_name(name));

        // Every stack member resolves to a live mask; layers arriving
        // without one get a fresh keep-all mask.
        match layer.mask_id() {
            Some(id) if self.masks.contains(id) => {}
            _ => {
                let mask = RasterImage::new(
                    layer.extent(),
                    Rgba8::WHITE,
                    crate::foundation::core::PixelFormat::Rgba8,
                );
                let id = self.masks.alloc(mask);
                layer.set_mask_id(Some(id));
            }
        }

        self.layers.insert(index, layer);
        self.active = index;
        self.invalidate_from(index);
        Ok(index)
    }

    /// Remove and return the layer at `index`. Its mask ownership is
    /// released; a group shrinking to one remaining owner is thereby
    /// dissolved. The returned layer's mask handle is cleared.
    pub fn remove(&mut self, index: usize) -> StrataResult<Layer> {
        if index >= self.layers.len() {
            return Err(StrataError::configuration(format!(
                "no layer at index {index}"
            )));
        }
        let mut layer = self.layers.remove(index);
        if let Some(id) = layer.mask_id() {
            self.masks.release(id)?;
        }
        layer.set_mask_id(None);
        if !self.layers.is_empty() {
            if self.active >= self.layers.len() {
                self.active = self.layers.len() - 1;
            }
            let from = index.min(self.layers.len() - 1);
            self.invalidate_from(from);
        } else {
            self.active = 0;
        }
        Ok(layer)
    }

    /// Position of `layer` in the stack, by identity.
    pub fn index_of(&self, layer: &Layer) -> Option<usize> {
        self.layers.iter().position(|l| std::ptr::eq(l, layer))
    }

    /// Index of the topmost visible layer.
    pub fn top_visible(&self) -> Option<usize> {
        self.layers.iter().rposition(Layer::visible)
    }

    /// Index of the next visible layer strictly below `index`.
    pub fn lower_visible_below(&self, index: usize) -> Option<usize> {
        self.layers[..index.min(self.layers.len())]
            .iter()
            .rposition(Layer::visible)
    }

    /// Index of the next visible layer strictly above `index`.
    pub fn upper_visible_above(&self, index: usize) -> Option<usize> {
        let start = index.saturating_add(1);
        if start >= self.layers.len() {
            return None;
        }
        self.layers[start..]
            .iter()
            .position(Layer::visible)
            .map(|i| start + i)
    }

    /// Index of the next clipping layer strictly below `index`.
    pub fn next_clipping_below(&self, index: usize) -> Option<usize> {
        self.layers[..index.min(self.layers.len())]
            .iter()
            .rposition(Layer::is_clipping)
    }

    /// Share the mask of the layer at `index` with its immediate lower
    /// neighbor (the original "link to lower" gesture).
    ///
    /// Two distinct non-empty groups are never merged; the call then
    /// returns `Ok(false)` without mutating anything. When one side
    /// already belongs to a group, the other side is absorbed and adopts
    /// the group's shared mask.
    pub fn link_mask_to_lower(&mut self, index: usize) -> StrataResult<bool> {
        if index == 0 || index >= self.layers.len() {
            return Err(StrataError::configuration(format!(
                "cannot link mask at index {index}"
            )));
        }
        let upper_id = self.require_mask_id(index)?;
        let lower_id = self.require_mask_id(index - 1)?;
        if upper_id == lower_id {
            return Ok(true);
        }

        let upper_shared = self.masks.is_shared(upper_id);
        let lower_shared = self.masks.is_shared(lower_id);
        if upper_shared && lower_shared {
            return Ok(false);
        }

        if upper_shared {
            // Lower neighbor joins the upper layer's existing group.
            self.masks.acquire(upper_id)?;
            self.masks.release(lower_id)?;
            self.layers[index - 1].set_mask_id(Some(upper_id));
        } else {
            // Default direction: the upper layer adopts the lower mask,
            // joining its group when one exists.
            self.masks.acquire(lower_id)?;
            self.masks.release(upper_id)?;
            self.layers[index].set_mask_id(Some(lower_id));
        }
        self.invalidate_from(index - 1);
        Ok(true)
    }

    /// Detach the layer at `index` from its mask group: it receives a
    /// private copy of the shared mask under a fresh id. A group left
    /// with a single owner is dissolved by construction.
    pub fn unlink_mask(&mut self, index: usize) -> StrataResult<()> {
        let id = self.require_mask_id(index)?;
        if !self.masks.is_shared(id) {
            return Ok(());
        }
        let copy = self.masks.get(id)?.clone();
        self.masks.release(id)?;
        let fresh = self.masks.alloc(copy);
        self.layers[index].set_mask_id(Some(fresh));
        self.invalidate_from(index);
        Ok(())
    }

    /// Indices of the layers sharing a mask with `index` (including
    /// `index` itself); empty when the layer is ungrouped.
    pub fn group_members(&self, index: usize) -> StrataResult<Vec<usize>> {
        let id = self.require_mask_id(index)?;
        if !self.masks.is_shared(id) {
            return Ok(Vec::new());
        }
        Ok(self
            .layers
            .iter()
            .enumerate()
            .filter(|(_, l)| l.mask_id() == Some(id))
            .map(|(i, _)| i)
            .collect())
    }

    /// Borrow the mask of the layer at `index`.
    pub fn mask(&self, index: usize) -> StrataResult<&RasterImage> {
        let id = self.require_mask_id(index)?;
        self.masks.get(id)
    }

    /// Mutably borrow the mask of the layer at `index`. Mutation is
    /// visible through every member of the layer's group, so the layer
    /// and everything above it are marked dirty first.
    pub fn mask_mut(&mut self, index: usize) -> StrataResult<&mut RasterImage> {
        let id = self.require_mask_id(index)?;
        self.invalidate_from(index);
        self.masks.get_mut(id)
    }

    /// Mark the layer at `index` and every layer above it dirty.
    pub fn invalidate_from(&mut self, index: usize) {
        for layer in self.layers.iter_mut().skip(index) {
            layer.mark_dirty();
        }
    }

    /// Drop every layer's containers and derived views, e.g. when the
    /// document display mode changes.
    pub fn invalidate_all(&mut self) {
        for layer in &mut self.layers {
            layer.invalidate_all();
        }
    }

    /// Masked composite of the visible stack from the bottom through
    /// `upto` inclusive, at the `mode` resolution. The returned image is
    /// a cached container owned by the target layer; copy it when a
    /// stable snapshot is needed.
    pub fn composite_up_to(
        &mut self,
        upto: usize,
        mode: RenderMode,
    ) -> StrataResult<&RasterImage> {
        compositor::composite_up_to(&mut self.layers, &self.masks, upto, mode)
    }

    /// Rebuild the device pixmap of the layer at `index` for `mode`.
    pub fn refresh_pixmap(&mut self, index: usize, mode: RenderMode) -> StrataResult<()> {
        let Self { layers, masks, .. } = self;
        let layer = layers
            .get_mut(index)
            .ok_or_else(|| StrataError::configuration(format!("no layer at index {index}")))?;
        let mask = match layer.mask_id() {
            Some(id) if layer.mask_enabled() => Some(masks.get(id)?),
            _ => None,
        };
        layer.update_pixmap(mode, mask)
    }

    pub(crate) fn parts_mut(&mut self) -> (&mut [Layer], &MaskArena) {
        (&mut self.layers, &self.masks)
    }

    pub(crate) fn arena(&self) -> &MaskArena {
        &self.masks
    }

    pub(crate) fn arena_mut(&mut self) -> &mut MaskArena {
        &mut self.masks
    }

    fn require_mask_id(&self, index: usize) -> StrataResult<MaskId> {
        self.layer(index)?
            .mask_id()
            .ok_or_else(|| StrataError::configuration(format!("layer {index} has no mask")))
    }

    fn unique_name(&self, requested: &str) -> String {
        let base = if requested.is_empty() { "noname" } else { requested };
        let used: Vec<&str> = self.layers.iter().map(Layer::name).collect();
        if !used.contains(&base) {
            return base.to_owned();
        }
        let mut n = 1;
        loop {
            let trial = format!("{base}_{n}");
            if !used.iter().any(|u| *u == trial) {
                return trial;
            }
            n += 1;
        }
    }
}

#[cfg(test)]
#[path = "../../tests/unit/stack/stack.rs"]
mod tests;
