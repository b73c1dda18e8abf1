use crate::foundation::error::{StrataError, StrataResult};
use crate::raster::image::RasterImage;

/// Handle into a [`MaskArena`] slot.
///
/// Slots are never reused within a document lifetime, so a stale id is
/// detectable (`contains` returns false) instead of silently resolving to
/// an unrelated mask.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub struct MaskId(usize);

struct MaskSlot {
    image: RasterImage,
    owners: usize,
}

/// Owner-counted store for mask buffers.
///
/// A mask group is exactly the set of layers holding the same id with two
/// or more owners; a slot dropping back to one owner is a dissolved
/// group. This replaces shared in-place mask objects with explicit ids,
/// so aliasing is visible in the data model.
#[derive(Default)]
pub struct MaskArena {
    slots: Vec<Option<MaskSlot>>,
}

impl MaskArena {
    /// Empty arena.
    pub fn new() -> Self {
        Self::default()
    }

    /// Store `image` in a fresh slot with one owner.
    pub fn alloc(&mut self, image: RasterImage) -> MaskId {
        let id = MaskId(self.slots.len());
        self.slots.push(Some(MaskSlot { image, owners: 1 }));
        id
    }

    /// Register one more owner of `id`.
    pub fn acquire(&mut self, id: MaskId) -> StrataResult<()> {
        let slot = self.slot_mut(id)?;
        slot.owners += 1;
        Ok(())
    }

    /// Drop one owner of `id`, freeing the slot when the last owner
    /// leaves. Returns the remaining owner count.
    pub fn release(&mut self, id: MaskId) -> StrataResult<usize> {
        let slot = self.slot_mut(id)?;
        slot.owners -= 1;
        let remaining = slot.owners;
        if remaining == 0 {
            self.slots[id.0] = None;
        }
        Ok(remaining)
    }

    /// Borrow the mask image.
    pub fn get(&self, id: MaskId) -> StrataResult<&RasterImage> {
        match self.slots.get(id.0) {
            Some(Some(slot)) => Ok(&slot.image),
            _ => Err(StrataError::configuration(format!("unknown mask id {}", id.0))),
        }
    }

    /// Mutably borrow the mask image. Mutation through any owner is
    /// visible to every owner of the slot.
    pub fn get_mut(&mut self, id: MaskId) -> StrataResult<&mut RasterImage> {
        match self.slots.get_mut(id.0) {
            Some(Some(slot)) => Ok(&mut slot.image),
            _ => Err(StrataError::configuration(format!("unknown mask id {}", id.0))),
        }
    }

    /// Whether `id` resolves to a live slot.
    pub fn contains(&self, id: MaskId) -> bool {
        matches!(self.slots.get(id.0), Some(Some(_)))
    }

    /// Whether `id` has two or more owners.
    pub fn is_shared(&self, id: MaskId) -> bool {
        self.owners(id) >= 2
    }

    /// Owner count of `id`; 0 for freed or unknown ids.
    pub fn owners(&self, id: MaskId) -> usize {
        match self.slots.get(id.0) {
            Some(Some(slot)) => slot.owners,
            _ => 0,
        }
    }

    fn slot_mut(&mut self, id: MaskId) -> StrataResult<&mut MaskSlot> {
        match self.slots.get_mut(id.0) {
            Some(Some(slot)) => Ok(slot),
            _ => Err(StrataError::configuration(format!("unknown mask id {}", id.0))),
        }
    }
}

#[cfg(test)]
#[path = "../../tests/unit/stack/mask.rs"]
mod tests;
