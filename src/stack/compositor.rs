use crate::foundation::core::{CacheState, PixelFormat, RenderMode, Rgba8};
use crate::foundation::error::{StrataError, StrataResult};
use crate::raster::image::RasterImage;
use crate::stack::layer::Layer;
use crate::stack::mask::MaskArena;

/// Build the visible, mask-aware composite of `layers[0..=upto]` at the
/// `mode` resolution.
///
/// The composite is painted into a per-mode container cached on the
/// target layer and returned by reference; a `Clean` target layer with an
/// existing container is returned without repainting. The first visible
/// layer is painted with a replace operation (destination ignored), every
/// later visible layer with its opacity and blend mode, and a clipping
/// layer with an enabled mask cuts everything accumulated so far with a
/// destination-in mask. Hald mode short-circuits to the target layer's
/// identity hald image.
#[tracing::instrument(skip(layers, masks))]
pub(crate) fn composite_up_to<'a>(
    layers: &'a mut [Layer],
    masks: &MaskArena,
    upto: usize,
    mode: RenderMode,
) -> StrataResult<&'a RasterImage> {
    if upto >= layers.len() {
        return Err(StrataError::configuration(format!(
            "no layer at index {upto}"
        )));
    }

    if mode == RenderMode::Hald {
        return Ok(layers[upto].image_for_mode(RenderMode::Hald));
    }

    let reusable = layers[upto].cache_state() == CacheState::Clean
        && layers[upto].container(mode).is_some();
    if reusable {
        return layers[upto]
            .container(mode)
            .ok_or_else(|| StrataError::configuration("composite container missing"));
    }

    // Derived views are computed up front so the paint loop below can
    // borrow them immutably.
    for layer in layers[..=upto].iter_mut() {
        if layer.visible() {
            let _ = layer.image_for_mode(mode);
        }
    }

    let target_extent = layers[upto].image().current_extent(mode);
    let mut container = match layers[upto].take_container(mode) {
        Some(c) if c.extent() == target_extent => c,
        _ => RasterImage::new(target_extent, Rgba8::TRANSPARENT, PixelFormat::Rgba8),
    };
    container.fill(Rgba8::TRANSPARENT);

    let mut painted_any = false;
    for layer in layers[..=upto].iter() {
        if !layer.visible() {
            continue;
        }
        let src = match layer.pixmap() {
            Some(pm) => pm,
            None => layer
                .image()
                .current_cached(mode)
                .ok_or_else(|| StrataError::configuration("layer view missing"))?,
        };
        if painted_any {
            container.draw_over(src, layer.opacity(), layer.blend_mode());
        } else {
            container.replace_with(src);
            painted_any = true;
        }
        if layer.is_clipping()
            && layer.mask_enabled()
            && let Some(id) = layer.mask_id()
        {
            container.apply_opacity_mask(masks.get(id)?);
        }
    }

    layers[upto].put_container(mode, container);
    layers[upto]
        .container(mode)
        .ok_or_else(|| StrataError::configuration("composite container missing"))
}

/// Composite through the topmost visible layer of `lower`, or `None`
/// when nothing below is visible.
pub(crate) fn input_up_to<'a>(
    lower: &'a mut [Layer],
    masks: &MaskArena,
    mode: RenderMode,
) -> StrataResult<Option<&'a RasterImage>> {
    match lower.iter().rposition(Layer::visible) {
        Some(vi) => Ok(Some(composite_up_to(lower, masks, vi, mode)?)),
        None => Ok(None),
    }
}

#[cfg(test)]
#[path = "../../tests/unit/stack/compositor.rs"]
mod tests;
