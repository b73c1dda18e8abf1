use std::time::Instant;

use crate::foundation::core::RenderMode;
use crate::foundation::error::{StrataError, StrataResult};
use crate::stack::compositor;
use crate::stack::layer::InputSource;
use crate::stack::stack::LayerStack;

/// Re-execute the stack from `start` upward.
///
/// An explicit bottom-to-top loop over the index range (the recursive
/// form of the propagation would recurse once per layer on deep stacks;
/// the externally observable ordering is identical). For every visible
/// layer at or above `start`, in stack order: resolve its input image,
/// run its kernel into its current-mode raster, verify the kernel left
/// the dimensions unchanged, drop its stale composites, and mark it
/// clean. Invisible layers are skipped but never stop the upward walk,
/// so a layer's input always reflects the freshly computed output of
/// every visible layer below it.
///
/// The pass runs to completion across the whole range; an aborted pass
/// would leave upper layers stale.
#[tracing::instrument(skip(stack))]
pub(crate) fn run_from(
    stack: &mut LayerStack,
    start: usize,
    mode: RenderMode,
) -> StrataResult<()> {
    let len = stack.len();
    if start >= len {
        return Err(StrataError::configuration(format!(
            "no layer at index {start}"
        )));
    }

    stack.invalidate_from(start);

    for index in start..len {
        if !stack.layer(index)?.visible() {
            continue;
        }
        let started = Instant::now();
        execute_layer(stack, index, mode)?;
        stack.refresh_pixmap(index, mode)?;
        tracing::debug!(
            layer = stack.layer(index)?.name(),
            elapsed_ms = started.elapsed().as_millis() as u64,
            "layer executed"
        );
    }
    Ok(())
}

fn execute_layer(stack: &mut LayerStack, index: usize, mode: RenderMode) -> StrataResult<()> {
    let (layers, masks) = stack.parts_mut();
    let (lower, rest) = layers.split_at_mut(index);
    let layer = &mut rest[0];
    let target_extent = layer.image().current_extent(mode);

    let external = matches!(layer.input(), InputSource::External(_));
    let executed = if external {
        let (kernel, input, image) = layer.execute_parts();
        let InputSource::External(source) = input else {
            return Err(StrataError::configuration("input source changed mid-pass"));
        };
        let scaled = source.scaled(target_extent);
        let target = image.current_mut(mode)?;
        kernel.apply(&scaled, target)?;
        true
    } else if let Some(input) = compositor::input_up_to(lower, masks, mode)? {
        let (kernel, _, image) = layer.execute_parts();
        let target = image.current_mut(mode)?;
        kernel.apply(input, target)?;
        true
    } else {
        // A visible layer with nothing visible below it (the usual
        // background case) is source data; its kernel has no input to
        // read.
        false
    };

    if executed {
        let after = layer
            .image()
            .current_cached(mode)
            .map(crate::raster::image::RasterImage::extent);
        if after != Some(target_extent) {
            return Err(StrataError::kernel(format!(
                "kernel changed dimensions of layer '{}'",
                layer.name()
            )));
        }
    }

    layer.invalidate_composites();
    layer.mark_clean();
    Ok(())
}

#[cfg(test)]
#[path = "../../tests/unit/stack/executor.rs"]
mod tests;
