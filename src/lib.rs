//! Strata is an editable, non-destructive multi-layer image document
//! engine.
//!
//! A [`Document`] owns an ordered [`LayerStack`] of [`Layer`]s — each
//! with independent visibility, opacity, blend mode, mask, and a
//! deferred transform kernel — plus a singular [`Presentation`] layer
//! holding the final, color-managed composite.
//!
//! # Pipeline overview
//!
//! 1. **Edit**: mutate one layer's parameters ([`Document::edit_layer`],
//!    [`Document::edit_mask`]); the layer and everything above it are
//!    marked dirty.
//! 2. **Execute**: [`Document::apply_from`] walks the stack bottom to
//!    top from the changed layer, re-running each visible layer's kernel
//!    against its freshly composited input.
//! 3. **Composite**: masked composites are painted into per-layer,
//!    per-resolution cached containers, honoring clipping masks and
//!    mask-sharing groups.
//! 4. **Present**: the presentation layer recomposites above the topmost
//!    visible layer and applies the device color transform.
//!
//! The key design constraints:
//!
//! - **No unsafe**: `unsafe` is forbidden in this crate.
//! - **Single-threaded control flow**: no call suspends; a stack pass
//!   runs to completion, and reentrant execution is rejected.
//! - **Explicit cache validity**: every layer carries a
//!   [`CacheState`]; caches self-heal by lazy recomputation and cache
//!   problems are never surfaced to callers.
//! - **Dual-resolution pipelines**: the same stack renders full-size,
//!   bounded thumbnail, or identity-LUT hald output, selected by
//!   document flags.
#![forbid(unsafe_code)]

mod color;
mod document;
mod export;
mod foundation;
mod raster;
mod stack;

pub use color::managed::ColorTransform;
pub use document::document::{DEFAULT_BG_COLOR, Document};
pub use document::presentation::Presentation;
pub use document::script::StackScript;
pub use export::writer::{ExportFormat, write_composite};
pub use foundation::core::{
    Affine, CacheState, EXPORT_THUMB_LANDSCAPE, EXPORT_THUMB_PORTRAIT, Extent, PixelFormat, Point,
    Rect, RenderMode, Rgba8, THUMB_BOX_LANDSCAPE, THUMB_BOX_PORTRAIT, Vec2, thumb_box_for,
};
pub use foundation::error::{StrataError, StrataResult};
pub use raster::blend::{BlendMode, blend_pixel};
pub use raster::hald::{IDENTITY_LUT_SIZE, hald_side, identity_hald};
pub use raster::image::RasterImage;
pub use stack::layer::{
    AdjustmentKernel, AdjustmentKind, IdentityKernel, InputSource, Layer, LayerRole, NoopKernel,
    SEG_MASK_UNMARKED, VisibilityObserver,
};
pub use stack::mask::{MaskArena, MaskId};
pub use stack::stack::LayerStack;
