use crate::foundation::core::{CacheState, Extent, RenderMode, Rgba8};
use crate::foundation::error::{StrataError, StrataResult};
use crate::raster::blend::BlendMode;
use crate::raster::image::RasterImage;
use crate::stack::mask::MaskId;

/// Closed role tag for a layer. Replaces substring matching on free-form
/// role strings with a checked variant.
#[derive(Clone, Copy, Debug, PartialEq, Eq, serde::Serialize, serde::Deserialize)]
pub enum LayerRole {
    /// The stack's permanent bottom layer.
    Background,
    /// A layer holding fixed pixel content from an external source.
    Image,
    /// A layer whose effect is a transform of its input.
    Adjustment(AdjustmentKind),
    /// A foreground/background segmentation layer.
    Segmentation,
    /// The non-stack presentation layer.
    Presentation,
}

impl LayerRole {
    /// Whether the role is any adjustment variant.
    pub fn is_adjustment(self) -> bool {
        matches!(self, LayerRole::Adjustment(_))
    }
}

/// Adjustment sub-roles.
#[derive(Clone, Copy, Debug, PartialEq, Eq, serde::Serialize, serde::Deserialize)]
pub enum AdjustmentKind {
    /// Tone/contrast curves.
    Contrast,
    /// RAW development.
    Raw,
    /// Geometric transform.
    Geometry,
    /// 3D LUT application.
    Lut3d,
    /// Clone/heal painting.
    Cloning,
}

/// Mask fill marking segmentation pixels not yet painted as foreground
/// or background.
pub const SEG_MASK_UNMARKED: Rgba8 = Rgba8 { r: 0, g: 99, b: 0, a: 128 };

/// Per-layer transform collaborator. Supplied by adjustment UIs or
/// business logic; the engine only invokes it.
///
/// Contract: read `input`, write `target` in place, leave the target
/// dimensions unchanged. The executor verifies the dimension invariant
/// and fails the pass otherwise.
pub trait AdjustmentKernel {
    /// Apply the transform.
    fn apply(&mut self, input: &RasterImage, target: &mut RasterImage) -> StrataResult<()>;
}

/// Kernel that leaves the layer raster untouched. The default for
/// background and plain image layers, whose raster *is* the source data.
#[derive(Clone, Copy, Debug, Default)]
pub struct NoopKernel;

impl AdjustmentKernel for NoopKernel {
    fn apply(&mut self, _input: &RasterImage, _target: &mut RasterImage) -> StrataResult<()> {
        Ok(())
    }
}

/// The identity transform: the target becomes a copy of the input. Used
/// by pass-through adjustments and by image-source layers pulling their
/// external source.
#[derive(Clone, Copy, Debug, Default)]
pub struct IdentityKernel;

impl AdjustmentKernel for IdentityKernel {
    fn apply(&mut self, input: &RasterImage, target: &mut RasterImage) -> StrataResult<()> {
        target.replace_with(input);
        Ok(())
    }
}

impl<F> AdjustmentKernel for F
where
    F: FnMut(&RasterImage, &mut RasterImage) -> StrataResult<()>,
{
    fn apply(&mut self, input: &RasterImage, target: &mut RasterImage) -> StrataResult<()> {
        self(input, target)
    }
}

/// Where a layer's effective input image comes from.
pub enum InputSource {
    /// Masked composite of the stack through the next lower visible
    /// layer. The generic contract, shared by adjustment and
    /// segmentation layers.
    LowerComposite,
    /// An externally supplied source image, rescaled to the current
    /// working resolution.
    External(RasterImage),
    /// Masked composite through the topmost visible layer. Presentation
    /// only.
    TopComposite,
}

/// Callback invoked when a layer's visibility flips. One-way and
/// owning-free; stands in for view linkage without back-pointers.
pub type VisibilityObserver = Box<dyn FnMut(bool) + Send>;

#[derive(Default)]
struct Containers {
    full: Option<RasterImage>,
    thumb: Option<RasterImage>,
}

/// One element of the document stack.
///
/// A layer owns its raster plus the stack metadata driving compositing:
/// visibility, opacity, blend mode, clipping flag, mask handle, transform
/// kernel, and the per-resolution composite containers cached on it.
pub struct Layer {
    name: String,
    role: LayerRole,
    visible: bool,
    opacity: f32,
    blend_mode: BlendMode,
    is_clipping: bool,
    mask: Option<MaskId>,
    mask_enabled: bool,
    mask_selected: bool,
    image: RasterImage,
    kernel: Box<dyn AdjustmentKernel + Send>,
    input: InputSource,
    containers: Containers,
    pixmap: Option<RasterImage>,
    cache: CacheState,
    action_id: String,
    on_visibility: Option<VisibilityObserver>,
}

impl Layer {
    /// Build a layer around `image` with default stack metadata:
    /// visible, fully opaque, normal blend, a no-op kernel, generic
    /// lower-composite input.
    pub fn new(image: RasterImage, role: LayerRole) -> Self {
        Self {
            name: String::new(),
            role,
            visible: true,
            opacity: 1.0,
            blend_mode: BlendMode::Normal,
            is_clipping: false,
            mask: None,
            mask_enabled: false,
            mask_selected: false,
            image,
            kernel: Box::new(NoopKernel),
            input: InputSource::LowerComposite,
            containers: Containers::default(),
            pixmap: None,
            cache: CacheState::Dirty,
            action_id: "none".to_owned(),
            on_visibility: None,
        }
    }

    /// Build an image-source layer: `image` is the working raster,
    /// `source` the externally supplied input pulled through an identity
    /// kernel.
    pub fn with_source(image: RasterImage, source: RasterImage) -> Self {
        let mut layer = Self::new(image, LayerRole::Image);
        layer.kernel = Box::new(IdentityKernel);
        layer.input = InputSource::External(source);
        layer
    }

    /// Layer name, unique within its stack.
    pub fn name(&self) -> &str {
        &self.name
    }

    pub(crate) fn set_name(&mut self, name: String) {
        self.name = name;
    }

    /// Role tag.
    pub fn role(&self) -> LayerRole {
        self.role
    }

    /// Render visibility. Invisible layers are excluded from composites
    /// but never block propagation.
    pub fn visible(&self) -> bool {
        self.visible
    }

    /// Set visibility and notify the observer, if any.
    pub fn set_visible(&mut self, visible: bool) {
        self.visible = visible;
        self.mark_dirty();
        if let Some(observer) = self.on_visibility.as_mut() {
            observer(visible);
        }
    }

    /// Painter opacity in `[0, 1]`.
    pub fn opacity(&self) -> f32 {
        self.opacity
    }

    /// Set opacity, clamped to `[0, 1]`.
    pub fn set_opacity(&mut self, opacity: f32) {
        self.opacity = opacity.clamp(0.0, 1.0);
        self.mark_dirty();
    }

    /// Blend mode used when painting this layer.
    pub fn blend_mode(&self) -> BlendMode {
        self.blend_mode
    }

    /// Set the blend mode.
    pub fn set_blend_mode(&mut self, mode: BlendMode) {
        self.blend_mode = mode;
        self.mark_dirty();
    }

    /// Whether the layer's mask clips the composite accumulated below it
    /// (inclusive) rather than the layer alone.
    pub fn is_clipping(&self) -> bool {
        self.is_clipping
    }

    /// Set the clipping flag.
    pub fn set_clipping(&mut self, clipping: bool) {
        self.is_clipping = clipping;
        self.mark_dirty();
    }

    /// Mask handle, present while the layer belongs to a stack.
    pub fn mask_id(&self) -> Option<MaskId> {
        self.mask
    }

    pub(crate) fn set_mask_id(&mut self, id: Option<MaskId>) {
        self.mask = id;
        self.mark_dirty();
    }

    /// Whether the mask participates in rendering.
    pub fn mask_enabled(&self) -> bool {
        self.mask_enabled
    }

    /// Enable or disable the mask.
    pub fn set_mask_enabled(&mut self, enabled: bool) {
        self.mask_enabled = enabled;
        self.mark_dirty();
    }

    /// Whether the mask displays as a color overlay instead of an
    /// opacity mask.
    pub fn mask_selected(&self) -> bool {
        self.mask_selected
    }

    /// Toggle mask display between color overlay and opacity mask.
    pub fn set_mask_selected(&mut self, selected: bool) {
        self.mask_selected = selected;
        self.mark_dirty();
    }

    /// Opaque identifier recorded in the persisted stack script.
    pub fn action_id(&self) -> &str {
        &self.action_id
    }

    /// Set the stack-script identifier.
    pub fn set_action_id(&mut self, id: impl Into<String>) {
        self.action_id = id.into();
    }

    /// Install the visibility observer.
    pub fn set_visibility_observer(&mut self, observer: Option<VisibilityObserver>) {
        self.on_visibility = observer;
    }

    /// Replace the transform kernel.
    pub fn set_kernel(&mut self, kernel: Box<dyn AdjustmentKernel + Send>) {
        self.kernel = kernel;
        self.mark_dirty();
    }

    /// Replace the input source.
    pub fn set_input(&mut self, input: InputSource) {
        self.input = input;
        self.mark_dirty();
    }

    /// Input source.
    pub fn input(&self) -> &InputSource {
        &self.input
    }

    /// The layer raster.
    pub fn image(&self) -> &RasterImage {
        &self.image
    }

    /// Mutable raster access. Marks the layer dirty.
    pub fn image_mut(&mut self) -> &mut RasterImage {
        self.mark_dirty();
        &mut self.image
    }

    /// Full-resolution extent.
    pub fn extent(&self) -> Extent {
        self.image.extent()
    }

    /// Composite-cache validity.
    pub fn cache_state(&self) -> CacheState {
        self.cache
    }

    /// Mark the composite caches stale and drop the device pixmap.
    pub fn mark_dirty(&mut self) {
        self.cache = CacheState::Dirty;
        self.pixmap = None;
    }

    pub(crate) fn mark_clean(&mut self) {
        self.cache = CacheState::Clean;
    }

    /// Cached device pixmap, when present: the current-mode image with
    /// the layer's own mask treatment applied.
    pub fn pixmap(&self) -> Option<&RasterImage> {
        self.pixmap.as_ref()
    }

    /// Rebuild the device pixmap for `mode`. `mask` must be supplied
    /// when the mask is enabled.
    pub(crate) fn update_pixmap(
        &mut self,
        mode: RenderMode,
        mask: Option<&RasterImage>,
    ) -> StrataResult<()> {
        self.pixmap = None;
        if !self.mask_enabled {
            return Ok(());
        }
        let mask = mask.ok_or_else(|| {
            StrataError::configuration("mask enabled but no mask supplied")
        })?;
        let mut pm = self.image.current(mode).clone();
        if self.mask_selected {
            pm.overlay_mask_color(mask);
        } else if !self.is_clipping {
            pm.apply_opacity_mask(mask);
        } else {
            // Clipping masks cut the accumulated composite instead; the
            // raw raster is painted as-is.
            return Ok(());
        }
        self.pixmap = Some(pm);
        Ok(())
    }

    pub(crate) fn execute_parts(
        &mut self,
    ) -> (&mut (dyn AdjustmentKernel + Send), &InputSource, &mut RasterImage) {
        (self.kernel.as_mut(), &self.input, &mut self.image)
    }

    pub(crate) fn image_for_mode(&mut self, mode: RenderMode) -> &RasterImage {
        self.image.current(mode)
    }

    pub(crate) fn take_container(&mut self, mode: RenderMode) -> Option<RasterImage> {
        match mode {
            RenderMode::Full => self.containers.full.take(),
            RenderMode::Thumbnail => self.containers.thumb.take(),
            RenderMode::Hald => None,
        }
    }

    pub(crate) fn put_container(&mut self, mode: RenderMode, container: RasterImage) {
        match mode {
            RenderMode::Full => self.containers.full = Some(container),
            RenderMode::Thumbnail => self.containers.thumb = Some(container),
            RenderMode::Hald => {}
        }
    }

    /// Cached composite container for `mode`.
    pub fn container(&self, mode: RenderMode) -> Option<&RasterImage> {
        match mode {
            RenderMode::Full => self.containers.full.as_ref(),
            RenderMode::Thumbnail => self.containers.thumb.as_ref(),
            RenderMode::Hald => None,
        }
    }

    /// Drop the composite containers and pixmap after the raster was
    /// re-executed; the containers describe the pre-execution stack.
    pub(crate) fn invalidate_composites(&mut self) {
        self.containers = Containers::default();
        self.pixmap = None;
    }

    /// Drop the composite containers and derived image views, e.g. on a
    /// display-mode switch.
    pub fn invalidate_all(&mut self) {
        self.containers = Containers::default();
        self.image.invalidate_caches();
        self.mark_dirty();
    }
}

impl std::fmt::Debug for Layer {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Layer")
            .field("name", &self.name)
            .field("role", &self.role)
            .field("visible", &self.visible)
            .field("opacity", &self.opacity)
            .field("blend_mode", &self.blend_mode)
            .field("is_clipping", &self.is_clipping)
            .field("extent", &self.image.extent())
            .finish()
    }
}

#[cfg(test)]
#[path = "../../tests/unit/stack/layer.rs"]
mod tests;
