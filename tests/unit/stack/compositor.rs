use super::*;
use crate::foundation::core::Extent;
use crate::raster::blend::BlendMode;
use crate::stack::layer::LayerRole;
use crate::stack::stack::LayerStack;

const EXTENT: Extent = Extent { width: 8, height: 8 };
const RED: Rgba8 = Rgba8 { r: 255, g: 0, b: 0, a: 255 };
const BLUE: Rgba8 = Rgba8 { r: 0, g: 0, b: 255, a: 255 };

fn solid(color: Rgba8) -> RasterImage {
    RasterImage::new(EXTENT, color, PixelFormat::Rgba8)
}

fn base_stack() -> LayerStack {
    LayerStack::new(Layer::new(solid(RED), LayerRole::Background), "Background").unwrap()
}

#[test]
fn single_layer_composite_is_that_layer() {
    let mut stack = base_stack();
    let out = stack.composite_up_to(0, RenderMode::Full).unwrap();
    assert_eq!(out.extent(), EXTENT);
    assert_eq!(out.try_pixel(3, 3).unwrap(), RED);
}

#[test]
fn upper_layers_paint_with_opacity_and_blend() {
    let mut stack = base_stack();
    stack
        .insert(Layer::new(solid(BLUE), LayerRole::Image), "blue", None)
        .unwrap();
    stack.layer_mut(1).unwrap().set_opacity(0.5);

    let out = stack.composite_up_to(1, RenderMode::Full).unwrap();
    let px = out.try_pixel(0, 0).unwrap();
    assert!((126..=129).contains(&px.r));
    assert!((126..=129).contains(&px.b));
    assert_eq!(px.a, 255);
}

#[test]
fn invisible_layers_are_skipped() {
    let mut stack = base_stack();
    stack
        .insert(Layer::new(solid(BLUE), LayerRole::Image), "blue", None)
        .unwrap();
    stack
        .insert(Layer::new(solid(Rgba8::TRANSPARENT), LayerRole::Image), "top", None)
        .unwrap();
    stack.layer_mut(1).unwrap().set_visible(false);

    let out = stack.composite_up_to(2, RenderMode::Full).unwrap();
    assert_eq!(out.try_pixel(0, 0).unwrap(), RED);
}

#[test]
fn hidden_bottom_layer_still_paints_with_replace() {
    let mut stack = base_stack();
    let half = Rgba8 { r: 0, g: 255, b: 0, a: 128 };
    stack
        .insert(Layer::new(solid(half), LayerRole::Image), "green", None)
        .unwrap();
    stack.layer_mut(0).unwrap().set_visible(false);

    // The first painted visible layer replaces, keeping its alpha.
    let out = stack.composite_up_to(1, RenderMode::Full).unwrap();
    assert_eq!(out.try_pixel(0, 0).unwrap(), half);
}

#[test]
fn clipping_mask_cuts_the_accumulated_composite() {
    let mut stack = base_stack();
    stack
        .insert(
            Layer::new(solid(Rgba8::TRANSPARENT), LayerRole::Image),
            "clip",
            None,
        )
        .unwrap();
    {
        let layer = stack.layer_mut(1).unwrap();
        layer.set_clipping(true);
        layer.set_mask_enabled(true);
    }
    stack.mask_mut(1).unwrap().fill(Rgba8::new(255, 255, 255, 128));

    let out = stack.composite_up_to(1, RenderMode::Full).unwrap();
    let px = out.try_pixel(4, 4).unwrap();
    assert!((127..=129).contains(&px.a));
    assert_eq!((px.r, px.g, px.b), (255, 0, 0));
}

#[test]
fn non_clipping_mask_affects_only_its_own_layer() {
    let mut stack = base_stack();
    stack
        .insert(Layer::new(solid(BLUE), LayerRole::Image), "blue", None)
        .unwrap();
    {
        let layer = stack.layer_mut(1).unwrap();
        layer.set_mask_enabled(true);
    }
    stack.mask_mut(1).unwrap().fill(Rgba8::TRANSPARENT);
    stack.refresh_pixmap(1, RenderMode::Full).unwrap();

    // The blue layer is fully masked out; the background is untouched.
    let out = stack.composite_up_to(1, RenderMode::Full).unwrap();
    assert_eq!(out.try_pixel(0, 0).unwrap(), RED);
}

#[test]
fn hald_mode_short_circuits_to_the_identity_hald() {
    let mut stack = base_stack();
    let out = stack.composite_up_to(0, RenderMode::Hald).unwrap();
    assert_eq!(out.extent().width, 190);
    assert_eq!(out.extent().height, 190);
}

#[test]
fn thumbnail_mode_composites_at_preview_resolution() {
    let big = RasterImage::new(
        Extent { width: 2400, height: 1200 },
        RED,
        PixelFormat::Rgba8,
    );
    let mut stack =
        LayerStack::new(Layer::new(big, LayerRole::Background), "Background").unwrap();
    let out = stack.composite_up_to(0, RenderMode::Thumbnail).unwrap();
    assert_eq!(out.extent(), Extent { width: 1200, height: 600 });
    assert_eq!(out.try_pixel(10, 10).unwrap(), RED);
}

#[test]
fn clean_layers_reuse_their_container() {
    let mut stack = base_stack();
    stack
        .insert(Layer::new(solid(BLUE), LayerRole::Image), "blue", None)
        .unwrap();
    stack.layer_mut(1).unwrap().set_opacity(0.5);
    let first = stack.composite_up_to(1, RenderMode::Full).unwrap();
    let red_mix = first.try_pixel(0, 0).unwrap().r;

    // A clean target layer returns the cached container even though the
    // stack below changed; marking it dirty recomputes.
    {
        let (layers, _) = stack.parts_mut();
        layers[0].image_mut().fill(Rgba8::WHITE);
        layers[1].mark_clean();
    }
    let stale = stack.composite_up_to(1, RenderMode::Full).unwrap();
    assert_eq!(stale.try_pixel(0, 0).unwrap().r, red_mix);

    {
        let (layers, _) = stack.parts_mut();
        layers[1].mark_dirty();
    }
    let fresh = stack.composite_up_to(1, RenderMode::Full).unwrap();
    // White now shows through the half-transparent blue.
    assert!(fresh.try_pixel(0, 0).unwrap().g > 100);
}

#[test]
fn composite_rejects_bad_indices() {
    let mut stack = base_stack();
    assert!(stack.composite_up_to(5, RenderMode::Full).is_err());
}

#[test]
fn blend_mode_is_honored() {
    let mut stack = base_stack();
    stack
        .insert(
            Layer::new(solid(Rgba8::new(128, 128, 128, 255)), LayerRole::Image),
            "gray",
            None,
        )
        .unwrap();
    stack.layer_mut(1).unwrap().set_blend_mode(BlendMode::Multiply);

    let out = stack.composite_up_to(1, RenderMode::Full).unwrap();
    let px = out.try_pixel(0, 0).unwrap();
    // red * gray: the red channel halves, the others stay at zero.
    assert!((127..=129).contains(&px.r));
    assert_eq!((px.g, px.b), (0, 0));
}
