use super::*;

fn solid(w: u32, h: u32, color: Rgba8) -> RasterImage {
    RasterImage::new(Extent { width: w, height: h }, color, PixelFormat::Rgba8)
}

const RED: Rgba8 = Rgba8 { r: 255, g: 0, b: 0, a: 255 };
const BLUE: Rgba8 = Rgba8 { r: 0, g: 0, b: 255, a: 255 };

#[test]
fn out_of_bounds_sampling_is_black() {
    let img = solid(4, 4, RED);
    assert_eq!(img.pixel_or_black(2, 2), RED);
    assert_eq!(img.pixel_or_black(-1, 0), Rgba8::BLACK);
    assert_eq!(img.pixel_or_black(4, 0), Rgba8::BLACK);
    assert_eq!(img.pixel_or_black(0, 100), Rgba8::BLACK);
}

#[test]
fn put_pixel_rejects_out_of_bounds() {
    let mut img = solid(4, 4, RED);
    assert!(img.put_pixel(3, 3, BLUE).is_ok());
    assert!(img.put_pixel(4, 0, BLUE).is_err());
    assert_eq!(img.try_pixel(3, 3).unwrap(), BLUE);
}

#[test]
fn thumbnail_is_bounded_and_aspect_preserving() {
    let mut img = solid(2400, 1200, RED);
    let thumb = img.thumbnail();
    assert_eq!(thumb.extent(), Extent { width: 1200, height: 600 });
    assert_eq!(thumb.try_pixel(10, 10).unwrap(), RED);

    // Small images are not upscaled.
    let mut small = solid(64, 48, RED);
    assert_eq!(small.thumbnail().extent(), Extent { width: 64, height: 48 });
}

#[test]
fn buffer_mutation_invalidates_thumbnail() {
    let mut img = solid(2400, 1200, RED);
    let _ = img.thumbnail();
    img.fill(BLUE);
    assert_eq!(img.thumbnail().try_pixel(5, 5).unwrap(), BLUE);
}

#[test]
fn current_extent_per_mode() {
    let img = solid(2400, 1200, RED);
    assert_eq!(img.current_extent(RenderMode::Full), Extent { width: 2400, height: 1200 });
    assert_eq!(
        img.current_extent(RenderMode::Thumbnail),
        Extent { width: 1200, height: 600 }
    );
    let hald_ext = img.current_extent(RenderMode::Hald);
    assert_eq!(hald_ext.width, hald_ext.height);
    assert_eq!(hald_ext.width, 190);
}

#[test]
fn replace_with_copies_alpha() {
    let mut dst = solid(4, 4, RED);
    let src = solid(4, 4, Rgba8::TRANSPARENT);
    dst.replace_with(&src);
    assert_eq!(dst.try_pixel(0, 0).unwrap(), Rgba8::TRANSPARENT);
}

#[test]
fn draw_over_blends_with_opacity() {
    let mut dst = solid(4, 4, Rgba8::BLACK);
    let src = solid(4, 4, Rgba8::WHITE);
    dst.draw_over(&src, 0.5, BlendMode::Normal);
    let px = dst.try_pixel(1, 1).unwrap();
    assert!((126..=129).contains(&px.r));
    assert_eq!(px.a, 255);
}

#[test]
fn draw_over_rescales_mismatched_source() {
    let mut dst = solid(8, 8, Rgba8::BLACK);
    let src = solid(2, 2, RED);
    dst.draw_over(&src, 1.0, BlendMode::Normal);
    assert_eq!(dst.try_pixel(7, 7).unwrap(), RED);
}

#[test]
fn opacity_mask_scales_destination_alpha() {
    let mut dst = solid(4, 4, RED);
    let mask = solid(4, 4, Rgba8::new(255, 255, 255, 128));
    dst.apply_opacity_mask(&mask);
    let px = dst.try_pixel(0, 0).unwrap();
    assert!((127..=129).contains(&px.a));
    assert_eq!((px.r, px.g, px.b), (255, 0, 0));
}

#[test]
fn geometric_ops_build_new_images() {
    let img = solid(6, 4, RED);
    assert_eq!(
        img.resized(Extent { width: 3, height: 2 }).extent(),
        Extent { width: 3, height: 2 }
    );
    assert_eq!(img.rotated90().extent(), Extent { width: 4, height: 6 });
    assert_eq!(img.rotated180().extent(), Extent { width: 6, height: 4 });
    assert_eq!(img.rotated270().extent(), Extent { width: 4, height: 6 });
}

#[test]
fn cropped_checks_bounds() {
    let img = solid(10, 10, RED);
    let crop = img.cropped(2, 2, Extent { width: 5, height: 5 }).unwrap();
    assert_eq!(crop.extent(), Extent { width: 5, height: 5 });
    assert!(img.cropped(8, 8, Extent { width: 5, height: 5 }).is_err());
}

#[test]
fn clone_drops_derived_views() {
    let mut img = solid(2400, 1200, RED);
    let _ = img.thumbnail();
    let copy = img.clone();
    assert!(copy.current_cached(RenderMode::Thumbnail).is_none());
    assert!(img.current_cached(RenderMode::Thumbnail).is_some());
}
