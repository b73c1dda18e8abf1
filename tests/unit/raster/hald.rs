use super::*;
use crate::foundation::core::Rgba8;

#[test]
fn side_matches_lut_size() {
    // 33^1.5 = 189.57..., floored plus one.
    assert_eq!(hald_side(IDENTITY_LUT_SIZE), 190);
}

#[test]
fn identity_hald_is_square_and_opaque() {
    let hald = identity_hald();
    let side = hald_side(IDENTITY_LUT_SIZE);
    assert_eq!(hald.extent().width, side);
    assert_eq!(hald.extent().height, side);
    for p in hald.as_image().pixels() {
        assert_eq!(p.0[3], 255);
    }
}

#[test]
fn identity_entries_span_the_channel_range() {
    let hald = identity_hald();
    let n = IDENTITY_LUT_SIZE as u64;
    let side = hald_side(IDENTITY_LUT_SIZE);

    // Entry 0 is black, entry n-1 maxes red, the last entry is white.
    assert_eq!(hald.try_pixel(0, 0).unwrap(), Rgba8::BLACK);
    let px = |i: u64| {
        hald.try_pixel((i % u64::from(side)) as u32, (i / u64::from(side)) as u32)
            .unwrap()
    };
    assert_eq!(px(n - 1), Rgba8::new(255, 0, 0, 255));
    assert_eq!(px(n * n * n - 1), Rgba8::new(255, 255, 255, 255));

    // The tail past n^3 is black filler.
    assert_eq!(px(n * n * n), Rgba8::BLACK);
}
