use super::*;
use crate::foundation::core::{CacheState, PixelFormat};
use crate::stack::layer::LayerRole;

const EXTENT: Extent = Extent { width: 8, height: 8 };

fn solid(color: Rgba8) -> RasterImage {
    RasterImage::new(EXTENT, color, PixelFormat::Rgba8)
}

fn stack_with(names: &[&str]) -> LayerStack {
    let mut stack = LayerStack::new(
        Layer::new(solid(Rgba8::WHITE), LayerRole::Background),
        "Background",
    )
    .unwrap();
    for name in names {
        stack
            .insert(Layer::new(solid(Rgba8::WHITE), LayerRole::Image), name, None)
            .unwrap();
    }
    stack
}

#[test]
fn new_stack_holds_an_active_background() {
    let stack = stack_with(&[]);
    assert_eq!(stack.len(), 1);
    assert_eq!(stack.active_index(), 0);
    assert_eq!(stack.layer(0).unwrap().name(), "Background");
    assert!(stack.layer(0).unwrap().mask_id().is_some());
}

#[test]
fn insert_defaults_to_above_active_and_activates() {
    let mut stack = stack_with(&["a", "b"]);
    // Active is "b" at index 2; a default insert lands at 3.
    let idx = stack
        .insert(Layer::new(solid(Rgba8::WHITE), LayerRole::Image), "c", None)
        .unwrap();
    assert_eq!(idx, 3);
    assert_eq!(stack.active_index(), 3);

    stack.set_active(1).unwrap();
    let idx = stack
        .insert(Layer::new(solid(Rgba8::WHITE), LayerRole::Image), "d", None)
        .unwrap();
    assert_eq!(idx, 2);
}

#[test]
fn insert_uniquifies_names() {
    let mut stack = stack_with(&["curves"]);
    stack
        .insert(Layer::new(solid(Rgba8::WHITE), LayerRole::Image), "curves", None)
        .unwrap();
    stack
        .insert(Layer::new(solid(Rgba8::WHITE), LayerRole::Image), "curves", None)
        .unwrap();
    let names: Vec<&str> = stack.iter().map(Layer::name).collect();
    assert_eq!(names, vec!["Background", "curves", "curves_1", "curves_2"]);

    let mut stack = stack_with(&[]);
    stack
        .insert(Layer::new(solid(Rgba8::WHITE), LayerRole::Image), "", None)
        .unwrap();
    assert_eq!(stack.layer(1).unwrap().name(), "noname");
}

#[test]
fn insert_rejects_bad_geometry_and_indices() {
    let mut stack = stack_with(&[]);
    let wrong = RasterImage::new(
        Extent { width: 4, height: 4 },
        Rgba8::WHITE,
        PixelFormat::Rgba8,
    );
    assert!(
        stack
            .insert(Layer::new(wrong, LayerRole::Image), "x", None)
            .is_err()
    );
    assert!(
        stack
            .insert(Layer::new(solid(Rgba8::WHITE), LayerRole::Image), "x", Some(5))
            .is_err()
    );
}

#[test]
fn remove_returns_ownership_and_clamps_active() {
    let mut stack = stack_with(&["a", "b"]);
    assert_eq!(stack.active_index(), 2);
    let removed = stack.remove(2).unwrap();
    assert_eq!(removed.name(), "b");
    assert!(removed.mask_id().is_none());
    assert_eq!(stack.len(), 2);
    assert_eq!(stack.active_index(), 1);
    assert!(stack.remove(7).is_err());
}

#[test]
fn index_of_uses_identity() {
    let stack = stack_with(&["a"]);
    let layer = stack.layer(1).unwrap();
    assert_eq!(stack.index_of(layer), Some(1));

    let other = Layer::new(solid(Rgba8::WHITE), LayerRole::Image);
    assert_eq!(stack.index_of(&other), None);
}

#[test]
fn visibility_scans_skip_hidden_layers() {
    let mut stack = stack_with(&["a", "b", "c"]);
    stack.layer_mut(2).unwrap().set_visible(false);

    assert_eq!(stack.top_visible(), Some(3));
    assert_eq!(stack.lower_visible_below(3), Some(1));
    assert_eq!(stack.lower_visible_below(1), Some(0));
    assert_eq!(stack.lower_visible_below(0), None);
    assert_eq!(stack.upper_visible_above(0), Some(1));
    assert_eq!(stack.upper_visible_above(1), Some(3));
    assert_eq!(stack.upper_visible_above(3), None);

    stack.layer_mut(3).unwrap().set_visible(false);
    assert_eq!(stack.top_visible(), Some(1));
}

#[test]
fn clipping_scan_looks_downward() {
    let mut stack = stack_with(&["a", "b"]);
    stack.layer_mut(1).unwrap().set_clipping(true);
    // Background has no clipping flag set here.
    assert_eq!(stack.next_clipping_below(2), Some(1));
    assert_eq!(stack.next_clipping_below(1), None);
}

#[test]
fn linking_shares_one_mask_object() {
    let mut stack = stack_with(&["a", "b"]);
    assert!(stack.link_mask_to_lower(2).unwrap());
    assert_eq!(
        stack.layer(2).unwrap().mask_id(),
        stack.layer(1).unwrap().mask_id()
    );
    assert_eq!(stack.group_members(2).unwrap(), vec![1, 2]);

    // Mutation through one member is observable through the other.
    stack
        .mask_mut(2)
        .unwrap()
        .put_pixel(3, 3, Rgba8::TRANSPARENT)
        .unwrap();
    assert_eq!(
        stack.mask(1).unwrap().try_pixel(3, 3).unwrap(),
        Rgba8::TRANSPARENT
    );
}

#[test]
fn linking_absorbs_into_an_existing_group() {
    let mut stack = stack_with(&["a", "b"]);
    assert!(stack.link_mask_to_lower(1).unwrap());
    // Layer 2 is ungrouped, layers 0..=1 share a mask; the group absorbs it.
    assert!(stack.link_mask_to_lower(2).unwrap());
    assert_eq!(stack.group_members(0).unwrap(), vec![0, 1, 2]);
}

#[test]
fn two_groups_are_never_merged() {
    let mut stack = stack_with(&["a", "b", "c"]);
    assert!(stack.link_mask_to_lower(1).unwrap());
    assert!(stack.link_mask_to_lower(3).unwrap());
    // Layers 0..=1 and 2..=3 each form a group; linking across refuses.
    assert!(!stack.link_mask_to_lower(2).unwrap());
    assert_eq!(stack.group_members(1).unwrap(), vec![0, 1]);
    assert_eq!(stack.group_members(2).unwrap(), vec![2, 3]);
}

#[test]
fn unlink_takes_a_private_copy() {
    let mut stack = stack_with(&["a", "b"]);
    stack.link_mask_to_lower(1).unwrap();
    stack.link_mask_to_lower(2).unwrap();

    stack.unlink_mask(2).unwrap();
    assert!(stack.group_members(2).unwrap().is_empty());
    assert_eq!(stack.group_members(0).unwrap(), vec![0, 1]);

    // Further mutation is isolated.
    stack
        .mask_mut(2)
        .unwrap()
        .put_pixel(0, 0, Rgba8::TRANSPARENT)
        .unwrap();
    assert_eq!(stack.mask(0).unwrap().try_pixel(0, 0).unwrap(), Rgba8::WHITE);
}

#[test]
fn unlink_dissolves_two_member_groups() {
    let mut stack = stack_with(&["a"]);
    stack.link_mask_to_lower(1).unwrap();
    stack.unlink_mask(1).unwrap();
    assert!(stack.group_members(0).unwrap().is_empty());
    assert!(stack.group_members(1).unwrap().is_empty());
}

#[test]
fn removal_releases_group_membership() {
    let mut stack = stack_with(&["a", "b"]);
    stack.link_mask_to_lower(1).unwrap();
    stack.link_mask_to_lower(2).unwrap();
    stack.remove(2).unwrap();
    assert_eq!(stack.group_members(0).unwrap(), vec![0, 1]);
    stack.remove(1).unwrap();
    assert!(stack.group_members(0).unwrap().is_empty());
}

#[test]
fn mask_edits_invalidate_the_layer_and_above() {
    let mut stack = stack_with(&["a", "b"]);
    let (layers, _) = stack.parts_mut();
    for layer in layers.iter_mut() {
        layer.mark_clean();
    }
    let _ = stack.mask_mut(1).unwrap();
    assert_eq!(stack.layer(0).unwrap().cache_state(), CacheState::Clean);
    assert_eq!(stack.layer(1).unwrap().cache_state(), CacheState::Dirty);
    assert_eq!(stack.layer(2).unwrap().cache_state(), CacheState::Dirty);
}
