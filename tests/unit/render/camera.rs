use super::*;
use crate::foundation::error::{SortlastError, SortlastResult};
use crate::render::target::SoftwareWindow;

fn window_with_wall_state() -> SoftwareWindow {
    let mut w = SoftwareWindow::new(Extent::new(100, 50));
    w.set_tile_scale(TileScale::new(2, 2));
    w.set_tile_viewport(Viewport::new(0.5, 0.0, 1.0, 0.5).unwrap());
    w
}

#[test]
fn baseline_for_plain_window_is_viewport_times_size() {
    let mut w = SoftwareWindow::new(Extent::new(100, 50));
    w.set_viewport(Viewport::new(0.5, 0.0, 1.0, 1.0).unwrap());
    let r = tiled_size_and_origin(&w);
    assert_eq!(
        r,
        TiledRegion {
            width: 50,
            height: 50,
            origin_x: 50,
            origin_y: 0
        }
    );
}

#[test]
fn baseline_honors_window_tile_transform() {
    let w = window_with_wall_state();
    // Full viewport clipped to the top-right quarter of a 2x2 wall of 100x50 windows.
    let r = tiled_size_and_origin(&w);
    assert_eq!(r.width, 100);
    assert_eq!(r.height, 50);
    assert_eq!((r.origin_x, r.origin_y), (0, 0));
}

#[test]
fn baseline_is_empty_when_view_misses_the_tile() {
    let mut w = window_with_wall_state();
    w.set_viewport(Viewport::new(0.0, 0.5, 0.5, 1.0).unwrap());
    assert!(tiled_size_and_origin(&w).is_empty());
}

#[test]
fn single_tile_delegates_to_baseline() {
    let mut w = window_with_wall_state();
    let baseline = tiled_size_and_origin(&w);
    assert_eq!(compute_tiled_region(&mut w, TileLayout::SINGLE), baseline);
}

#[test]
fn tiled_region_scales_untransformed_baseline_by_tile_dims() {
    let mut w = window_with_wall_state();
    w.set_viewport(Viewport::new(0.25, 0.0, 0.75, 1.0).unwrap());
    let r = compute_tiled_region(&mut w, TileLayout::new(2, 3).unwrap());
    // Baseline with tile transform suspended: 50x50 at (25,0); then x*3 cols, y*2 rows.
    assert_eq!(
        r,
        TiledRegion {
            width: 150,
            height: 100,
            origin_x: 75,
            origin_y: 0
        }
    );
}

#[test]
fn tiled_region_leaves_tile_state_bit_identical() {
    let mut w = window_with_wall_state();
    let before = TargetState::capture(&w);
    let _ = compute_tiled_region(&mut w, TileLayout::new(2, 2).unwrap());
    let after = TargetState::capture(&w);
    assert_eq!(before, after);
    assert_eq!(w.tile_scale(), TileScale::new(2, 2));
    assert_eq!(
        w.tile_viewport().to_array(),
        Viewport::new(0.5, 0.0, 1.0, 0.5).unwrap().to_array()
    );
}

#[test]
fn guard_restores_on_error_path() {
    fn failing(target: &mut SoftwareWindow) -> SortlastResult<()> {
        let mut guard = TargetStateGuard::reset_tiles(target);
        guard.set_viewport(Viewport::new(0.0, 0.0, 0.1, 0.1).unwrap());
        guard.set_scissor(Some(PixelRect::new(0, 0, 1, 1)));
        Err(SortlastError::render("stage failed"))
    }

    let mut w = window_with_wall_state();
    let before = TargetState::capture(&w);
    assert!(failing(&mut w).is_err());
    assert_eq!(TargetState::capture(&w), before);
}

#[test]
fn guard_restores_when_unwinding() {
    let mut w = window_with_wall_state();
    let before = TargetState::capture(&w);
    let result = std::panic::catch_unwind(std::panic::AssertUnwindSafe(|| {
        let mut guard = TargetStateGuard::reset_tiles(&mut w);
        guard.set_camera(Camera::new(Viewport::new(0.0, 0.0, 0.5, 0.5).unwrap()));
        panic!("mid-computation failure");
    }));
    assert!(result.is_err());
    assert_eq!(TargetState::capture(&w), before);
}

#[test]
fn narrowed_camera_maps_sub_window() {
    let cam = Camera::new(Viewport::new(0.0, 0.0, 0.5, 1.0).unwrap());
    let sub = cam.narrowed(&Viewport::new(0.5, 0.5, 1.0, 1.0).unwrap());
    assert_eq!(sub.window.to_array(), [0.25, 0.5, 0.5, 1.0]);
}
