use super::*;
use crate::foundation::core::{Extent, PixelRect, TileScale};
use crate::foundation::error::SortlastError;
use crate::render::camera::Camera;
use crate::render::target::SoftwareWindow;

fn vp(a: f64, b: f64, c: f64, d: f64) -> Viewport {
    Viewport::new(a, b, c, d).unwrap()
}

fn solid(w: u32, h: u32, rgba: [u8; 4]) -> RawImage {
    RawImage::solid(Extent::new(w, h), rgba).unwrap()
}

/// Window whose pixel writes fail once armed.
struct BrokenWindow {
    inner: SoftwareWindow,
    fail_draws: bool,
}

impl RenderTarget for BrokenWindow {
    fn actual_size(&self) -> Extent {
        self.inner.actual_size()
    }
    fn viewport(&self) -> Viewport {
        self.inner.viewport()
    }
    fn set_viewport(&mut self, viewport: Viewport) {
        self.inner.set_viewport(viewport);
    }
    fn tile_scale(&self) -> TileScale {
        self.inner.tile_scale()
    }
    fn set_tile_scale(&mut self, scale: TileScale) {
        self.inner.set_tile_scale(scale);
    }
    fn tile_viewport(&self) -> Viewport {
        self.inner.tile_viewport()
    }
    fn set_tile_viewport(&mut self, viewport: Viewport) {
        self.inner.set_tile_viewport(viewport);
    }
    fn camera(&self) -> Camera {
        self.inner.camera()
    }
    fn set_camera(&mut self, camera: Camera) {
        self.inner.set_camera(camera);
    }
    fn native_viewport(&self) -> PixelRect {
        self.inner.native_viewport()
    }
    fn set_native_viewport(&mut self, rect: PixelRect) {
        self.inner.set_native_viewport(rect);
    }
    fn scissor(&self) -> Option<PixelRect> {
        self.inner.scissor()
    }
    fn set_scissor(&mut self, rect: Option<PixelRect>) {
        self.inner.set_scissor(rect);
    }
    fn culling(&self) -> bool {
        self.inner.culling()
    }
    fn set_culling(&mut self, enabled: bool) {
        self.inner.set_culling(enabled);
    }
    fn clear(&mut self, rgba: [u8; 4]) {
        self.inner.clear(rgba);
    }
    fn read_pixels(&self, rect: PixelRect) -> SortlastResult<Vec<u8>> {
        self.inner.read_pixels(rect)
    }
    fn draw_pixels(&mut self, rect: PixelRect, rgba: &[u8]) -> SortlastResult<()> {
        if self.fail_draws {
            return Err(SortlastError::render("draw refused"));
        }
        self.inner.draw_pixels(rect, rgba)
    }
}

#[test]
fn register_update_get_erase() {
    let mut reg = TileRegistry::new();
    assert!(reg.is_empty());
    assert!(reg.register(OwnerId(3)));
    assert!(!reg.register(OwnerId(3)));
    assert!(!reg.get(OwnerId(3)).unwrap().image.is_valid());

    reg.update(OwnerId(3), solid(1, 1, [1, 2, 3, 255]), Viewport::FULL, Viewport::FULL);
    reg.update(OwnerId(1), solid(1, 1, [0, 0, 0, 255]), Viewport::FULL, Viewport::FULL);
    assert_eq!(reg.len(), 2);
    assert_eq!(reg.owners().collect::<Vec<_>>(), vec![OwnerId(1), OwnerId(3)]);
    assert_eq!(reg.get(OwnerId(3)).unwrap().image.pixels(), &[1, 2, 3, 255]);

    // Updating replaces rather than duplicates.
    reg.update(OwnerId(3), solid(1, 1, [9, 9, 9, 255]), vp(0.0, 0.0, 0.5, 0.5), Viewport::FULL);
    assert_eq!(reg.len(), 2);
    assert_eq!(reg.get(OwnerId(3)).unwrap().physical_viewport, vp(0.0, 0.0, 0.5, 0.5));

    assert!(reg.erase(OwnerId(3)).is_some());
    assert!(reg.get(OwnerId(3)).is_none());
    assert!(reg.erase(OwnerId(3)).is_none());
}

#[test]
fn flush_pastes_every_valid_tile_into_its_viewport() {
    let mut reg = TileRegistry::new();
    reg.update(OwnerId(0), solid(2, 2, [255, 0, 0, 255]), vp(0.0, 0.0, 0.5, 1.0), Viewport::FULL);
    reg.update(OwnerId(1), solid(1, 1, [0, 0, 255, 255]), vp(0.5, 0.0, 1.0, 1.0), Viewport::FULL);
    reg.register(OwnerId(2));

    let mut w = SoftwareWindow::new(Extent::new(4, 2));
    assert_eq!(reg.flush_all(&mut w).unwrap(), 2);
    assert_eq!(w.pixel(0, 0), Some([255, 0, 0, 255]));
    assert_eq!(w.pixel(1, 1), Some([255, 0, 0, 255]));
    assert_eq!(w.pixel(2, 0), Some([0, 0, 255, 255]));
    assert_eq!(w.pixel(3, 1), Some([0, 0, 255, 255]));
}

#[test]
fn flush_forces_unit_tile_scale_and_restores_state() {
    let mut reg = TileRegistry::new();
    reg.update(OwnerId(0), solid(1, 1, [7, 7, 7, 255]), Viewport::FULL, Viewport::FULL);

    let mut w = SoftwareWindow::new(Extent::new(2, 2));
    let vp_before = vp(0.25, 0.25, 0.75, 0.75);
    let tv_before = vp(0.5, 0.5, 1.0, 1.0);
    w.set_viewport(vp_before);
    w.set_tile_scale(TileScale::new(2, 2));
    w.set_tile_viewport(tv_before);

    reg.flush_all(&mut w).unwrap();
    // Pasted over the whole window, not through the wall transform.
    assert!(w.pixels().chunks_exact(4).all(|p| p == [7, 7, 7, 255]));
    assert_eq!(w.viewport(), vp_before);
    assert_eq!(w.tile_scale(), TileScale::new(2, 2));
    assert_eq!(w.tile_viewport(), tv_before);
}

#[test]
fn failed_paste_still_restores_viewport() {
    let mut reg = TileRegistry::new();
    reg.update(OwnerId(0), solid(1, 1, [7, 7, 7, 255]), vp(0.0, 0.0, 0.5, 0.5), Viewport::FULL);
    reg.update(OwnerId(1), solid(1, 1, [8, 8, 8, 255]), vp(0.5, 0.5, 1.0, 1.0), Viewport::FULL);

    let mut w = BrokenWindow {
        inner: SoftwareWindow::new(Extent::new(2, 2)),
        fail_draws: true,
    };
    let before = vp(0.1, 0.2, 0.3, 0.4);
    w.set_viewport(before);
    w.set_tile_scale(TileScale::new(3, 1));

    let err = reg.flush_all(&mut w).unwrap_err();
    assert!(matches!(err, SortlastError::Render(_)));
    assert_eq!(w.viewport(), before);
    assert_eq!(w.tile_scale(), TileScale::new(3, 1));

    w.fail_draws = false;
    assert_eq!(reg.flush_all(&mut w).unwrap(), 2);
}
