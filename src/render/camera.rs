use std::ops::{Deref, DerefMut};

use crate::foundation::core::{Extent, PixelRect, TileLayout, TileScale, Viewport, scale_round};
use crate::render::target::RenderTarget;

/// Orthographic camera over normalized world space.
///
/// `window` is the part of the `[0,1]²` world that is mapped onto the rendered image.
/// Per-tile rendering narrows it to the tile's share of the view.
#[derive(Clone, Copy, Debug, Default, PartialEq, serde::Serialize, serde::Deserialize)]
pub struct Camera {
    /// Visible world rectangle.
    pub window: Viewport,
}

impl Camera {
    /// Camera looking at `window`.
    pub fn new(window: Viewport) -> Self {
        Self { window }
    }

    /// Camera showing only `sub` (relative to this camera's image) of the current view.
    pub fn narrowed(&self, sub: &Viewport) -> Camera {
        Camera {
            window: self.window.sub_window(sub),
        }
    }
}

/// Pixel size and origin of the region a renderer draws, as returned by the viewport
/// adapter.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, serde::Serialize, serde::Deserialize)]
pub struct TiledRegion {
    /// Region width in pixels.
    pub width: u32,
    /// Region height in pixels.
    pub height: u32,
    /// Left edge in pixels.
    pub origin_x: u32,
    /// Top edge in pixels.
    pub origin_y: u32,
}

impl TiledRegion {
    /// Region as a pixel rectangle.
    pub fn rect(&self) -> PixelRect {
        PixelRect::new(self.origin_x, self.origin_y, self.width, self.height)
    }

    /// `true` when the region covers no pixels.
    pub fn is_empty(&self) -> bool {
        self.width == 0 || self.height == 0
    }

    fn scaled(self, sx: u32, sy: u32) -> TiledRegion {
        TiledRegion {
            width: self.width.saturating_mul(sx),
            height: self.height.saturating_mul(sy),
            origin_x: self.origin_x.saturating_mul(sx),
            origin_y: self.origin_y.saturating_mul(sy),
        }
    }
}

/// Snapshot of the mutable render-target state touched by the compositing core.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct TargetState {
    /// Renderer viewport.
    pub viewport: Viewport,
    /// Window tile magnification.
    pub tile_scale: TileScale,
    /// Window tile viewport.
    pub tile_viewport: Viewport,
    /// Active camera.
    pub camera: Camera,
    /// Native pixel viewport.
    pub native_viewport: PixelRect,
    /// Scissor rectangle.
    pub scissor: Option<PixelRect>,
}

impl TargetState {
    /// Read the current state of `target`.
    pub fn capture<T: RenderTarget + ?Sized>(target: &T) -> Self {
        Self {
            viewport: target.viewport(),
            tile_scale: target.tile_scale(),
            tile_viewport: target.tile_viewport(),
            camera: target.camera(),
            native_viewport: target.native_viewport(),
            scissor: target.scissor(),
        }
    }

    /// Write this state back into `target`.
    pub fn apply<T: RenderTarget + ?Sized>(&self, target: &mut T) {
        target.set_viewport(self.viewport);
        target.set_tile_scale(self.tile_scale);
        target.set_tile_viewport(self.tile_viewport);
        target.set_camera(self.camera);
        target.set_native_viewport(self.native_viewport);
        target.set_scissor(self.scissor);
    }
}

/// Scoped override of render-target state.
///
/// The state present when the guard is created is written back when it drops, on every
/// exit path including `?` returns and unwinding. The target is reachable through the
/// guard for the duration of the scope.
pub struct TargetStateGuard<'a, T: RenderTarget + ?Sized> {
    target: &'a mut T,
    saved: TargetState,
}

impl<'a, T: RenderTarget + ?Sized> TargetStateGuard<'a, T> {
    /// Save the current state; restore it on drop.
    pub fn save(target: &'a mut T) -> Self {
        let saved = TargetState::capture(&*target);
        Self { target, saved }
    }

    /// Save the current state, then force tile-scale `(1,1)` and tile-viewport
    /// `[0,0,1,1]` for the scope.
    pub fn reset_tiles(target: &'a mut T) -> Self {
        let mut guard = Self::save(target);
        guard.target.set_tile_scale(TileScale::ONE);
        guard.target.set_tile_viewport(Viewport::FULL);
        guard
    }

    /// State that will be restored.
    pub fn saved(&self) -> &TargetState {
        &self.saved
    }
}

impl<T: RenderTarget + ?Sized> Deref for TargetStateGuard<'_, T> {
    type Target = T;

    fn deref(&self) -> &T {
        self.target
    }
}

impl<T: RenderTarget + ?Sized> DerefMut for TargetStateGuard<'_, T> {
    fn deref_mut(&mut self) -> &mut T {
        self.target
    }
}

impl<T: RenderTarget + ?Sized> Drop for TargetStateGuard<'_, T> {
    fn drop(&mut self) {
        self.saved.apply(self.target);
    }
}

/// Baseline single-view computation: the pixel region the renderer viewport covers on
/// this window, honoring the windowing layer's tile-scale and tile-viewport.
pub fn tiled_size_and_origin<T: RenderTarget + ?Sized>(target: &T) -> TiledRegion {
    let size = target.actual_size();
    let scale = target.tile_scale();
    let full = Extent::new(
        size.width.saturating_mul(scale.x.max(1)),
        size.height.saturating_mul(scale.y.max(1)),
    );
    let tile_vp = target.tile_viewport();
    let Some(clipped) = target.viewport().intersect(&tile_vp) else {
        return TiledRegion::default();
    };

    let x0 = scale_round(clipped.xmin() - tile_vp.xmin(), full.width);
    let y0 = scale_round(clipped.ymin() - tile_vp.ymin(), full.height);
    let x1 = scale_round(clipped.xmax() - tile_vp.xmin(), full.width);
    let y1 = scale_round(clipped.ymax() - tile_vp.ymin(), full.height);
    TiledRegion {
        width: x1.saturating_sub(x0),
        height: y1.saturating_sub(y0),
        origin_x: x0,
        origin_y: y0,
    }
}

/// Region this process renders for a `tiles` display wall, in full-display pixels.
///
/// For a tiled layout the windowing layer's tile transform is suspended while the baseline
/// is computed, because the compositing engine applies its own per-tile camera math. The
/// target's tile-scale and tile-viewport are bit-identical before and after the call.
pub fn compute_tiled_region<T: RenderTarget + ?Sized>(
    target: &mut T,
    tiles: TileLayout,
) -> TiledRegion {
    if !tiles.is_tiled() {
        return tiled_size_and_origin(target);
    }
    let region = {
        let guard = TargetStateGuard::reset_tiles(target);
        tiled_size_and_origin(&*guard)
    };
    region.scaled(tiles.cols(), tiles.rows())
}

#[cfg(test)]
#[path = "../../tests/unit/render/camera.rs"]
mod tests;
