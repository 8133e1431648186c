use crate::foundation::core::{Extent, PixelRect, TileScale, Viewport};
use crate::foundation::error::{SortlastError, SortlastResult};
use crate::render::camera::Camera;

/// A render window plus the renderer state the compositing core reads and temporarily
/// overrides.
///
/// Frame buffer contents are premultiplied RGBA8, row-major, top row first. All state is
/// mutated in place; callers that change it must restore it before returning (see
/// [`crate::TargetStateGuard`]).
pub trait RenderTarget {
    /// Physical window size in pixels.
    fn actual_size(&self) -> Extent;

    /// Renderer viewport, normalized to the (possibly tile-scaled) display.
    fn viewport(&self) -> Viewport;
    /// Replace the renderer viewport.
    fn set_viewport(&mut self, viewport: Viewport);

    /// Tile magnification installed by the windowing layer.
    fn tile_scale(&self) -> TileScale;
    /// Replace the tile magnification.
    fn set_tile_scale(&mut self, scale: TileScale);

    /// This window's portion of the full tiled display.
    fn tile_viewport(&self) -> Viewport;
    /// Replace the tile viewport.
    fn set_tile_viewport(&mut self, viewport: Viewport);

    /// Active camera.
    fn camera(&self) -> Camera;
    /// Replace the active camera.
    fn set_camera(&mut self, camera: Camera);

    /// Native pixel viewport that clears and raw pixel pushes are relative to.
    fn native_viewport(&self) -> PixelRect;
    /// Replace the native pixel viewport.
    fn set_native_viewport(&mut self, rect: PixelRect);

    /// Active scissor rectangle, `None` when the scissor test is disabled.
    fn scissor(&self) -> Option<PixelRect>;
    /// Enable (`Some`) or disable (`None`) the scissor test.
    fn set_scissor(&mut self, rect: Option<PixelRect>);

    /// Whether the renderer culls props on its own.
    fn culling(&self) -> bool;
    /// Toggle renderer-side culling.
    fn set_culling(&mut self, enabled: bool);

    /// Fill the native viewport (clipped by the scissor) with `rgba`.
    fn clear(&mut self, rgba: [u8; 4]);

    /// Read premultiplied RGBA8 pixels from `rect`.
    fn read_pixels(&self, rect: PixelRect) -> SortlastResult<Vec<u8>>;

    /// Write premultiplied RGBA8 pixels into `rect`, honoring the scissor test.
    fn draw_pixels(&mut self, rect: PixelRect, rgba: &[u8]) -> SortlastResult<()>;
}

/// CPU render window used as the single-process renderer in tests and the CLI.
#[derive(Clone, Debug)]
pub struct SoftwareWindow {
    size: Extent,
    color: Vec<u8>,
    viewport: Viewport,
    tile_scale: TileScale,
    tile_viewport: Viewport,
    camera: Camera,
    native_viewport: PixelRect,
    scissor: Option<PixelRect>,
    culling: bool,
}

impl SoftwareWindow {
    /// Create a window cleared to transparent black.
    pub fn new(size: Extent) -> Self {
        Self {
            size,
            color: vec![0; size.pixel_count() * 4],
            viewport: Viewport::FULL,
            tile_scale: TileScale::ONE,
            tile_viewport: Viewport::FULL,
            camera: Camera::default(),
            native_viewport: PixelRect::from_extent(size),
            scissor: None,
            culling: true,
        }
    }

    /// Entire frame buffer.
    pub fn pixels(&self) -> &[u8] {
        &self.color
    }

    /// One pixel, `None` outside the window.
    pub fn pixel(&self, x: u32, y: u32) -> Option<[u8; 4]> {
        if x >= self.size.width || y >= self.size.height {
            return None;
        }
        let idx = ((y as usize) * (self.size.width as usize) + (x as usize)) * 4;
        let p = &self.color[idx..idx + 4];
        Some([p[0], p[1], p[2], p[3]])
    }

    fn frame_rect(&self) -> PixelRect {
        PixelRect::from_extent(self.size)
    }

    fn writable_rect(&self, rect: PixelRect) -> Option<PixelRect> {
        let clipped = rect.intersect(self.frame_rect())?;
        match self.scissor {
            Some(s) => clipped.intersect(s),
            None => Some(clipped),
        }
    }
}

impl RenderTarget for SoftwareWindow {
    fn actual_size(&self) -> Extent {
        self.size
    }

    fn viewport(&self) -> Viewport {
        self.viewport
    }

    fn set_viewport(&mut self, viewport: Viewport) {
        self.viewport = viewport;
    }

    fn tile_scale(&self) -> TileScale {
        self.tile_scale
    }

    fn set_tile_scale(&mut self, scale: TileScale) {
        self.tile_scale = scale;
    }

    fn tile_viewport(&self) -> Viewport {
        self.tile_viewport
    }

    fn set_tile_viewport(&mut self, viewport: Viewport) {
        self.tile_viewport = viewport;
    }

    fn camera(&self) -> Camera {
        self.camera
    }

    fn set_camera(&mut self, camera: Camera) {
        self.camera = camera;
    }

    fn native_viewport(&self) -> PixelRect {
        self.native_viewport
    }

    fn set_native_viewport(&mut self, rect: PixelRect) {
        self.native_viewport = rect;
    }

    fn scissor(&self) -> Option<PixelRect> {
        self.scissor
    }

    fn set_scissor(&mut self, rect: Option<PixelRect>) {
        self.scissor = rect;
    }

    fn culling(&self) -> bool {
        self.culling
    }

    fn set_culling(&mut self, enabled: bool) {
        self.culling = enabled;
    }

    fn clear(&mut self, rgba: [u8; 4]) {
        let Some(rect) = self.writable_rect(self.native_viewport) else {
            return;
        };
        let stride = self.size.width as usize;
        for y in rect.y..rect.y + rect.height {
            let row = (y as usize) * stride;
            for x in rect.x..rect.x + rect.width {
                let idx = (row + x as usize) * 4;
                self.color[idx..idx + 4].copy_from_slice(&rgba);
            }
        }
    }

    fn read_pixels(&self, rect: PixelRect) -> SortlastResult<Vec<u8>> {
        if !rect.fits_within(self.size) {
            return Err(SortlastError::render(format!(
                "read rect {rect:?} exceeds window {:?}",
                self.size
            )));
        }
        let stride = self.size.width as usize;
        let mut out = Vec::with_capacity(rect.extent().pixel_count() * 4);
        for y in rect.y..rect.y + rect.height {
            let start = ((y as usize) * stride + rect.x as usize) * 4;
            out.extend_from_slice(&self.color[start..start + (rect.width as usize) * 4]);
        }
        Ok(out)
    }

    fn draw_pixels(&mut self, rect: PixelRect, rgba: &[u8]) -> SortlastResult<()> {
        let expected = rect.extent().pixel_count() * 4;
        if rgba.len() != expected {
            return Err(SortlastError::render(format!(
                "draw_pixels expects {expected} bytes for {rect:?}, got {}",
                rgba.len()
            )));
        }
        let Some(visible) = self.writable_rect(rect) else {
            return Ok(());
        };
        let stride = self.size.width as usize;
        let src_stride = rect.width as usize;
        for y in visible.y..visible.y + visible.height {
            let src_row = (y - rect.y) as usize;
            let src = (src_row * src_stride + (visible.x - rect.x) as usize) * 4;
            let dst = ((y as usize) * stride + visible.x as usize) * 4;
            let n = (visible.width as usize) * 4;
            self.color[dst..dst + n].copy_from_slice(&rgba[src..src + n]);
        }
        Ok(())
    }
}

#[cfg(test)]
#[path = "../../tests/unit/render/target.rs"]
mod tests;
