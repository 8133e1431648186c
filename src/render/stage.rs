use crate::composite::merge::depth_wins;
use crate::foundation::core::{Extent, PixelRect, Viewport};
use crate::foundation::error::{SortlastError, SortlastResult};
use crate::image::partial::{DepthPrecision, PartialImage};
use crate::render::camera::Camera;

/// What one rank must render for one tile of one frame.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct TileRequest {
    /// Row-major tile index.
    pub tile: usize,
    /// Full display size in pixels.
    pub display: Extent,
    /// Part of the display this request covers, in display pixels.
    pub display_rect: PixelRect,
    /// Size of the image to produce. Smaller than `display_rect` when an image reduction
    /// factor is active.
    pub output: Extent,
    /// Camera narrowed to `display_rect`.
    pub camera: Camera,
    /// Depth element kind of the output.
    pub precision: DepthPrecision,
}

impl TileRequest {
    /// World-space center of output pixel `(x, y)`.
    pub fn pixel_center(&self, x: u32, y: u32) -> (f64, f64) {
        let w = &self.camera.window;
        (
            w.xmin() + (f64::from(x) + 0.5) / f64::from(self.output.width) * w.width(),
            w.ymin() + (f64::from(y) + 0.5) / f64::from(self.output.height) * w.height(),
        )
    }
}

/// One step of the local render pass: draws this rank's share of the scene.
///
/// Stages run in order on the same partial image and must depth-test against what earlier
/// stages wrote. A stage that draws nothing leaves the placeholder untouched.
pub trait SceneStage {
    /// Name used in logs and errors.
    fn name(&self) -> &str;

    /// Draw into `out`, whose extent is `request.output`.
    fn render(&self, request: &TileRequest, out: &mut PartialImage) -> SortlastResult<()>;
}

/// Axis-aligned, constant-depth rectangle in normalized world space.
#[derive(Clone, Copy, Debug, PartialEq, serde::Serialize, serde::Deserialize)]
pub struct BoxPrim {
    /// Covered world rectangle.
    pub rect: Viewport,
    /// Premultiplied RGBA8 color.
    pub color: [u8; 4],
    /// Distance from the viewer; smaller is nearer.
    pub depth: f64,
}

/// Minimal CPU scene: a list of boxes, drawn with a per-pixel depth test.
#[derive(Clone, Debug, Default, PartialEq, serde::Serialize, serde::Deserialize)]
pub struct BoxScene {
    name: String,
    boxes: Vec<BoxPrim>,
}

impl BoxScene {
    /// Empty scene.
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            boxes: Vec::new(),
        }
    }

    /// Add a box. Non-finite depths are rejected.
    pub fn with_box(mut self, rect: Viewport, color: [u8; 4], depth: f64) -> SortlastResult<Self> {
        if !depth.is_finite() {
            return Err(SortlastError::configuration(format!(
                "box depth must be finite, got {depth}"
            )));
        }
        self.boxes.push(BoxPrim { rect, color, depth });
        Ok(self)
    }

    /// Boxes in insertion order.
    pub fn boxes(&self) -> &[BoxPrim] {
        &self.boxes
    }
}

impl SceneStage for BoxScene {
    fn name(&self) -> &str {
        &self.name
    }

    fn render(&self, request: &TileRequest, out: &mut PartialImage) -> SortlastResult<()> {
        if out.extent() != request.output {
            return Err(SortlastError::render(format!(
                "stage '{}' got a {:?} buffer for a {:?} request",
                self.name,
                out.extent(),
                request.output
            )));
        }
        let visible: Vec<&BoxPrim> = self
            .boxes
            .iter()
            .filter(|b| b.rect.intersect(&request.camera.window).is_some())
            .collect();
        if visible.is_empty() {
            return Ok(());
        }

        let quantize = |d: f64| match request.precision {
            DepthPrecision::Single => f64::from(d as f32),
            DepthPrecision::Double => d,
        };
        let width = request.output.width;
        for y in 0..request.output.height {
            for x in 0..width {
                let (wx, wy) = request.pixel_center(x, y);
                let idx = (y as usize) * (width as usize) + x as usize;
                for b in &visible {
                    let r = &b.rect;
                    let inside = wx >= r.xmin() && wx < r.xmax() && wy >= r.ymin() && wy < r.ymax();
                    if inside && depth_wins((b.color, quantize(b.depth)), out.sample(idx)) {
                        out.set_sample(idx, b.color, b.depth);
                    }
                }
            }
        }
        Ok(())
    }
}

#[cfg(test)]
#[path = "../../tests/unit/render/stage.rs"]
mod tests;
