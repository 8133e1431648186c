use crate::foundation::error::{SortlastError, SortlastResult};

const NORMALIZED_EPS: f64 = 1e-9;

/// Pixel dimensions of a window, image or tile.
#[derive(
    Clone, Copy, Debug, Default, PartialEq, Eq, Hash, serde::Serialize, serde::Deserialize,
)]
pub struct Extent {
    /// Width in pixels.
    pub width: u32,
    /// Height in pixels.
    pub height: u32,
}

impl Extent {
    /// Create an extent.
    pub const fn new(width: u32, height: u32) -> Self {
        Self { width, height }
    }

    /// `true` when either dimension is zero.
    pub fn is_empty(self) -> bool {
        self.width == 0 || self.height == 0
    }

    /// Number of pixels covered.
    pub fn pixel_count(self) -> usize {
        (self.width as usize).saturating_mul(self.height as usize)
    }

    /// Extent reduced by an integer factor, rounding up so that no edge pixel is lost.
    pub fn reduced(self, factor: u32) -> Self {
        let factor = factor.max(1);
        Self {
            width: self.width.div_ceil(factor),
            height: self.height.div_ceil(factor),
        }
    }
}

/// Integer pixel rectangle, origin at the top-left, y grows downward.
#[derive(
    Clone, Copy, Debug, Default, PartialEq, Eq, Hash, serde::Serialize, serde::Deserialize,
)]
pub struct PixelRect {
    /// Left edge.
    pub x: u32,
    /// Top edge.
    pub y: u32,
    /// Width in pixels.
    pub width: u32,
    /// Height in pixels.
    pub height: u32,
}

impl PixelRect {
    /// Create a rectangle.
    pub const fn new(x: u32, y: u32, width: u32, height: u32) -> Self {
        Self {
            x,
            y,
            width,
            height,
        }
    }

    /// Rectangle anchored at the origin covering `extent`.
    pub fn from_extent(extent: Extent) -> Self {
        Self::new(0, 0, extent.width, extent.height)
    }

    /// Size of the rectangle.
    pub fn extent(self) -> Extent {
        Extent::new(self.width, self.height)
    }

    /// `true` when the rectangle covers no pixels.
    pub fn is_degenerate(self) -> bool {
        self.width == 0 || self.height == 0
    }

    /// Exclusive right edge.
    pub fn right(self) -> u64 {
        u64::from(self.x) + u64::from(self.width)
    }

    /// Exclusive bottom edge.
    pub fn bottom(self) -> u64 {
        u64::from(self.y) + u64::from(self.height)
    }

    /// `true` when the rectangle lies entirely inside a frame of size `extent`.
    pub fn fits_within(self, extent: Extent) -> bool {
        self.right() <= u64::from(extent.width) && self.bottom() <= u64::from(extent.height)
    }

    /// Overlap of two rectangles, `None` when they share no pixel.
    pub fn intersect(self, other: PixelRect) -> Option<PixelRect> {
        let x0 = self.x.max(other.x);
        let y0 = self.y.max(other.y);
        let x1 = self.right().min(other.right());
        let y1 = self.bottom().min(other.bottom());
        if u64::from(x0) >= x1 || u64::from(y0) >= y1 {
            return None;
        }
        Some(PixelRect::new(
            x0,
            y0,
            (x1 - u64::from(x0)) as u32,
            (y1 - u64::from(y0)) as u32,
        ))
    }
}

/// Normalized `[0,1]` rectangle in renderer-local coordinates.
///
/// Always well-formed: every constructor rejects non-finite values, coordinates outside
/// `[0,1]`, and `min > max` on either axis.
#[derive(Clone, Copy, Debug, PartialEq, serde::Serialize, serde::Deserialize)]
#[serde(try_from = "[f64; 4]", into = "[f64; 4]")]
pub struct Viewport {
    xmin: f64,
    ymin: f64,
    xmax: f64,
    ymax: f64,
}

impl Viewport {
    /// The whole `[0,0,1,1]` rectangle.
    pub const FULL: Viewport = Viewport {
        xmin: 0.0,
        ymin: 0.0,
        xmax: 1.0,
        ymax: 1.0,
    };

    /// Create a validated viewport.
    pub fn new(xmin: f64, ymin: f64, xmax: f64, ymax: f64) -> SortlastResult<Self> {
        let coords = [xmin, ymin, xmax, ymax];
        if coords.iter().any(|v| !v.is_finite()) {
            return Err(SortlastError::configuration(format!(
                "viewport has non-finite coordinates: {coords:?}"
            )));
        }
        if coords
            .iter()
            .any(|&v| !(-NORMALIZED_EPS..=1.0 + NORMALIZED_EPS).contains(&v))
        {
            return Err(SortlastError::configuration(format!(
                "viewport must lie within [0,1]: {coords:?}"
            )));
        }
        if xmin > xmax + NORMALIZED_EPS || ymin > ymax + NORMALIZED_EPS {
            return Err(SortlastError::configuration(format!(
                "viewport must have min <= max on each axis: {coords:?}"
            )));
        }
        Ok(Self::clamped(xmin, ymin, xmax, ymax))
    }

    // Inputs already known to be finite and ordered up to rounding noise.
    fn clamped(xmin: f64, ymin: f64, xmax: f64, ymax: f64) -> Self {
        let xmin = xmin.clamp(0.0, 1.0);
        let ymin = ymin.clamp(0.0, 1.0);
        Self {
            xmin,
            ymin,
            xmax: xmax.clamp(xmin, 1.0),
            ymax: ymax.clamp(ymin, 1.0),
        }
    }

    /// Left edge.
    pub fn xmin(&self) -> f64 {
        self.xmin
    }

    /// Top edge.
    pub fn ymin(&self) -> f64 {
        self.ymin
    }

    /// Right edge.
    pub fn xmax(&self) -> f64 {
        self.xmax
    }

    /// Bottom edge.
    pub fn ymax(&self) -> f64 {
        self.ymax
    }

    /// Horizontal span.
    pub fn width(&self) -> f64 {
        self.xmax - self.xmin
    }

    /// Vertical span.
    pub fn height(&self) -> f64 {
        self.ymax - self.ymin
    }

    /// `true` when the viewport covers no area.
    pub fn is_empty(&self) -> bool {
        self.width() <= 0.0 || self.height() <= 0.0
    }

    /// Overlap with `other`, `None` when the overlap has no area.
    pub fn intersect(&self, other: &Viewport) -> Option<Viewport> {
        let xmin = self.xmin.max(other.xmin);
        let ymin = self.ymin.max(other.ymin);
        let xmax = self.xmax.min(other.xmax);
        let ymax = self.ymax.min(other.ymax);
        if xmin >= xmax || ymin >= ymax {
            return None;
        }
        Some(Self::clamped(xmin, ymin, xmax, ymax))
    }

    /// Same size, moved so that its min corner sits at the origin.
    pub fn translated_to_origin(&self) -> Viewport {
        Self::clamped(0.0, 0.0, self.width(), self.height())
    }

    /// Map `inner`, expressed relative to this rectangle, into this rectangle's space.
    pub fn sub_window(&self, inner: &Viewport) -> Viewport {
        Self::clamped(
            self.xmin + inner.xmin * self.width(),
            self.ymin + inner.ymin * self.height(),
            self.xmin + inner.xmax * self.width(),
            self.ymin + inner.ymax * self.height(),
        )
    }

    /// Normalized pixel rectangle for a frame of `extent` pixels.
    pub fn from_pixel_rect(rect: PixelRect, extent: Extent) -> SortlastResult<Viewport> {
        if extent.is_empty() {
            return Err(SortlastError::configuration(
                "cannot normalize a pixel rect against an empty extent",
            ));
        }
        let w = f64::from(extent.width);
        let h = f64::from(extent.height);
        Viewport::new(
            f64::from(rect.x) / w,
            f64::from(rect.y) / h,
            rect.right() as f64 / w,
            rect.bottom() as f64 / h,
        )
    }

    /// Pixel rectangle covered by this viewport in a frame of `extent` pixels.
    ///
    /// Edges are rounded independently so that adjacent viewports tile without gaps.
    pub fn to_pixel_rect(&self, extent: Extent) -> PixelRect {
        let x0 = scale_round(self.xmin, extent.width);
        let y0 = scale_round(self.ymin, extent.height);
        let x1 = scale_round(self.xmax, extent.width);
        let y1 = scale_round(self.ymax, extent.height);
        PixelRect::new(x0, y0, x1.saturating_sub(x0), y1.saturating_sub(y0))
    }

    /// `[xmin, ymin, xmax, ymax]`.
    pub fn to_array(&self) -> [f64; 4] {
        [self.xmin, self.ymin, self.xmax, self.ymax]
    }
}

impl Default for Viewport {
    fn default() -> Self {
        Self::FULL
    }
}

impl TryFrom<[f64; 4]> for Viewport {
    type Error = SortlastError;

    fn try_from(v: [f64; 4]) -> SortlastResult<Self> {
        Viewport::new(v[0], v[1], v[2], v[3])
    }
}

impl From<Viewport> for [f64; 4] {
    fn from(v: Viewport) -> Self {
        v.to_array()
    }
}

pub(crate) fn scale_round(v: f64, full: u32) -> u32 {
    (v * f64::from(full)).round().clamp(0.0, f64::from(u32::MAX)) as u32
}

/// Tile magnification applied by the windowing layer so that on-screen annotations span a
/// whole display wall.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, serde::Serialize, serde::Deserialize)]
pub struct TileScale {
    /// Horizontal scale.
    pub x: u32,
    /// Vertical scale.
    pub y: u32,
}

impl TileScale {
    /// No magnification.
    pub const ONE: TileScale = TileScale { x: 1, y: 1 };

    /// Create a tile scale.
    pub const fn new(x: u32, y: u32) -> Self {
        Self { x, y }
    }
}

impl Default for TileScale {
    fn default() -> Self {
        Self::ONE
    }
}

/// Grid of physical tiles dividing the full display; `(1,1)` is a single window.
///
/// Tiles are numbered row-major: tile `row * cols + col` is displayed by world rank
/// `row * cols + col`.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, serde::Serialize, serde::Deserialize)]
#[serde(try_from = "(u32, u32)", into = "(u32, u32)")]
pub struct TileLayout {
    rows: u32,
    cols: u32,
}

impl TileLayout {
    /// A single, non-tiled window.
    pub const SINGLE: TileLayout = TileLayout { rows: 1, cols: 1 };

    /// Create a validated layout. Zero rows or columns is a configuration error.
    pub fn new(rows: u32, cols: u32) -> SortlastResult<Self> {
        if rows == 0 || cols == 0 {
            return Err(SortlastError::configuration(format!(
                "tile layout must have at least one row and column, got {rows}x{cols}"
            )));
        }
        Ok(Self { rows, cols })
    }

    /// Number of tile rows.
    pub fn rows(&self) -> u32 {
        self.rows
    }

    /// Number of tile columns.
    pub fn cols(&self) -> u32 {
        self.cols
    }

    /// Total number of tiles.
    pub fn tile_count(&self) -> usize {
        (self.rows as usize) * (self.cols as usize)
    }

    /// `true` when the display is split into more than one tile.
    pub fn is_tiled(&self) -> bool {
        self.rows > 1 || self.cols > 1
    }

    /// `(row, col)` of a row-major tile index.
    pub fn tile_coords(&self, index: usize) -> Option<(u32, u32)> {
        if index >= self.tile_count() {
            return None;
        }
        let cols = self.cols as usize;
        Some(((index / cols) as u32, (index % cols) as u32))
    }

    /// Full display size for windows of `window` pixels each.
    pub fn display_extent(&self, window: Extent) -> Extent {
        Extent::new(
            window.width.saturating_mul(self.cols),
            window.height.saturating_mul(self.rows),
        )
    }

    /// Pixel rectangle of tile `index` in full display coordinates.
    pub fn tile_rect(&self, index: usize, window: Extent) -> Option<PixelRect> {
        let (row, col) = self.tile_coords(index)?;
        Some(PixelRect::new(
            col.saturating_mul(window.width),
            row.saturating_mul(window.height),
            window.width,
            window.height,
        ))
    }
}

impl Default for TileLayout {
    fn default() -> Self {
        Self::SINGLE
    }
}

impl TryFrom<(u32, u32)> for TileLayout {
    type Error = SortlastError;

    fn try_from((rows, cols): (u32, u32)) -> SortlastResult<Self> {
        TileLayout::new(rows, cols)
    }
}

impl From<TileLayout> for (u32, u32) {
    fn from(t: TileLayout) -> Self {
        (t.rows, t.cols)
    }
}

/// Pixel formats carried by [`crate::RawImage`].
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, serde::Serialize, serde::Deserialize)]
pub enum PixelFormat {
    /// Premultiplied RGBA, 4 bytes per pixel.
    Rgba8,
    /// RGB, 3 bytes per pixel.
    Rgb8,
}

impl PixelFormat {
    /// Bytes used by one pixel.
    pub fn bytes_per_pixel(self) -> usize {
        match self {
            PixelFormat::Rgba8 => 4,
            PixelFormat::Rgb8 => 3,
        }
    }
}

#[cfg(test)]
#[path = "../../tests/unit/foundation/core.rs"]
mod tests;
