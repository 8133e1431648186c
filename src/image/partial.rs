use crate::foundation::core::{Extent, PixelFormat};
use crate::foundation::error::{SortlastError, SortlastResult};
use crate::foundation::math::fingerprint_bytes;
use crate::image::raw::RawImage;
use crate::image::wire::{WireReader, WireWriter};

const PARTIAL_IMAGE_MAGIC: [u8; 4] = *b"SLPI";

/// Element kind of a depth buffer.
#[derive(
    Clone, Copy, Debug, Default, PartialEq, Eq, Hash, serde::Serialize, serde::Deserialize,
)]
#[serde(rename_all = "snake_case")]
pub enum DepthPrecision {
    /// 32-bit floats.
    #[default]
    Single,
    /// 64-bit floats.
    Double,
}

/// Per-pixel ordering keys; smaller is nearer, `+inf` is "nothing here".
#[derive(Clone, Debug, PartialEq)]
pub enum DepthBuffer {
    /// Single-precision depth.
    Single(Vec<f32>),
    /// Double-precision depth.
    Double(Vec<f64>),
}

impl DepthBuffer {
    /// Buffer of `len` samples at infinite distance.
    pub fn far(precision: DepthPrecision, len: usize) -> Self {
        match precision {
            DepthPrecision::Single => DepthBuffer::Single(vec![f32::INFINITY; len]),
            DepthPrecision::Double => DepthBuffer::Double(vec![f64::INFINITY; len]),
        }
    }

    /// Element kind.
    pub fn precision(&self) -> DepthPrecision {
        match self {
            DepthBuffer::Single(_) => DepthPrecision::Single,
            DepthBuffer::Double(_) => DepthPrecision::Double,
        }
    }

    /// Number of samples.
    pub fn len(&self) -> usize {
        match self {
            DepthBuffer::Single(d) => d.len(),
            DepthBuffer::Double(d) => d.len(),
        }
    }

    /// `true` when the buffer holds no samples.
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Sample `idx`, widened to `f64`.
    pub fn get(&self, idx: usize) -> f64 {
        match self {
            DepthBuffer::Single(d) => f64::from(d[idx]),
            DepthBuffer::Double(d) => d[idx],
        }
    }

    /// Store `value` at `idx`, narrowing for single-precision buffers.
    pub fn set(&mut self, idx: usize, value: f64) {
        match self {
            DepthBuffer::Single(d) => d[idx] = value as f32,
            DepthBuffer::Double(d) => d[idx] = value,
        }
    }

    /// Nearest finite sample, `+inf` when every sample is empty.
    pub fn nearest(&self) -> f64 {
        match self {
            DepthBuffer::Single(d) => d
                .iter()
                .copied()
                .filter(|v| v.is_finite())
                .fold(f64::INFINITY, |acc, v| acc.min(f64::from(v))),
            DepthBuffer::Double(d) => d
                .iter()
                .copied()
                .filter(|v| v.is_finite())
                .fold(f64::INFINITY, f64::min),
        }
    }

    /// Converted copy with the requested element kind.
    pub fn to_precision(&self, precision: DepthPrecision) -> DepthBuffer {
        match (self, precision) {
            (DepthBuffer::Single(_), DepthPrecision::Single)
            | (DepthBuffer::Double(_), DepthPrecision::Double) => self.clone(),
            (DepthBuffer::Single(d), DepthPrecision::Double) => {
                DepthBuffer::Double(d.iter().map(|&v| f64::from(v)).collect())
            }
            (DepthBuffer::Double(d), DepthPrecision::Single) => {
                DepthBuffer::Single(d.iter().map(|&v| v as f32).collect())
            }
        }
    }

    fn le_bytes(&self) -> Vec<u8> {
        match self {
            DepthBuffer::Single(d) => d.iter().flat_map(|v| v.to_le_bytes()).collect(),
            DepthBuffer::Double(d) => d.iter().flat_map(|v| v.to_le_bytes()).collect(),
        }
    }
}

/// One rank's render of its data partition for one tile: premultiplied RGBA8 color plus a
/// depth sample per pixel.
#[derive(Clone, Debug, PartialEq)]
pub struct PartialImage {
    extent: Extent,
    color: Vec<u8>,
    depth: DepthBuffer,
}

impl PartialImage {
    /// Placeholder for a rank with nothing to contribute: fully transparent and infinitely
    /// far, so it never wins a merge.
    pub fn empty(extent: Extent, precision: DepthPrecision) -> Self {
        Self {
            extent,
            color: vec![0; extent.pixel_count() * 4],
            depth: DepthBuffer::far(precision, extent.pixel_count()),
        }
    }

    /// Assemble from raw buffers, checking both lengths against `extent`.
    pub fn from_parts(extent: Extent, color: Vec<u8>, depth: DepthBuffer) -> SortlastResult<Self> {
        let n = extent.pixel_count();
        if color.len() != n * 4 || depth.len() != n {
            return Err(SortlastError::render(format!(
                "partial image {}x{} expects {} color bytes and {n} depth samples, got {} and {}",
                extent.width,
                extent.height,
                n * 4,
                color.len(),
                depth.len()
            )));
        }
        Ok(Self {
            extent,
            color,
            depth,
        })
    }

    /// Image dimensions.
    pub fn extent(&self) -> Extent {
        self.extent
    }

    /// Premultiplied RGBA8 samples.
    pub fn color(&self) -> &[u8] {
        &self.color
    }

    /// Depth samples.
    pub fn depth(&self) -> &DepthBuffer {
        &self.depth
    }

    pub(crate) fn parts_mut(&mut self) -> (&mut [u8], &mut DepthBuffer) {
        (&mut self.color, &mut self.depth)
    }

    /// Color and depth of one pixel.
    pub fn sample(&self, idx: usize) -> ([u8; 4], f64) {
        let c = &self.color[idx * 4..idx * 4 + 4];
        ([c[0], c[1], c[2], c[3]], self.depth.get(idx))
    }

    /// Overwrite one pixel.
    pub fn set_sample(&mut self, idx: usize, rgba: [u8; 4], depth: f64) {
        self.color[idx * 4..idx * 4 + 4].copy_from_slice(&rgba);
        self.depth.set(idx, depth);
    }

    /// `true` when no pixel carries coverage or a finite depth.
    pub fn is_empty_contribution(&self) -> bool {
        self.color.chunks_exact(4).all(|p| p[3] == 0) && self.depth.nearest().is_infinite()
    }

    /// Visibility ordering key for blend compositing: the nearest finite depth.
    pub fn ordering_key(&self) -> f64 {
        self.depth.nearest()
    }

    /// Content fingerprint, used to order fragments with equal keys deterministically.
    pub fn fingerprint(&self) -> u64 {
        fingerprint_bytes(&[&self.color, &self.depth.le_bytes()])
    }

    /// Drop depth and keep the color as a valid RGBA8 image. Zero-sized partials produce an
    /// invalid image.
    pub fn into_raw_image(self) -> RawImage {
        if self.extent.is_empty() {
            return RawImage::invalid();
        }
        match RawImage::from_pixels(self.extent, PixelFormat::Rgba8, self.color) {
            Ok(raw) => raw,
            Err(err) => {
                tracing::warn!(%err, "partial image has no usable color buffer");
                RawImage::invalid()
            }
        }
    }

    /// Serialize for transfer to another rank.
    pub fn encode(&self) -> Vec<u8> {
        let mut w = WireWriter::with_capacity(self.color.len() * 3 + 32);
        w.magic(PARTIAL_IMAGE_MAGIC);
        w.u32(self.extent.width);
        w.u32(self.extent.height);
        w.bytes(&self.color);
        match &self.depth {
            DepthBuffer::Single(d) => {
                w.u8(0);
                w.f32s(d);
            }
            DepthBuffer::Double(d) => {
                w.u8(1);
                w.f64s(d);
            }
        }
        w.finish()
    }

    /// Inverse of [`PartialImage::encode`].
    pub fn decode(bytes: &[u8]) -> SortlastResult<Self> {
        let mut r = WireReader::new(bytes);
        r.expect_magic(PARTIAL_IMAGE_MAGIC)?;
        let extent = Extent::new(r.u32()?, r.u32()?);
        let color = r.bytes()?;
        let depth = match r.u8()? {
            0 => DepthBuffer::Single(r.f32s()?),
            1 => DepthBuffer::Double(r.f64s()?),
            other => {
                return Err(SortlastError::transfer(format!(
                    "unknown depth precision tag {other}"
                )));
            }
        };
        r.finish()?;
        Self::from_parts(extent, color, depth).map_err(|e| SortlastError::transfer(e.to_string()))
    }
}

#[cfg(test)]
#[path = "../../tests/unit/image/partial.rs"]
mod tests;
