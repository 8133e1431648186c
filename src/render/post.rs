//! Image-processing stages run on the composited tile after it has been pasted back into
//! the frame buffer.

use crate::composite::merge::flatten_over_background;
use crate::foundation::core::PixelRect;
use crate::foundation::error::{SortlastError, SortlastResult};
use crate::render::target::RenderTarget;

/// Screen-space pass over a region of the frame buffer.
pub trait ImageProcessingStage {
    /// Name used in logs and errors.
    fn name(&self) -> &str;

    /// Transform the pixels inside `region` in place.
    fn process(&self, target: &mut dyn RenderTarget, region: PixelRect) -> SortlastResult<()>;
}

/// Separable gaussian blur on premultiplied RGBA8.
#[derive(Clone, Copy, Debug, PartialEq, serde::Serialize, serde::Deserialize)]
pub struct BlurStage {
    /// Kernel half-width in pixels; 0 disables the blur.
    pub radius: u32,
    /// Gaussian standard deviation in pixels.
    pub sigma: f32,
}

impl ImageProcessingStage for BlurStage {
    fn name(&self) -> &str {
        "blur"
    }

    fn process(&self, target: &mut dyn RenderTarget, region: PixelRect) -> SortlastResult<()> {
        if region.is_degenerate() {
            return Ok(());
        }
        let src = target.read_pixels(region)?;
        let out = blur_rgba8_premul(&src, region.width, region.height, self.radius, self.sigma)?;
        target.draw_pixels(region, &out)
    }
}

/// Flatten the region over an opaque background so it no longer depends on what is
/// underneath.
#[derive(Clone, Copy, Debug, PartialEq, Eq, serde::Serialize, serde::Deserialize)]
pub struct FlattenStage {
    /// Premultiplied RGBA8 background.
    pub background: [u8; 4],
}

impl ImageProcessingStage for FlattenStage {
    fn name(&self) -> &str {
        "flatten"
    }

    fn process(&self, target: &mut dyn RenderTarget, region: PixelRect) -> SortlastResult<()> {
        if region.is_degenerate() {
            return Ok(());
        }
        let mut px = target.read_pixels(region)?;
        flatten_over_background(&mut px, self.background);
        target.draw_pixels(region, &px)
    }
}

pub(crate) fn blur_rgba8_premul(
    src: &[u8],
    width: u32,
    height: u32,
    radius: u32,
    sigma: f32,
) -> SortlastResult<Vec<u8>> {
    let expected_len = (width as usize)
        .checked_mul(height as usize)
        .and_then(|v| v.checked_mul(4))
        .ok_or_else(|| SortlastError::render("blur buffer size overflow"))?;
    if src.len() != expected_len {
        return Err(SortlastError::render(
            "blur expects a buffer of width*height*4 bytes",
        ));
    }
    if radius == 0 || expected_len == 0 {
        return Ok(src.to_vec());
    }

    let kernel = gaussian_kernel_q16(radius, sigma)?;
    let mut tmp = vec![0u8; expected_len];
    let mut out = vec![0u8; expected_len];

    blur_pass(src, &mut tmp, width, height, &kernel, Axis::Horizontal);
    blur_pass(&tmp, &mut out, width, height, &kernel, Axis::Vertical);
    Ok(out)
}

fn gaussian_kernel_q16(radius: u32, sigma: f32) -> SortlastResult<Vec<u32>> {
    if !sigma.is_finite() || sigma <= 0.0 {
        return Err(SortlastError::configuration("blur sigma must be > 0"));
    }

    let r = radius as i32;
    let sigma = f64::from(sigma);
    let denom = 2.0 * sigma * sigma;
    let weights_f: Vec<f64> = (-r..=r)
        .map(|i| (-f64::from(i) * f64::from(i) / denom).exp())
        .collect();
    let sum: f64 = weights_f.iter().sum();
    if sum <= 0.0 {
        return Err(SortlastError::render("gaussian kernel sum is zero"));
    }

    let mut weights: Vec<u32> = weights_f
        .iter()
        .map(|wf| ((wf / sum) * 65536.0).round().clamp(0.0, 65536.0) as u32)
        .collect();
    // Push the rounding residue into the center tap so the kernel sums to exactly 1.0.
    let acc: i64 = weights.iter().map(|&w| i64::from(w)).sum();
    let mid = weights.len() / 2;
    weights[mid] = (i64::from(weights[mid]) + 65536 - acc).clamp(0, 65536) as u32;

    Ok(weights)
}

#[derive(Clone, Copy)]
enum Axis {
    Horizontal,
    Vertical,
}

fn blur_pass(src: &[u8], dst: &mut [u8], width: u32, height: u32, k: &[u32], axis: Axis) {
    let radius = (k.len() / 2) as i32;
    let (w, h) = (width as i32, height as i32);
    for y in 0..h {
        for x in 0..w {
            let mut acc = [0u64; 4];
            for (ki, &kw) in k.iter().enumerate() {
                let d = ki as i32 - radius;
                let (sx, sy) = match axis {
                    Axis::Horizontal => ((x + d).clamp(0, w - 1), y),
                    Axis::Vertical => (x, (y + d).clamp(0, h - 1)),
                };
                let idx = ((sy * w + sx) as usize) * 4;
                for c in 0..4 {
                    acc[c] += u64::from(kw) * u64::from(src[idx + c]);
                }
            }
            let out_idx = ((y * w + x) as usize) * 4;
            for c in 0..4 {
                dst[out_idx + c] = q16_to_u8(acc[c]);
            }
        }
    }
}

fn q16_to_u8(acc: u64) -> u8 {
    ((acc + 32768) >> 16).min(255) as u8
}

#[cfg(test)]
#[path = "../../tests/unit/render/post.rs"]
mod tests;
