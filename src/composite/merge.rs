//! Per-pixel merge rules. Both rules are exact: the merged result does not depend on the
//! order in which ranks contribute.

use rayon::prelude::*;

use crate::foundation::error::{SortlastError, SortlastResult};
use crate::foundation::math::{mul_div255_u8, pack_rgba};
use crate::image::partial::{DepthBuffer, PartialImage};

pub(crate) type PremulRgba8 = [u8; 4];

// Below this many pixels the rayon split costs more than it saves.
const PAR_MERGE_MIN_PIXELS: usize = 64 * 64;

/// How samples from different ranks are combined.
#[derive(
    Clone, Copy, Debug, Default, PartialEq, Eq, Hash, serde::Serialize, serde::Deserialize,
)]
#[serde(rename_all = "snake_case")]
pub enum MergeRule {
    /// Nearest depth wins; exact ties go to the larger packed color.
    #[default]
    Depth,
    /// Premultiplied "over" in visibility order of the fragments' ordering keys.
    Blend,
}

pub(crate) fn over(dst: PremulRgba8, src: PremulRgba8, opacity: f32) -> PremulRgba8 {
    let opacity = opacity.clamp(0.0, 1.0);
    if opacity <= 0.0 || src[3] == 0 {
        return dst;
    }

    let op = ((opacity * 255.0).round() as i32).clamp(0, 255) as u16;
    let sa = mul_div255_u8(u16::from(src[3]), op);
    if sa == 0 {
        return dst;
    }

    let inv = 255u16 - u16::from(sa);

    let mut out = [0u8; 4];
    out[3] = sa.saturating_add(mul_div255_u8(u16::from(dst[3]), inv));

    for i in 0..3 {
        let sc = mul_div255_u8(u16::from(src[i]), op);
        let dc = mul_div255_u8(u16::from(dst[i]), inv);
        out[i] = sc.saturating_add(dc);
    }
    out
}

fn normalized_depth(d: f64) -> f64 {
    if d.is_nan() { f64::INFINITY } else { d }
}

/// `true` when sample `a` beats sample `b` under the depth rule.
pub(crate) fn depth_wins(a: (PremulRgba8, f64), b: (PremulRgba8, f64)) -> bool {
    let (da, db) = (normalized_depth(a.1), normalized_depth(b.1));
    if da != db {
        return da < db;
    }
    pack_rgba(a.0) > pack_rgba(b.0)
}

trait DepthSample: Copy + Send + Sync {
    fn widen(self) -> f64;
    fn narrow(v: f64) -> Self;
}

impl DepthSample for f32 {
    fn widen(self) -> f64 {
        f64::from(self)
    }

    fn narrow(v: f64) -> Self {
        v as f32
    }
}

impl DepthSample for f64 {
    fn widen(self) -> f64 {
        self
    }

    fn narrow(v: f64) -> Self {
        v
    }
}

fn merge_depth_slices<D: DepthSample>(color: &mut [u8], depth: &mut [D], src: &PartialImage) {
    let merge_px = |idx: usize, c: &mut [u8], d: &mut D| {
        let mine = ([c[0], c[1], c[2], c[3]], d.widen());
        let theirs = src.sample(idx);
        if depth_wins(theirs, mine) {
            c.copy_from_slice(&theirs.0);
            *d = D::narrow(theirs.1);
        }
    };

    if depth.len() >= PAR_MERGE_MIN_PIXELS {
        color
            .par_chunks_exact_mut(4)
            .zip(depth.par_iter_mut())
            .enumerate()
            .for_each(|(idx, (c, d))| merge_px(idx, c, d));
    } else {
        for (idx, (c, d)) in color.chunks_exact_mut(4).zip(depth.iter_mut()).enumerate() {
            merge_px(idx, c, d);
        }
    }
}

/// Merge `src` into `dst` with the depth rule.
pub(crate) fn merge_depth_into(dst: &mut PartialImage, src: &PartialImage) -> SortlastResult<()> {
    if dst.extent() != src.extent() {
        return Err(SortlastError::render(format!(
            "cannot merge partial images of different sizes: {:?} vs {:?}",
            dst.extent(),
            src.extent()
        )));
    }
    let (color, depth) = dst.parts_mut();
    match depth {
        DepthBuffer::Single(d) => merge_depth_slices(color, d, src),
        DepthBuffer::Double(d) => merge_depth_slices(color, d, src),
    }
    Ok(())
}

/// Sort fragments into visibility order: nearest ordering key first, content fingerprint
/// as the tie-breaker so that equal keys still order identically on every run.
pub(crate) fn sort_for_blend(fragments: &mut [PartialImage]) {
    fragments.sort_by_cached_key(|f| (OrderedKey(f.ordering_key()), f.fingerprint()));
}

#[derive(Clone, Copy)]
struct OrderedKey(f64);

impl PartialEq for OrderedKey {
    fn eq(&self, other: &Self) -> bool {
        self.cmp(other).is_eq()
    }
}

impl Eq for OrderedKey {}

impl PartialOrd for OrderedKey {
    fn partial_cmp(&self, other: &Self) -> Option<std::cmp::Ordering> {
        Some(self.cmp(other))
    }
}

impl Ord for OrderedKey {
    fn cmp(&self, other: &Self) -> std::cmp::Ordering {
        normalized_depth(self.0).total_cmp(&normalized_depth(other.0))
    }
}

/// Blend fragments already in visibility order (nearest first) into one image.
///
/// Accumulates back to front so each step is a single "over" of a nearer fragment onto
/// everything behind it. The merged depth is the nearest depth of any fragment.
pub(crate) fn blend_in_order(fragments: &[PartialImage]) -> SortlastResult<Option<PartialImage>> {
    let Some(first) = fragments.first() else {
        return Ok(None);
    };
    let extent = first.extent();
    if let Some(bad) = fragments.iter().find(|f| f.extent() != extent) {
        return Err(SortlastError::render(format!(
            "cannot blend partial images of different sizes: {extent:?} vs {:?}",
            bad.extent()
        )));
    }

    let mut acc = PartialImage::empty(extent, first.depth().precision());
    for frag in fragments.iter().rev() {
        for idx in 0..extent.pixel_count() {
            let (back, back_depth) = acc.sample(idx);
            let (front, front_depth) = frag.sample(idx);
            let depth = normalized_depth(front_depth).min(normalized_depth(back_depth));
            acc.set_sample(idx, over(back, front, 1.0), depth);
        }
    }
    Ok(Some(acc))
}

/// Flatten premultiplied RGBA8 pixels over an opaque-or-not background color.
pub(crate) fn flatten_over_background(pixels: &mut [u8], background: PremulRgba8) {
    for px in pixels.chunks_exact_mut(4) {
        let out = over(background, [px[0], px[1], px[2], px[3]], 1.0);
        px.copy_from_slice(&out);
    }
}

#[cfg(test)]
#[path = "../../tests/unit/composite/merge.rs"]
mod tests;
