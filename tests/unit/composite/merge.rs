use super::*;
use crate::foundation::core::Extent;
use crate::image::partial::DepthPrecision;

fn flat(extent: Extent, rgba: [u8; 4], depth: f64, precision: DepthPrecision) -> PartialImage {
    let mut p = PartialImage::empty(extent, precision);
    for idx in 0..extent.pixel_count() {
        p.set_sample(idx, rgba, depth);
    }
    p
}

fn merged_in_order(parts: &[&PartialImage]) -> PartialImage {
    let mut acc = parts[0].clone();
    for p in &parts[1..] {
        merge_depth_into(&mut acc, p).unwrap();
    }
    acc
}

#[test]
fn over_opacity_0_is_noop() {
    let dst = [1, 2, 3, 4];
    let src = [200, 200, 200, 200];
    assert_eq!(over(dst, src, 0.0), dst);
}

#[test]
fn over_src_alpha_0_is_noop() {
    let dst = [10, 20, 30, 40];
    let src = [255, 255, 255, 0];
    assert_eq!(over(dst, src, 1.0), dst);
}

#[test]
fn over_src_opaque_replaces_dst() {
    let dst = [0, 0, 0, 255];
    let src = [255, 0, 0, 255];
    assert_eq!(over(dst, src, 1.0), src);
}

#[test]
fn over_dst_transparent_returns_src() {
    let dst = [0, 0, 0, 0];
    let src = [100, 110, 120, 200];
    assert_eq!(over(dst, src, 1.0), src);
}

#[test]
fn depth_wins_prefers_nearer_then_larger_color() {
    assert!(depth_wins(([0, 0, 0, 255], 0.2), ([255, 255, 255, 255], 0.3)));
    assert!(!depth_wins(([255, 255, 255, 255], 0.3), ([0, 0, 0, 255], 0.2)));
    assert!(depth_wins(([2, 0, 0, 255], 0.5), ([1, 0, 0, 255], 0.5)));
    assert!(!depth_wins(([1, 0, 0, 255], 0.5), ([2, 0, 0, 255], 0.5)));
    assert!(!depth_wins(([9, 9, 9, 255], f64::NAN), ([0, 0, 0, 255], 0.9)));
}

#[test]
fn placeholder_never_wins() {
    let e = Extent::new(3, 3);
    let real = flat(e, [10, 20, 30, 255], 0.9, DepthPrecision::Single);
    let placeholder = PartialImage::empty(e, DepthPrecision::Single);

    let mut a = real.clone();
    merge_depth_into(&mut a, &placeholder).unwrap();
    assert_eq!(a, real);

    let mut b = placeholder.clone();
    merge_depth_into(&mut b, &real).unwrap();
    assert_eq!(b, real);
}

#[test]
fn depth_merge_is_order_independent() {
    let e = Extent::new(4, 2);
    let mut a = PartialImage::empty(e, DepthPrecision::Single);
    let mut b = PartialImage::empty(e, DepthPrecision::Single);
    let mut c = PartialImage::empty(e, DepthPrecision::Single);
    for idx in 0..e.pixel_count() {
        let i = idx as u8;
        a.set_sample(idx, [i, 0, 0, 255], 0.1 * f64::from(i % 3));
        b.set_sample(idx, [0, i, 0, 255], 0.1 * f64::from((i + 1) % 3));
        // Same depth as `a` on every pixel: exercises the color tie-break.
        c.set_sample(idx, [0, 0, i, 255], 0.1 * f64::from(i % 3));
    }

    let reference = merged_in_order(&[&a, &b, &c]);
    for order in [[&a, &c, &b], [&b, &a, &c], [&b, &c, &a], [&c, &a, &b], [&c, &b, &a]] {
        assert_eq!(merged_in_order(&order), reference);
    }
}

#[test]
fn depth_merge_large_image_matches_small_path() {
    let e = Extent::new(80, 80);
    let mut a = PartialImage::empty(e, DepthPrecision::Double);
    let mut b = PartialImage::empty(e, DepthPrecision::Double);
    for idx in 0..e.pixel_count() {
        let near_a = idx % 2 == 0;
        a.set_sample(idx, [255, 0, 0, 255], if near_a { 0.25 } else { 0.75 });
        b.set_sample(idx, [0, 0, 255, 255], 0.5);
    }
    merge_depth_into(&mut a, &b).unwrap();
    for idx in 0..e.pixel_count() {
        let (rgba, depth) = a.sample(idx);
        if idx % 2 == 0 {
            assert_eq!((rgba, depth), ([255, 0, 0, 255], 0.25));
        } else {
            assert_eq!((rgba, depth), ([0, 0, 255, 255], 0.5));
        }
    }
}

#[test]
fn depth_merge_rejects_mismatched_extents() {
    let mut a = PartialImage::empty(Extent::new(2, 2), DepthPrecision::Single);
    let b = PartialImage::empty(Extent::new(2, 3), DepthPrecision::Single);
    assert!(matches!(
        merge_depth_into(&mut a, &b),
        Err(SortlastError::Render(_))
    ));
}

#[test]
fn blend_after_sort_is_order_independent() {
    let e = Extent::new(2, 2);
    let near = flat(e, [0, 0, 128, 128], 0.1, DepthPrecision::Single);
    let mid = flat(e, [0, 100, 0, 100], 0.4, DepthPrecision::Single);
    let far = flat(e, [200, 0, 0, 255], 0.8, DepthPrecision::Single);

    let blend = |frags: &[&PartialImage]| {
        let mut v: Vec<PartialImage> = frags.iter().map(|f| (*f).clone()).collect();
        sort_for_blend(&mut v);
        blend_in_order(&v).unwrap().unwrap()
    };

    let reference = blend(&[&near, &mid, &far]);
    assert_eq!(blend(&[&far, &near, &mid]), reference);
    assert_eq!(blend(&[&mid, &far, &near]), reference);

    let expected = over(over(far.sample(0).0, mid.sample(0).0, 1.0), near.sample(0).0, 1.0);
    assert_eq!(reference.sample(0), (expected, 0.1f32 as f64));
}

#[test]
fn blend_equal_keys_orders_by_fingerprint() {
    let e = Extent::new(1, 1);
    let a = flat(e, [50, 0, 0, 128], 0.5, DepthPrecision::Double);
    let b = flat(e, [0, 50, 0, 128], 0.5, DepthPrecision::Double);

    let mut ab = vec![a.clone(), b.clone()];
    let mut ba = vec![b, a];
    sort_for_blend(&mut ab);
    sort_for_blend(&mut ba);
    assert_eq!(ab, ba);
    assert_eq!(blend_in_order(&ab).unwrap(), blend_in_order(&ba).unwrap());
}

#[test]
fn blend_of_nothing_is_none() {
    assert!(blend_in_order(&[]).unwrap().is_none());
}

#[test]
fn placeholder_is_invisible_in_blend() {
    let e = Extent::new(2, 1);
    let real = flat(e, [10, 20, 30, 255], 0.3, DepthPrecision::Single);
    let mut frags = vec![PartialImage::empty(e, DepthPrecision::Single), real.clone()];
    sort_for_blend(&mut frags);
    let out = blend_in_order(&frags).unwrap().unwrap();
    assert_eq!(out.color(), real.color());
}

#[test]
fn flatten_over_opaque_background_is_opaque() {
    let mut px = vec![0, 0, 0, 0, 100, 0, 0, 128, 7, 8, 9, 255];
    flatten_over_background(&mut px, [20, 40, 60, 255]);
    assert_eq!(&px[0..4], &[20, 40, 60, 255]);
    assert_eq!(px[7], 255);
    assert_eq!(&px[8..12], &[7, 8, 9, 255]);
}
