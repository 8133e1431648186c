use super::*;
use crate::foundation::core::{TileScale, Viewport};
use crate::render::target::SoftwareWindow;

fn gradient_window(size: Extent) -> SoftwareWindow {
    let mut w = SoftwareWindow::new(size);
    let data: Vec<u8> = (0..size.pixel_count() * 4).map(|i| (i % 251) as u8).collect();
    w.draw_pixels(PixelRect::from_extent(size), &data).unwrap();
    w
}

#[test]
fn capture_then_push_reproduces_frame_buffer() {
    let size = Extent::new(7, 5);
    let mut w = gradient_window(size);
    let original = w.pixels().to_vec();

    let img = RawImage::capture(&w, PixelRect::from_extent(size));
    assert!(img.is_valid());
    w.clear([0, 0, 0, 0]);
    img.push_to_frame_buffer(&mut w).unwrap();

    assert_eq!(w.pixels(), original.as_slice());
}

#[test]
fn capture_rejects_degenerate_and_out_of_frame_regions() {
    let w = gradient_window(Extent::new(4, 4));
    assert!(!RawImage::capture(&w, PixelRect::new(0, 0, 0, 4)).is_valid());
    assert!(!RawImage::capture(&w, PixelRect::new(2, 2, 4, 4)).is_valid());

    let empty = SoftwareWindow::new(Extent::new(0, 0));
    assert!(!RawImage::capture(&empty, PixelRect::new(0, 0, 1, 1)).is_valid());
}

#[test]
fn capture_viewport_reads_the_viewport_region() {
    let mut w = gradient_window(Extent::new(6, 4));
    w.set_viewport(Viewport::new(0.5, 0.5, 1.0, 1.0).unwrap());
    let img = RawImage::capture_viewport(&w);
    assert_eq!(img, RawImage::capture(&w, PixelRect::new(3, 2, 3, 2)));
    assert_eq!(img.extent(), Extent::new(3, 2));
}

#[test]
fn valid_images_hold_exact_byte_counts() {
    assert!(RawImage::from_pixels(Extent::new(2, 2), PixelFormat::Rgb8, vec![0; 12]).is_ok());
    assert!(RawImage::from_pixels(Extent::new(2, 2), PixelFormat::Rgba8, vec![0; 12]).is_err());
    assert!(RawImage::from_pixels(Extent::new(0, 2), PixelFormat::Rgba8, vec![]).is_err());
}

#[test]
fn invalid_images_are_never_pushed() {
    let mut w = gradient_window(Extent::new(3, 3));
    let before = w.pixels().to_vec();
    RawImage::invalid().push_to_frame_buffer(&mut w).unwrap();
    RawImage::invalid().push_to_viewport(&mut w).unwrap();
    assert_eq!(w.pixels(), before.as_slice());
}

#[test]
fn push_to_viewport_scales_into_viewport_region() {
    let mut w = SoftwareWindow::new(Extent::new(8, 4));
    w.set_viewport(Viewport::new(0.5, 0.0, 1.0, 1.0).unwrap());
    let img = RawImage::solid(Extent::new(2, 2), [10, 20, 30, 255]).unwrap();
    img.push_to_viewport(&mut w).unwrap();

    assert_eq!(w.pixel(3, 0), Some([0, 0, 0, 0]));
    for y in 0..4 {
        for x in 4..8 {
            assert_eq!(w.pixel(x, y), Some([10, 20, 30, 255]));
        }
    }
}

#[test]
fn push_to_viewport_uses_tile_transform() {
    let mut w = SoftwareWindow::new(Extent::new(4, 4));
    w.set_tile_scale(TileScale::new(2, 1));
    w.set_tile_viewport(Viewport::new(0.0, 0.0, 0.5, 1.0).unwrap());
    w.set_viewport(Viewport::new(0.25, 0.0, 0.5, 1.0).unwrap());
    let img = RawImage::solid(Extent::new(1, 1), [1, 2, 3, 4]).unwrap();
    img.push_to_viewport(&mut w).unwrap();

    // Viewport [0.25, 0.5] of an 8-wide wall lands on pixels 2..4 of this 4-wide tile.
    assert_eq!(w.pixel(1, 0), Some([0, 0, 0, 0]));
    assert_eq!(w.pixel(2, 0), Some([1, 2, 3, 4]));
    assert_eq!(w.pixel(3, 3), Some([1, 2, 3, 4]));
}

#[test]
fn rgb_images_gain_opaque_alpha() {
    let img =
        RawImage::from_pixels(Extent::new(1, 2), PixelFormat::Rgb8, vec![1, 2, 3, 4, 5, 6])
            .unwrap();
    assert_eq!(img.to_rgba8(), vec![1, 2, 3, 255, 4, 5, 6, 255]);
}

#[test]
fn resized_repeats_source_pixels() {
    let img = RawImage::from_pixels(
        Extent::new(2, 1),
        PixelFormat::Rgba8,
        vec![1, 1, 1, 1, 2, 2, 2, 2],
    )
    .unwrap();
    let big = img.resized(Extent::new(4, 1));
    assert_eq!(big.pixels(), &[1, 1, 1, 1, 1, 1, 1, 1, 2, 2, 2, 2, 2, 2, 2, 2]);
}

#[test]
fn decode_restores_encoded_image() {
    let img = RawImage::solid(Extent::new(3, 2), [4, 5, 6, 7]).unwrap();
    assert_eq!(RawImage::decode(&img.encode()).unwrap(), img);
    assert!(!RawImage::decode(&RawImage::invalid().encode())
        .unwrap()
        .is_valid());
}

#[test]
fn decode_rejects_truncated_payloads() {
    let bytes = RawImage::solid(Extent::new(3, 2), [4, 5, 6, 7])
        .unwrap()
        .encode();
    let err = RawImage::decode(&bytes[..bytes.len() - 1]).unwrap_err();
    assert!(matches!(err, SortlastError::Transfer(_)));
    assert!(RawImage::decode(b"nope").is_err());
}
