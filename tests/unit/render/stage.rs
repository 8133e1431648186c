use super::*;

fn request(window: Viewport, output: Extent) -> TileRequest {
    TileRequest {
        tile: 0,
        display: output,
        display_rect: PixelRect::from_extent(output),
        output,
        camera: Camera::new(window),
        precision: DepthPrecision::Single,
    }
}

fn vp(a: f64, b: f64, c: f64, d: f64) -> Viewport {
    Viewport::new(a, b, c, d).unwrap()
}

#[test]
fn pixel_centers_follow_the_camera_window() {
    let req = request(vp(0.5, 0.0, 1.0, 0.5), Extent::new(4, 2));
    assert_eq!(req.pixel_center(0, 0), (0.5 + 0.0625, 0.125));
    assert_eq!(req.pixel_center(3, 1), (0.5 + 0.4375, 0.375));
}

#[test]
fn box_covers_only_its_pixels() {
    let scene = BoxScene::new("quad")
        .with_box(vp(0.0, 0.0, 0.5, 0.5), [255, 0, 0, 255], 0.5)
        .unwrap();
    let req = request(Viewport::FULL, Extent::new(4, 4));
    let mut out = PartialImage::empty(req.output, req.precision);
    scene.render(&req, &mut out).unwrap();

    assert_eq!(out.sample(0), ([255, 0, 0, 255], 0.5));
    assert_eq!(out.sample(5), ([255, 0, 0, 255], 0.5));
    assert_eq!(out.sample(2).0, [0, 0, 0, 0]);
    assert!(out.sample(10).1.is_infinite());
}

#[test]
fn nearer_box_wins_regardless_of_insertion_order() {
    let near = ([0, 255, 0, 255], 0.2);
    let far = ([0, 0, 255, 255], 0.8);
    let draw = |first: ([u8; 4], f64), second: ([u8; 4], f64)| {
        let scene = BoxScene::new("overlap")
            .with_box(Viewport::FULL, first.0, first.1)
            .unwrap()
            .with_box(Viewport::FULL, second.0, second.1)
            .unwrap();
        let req = request(Viewport::FULL, Extent::new(2, 2));
        let mut out = PartialImage::empty(req.output, req.precision);
        scene.render(&req, &mut out).unwrap();
        out
    };
    assert_eq!(draw(near, far), draw(far, near));
    assert_eq!(draw(near, far).sample(3).0, near.0);
}

#[test]
fn box_outside_the_camera_leaves_a_placeholder() {
    let scene = BoxScene::new("elsewhere")
        .with_box(vp(0.0, 0.0, 0.25, 0.25), [1, 2, 3, 255], 0.1)
        .unwrap();
    let req = request(vp(0.5, 0.5, 1.0, 1.0), Extent::new(3, 3));
    let mut out = PartialImage::empty(req.output, req.precision);
    scene.render(&req, &mut out).unwrap();
    assert!(out.is_empty_contribution());
}

#[test]
fn wrong_buffer_size_is_render_error() {
    let scene = BoxScene::new("s");
    let req = request(Viewport::FULL, Extent::new(2, 2));
    let mut out = PartialImage::empty(Extent::new(1, 1), DepthPrecision::Single);
    assert!(matches!(
        scene.render(&req, &mut out),
        Err(SortlastError::Render(_))
    ));
}

#[test]
fn infinite_box_depth_is_rejected() {
    assert!(
        BoxScene::new("s")
            .with_box(Viewport::FULL, [0, 0, 0, 255], f64::INFINITY)
            .is_err()
    );
}
