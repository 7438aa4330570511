use image::Rgba;
use nalgebra::{Point2, Vector2};
use perspective_paste::compute::{VanishingPoint, compute_two_point_vp};
use perspective_paste::editor::{Editor, InputEvent};
use perspective_paste::homography::Homography;
use perspective_paste::layer::DragSession;
use perspective_paste::render::flatten;
use perspective_paste::{Direction, LayerHandle, PerspectiveError, PixelBuffer};

const MARKS: [(f64, f64); 4] = [
    (120.0, 80.0),
    (300.0, 110.0),
    (290.0, 230.0),
    (110.0, 250.0),
];

fn gradient() -> PixelBuffer {
    PixelBuffer::from_fn(400, 300, |x, y| {
        Rgba([(x % 256) as u8, (y % 256) as u8, 90, 255])
    })
}

fn marked_scene() -> (Editor, LayerHandle) {
    let mut editor = Editor::default();
    let background = editor.add_layer("background");
    editor.set_layer_image(background, gradient()).unwrap();
    for (x, y) in MARKS {
        editor
            .append_control_point(background, Point2::new(x, y))
            .unwrap();
    }
    editor.compute_vanishing_points(background).unwrap();
    (editor, background)
}

fn assert_point_close(actual: Point2<f64>, expected: Point2<f64>, tolerance: f64) {
    assert!(
        (actual - expected).norm() <= tolerance,
        "{actual:?} is not within {tolerance} of {expected:?}"
    );
}

#[test]
fn scene_vanishing_points_are_finite() {
    let (editor, _) = marked_scene();
    let pair = editor.vanishing_points().unwrap();
    assert_point_close(pair.vp1.finite().unwrap(), Point2::new(728.0, 181.333), 0.01);
    assert_point_close(pair.vp2.finite().unwrap(), Point2::new(-318.0, 7526.0), 0.01);
}

#[test]
fn dragging_each_corner_keeps_the_source_vanishing_points() {
    let (mut editor, background) = marked_scene();
    let source = *editor.vanishing_points().unwrap();
    let pasted = editor.paste_selection(background).unwrap();
    assert_eq!(editor.layer(pasted).unwrap().original_size(), Vector2::new(190.0, 170.0));

    let targets = [
        Point2::new(115.0, 85.0),
        Point2::new(320.0, 100.0),
        Point2::new(300.0, 260.0),
        Point2::new(100.0, 240.0),
    ];
    for (corner, target) in targets.into_iter().enumerate() {
        editor.drag_corner(pasted, corner, target).unwrap();
        let layer = editor.layer(pasted).unwrap();
        let quad = *layer.warp_quad().unwrap();
        assert_eq!(quad[corner], target);

        let recomputed = compute_two_point_vp(&quad, 10.0).unwrap();
        for (actual, expected) in [(recomputed.vp1, source.vp1), (recomputed.vp2, source.vp2)] {
            let (VanishingPoint::Finite(a), VanishingPoint::Finite(e)) = (actual, expected) else {
                panic!("expected finite vanishing points, got {actual:?}");
            };
            assert_point_close(a, e, 1e-6 * e.coords.norm());
        }

        // the middle of the source lands inside the re-warped pixels
        let size = layer.original_size();
        let middle = Homography::from_rect_to_quad(size.x, size.y, &quad)
            .unwrap()
            .map_point(&Point2::new(size.x / 2.0, size.y / 2.0))
            .unwrap();
        let local = middle - layer.position;
        let pixel = layer
            .warped_image()
            .unwrap()
            .get_pixel(local.x as u32, local.y as u32);
        assert!(pixel[3] > 250, "{pixel:?} at {local:?}");
    }
}

#[test]
fn pasted_pixels_follow_the_layer() {
    let (mut editor, background) = marked_scene();
    let pasted = editor.paste_selection(background).unwrap();
    editor
        .layer_mut(pasted)
        .unwrap()
        .translate(Vector2::new(50.0, 0.0));

    let canvas = flatten(&editor.render(), 400, 300);
    // (200, 165) shows the selection pixel that used to be at (150, 165)
    let shown = canvas.get_pixel(200, 165);
    assert!(shown[0].abs_diff(150) <= 1, "{shown:?}");
    assert!(shown[1].abs_diff(165) <= 1, "{shown:?}");
    // outside the selection the background is untouched
    assert_eq!(*canvas.get_pixel(20, 20), Rgba([20, 20, 90, 255]));

    assert_eq!(editor.layer_at(&Point2::new(200.0, 165.0)), Some(pasted));
    assert_eq!(editor.layer_at(&Point2::new(20.0, 20.0)), Some(background));
    assert!(editor.move_layer(pasted, Direction::Down).unwrap());
    assert_eq!(editor.layer_at(&Point2::new(200.0, 165.0)), Some(background));
}

#[test]
fn free_drag_shrinks_toward_a_vanishing_point_and_restarts_fresh() {
    let (mut editor, background) = marked_scene();
    let vp1 = editor.vanishing_points().unwrap().vp1.finite().unwrap();

    editor.begin_layer_drag(background).unwrap();
    let center = editor.layer(background).unwrap().layer_position();
    let halfway = center + (vp1 - center) / 2.0;
    editor.update_layer_drag(background, halfway).unwrap();
    assert!((editor.layer(background).unwrap().layer_scale() - 0.5).abs() < 1e-9);

    editor.end_layer_drag(background).unwrap();
    assert_eq!(editor.layer(background).unwrap().session(), &DragSession::Idle);

    editor.begin_layer_drag(background).unwrap();
    let layer = editor.layer(background).unwrap();
    assert_eq!(layer.layer_scale(), 1.0);
    assert_eq!(layer.free_drag().unwrap().initial_center, center);
    editor.update_layer_drag(background, halfway).unwrap();
    assert!((editor.layer(background).unwrap().layer_scale() - 0.5).abs() < 1e-9);
}

#[test]
fn pointer_events_drive_a_constrained_corner_drag() {
    let (mut editor, background) = marked_scene();
    let pasted = editor.paste_selection(background).unwrap();
    editor.set_marking(true);

    // the pasted layer's warp quad starts as its bounding rectangle
    editor
        .handle_event(InputEvent::PointerDown(Point2::new(298.0, 248.0)))
        .unwrap();
    assert_eq!(
        editor.layer(pasted).unwrap().session(),
        &DragSession::ConstrainedDragging { corner: 2 }
    );
    editor
        .handle_event(InputEvent::PointerMove(Point2::new(310.0, 255.0)))
        .unwrap();
    editor.handle_event(InputEvent::PointerUp).unwrap();

    let layer = editor.layer(pasted).unwrap();
    assert_eq!(layer.session(), &DragSession::Idle);
    assert_eq!(layer.warp_quad().unwrap()[2], Point2::new(310.0, 255.0));
    assert!(layer.marks().is_empty());
}

#[test]
fn corner_dragged_onto_a_vanishing_point_is_refused() {
    let (mut editor, background) = marked_scene();
    let pasted = editor.paste_selection(background).unwrap();
    let snapshot = |editor: &Editor| {
        let layer = editor.layer(pasted).unwrap();
        (
            *layer.warp_quad().unwrap(),
            layer.position,
            layer.warped_image().unwrap().clone(),
        )
    };
    let before = snapshot(&editor);

    // a few pixels short of vp1 at (728, 181.333)
    let near_vp1 = Point2::new(723.655, 181.053);
    let err = editor.drag_corner(pasted, 2, near_vp1).unwrap_err();
    assert!(
        matches!(
            err,
            PerspectiveError::InvalidRegion { .. } | PerspectiveError::DegenerateGeometry(_)
        ),
        "{err:?}"
    );
    assert_eq!(snapshot(&editor), before);

    // the same drag through pointer events
    editor.set_marking(true);
    editor
        .handle_event(InputEvent::PointerDown(Point2::new(298.0, 248.0)))
        .unwrap();
    assert!(editor.handle_event(InputEvent::PointerMove(near_vp1)).is_err());
    editor.handle_event(InputEvent::PointerUp).unwrap();
    assert_eq!(snapshot(&editor), before);

    // the layer still follows a sane drag afterwards
    editor
        .drag_corner(pasted, 2, Point2::new(310.0, 255.0))
        .unwrap();
    assert_eq!(
        editor.layer(pasted).unwrap().warp_quad().unwrap()[2],
        Point2::new(310.0, 255.0)
    );
}

#[test]
fn failed_free_corner_drag_keeps_the_previous_quad() {
    let mut editor = Editor::default();
    let background = editor.add_layer("background");
    editor.set_layer_image(background, gradient()).unwrap();
    for (x, y) in MARKS {
        editor
            .append_control_point(background, Point2::new(x, y))
            .unwrap();
    }
    // no vanishing points yet, so corners move freely
    let pasted = editor.paste_selection(background).unwrap();
    assert!(!editor.layer(pasted).unwrap().is_constrained());

    let quad = *editor.layer(pasted).unwrap().warp_quad().unwrap();
    let position = editor.layer(pasted).unwrap().position;
    assert!(editor.drag_corner(pasted, 0, quad[1]).is_err());

    let layer = editor.layer(pasted).unwrap();
    assert_eq!(layer.warp_quad().unwrap(), &quad);
    assert_eq!(layer.position, position);
    assert_eq!(layer.warped_image().unwrap().dimensions(), (190, 170));
}
