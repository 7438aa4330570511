//! Corner dragging that keeps a quad a two-point-perspective rectangle.
//!
//! Corners are in clockwise image order: edges 0-1 and 2-3 meet at vp1,
//! edges 1-2 and 3-0 meet at vp2.

use nalgebra::Point2;
use tracing::trace;

use crate::{
    Quad,
    compute::{VanishingPoint, VanishingPointPair},
    utils::line_intersection,
};

/// Re-derives the three other corners after `corner` moved to `pos`.
///
/// The neighbour sharing the vp1 edge is placed `width` away along the line to vp1,
/// the neighbour sharing the vp2 edge `height` away along the line to vp2, and the
/// diagonal corner where the lines back to the opposite vanishing points cross.
pub fn solve_constrained_quad(
    quad: &Quad,
    corner: usize,
    pos: Point2<f64>,
    vanishing_points: &VanishingPointPair,
    width: f64,
    height: f64,
) -> Quad {
    let corner = corner % 4;
    let VanishingPointPair { vp1, vp2 } = vanishing_points;
    let along_vp1 = corner ^ 1;
    let along_vp2 = 3 - corner;
    let diagonal = (corner + 2) % 4;

    // neighbours stay on their current side; a collapsed quad falls back to
    // corners 0,3 before their vp1 neighbour and corners 0,1 before their vp2 neighbour
    let width_sign = walk_sign(
        vp1,
        &quad[corner],
        &quad[along_vp1],
        if matches!(corner, 0 | 3) { 1.0 } else { -1.0 },
    );
    let height_sign = walk_sign(
        vp2,
        &quad[corner],
        &quad[along_vp2],
        if matches!(corner, 0 | 1) { 1.0 } else { -1.0 },
    );

    let mut out = *quad;
    out[corner] = pos;
    out[along_vp1] = vp1.point_along(&pos, width_sign * width);
    out[along_vp2] = vp2.point_along(&pos, height_sign * height);

    let a = out[along_vp1];
    let b = out[along_vp2];
    let a_end = vp2.toward(&a);
    out[diagonal] = line_intersection(&a, &a_end, &b, &vp1.toward(&b)).or_end(a_end);
    trace!("corner {corner} -> {pos:?}: {out:?}");
    out
}

/// `1.0` when `neighbour` lies away from `vp` as seen from `corner`, `-1.0` when
/// it lies toward it, `fallback` when the quad gives no side.
fn walk_sign(
    vp: &VanishingPoint,
    corner: &Point2<f64>,
    neighbour: &Point2<f64>,
    fallback: f64,
) -> f64 {
    let away = vp.point_along(corner, 1.0) - corner;
    let side = (neighbour - corner).dot(&away);
    if side > 0.0 {
        1.0
    } else if side < 0.0 {
        -1.0
    } else {
        fallback
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::PixelBuffer;
    use crate::compute::compute_two_point_vp;
    use crate::error::PerspectiveError;
    use crate::warp::{Resample, warp_onto_quad};
    use nalgebra::Vector2;

    fn assert_same_vanishing_point(actual: VanishingPoint, expected: VanishingPoint) {
        match (actual, expected) {
            (VanishingPoint::Finite(a), VanishingPoint::Finite(e)) => {
                assert!((a - e).norm() < 1e-4, "vp moved: {a:?} vs {e:?}")
            }
            (VanishingPoint::AtInfinity(a), VanishingPoint::AtInfinity(e)) => {
                assert!(a.perp(&e).abs() < 1e-9)
            }
            (VanishingPoint::Finite(a), VanishingPoint::AtInfinity(e)) => {
                // numerically parallel lines meet very far away along the same direction
                assert!(a.coords.norm() > 1e6);
                assert!(a.coords.normalize().perp(&e).abs() < 1e-3);
            }
            (a, e) => panic!("expected {e:?}, got {a:?}"),
        }
    }

    fn pair() -> VanishingPointPair {
        VanishingPointPair {
            vp1: VanishingPoint::Finite(Point2::new(-800.0, 150.0)),
            vp2: VanishingPoint::Finite(Point2::new(250.0, -900.0)),
        }
    }

    #[test]
    fn every_corner_keeps_the_vanishing_points() {
        let vps = pair();
        let start = solve_constrained_quad(
            &[Point2::origin(); 4],
            0,
            Point2::new(100.0, 100.0),
            &vps,
            200.0,
            150.0,
        );
        let targets = [
            Point2::new(90.0, 120.0),
            Point2::new(330.0, 95.0),
            Point2::new(340.0, 300.0),
            Point2::new(70.0, 280.0),
        ];
        for (corner, target) in targets.into_iter().enumerate() {
            let quad = solve_constrained_quad(&start, corner, target, &vps, 200.0, 150.0);
            assert_eq!(quad[corner], target);
            let recomputed = compute_two_point_vp(&quad, 10.0).unwrap();
            assert_same_vanishing_point(recomputed.vp1, vps.vp1);
            assert_same_vanishing_point(recomputed.vp2, vps.vp2);
        }
    }

    #[test]
    fn dragging_next_to_a_vanishing_point_outgrows_the_warp() {
        let vps = VanishingPointPair {
            vp1: VanishingPoint::Finite(Point2::new(900.0, 180.0)),
            vp2: VanishingPoint::Finite(Point2::new(-300.0, 4000.0)),
        };
        let rect = [
            Point2::new(100.0, 100.0),
            Point2::new(300.0, 100.0),
            Point2::new(300.0, 250.0),
            Point2::new(100.0, 250.0),
        ];
        let quad = solve_constrained_quad(&rect, 1, Point2::new(898.0, 180.0), &vps, 200.0, 150.0);
        // the diagonal runs off toward vp2
        assert!(quad[3].y > 2000.0, "{quad:?}");
        assert!(matches!(
            warp_onto_quad(&PixelBuffer::new(200, 150), &quad, Resample::Bilinear, 16.0),
            Err(PerspectiveError::InvalidRegion { .. })
        ));
    }

    #[test]
    fn neighbours_sit_at_the_original_edge_lengths() {
        let vps = pair();
        let pos = Point2::new(100.0, 100.0);
        let quad = solve_constrained_quad(&[Point2::origin(); 4], 0, pos, &vps, 200.0, 150.0);
        assert!(((quad[1] - pos).norm() - 200.0).abs() < 1e-9);
        assert!(((quad[3] - pos).norm() - 150.0).abs() < 1e-9);
    }

    #[test]
    fn orientation_survives_vanishing_points_on_the_far_side() {
        let vps = VanishingPointPair {
            vp1: VanishingPoint::Finite(Point2::new(900.0, 180.0)),
            vp2: VanishingPoint::Finite(Point2::new(-300.0, 4000.0)),
        };
        let rect = [
            Point2::new(100.0, 100.0),
            Point2::new(300.0, 100.0),
            Point2::new(300.0, 250.0),
            Point2::new(100.0, 250.0),
        ];
        let quad = solve_constrained_quad(&rect, 0, Point2::new(105.0, 95.0), &vps, 200.0, 150.0);
        assert!(quad[1].x > quad[0].x + 150.0);
        assert!(quad[3].y > quad[0].y + 100.0);
        assert!(quad[2].x > quad[3].x && quad[2].y > quad[1].y);
    }

    #[test]
    fn parallel_axis_is_preserved() {
        let vps = VanishingPointPair {
            vp1: VanishingPoint::AtInfinity(Vector2::new(1.0, 0.0)),
            vp2: VanishingPoint::Finite(Point2::new(200.0, -650.0)),
        };
        let start = [
            Point2::new(100.0, 100.0),
            Point2::new(300.0, 100.0),
            Point2::new(320.0, 250.0),
            Point2::new(80.0, 250.0),
        ];
        let quad = solve_constrained_quad(&start, 2, Point2::new(330.0, 270.0), &vps, 240.0, 150.0);
        assert!((quad[3].y - 270.0).abs() < 1e-9);
        assert!((quad[3].x - 90.0).abs() < 1e-9);
        let recomputed = compute_two_point_vp(&quad, 10.0).unwrap();
        assert_same_vanishing_point(recomputed.vp1, vps.vp1);
        assert_same_vanishing_point(recomputed.vp2, vps.vp2);
    }
}
