use nalgebra::{Point2, Vector2};
use tracing::{debug, trace};

use crate::{
    error::{PerspectiveError, PerspectiveResult},
    utils::{Intersection, line_intersection, point_along_line, signed_angle},
};

/// Where a family of parallel scene edges converges in the image.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum VanishingPoint {
    Finite(Point2<f64>),
    /// The edges are parallel in the image; holds their unit direction.
    AtInfinity(Vector2<f64>),
}

impl VanishingPoint {
    pub fn finite(&self) -> Option<Point2<f64>> {
        match self {
            VanishingPoint::Finite(point) => Some(*point),
            VanishingPoint::AtInfinity(_) => None,
        }
    }

    pub fn is_at_infinity(&self) -> bool {
        matches!(self, VanishingPoint::AtInfinity(_))
    }

    /// A second point on the line from `from` that converges on this vanishing point.
    pub fn toward(&self, from: &Point2<f64>) -> Point2<f64> {
        match self {
            VanishingPoint::Finite(point) => *point,
            VanishingPoint::AtInfinity(direction) => from + direction,
        }
    }

    /// Walks `length` from `from` along the line through this vanishing point,
    /// away from it for a finite point and along the stored direction otherwise.
    pub fn point_along(&self, from: &Point2<f64>, length: f64) -> Point2<f64> {
        match self {
            VanishingPoint::Finite(point) => point_along_line(point, from, length),
            VanishingPoint::AtInfinity(direction) => from + direction * length,
        }
    }

    pub fn distance_from(&self, point: &Point2<f64>) -> f64 {
        match self {
            VanishingPoint::Finite(vp) => (vp - point).norm(),
            VanishingPoint::AtInfinity(_) => f64::INFINITY,
        }
    }

    /// Absolute angle between `motion` and the way to this vanishing point from `origin`.
    pub fn angle_to(&self, origin: &Point2<f64>, motion: &Vector2<f64>) -> f64 {
        match self {
            VanishingPoint::Finite(vp) => signed_angle(motion, &(vp - origin)).abs(),
            VanishingPoint::AtInfinity(direction) => signed_angle(motion, direction)
                .abs()
                .min(signed_angle(motion, &-direction).abs()),
        }
    }

    fn is_near_origin(&self, radius: f64) -> bool {
        match self {
            VanishingPoint::Finite(point) => point.x.abs() < radius && point.y.abs() < radius,
            VanishingPoint::AtInfinity(_) => false,
        }
    }
}

/// The two vanishing points of a rectangle seen in two-point perspective.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct VanishingPointPair {
    /// Convergence of edges p1p2 and p3p4.
    pub vp1: VanishingPoint,
    /// Convergence of edges p2p3 and p4p1.
    pub vp2: VanishingPoint,
}

impl VanishingPointPair {
    pub fn as_array(&self) -> [VanishingPoint; 2] {
        [self.vp1, self.vp2]
    }
}

/// Vanishing point of the lines `a`-`b` and `c`-`d`.
pub fn find_vanishing_point_for_lines(
    a: &Point2<f64>,
    b: &Point2<f64>,
    c: &Point2<f64>,
    d: &Point2<f64>,
) -> PerspectiveResult<VanishingPoint> {
    match line_intersection(a, b, c, d) {
        Intersection::Point(point) => Ok(VanishingPoint::Finite(point)),
        Intersection::Parallel => {
            let direction = b - a;
            let norm = direction.norm();
            if norm == 0.0 {
                return Err(PerspectiveError::degenerate("duplicate corner"));
            }
            Ok(VanishingPoint::AtInfinity(direction / norm))
        }
    }
}

fn quad_area(points: &[Point2<f64>]) -> f64 {
    let n = points.len();
    (0..n)
        .map(|i| {
            let (a, b) = (&points[i], &points[(i + 1) % n]);
            a.x * b.y - b.x * a.y
        })
        .sum::<f64>()
        * 0.5
}

/// Computes both vanishing points of a quad marked as a rectangle under two-point perspective.
///
/// `exclusion_radius` rejects coincidental intersections close to the scene origin.
pub fn compute_two_point_vp(
    points: &[Point2<f64>],
    exclusion_radius: f64,
) -> PerspectiveResult<VanishingPointPair> {
    let [p1, p2, p3, p4] = points else {
        return Err(PerspectiveError::InsufficientPoints {
            found: points.len(),
        });
    };
    if quad_area(points).abs() < 1e-9 {
        return Err(PerspectiveError::degenerate("corners are collinear"));
    }

    let vp1 = find_vanishing_point_for_lines(p1, p2, p3, p4)?;
    let vp2 = find_vanishing_point_for_lines(p2, p3, p4, p1)?;
    trace!("vanishing points: {vp1:?}, {vp2:?}");

    if vp1.is_near_origin(exclusion_radius) || vp2.is_near_origin(exclusion_radius) {
        debug!("rejecting vanishing points near the origin: {vp1:?}, {vp2:?}");
        return Err(PerspectiveError::degenerate(
            "vanishing point coincides with the scene origin",
        ));
    }
    Ok(VanishingPointPair { vp1, vp2 })
}

/// Radial guide segments from each finite vanishing point to each mark.
pub fn guide_lines(
    pair: &VanishingPointPair,
    marks: &[Point2<f64>],
) -> Vec<(Point2<f64>, Point2<f64>)> {
    pair.as_array()
        .iter()
        .filter_map(VanishingPoint::finite)
        .flat_map(|vp| marks.iter().map(move |mark| (vp, *mark)))
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::utils::distance_point_to_line;

    fn trapezoid() -> [Point2<f64>; 4] {
        [
            Point2::new(100.0, 100.0),
            Point2::new(300.0, 100.0),
            Point2::new(320.0, 250.0),
            Point2::new(80.0, 250.0),
        ]
    }

    #[test]
    fn trapezoid_converges_above_the_shape() {
        let quad = trapezoid();
        let pair = compute_two_point_vp(&quad, 10.0).unwrap();

        // top and bottom edges are horizontal
        assert!(pair.vp1.is_at_infinity());

        let vp2 = pair.vp2.finite().unwrap();
        assert!(distance_point_to_line(&vp2, &quad[1], &quad[2]) < 1e-9);
        assert!(distance_point_to_line(&vp2, &quad[3], &quad[0]) < 1e-9);
        assert!(vp2.y < quad[0].y);
        assert!((vp2.x - 200.0).abs() < 1e-9);
    }

    #[test]
    fn frontal_rectangle_gives_points_at_infinity() {
        let quad = [
            Point2::new(10.0, 10.0),
            Point2::new(60.0, 10.0),
            Point2::new(60.0, 40.0),
            Point2::new(10.0, 40.0),
        ];
        let pair = compute_two_point_vp(&quad, 10.0).unwrap();
        assert_eq!(pair.vp1, VanishingPoint::AtInfinity(Vector2::new(1.0, 0.0)));
        assert_eq!(pair.vp2, VanishingPoint::AtInfinity(Vector2::new(0.0, 1.0)));
        assert!(pair.vp1.finite().is_none());
    }

    #[test]
    fn perspective_quad_gives_two_finite_points() {
        let quad = [
            Point2::new(120.0, 110.0),
            Point2::new(310.0, 140.0),
            Point2::new(300.0, 260.0),
            Point2::new(130.0, 240.0),
        ];
        let pair = compute_two_point_vp(&quad, 10.0).unwrap();
        let vp1 = pair.vp1.finite().unwrap();
        let vp2 = pair.vp2.finite().unwrap();
        assert!(distance_point_to_line(&vp1, &quad[0], &quad[1]) < 1e-6);
        assert!(distance_point_to_line(&vp1, &quad[2], &quad[3]) < 1e-6);
        assert!(distance_point_to_line(&vp2, &quad[1], &quad[2]) < 1e-6);
        assert!(distance_point_to_line(&vp2, &quad[3], &quad[0]) < 1e-6);
    }

    #[test]
    fn intersection_at_origin_is_rejected() {
        let quad = [
            Point2::new(20.0, 0.0),
            Point2::new(40.0, 0.0),
            Point2::new(0.0, 40.0),
            Point2::new(0.0, 20.0),
        ];
        assert!(matches!(
            compute_two_point_vp(&quad, 10.0),
            Err(PerspectiveError::DegenerateGeometry(_))
        ));
    }

    #[test]
    fn wrong_point_count_is_reported() {
        let quad = trapezoid();
        assert!(matches!(
            compute_two_point_vp(&quad[..3], 10.0),
            Err(PerspectiveError::InsufficientPoints { found: 3 })
        ));
    }

    #[test]
    fn collinear_corners_are_degenerate() {
        let quad = [
            Point2::new(0.0, 0.0),
            Point2::new(10.0, 10.0),
            Point2::new(20.0, 20.0),
            Point2::new(30.0, 30.0),
        ];
        assert!(compute_two_point_vp(&quad, 10.0).is_err());
    }

    #[test]
    fn guide_lines_skip_points_at_infinity() {
        let quad = trapezoid();
        let pair = compute_two_point_vp(&quad, 10.0).unwrap();
        let lines = guide_lines(&pair, &quad);
        assert_eq!(lines.len(), 4);
        assert!(lines.iter().all(|(vp, _)| Some(*vp) == pair.vp2.finite()));
    }

    #[test]
    fn walking_along_a_point_at_infinity() {
        let vp = VanishingPoint::AtInfinity(Vector2::new(0.0, 1.0));
        let p = vp.point_along(&Point2::new(5.0, 5.0), -3.0);
        assert_eq!(p, Point2::new(5.0, 2.0));
        assert_eq!(vp.toward(&Point2::new(1.0, 1.0)), Point2::new(1.0, 2.0));
        let angle = vp.angle_to(&Point2::origin(), &Vector2::new(0.0, -4.0));
        assert!(angle.abs() < 1e-12);
    }
}
