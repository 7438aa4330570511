use std::cmp::Ordering;

use nalgebra::{Point2, Scalar, Vector2};
use num_traits::Float;

/// Result of intersecting two infinite lines.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum Intersection<T: Scalar> {
    Point(Point2<T>),
    Parallel,
}

impl<T: Scalar + Copy> Intersection<T> {
    pub fn point(self) -> Option<Point2<T>> {
        match self {
            Intersection::Point(point) => Some(point),
            Intersection::Parallel => None,
        }
    }

    /// Falls back to `end` when the lines never meet, the best guess mid-drag.
    pub fn or_end(self, end: Point2<T>) -> Point2<T> {
        self.point().unwrap_or(end)
    }
}

/// Intersects the line through `a1`,`a2` with the line through `b1`,`b2`.
pub fn line_intersection<T: Float + Scalar>(
    a1: &Point2<T>,
    a2: &Point2<T>,
    b1: &Point2<T>,
    b2: &Point2<T>,
) -> Intersection<T> {
    let (x1, y1) = (a1.x, a1.y);
    let (x2, y2) = (a2.x, a2.y);
    let (x3, y3) = (b1.x, b1.y);
    let (x4, y4) = (b2.x, b2.y);

    let den = (x1 - x2) * (y3 - y4) - (y1 - y2) * (x3 - x4);
    if den == T::zero() {
        return Intersection::Parallel;
    }
    let t = ((x1 - x3) * (y3 - y4) - (y1 - y3) * (x3 - x4)) / den;
    let x = x1 + t * (x2 - x1);
    let y = y1 + t * (y2 - y1);
    if !x.is_finite() || !y.is_finite() {
        return Intersection::Parallel;
    }
    Intersection::Point(Point2::new(x, y))
}

/// Perpendicular distance from `point` to the infinite line through `start`,`end`.
///
/// Returns infinity when `start == end`.
pub fn distance_point_to_line<T: Float + Scalar>(
    point: &Point2<T>,
    start: &Point2<T>,
    end: &Point2<T>,
) -> T {
    // https://en.wikipedia.org/wiki/Distance_from_a_point_to_a_line
    // a*x + b*y + c = 0
    let a = end.y - start.y;
    let b = start.x - end.x;
    let c = end.x * start.y - start.x * end.y;
    let norm = a * a + b * b;
    if norm > T::zero() {
        (a * point.x + b * point.y + c).abs() / norm.sqrt()
    } else {
        T::infinity()
    }
}

/// Walks `length` from `end` in the direction `end - start`.
pub fn point_along_line<T: Float + Scalar>(
    start: &Point2<T>,
    end: &Point2<T>,
    length: T,
) -> Point2<T> {
    let dx = end.x - start.x;
    let dy = end.y - start.y;
    let dist = (dx * dx + dy * dy).sqrt();
    if dist == T::zero() {
        return *end;
    }
    let ratio = length / dist;
    Point2::new(end.x + dx * ratio, end.y + dy * ratio)
}

/// Projection of `point` onto the segment `start`..`end`.
pub fn closest_point_on_segment<T: Float + Scalar>(
    point: &Point2<T>,
    start: &Point2<T>,
    end: &Point2<T>,
) -> Point2<T> {
    let dx = end.x - start.x;
    let dy = end.y - start.y;
    let len2 = dx * dx + dy * dy;
    let guard = T::from(1e-8).unwrap_or_else(T::epsilon);
    let t = ((point.x - start.x) * dx + (point.y - start.y) * dy) / (len2 + guard);
    let t = t.max(T::zero()).min(T::one());
    Point2::new(start.x + t * dx, start.y + t * dy)
}

pub fn centroid<T: Float + Scalar>(points: &[Point2<T>]) -> Option<Point2<T>> {
    if points.is_empty() {
        return None;
    }
    let n = T::from(points.len())?;
    let (sx, sy) = points
        .iter()
        .fold((T::zero(), T::zero()), |(sx, sy), p| (sx + p.x, sy + p.y));
    Some(Point2::new(sx / n, sy / n))
}

/// Orders four points by angle around their centroid.
///
/// With image coordinates (y down) a roughly rectangular quad comes out as
/// top-left, top-right, bottom-right, bottom-left, but only the winding is guaranteed.
pub fn sort_quad_corners<T: Float + Scalar>(points: &[Point2<T>; 4]) -> [Point2<T>; 4] {
    let Some(center) = centroid(points) else {
        return *points;
    };
    let mut sorted = *points;
    sorted.sort_by(|a, b| {
        let angle_a = (a.y - center.y).atan2(a.x - center.x);
        let angle_b = (b.y - center.y).atan2(b.x - center.x);
        angle_a.partial_cmp(&angle_b).unwrap_or(Ordering::Equal)
    });
    sorted
}

/// Signed angle from `a` to `b`, in (-pi, pi].
pub fn signed_angle<T: Float + Scalar>(a: &Vector2<T>, b: &Vector2<T>) -> T {
    let dot = a.x * b.x + a.y * b.y;
    let det = a.x * b.y - a.y * b.x;
    det.atan2(dot)
}

pub fn distance<T: Float + Scalar>(a: &Point2<T>, b: &Point2<T>) -> T {
    (a.x - b.x).hypot(a.y - b.y)
}

/// Index of the point nearest to `pos`, if it lies strictly within `radius`.
pub fn closest_point_index<T: Float + Scalar>(
    points: &[Point2<T>],
    pos: &Point2<T>,
    radius: T,
) -> Option<usize> {
    let mut best = radius;
    let mut found = None;
    for (i, point) in points.iter().enumerate() {
        let dist = distance(point, pos);
        if dist < best {
            best = dist;
            found = Some(i);
        }
    }
    found
}

/// Nearest quad edge to `pos` within `radius`, with the projection of `pos` onto it.
///
/// Edge `i` joins corner `i` and corner `(i + 1) % 4`.
pub fn closest_edge<T: Float + Scalar>(
    quad: &[Point2<T>; 4],
    pos: &Point2<T>,
    radius: T,
) -> Option<(usize, Point2<T>)> {
    let mut best = radius;
    let mut found = None;
    for i in 0..4 {
        let start = &quad[i];
        let end = &quad[(i + 1) % 4];
        let dist = distance_point_to_line(pos, start, end);
        if dist < best {
            best = dist;
            found = Some((i, closest_point_on_segment(pos, start, end)));
        }
    }
    found
}

/// Even-odd containment test; points on the boundary count as inside.
pub fn point_in_polygon<T: Float + Scalar>(polygon: &[Point2<T>], point: &Point2<T>) -> bool {
    let n = polygon.len();
    if n < 3 {
        return false;
    }
    let on_edge = T::from(0.5).unwrap_or_else(T::epsilon);
    let mut inside = false;
    let mut j = n - 1;
    for i in 0..n {
        let (pi, pj) = (&polygon[i], &polygon[j]);
        if distance(&closest_point_on_segment(point, pj, pi), point) <= on_edge {
            return true;
        }
        if (pi.y > point.y) != (pj.y > point.y) {
            let x = pj.x + (point.y - pj.y) * (pi.x - pj.x) / (pi.y - pj.y);
            if point.x < x {
                inside = !inside;
            }
        }
        j = i;
    }
    inside
}
