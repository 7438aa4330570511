//! Planar projective transforms between quadrilaterals.
//!
//! A homography is a 3x3 matrix acting on homogeneous points `(x, y, 1)`;
//! the projected point is `(x' / w', y' / w')`.

use nalgebra::{Matrix3, Point2, SMatrix, SVector};

use crate::{
    Quad,
    error::{PerspectiveError, PerspectiveResult},
};

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Homography {
    matrix: Matrix3<f64>,
}

impl Default for Homography {
    fn default() -> Self {
        Self::identity()
    }
}

impl Homography {
    pub fn identity() -> Self {
        Self {
            matrix: Matrix3::identity(),
        }
    }

    pub fn from_matrix(matrix: Matrix3<f64>) -> Self {
        Self { matrix }
    }

    pub fn matrix(&self) -> &Matrix3<f64> {
        &self.matrix
    }

    pub fn translation(dx: f64, dy: f64) -> Self {
        Self {
            matrix: Matrix3::new(1.0, 0.0, dx, 0.0, 1.0, dy, 0.0, 0.0, 1.0),
        }
    }

    /// The exact transform taking each `src[i]` to `dst[i]`.
    pub fn from_quads(src: &Quad, dst: &Quad) -> PerspectiveResult<Self> {
        // Solve A * h = b for h = [a b c d e f g h]^T with the last coefficient fixed to 1:
        // [x y 1 0 0 0 -x*X -y*X] h = X
        // [0 0 0 x y 1 -x*Y -y*Y] h = Y
        let mut a = SMatrix::<f64, 8, 8>::zeros();
        let mut b = SVector::<f64, 8>::zeros();
        for (i, (s, d)) in src.iter().zip(dst.iter()).enumerate() {
            let row = 2 * i;
            a[(row, 0)] = s.x;
            a[(row, 1)] = s.y;
            a[(row, 2)] = 1.0;
            a[(row, 6)] = -d.x * s.x;
            a[(row, 7)] = -d.x * s.y;
            b[row] = d.x;

            a[(row + 1, 3)] = s.x;
            a[(row + 1, 4)] = s.y;
            a[(row + 1, 5)] = 1.0;
            a[(row + 1, 6)] = -d.y * s.x;
            a[(row + 1, 7)] = -d.y * s.y;
            b[row + 1] = d.y;
        }

        let h = a
            .lu()
            .solve(&b)
            .ok_or_else(|| PerspectiveError::degenerate("no unique homography for quads"))?;
        let matrix = Matrix3::new(h[0], h[1], h[2], h[3], h[4], h[5], h[6], h[7], 1.0);
        if !matrix.iter().all(|v| v.is_finite()) {
            return Err(PerspectiveError::degenerate("homography is not finite"));
        }
        Ok(Self { matrix })
    }

    /// Maps the rectangle `(0,0)..(width,height)` onto `dst`, corners in clockwise image order.
    pub fn from_rect_to_quad(width: f64, height: f64, dst: &Quad) -> PerspectiveResult<Self> {
        let src = [
            Point2::new(0.0, 0.0),
            Point2::new(width, 0.0),
            Point2::new(width, height),
            Point2::new(0.0, height),
        ];
        Self::from_quads(&src, dst)
    }

    /// Applies `self` first, then `next`.
    pub fn then(&self, next: &Homography) -> Self {
        Self {
            matrix: next.matrix * self.matrix,
        }
    }

    pub fn inverse(&self) -> Option<Self> {
        self.matrix.try_inverse().map(|matrix| Self { matrix })
    }

    pub fn map_point(&self, point: &Point2<f64>) -> Option<Point2<f64>> {
        let mapped = Point2::from_homogeneous(self.matrix * point.to_homogeneous())?;
        (mapped.x.is_finite() && mapped.y.is_finite()).then_some(mapped)
    }
}
