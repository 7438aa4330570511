use std::f64::consts::PI;

use arrayvec::ArrayVec;
use image::Rgba;
use nalgebra::Point2;
use serde::{Deserialize, Serialize};
use tracing::{debug, trace};

use crate::{
    PixelBuffer, Quad,
    error::{PerspectiveError, PerspectiveResult},
    homography::Homography,
    utils::{point_in_polygon, sort_quad_corners},
};

const TRANSPARENT: Rgba<u8> = Rgba([0, 0, 0, 0]);

#[derive(Debug, Default, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum Resample {
    Bilinear,
    #[default]
    Lanczos3,
}

/// What the warp produces where the source image has no pixels.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum BorderPolicy {
    /// Taps outside the source read this colour.
    Constant(Rgba<u8>),
    /// Destination pixels outside the source stay transparent; taps at the
    /// source border repeat the edge pixels.
    Transparent,
}

/// Axis-aligned pixel bounds in scene space.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Bounds {
    pub x: i32,
    pub y: i32,
    pub width: u32,
    pub height: u32,
}

impl Bounds {
    pub fn origin(&self) -> Point2<f64> {
        Point2::new(f64::from(self.x), f64::from(self.y))
    }

    pub fn is_empty(&self) -> bool {
        self.width == 0 || self.height == 0
    }

    pub fn contains(&self, point: &Point2<f64>) -> bool {
        let x = point.x - f64::from(self.x);
        let y = point.y - f64::from(self.y);
        x >= 0.0 && y >= 0.0 && x < f64::from(self.width) && y < f64::from(self.height)
    }
}

/// Bounding box of `quad`, snapped outwards to whole pixels.
///
/// Corners that are not finite, or a box that does not fit the `i32`/`u32`
/// pixel grid, are rejected rather than saturated.
pub fn tight_output_bounds(quad: &Quad) -> PerspectiveResult<Bounds> {
    if quad.iter().any(|p| !p.x.is_finite() || !p.y.is_finite()) {
        return Err(PerspectiveError::degenerate("quad corner is not finite"));
    }
    let (min_x, min_y, max_x, max_y) = quad.iter().fold(
        (f64::INFINITY, f64::INFINITY, f64::NEG_INFINITY, f64::NEG_INFINITY),
        |(min_x, min_y, max_x, max_y), p| {
            (min_x.min(p.x), min_y.min(p.y), max_x.max(p.x), max_y.max(p.y))
        },
    );
    let (x0, y0) = (min_x.floor(), min_y.floor());
    let (width, height) = (max_x.ceil() - x0, max_y.ceil() - y0);
    let grid = f64::from(i32::MIN)..=f64::from(i32::MAX);
    if !grid.contains(&x0)
        || !grid.contains(&y0)
        || width > f64::from(u32::MAX)
        || height > f64::from(u32::MAX)
    {
        // `as` saturates, which is all the error report needs
        return Err(PerspectiveError::InvalidRegion {
            width: width as u32,
            height: height as u32,
        });
    }
    Ok(Bounds {
        x: x0 as i32,
        y: y0 as i32,
        width: width.max(0.0) as u32,
        height: height.max(0.0) as u32,
    })
}

fn lanczos3(x: f64) -> f64 {
    if x == 0.0 {
        return 1.0;
    }
    if x.abs() >= 3.0 {
        return 0.0;
    }
    let px = PI * x;
    3.0 * px.sin() * (px / 3.0).sin() / (px * px)
}

struct Sampler<'a> {
    image: &'a PixelBuffer,
    border: BorderPolicy,
    resample: Resample,
}

impl Sampler<'_> {
    fn covers(&self, x: f64, y: f64) -> bool {
        let (w, h) = self.image.dimensions();
        x >= -0.5 && y >= -0.5 && x <= f64::from(w) - 0.5 && y <= f64::from(h) - 0.5
    }

    /// Premultiplied RGBA in [0, 255].
    fn tap(&self, ix: i64, iy: i64) -> [f64; 4] {
        let (w, h) = self.image.dimensions();
        let inside = ix >= 0 && iy >= 0 && ix < i64::from(w) && iy < i64::from(h);
        let pixel = match (inside, self.border) {
            (true, _) => *self.image.get_pixel(ix as u32, iy as u32),
            (false, BorderPolicy::Constant(color)) => color,
            (false, BorderPolicy::Transparent) => *self.image.get_pixel(
                ix.clamp(0, i64::from(w) - 1) as u32,
                iy.clamp(0, i64::from(h) - 1) as u32,
            ),
        };
        let alpha = f64::from(pixel[3]) / 255.0;
        [
            f64::from(pixel[0]) * alpha,
            f64::from(pixel[1]) * alpha,
            f64::from(pixel[2]) * alpha,
            f64::from(pixel[3]),
        ]
    }

    fn weights(&self, t: f64) -> (i64, ArrayVec<f64, 6>) {
        let base = t.floor();
        match self.resample {
            Resample::Bilinear => {
                let f = t - base;
                (base as i64, [1.0 - f, f].into_iter().collect())
            }
            Resample::Lanczos3 => {
                let first = base - 2.0;
                let weights = (0..6).map(|i| lanczos3(t - (first + f64::from(i))));
                (first as i64, weights.collect())
            }
        }
    }

    fn sample(&self, x: f64, y: f64) -> Option<Rgba<u8>> {
        if self.border == BorderPolicy::Transparent && !self.covers(x, y) {
            return None;
        }
        let (x0, wx) = self.weights(x);
        let (y0, wy) = self.weights(y);

        let mut acc = [0.0f64; 4];
        let mut total = 0.0;
        for (j, wy) in wy.iter().enumerate() {
            for (i, wx) in wx.iter().enumerate() {
                let w = wx * wy;
                if w == 0.0 {
                    continue;
                }
                let tap = self.tap(x0 + i as i64, y0 + j as i64);
                for (a, t) in acc.iter_mut().zip(tap) {
                    *a += w * t;
                }
                total += w;
            }
        }
        if total == 0.0 {
            return None;
        }
        let alpha = (acc[3] / total).clamp(0.0, 255.0);
        if alpha <= 0.0 {
            return Some(TRANSPARENT);
        }
        let unpremultiply = |c: f64| ((c / total) * 255.0 / alpha).round().clamp(0.0, 255.0) as u8;
        Some(Rgba([
            unpremultiply(acc[0]),
            unpremultiply(acc[1]),
            unpremultiply(acc[2]),
            alpha.round() as u8,
        ]))
    }
}

/// Resamples `image` through `homography` into a `width` x `height` buffer.
pub fn warp(
    image: &PixelBuffer,
    homography: &Homography,
    width: u32,
    height: u32,
    border: BorderPolicy,
    resample: Resample,
) -> PerspectiveResult<PixelBuffer> {
    let inverse = homography
        .inverse()
        .ok_or_else(|| PerspectiveError::degenerate("homography is not invertible"))?;
    let sampler = Sampler {
        image,
        border,
        resample,
    };
    let fill = match border {
        BorderPolicy::Constant(color) => color,
        BorderPolicy::Transparent => TRANSPARENT,
    };

    let mut out = PixelBuffer::from_pixel(width, height, fill);
    for (x, y, pixel) in out.enumerate_pixels_mut() {
        let Some(src) = inverse.map_point(&Point2::new(f64::from(x), f64::from(y))) else {
            continue;
        };
        if let Some(sampled) = sampler.sample(src.x, src.y) {
            *pixel = sampled;
        }
    }
    trace!("warped {}x{} into {width}x{height}", image.width(), image.height());
    Ok(out)
}

/// Clears every pixel whose position lies outside `polygon`.
pub fn mask_outside_polygon(buffer: &mut PixelBuffer, polygon: &[Point2<f64>]) {
    for (x, y, pixel) in buffer.enumerate_pixels_mut() {
        if !point_in_polygon(polygon, &Point2::new(f64::from(x), f64::from(y))) {
            *pixel = TRANSPARENT;
        }
    }
}

/// Warps the whole of `image` onto `quad`, cropped to the quad's bounds.
///
/// Returns the buffer and the bounds; the buffer's (0,0) sits at the bounds origin.
/// Bounds covering more than `max_growth` times the source's pixel count fail
/// with [`PerspectiveError::InvalidRegion`] before anything is allocated.
pub fn warp_onto_quad(
    image: &PixelBuffer,
    quad: &Quad,
    resample: Resample,
    max_growth: f64,
) -> PerspectiveResult<(PixelBuffer, Bounds)> {
    let mut bounds = tight_output_bounds(quad)?;
    bounds.width = bounds.width.max(1);
    bounds.height = bounds.height.max(1);

    let source_pixels = u64::from(image.width()) * u64::from(image.height());
    let output_pixels = u64::from(bounds.width) * u64::from(bounds.height);
    if output_pixels as f64 > max_growth * source_pixels.max(1) as f64 {
        debug!(
            "refusing a {}x{} warp of a {}x{} image",
            bounds.width,
            bounds.height,
            image.width(),
            image.height()
        );
        return Err(PerspectiveError::InvalidRegion {
            width: bounds.width,
            height: bounds.height,
        });
    }

    let homography = Homography::from_rect_to_quad(
        f64::from(image.width()),
        f64::from(image.height()),
        quad,
    )?
    .then(&Homography::translation(
        -f64::from(bounds.x),
        -f64::from(bounds.y),
    ));
    let warped = warp(
        image,
        &homography,
        bounds.width,
        bounds.height,
        BorderPolicy::Transparent,
        resample,
    )?;
    Ok((warped, bounds))
}

/// Copies the quadrilateral region `quad` out of `image`.
///
/// Pixels of the bounding box outside the quad come back fully transparent.
pub fn extract_quad_region(
    image: &PixelBuffer,
    quad: &Quad,
    resample: Resample,
) -> PerspectiveResult<(PixelBuffer, Bounds)> {
    let sorted = sort_quad_corners(quad);
    let bounds = tight_output_bounds(&sorted)?;
    if bounds.is_empty() {
        return Err(PerspectiveError::InvalidRegion {
            width: bounds.width,
            height: bounds.height,
        });
    }
    let origin = bounds.origin();
    let local = sorted.map(|p| Point2::from(p - origin));

    let homography = Homography::from_quads(&sorted, &local)?;
    let mut region = warp(
        image,
        &homography,
        bounds.width,
        bounds.height,
        BorderPolicy::Constant(TRANSPARENT),
        resample,
    )?;
    mask_outside_polygon(&mut region, &local);
    Ok((region, bounds))
}
