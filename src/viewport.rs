use nalgebra::{Point2, Vector2};

/// Screen placement of the scene: `screen = scene * scale + offset`.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Viewport {
    pub scale: f64,
    pub offset: Vector2<f64>,
}

impl Default for Viewport {
    fn default() -> Self {
        Self {
            scale: 1.0,
            offset: Vector2::zeros(),
        }
    }
}

impl Viewport {
    pub fn to_scene(&self, screen: &Point2<f64>) -> Point2<f64> {
        Point2::from((screen.coords - self.offset) / self.scale)
    }

    pub fn to_screen(&self, scene: &Point2<f64>) -> Point2<f64> {
        Point2::from(scene.coords * self.scale + self.offset)
    }

    pub fn zoom(&mut self, factor: f64, min: f64, max: f64) {
        self.scale = (self.scale * factor).clamp(min, max);
    }

    pub fn pan(&mut self, delta: Vector2<f64>) {
        self.offset += delta;
    }
}
