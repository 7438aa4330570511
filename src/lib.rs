pub mod compute;
pub mod constrain;
pub mod editor;
pub mod error;
pub mod homography;
pub mod layer;
pub mod read_state;
pub mod render;
pub mod settings;
pub mod stack;
pub mod utils;
pub mod viewport;
pub mod warp;

use nalgebra::Point2;

pub use compute::{VanishingPoint, VanishingPointPair, compute_two_point_vp};
pub use editor::{Editor, InputEvent};
pub use error::{PerspectiveError, PerspectiveResult};
pub use homography::Homography;
pub use layer::{DragSession, Layer};
pub use settings::EditorSettings;
pub use stack::{Direction, LayerHandle, LayerStack};
pub use viewport::Viewport;
pub use warp::{BorderPolicy, Bounds, Resample};

/// Straight-alpha RGBA8 image, row-major.
pub type PixelBuffer = image::RgbaImage;

/// Four corners in clockwise image order starting at the top-left.
pub type Quad = [Point2<f64>; 4];
