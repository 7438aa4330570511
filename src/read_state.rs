use std::io::Cursor;
use std::path::Path;

use ::image::ImageFormat;
use anyhow::{Context, Result};
use nalgebra::Point2;
use serde::{Deserialize, Serialize};
use tracing::{debug, warn};

use crate::PixelBuffer;

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct StorePoint {
    pub x: f64,
    pub y: f64,
}

impl From<&Point2<f64>> for StorePoint {
    fn from(point: &Point2<f64>) -> Self {
        Self {
            x: point.x,
            y: point.y,
        }
    }
}

impl From<StorePoint> for Point2<f64> {
    fn from(point: StorePoint) -> Self {
        Point2::new(point.x, point.y)
    }
}

/// Moves warp corner `corner` of the pasted layer to `to`.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct StoreDrag {
    pub corner: usize,
    pub to: StorePoint,
}

/// Contents of a `.points` file.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Marks {
    pub corners: Vec<StorePoint>,
    pub drags: Option<Vec<StoreDrag>>,
    pub translate: Option<StorePoint>,
}

impl Marks {
    pub fn corner_points(&self) -> Vec<Point2<f64>> {
        self.corners.iter().copied().map(Point2::from).collect()
    }
}

/// `<dir>/<stem>.points` next to `image`.
pub fn points_file_for(image: &str) -> Option<String> {
    let path = Path::new(image);
    let stem = path.file_stem()?.to_str()?;
    let parent = path.parent()?.to_str()?;
    if parent.is_empty() {
        Some(format!("{stem}.points"))
    } else {
        Some(format!("{parent}/{stem}.points"))
    }
}

pub async fn load_image(path: &str) -> Result<PixelBuffer> {
    let bytes = tokio::fs::read(path)
        .await
        .with_context(|| format!("reading {path}"))?;
    let decoded = ::image::load_from_memory(&bytes).with_context(|| format!("decoding {path}"))?;
    debug!("{path}: {}x{}", decoded.width(), decoded.height());
    Ok(decoded.to_rgba8())
}

/// Encodes `image` in the format implied by the extension of `path`.
pub async fn save_image(image: &PixelBuffer, path: &str) -> Result<()> {
    let format = ImageFormat::from_path(path).with_context(|| format!("format of {path}"))?;
    let mut encoded = Cursor::new(Vec::new());
    image.write_to(&mut encoded, format)?;
    tokio::fs::write(path, encoded.into_inner())
        .await
        .with_context(|| format!("writing {path}"))?;
    Ok(())
}

pub async fn read_marks_from_file(path: &str) -> Result<Marks> {
    let content = tokio::fs::read_to_string(path)
        .await
        .with_context(|| format!("reading {path}"))?;
    let marks = serde_json::from_str(&content).with_context(|| format!("parsing {path}"))?;
    Ok(marks)
}

pub async fn store_marks_to_file(marks: &Marks, path: &str) -> Result<()> {
    let content = serde_json::to_string_pretty(marks)?;
    tokio::fs::write(path, content).await?;
    Ok(())
}

/// Loads the image and, when the file exists, its marks.
pub async fn load(
    image: String,
    points_file_name: String,
) -> Result<(PixelBuffer, Option<Marks>)> {
    let marks = if Path::new(&points_file_name).exists() {
        Some(read_marks_from_file(&points_file_name).await?)
    } else {
        warn!("could not read data for {}", points_file_name);
        None
    };
    let image = load_image(&image).await?;
    Ok((image, marks))
}
