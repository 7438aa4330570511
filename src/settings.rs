use std::{fs::File, io::BufReader, path::Path};

use serde::{Deserialize, Serialize};

use crate::{error::PerspectiveResult, warp::Resample};

/// Tunables for hit testing, vanishing point validation and scaling.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct EditorSettings {
    /// Marks, corners and edges closer than this (scene units) can be grabbed.
    pub hit_radius: f64,
    /// A finite vanishing point with both |x| and |y| below this is rejected.
    pub origin_exclusion_radius: f64,
    pub zoom_in_step: f64,
    pub zoom_out_step: f64,
    pub zoom_min: f64,
    pub zoom_max: f64,
    pub drag_scale_min: f64,
    pub drag_scale_max: f64,
    pub extract_resample: Resample,
    pub rewarp_resample: Resample,
    /// A re-warp may cover at most this many times the pasted image's pixel count.
    pub max_rewarp_growth: f64,
}

impl Default for EditorSettings {
    fn default() -> Self {
        Self {
            hit_radius: 10.0,
            origin_exclusion_radius: 10.0,
            zoom_in_step: 1.1,
            zoom_out_step: 0.9,
            zoom_min: 0.1,
            zoom_max: 5.0,
            drag_scale_min: 0.1,
            drag_scale_max: 2.0,
            extract_resample: Resample::Lanczos3,
            rewarp_resample: Resample::Bilinear,
            max_rewarp_growth: 16.0,
        }
    }
}

impl EditorSettings {
    pub fn read_from_file(path: impl AsRef<Path>) -> PerspectiveResult<Self> {
        let file = File::open(path)?;
        Ok(serde_json::from_reader(BufReader::new(file))?)
    }

    /// Step factor applied to a zoom for one wheel tick.
    pub fn zoom_step(&self, delta: f64) -> f64 {
        if delta > 0.0 {
            self.zoom_in_step
        } else {
            self.zoom_out_step
        }
    }
}
