use crate::stack::LayerHandle;

pub type PerspectiveResult<T> = Result<T, PerspectiveError>;

#[derive(thiserror::Error, Debug)]
pub enum PerspectiveError {
    #[error("degenerate geometry: {0}")]
    DegenerateGeometry(String),

    #[error("insufficient points: need 4, found {found}")]
    InsufficientPoints { found: usize },

    #[error("invalid region: bounding box is {width}x{height}")]
    InvalidRegion { width: u32, height: u32 },

    #[error("layer has no image loaded")]
    ImageUnavailable,

    #[error("unknown layer {0:?}")]
    UnknownLayer(LayerHandle),

    #[error(transparent)]
    Image(#[from] image::ImageError),

    #[error(transparent)]
    Io(#[from] std::io::Error),

    #[error(transparent)]
    Json(#[from] serde_json::Error),
}

impl PerspectiveError {
    pub fn degenerate(msg: impl Into<String>) -> Self {
        Self::DegenerateGeometry(msg.into())
    }
}
