use thiserror::Error;

#[derive(Error, Debug)]
pub enum Error {
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Image error: {0}")]
    Image(#[from] image::ImageError),

    #[error("Config error: {0}")]
    Config(#[from] serde_json::Error),

    #[error("Model error: {0}")]
    Model(String),

    #[error("Invalid segmentation mask: expected {expected} labels, got {actual}")]
    InvalidMask { expected: usize, actual: usize },

    #[error("Invalid jewelry asset: {0}")]
    InvalidAsset(String),

    #[error("Landmark set has {actual} points, layout needs at least {required}")]
    InvalidLandmarks { required: usize, actual: usize },
}

pub type Result<T> = std::result::Result<T, Error>;
