#[cfg(feature = "camera")]
pub mod camera_source;
pub mod replay_source;

use thiserror::Error;

#[derive(Error, Debug)]
pub enum SourceError {
    #[error("failed to load image: {0}")]
    ImageLoad(#[from] image::ImageError),
    #[error("camera unavailable: {0}")]
    CameraUnavailable(String),
}
