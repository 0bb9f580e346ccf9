use crate::shared::gray::GrayImage;
use crate::shared::rect::Rect;

/// Tuning passed through to a detector backend.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct DetectOptions {
    /// Window growth factor per scan pass.
    pub scale_factor: f64,
    /// Minimum overlapping candidates required to accept a hit.
    pub min_neighbors: u32,
    /// Smallest candidate size considered, `(width, height)` in pixels.
    pub min_size: (u32, u32),
}

/// Tunings carried over from the reference cascade configuration; changing
/// them shifts detector recall in ways the region estimator is not
/// calibrated for.
pub const FACE_OPTIONS: DetectOptions = DetectOptions {
    scale_factor: 1.1,
    min_neighbors: 3,
    min_size: (40, 40),
};

pub const NOSE_OPTIONS: DetectOptions = DetectOptions {
    scale_factor: 1.13,
    min_neighbors: 3,
    min_size: (10, 10),
};

pub const EYE_OPTIONS: DetectOptions = DetectOptions {
    scale_factor: 1.13,
    min_neighbors: 3,
    min_size: (10, 10),
};

pub const MOUTH_OPTIONS: DetectOptions = DetectOptions {
    scale_factor: 1.13,
    min_neighbors: 3,
    min_size: (10, 20),
};

/// External detector capability: finds candidate boxes in a single-channel
/// region.
///
/// Deterministic for identical inputs; no ordering is guaranteed among
/// equally-scored candidates beyond "first result taken as primary".
/// Implementations are shared across the frame path and worker threads,
/// hence `Send + Sync`.
pub trait FeatureDetector: Send + Sync {
    fn detect(
        &self,
        image: &GrayImage,
        opts: &DetectOptions,
    ) -> Result<Vec<Rect>, Box<dyn std::error::Error>>;
}
