use crate::detection::domain::feature_detector::{DetectOptions, FeatureDetector};
use crate::shared::gray::GrayImage;
use crate::shared::rect::Rect;

/// Detector that never finds anything.
///
/// Fills sub-feature slots when no model is available for them; the
/// pipeline treats its output as ordinary zero-hit results.
pub struct NullFeatureDetector;

impl FeatureDetector for NullFeatureDetector {
    fn detect(
        &self,
        _image: &GrayImage,
        _opts: &DetectOptions,
    ) -> Result<Vec<Rect>, Box<dyn std::error::Error>> {
        Ok(Vec::new())
    }
}
