use std::sync::Arc;

use crate::detection::domain::face_features::FaceFeatures;
use crate::detection::domain::feature_detector::{
    DetectOptions, FeatureDetector, EYE_OPTIONS, FACE_OPTIONS, MOUTH_OPTIONS, NOSE_OPTIONS,
};
use crate::shared::frame::Frame;
use crate::shared::gray::GrayImage;
use crate::shared::rect::Rect;

/// The four detector backends a pass runs: the primary face cascade plus
/// one per sub-feature. Cloning shares the underlying detectors.
#[derive(Clone)]
pub struct DetectorSet {
    pub face: Arc<dyn FeatureDetector>,
    pub eye: Arc<dyn FeatureDetector>,
    pub nose: Arc<dyn FeatureDetector>,
    pub mouth: Arc<dyn FeatureDetector>,
}

impl DetectorSet {
    pub fn new(
        face: Arc<dyn FeatureDetector>,
        eye: Arc<dyn FeatureDetector>,
        nose: Arc<dyn FeatureDetector>,
        mouth: Arc<dyn FeatureDetector>,
    ) -> Self {
        Self {
            face,
            eye,
            nose,
            mouth,
        }
    }
}

/// Runs one complete detection pass over a frame snapshot.
///
/// Grayscale + equalization, full-frame face search, then one sub-feature
/// search per probable region. Detector failures degrade to zero results
/// for that invocation; a pass never brings the pipeline down.
pub fn run_pass(detectors: &DetectorSet, frame: &Frame) -> Vec<FaceFeatures> {
    let mut gray = GrayImage::from_frame(frame);
    gray.equalize_hist();

    let face_rects = match detectors.face.detect(&gray, &FACE_OPTIONS) {
        Ok(rects) => rects,
        Err(e) => {
            log::warn!("face detection failed: {e}");
            return Vec::new();
        }
    };

    let mut faces = Vec::with_capacity(face_rects.len());
    for face_rect in face_rects {
        let mut face = FaceFeatures::new(face_rect, gray.width(), gray.height());

        let noses = detect_in_region(&*detectors.nose, &gray, face.probable_nose_region(), &NOSE_OPTIONS);
        face.add_nose(&noses);

        let eyes = detect_in_region(&*detectors.eye, &gray, face.probable_eye_region(), &EYE_OPTIONS);
        face.add_eyes(&eyes);

        let mouths = detect_in_region(&*detectors.mouth, &gray, face.probable_mouth_region(), &MOUTH_OPTIONS);
        face.add_mouth(&mouths);

        faces.push(face);
    }
    faces
}

/// Runs a sub-feature detector over one probable region. Results are in
/// region-local coordinates; `FaceFeatures::add_*` maps them back.
fn detect_in_region(
    detector: &dyn FeatureDetector,
    gray: &GrayImage,
    region: Rect,
    opts: &DetectOptions,
) -> Vec<Rect> {
    if region.is_empty() {
        return Vec::new();
    }
    let crop = gray.crop(&region);
    match detector.detect(&crop, opts) {
        Ok(rects) => rects,
        Err(e) => {
            log::warn!("sub-feature detection failed in {region:?}: {e}");
            Vec::new()
        }
    }
}
