use std::fs;
use std::io::Cursor;
use std::path::{Path, PathBuf};

use thiserror::Error;

use crate::detection::domain::feature_detector::{DetectOptions, FeatureDetector};
use crate::shared::gray::GrayImage;
use crate::shared::rect::Rect;

#[derive(Error, Debug)]
pub enum ModelLoadError {
    #[error("failed to read model file {path}: {source}")]
    Read {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error("invalid model data in {path}: {message}")]
    Parse { path: PathBuf, message: String },
}

/// Primary face detector backed by the `rustface` SeetaFace engine.
///
/// SeetaFace walks an image pyramid rather than a cascade window scan, so
/// `scale_factor` and `min_neighbors` have no direct equivalent; only
/// `min_size` is honored. Suitable for the frontal face slot, not for the
/// sub-feature cascades.
pub struct RustfaceFrontalDetector {
    model: rustface::Model,
}

impl RustfaceFrontalDetector {
    pub fn from_model_path(path: &Path) -> Result<Self, ModelLoadError> {
        let bytes = fs::read(path).map_err(|source| ModelLoadError::Read {
            path: path.to_path_buf(),
            source,
        })?;
        let model = rustface::read_model(Cursor::new(bytes)).map_err(|e| ModelLoadError::Parse {
            path: path.to_path_buf(),
            message: e.to_string(),
        })?;
        Ok(Self { model })
    }
}

impl FeatureDetector for RustfaceFrontalDetector {
    fn detect(
        &self,
        image: &GrayImage,
        opts: &DetectOptions,
    ) -> Result<Vec<Rect>, Box<dyn std::error::Error>> {
        // rustface detectors are stateful per scan; build one per call so
        // the adapter stays Sync.
        let mut detector = rustface::create_detector_with_model(self.model.clone());
        detector.set_min_face_size(opts.min_size.0.min(opts.min_size.1));
        detector.set_score_thresh(2.0);
        detector.set_pyramid_scale_factor(0.8);
        detector.set_slide_window_step(4, 4);

        let image_data = rustface::ImageData::new(image.data(), image.width(), image.height());
        let faces = detector.detect(&image_data);

        Ok(faces
            .iter()
            .map(|face| {
                let bbox = face.bbox();
                Rect::new(
                    bbox.x(),
                    bbox.y(),
                    bbox.width() as i32,
                    bbox.height() as i32,
                )
            })
            .collect())
    }
}
