pub mod null_feature_detector;
pub mod rustface_detector;
