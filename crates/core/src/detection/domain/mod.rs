pub mod detection_pass;
pub mod face_features;
pub mod feature_detector;
pub mod feature_regions;
