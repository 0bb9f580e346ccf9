use crate::detection::domain::feature_regions::{
    probable_eye_region, probable_mouth_region, probable_nose_region,
};
use crate::shared::draw::{
    draw_rect, BOX_THICKNESS, EYE_COLOR, FACE_COLOR, MOUTH_COLOR, NOSE_COLOR, PROBABLE_AREA_COLOR,
};
use crate::shared::frame::Frame;
use crate::shared::rect::Rect;

/// One detected face: its bounding box, the geometrically estimated
/// sub-feature search regions, and whichever sub-features were actually
/// found inside them.
///
/// Built once per detection pass per face; sub-features are populated by
/// the pass and never change afterwards.
#[derive(Clone, Debug)]
pub struct FaceFeatures {
    face: Rect,
    probable_eye_region: Rect,
    probable_nose_region: Rect,
    probable_mouth_region: Rect,
    left_eye: Option<Rect>,
    right_eye: Option<Rect>,
    nose: Option<Rect>,
    mouth: Option<Rect>,
}

impl FaceFeatures {
    pub fn new(face: Rect, frame_w: u32, frame_h: u32) -> Self {
        Self {
            face,
            probable_eye_region: probable_eye_region(&face, frame_w, frame_h),
            probable_nose_region: probable_nose_region(&face, frame_w, frame_h),
            probable_mouth_region: probable_mouth_region(&face, frame_w, frame_h),
            left_eye: None,
            right_eye: None,
            nose: None,
            mouth: None,
        }
    }

    pub fn face(&self) -> Rect {
        self.face
    }

    pub fn probable_eye_region(&self) -> Rect {
        self.probable_eye_region
    }

    pub fn probable_nose_region(&self) -> Rect {
        self.probable_nose_region
    }

    pub fn probable_mouth_region(&self) -> Rect {
        self.probable_mouth_region
    }

    pub fn left_eye(&self) -> Option<Rect> {
        self.left_eye
    }

    pub fn right_eye(&self) -> Option<Rect> {
        self.right_eye
    }

    pub fn nose(&self) -> Option<Rect> {
        self.nose
    }

    pub fn mouth(&self) -> Option<Rect> {
        self.mouth
    }

    /// Records eye hits found inside the probable eye region. The first
    /// two candidates become left and right eye, mapped back into
    /// full-frame coordinates.
    pub fn add_eyes(&mut self, eyes: &[Rect]) {
        let origin = self.probable_eye_region;
        if let Some(first) = eyes.first() {
            self.left_eye = Some(first.offset_by(origin.x, origin.y));
        }
        if let Some(second) = eyes.get(1) {
            self.right_eye = Some(second.offset_by(origin.x, origin.y));
        }
    }

    pub fn add_nose(&mut self, noses: &[Rect]) {
        if let Some(first) = noses.first() {
            let origin = self.probable_nose_region;
            self.nose = Some(first.offset_by(origin.x, origin.y));
        }
    }

    pub fn add_mouth(&mut self, mouths: &[Rect]) {
        if let Some(first) = mouths.first() {
            let origin = self.probable_mouth_region;
            self.mouth = Some(first.offset_by(origin.x, origin.y));
        }
    }

    /// A face is full when both eyes, the nose, and the mouth were all
    /// found; anything less is partial.
    pub fn is_full(&self) -> bool {
        self.left_eye.is_some()
            && self.right_eye.is_some()
            && self.nose.is_some()
            && self.mouth.is_some()
    }

    /// Draws the face box and any found sub-features onto the frame.
    /// Probable search regions are included only when requested.
    pub fn draw_onto(&self, frame: &mut Frame, include_probable_areas: bool) {
        draw_rect(frame, &self.face, FACE_COLOR, BOX_THICKNESS);

        for eye in [self.left_eye, self.right_eye].into_iter().flatten() {
            draw_rect(frame, &eye, EYE_COLOR, BOX_THICKNESS);
        }
        if let Some(nose) = self.nose {
            draw_rect(frame, &nose, NOSE_COLOR, BOX_THICKNESS);
        }
        if let Some(mouth) = self.mouth {
            draw_rect(frame, &mouth, MOUTH_COLOR, BOX_THICKNESS);
        }

        if include_probable_areas {
            for region in [
                self.probable_eye_region,
                self.probable_nose_region,
                self.probable_mouth_region,
            ] {
                draw_rect(frame, &region, PROBABLE_AREA_COLOR, BOX_THICKNESS);
            }
        }
    }
}

/// Human-readable result summary for status displays and logs.
pub fn summarize(faces: &[FaceFeatures]) -> String {
    match faces {
        [] => "None".to_string(),
        [face] => {
            if face.is_full() {
                "Full face".to_string()
            } else {
                "Partial face".to_string()
            }
        }
        _ => {
            if faces.iter().all(FaceFeatures::is_full) {
                format!("{} full faces", faces.len())
            } else {
                format!("{} partial faces", faces.len())
            }
        }
    }
}
