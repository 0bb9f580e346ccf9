//! Geometric estimation of sub-feature search regions.
//!
//! Pure functions of the face box and frame size. The ratios are
//! empirical and the truncation points match the reference cascade
//! calibration exactly; detectors are tuned against these regions.

use crate::shared::rect::Rect;

/// Band across the upper face where both eyes are expected.
pub fn probable_eye_region(face: &Rect, frame_w: u32, frame_h: u32) -> Rect {
    let mut region = *face;
    let original_height = region.height;
    region.height = (region.height as f32 / 2.7) as i32;

    let shift_y = ((original_height as f64 / 1.7) - region.height as f64) as i32;
    region.y += shift_y;

    region.clamp_to(frame_w, frame_h)
}

/// Center patch of the face where the nose is expected.
pub fn probable_nose_region(face: &Rect, frame_w: u32, frame_h: u32) -> Rect {
    let mut region = *face;
    region.width = (0.43 * region.width as f64) as i32;
    region.height = (0.43 * region.height as f64) as i32;

    region.x += (face.width - region.width) / 2;
    region.y += (face.height - region.height) / 2;

    region.clamp_to(frame_w, frame_h)
}

/// Lower-center patch of the face where the mouth is expected.
pub fn probable_mouth_region(face: &Rect, frame_w: u32, frame_h: u32) -> Rect {
    let mut region = *face;
    region.width /= 2;
    region.height /= 3;

    region.x += (face.width - region.width) / 2;
    region.y += region.height * 2;

    region.clamp_to(frame_w, frame_h)
}

#[cfg(test)]
mod tests {
    use super::*;
    use rstest::rstest;

    #[test]
    fn test_nose_region_reference_values() {
        let face = Rect::new(0, 0, 100, 100);
        let nose = probable_nose_region(&face, 200, 200);
        assert_eq!(nose, Rect::new(28, 28, 43, 43));
    }

    #[test]
    fn test_eye_region_reference_values() {
        let face = Rect::new(0, 0, 100, 100);
        let eyes = probable_eye_region(&face, 200, 200);
        // height = 100 / 2.7 = 37, shifted down by 100/1.7 - 37 = 21
        assert_eq!(eyes, Rect::new(0, 21, 100, 37));
    }

    #[test]
    fn test_mouth_region_reference_values() {
        let face = Rect::new(0, 0, 100, 100);
        let mouth = probable_mouth_region(&face, 200, 200);
        // width 50, height 33, centered in x, shifted down by 2 * height
        assert_eq!(mouth, Rect::new(25, 66, 50, 33));
    }

    #[test]
    fn test_regions_follow_face_offset() {
        let at_origin = probable_nose_region(&Rect::new(0, 0, 80, 80), 500, 500);
        let offset = probable_nose_region(&Rect::new(60, 40, 80, 80), 500, 500);
        assert_eq!(offset, at_origin.offset_by(60, 40));
    }

    #[test]
    fn test_mouth_clamped_at_bottom_edge() {
        // Face flush with the bottom of the frame: the mouth region would
        // extend past it and gets its height trimmed.
        let face = Rect::new(0, 110, 100, 100);
        let mouth = probable_mouth_region(&face, 200, 200);
        assert_eq!(mouth, Rect::new(25, 176, 50, 24));
        assert_eq!(mouth.bottom(), 200);
    }

    #[rstest]
    #[case::centered(Rect::new(50, 50, 100, 100), 200, 200)]
    #[case::at_origin(Rect::new(0, 0, 100, 100), 200, 200)]
    #[case::bottom_right(Rect::new(150, 150, 100, 100), 200, 200)]
    #[case::face_larger_than_frame(Rect::new(-20, -20, 200, 200), 160, 120)]
    #[case::tiny_face(Rect::new(3, 3, 5, 5), 40, 40)]
    #[case::tall_frame(Rect::new(10, 300, 64, 64), 100, 400)]
    fn test_regions_contained_in_frame(#[case] face: Rect, #[case] w: u32, #[case] h: u32) {
        for region in [
            probable_eye_region(&face, w, h),
            probable_nose_region(&face, w, h),
            probable_mouth_region(&face, w, h),
        ] {
            assert!(region.x >= 0, "left out of bounds: {region:?}");
            assert!(region.y >= 0, "top out of bounds: {region:?}");
            assert!(region.right() <= w as i32, "right out of bounds: {region:?}");
            assert!(region.bottom() <= h as i32, "bottom out of bounds: {region:?}");
        }
    }
}
