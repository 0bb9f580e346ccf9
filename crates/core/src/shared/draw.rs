use crate::shared::frame::Frame;
use crate::shared::rect::Rect;

pub type Color = [u8; 3];

pub const FACE_COLOR: Color = [255, 0, 0];
pub const EYE_COLOR: Color = [255, 255, 0];
pub const NOSE_COLOR: Color = [0, 255, 0];
pub const MOUTH_COLOR: Color = [0, 0, 255];
pub const PROBABLE_AREA_COLOR: Color = [255, 0, 255];

pub const BOX_THICKNESS: i32 = 2;

/// Draws a rectangle outline in place, clipped to the frame bounds.
///
/// The outline grows inward from the rectangle edges so adjacent boxes
/// stay visually distinct.
pub fn draw_rect(frame: &mut Frame, rect: &Rect, color: Color, thickness: i32) {
    if rect.is_empty() || thickness <= 0 {
        return;
    }
    let t = thickness.min(rect.width).min(rect.height);

    // Top and bottom bands.
    fill(frame, rect.x, rect.y, rect.width, t, color);
    fill(frame, rect.x, rect.bottom() - t, rect.width, t, color);
    // Left and right bands, between the horizontal ones.
    fill(frame, rect.x, rect.y + t, t, rect.height - 2 * t, color);
    fill(frame, rect.right() - t, rect.y + t, t, rect.height - 2 * t, color);
}

fn fill(frame: &mut Frame, x: i32, y: i32, w: i32, h: i32, color: Color) {
    let frame_w = frame.width() as i32;
    let frame_h = frame.height() as i32;
    let channels = frame.channels() as usize;

    let x0 = x.max(0);
    let y0 = y.max(0);
    let x1 = (x + w).min(frame_w);
    let y1 = (y + h).min(frame_h);
    if x0 >= x1 || y0 >= y1 {
        return;
    }

    let stride = frame_w as usize * channels;
    let data = frame.data_mut();
    for row in y0..y1 {
        let row_start = row as usize * stride;
        for col in x0..x1 {
            let px = row_start + col as usize * channels;
            for (c, &value) in color.iter().enumerate().take(channels) {
                data[px + c] = value;
            }
        }
    }
}
