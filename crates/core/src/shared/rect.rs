/// An axis-aligned rectangle in frame pixel coordinates.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct Rect {
    pub x: i32,
    pub y: i32,
    pub width: i32,
    pub height: i32,
}

impl Rect {
    pub fn new(x: i32, y: i32, width: i32, height: i32) -> Self {
        Self {
            x,
            y,
            width,
            height,
        }
    }

    pub fn right(&self) -> i32 {
        self.x + self.width
    }

    pub fn bottom(&self) -> i32 {
        self.y + self.height
    }

    pub fn is_empty(&self) -> bool {
        self.width <= 0 || self.height <= 0
    }

    /// Translates the rectangle, e.g. to map a detection made inside a
    /// sub-region back into full-frame coordinates.
    pub fn offset_by(&self, dx: i32, dy: i32) -> Rect {
        Rect::new(self.x + dx, self.y + dy, self.width, self.height)
    }

    /// Pins the rectangle into `[0, frame_w) x [0, frame_h)`.
    ///
    /// The clamp is deliberately asymmetric: a negative left/top edge moves
    /// the origin to 0 without shrinking the size, while overrun past the
    /// right/bottom edge shrinks width/height so the rectangle ends exactly
    /// at the frame edge. Detector region lookups depend on this shape.
    pub fn clamp_to(&self, frame_w: u32, frame_h: u32) -> Rect {
        let mut r = *self;
        if r.x < 0 {
            r.x = 0;
        }
        if r.y < 0 {
            r.y = 0;
        }
        if r.bottom() > frame_h as i32 {
            r.height -= r.bottom() - frame_h as i32;
        }
        if r.right() > frame_w as i32 {
            r.width -= r.right() - frame_w as i32;
        }
        r
    }
}
