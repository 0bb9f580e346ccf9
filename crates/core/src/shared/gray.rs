use crate::shared::frame::Frame;
use crate::shared::rect::Rect;

/// Single-channel 8-bit image used only as detector input.
///
/// Derived from an RGB [`Frame`] immediately before a detection pass and
/// never published downstream.
#[derive(Clone, Debug)]
pub struct GrayImage {
    data: Vec<u8>,
    width: u32,
    height: u32,
}

impl GrayImage {
    pub fn new(data: Vec<u8>, width: u32, height: u32) -> Self {
        debug_assert_eq!(
            data.len(),
            (width as usize) * (height as usize),
            "data length must equal width * height"
        );
        Self {
            data,
            width,
            height,
        }
    }

    /// Rec.601 luma conversion. Single-channel frames pass through.
    pub fn from_frame(frame: &Frame) -> Self {
        let width = frame.width();
        let height = frame.height();
        if frame.channels() == 1 {
            return Self::new(frame.data().to_vec(), width, height);
        }

        let channels = frame.channels() as usize;
        let mut data = Vec::with_capacity((width as usize) * (height as usize));
        for pixel in frame.data().chunks_exact(channels) {
            let (r, g, b) = (pixel[0] as u32, pixel[1] as u32, pixel[2] as u32);
            data.push(((r * 299 + g * 587 + b * 114) / 1000) as u8);
        }
        Self::new(data, width, height)
    }

    pub fn data(&self) -> &[u8] {
        &self.data
    }

    pub fn width(&self) -> u32 {
        self.width
    }

    pub fn height(&self) -> u32 {
        self.height
    }

    /// Histogram equalization: normalizes brightness and stretches
    /// contrast, which cascade-style detectors are sensitive to.
    pub fn equalize_hist(&mut self) {
        let total = self.data.len();
        if total == 0 {
            return;
        }

        let mut histogram = [0usize; 256];
        for &v in &self.data {
            histogram[v as usize] += 1;
        }

        let mut cdf = [0usize; 256];
        let mut running = 0;
        for (level, &count) in histogram.iter().enumerate() {
            running += count;
            cdf[level] = running;
        }

        let cdf_min = cdf
            .iter()
            .copied()
            .find(|&c| c > 0)
            .unwrap_or(0);
        if cdf_min == total {
            // Flat image, nothing to stretch.
            return;
        }

        let scale = 255.0 / (total - cdf_min) as f64;
        let mut lut = [0u8; 256];
        for level in 0..256 {
            let mapped = (cdf[level].saturating_sub(cdf_min)) as f64 * scale;
            lut[level] = mapped.round() as u8;
        }

        for v in &mut self.data {
            *v = lut[*v as usize];
        }
    }

    /// Copies out a sub-region. The rect must already be clamped to the
    /// image bounds.
    pub fn crop(&self, rect: &Rect) -> GrayImage {
        debug_assert!(rect.x >= 0 && rect.y >= 0);
        debug_assert!(rect.right() <= self.width as i32 && rect.bottom() <= self.height as i32);

        let w = rect.width.max(0) as usize;
        let h = rect.height.max(0) as usize;
        let stride = self.width as usize;

        let mut data = Vec::with_capacity(w * h);
        for row in 0..h {
            let start = (rect.y as usize + row) * stride + rect.x as usize;
            data.extend_from_slice(&self.data[start..start + w]);
        }
        GrayImage::new(data, w as u32, h as u32)
    }
}
