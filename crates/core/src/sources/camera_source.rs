use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex};
use std::thread::JoinHandle;

use nokhwa::pixel_format::RgbFormat;
use nokhwa::utils::{CameraIndex, RequestedFormat, RequestedFormatType};
use nokhwa::Camera;

use crate::pipeline::stage::{FramePublisher, FrameSource};
use crate::shared::frame::Frame;
use crate::sources::SourceError;

/// Live capture adapter over `nokhwa`.
///
/// Opens the device on `start`; a failed open surfaces before any frame is
/// delivered, leaving no partial state. Frames are published from the
/// capture thread as 3-channel RGB.
pub struct CameraSource {
    output: Arc<FramePublisher>,
    running: Arc<AtomicBool>,
    capture: Mutex<Option<JoinHandle<()>>>,
}

impl CameraSource {
    pub fn new() -> Self {
        Self {
            output: FramePublisher::new(),
            running: Arc::new(AtomicBool::new(false)),
            capture: Mutex::new(None),
        }
    }

    pub fn is_capturing(&self) -> bool {
        self.running.load(Ordering::SeqCst)
    }

    /// Opens camera `index` and starts delivering frames. No-op while
    /// already capturing.
    pub fn start(&self, index: u32) -> Result<(), SourceError> {
        if self.running.swap(true, Ordering::SeqCst) {
            return Ok(());
        }

        let requested =
            RequestedFormat::new::<RgbFormat>(RequestedFormatType::AbsoluteHighestFrameRate);
        let mut camera = Camera::new(CameraIndex::Index(index), requested).map_err(|e| {
            self.running.store(false, Ordering::SeqCst);
            SourceError::CameraUnavailable(e.to_string())
        })?;
        camera.open_stream().map_err(|e| {
            self.running.store(false, Ordering::SeqCst);
            SourceError::CameraUnavailable(e.to_string())
        })?;
        log::info!("camera {index} opened: {}", camera.info().human_name());

        let output = Arc::clone(&self.output);
        let running = Arc::clone(&self.running);
        let handle = std::thread::spawn(move || {
            let mut frame_count: usize = 0;
            while running.load(Ordering::SeqCst) {
                let buffer = match camera.frame() {
                    Ok(buffer) => buffer,
                    Err(e) => {
                        log::warn!("camera frame grab failed: {e}");
                        break;
                    }
                };
                let decoded = match buffer.decode_image::<RgbFormat>() {
                    Ok(decoded) => decoded,
                    Err(e) => {
                        log::warn!("camera frame decode failed: {e}");
                        continue;
                    }
                };
                let (width, height) = decoded.dimensions();
                let frame = Frame::new(decoded.into_raw(), width, height, 3, frame_count);
                frame_count += 1;
                output.publish(&frame);
            }
            let _ = camera.stop_stream();
            running.store(false, Ordering::SeqCst);
        });
        *self.capture.lock().unwrap() = Some(handle);
        Ok(())
    }

    /// Stops capture and joins the capture thread. Idempotent; safe while
    /// downstream detection is in flight.
    pub fn stop(&self) {
        if !self.running.swap(false, Ordering::SeqCst) {
            return;
        }
        if let Some(handle) = self.capture.lock().unwrap().take() {
            let _ = handle.join();
        }
    }
}

impl FrameSource for CameraSource {
    fn output(&self) -> &Arc<FramePublisher> {
        &self.output
    }
}

impl Default for CameraSource {
    fn default() -> Self {
        Self::new()
    }
}

impl Drop for CameraSource {
    fn drop(&mut self) {
        self.stop();
    }
}
