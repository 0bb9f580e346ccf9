use std::path::Path;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::thread::JoinHandle;
use std::time::Duration;

use crate::pipeline::stage::{FramePublisher, FrameSource};
use crate::shared::frame::Frame;
use crate::sources::SourceError;

pub const DEFAULT_FRAME_RATE: u32 = 10;

/// Repeat-sender for a still image: publishes a clone of the held image
/// at a fixed rate, standing in for a live camera.
///
/// The image may be swapped while sending; the next tick picks it up.
pub struct ReplaySource {
    output: Arc<FramePublisher>,
    image: Arc<Mutex<Option<Frame>>>,
    frame_interval: Arc<Mutex<Duration>>,
    next_index: Arc<AtomicUsize>,
    running: Arc<AtomicBool>,
    sender: Mutex<Option<JoinHandle<()>>>,
}

impl ReplaySource {
    pub fn new() -> Self {
        Self {
            output: FramePublisher::new(),
            image: Arc::new(Mutex::new(None)),
            frame_interval: Arc::new(Mutex::new(interval_for(DEFAULT_FRAME_RATE))),
            next_index: Arc::new(AtomicUsize::new(0)),
            running: Arc::new(AtomicBool::new(false)),
            sender: Mutex::new(None),
        }
    }

    /// Loads the image to replay, converting to 3-channel RGB.
    pub fn load_from_file(&self, path: &Path) -> Result<(), SourceError> {
        let loaded = image::open(path)?.to_rgb8();
        let (width, height) = loaded.dimensions();
        let frame = Frame::new(loaded.into_raw(), width, height, 3, 0);
        log::info!("replay image loaded: {}x{} from {}", width, height, path.display());
        *self.image.lock().unwrap() = Some(frame);
        Ok(())
    }

    pub fn set_frame_rate(&self, fps: u32) {
        *self.frame_interval.lock().unwrap() = interval_for(fps.max(1));
    }

    pub fn is_sending(&self) -> bool {
        self.running.load(Ordering::SeqCst)
    }

    /// Starts the sender thread. Idempotent; ticks with no image loaded
    /// publish nothing.
    pub fn start_sending(&self) {
        if self.running.swap(true, Ordering::SeqCst) {
            return;
        }

        let output = Arc::clone(&self.output);
        let image = Arc::clone(&self.image);
        let interval = Arc::clone(&self.frame_interval);
        let next_index = Arc::clone(&self.next_index);
        let running = Arc::clone(&self.running);

        let handle = std::thread::spawn(move || {
            while running.load(Ordering::SeqCst) {
                let sleep_for = *interval.lock().unwrap();
                std::thread::sleep(sleep_for);
                if !running.load(Ordering::SeqCst) {
                    break;
                }

                let snapshot = image.lock().unwrap().clone();
                if let Some(frame) = snapshot {
                    let index = next_index.fetch_add(1, Ordering::SeqCst);
                    let stamped = Frame::new(
                        frame.data().to_vec(),
                        frame.width(),
                        frame.height(),
                        frame.channels(),
                        index,
                    );
                    output.publish(&stamped);
                }
            }
        });
        *self.sender.lock().unwrap() = Some(handle);
    }

    /// Stops the sender thread and waits for it to finish. Idempotent.
    pub fn stop_sending(&self) {
        if !self.running.swap(false, Ordering::SeqCst) {
            return;
        }
        if let Some(handle) = self.sender.lock().unwrap().take() {
            let _ = handle.join();
        }
    }
}

impl FrameSource for ReplaySource {
    fn output(&self) -> &Arc<FramePublisher> {
        &self.output
    }
}

impl Default for ReplaySource {
    fn default() -> Self {
        Self::new()
    }
}

impl Drop for ReplaySource {
    fn drop(&mut self) {
        self.stop_sending();
    }
}

fn interval_for(fps: u32) -> Duration {
    Duration::from_millis((1000 / fps.max(1)).max(1) as u64)
}
