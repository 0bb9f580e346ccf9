use std::sync::Mutex;

use crossbeam_channel::{Receiver, Sender};

use crate::detection::domain::face_features::FaceFeatures;

/// Detection lifecycle notification.
///
/// Starting events never carry faces; ending events carry the completed
/// face list and the pass's wall-clock duration.
#[derive(Clone, Debug)]
pub struct DetectionEvent {
    pub starting: bool,
    pub faces: Option<Vec<FaceFeatures>>,
    pub elapsed_ms: u64,
}

impl DetectionEvent {
    pub fn started() -> Self {
        Self {
            starting: true,
            faces: None,
            elapsed_ms: 0,
        }
    }

    pub fn ended(faces: Vec<FaceFeatures>, elapsed_ms: u64) -> Self {
        Self {
            starting: false,
            faces: Some(faces),
            elapsed_ms,
        }
    }
}

/// Multicast fan-out of [`DetectionEvent`]s over unbounded channels.
///
/// Subscribers that drop their receiver are pruned on the next send.
pub struct EventBroadcast {
    senders: Mutex<Vec<Sender<DetectionEvent>>>,
}

impl EventBroadcast {
    pub fn new() -> Self {
        Self {
            senders: Mutex::new(Vec::new()),
        }
    }

    pub fn subscribe(&self) -> Receiver<DetectionEvent> {
        let (tx, rx) = crossbeam_channel::unbounded();
        self.senders.lock().unwrap().push(tx);
        rx
    }

    pub fn send(&self, event: DetectionEvent) {
        let mut senders = self.senders.lock().unwrap();
        senders.retain(|tx| tx.send(event.clone()).is_ok());
    }
}

impl Default for EventBroadcast {
    fn default() -> Self {
        Self::new()
    }
}
