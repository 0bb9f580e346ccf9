//! Publish/subscribe frame routing.
//!
//! Publishing is a synchronous fan-out on the caller's thread, in
//! subscription order, with no buffering: a subscriber that is not
//! attached at publish time never sees that frame.

use std::sync::{Arc, Mutex};

use crate::shared::frame::Frame;

/// A pipeline stage's receive hook. Stages are shared between the
/// producer thread and their own workers, so the hook takes `&self`.
pub trait FrameStage: Send + Sync {
    fn on_frame_received(&self, frame: &Frame);
}

/// Handle for removing a subscriber again.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct SubscriptionId(u64);

struct PublisherInner {
    next_id: u64,
    subscribers: Vec<(SubscriptionId, Arc<dyn FrameStage>)>,
}

/// Frame-available broadcast point owned by every producer.
pub struct FramePublisher {
    inner: Mutex<PublisherInner>,
}

impl FramePublisher {
    pub fn new() -> Arc<Self> {
        Arc::new(Self {
            inner: Mutex::new(PublisherInner {
                next_id: 0,
                subscribers: Vec::new(),
            }),
        })
    }

    pub fn subscribe(&self, stage: Arc<dyn FrameStage>) -> SubscriptionId {
        let mut inner = self.inner.lock().unwrap();
        let id = SubscriptionId(inner.next_id);
        inner.next_id += 1;
        inner.subscribers.push((id, stage));
        id
    }

    pub fn unsubscribe(&self, id: SubscriptionId) {
        let mut inner = self.inner.lock().unwrap();
        inner.subscribers.retain(|(sid, _)| *sid != id);
    }

    pub fn subscriber_count(&self) -> usize {
        self.inner.lock().unwrap().subscribers.len()
    }

    /// Delivers the frame to every current subscriber, synchronously.
    ///
    /// The subscriber list is snapshotted first so a stage may attach or
    /// detach from within its receive hook without deadlocking.
    pub fn publish(&self, frame: &Frame) {
        let snapshot: Vec<Arc<dyn FrameStage>> = {
            let inner = self.inner.lock().unwrap();
            inner
                .subscribers
                .iter()
                .map(|(_, stage)| Arc::clone(stage))
                .collect()
        };
        for stage in snapshot {
            stage.on_frame_received(frame);
        }
    }
}

/// Anything that emits frames: sources and intermediate stages alike.
pub trait FrameSource {
    fn output(&self) -> &Arc<FramePublisher>;
}

/// A stage's single upstream attachment.
///
/// Attaching detaches any previous source first, so a stage listens to
/// exactly one producer at a time. Detaching is idempotent and never
/// blocks on in-flight work.
pub struct SourceLink {
    attached: Mutex<Option<(Arc<FramePublisher>, SubscriptionId)>>,
}

impl SourceLink {
    pub fn new() -> Self {
        Self {
            attached: Mutex::new(None),
        }
    }

    pub fn attach(&self, source: &dyn FrameSource, subscriber: Arc<dyn FrameStage>) {
        self.detach();
        let publisher = Arc::clone(source.output());
        let id = publisher.subscribe(subscriber);
        *self.attached.lock().unwrap() = Some((publisher, id));
    }

    pub fn detach(&self) {
        if let Some((publisher, id)) = self.attached.lock().unwrap().take() {
            publisher.unsubscribe(id);
        }
    }

    pub fn is_attached(&self) -> bool {
        self.attached.lock().unwrap().is_some()
    }
}

impl Default for SourceLink {
    fn default() -> Self {
        Self::new()
    }
}
