//! The detection stage: scheduling state machine, asynchronous pass
//! execution, result cache, and frame annotation.
//!
//! The stage sits between a frame source and downstream subscribers. Every
//! incoming frame is republished immediately; detection runs either inline
//! (AllFrames) or on a fire-and-forget worker holding a frame clone, with
//! at most one pass in flight. Overlays always show the most recently
//! completed pass, so in the asynchronous modes results lag the frame that
//! triggered them by at least one frame.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex};
use std::time::{Duration, Instant};

use crossbeam_channel::Receiver;

use crate::detection::domain::detection_pass::{run_pass, DetectorSet};
use crate::detection::domain::face_features::FaceFeatures;
use crate::pipeline::events::{DetectionEvent, EventBroadcast};
use crate::pipeline::periodic_trigger::PeriodicTrigger;
use crate::pipeline::stage::{FramePublisher, FrameSource, FrameStage, SourceLink};
use crate::shared::frame::Frame;

/// When detection runs relative to the frame stream.
///
/// `Disabled` passes frames through and drops stale results; `Periodic`
/// triggers on a timer; `AllFrames` detects synchronously on every frame;
/// `Manual` only detects on [`DetectorStage::manual_detect`].
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub enum DetectionMode {
    #[default]
    Disabled,
    Periodic,
    AllFrames,
    Manual,
}

pub const DEFAULT_DETECTION_PERIOD: Duration = Duration::from_millis(500);

/// Shortest accepted detection period; shorter requests are clamped, not
/// silently dropped.
pub const MIN_DETECTION_PERIOD: Duration = Duration::from_millis(1);

/// Shared state a worker needs to execute one pass and publish its
/// outcome. Cloning shares everything.
#[derive(Clone)]
struct PassContext {
    detectors: DetectorSet,
    events: Arc<EventBroadcast>,
    results: Arc<Mutex<Arc<Vec<FaceFeatures>>>>,
    in_progress: Arc<AtomicBool>,
}

/// Clears the in-progress flag on every exit path, including panics in a
/// detector backend.
struct InProgressGuard(Arc<AtomicBool>);

impl Drop for InProgressGuard {
    fn drop(&mut self) {
        self.0.store(false, Ordering::SeqCst);
    }
}

impl PassContext {
    /// Claims the single in-flight slot. Callers must run
    /// [`PassContext::run_claimed`] (or drop the claim via it) when this
    /// returns true.
    fn try_claim(&self) -> bool {
        self.in_progress
            .compare_exchange(false, true, Ordering::SeqCst, Ordering::SeqCst)
            .is_ok()
    }

    /// Executes one claimed pass: start event, detection, atomic result
    /// swap, end event. The claim is released on all exit paths.
    fn run_claimed(&self, frame: &Frame) {
        let _guard = InProgressGuard(Arc::clone(&self.in_progress));

        self.events.send(DetectionEvent::started());
        let started_at = Instant::now();

        let faces = run_pass(&self.detectors, frame);
        let elapsed_ms = started_at.elapsed().as_millis() as u64;

        *self.results.lock().unwrap() = Arc::new(faces.clone());
        self.events.send(DetectionEvent::ended(faces, elapsed_ms));
    }

    fn snapshot(&self) -> Arc<Vec<FaceFeatures>> {
        Arc::clone(&self.results.lock().unwrap())
    }

    fn clear_results(&self) {
        let mut results = self.results.lock().unwrap();
        if !results.is_empty() {
            *results = Arc::new(Vec::new());
        }
    }
}

/// Pipeline stage that locates faces and sub-features without stalling
/// frame delivery.
pub struct DetectorStage {
    output: Arc<FramePublisher>,
    source_link: SourceLink,
    pass: PassContext,
    mode: Mutex<DetectionMode>,
    period: Mutex<Duration>,
    draw_detection: AtomicBool,
    draw_probable_areas: AtomicBool,
    detect_next_frame: Arc<AtomicBool>,
    trigger: PeriodicTrigger,
}

impl DetectorStage {
    pub fn new(detectors: DetectorSet) -> Arc<Self> {
        let detect_next_frame = Arc::new(AtomicBool::new(false));
        let trigger = PeriodicTrigger::new(Arc::clone(&detect_next_frame));
        Arc::new(Self {
            output: FramePublisher::new(),
            source_link: SourceLink::new(),
            pass: PassContext {
                detectors,
                events: Arc::new(EventBroadcast::new()),
                results: Arc::new(Mutex::new(Arc::new(Vec::new()))),
                in_progress: Arc::new(AtomicBool::new(false)),
            },
            mode: Mutex::new(DetectionMode::Disabled),
            period: Mutex::new(DEFAULT_DETECTION_PERIOD),
            draw_detection: AtomicBool::new(false),
            draw_probable_areas: AtomicBool::new(false),
            detect_next_frame,
            trigger,
        })
    }

    /// Subscribes this stage to a producer, replacing any previous
    /// attachment. Safe while a pass is in flight.
    pub fn attach_source(self: &Arc<Self>, source: &dyn FrameSource) {
        self.source_link
            .attach(source, Arc::clone(self) as Arc<dyn FrameStage>);
    }

    pub fn detach_source(&self) {
        self.source_link.detach();
    }

    /// Detection start/end notifications.
    pub fn subscribe_events(&self) -> Receiver<DetectionEvent> {
        self.pass.events.subscribe()
    }

    pub fn mode(&self) -> DetectionMode {
        *self.mode.lock().unwrap()
    }

    /// Switches the scheduling mode. Every switch clears a pending
    /// trigger, so a stale request from the previous mode never carries
    /// over; Periodic (re)arms the timer at the stored period.
    pub fn set_mode(&self, mode: DetectionMode) {
        *self.mode.lock().unwrap() = mode;
        self.detect_next_frame.store(false, Ordering::SeqCst);
        if mode == DetectionMode::Periodic {
            self.trigger.arm(self.period());
        } else {
            self.trigger.disarm();
        }
    }

    pub fn period(&self) -> Duration {
        *self.period.lock().unwrap()
    }

    /// Updates the periodic cadence. Takes effect immediately in Periodic
    /// mode, otherwise on the next switch into it.
    pub fn set_period(&self, period: Duration) {
        let period = if period < MIN_DETECTION_PERIOD {
            log::warn!(
                "detection period {period:?} below minimum, clamping to {MIN_DETECTION_PERIOD:?}"
            );
            MIN_DETECTION_PERIOD
        } else {
            period
        };
        *self.period.lock().unwrap() = period;
        if self.mode() == DetectionMode::Periodic {
            self.trigger.arm(period);
        }
    }

    pub fn set_draw_detection(&self, enabled: bool) {
        self.draw_detection.store(enabled, Ordering::SeqCst);
    }

    pub fn set_draw_probable_areas(&self, enabled: bool) {
        self.draw_probable_areas.store(enabled, Ordering::SeqCst);
    }

    /// Requests one detection on the next frame, regardless of mode.
    pub fn manual_detect(&self) {
        self.detect_next_frame.store(true, Ordering::SeqCst);
    }

    /// Drops the cached results so nothing stale is drawn.
    pub fn reset_detections(&self) {
        self.pass.clear_results();
    }

    /// The most recently completed pass's faces.
    pub fn last_detected_faces(&self) -> Arc<Vec<FaceFeatures>> {
        self.pass.snapshot()
    }

    /// Decides whether this frame runs a pass and returns the face list
    /// the outgoing frame should be annotated with.
    ///
    /// The snapshot for the asynchronous modes is taken before the worker
    /// is spawned: even if the pass finishes instantly, the triggering
    /// frame carries the previous results, never its own.
    fn schedule(&self, frame: &Frame) -> Arc<Vec<FaceFeatures>> {
        let previous = self.pass.snapshot();
        match self.mode() {
            DetectionMode::AllFrames => {
                // Synchronous: this frame's overlay reflects this frame.
                if self.pass.try_claim() {
                    self.pass.run_claimed(frame);
                }
                self.pass.snapshot()
            }
            DetectionMode::Periodic | DetectionMode::Manual => {
                // A pending trigger stays pending while a pass is in
                // flight; it is consumed by the first frame after the
                // pass completes. Never more than one worker.
                if self.detect_next_frame.load(Ordering::SeqCst) && self.pass.try_claim() {
                    self.detect_next_frame.store(false, Ordering::SeqCst);
                    let context = self.pass.clone();
                    let snapshot = frame.clone();
                    std::thread::spawn(move || context.run_claimed(&snapshot));
                }
                previous
            }
            DetectionMode::Disabled => {
                self.pass.clear_results();
                Arc::new(Vec::new())
            }
        }
    }

    fn publish_annotated(&self, frame: &Frame, faces: &[FaceFeatures]) {
        if !self.draw_detection.load(Ordering::SeqCst) || faces.is_empty() {
            self.output.publish(frame);
            return;
        }

        let mut annotated = frame.clone();
        let include_probable = self.draw_probable_areas.load(Ordering::SeqCst);
        for face in faces {
            face.draw_onto(&mut annotated, include_probable);
        }
        self.output.publish(&annotated);
    }
}

impl FrameStage for DetectorStage {
    fn on_frame_received(&self, frame: &Frame) {
        let faces = self.schedule(frame);
        self.publish_annotated(frame, &faces);
    }
}

impl FrameSource for DetectorStage {
    fn output(&self) -> &Arc<FramePublisher> {
        &self.output
    }
}

#[cfg(test)]
mod tests {
    use std::sync::atomic::AtomicUsize;

    use crossbeam_channel::{bounded, Sender};

    use crate::detection::domain::detection_pass::test_support::{test_frame, StubDetector};
    use crate::detection::domain::feature_detector::{DetectOptions, FeatureDetector};
    use crate::shared::gray::GrayImage;
    use crate::shared::rect::Rect;

    use super::*;

    const RECV_TIMEOUT: Duration = Duration::from_secs(5);

    fn stage_with_face_stub(hits: Vec<Rect>) -> (Arc<DetectorStage>, Arc<StubDetector>) {
        let face = StubDetector::hits(hits);
        let sub = StubDetector::empty();
        let stage = DetectorStage::new(DetectorSet::new(
            face.clone(),
            sub.clone(),
            sub.clone(),
            sub,
        ));
        (stage, face)
    }

    fn wait_for_ended(events: &Receiver<DetectionEvent>) -> DetectionEvent {
        loop {
            let event = events.recv_timeout(RECV_TIMEOUT).expect("detection event");
            if !event.starting {
                return event;
            }
        }
    }

    /// Collects frames republished by the stage.
    struct Collector {
        frames: Mutex<Vec<Frame>>,
    }

    impl Collector {
        fn new() -> Arc<Self> {
            Arc::new(Self {
                frames: Mutex::new(Vec::new()),
            })
        }

        fn count(&self) -> usize {
            self.frames.lock().unwrap().len()
        }

        fn last(&self) -> Frame {
            self.frames.lock().unwrap().last().unwrap().clone()
        }
    }

    impl FrameStage for Collector {
        fn on_frame_received(&self, frame: &Frame) {
            self.frames.lock().unwrap().push(frame.clone());
        }
    }

    /// Detector that parks inside `detect` until released, to hold a pass
    /// in flight deterministically.
    struct BlockingDetector {
        entered: Sender<()>,
        release: Receiver<()>,
        calls: AtomicUsize,
    }

    impl FeatureDetector for BlockingDetector {
        fn detect(
            &self,
            _image: &GrayImage,
            _opts: &DetectOptions,
        ) -> Result<Vec<Rect>, Box<dyn std::error::Error>> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            let _ = self.entered.send(());
            let _ = self.release.recv_timeout(RECV_TIMEOUT);
            Ok(Vec::new())
        }
    }

    #[test]
    fn test_all_frames_detects_synchronously_per_frame() {
        let (stage, face) = stage_with_face_stub(vec![Rect::new(0, 0, 50, 50)]);
        stage.set_mode(DetectionMode::AllFrames);

        for i in 0..3 {
            stage.on_frame_received(&test_frame(200, 200));
            // Results for this very frame are visible as soon as the call
            // returns: no lag in AllFrames mode.
            assert_eq!(face.call_count(), i + 1);
            assert_eq!(stage.last_detected_faces().len(), 1);
        }
    }

    #[test]
    fn test_disabled_clears_results_within_one_frame() {
        let (stage, _face) = stage_with_face_stub(vec![Rect::new(0, 0, 50, 50)]);
        stage.set_mode(DetectionMode::AllFrames);
        stage.on_frame_received(&test_frame(200, 200));
        assert_eq!(stage.last_detected_faces().len(), 1);

        stage.set_mode(DetectionMode::Disabled);
        stage.on_frame_received(&test_frame(200, 200));
        assert!(stage.last_detected_faces().is_empty());
    }

    #[test]
    fn test_disabled_runs_no_detection() {
        let (stage, face) = stage_with_face_stub(vec![Rect::new(0, 0, 50, 50)]);
        stage.set_mode(DetectionMode::Disabled);
        for _ in 0..5 {
            stage.on_frame_received(&test_frame(100, 100));
        }
        assert_eq!(face.call_count(), 0);
    }

    #[test]
    fn test_manual_overlapping_triggers_run_one_pass() {
        let (stage, face) = stage_with_face_stub(Vec::new());
        let events = stage.subscribe_events();
        stage.set_mode(DetectionMode::Manual);

        // Two triggers land before any frame is delivered: the flag
        // coalesces them into a single pass.
        stage.manual_detect();
        stage.manual_detect();

        stage.on_frame_received(&test_frame(100, 100));
        wait_for_ended(&events);
        stage.on_frame_received(&test_frame(100, 100));
        stage.on_frame_received(&test_frame(100, 100));

        assert_eq!(face.call_count(), 1);
    }

    #[test]
    fn test_no_second_pass_while_one_is_in_flight() {
        let (entered_tx, entered_rx) = bounded(8);
        let (release_tx, release_rx) = bounded(8);
        let blocking = Arc::new(BlockingDetector {
            entered: entered_tx,
            release: release_rx,
            calls: AtomicUsize::new(0),
        });
        let sub = StubDetector::empty();
        let stage = DetectorStage::new(DetectorSet::new(
            blocking.clone(),
            sub.clone(),
            sub.clone(),
            sub,
        ));
        let events = stage.subscribe_events();
        stage.set_mode(DetectionMode::Manual);

        stage.manual_detect();
        stage.on_frame_received(&test_frame(100, 100));
        entered_rx
            .recv_timeout(RECV_TIMEOUT)
            .expect("worker should enter detect");

        // Trigger again mid-pass: the frame path must not start a second
        // worker while the first is parked in the detector.
        stage.manual_detect();
        stage.on_frame_received(&test_frame(100, 100));
        stage.on_frame_received(&test_frame(100, 100));
        assert_eq!(blocking.calls.load(Ordering::SeqCst), 1);

        release_tx.send(()).unwrap();
        wait_for_ended(&events);

        // The trigger stayed pending and is honored once the slot frees.
        stage.on_frame_received(&test_frame(100, 100));
        entered_rx
            .recv_timeout(RECV_TIMEOUT)
            .expect("second pass after first completed");
        release_tx.send(()).unwrap();
        wait_for_ended(&events);
        assert_eq!(blocking.calls.load(Ordering::SeqCst), 2);
    }

    #[test]
    fn test_async_results_lag_the_triggering_frame() {
        let (stage, _face) = stage_with_face_stub(vec![Rect::new(10, 10, 40, 40)]);
        let events = stage.subscribe_events();
        let collector = Collector::new();
        stage
            .output()
            .subscribe(Arc::clone(&collector) as Arc<dyn FrameStage>);
        stage.set_mode(DetectionMode::Manual);
        stage.set_draw_detection(true);

        stage.manual_detect();
        stage.on_frame_received(&test_frame(100, 100));

        // The triggering frame went out before its pass finished, so it
        // carries no overlay (previous results were empty).
        assert_eq!(collector.count(), 1);
        let first = collector.last();
        assert_eq!(first.data(), test_frame(100, 100).data());

        wait_for_ended(&events);

        // The next frame carries the now-completed results.
        stage.on_frame_received(&test_frame(100, 100));
        let second = collector.last();
        let view = second.as_ndarray();
        assert_eq!(view[[10, 10, 0]], 255);
    }

    #[test]
    fn test_annotation_disabled_republishes_untouched() {
        let (stage, _face) = stage_with_face_stub(vec![Rect::new(10, 10, 40, 40)]);
        let collector = Collector::new();
        stage
            .output()
            .subscribe(Arc::clone(&collector) as Arc<dyn FrameStage>);
        stage.set_mode(DetectionMode::AllFrames);

        stage.on_frame_received(&test_frame(100, 100));

        assert_eq!(stage.last_detected_faces().len(), 1);
        assert_eq!(collector.last().data(), test_frame(100, 100).data());
    }

    #[test]
    fn test_mode_switch_clears_pending_trigger() {
        let (stage, face) = stage_with_face_stub(Vec::new());
        stage.set_mode(DetectionMode::Manual);
        stage.manual_detect();

        // Switching modes drops the stale request.
        stage.set_mode(DetectionMode::Manual);
        stage.on_frame_received(&test_frame(100, 100));
        std::thread::sleep(Duration::from_millis(50));
        assert_eq!(face.call_count(), 0);
    }

    #[test]
    fn test_periodic_mode_triggers_and_stops() {
        let (stage, face) = stage_with_face_stub(Vec::new());
        let events = stage.subscribe_events();
        stage.set_period(Duration::from_millis(5));
        stage.set_mode(DetectionMode::Periodic);

        // Pump frames until the timer-armed flag produces a pass.
        let deadline = Instant::now() + RECV_TIMEOUT;
        loop {
            stage.on_frame_received(&test_frame(100, 100));
            if face.call_count() > 0 || Instant::now() > deadline {
                break;
            }
            std::thread::sleep(Duration::from_millis(1));
        }
        assert!(face.call_count() > 0, "periodic trigger never fired");
        wait_for_ended(&events);

        // Leaving Periodic disarms the timer: no new passes accumulate.
        stage.set_mode(DetectionMode::Manual);
        let count_after_switch = face.call_count();
        std::thread::sleep(Duration::from_millis(30));
        for _ in 0..5 {
            stage.on_frame_received(&test_frame(100, 100));
        }
        std::thread::sleep(Duration::from_millis(30));
        assert_eq!(face.call_count(), count_after_switch);
    }

    #[test]
    fn test_zero_period_is_clamped() {
        let (stage, _face) = stage_with_face_stub(Vec::new());
        stage.set_period(Duration::ZERO);
        assert_eq!(stage.period(), MIN_DETECTION_PERIOD);
    }

    #[test]
    fn test_reset_detections_drops_cache() {
        let (stage, _face) = stage_with_face_stub(vec![Rect::new(0, 0, 50, 50)]);
        stage.set_mode(DetectionMode::AllFrames);
        stage.on_frame_received(&test_frame(200, 200));
        assert_eq!(stage.last_detected_faces().len(), 1);

        stage.reset_detections();
        assert!(stage.last_detected_faces().is_empty());
    }

    #[test]
    fn test_detach_source_while_pass_in_flight_does_not_block() {
        let (entered_tx, entered_rx) = bounded(1);
        let (release_tx, release_rx) = bounded(1);
        let blocking = Arc::new(BlockingDetector {
            entered: entered_tx,
            release: release_rx,
            calls: AtomicUsize::new(0),
        });
        let sub = StubDetector::empty();
        let stage = DetectorStage::new(DetectorSet::new(
            blocking,
            sub.clone(),
            sub.clone(),
            sub,
        ));
        let events = stage.subscribe_events();
        stage.set_mode(DetectionMode::Manual);
        stage.manual_detect();
        stage.on_frame_received(&test_frame(100, 100));
        entered_rx.recv_timeout(RECV_TIMEOUT).unwrap();

        // Must return immediately even though the worker is parked.
        stage.detach_source();

        release_tx.send(()).unwrap();
        wait_for_ended(&events);
    }

    #[test]
    fn test_failed_pass_releases_the_in_flight_slot() {
        use crate::detection::domain::detection_pass::test_support::FailingDetector;

        let sub = StubDetector::empty();
        let stage = DetectorStage::new(DetectorSet::new(
            Arc::new(FailingDetector),
            sub.clone(),
            sub.clone(),
            sub,
        ));
        let events = stage.subscribe_events();
        stage.set_mode(DetectionMode::Manual);

        for _ in 0..2 {
            stage.manual_detect();
            // The trigger stays pending until the slot is free, so pump
            // frames until the pass starts. Each failed pass still
            // completes with an ending event and releases the slot, which
            // lets the next iteration's trigger claim it again.
            let started = loop {
                stage.on_frame_received(&test_frame(100, 100));
                match events.recv_timeout(Duration::from_millis(10)) {
                    Ok(event) => break event,
                    Err(_) => continue,
                }
            };
            assert!(started.starting);
            let ended = wait_for_ended(&events);
            assert!(ended.faces.expect("ending event carries faces").is_empty());
        }
    }

    #[test]
    fn test_ended_event_reports_faces_and_duration() {
        let (stage, _face) = stage_with_face_stub(vec![Rect::new(0, 0, 50, 50)]);
        let events = stage.subscribe_events();
        stage.set_mode(DetectionMode::AllFrames);
        stage.on_frame_received(&test_frame(200, 200));

        let started = events.recv_timeout(RECV_TIMEOUT).unwrap();
        assert!(started.starting);
        assert!(started.faces.is_none());

        let ended = wait_for_ended(&events);
        assert_eq!(ended.faces.expect("faces on ending event").len(), 1);
    }
}
