use std::path::PathBuf;
use std::process;
use std::sync::{Arc, Mutex};
use std::time::Duration;

use clap::Parser;

use facetrack_core::detection::domain::detection_pass::DetectorSet;
use facetrack_core::detection::domain::face_features::summarize;
use facetrack_core::detection::domain::feature_detector::FeatureDetector;
use facetrack_core::detection::infrastructure::null_feature_detector::NullFeatureDetector;
use facetrack_core::detection::infrastructure::rustface_detector::RustfaceFrontalDetector;
use facetrack_core::pipeline::detector_stage::{DetectionMode, DetectorStage};
use facetrack_core::pipeline::stage::{FramePublisher, FrameSource, FrameStage};
use facetrack_core::shared::frame::Frame;
use facetrack_core::sources::replay_source::ReplaySource;

/// Streams frames through the face-feature detection pipeline.
#[derive(Parser)]
#[command(name = "facetrack")]
struct Cli {
    /// Image file to replay as a frame stream.
    input: Option<PathBuf>,

    /// Save the last annotated frame here.
    #[arg(long)]
    output: Option<PathBuf>,

    /// Detection scheduling: disabled, periodic, all-frames, or manual.
    #[arg(long, default_value = "periodic")]
    mode: String,

    /// Detection period in milliseconds (periodic mode).
    #[arg(long, default_value = "500")]
    period_ms: u64,

    /// Replay frame rate.
    #[arg(long, default_value = "10")]
    fps: u32,

    /// Number of frames to stream before exiting.
    #[arg(long, default_value = "30")]
    frames: usize,

    /// Also draw the probable sub-feature search regions.
    #[arg(long)]
    draw_probable_areas: bool,

    /// SeetaFace frontal model for the primary face detector.
    #[arg(long)]
    face_model: Option<PathBuf>,

    /// Capture from this camera index instead of replaying an image.
    #[cfg(feature = "camera")]
    #[arg(long)]
    camera: Option<u32>,
}

fn main() {
    env_logger::init();

    if let Err(e) = run() {
        eprintln!("Error: {e}");
        process::exit(1);
    }
}

/// Terminal sink: keeps the last frame and signals per-frame progress.
struct FrameSink {
    last: Mutex<Option<Frame>>,
    delivered: crossbeam_channel::Sender<()>,
}

impl FrameStage for FrameSink {
    fn on_frame_received(&self, frame: &Frame) {
        *self.last.lock().unwrap() = Some(frame.clone());
        let _ = self.delivered.send(());
    }
}

fn run() -> Result<(), Box<dyn std::error::Error>> {
    let cli = Cli::parse();
    let mode = parse_mode(&cli.mode)?;

    let stage = DetectorStage::new(build_detectors(&cli)?);
    stage.set_period(Duration::from_millis(cli.period_ms));
    stage.set_draw_detection(true);
    stage.set_draw_probable_areas(cli.draw_probable_areas);

    let events = stage.subscribe_events();
    std::thread::spawn(move || {
        for event in events {
            if event.starting {
                log::info!("detection starting");
            } else if let Some(faces) = event.faces {
                log::info!(
                    "detection took {} ms, result: {}",
                    event.elapsed_ms,
                    summarize(&faces)
                );
            }
        }
    });

    let (delivered_tx, delivered_rx) = crossbeam_channel::unbounded();
    let sink = Arc::new(FrameSink {
        last: Mutex::new(None),
        delivered: delivered_tx,
    });
    stage
        .output()
        .subscribe(Arc::clone(&sink) as Arc<dyn FrameStage>);

    let source = build_source(&cli)?;
    stage.attach_source(source.as_frame_source());
    stage.set_mode(mode);
    source.start()?;

    if mode == DetectionMode::Manual {
        stage.manual_detect();
    }

    for _ in 0..cli.frames {
        delivered_rx.recv_timeout(Duration::from_secs(30))?;
    }

    source.stop();
    stage.detach_source();

    if let Some(output) = cli.output {
        let frame = sink
            .last
            .lock()
            .unwrap()
            .take()
            .ok_or("no frame was delivered")?;
        save_frame(&frame, &output)?;
        log::info!("annotated frame written to {}", output.display());
    }

    Ok(())
}

fn parse_mode(mode: &str) -> Result<DetectionMode, String> {
    match mode {
        "disabled" => Ok(DetectionMode::Disabled),
        "periodic" => Ok(DetectionMode::Periodic),
        "all-frames" => Ok(DetectionMode::AllFrames),
        "manual" => Ok(DetectionMode::Manual),
        other => Err(format!(
            "unknown mode '{other}' (expected disabled, periodic, all-frames, or manual)"
        )),
    }
}

fn build_detectors(cli: &Cli) -> Result<DetectorSet, Box<dyn std::error::Error>> {
    let face: Arc<dyn FeatureDetector> = match &cli.face_model {
        Some(path) => Arc::new(RustfaceFrontalDetector::from_model_path(path)?),
        None => {
            log::warn!("no --face-model given; face detection will find nothing");
            Arc::new(NullFeatureDetector)
        }
    };
    // No sub-feature models ship with the SeetaFace engine; those slots
    // run as ordinary zero-hit detectors.
    Ok(DetectorSet::new(
        face,
        Arc::new(NullFeatureDetector),
        Arc::new(NullFeatureDetector),
        Arc::new(NullFeatureDetector),
    ))
}

/// A startable/stoppable source, image replay or live camera.
trait CliSource: FrameSource {
    fn start(&self) -> Result<(), Box<dyn std::error::Error>>;
    fn stop(&self);
    /// View as the pipeline-level source contract.
    fn as_frame_source(&self) -> &dyn FrameSource;
}

struct ReplayCliSource(ReplaySource);

impl FrameSource for ReplayCliSource {
    fn output(&self) -> &Arc<FramePublisher> {
        self.0.output()
    }
}

impl CliSource for ReplayCliSource {
    fn start(&self) -> Result<(), Box<dyn std::error::Error>> {
        self.0.start_sending();
        Ok(())
    }
    fn stop(&self) {
        self.0.stop_sending();
    }
    fn as_frame_source(&self) -> &dyn FrameSource {
        self
    }
}

#[cfg(feature = "camera")]
struct CameraCliSource {
    source: facetrack_core::sources::camera_source::CameraSource,
    index: u32,
}

#[cfg(feature = "camera")]
impl FrameSource for CameraCliSource {
    fn output(&self) -> &Arc<FramePublisher> {
        self.source.output()
    }
}

#[cfg(feature = "camera")]
impl CliSource for CameraCliSource {
    fn start(&self) -> Result<(), Box<dyn std::error::Error>> {
        self.source.start(self.index)?;
        Ok(())
    }
    fn stop(&self) {
        self.source.stop();
    }
    fn as_frame_source(&self) -> &dyn FrameSource {
        self
    }
}

fn build_source(cli: &Cli) -> Result<Box<dyn CliSource>, Box<dyn std::error::Error>> {
    #[cfg(feature = "camera")]
    if let Some(index) = cli.camera {
        let source = facetrack_core::sources::camera_source::CameraSource::new();
        return Ok(Box::new(CameraCliSource { source, index }));
    }

    let input = cli
        .input
        .as_ref()
        .ok_or("an input image is required (or --camera with the camera feature)")?;
    let source = ReplaySource::new();
    source.load_from_file(input)?;
    source.set_frame_rate(cli.fps);
    Ok(Box::new(ReplayCliSource(source)))
}

fn save_frame(frame: &Frame, path: &std::path::Path) -> Result<(), Box<dyn std::error::Error>> {
    let buffer = image::RgbImage::from_raw(frame.width(), frame.height(), frame.data().to_vec())
        .ok_or("frame buffer does not match its dimensions")?;
    buffer.save(path)?;
    Ok(())
}
