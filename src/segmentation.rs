//! Person segmentation: the mask type, the ONNX segmenter, and the
//! background worker that keeps the newest mask around for the render loop.

use std::path::Path;
use std::sync::mpsc::{self, Receiver, SyncSender, TrySendError};
use std::thread::{self, JoinHandle};
use std::time::{Duration, Instant};

use image::{imageops::FilterType, RgbImage};
use ort::session::Session;
use tracing::{debug, info, warn};

use crate::config::{ModelConfig, SegmentationConfig};
use crate::error::{Error, Result};
use crate::inference;

const MODEL_SIZE: u32 = 256;

/// Per-cell person labels at the segmenter's own resolution. 1 is person.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SegmentationMask {
    width: u32,
    height: u32,
    labels: Vec<u8>,
}

impl SegmentationMask {
    pub fn new(width: u32, height: u32, labels: Vec<u8>) -> Result<Self> {
        let expected = width as usize * height as usize;
        if labels.len() != expected {
            return Err(Error::InvalidMask {
                expected,
                actual: labels.len(),
            });
        }
        Ok(Self { width, height, labels })
    }

    pub fn width(&self) -> u32 {
        self.width
    }

    pub fn height(&self) -> u32 {
        self.height
    }

    pub fn label_at(&self, x: u32, y: u32) -> Option<u8> {
        if x >= self.width || y >= self.height {
            return None;
        }
        self.labels.get((y * self.width + x) as usize).copied()
    }

    /// False outside the mask.
    pub fn is_foreground(&self, x: u32, y: u32) -> bool {
        self.label_at(x, y) == Some(1)
    }

    pub fn foreground_count(&self) -> usize {
        self.labels.iter().filter(|&&l| l == 1).count()
    }
}

pub trait Segmenter {
    fn name(&self) -> String;
    fn segment(&mut self, frame: &RgbImage) -> Result<SegmentationMask>;
}

/// Selfie segmentation model: 256x256 NHWC input in [0,1], one person
/// probability per cell.
pub struct SelfieSegmenter {
    session: Session,
    threshold: f32,
}

impl SelfieSegmenter {
    pub fn new(model_path: &Path, threshold: f32) -> Result<Self> {
        let session = inference::load_session(model_path, 2)?;
        info!("Loaded segmentation model from {}", model_path.display());
        Ok(Self { session, threshold })
    }

    /// The configured model, or `None` (logged) when it is missing or fails
    /// to load.
    pub fn from_config(models: &ModelConfig) -> Option<Self> {
        let path = Path::new(&models.segmentation_path);
        if !path.exists() {
            warn!("Segmentation model not found at {}. Occlusion disabled.", path.display());
            return None;
        }
        match Self::new(path, models.segmentation_threshold) {
            Ok(segmenter) => Some(segmenter),
            Err(e) => {
                warn!("Failed to load segmentation model: {}. Occlusion disabled.", e);
                None
            }
        }
    }
}

/// Runs one segmentation outside the worker. A failure is logged and means
/// "no mask" for this frame.
pub fn segment_or_skip(segmenter: &mut dyn Segmenter, frame: &RgbImage) -> Option<SegmentationMask> {
    match segmenter.segment(frame) {
        Ok(mask) => Some(mask),
        Err(e) => {
            warn!("Segmentation failed: {}. Occlusion skipped.", e);
            None
        }
    }
}

impl Segmenter for SelfieSegmenter {
    fn name(&self) -> String {
        "Selfie Segmentation (256x256)".to_string()
    }

    fn segment(&mut self, frame: &RgbImage) -> Result<SegmentationMask> {
        let resized = image::imageops::resize(frame, MODEL_SIZE, MODEL_SIZE, FilterType::Triangle);
        let input_data = inference::to_nhwc(&resized, 0.0, 255.0);

        let shape = [1, MODEL_SIZE as i64, MODEL_SIZE as i64, 3];
        let probs = inference::run_first(&mut self.session, &shape, input_data)?;
        let cells = (MODEL_SIZE * MODEL_SIZE) as usize;
        if probs.len() < cells {
            return Err(Error::Model(format!(
                "segmentation output has {} values, expected {}",
                probs.len(),
                cells
            )));
        }

        threshold_probabilities(&probs[..cells], MODEL_SIZE, MODEL_SIZE, self.threshold)
    }
}

/// Cells strictly above `threshold` become person.
pub fn threshold_probabilities(probs: &[f32], width: u32, height: u32, threshold: f32) -> Result<SegmentationMask> {
    let labels = probs.iter().map(|&p| u8::from(p > threshold)).collect();
    SegmentationMask::new(width, height, labels)
}

/// Admits at most one request per interval.
#[derive(Debug, Clone)]
pub struct Throttle {
    interval: Duration,
    last: Option<Instant>,
}

impl Throttle {
    pub fn new(interval: Duration) -> Self {
        Self { interval, last: None }
    }

    /// Records `now` and returns true when the interval has passed.
    pub fn ready(&mut self, now: Instant) -> bool {
        match self.last {
            Some(last) if now.saturating_duration_since(last) < self.interval => false,
            _ => {
                self.last = Some(now);
                true
            }
        }
    }
}

/// Runs a `Segmenter` on its own thread. The render loop never waits on it:
/// requests are dropped while the worker is busy and results are picked up
/// whenever `poll` is called.
pub struct MaskWorker {
    tx_frame: Option<SyncSender<RgbImage>>,
    rx_result: Option<Receiver<SegmentationMask>>,
    handle: Option<JoinHandle<()>>,
    throttle: Throttle,
    latest: Option<SegmentationMask>,
}

impl MaskWorker {
    pub fn spawn(mut segmenter: Box<dyn Segmenter + Send>, interval: Duration) -> Self {
        // Capacity 1 so a slow model cannot build up a backlog of frames
        let (tx_frame, rx_frame) = mpsc::sync_channel::<RgbImage>(1);
        let (tx_result, rx_result) = mpsc::channel::<SegmentationMask>();

        let handle = thread::spawn(move || {
            info!("Segmentation worker started ({})", segmenter.name());
            while let Ok(mut frame) = rx_frame.recv() {
                while let Ok(newer) = rx_frame.try_recv() {
                    frame = newer;
                }
                match segmenter.segment(&frame) {
                    Ok(mask) => {
                        if tx_result.send(mask).is_err() {
                            break;
                        }
                    }
                    Err(e) => warn!("Segmentation failed: {}", e),
                }
            }
            debug!("Segmentation worker stopped");
        });

        Self {
            tx_frame: Some(tx_frame),
            rx_result: Some(rx_result),
            handle: Some(handle),
            throttle: Throttle::new(interval),
            latest: None,
        }
    }

    /// A worker that never produces a mask.
    pub fn disabled() -> Self {
        Self {
            tx_frame: None,
            rx_result: None,
            handle: None,
            throttle: Throttle::new(Duration::MAX),
            latest: None,
        }
    }

    /// Loads the configured model, or returns a disabled worker when it
    /// cannot be loaded.
    pub fn from_config(models: &ModelConfig, segmentation: &SegmentationConfig) -> Self {
        match SelfieSegmenter::from_config(models) {
            Some(segmenter) => Self::spawn(
                Box::new(segmenter),
                Duration::from_millis(segmentation.throttle_ms),
            ),
            None => Self::disabled(),
        }
    }

    pub fn is_enabled(&self) -> bool {
        self.tx_frame.is_some()
    }

    /// Hands `frame` to the worker if the throttle allows and the worker is
    /// idle. Returns whether the frame was queued.
    pub fn request(&mut self, now: Instant, frame: &RgbImage) -> bool {
        let Some(tx) = &self.tx_frame else {
            return false;
        };
        if !self.throttle.ready(now) {
            return false;
        }
        match tx.try_send(frame.clone()) {
            Ok(()) => true,
            Err(TrySendError::Full(_)) => false,
            Err(TrySendError::Disconnected(_)) => {
                warn!("Segmentation worker exited. Occlusion disabled.");
                self.tx_frame = None;
                false
            }
        }
    }

    /// Moves any finished masks into the cache. Returns true if it changed.
    pub fn poll(&mut self) -> bool {
        let Some(rx) = &self.rx_result else {
            return false;
        };
        let mut updated = false;
        while let Ok(mask) = rx.try_recv() {
            self.latest = Some(mask);
            updated = true;
        }
        updated
    }

    pub fn latest(&self) -> Option<&SegmentationMask> {
        self.latest.as_ref()
    }
}

impl Drop for MaskWorker {
    fn drop(&mut self) {
        // Closing the frame channel ends the worker loop
        self.tx_frame = None;
        if let Some(handle) = self.handle.take() {
            let _ = handle.join();
        }
    }
}
