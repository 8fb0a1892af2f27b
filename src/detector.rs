//! Face landmark detection: UltraFace finds the face box, the 468-point face
//! mesh runs on a padded crop of it.

use std::path::Path;

use image::{imageops::FilterType, RgbImage};
use ort::session::Session;
use tracing::{debug, info, warn};

use crate::config::ModelConfig;
use crate::error::Result;
use crate::inference;
use crate::types::{FrameSize, LandmarkSet, Point3D};

const DETECT_WIDTH: u32 = 320;
const DETECT_HEIGHT: u32 = 240;
const MESH_SIZE: u32 = 192;
const MESH_POINTS: usize = 468;
/// Extra context around the detected box, as a fraction of its size.
const CROP_PADDING: f32 = 0.25;

/// Anything that turns a frame into normalized face landmarks.
pub trait LandmarkDetector {
    fn name(&self) -> String;
    /// `Ok(None)` when there is no face in the frame.
    fn detect(&mut self, frame: &RgbImage) -> Result<Option<LandmarkSet>>;
}

/// Face box in frame pixels.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct FaceBox {
    pub x: f32,
    pub y: f32,
    pub width: f32,
    pub height: f32,
}

impl FaceBox {
    pub fn new(x: f32, y: f32, width: f32, height: f32) -> Self {
        Self { x, y, width, height }
    }

    /// Grows the box by `CROP_PADDING` and clips it to the frame.
    pub fn padded(&self, frame: FrameSize) -> FaceBox {
        let pad_w = self.width * CROP_PADDING;
        let pad_h = self.height * CROP_PADDING;
        let x = (self.x - pad_w / 2.0).max(0.0);
        let y = (self.y - pad_h / 2.0).max(0.0);
        let width = (self.width + pad_w).min(frame.width as f32 - x);
        let height = (self.height + pad_h).min(frame.height as f32 - y);
        FaceBox::new(x, y, width, height)
    }
}

/// UltraFace RFB-320 box detector.
pub struct FaceDetector {
    session: Session,
    anchors: Vec<(f32, f32, f32, f32)>, // cx, cy, w, h
    score_threshold: f32,
}

impl FaceDetector {
    pub fn new(model_path: &Path) -> Result<Self> {
        let session = inference::load_session(model_path, 4)?;
        let anchors = generate_anchors(DETECT_WIDTH as usize, DETECT_HEIGHT as usize);
        Ok(Self {
            session,
            anchors,
            score_threshold: 0.7,
        })
    }

    pub fn detect(&mut self, frame: &RgbImage) -> Result<Option<FaceBox>> {
        let resized = image::imageops::resize(frame, DETECT_WIDTH, DETECT_HEIGHT, FilterType::Triangle);
        let input = inference::to_nchw(&resized, 127.0, 128.0);
        let shape = [1, 3, DETECT_HEIGHT as i64, DETECT_WIDTH as i64];
        let outputs = inference::run_named(&mut self.session, &shape, input, &["scores", "boxes"])?;

        let best = decode_best(&self.anchors, &outputs[0], &outputs[1], self.score_threshold);
        Ok(best.map(|b| {
            let sx = frame.width() as f32 / DETECT_WIDTH as f32;
            let sy = frame.height() as f32 / DETECT_HEIGHT as f32;
            FaceBox::new(b.x * sx, b.y * sy, b.width * sx, b.height * sy)
        }))
    }
}

/// Highest-scoring box above `threshold`, in detector input pixels.
fn decode_best(
    anchors: &[(f32, f32, f32, f32)],
    scores: &[f32],
    boxes: &[f32],
    threshold: f32,
) -> Option<FaceBox> {
    const CENTER_VARIANCE: f32 = 0.1;
    const SIZE_VARIANCE: f32 = 0.2;

    let mut best_score = 0.0;
    let mut best = None;

    for (i, &(ax, ay, aw, ah)) in anchors.iter().enumerate() {
        let Some(&score) = scores.get(i * 2 + 1) else {
            break;
        };
        if score <= threshold || score <= best_score {
            continue;
        }
        let Some(enc) = boxes.get(i * 4..i * 4 + 4) else {
            break;
        };

        let cx = enc[0] * CENTER_VARIANCE * aw + ax;
        let cy = enc[1] * CENTER_VARIANCE * ah + ay;
        let w = (enc[2] * SIZE_VARIANCE).exp() * aw;
        let h = (enc[3] * SIZE_VARIANCE).exp() * ah;

        best_score = score;
        best = Some(FaceBox::new(
            (cx - w / 2.0) * DETECT_WIDTH as f32,
            (cy - h / 2.0) * DETECT_HEIGHT as f32,
            w * DETECT_WIDTH as f32,
            h * DETECT_HEIGHT as f32,
        ));
    }

    best
}

fn generate_anchors(width: usize, height: usize) -> Vec<(f32, f32, f32, f32)> {
    let shrinkage_list = [8usize, 16, 32, 64];
    let min_boxes: [&[f32]; 4] = [&[10.0, 16.0, 24.0], &[32.0, 48.0], &[64.0, 96.0], &[128.0, 192.0, 256.0]];

    let w = width as f32;
    let h = height as f32;
    let mut anchors = Vec::new();

    for (shrinkage, boxes) in shrinkage_list.iter().zip(min_boxes) {
        let s = *shrinkage as f32;
        let feature_h = (h / s).ceil() as usize;
        let feature_w = (w / s).ceil() as usize;

        for v in 0..feature_h {
            for u in 0..feature_w {
                let cx = (u as f32 * s + s / 2.0) / w;
                let cy = (v as f32 * s + s / 2.0) / h;
                for &min_box in boxes {
                    anchors.push((cx, cy, min_box / w, min_box / h));
                }
            }
        }
    }
    anchors
}

/// Maps raw mesh output (x, y, z per point in mesh-input pixels) through
/// `crop` into normalized frame coordinates.
pub fn mesh_to_landmarks(raw: &[f32], crop: FaceBox, frame: FrameSize) -> Option<LandmarkSet> {
    if raw.len() < MESH_POINTS * 3 || frame.width == 0 || frame.height == 0 {
        return None;
    }
    let scale_x = crop.width / MESH_SIZE as f32;
    let scale_y = crop.height / MESH_SIZE as f32;
    let fw = frame.width as f32;
    let fh = frame.height as f32;

    let points = raw
        .chunks_exact(3)
        .take(MESH_POINTS)
        .map(|p| {
            Point3D::new(
                (crop.x + p[0] * scale_x) / fw,
                (crop.y + p[1] * scale_y) / fh,
                p[2] / MESH_SIZE as f32,
            )
        })
        .collect();
    Some(LandmarkSet::new(points))
}

/// The production detector. Either model may be missing, in which case every
/// frame reports no face.
pub struct FaceMeshDetector {
    detector: Option<FaceDetector>,
    mesh: Option<Session>,
}

impl FaceMeshDetector {
    pub fn from_config(models: &ModelConfig) -> Self {
        let detector = load_optional("face detection", Path::new(&models.face_detection_path), FaceDetector::new);
        let mesh = load_optional("face mesh", Path::new(&models.face_mesh_path), |p| {
            inference::load_session(p, 4)
        });
        Self { detector, mesh }
    }

    pub fn is_ready(&self) -> bool {
        self.detector.is_some() && self.mesh.is_some()
    }
}

fn load_optional<T>(what: &str, path: &Path, load: impl FnOnce(&Path) -> Result<T>) -> Option<T> {
    if !path.exists() {
        warn!("{} model not found at {}. No faces will be tracked.", what, path.display());
        return None;
    }
    match load(path) {
        Ok(model) => {
            info!("Loaded {} model from {}", what, path.display());
            Some(model)
        }
        Err(e) => {
            warn!("Failed to load {} model: {}", what, e);
            None
        }
    }
}

impl LandmarkDetector for FaceMeshDetector {
    fn name(&self) -> String {
        "Face Mesh (468 pts)".to_string()
    }

    fn detect(&mut self, frame: &RgbImage) -> Result<Option<LandmarkSet>> {
        let (Some(detector), Some(mesh)) = (self.detector.as_mut(), self.mesh.as_mut()) else {
            return Ok(None);
        };
        let size = FrameSize::new(frame.width(), frame.height());

        let Some(face) = detector.detect(frame)? else {
            debug!("No face box");
            return Ok(None);
        };
        let crop = face.padded(size);
        if crop.width < 1.0 || crop.height < 1.0 {
            return Ok(None);
        }

        let cropped = image::imageops::crop_imm(frame, crop.x as u32, crop.y as u32, crop.width as u32, crop.height as u32)
            .to_image();
        let resized = image::imageops::resize(&cropped, MESH_SIZE, MESH_SIZE, FilterType::Triangle);
        let input = inference::to_nhwc(&resized, 127.5, 127.5);
        let shape = [1, MESH_SIZE as i64, MESH_SIZE as i64, 3];
        let raw = inference::run_first(mesh, &shape, input)?;

        Ok(mesh_to_landmarks(&raw, crop, size))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_anchor_count() {
        assert_eq!(generate_anchors(320, 240).len(), 4420);
    }

    #[test]
    fn test_decode_picks_best_above_threshold() {
        let anchors = vec![(0.5, 0.5, 0.1, 0.1), (0.25, 0.25, 0.2, 0.2)];
        let scores = vec![0.4, 0.6, 0.1, 0.9];
        let boxes = vec![0.0; 8];
        let best = decode_best(&anchors, &scores, &boxes, 0.7).unwrap();
        assert!((best.x - 48.0).abs() < 1e-3);
        assert!((best.y - 36.0).abs() < 1e-3);
        assert!((best.width - 64.0).abs() < 1e-3);
        assert!((best.height - 48.0).abs() < 1e-3);

        assert!(decode_best(&anchors, &[0.5, 0.5, 0.5, 0.5], &boxes, 0.7).is_none());
    }

    #[test]
    fn test_padding_clips_to_frame() {
        let frame = FrameSize::new(100, 100);
        let padded = FaceBox::new(0.0, 80.0, 40.0, 40.0).padded(frame);
        assert_eq!(padded.x, 0.0);
        assert_eq!(padded.y, 75.0);
        assert_eq!(padded.width, 50.0);
        assert_eq!(padded.height, 25.0);
    }

    #[test]
    fn test_mesh_output_is_normalized() {
        let mut raw = vec![0.0f32; MESH_POINTS * 3];
        raw[0] = 96.0;
        raw[1] = 192.0;
        let crop = FaceBox::new(100.0, 50.0, 200.0, 100.0);
        let set = mesh_to_landmarks(&raw, crop, FrameSize::new(400, 200)).unwrap();
        assert_eq!(set.len(), MESH_POINTS);
        let p = set.get(0).unwrap();
        assert!((p.x - 0.5).abs() < 1e-6);
        assert!((p.y - 0.75).abs() < 1e-6);
        let q = set.get(1).unwrap();
        assert!((q.x - 0.25).abs() < 1e-6);
    }

    #[test]
    fn test_short_mesh_output_is_no_face() {
        let crop = FaceBox::new(0.0, 0.0, 10.0, 10.0);
        assert!(mesh_to_landmarks(&[0.0; 30], crop, FrameSize::new(10, 10)).is_none());
    }

    #[test]
    fn test_missing_models_report_no_face() {
        let models = ModelConfig {
            face_detection_path: "missing/det.onnx".to_string(),
            face_mesh_path: "missing/mesh.onnx".to_string(),
            ..ModelConfig::default()
        };
        let mut detector = FaceMeshDetector::from_config(&models);
        assert!(!detector.is_ready());
        assert!(detector.detect(&RgbImage::new(8, 8)).unwrap().is_none());
    }
}
