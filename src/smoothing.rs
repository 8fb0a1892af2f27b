//! Temporal smoothing of face landmarks and the anchors jewelry hangs from.
//!
//! All decay constants are per frame, not per unit of wall time, so the
//! visual lag depends on the frame rate. Keep them that way: the placement
//! heuristics were tuned against this behaviour.

use std::collections::VecDeque;
use std::f32::consts::{PI, TAU};

use tracing::{debug, info, warn};

use crate::config::TuningParameters;
use crate::face_shape::{FaceShape, FaceSize};
use crate::layout::LandmarkLayout;
use crate::types::{FrameSize, LandmarkSet, Point2D};

/// Weight of the previous smoothed landmark position.
pub const LANDMARK_DECAY: f32 = 0.72;
/// Weight of the previous smoothed head angle.
pub const ANGLE_DECAY: f32 = 0.82;
/// Number of post-blend angles kept for the median filter.
pub const ANGLE_WINDOW: usize = 5;

/// Wraps an angle into (-PI, PI].
pub fn wrap_angle(angle: f32) -> f32 {
    let mut a = angle % TAU;
    if a > PI {
        a -= TAU;
    } else if a <= -PI {
        a += TAU;
    }
    a
}

/// Sliding median over the last few angle samples.
#[derive(Debug, Clone, Default)]
pub struct AngleWindow {
    samples: VecDeque<f32>,
}

impl AngleWindow {
    pub fn new() -> Self {
        Self {
            samples: VecDeque::with_capacity(ANGLE_WINDOW + 1),
        }
    }

    /// Records `angle` and returns the filtered value: the window median
    /// once more than two samples are held, `angle` itself before that.
    pub fn push(&mut self, angle: f32) -> f32 {
        self.samples.push_back(angle);
        if self.samples.len() > ANGLE_WINDOW {
            self.samples.pop_front();
        }
        if self.samples.len() > 2 {
            self.median()
        } else {
            angle
        }
    }

    fn median(&self) -> f32 {
        let mut sorted: Vec<f32> = self.samples.iter().copied().collect();
        sorted.sort_by(|a, b| a.total_cmp(b));
        sorted[sorted.len() / 2]
    }

    pub fn len(&self) -> usize {
        self.samples.len()
    }

    pub fn is_empty(&self) -> bool {
        self.samples.is_empty()
    }

    pub fn clear(&mut self) {
        self.samples.clear();
    }
}

/// Smoothed placement anchors, in frame pixels.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct AnchorState {
    pub left_ear: Point2D,
    pub right_ear: Point2D,
    pub neck_point: Point2D,
    /// Head tilt in radians, always in (-PI, PI].
    pub angle: f32,
    pub ear_distance: f32,
    pub face_shape: FaceShape,
    pub face_size: FaceSize,
}

impl AnchorState {
    /// Unfiltered anchors read straight off a landmark set.
    pub fn measure(landmarks: &LandmarkSet, layout: &LandmarkLayout, frame: FrameSize) -> Option<Self> {
        let left_ear = landmarks.to_pixel(layout.left_ear, frame)?;
        let right_ear = landmarks.to_pixel(layout.right_ear, frame)?;
        let neck_point = landmarks.to_pixel(layout.neck, frame)?;
        let face_size = FaceSize::measure(landmarks, frame);

        Some(Self {
            left_ear,
            right_ear,
            neck_point,
            angle: head_angle(left_ear, right_ear),
            ear_distance: left_ear.distance(&right_ear),
            face_shape: FaceShape::classify(face_size),
            face_size,
        })
    }
}

/// Tilt of the line from the left ear to the right ear.
pub fn head_angle(left_ear: Point2D, right_ear: Point2D) -> f32 {
    (right_ear.y - left_ear.y).atan2(right_ear.x - left_ear.x)
}

/// Result of a frame in which a face was tracked.
#[derive(Debug, Clone, Copy)]
pub struct TrackedFace<'a> {
    pub landmarks: &'a LandmarkSet,
    pub anchors: &'a AnchorState,
}

/// Owns every piece of temporal state. One engine per video stream.
#[derive(Debug, Clone)]
pub struct SmoothingEngine {
    layout: LandmarkLayout,
    landmarks: Option<LandmarkSet>,
    anchors: Option<AnchorState>,
    angle_window: AngleWindow,
    // set while the detector keeps producing unusable sets
    rejecting: bool,
}

impl SmoothingEngine {
    pub fn new(layout: LandmarkLayout) -> Self {
        Self {
            layout,
            landmarks: None,
            anchors: None,
            angle_window: AngleWindow::new(),
            rejecting: false,
        }
    }

    pub fn layout(&self) -> &LandmarkLayout {
        &self.layout
    }

    /// Advances one frame. `raw` is `None` when the detector found no face;
    /// the smoothed landmarks are dropped but the anchors are kept.
    pub fn update(
        &mut self,
        raw: Option<&LandmarkSet>,
        frame: FrameSize,
        params: &TuningParameters,
    ) -> Option<TrackedFace<'_>> {
        let Some(raw) = raw else {
            self.landmarks = None;
            return None;
        };
        if let Err(e) = self.layout.check(raw) {
            if !self.rejecting {
                warn!("Ignoring landmark sets until they fit the layout: {}", e);
            } else {
                debug!("Ignoring landmark set: {}", e);
            }
            self.rejecting = true;
            self.landmarks = None;
            return None;
        }
        if self.rejecting {
            info!("Landmark sets fit the layout again");
            self.rejecting = false;
        }

        let warm_start = match self.landmarks.as_mut() {
            Some(smoothed) if smoothed.len() == raw.len() => {
                blend_landmarks(smoothed, raw);
                false
            }
            _ => true,
        };
        if warm_start {
            self.landmarks = Some(raw.clone());
        }

        let landmarks = self.landmarks.as_ref()?;
        let measured = AnchorState::measure(landmarks, &self.layout, frame)?;

        let anchors = match (warm_start, self.anchors) {
            (false, Some(previous)) => {
                let mut next = smooth_anchors(&previous, &measured, params);
                next.angle = self.angle_window.push(next.angle);
                next
            }
            _ => {
                debug!("Warm start from raw landmarks");
                self.angle_window.clear();
                let mut next = measured;
                next.angle = self.angle_window.push(measured.angle);
                next
            }
        };
        self.anchors = Some(anchors);

        self.tracked()
    }

    /// Current face, if the last frame had one.
    pub fn tracked(&self) -> Option<TrackedFace<'_>> {
        match (&self.landmarks, &self.anchors) {
            (Some(landmarks), Some(anchors)) => Some(TrackedFace { landmarks, anchors }),
            _ => None,
        }
    }

    /// Last known anchors, including across frames with no face.
    pub fn anchors(&self) -> Option<&AnchorState> {
        self.anchors.as_ref()
    }

    pub fn landmarks(&self) -> Option<&LandmarkSet> {
        self.landmarks.as_ref()
    }

    pub fn reset(&mut self) {
        self.landmarks = None;
        self.anchors = None;
        self.angle_window.clear();
        self.rejecting = false;
    }
}

fn blend_landmarks(smoothed: &mut LandmarkSet, raw: &LandmarkSet) {
    let fresh = 1.0 - LANDMARK_DECAY;
    for (s, r) in smoothed.points_mut().iter_mut().zip(raw.points()) {
        s.x = s.x * LANDMARK_DECAY + r.x * fresh;
        s.y = s.y * LANDMARK_DECAY + r.y * fresh;
        s.z = s.z * LANDMARK_DECAY + r.z * fresh;
    }
}

fn smooth_anchors(previous: &AnchorState, measured: &AnchorState, params: &TuningParameters) -> AnchorState {
    let pos = params.position_smoothing;
    let dist = params.ear_distance_smoothing;

    // angle follows the per-frame ears, not the smoothed anchors
    let diff = wrap_angle(measured.angle - previous.angle);
    let angle = wrap_angle(previous.angle + diff * (1.0 - ANGLE_DECAY));

    AnchorState {
        left_ear: measured.left_ear.lerp_toward(previous.left_ear, pos),
        right_ear: measured.right_ear.lerp_toward(previous.right_ear, pos),
        neck_point: measured.neck_point.lerp_toward(previous.neck_point, pos),
        angle,
        ear_distance: previous.ear_distance * dist + measured.ear_distance * (1.0 - dist),
        face_shape: measured.face_shape,
        face_size: measured.face_size,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::Point3D;

    const FRAME: FrameSize = FrameSize::new(1000, 1000);

    /// 468-point set with ears and neck at the given normalized positions.
    fn face(left: (f32, f32), right: (f32, f32), neck: (f32, f32)) -> LandmarkSet {
        let mut points = vec![Point3D::new(0.5, 0.5, 0.0); 468];
        points[0] = Point3D::new(0.3, 0.2, 0.0);
        points[1] = Point3D::new(0.7, 0.9, 0.0);
        points[crate::layout::LEFT_EAR] = Point3D::new(left.0, left.1, 0.0);
        points[crate::layout::RIGHT_EAR] = Point3D::new(right.0, right.1, 0.0);
        points[crate::layout::NECK] = Point3D::new(neck.0, neck.1, 0.1);
        LandmarkSet::new(points)
    }

    fn engine() -> SmoothingEngine {
        SmoothingEngine::new(LandmarkLayout::default())
    }

    #[test]
    fn test_wrap_angle_range() {
        assert!((wrap_angle(3.0 * PI / 2.0) + PI / 2.0).abs() < 1e-5);
        assert!((wrap_angle(-3.0 * PI / 2.0) - PI / 2.0).abs() < 1e-5);
        assert_eq!(wrap_angle(-PI), PI);
        assert_eq!(wrap_angle(0.5), 0.5);
    }

    #[test]
    fn test_median_suppresses_spike() {
        let mut window = AngleWindow::new();
        let outputs: Vec<f32> = [0.1, 0.1, 0.1, 3.0, 0.1]
            .iter()
            .map(|&a| window.push(a))
            .collect();
        assert_eq!(window.len(), ANGLE_WINDOW);
        assert_eq!(outputs[3], 0.1);
        assert_eq!(outputs[4], 0.1);
    }

    #[test]
    fn test_median_needs_three_samples() {
        let mut window = AngleWindow::new();
        assert_eq!(window.push(1.0), 1.0);
        assert_eq!(window.push(0.0), 0.0);
        // three samples: median of [0, 1, 2]
        assert_eq!(window.push(2.0), 1.0);
    }

    #[test]
    fn test_window_drops_oldest() {
        let mut window = AngleWindow::new();
        for a in [9.0, 9.0, 0.0, 0.0, 0.0, 0.0] {
            window.push(a);
        }
        assert_eq!(window.len(), ANGLE_WINDOW);
        assert_eq!(window.push(0.0), 0.0);
    }

    #[test]
    fn test_first_detection_uses_raw_values() {
        let mut engine = engine();
        let raw = face((0.3, 0.5), (0.7, 0.5), (0.5, 0.8));
        let tracked = engine.update(Some(&raw), FRAME, &TuningParameters::default()).unwrap();

        assert_eq!(tracked.landmarks, &raw);
        let a = tracked.anchors;
        assert_eq!(a.left_ear, Point2D::new(300.0, 500.0));
        assert_eq!(a.right_ear, Point2D::new(700.0, 500.0));
        assert_eq!(a.neck_point, Point2D::new(500.0, 800.0));
        assert!((a.ear_distance - 400.0).abs() < 1e-3);
        assert_eq!(a.angle, 0.0);
    }

    #[test]
    fn test_landmark_blend_constants() {
        let mut engine = engine();
        let params = TuningParameters::default();
        let first = face((0.3, 0.5), (0.7, 0.5), (0.5, 0.8));
        let second = face((0.4, 0.5), (0.7, 0.5), (0.5, 0.8));
        engine.update(Some(&first), FRAME, &params);
        let tracked = engine.update(Some(&second), FRAME, &params).unwrap();

        let x = tracked.landmarks.get(crate::layout::LEFT_EAR).unwrap().x;
        assert!((x - (0.3 * 0.72 + 0.4 * 0.28)).abs() < 1e-6);
    }

    #[test]
    fn test_anchor_and_distance_smoothing_weights() {
        let mut engine = engine();
        let params = TuningParameters {
            position_smoothing: 0.5,
            ear_distance_smoothing: 0.25,
            ..TuningParameters::default()
        };
        engine.update(Some(&face((0.3, 0.5), (0.7, 0.5), (0.5, 0.8))), FRAME, &params);
        let tracked = engine
            .update(Some(&face((0.3, 0.5), (0.8, 0.5), (0.5, 0.8))), FRAME, &params)
            .unwrap();

        // landmark layer: 700 * 0.72 + 800 * 0.28 = 728
        let measured_right = 728.0;
        let right = tracked.anchors.right_ear.x;
        assert!((right - (700.0 * 0.5 + measured_right * 0.5)).abs() < 1e-2);

        let measured_dist = measured_right - 300.0;
        let dist = tracked.anchors.ear_distance;
        assert!((dist - (400.0 * 0.25 + measured_dist * 0.75)).abs() < 1e-2);
    }

    #[test]
    fn test_angle_blend_uses_fixed_decay() {
        let mut engine = engine();
        // position smoothing must not affect the angle
        let params = TuningParameters {
            position_smoothing: 0.0,
            ..TuningParameters::default()
        };
        engine.update(Some(&face((0.3, 0.5), (0.7, 0.5), (0.5, 0.8))), FRAME, &params);
        let raw = face((0.3, 0.5), (0.7, 0.9), (0.5, 0.8));
        let tracked = engine.update(Some(&raw), FRAME, &params).unwrap();

        let smoothed_right_y = 500.0 * 0.72 + 900.0 * 0.28;
        let raw_angle = (smoothed_right_y - 500.0_f32).atan2(400.0);
        // two samples in the window, no median yet
        assert!((tracked.anchors.angle - raw_angle * 0.18).abs() < 1e-5);
    }

    #[test]
    fn test_angle_unwraps_across_pi() {
        let mut engine = engine();
        let params = TuningParameters::default();
        // ears swapped horizontally: angle close to +PI
        engine.update(Some(&face((0.7, 0.5), (0.3, 0.51), (0.5, 0.8))), FRAME, &params);
        let start = engine.anchors().unwrap().angle;
        assert!(start > 3.0);

        // tip slightly the other way: raw angle close to -PI
        for _ in 0..10 {
            let tracked = engine
                .update(Some(&face((0.7, 0.5), (0.3, 0.48), (0.5, 0.8))), FRAME, &params)
                .unwrap();
            let angle = tracked.anchors.angle;
            assert!(angle > -PI && angle <= PI);
            // never swings through zero
            assert!(angle.abs() > 3.0);
        }
    }

    #[test]
    fn test_no_face_keeps_anchors_and_drops_landmarks() {
        let mut engine = engine();
        let params = TuningParameters::default();
        engine.update(Some(&face((0.3, 0.5), (0.7, 0.5), (0.5, 0.8))), FRAME, &params);
        let before = *engine.anchors().unwrap();

        assert!(engine.update(None, FRAME, &params).is_none());
        assert!(engine.landmarks().is_none());
        assert!(engine.tracked().is_none());
        assert_eq!(engine.anchors(), Some(&before));
    }

    #[test]
    fn test_warm_start_after_gap() {
        let mut engine = engine();
        let params = TuningParameters::default();
        for _ in 0..6 {
            engine.update(Some(&face((0.3, 0.5), (0.7, 0.5), (0.5, 0.8))), FRAME, &params);
        }
        engine.update(None, FRAME, &params);

        let raw = face((0.1, 0.3), (0.4, 0.4), (0.2, 0.6));
        let tracked = engine.update(Some(&raw), FRAME, &params).unwrap();
        let expected = AnchorState::measure(&raw, &LandmarkLayout::default(), FRAME).unwrap();
        assert_eq!(*tracked.anchors, expected);
    }

    #[test]
    fn test_short_landmark_set_is_no_face() {
        let mut engine = engine();
        let short = LandmarkSet::new(vec![Point3D::default(); 10]);
        assert!(engine.update(Some(&short), FRAME, &TuningParameters::default()).is_none());
        assert!(engine.anchors().is_none());
    }

    #[test]
    fn test_rejection_is_reported_once_per_run() {
        let mut engine = engine();
        let params = TuningParameters::default();
        let short = LandmarkSet::new(vec![Point3D::default(); 10]);

        engine.update(Some(&short), FRAME, &params);
        assert!(engine.rejecting);
        engine.update(Some(&short), FRAME, &params);
        assert!(engine.rejecting);

        let raw = face((0.1, 0.3), (0.4, 0.4), (0.2, 0.6));
        assert!(engine.update(Some(&raw), FRAME, &params).is_some());
        assert!(!engine.rejecting);
    }
}
