//! The per-frame try-on pipeline: smoothing, placement, rendering, occlusion
//! and branding, in that order.

use image::RgbImage;
use tracing::debug;

use crate::branding::Watermark;
use crate::catalog::{JewelryAsset, JewelryKind, JewelrySlots};
use crate::config::{AppConfig, TuningParameters};
use crate::face_shape::FaceShape;
use crate::layout::LandmarkLayout;
use crate::occlusion::{self, OcclusionOutcome, SkipReason};
use crate::placement::compute_transforms;
use crate::render::{draw_anchor_markers, draw_placement};
use crate::segmentation::SegmentationMask;
use crate::smoothing::{SmoothingEngine, TrackedFace};
use crate::types::{FrameSize, LandmarkSet};

/// What happened to one frame.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct FrameReport {
    pub face_tracked: bool,
    pub face_shape: FaceShape,
    pub occlusion: OcclusionOutcome,
    pub items_drawn: usize,
}

pub struct TryOnSession {
    engine: SmoothingEngine,
    slots: JewelrySlots,
    tuning: TuningParameters,
    watermark: Watermark,
    show_debug: bool,
}

impl TryOnSession {
    pub fn new(layout: LandmarkLayout, tuning: TuningParameters, watermark: Watermark) -> Self {
        Self {
            engine: SmoothingEngine::new(layout),
            slots: JewelrySlots::default(),
            tuning,
            watermark,
            show_debug: false,
        }
    }

    pub fn from_config(config: &AppConfig) -> Self {
        let mut session = Self::new(
            config.layout.clone(),
            config.tuning.resolve(),
            Watermark::from_config(&config.branding),
        );
        session.show_debug = config.ui.show_debug;
        session
    }

    pub fn tuning(&self) -> &TuningParameters {
        &self.tuning
    }

    /// Takes effect from the next frame.
    pub fn set_tuning(&mut self, tuning: TuningParameters) {
        self.tuning = tuning.validated();
    }

    pub fn slots(&self) -> &JewelrySlots {
        &self.slots
    }

    pub fn wear(&mut self, kind: JewelryKind, asset: Option<JewelryAsset>) {
        self.slots.set(kind, asset);
    }

    pub fn clear_slots(&mut self) {
        self.slots.clear();
    }

    pub fn show_debug(&self) -> bool {
        self.show_debug
    }

    pub fn set_show_debug(&mut self, show: bool) {
        self.show_debug = show;
    }

    pub fn engine(&self) -> &SmoothingEngine {
        &self.engine
    }

    pub fn is_tracking(&self) -> bool {
        self.engine.tracked().is_some()
    }

    /// Forgets all temporal state, e.g. when the camera changes.
    pub fn reset(&mut self) {
        self.engine.reset();
    }

    /// Advances the smoothing state with this frame's detection and returns
    /// the composited frame.
    pub fn process_frame(
        &mut self,
        frame: &RgbImage,
        raw: Option<&LandmarkSet>,
        mask: Option<&SegmentationMask>,
    ) -> (RgbImage, FrameReport) {
        let size = FrameSize::new(frame.width(), frame.height());
        self.engine.update(raw, size, &self.tuning);

        let (output, report) = compose(
            frame,
            self.engine.tracked(),
            &self.engine.layout().head_region,
            mask,
            &self.slots,
            &self.tuning,
            &self.watermark,
            self.show_debug,
        );
        debug!(
            "Frame: face={} shape={} items={} occlusion={:?}",
            report.face_tracked,
            report.face_shape.label(),
            report.items_drawn,
            report.occlusion
        );
        (output, report)
    }

    /// Renders `frame` against the current smoothed state without advancing
    /// it. `None` when no face is being tracked.
    pub fn snapshot(&self, frame: &RgbImage, mask: Option<&SegmentationMask>) -> Option<RgbImage> {
        let tracked = self.engine.tracked()?;
        let (output, _) = compose(
            frame,
            Some(tracked),
            &self.engine.layout().head_region,
            mask,
            &self.slots,
            &self.tuning,
            &self.watermark,
            false,
        );
        Some(output)
    }
}

#[allow(clippy::too_many_arguments)]
fn compose(
    frame: &RgbImage,
    tracked: Option<TrackedFace<'_>>,
    head_region: &[usize],
    mask: Option<&SegmentationMask>,
    slots: &JewelrySlots,
    tuning: &TuningParameters,
    watermark: &Watermark,
    show_debug: bool,
) -> (RgbImage, FrameReport) {
    let mut output = frame.clone();

    let Some(face) = tracked else {
        watermark.apply(&mut output);
        return (
            output,
            FrameReport {
                face_tracked: false,
                face_shape: FaceShape::Unknown,
                occlusion: OcclusionOutcome::Skipped(SkipReason::NoFace),
                items_drawn: 0,
            },
        );
    };
    let anchors = face.anchors;

    let placements = compute_transforms(anchors, anchors.face_size, anchors.face_shape, tuning, slots);
    for placement in &placements {
        draw_placement(&mut output, placement);
    }

    // restore from the untouched camera frame
    let occlusion = occlusion::occlude(&mut output, frame, face.landmarks, head_region, mask);

    watermark.apply(&mut output);
    if show_debug {
        draw_anchor_markers(&mut output, anchors);
    }

    (
        output,
        FrameReport {
            face_tracked: true,
            face_shape: anchors.face_shape,
            occlusion,
            items_drawn: placements.len(),
        },
    )
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::TuningKnob;
    use crate::layout::{LEFT_EAR, NECK, RIGHT_EAR};
    use crate::types::Point3D;
    use image::{Rgb, Rgba, RgbaImage};

    const SIZE: u32 = 200;

    fn face() -> LandmarkSet {
        let mut points = vec![Point3D::new(0.5, 0.5, 0.0); 468];
        points[0] = Point3D::new(0.3, 0.2, 0.0);
        points[1] = Point3D::new(0.7, 0.9, 0.0);
        points[10] = Point3D::new(0.45, 0.3, 0.0);
        points[4] = Point3D::new(0.55, 0.5, 0.0);
        points[LEFT_EAR] = Point3D::new(0.35, 0.5, 0.0);
        points[RIGHT_EAR] = Point3D::new(0.65, 0.5, 0.0);
        points[NECK] = Point3D::new(0.5, 0.75, 0.0);
        LandmarkSet::new(points)
    }

    fn session_with_earrings() -> TryOnSession {
        let mut session = TryOnSession::new(LandmarkLayout::default(), TuningParameters::default(), Watermark::none());
        let sprite = RgbaImage::from_pixel(10, 20, Rgba([255, 0, 0, 255]));
        session.wear(JewelryKind::Earrings, Some(JewelryAsset::from_image("ring", sprite).unwrap()));
        session
    }

    fn camera() -> RgbImage {
        RgbImage::from_pixel(SIZE, SIZE, Rgb([40, 40, 40]))
    }

    #[test]
    fn test_no_face_passes_frame_through() {
        let mut session = session_with_earrings();
        let frame = camera();
        let (out, report) = session.process_frame(&frame, None, None);
        assert_eq!(out, frame);
        assert!(!report.face_tracked);
        assert_eq!(report.items_drawn, 0);
        assert_eq!(report.occlusion, OcclusionOutcome::Skipped(SkipReason::NoFace));
    }

    #[test]
    fn test_earrings_drawn_below_ears() {
        let mut session = session_with_earrings();
        let frame = camera();
        let (out, report) = session.process_frame(&frame, Some(&face()), None);

        assert!(report.face_tracked);
        assert_eq!(report.face_shape, FaceShape::Long);
        assert_eq!(report.items_drawn, 2);
        assert_eq!(report.occlusion, OcclusionOutcome::Skipped(SkipReason::NoMask));
        // left earring centred near (67, 106), right near (133, 106)
        assert_eq!(*out.get_pixel(67, 106), Rgb([255, 0, 0]));
        assert_eq!(*out.get_pixel(133, 106), Rgb([255, 0, 0]));
        assert_eq!(*out.get_pixel(100, 20), Rgb([40, 40, 40]));
    }

    #[test]
    fn test_full_mask_restores_head_region() {
        let mut session = session_with_earrings();
        let mask = SegmentationMask::new(100, 100, vec![1; 10_000]).unwrap();
        let (_, report) = session.process_frame(&camera(), Some(&face()), Some(&mask));

        let expected = crate::types::PixelRect { left: 86, top: 44, right: 114, bottom: 116 };
        assert_eq!(
            report.occlusion,
            OcclusionOutcome::Applied { region: expected, restored: 28 * 72 }
        );
    }

    #[test]
    fn test_snapshot_needs_face_and_keeps_state() {
        let mut session = session_with_earrings();
        assert!(session.snapshot(&camera(), None).is_none());

        session.process_frame(&camera(), Some(&face()), None);
        let (live, _) = session.process_frame(&camera(), Some(&face()), None);
        let after = *session.engine().anchors().unwrap();

        let shot = session.snapshot(&camera(), None).unwrap();
        assert_eq!(shot, live);
        assert_eq!(*session.engine().anchors().unwrap(), after);
    }

    #[test]
    fn test_debug_markers_toggle() {
        let mut session = session_with_earrings();
        session.clear_slots();
        session.set_show_debug(true);
        let (out, _) = session.process_frame(&camera(), Some(&face()), None);
        // neck anchor at (100, 150)
        assert_eq!(*out.get_pixel(100, 150), Rgb([255, 255, 0]));
    }

    #[test]
    fn test_set_tuning_is_validated() {
        let mut session = session_with_earrings();
        session.set_tuning(TuningParameters {
            position_smoothing: 2.0,
            ..TuningParameters::default()
        });
        assert_eq!(*session.tuning(), TuningParameters::default());
    }

    #[test]
    fn test_live_tuning_applies_next_frame() {
        let mut session = session_with_earrings();
        let frame = camera();
        session.process_frame(&frame, Some(&face()), None);
        // sprite edge is just outside the default earring
        assert_eq!(*session.process_frame(&frame, Some(&face()), None).0.get_pixel(67, 90), Rgb([40, 40, 40]));

        let bigger = session.tuning().nudged(TuningKnob::EarSize, 10);
        session.set_tuning(bigger);
        assert_eq!(*session.tuning(), bigger);
        let (out, _) = session.process_frame(&frame, Some(&face()), None);
        assert_eq!(*out.get_pixel(67, 90), Rgb([255, 0, 0]));
    }
}
