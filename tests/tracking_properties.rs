use proptest::prelude::*;
use rusty_jewels::catalog::{JewelryAsset, JewelryKind, JewelrySlots};
use rusty_jewels::layout::{LandmarkLayout, LEFT_EAR, NECK, RIGHT_EAR};
use rusty_jewels::placement::compute_transforms;
use rusty_jewels::smoothing::AnchorState;
use rusty_jewels::{FrameSize, LandmarkSet, Point3D, SmoothingEngine, TuningParameters};
use std::f32::consts::PI;

const FRAME: FrameSize = FrameSize::new(640, 480);

fn face(left: (f32, f32), right: (f32, f32)) -> LandmarkSet {
    let mut points = vec![Point3D::new(0.5, 0.5, 0.0); 468];
    points[LEFT_EAR] = Point3D::new(left.0, left.1, 0.0);
    points[RIGHT_EAR] = Point3D::new(right.0, right.1, 0.0);
    points[NECK] = Point3D::new(0.5, 0.8, 0.0);
    LandmarkSet::new(points)
}

fn ear() -> impl Strategy<Value = (f32, f32)> {
    (0.0f32..1.0, 0.0f32..1.0)
}

/// A frame either has a face (two ear positions) or not.
fn frames() -> impl Strategy<Value = Vec<Option<((f32, f32), (f32, f32))>>> {
    prop::collection::vec(prop::option::weighted(0.85, (ear(), ear())), 1..40)
}

#[test]
fn angle_stays_in_range() {
    proptest!(|(seq in frames())| {
        let mut engine = SmoothingEngine::new(LandmarkLayout::default());
        let params = TuningParameters::default();
        for item in seq {
            let raw = item.map(|(l, r)| face(l, r));
            engine.update(raw.as_ref(), FRAME, &params);
            if let Some(a) = engine.anchors() {
                prop_assert!(a.angle > -PI && a.angle <= PI, "angle {}", a.angle);
                prop_assert!(a.ear_distance >= 0.0);
            }
        }
    });
}

#[test]
fn warm_start_after_gap_reports_raw_values() {
    proptest!(|(history in prop::collection::vec((ear(), ear()), 1..10), next in (ear(), ear()))| {
        let mut engine = SmoothingEngine::new(LandmarkLayout::default());
        let params = TuningParameters::default();
        for (l, r) in history {
            engine.update(Some(&face(l, r)), FRAME, &params);
        }
        engine.update(None, FRAME, &params);

        let raw = face(next.0, next.1);
        let tracked = engine.update(Some(&raw), FRAME, &params).unwrap();
        let expected = AnchorState::measure(&raw, &LandmarkLayout::default(), FRAME).unwrap();
        prop_assert_eq!(*tracked.anchors, expected);
        prop_assert_eq!(tracked.landmarks, &raw);
    });
}

#[test]
fn placement_is_pure() {
    let mut slots = JewelrySlots::default();
    let sprite = image::RgbaImage::new(30, 60);
    slots.set(JewelryKind::Earrings, Some(JewelryAsset::from_image("e", sprite.clone()).unwrap()));
    slots.set(JewelryKind::Necklace, Some(JewelryAsset::from_image("n", sprite).unwrap()));

    proptest!(|(l in ear(), r in ear())| {
        let anchors = AnchorState::measure(&face(l, r), &LandmarkLayout::default(), FRAME).unwrap();
        let params = TuningParameters::default();
        let a = compute_transforms(&anchors, anchors.face_size, anchors.face_shape, &params, &slots);
        let b = compute_transforms(&anchors, anchors.face_size, anchors.face_shape, &params, &slots);
        prop_assert_eq!(a.len(), 3);
        for (x, y) in a.iter().zip(b.iter()) {
            prop_assert_eq!(x.center, y.center);
            prop_assert_eq!(x.rotation, y.rotation);
            prop_assert_eq!(x.width, y.width);
            prop_assert_eq!(x.height, y.height);
        }
        // earrings mirror each other's tilt
        prop_assert_eq!(a[0].rotation, -a[1].rotation);
    });
}
