//! Screen-space transforms for each worn item. Stateless: recompute every frame.

use crate::catalog::{JewelryAsset, JewelryKind, JewelrySlots};
use crate::config::TuningParameters;
use crate::face_shape::{FaceShape, FaceSize};
use crate::smoothing::AnchorState;
use crate::types::Point2D;

/// Earrings hang this fraction of their own height below the ear anchor.
pub const EARRING_DROP: f32 = 0.18;
/// Earrings counter-rotate by this fraction of the head tilt.
pub const EARRING_TILT_DAMPING: f32 = 0.08;

/// Shape-dependent nudges for earrings.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ShapeAdjustment {
    /// Fraction of face width pushed outward from each ear.
    pub horizontal: f32,
    /// Fraction of face height pushed downward.
    pub vertical: f32,
    pub size_multiplier: f32,
}

impl ShapeAdjustment {
    pub fn for_shape(shape: FaceShape) -> Self {
        match shape {
            FaceShape::Round => Self {
                horizontal: 0.06,
                vertical: 0.02,
                size_multiplier: 1.10,
            },
            FaceShape::Oval => Self {
                horizontal: 0.045,
                vertical: 0.015,
                size_multiplier: 1.00,
            },
            // unclassified faces get the narrow-face row
            FaceShape::Long | FaceShape::Unknown => Self {
                horizontal: 0.04,
                vertical: 0.005,
                size_multiplier: 0.95,
            },
        }
    }

    /// Whole-pixel (outward, downward) offsets for a face of `size`.
    pub fn offsets(&self, size: FaceSize) -> (f32, f32) {
        ((size.width * self.horizontal).round(), (size.height * self.vertical).round())
    }
}

/// Where and how to draw one sprite.
#[derive(Debug, Clone, Copy)]
pub struct Placement<'a> {
    pub kind: JewelryKind,
    pub asset: &'a JewelryAsset,
    pub center: Point2D,
    /// Radians, clockwise in image space.
    pub rotation: f32,
    pub width: f32,
    pub height: f32,
}

/// Transforms for every occupied slot: a left and right earring, then the
/// necklace. Empty slots contribute nothing.
pub fn compute_transforms<'a>(
    anchors: &AnchorState,
    face: FaceSize,
    shape: FaceShape,
    params: &TuningParameters,
    slots: &'a JewelrySlots,
) -> Vec<Placement<'a>> {
    let mut placements = Vec::with_capacity(3);

    if let Some(asset) = slots.get(JewelryKind::Earrings) {
        placements.extend(earring_transforms(anchors, face, shape, params, asset));
    }
    if let Some(asset) = slots.get(JewelryKind::Necklace) {
        placements.push(necklace_transform(anchors, params, asset));
    }

    placements
}

pub fn earring_transforms<'a>(
    anchors: &AnchorState,
    face: FaceSize,
    shape: FaceShape,
    params: &TuningParameters,
    asset: &'a JewelryAsset,
) -> [Placement<'a>; 2] {
    let adjust = ShapeAdjustment::for_shape(shape);
    let (outward, downward) = adjust.offsets(face);

    let width = anchors.ear_distance * params.ear_size_factor * adjust.size_multiplier;
    let height = asset.aspect() * width;
    let drop = height * EARRING_DROP + downward;
    let tilt = -anchors.angle * EARRING_TILT_DAMPING;

    let left = Placement {
        kind: JewelryKind::Earrings,
        asset,
        center: Point2D::new(anchors.left_ear.x - outward, anchors.left_ear.y + drop),
        rotation: tilt,
        width,
        height,
    };
    let right = Placement {
        center: Point2D::new(anchors.right_ear.x + outward, anchors.right_ear.y + drop),
        rotation: -tilt,
        ..left
    };
    [left, right]
}

pub fn necklace_transform<'a>(
    anchors: &AnchorState,
    params: &TuningParameters,
    asset: &'a JewelryAsset,
) -> Placement<'a> {
    let width = anchors.ear_distance * params.neck_scale_multiplier;
    let height = asset.aspect() * width;
    let y_offset = anchors.ear_distance * params.neck_y_offset_factor;

    Placement {
        kind: JewelryKind::Necklace,
        asset,
        center: Point2D::new(anchors.neck_point.x, anchors.neck_point.y + y_offset),
        rotation: anchors.angle,
        width,
        height,
    }
}
