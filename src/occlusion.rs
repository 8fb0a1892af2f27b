//! Puts hair and head back in front of jewelry using a person mask.
//!
//! Inside a padded box around the head, every pixel whose mask cell is
//! foreground is overwritten with the untouched camera pixel. Jewelry that
//! falls on those pixels ends up looking like it is behind the head.

use image::RgbImage;
use tracing::debug;

use crate::segmentation::SegmentationMask;
use crate::types::{FrameSize, LandmarkSet, PixelRect};

/// Horizontal padding as a fraction of the head box width.
pub const PAD_X: f32 = 0.18;
/// Vertical padding as a fraction of the head box height; generous to reach the hairline.
pub const PAD_Y: f32 = 0.40;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SkipReason {
    NoFace,
    NoMask,
    DegenerateRegion,
    FrameMismatch,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OcclusionOutcome {
    Applied { region: PixelRect, restored: usize },
    Skipped(SkipReason),
}

impl OcclusionOutcome {
    pub fn is_applied(&self) -> bool {
        matches!(self, OcclusionOutcome::Applied { .. })
    }
}

/// Padded head box in pixels, clamped to the frame. `None` when empty.
pub fn head_region(landmarks: &LandmarkSet, indices: &[usize], frame: FrameSize) -> Option<PixelRect> {
    let b = landmarks.bounds(Some(indices))?;
    let pad_x = PAD_X * b.width();
    let pad_y = PAD_Y * b.height();
    let w = frame.width as f32;
    let h = frame.height as f32;

    let left = ((b.min_x - pad_x) * w).round().clamp(0.0, w);
    let top = ((b.min_y - pad_y) * h).round().clamp(0.0, h);
    let right = ((b.max_x + pad_x) * w).round().clamp(0.0, w);
    let bottom = ((b.max_y + pad_y) * h).round().clamp(0.0, h);

    let rect = PixelRect {
        left: left as u32,
        top: top as u32,
        right: right as u32,
        bottom: bottom as u32,
    };
    if rect.width() == 0 || rect.height() == 0 {
        return None;
    }
    Some(rect)
}

/// Mask cell for a frame pixel: nearest cell, no interpolation.
pub fn mask_cell(x: u32, y: u32, frame: FrameSize, mask: &SegmentationMask) -> (u32, u32) {
    let sx = mask.width() as f64 / frame.width as f64;
    let sy = mask.height() as f64 / frame.height as f64;
    ((x as f64 * sx).floor() as u32, (y as f64 * sy).floor() as u32)
}

/// Restores `source` pixels into `rendered` where the mask is foreground.
/// Returns how many pixels were restored.
pub fn composite_region(
    rendered: &mut RgbImage,
    source: &RgbImage,
    region: PixelRect,
    mask: &SegmentationMask,
) -> usize {
    let frame = FrameSize::new(rendered.width(), rendered.height());
    let mut restored = 0;
    for y in region.top..region.bottom {
        for x in region.left..region.right {
            let (mx, my) = mask_cell(x, y, frame, mask);
            if mask.is_foreground(mx, my) {
                rendered.put_pixel(x, y, *source.get_pixel(x, y));
                restored += 1;
            }
        }
    }
    restored
}

/// Full occlusion step. Never fails: anything unusable is a skip.
pub fn occlude(
    rendered: &mut RgbImage,
    source: &RgbImage,
    landmarks: &LandmarkSet,
    head_indices: &[usize],
    mask: Option<&SegmentationMask>,
) -> OcclusionOutcome {
    let Some(mask) = mask else {
        return OcclusionOutcome::Skipped(SkipReason::NoMask);
    };
    if rendered.dimensions() != source.dimensions() {
        return OcclusionOutcome::Skipped(SkipReason::FrameMismatch);
    }
    let frame = FrameSize::new(rendered.width(), rendered.height());
    let Some(region) = head_region(landmarks, head_indices, frame) else {
        debug!("Head region is empty, skipping occlusion");
        return OcclusionOutcome::Skipped(SkipReason::DegenerateRegion);
    };

    let restored = composite_region(rendered, source, region, mask);
    OcclusionOutcome::Applied { region, restored }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::Point3D;
    use image::Rgb;

    fn head(min: (f32, f32), max: (f32, f32)) -> LandmarkSet {
        LandmarkSet::new(vec![
            Point3D::new(min.0, min.1, 0.0),
            Point3D::new(max.0, max.1, 0.0),
            Point3D::new((min.0 + max.0) / 2.0, (min.1 + max.1) / 2.0, 0.0),
        ])
    }

    #[test]
    fn test_region_padding() {
        let set = head((0.4, 0.3), (0.6, 0.5));
        let rect = head_region(&set, &[0, 1, 2], FrameSize::new(1000, 1000)).unwrap();
        assert_eq!(
            rect,
            PixelRect { left: 364, top: 220, right: 636, bottom: 580 }
        );
    }

    #[test]
    fn test_region_clamped_to_frame() {
        let set = head((0.0, 0.0), (0.5, 0.5));
        let rect = head_region(&set, &[0, 1], FrameSize::new(100, 100)).unwrap();
        assert_eq!((rect.left, rect.top), (0, 0));
        assert_eq!((rect.right, rect.bottom), (59, 70));
    }

    #[test]
    fn test_collapsed_region_is_none() {
        let set = head((0.5, 0.5), (0.5, 0.5));
        assert!(head_region(&set, &[0, 1], FrameSize::new(100, 100)).is_none());
        let off_frame = head((1.2, 1.2), (1.4, 1.4));
        assert!(head_region(&off_frame, &[0, 1], FrameSize::new(100, 100)).is_none());
    }

    #[test]
    fn test_half_resolution_mask_lookup() {
        let mask = SegmentationMask::new(50, 50, vec![0; 2500]).unwrap();
        assert_eq!(mask_cell(10, 10, FrameSize::new(100, 100), &mask), (5, 5));
        assert_eq!(mask_cell(11, 11, FrameSize::new(100, 100), &mask), (5, 5));
        assert_eq!(mask_cell(99, 0, FrameSize::new(100, 100), &mask), (49, 0));
    }

    #[test]
    fn test_no_mask_is_skip() {
        let mut rendered = RgbImage::new(4, 4);
        let source = RgbImage::new(4, 4);
        let set = head((0.0, 0.0), (1.0, 1.0));
        assert_eq!(
            occlude(&mut rendered, &source, &set, &[0, 1], None),
            OcclusionOutcome::Skipped(SkipReason::NoMask)
        );
    }

    #[test]
    fn test_partial_mask_restores_only_foreground() {
        let mut rendered = RgbImage::from_pixel(4, 4, Rgb([200, 0, 0]));
        let source = RgbImage::from_pixel(4, 4, Rgb([0, 0, 200]));
        // 2x2 mask, top row person
        let mask = SegmentationMask::new(2, 2, vec![1, 1, 0, 0]).unwrap();
        let set = head((0.0, 0.0), (1.0, 1.0));

        let outcome = occlude(&mut rendered, &source, &set, &[0, 1], Some(&mask));
        assert!(matches!(outcome, OcclusionOutcome::Applied { restored: 8, .. }));
        assert_eq!(*rendered.get_pixel(3, 1), Rgb([0, 0, 200]));
        assert_eq!(*rendered.get_pixel(0, 2), Rgb([200, 0, 0]));
    }
}
