//! Coarse face-shape category from the landmark bounding box.

use serde::{Deserialize, Serialize};

use crate::types::{FrameSize, LandmarkSet};

const ROUND_MAX_ASPECT: f32 = 1.05;
const LONG_MIN_ASPECT: f32 = 1.25;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FaceShape {
    Round,
    Oval,
    Long,
    #[default]
    Unknown,
}

impl FaceShape {
    /// Classifies by `height / width` of the face box.
    pub fn classify(size: FaceSize) -> Self {
        let aspect = size.aspect();
        if aspect < ROUND_MAX_ASPECT {
            FaceShape::Round
        } else if aspect > LONG_MIN_ASPECT {
            FaceShape::Long
        } else {
            FaceShape::Oval
        }
    }

    pub fn label(self) -> &'static str {
        match self {
            FaceShape::Round => "round",
            FaceShape::Oval => "oval",
            FaceShape::Long => "long",
            FaceShape::Unknown => "unknown",
        }
    }
}

/// Face bounding box size in pixels.
#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub struct FaceSize {
    pub width: f32,
    pub height: f32,
}

impl FaceSize {
    pub const fn new(width: f32, height: f32) -> Self {
        Self { width, height }
    }

    /// Bounding box over every landmark, converted to pixels.
    pub fn measure(landmarks: &LandmarkSet, frame: FrameSize) -> Self {
        landmarks
            .bounds(None)
            .map(|b| Self {
                width: b.width() * frame.width as f32,
                height: b.height() * frame.height as f32,
            })
            .unwrap_or_default()
    }

    pub fn aspect(&self) -> f32 {
        // zero width counts as 1 px
        let width = if self.width == 0.0 { 1.0 } else { self.width };
        self.height / width
    }
}
