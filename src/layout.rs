//! Landmark indices the try-on core reads from the face mesh.
//!
//! These are a contract with the detector model (MediaPipe-style 468-point
//! mesh). A different detector needs a different layout, supplied through
//! the `layout` section of the config.

use serde::{Deserialize, Serialize};

use crate::error::{Error, Result};
use crate::types::LandmarkSet;

pub const LEFT_EAR: usize = 132;
pub const RIGHT_EAR: usize = 361;
pub const NECK: usize = 152;

/// Forehead, nose bridge and nose tip points bounding the head for occlusion.
pub const HEAD_REGION: [usize; 6] = [10, 151, 9, 197, 195, 4];

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct LandmarkLayout {
    pub left_ear: usize,
    pub right_ear: usize,
    pub neck: usize,
    pub head_region: Vec<usize>,
}

impl Default for LandmarkLayout {
    fn default() -> Self {
        Self {
            left_ear: LEFT_EAR,
            right_ear: RIGHT_EAR,
            neck: NECK,
            head_region: HEAD_REGION.to_vec(),
        }
    }
}

impl LandmarkLayout {
    /// Smallest landmark count that covers every index in the layout.
    pub fn required_len(&self) -> usize {
        self.head_region
            .iter()
            .copied()
            .chain([self.left_ear, self.right_ear, self.neck])
            .max()
            .map_or(0, |max| max + 1)
    }

    pub fn check(&self, landmarks: &LandmarkSet) -> Result<()> {
        let required = self.required_len();
        if landmarks.len() < required {
            return Err(Error::InvalidLandmarks {
                required,
                actual: landmarks.len(),
            });
        }
        Ok(())
    }
}
