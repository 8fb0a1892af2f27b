//! Virtual jewelry try-on.
//!
//! A face-landmark detector feeds [`SmoothingEngine`], which keeps the
//! temporally filtered anchors (ears, neck, head tilt, ear distance, face
//! shape). [`placement`] turns those anchors into sprite transforms,
//! [`render`] draws them, and [`occlusion`] puts the head back in front of
//! the jewelry using a person mask from the [`segmentation`] worker.
//! [`TryOnSession`] runs the whole chain once per frame.

pub mod autotry;
pub mod branding;
pub mod catalog;
pub mod config;
pub mod detector;
pub mod error;
pub mod export;
pub mod face_shape;
pub mod inference;
pub mod layout;
pub mod occlusion;
pub mod placement;
pub mod render;
pub mod segmentation;
pub mod session;
pub mod smoothing;
pub mod types;

pub use catalog::{Catalog, JewelryAsset, JewelryKind, JewelrySlots};
pub use config::{AppConfig, TuningParameters, Variant};
pub use error::{Error, Result};
pub use face_shape::{FaceShape, FaceSize};
pub use layout::LandmarkLayout;
pub use segmentation::SegmentationMask;
pub use session::{FrameReport, TryOnSession};
pub use smoothing::{AnchorState, SmoothingEngine};
pub use types::{FrameSize, LandmarkSet, Point2D, Point3D};
