use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};
use tracing::{info, warn};

use crate::catalog::CategoryConfig;
use crate::error::Result;
use crate::layout::LandmarkLayout;

pub const DEFAULT_PATH: &str = "config.json";

/// Live-adjustable placement and smoothing knobs.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct TuningParameters {
    pub ear_size_factor: f32,
    pub neck_y_offset_factor: f32,
    pub neck_scale_multiplier: f32,
    /// Weight of the previous anchor position, in [0, 1).
    pub position_smoothing: f32,
    /// Weight of the previous ear distance, in [0, 1).
    pub ear_distance_smoothing: f32,
}

impl Default for TuningParameters {
    fn default() -> Self {
        Self::for_variant(Variant::Standard)
    }
}

impl TuningParameters {
    pub fn for_variant(variant: Variant) -> Self {
        Self {
            ear_size_factor: 0.24,
            neck_y_offset_factor: variant.neck_y_offset_factor(),
            neck_scale_multiplier: 1.15,
            position_smoothing: 0.88,
            ear_distance_smoothing: 0.90,
        }
    }

    /// Replaces out-of-range values with the defaults, logging each fix.
    pub fn validated(mut self) -> Self {
        let defaults = Self::default();
        let smoothing_ok = |v: f32| (0.0..1.0).contains(&v);
        let factor_ok = |v: f32| v.is_finite() && v > 0.0;

        if !smoothing_ok(self.position_smoothing) {
            warn!(value = self.position_smoothing, "position_smoothing outside [0, 1), using default");
            self.position_smoothing = defaults.position_smoothing;
        }
        if !smoothing_ok(self.ear_distance_smoothing) {
            warn!(value = self.ear_distance_smoothing, "ear_distance_smoothing outside [0, 1), using default");
            self.ear_distance_smoothing = defaults.ear_distance_smoothing;
        }
        if !factor_ok(self.ear_size_factor) {
            warn!(value = self.ear_size_factor, "ear_size_factor must be positive, using default");
            self.ear_size_factor = defaults.ear_size_factor;
        }
        if !factor_ok(self.neck_scale_multiplier) {
            warn!(value = self.neck_scale_multiplier, "neck_scale_multiplier must be positive, using default");
            self.neck_scale_multiplier = defaults.neck_scale_multiplier;
        }
        if !self.neck_y_offset_factor.is_finite() {
            warn!("neck_y_offset_factor is not finite, using default");
            self.neck_y_offset_factor = defaults.neck_y_offset_factor;
        }
        self
    }

    /// One keyboard step on `knob`, kept inside the valid range.
    pub fn nudged(mut self, knob: TuningKnob, steps: i32) -> Self {
        let delta = knob.step() * steps as f32;
        match knob {
            TuningKnob::EarSize => self.ear_size_factor = (self.ear_size_factor + delta).max(MIN_FACTOR),
            TuningKnob::NeckOffset => self.neck_y_offset_factor += delta,
            TuningKnob::NeckScale => {
                self.neck_scale_multiplier = (self.neck_scale_multiplier + delta).max(MIN_FACTOR)
            }
            TuningKnob::PositionSmoothing => {
                self.position_smoothing = (self.position_smoothing + delta).clamp(0.0, MAX_SMOOTHING)
            }
            TuningKnob::EarDistanceSmoothing => {
                self.ear_distance_smoothing = (self.ear_distance_smoothing + delta).clamp(0.0, MAX_SMOOTHING)
            }
        }
        self
    }

    pub fn value(&self, knob: TuningKnob) -> f32 {
        match knob {
            TuningKnob::EarSize => self.ear_size_factor,
            TuningKnob::NeckOffset => self.neck_y_offset_factor,
            TuningKnob::NeckScale => self.neck_scale_multiplier,
            TuningKnob::PositionSmoothing => self.position_smoothing,
            TuningKnob::EarDistanceSmoothing => self.ear_distance_smoothing,
        }
    }
}

const MIN_FACTOR: f32 = 0.01;
const MAX_SMOOTHING: f32 = 0.99;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TuningKnob {
    EarSize,
    NeckOffset,
    NeckScale,
    PositionSmoothing,
    EarDistanceSmoothing,
}

impl TuningKnob {
    fn step(self) -> f32 {
        match self {
            TuningKnob::EarSize => 0.01,
            TuningKnob::NeckOffset | TuningKnob::NeckScale => 0.05,
            TuningKnob::PositionSmoothing | TuningKnob::EarDistanceSmoothing => 0.02,
        }
    }

    pub fn label(self) -> &'static str {
        match self {
            TuningKnob::EarSize => "ear size",
            TuningKnob::NeckOffset => "neck offset",
            TuningKnob::NeckScale => "neck scale",
            TuningKnob::PositionSmoothing => "position smoothing",
            TuningKnob::EarDistanceSmoothing => "ear distance smoothing",
        }
    }
}

/// Deployed variants differ only in how low the necklace hangs.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Variant {
    #[default]
    Standard,
    LowNeck,
}

impl Variant {
    pub fn neck_y_offset_factor(self) -> f32 {
        match self {
            Variant::Standard => 0.95,
            Variant::LowNeck => 1.15,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct TuningConfig {
    pub variant: Variant,
    pub ear_size_factor: f32,
    /// Falls back to the variant's value when absent.
    pub neck_y_offset_factor: Option<f32>,
    pub neck_scale_multiplier: f32,
    pub position_smoothing: f32,
    pub ear_distance_smoothing: f32,
}

impl Default for TuningConfig {
    fn default() -> Self {
        let d = TuningParameters::default();
        Self {
            variant: Variant::Standard,
            ear_size_factor: d.ear_size_factor,
            neck_y_offset_factor: None,
            neck_scale_multiplier: d.neck_scale_multiplier,
            position_smoothing: d.position_smoothing,
            ear_distance_smoothing: d.ear_distance_smoothing,
        }
    }
}

impl TuningConfig {
    pub fn resolve(&self) -> TuningParameters {
        TuningParameters {
            ear_size_factor: self.ear_size_factor,
            neck_y_offset_factor: self
                .neck_y_offset_factor
                .unwrap_or_else(|| self.variant.neck_y_offset_factor()),
            neck_scale_multiplier: self.neck_scale_multiplier,
            position_smoothing: self.position_smoothing,
            ear_distance_smoothing: self.ear_distance_smoothing,
        }
        .validated()
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ModelConfig {
    pub face_detection_path: String,
    pub face_mesh_path: String,
    pub segmentation_path: String,
    pub segmentation_threshold: f32,
}

impl Default for ModelConfig {
    fn default() -> Self {
        Self {
            face_detection_path: "models/face_detection.onnx".to_string(),
            face_mesh_path: "models/face_mesh.onnx".to_string(),
            segmentation_path: "models/selfie_segmentation.onnx".to_string(),
            segmentation_threshold: 0.7,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct SegmentationConfig {
    pub throttle_ms: u64,
}

impl Default for SegmentationConfig {
    fn default() -> Self {
        Self { throttle_ms: 300 }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct CatalogConfig {
    pub root: PathBuf,
    pub categories: Vec<CategoryConfig>,
}

impl Default for CatalogConfig {
    fn default() -> Self {
        Self {
            root: PathBuf::from("assets"),
            categories: vec![
                CategoryConfig::new("gold_earrings", 16),
                CategoryConfig::new("gold_necklaces", 19),
                CategoryConfig::new("diamond_earrings", 9),
                CategoryConfig::new("diamond_necklaces", 6),
            ],
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct CaptureConfig {
    pub output_dir: PathBuf,
    pub settle_ms: u64,
    pub step_ms: u64,
}

impl Default for CaptureConfig {
    fn default() -> Self {
        Self {
            output_dir: PathBuf::from("captures"),
            settle_ms: 800,
            step_ms: 2000,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct BrandingConfig {
    pub watermark_path: Option<PathBuf>,
    pub width_fraction: f32,
    pub margin_px: u32,
    pub opacity: f32,
}

impl Default for BrandingConfig {
    fn default() -> Self {
        Self {
            watermark_path: Some(PathBuf::from("logo_watermark.png")),
            width_fraction: 0.22,
            margin_px: 14,
            opacity: 0.85,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct UiConfig {
    pub mirror_mode: bool,
    pub show_debug: bool,
}

impl Default for UiConfig {
    fn default() -> Self {
        Self {
            mirror_mode: true,
            show_debug: false,
        }
    }
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct AppConfig {
    pub tuning: TuningConfig,
    pub layout: LandmarkLayout,
    pub models: ModelConfig,
    pub segmentation: SegmentationConfig,
    pub catalog: CatalogConfig,
    pub capture: CaptureConfig,
    pub branding: BrandingConfig,
    pub ui: UiConfig,
}

impl AppConfig {
    pub fn load(path: &Path) -> Result<Self> {
        if !path.exists() {
            info!("Configuration file not found. Creating default at {}", path.display());
            let config = Self::default();
            config.save(path)?;
            return Ok(config);
        }

        let content = fs::read_to_string(path)?;
        // Missing fields fall back to Default through #[serde(default)]
        match serde_json::from_str::<AppConfig>(&content) {
            Ok(config) => {
                info!("Loaded configuration from {}", path.display());
                // Write back so new fields show up in the file
                config.save(path)?;
                Ok(config)
            }
            Err(e) => {
                // A broken file is left as-is for the user to fix
                warn!("Error parsing {}: {}. Running with defaults.", path.display(), e);
                Ok(Self::default())
            }
        }
    }

    pub fn save(&self, path: &Path) -> Result<()> {
        let content = serde_json::to_string_pretty(self)?;
        fs::write(path, content)?;
        Ok(())
    }
}
