//! Bottom-right branding mark stamped on every output frame.

use image::{RgbImage, RgbaImage};
use tracing::{info, warn};

use crate::config::BrandingConfig;
use crate::render::draw_sprite;

pub struct Watermark {
    image: Option<RgbaImage>,
    width_fraction: f32,
    margin_px: u32,
    opacity: f32,
}

impl Watermark {
    pub fn new(image: Option<RgbaImage>, config: &BrandingConfig) -> Self {
        Self {
            image: image.filter(|img| img.width() > 0 && img.height() > 0),
            width_fraction: config.width_fraction,
            margin_px: config.margin_px,
            opacity: config.opacity.clamp(0.0, 1.0),
        }
    }

    /// Loads the configured image. A missing or unreadable file yields a
    /// watermark that draws nothing.
    pub fn from_config(config: &BrandingConfig) -> Self {
        let image = config.watermark_path.as_ref().and_then(|path| match image::open(path) {
            Ok(img) => {
                info!("Loaded watermark from {}", path.display());
                Some(img.to_rgba8())
            }
            Err(e) => {
                warn!("Watermark {} unavailable: {}", path.display(), e);
                None
            }
        });
        Self::new(image, config)
    }

    pub fn none() -> Self {
        Self::new(None, &BrandingConfig::default())
    }

    pub fn is_enabled(&self) -> bool {
        self.image.is_some()
    }

    /// Drawn size for a frame `frame_width` wide.
    pub fn size_for(&self, frame_width: u32) -> Option<(u32, u32)> {
        let img = self.image.as_ref()?;
        let width = (frame_width as f32 * self.width_fraction).round();
        let height = (width * img.height() as f32 / img.width() as f32).round();
        Some((width as u32, height as u32))
    }

    pub fn apply(&self, frame: &mut RgbImage) {
        let (Some(img), Some((w, h))) = (self.image.as_ref(), self.size_for(frame.width())) else {
            return;
        };
        if w == 0 || h == 0 {
            return;
        }
        let left = frame.width() as f32 - self.margin_px as f32 - w as f32;
        let top = frame.height() as f32 - self.margin_px as f32 - h as f32;
        draw_sprite(
            frame,
            img,
            left + w as f32 / 2.0,
            top + h as f32 / 2.0,
            w as f32,
            h as f32,
            0.0,
            self.opacity,
        );
    }
}
