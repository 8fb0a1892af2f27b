use anyhow::Result;
use image::RgbImage;
use minifb::{Key, KeyRepeat, Window, WindowOptions};

/// Shows composited frames in a native window.
pub struct WindowOutput {
    window: Window,
    buffer: Vec<u32>,
}

impl WindowOutput {
    pub fn new(title: &str, width: usize, height: usize) -> Result<Self> {
        let mut window = Window::new(
            title,
            width,
            height,
            WindowOptions {
                resize: true,
                ..WindowOptions::default()
            },
        )
        .map_err(|e| anyhow::anyhow!("Failed to create window: {}", e))?;

        window.limit_update_rate(Some(std::time::Duration::from_micros(16600))); // ~60 FPS

        Ok(Self {
            window,
            buffer: vec![0; width * height],
        })
    }

    pub fn is_open(&self) -> bool {
        self.window.is_open()
    }

    pub fn keys_pressed(&self) -> Vec<Key> {
        self.window.get_keys_pressed(KeyRepeat::No)
    }

    pub fn set_title(&mut self, title: &str) {
        self.window.set_title(title);
    }

    pub fn show(&mut self, frame: &RgbImage) -> Result<()> {
        let (width, height) = (frame.width() as usize, frame.height() as usize);
        self.buffer.resize(width * height, 0);
        pack_argb(frame, &mut self.buffer);

        self.window
            .update_with_buffer(&self.buffer, width, height)
            .map_err(|e| anyhow::anyhow!("Window update failed: {}", e))
    }
}

/// RGB8 pixels into minifb's 0RGB u32 layout.
fn pack_argb(frame: &RgbImage, out: &mut [u32]) {
    for (dst, pixel) in out.iter_mut().zip(frame.pixels()) {
        let [r, g, b] = pixel.0;
        *dst = (r as u32) << 16 | (g as u32) << 8 | b as u32;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use image::Rgb;

    #[test]
    fn test_pack_argb() {
        let mut frame = RgbImage::new(2, 1);
        frame.put_pixel(0, 0, Rgb([0x12, 0x34, 0x56]));
        frame.put_pixel(1, 0, Rgb([0xff, 0, 0]));
        let mut out = vec![0u32; 2];
        pack_argb(&frame, &mut out);
        assert_eq!(out, vec![0x0012_3456, 0x00ff_0000]);
    }
}
