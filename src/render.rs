//! Rasterizes placed jewelry sprites into the frame buffer.

use image::{Rgb, RgbImage, Rgba, RgbaImage};
use imageproc::drawing::draw_filled_circle_mut;

use crate::placement::Placement;
use crate::smoothing::AnchorState;

const MARKER_RADIUS: i32 = 6;

/// Draws `placement` scaled, rotated about its centre, and alpha-blended.
pub fn draw_placement(frame: &mut RgbImage, placement: &Placement) {
    draw_sprite(
        frame,
        placement.asset.image(),
        placement.center.x,
        placement.center.y,
        placement.width,
        placement.height,
        placement.rotation,
        1.0,
    );
}

/// Inverse-maps every covered frame pixel back into `sprite`.
#[allow(clippy::too_many_arguments)]
pub fn draw_sprite(
    frame: &mut RgbImage,
    sprite: &RgbaImage,
    cx: f32,
    cy: f32,
    width: f32,
    height: f32,
    rotation: f32,
    opacity: f32,
) {
    if !(width > 0.0 && height > 0.0) || sprite.width() == 0 || sprite.height() == 0 {
        return;
    }
    let (sin, cos) = rotation.sin_cos();
    let half_w = width / 2.0;
    let half_h = height / 2.0;

    // axis-aligned extent of the rotated sprite
    let ext_x = half_w * cos.abs() + half_h * sin.abs();
    let ext_y = half_w * sin.abs() + half_h * cos.abs();
    let x0 = (cx - ext_x).floor().max(0.0) as u32;
    let y0 = (cy - ext_y).floor().max(0.0) as u32;
    let x1 = (cx + ext_x).ceil().min(frame.width() as f32).max(0.0) as u32;
    let y1 = (cy + ext_y).ceil().min(frame.height() as f32).max(0.0) as u32;

    let scale_x = sprite.width() as f32 / width;
    let scale_y = sprite.height() as f32 / height;

    for y in y0..y1 {
        for x in x0..x1 {
            let dx = x as f32 + 0.5 - cx;
            let dy = y as f32 + 0.5 - cy;
            let lx = dx * cos + dy * sin;
            let ly = -dx * sin + dy * cos;
            if lx.abs() > half_w || ly.abs() > half_h {
                continue;
            }
            let u = (lx + half_w) * scale_x - 0.5;
            let v = (ly + half_h) * scale_y - 0.5;
            let (color, alpha) = sample_premultiplied(sprite, u, v);
            blend_premultiplied(frame.get_pixel_mut(x, y), color, alpha * opacity, opacity);
        }
    }
}

/// Bilinear sample with clamp-to-edge, returned premultiplied by alpha.
fn sample_premultiplied(img: &RgbaImage, u: f32, v: f32) -> ([f32; 3], f32) {
    let max_x = (img.width() - 1) as f32;
    let max_y = (img.height() - 1) as f32;
    let u = u.clamp(0.0, max_x);
    let v = v.clamp(0.0, max_y);
    let x0 = u.floor() as u32;
    let y0 = v.floor() as u32;
    let x1 = (x0 + 1).min(img.width() - 1);
    let y1 = (y0 + 1).min(img.height() - 1);
    let fx = u - x0 as f32;
    let fy = v - y0 as f32;

    let mut color = [0.0f32; 3];
    let mut alpha = 0.0f32;
    for (px, py, w) in [
        (x0, y0, (1.0 - fx) * (1.0 - fy)),
        (x1, y0, fx * (1.0 - fy)),
        (x0, y1, (1.0 - fx) * fy),
        (x1, y1, fx * fy),
    ] {
        let Rgba([r, g, b, a]) = *img.get_pixel(px, py);
        let a = a as f32 / 255.0;
        color[0] += r as f32 * a * w;
        color[1] += g as f32 * a * w;
        color[2] += b as f32 * a * w;
        alpha += a * w;
    }
    (color, alpha)
}

/// `dst = src * opacity + dst * (1 - alpha)`, with `src` premultiplied.
fn blend_premultiplied(dst: &mut Rgb<u8>, src: [f32; 3], alpha: f32, opacity: f32) {
    if alpha <= 0.0 {
        return;
    }
    for c in 0..3 {
        let out = src[c] * opacity + dst[c] as f32 * (1.0 - alpha);
        dst[c] = out.round().clamp(0.0, 255.0) as u8;
    }
}

/// Cyan, magenta and yellow dots on the left ear, right ear and neck anchors.
pub fn draw_anchor_markers(frame: &mut RgbImage, anchors: &AnchorState) {
    let markers = [
        (anchors.left_ear, Rgb([0u8, 255u8, 255u8])),
        (anchors.right_ear, Rgb([255u8, 0u8, 255u8])),
        (anchors.neck_point, Rgb([255u8, 255u8, 0u8])),
    ];
    for (point, color) in markers {
        draw_filled_circle_mut(
            frame,
            (point.x.round() as i32, point.y.round() as i32),
            MARKER_RADIUS,
            color,
        );
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn solid(w: u32, h: u32, px: Rgba<u8>) -> RgbaImage {
        RgbaImage::from_pixel(w, h, px)
    }

    #[test]
    fn test_opaque_sprite_covers_its_box() {
        let mut frame = RgbImage::new(40, 40);
        let sprite = solid(10, 10, Rgba([255, 0, 0, 255]));
        draw_sprite(&mut frame, &sprite, 20.0, 20.0, 10.0, 10.0, 0.0, 1.0);

        assert_eq!(*frame.get_pixel(20, 20), Rgb([255, 0, 0]));
        assert_eq!(*frame.get_pixel(15, 15), Rgb([255, 0, 0]));
        assert_eq!(*frame.get_pixel(24, 24), Rgb([255, 0, 0]));
        assert_eq!(*frame.get_pixel(14, 20), Rgb([0, 0, 0]));
        assert_eq!(*frame.get_pixel(25, 20), Rgb([0, 0, 0]));
    }

    #[test]
    fn test_quarter_turn_swaps_extent() {
        let mut frame = RgbImage::new(40, 40);
        let sprite = solid(20, 4, Rgba([0, 255, 0, 255]));
        draw_sprite(&mut frame, &sprite, 20.0, 20.0, 20.0, 4.0, std::f32::consts::FRAC_PI_2, 1.0);

        // now tall and thin
        assert_eq!(*frame.get_pixel(20, 12), Rgb([0, 255, 0]));
        assert_eq!(*frame.get_pixel(20, 28), Rgb([0, 255, 0]));
        assert_eq!(*frame.get_pixel(12, 20), Rgb([0, 0, 0]));
        assert_eq!(*frame.get_pixel(28, 20), Rgb([0, 0, 0]));
    }

    #[test]
    fn test_transparent_sprite_leaves_frame() {
        let mut frame = RgbImage::from_pixel(16, 16, Rgb([9, 9, 9]));
        let before = frame.clone();
        let sprite = solid(8, 8, Rgba([255, 255, 255, 0]));
        draw_sprite(&mut frame, &sprite, 8.0, 8.0, 8.0, 8.0, 0.3, 1.0);
        assert_eq!(frame, before);
    }

    #[test]
    fn test_half_opacity_mixes() {
        let mut frame = RgbImage::from_pixel(8, 8, Rgb([0, 0, 0]));
        let sprite = solid(8, 8, Rgba([200, 100, 50, 255]));
        draw_sprite(&mut frame, &sprite, 4.0, 4.0, 8.0, 8.0, 0.0, 0.5);
        assert_eq!(*frame.get_pixel(4, 4), Rgb([100, 50, 25]));
    }

    #[test]
    fn test_sprite_off_frame_is_clipped() {
        let mut frame = RgbImage::new(10, 10);
        let sprite = solid(4, 4, Rgba([255, 255, 255, 255]));
        draw_sprite(&mut frame, &sprite, -50.0, -50.0, 4.0, 4.0, 0.0, 1.0);
        draw_sprite(&mut frame, &sprite, 9.0, 9.0, 4.0, 4.0, 0.0, 1.0);
        assert_eq!(*frame.get_pixel(9, 9), Rgb([255, 255, 255]));
        assert_eq!(*frame.get_pixel(0, 0), Rgb([0, 0, 0]));
    }
}
