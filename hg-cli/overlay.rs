//! Draws a registration result onto the scene image.

use std::path::Path;

use hg_core::{Point2, Quadrilateral};
use image::{ImageReader, Rgba, RgbaImage};
use imageproc::drawing::{draw_hollow_circle_mut, draw_line_segment_mut};

use crate::{RegistrationError, RegistrationResult};

const QUAD_COLOR: Rgba<u8> = Rgba([0, 255, 0, 255]);
const LINE_THICKNESS: i32 = 4;
const VERTEX_RADIUS: i32 = 6;

/// Outline `quad` in green, with a circle on every vertex
pub fn draw_quad(image: &mut RgbaImage, quad: &Quadrilateral) {
    // Thick lines as a bundle of offset one-pixel segments
    let half = LINE_THICKNESS / 2;
    let (width, height) = image.dimensions();
    for (a, b) in quad.edges() {
        let Some((a, b)) = clip_segment(a, b, width as f32, height as f32, LINE_THICKNESS as f32) else {
            continue;
        };
        for dx in -half..LINE_THICKNESS - half {
            for dy in -half..LINE_THICKNESS - half {
                let (ox, oy) = (dx as f32, dy as f32);
                draw_line_segment_mut(image, (a.x + ox, a.y + oy), (b.x + ox, b.y + oy), QUAD_COLOR);
            }
        }
    }

    for v in quad.vertices() {
        draw_hollow_circle_mut(image, (v.x.round() as i32, v.y.round() as i32), VERTEX_RADIUS, QUAD_COLOR);
    }
}

/// Liang-Barsky clip of `a -> b` to the image grown by `margin` on every side.
/// `None` when the segment misses it entirely.
fn clip_segment(a: Point2, b: Point2, width: f32, height: f32, margin: f32) -> Option<(Point2, Point2)> {
    // f64 keeps sub-pixel accuracy for far-away endpoints
    let (ax, ay) = (a.x as f64, a.y as f64);
    let (dx, dy) = (b.x as f64 - ax, b.y as f64 - ay);
    let (w, h, m) = (width as f64, height as f64, margin as f64);
    let (mut t0, mut t1) = (0.0f64, 1.0f64);
    let bounds = [(-dx, ax + m), (dx, w + m - ax), (-dy, ay + m), (dy, h + m - ay)];
    for (p, q) in bounds {
        if p == 0.0 {
            if q < 0.0 {
                return None;
            }
            continue;
        }
        let r = q / p;
        if p < 0.0 {
            t0 = t0.max(r);
        } else {
            t1 = t1.min(r);
        }
        if t0 > t1 {
            return None;
        }
    }
    let at = |t: f64| Point2::new((ax + t * dx) as f32, (ay + t * dy) as f32);
    Some((at(t0), at(t1)))
}

/// Load `scene`, draw `quad` on it and save the result to `output`
pub fn save_overlay<P: AsRef<Path>, Q: AsRef<Path>>(scene: P, quad: &Quadrilateral, output: Q) -> RegistrationResult<()> {
    let mut image = ImageReader::open(scene)?
        .decode()
        .map_err(|e| RegistrationError::Image(e.to_string()))?
        .into_rgba8();
    draw_quad(&mut image, quad);
    image
        .save(output)
        .map_err(|e| RegistrationError::Image(e.to_string()))?;
    Ok(())
}
