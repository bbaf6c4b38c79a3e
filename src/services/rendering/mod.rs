// Line rendering onto RGB rasters

use image::{Rgb, RgbImage};
use imageproc::drawing::draw_line_segment_mut;

use crate::core::types::{LineSegment, LineSet};

/// Colour of annotation lines (RGB channel order).
pub const LINE_COLOR: Rgb<u8> = Rgb([0, 255, 0]);
/// Width of annotation lines in pixels.
pub const LINE_THICKNESS: u32 = 2;

/// How annotation lines look
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct LineStyle {
    pub color: Rgb<u8>,
    pub thickness: u32,
}

impl Default for LineStyle {
    fn default() -> Self {
        Self {
            color: LINE_COLOR,
            thickness: LINE_THICKNESS,
        }
    }
}

/// Draw every segment of `lines` onto `canvas`, in order.
pub fn draw_lines_mut(canvas: &mut RgbImage, lines: &LineSet, style: &LineStyle) {
    for segment in lines {
        draw_segment_mut(canvas, segment, style);
    }
}

/// Draw one segment.
///
/// A thickness of 1 uses imageproc's Bresenham line. Wider lines paint every
/// pixel whose centre lies within `thickness / 2` of the segment, clipped to
/// the canvas. Only a band of `2 * thickness + 3` pixels across the major axis
/// is tested, so cost grows with length, not with the bounding box.
pub fn draw_segment_mut(canvas: &mut RgbImage, segment: &LineSegment, style: &LineStyle) {
    if style.thickness == 0 {
        return;
    }
    if style.thickness == 1 {
        draw_line_segment_mut(
            canvas,
            (segment.x1 as f32, segment.y1 as f32),
            (segment.x2 as f32, segment.y2 as f32),
            style.color,
        );
        return;
    }

    let (width, height) = canvas.dimensions();
    if width == 0 || height == 0 {
        return;
    }

    let radius = f64::from(style.thickness) / 2.0;
    let radius_sq = radius * radius + 1e-9;

    // (u, v) = (major, minor) axis coordinates
    let (x1, y1) = (f64::from(segment.x1), f64::from(segment.y1));
    let (x2, y2) = (f64::from(segment.x2), f64::from(segment.y2));
    let x_major = (x2 - x1).abs() >= (y2 - y1).abs();
    let (u0, v0, u1, v1, u_size, v_size) = if x_major {
        (x1, y1, x2, y2, width, height)
    } else {
        (y1, x1, y2, x2, height, width)
    };
    let (u_lo, u_hi) = (u0.min(u1), u0.max(u1));
    let slope = if u1 == u0 { 0.0 } else { (v1 - v0) / (u1 - u0) };

    // |slope| <= 1, so a covered pixel is at most 2r from the centre line
    // evaluated at the clamped major coordinate
    let band = 2.0 * radius + 1.0;
    let u_from = (u_lo - radius).floor().max(0.0) as i64;
    let u_to = (u_hi + radius).ceil().min(f64::from(u_size) - 1.0) as i64;

    for u in u_from..=u_to {
        let center = v0 + slope * ((u as f64).clamp(u_lo, u_hi) - u0);
        let v_from = (center - band).floor().max(0.0) as i64;
        let v_to = (center + band).ceil().min(f64::from(v_size) - 1.0) as i64;
        for v in v_from..=v_to {
            let (x, y) = if x_major { (u, v) } else { (v, u) };
            if distance_sq_to_segment(x as f64, y as f64, segment) <= radius_sq {
                canvas.put_pixel(x as u32, y as u32, style.color);
            }
        }
    }
}

/// Squared distance from point (px, py) to the closed segment.
pub fn distance_sq_to_segment(px: f64, py: f64, segment: &LineSegment) -> f64 {
    let (ax, ay) = (f64::from(segment.x1), f64::from(segment.y1));
    let (bx, by) = (f64::from(segment.x2), f64::from(segment.y2));
    let (dx, dy) = (bx - ax, by - ay);
    let len_sq = dx * dx + dy * dy;

    let t = if len_sq == 0.0 {
        0.0
    } else {
        (((px - ax) * dx + (py - ay) * dy) / len_sq).clamp(0.0, 1.0)
    };
    let (cx, cy) = (ax + t * dx, ay + t * dy);
    (px - cx).powi(2) + (py - cy).powi(2)
}
