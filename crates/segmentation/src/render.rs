//! Headless rendering of segmentation results for inspection.

use image::{imageops, Rgb, RgbImage};
use imageproc::{drawing::draw_hollow_rect_mut, rect::Rect};

use crate::types::{Segment, SegmentTable};

pub const OVERLAY_COLOR: Rgb<u8> = Rgb([220, 30, 30]);

/// Copy of `image` with an outline drawn around every segment.
/// Degenerate segments are skipped.
pub fn draw_segments(image: &RgbImage, segments: &SegmentTable, color: Rgb<u8>) -> RgbImage {
    let mut canvas = image.clone();
    for segment in segments.iter().filter(|segment| !segment.is_degenerate()) {
        let rect = Rect::at(segment.x as i32, segment.y as i32).of_size(segment.width, segment.height);
        draw_hollow_rect_mut(&mut canvas, rect, color);
    }
    canvas
}

/// Pixels of `image` covered by `segment`, clamped to the image bounds.
///
/// `None` when nothing of the segment lies inside the image.
pub fn region_from_segment(image: &RgbImage, segment: Segment) -> Option<RgbImage> {
    let (width, height) = image.dimensions();
    if segment.x >= width || segment.y >= height {
        return None;
    }
    let crop_width = segment.width.min(width - segment.x);
    let crop_height = segment.height.min(height - segment.y);
    if crop_width == 0 || crop_height == 0 {
        return None;
    }
    Some(imageops::crop_imm(image, segment.x, segment.y, crop_width, crop_height).to_image())
}
