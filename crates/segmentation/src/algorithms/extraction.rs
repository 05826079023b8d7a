use image::{imageops, GrayImage, RgbImage};
use imageproc::contours::{BorderType, Contour};
use tracing::debug;

use crate::{
    algorithms::preprocessing::{adaptive_threshold, to_intensity, validate_block_size},
    error::{Result, SegmentationError},
    pipeline::{attributes, StageContext, Value},
    traits::Processor,
    types::{Parameters, Segment, SegmentTable},
};

/// Turns a page image into candidate segments: one bounding box per
/// connected ink region.
#[derive(Debug, Clone)]
pub struct RawContourSegmenter {
    block_size: u32,
    c: f64,
}

impl RawContourSegmenter {
    pub const NAME: &'static str = "raw_contour";

    pub fn new(block_size: u32, c: f64) -> Result<Self> {
        validate_block_size(block_size)?;
        if !c.is_finite() {
            return Err(SegmentationError::config("c", format!("must be finite, got {c}")));
        }
        Ok(Self { block_size, c })
    }

    pub fn block_size(&self) -> u32 {
        self.block_size
    }

    pub fn c(&self) -> f64 {
        self.c
    }

    /// Binary ink mask of `image`. Works on a grayscale copy; `image` is untouched.
    pub fn binarize(&self, image: &RgbImage) -> Result<GrayImage> {
        adaptive_threshold(&to_intensity(image), self.block_size, self.c)
    }

    /// Bounding boxes of the outer borders of every ink region, in the
    /// order the borders are discovered (raster order of their first pixel).
    pub fn segment(&self, image: &RgbImage) -> Result<SegmentTable> {
        self.extract(image).map(|(segments, _)| segments)
    }

    /// Segments plus the number of borders found, holes included.
    fn extract(&self, image: &RgbImage) -> Result<(SegmentTable, usize)> {
        // Border following needs background all around; ink on the image
        // edge would otherwise be traced as a hole.
        let framed = with_background_frame(&self.binarize(image)?);
        let contours = imageproc::contours::find_contours::<i32>(&framed);
        let total = contours.len();

        let segments: Vec<Segment> = contours
            .iter()
            .filter(|contour| contour.border_type == BorderType::Outer)
            .filter_map(bounding_rect)
            .map(|frame| {
                Segment::new(
                    frame.x.saturating_sub(1),
                    frame.y.saturating_sub(1),
                    frame.width,
                    frame.height,
                )
            })
            .collect();
        debug!(
            contours = total,
            outer = segments.len(),
            "Extracted contours"
        );
        Ok((SegmentTable::from_segments(&segments)?, total))
    }
}

/// Copy of `binary` surrounded by a one pixel background border.
fn with_background_frame(binary: &GrayImage) -> GrayImage {
    let (width, height) = binary.dimensions();
    let mut framed = GrayImage::new(width + 2, height + 2);
    imageops::replace(&mut framed, binary, 1, 1);
    framed
}

impl Default for RawContourSegmenter {
    fn default() -> Self {
        Self {
            block_size: 11,
            c: 10.0,
        }
    }
}

impl Processor for RawContourSegmenter {
    fn name(&self) -> &str {
        Self::NAME
    }

    fn parameters(&self) -> Parameters {
        Parameters::from([
            ("block_size".to_string(), self.block_size.into()),
            ("c".to_string(), self.c.into()),
        ])
    }

    fn process(&self, input: Value, ctx: &mut StageContext<'_>) -> Result<Value> {
        let image = input.into_image(Self::NAME)?;
        let (segments, contours) = self.extract(&image)?;
        ctx.set_attribute(attributes::CONTOURS, Value::Integer(contours as i64));
        Ok(Value::Segments(segments))
    }
}

/// Smallest axis-aligned rectangle holding every point of the contour.
pub fn bounding_rect(contour: &Contour<i32>) -> Option<Segment> {
    let first = contour.points.first()?;
    let (mut min_x, mut min_y, mut max_x, mut max_y) = (first.x, first.y, first.x, first.y);
    for point in &contour.points {
        min_x = min_x.min(point.x);
        min_y = min_y.min(point.y);
        max_x = max_x.max(point.x);
        max_y = max_y.max(point.y);
    }
    Some(Segment::new(
        u32::try_from(min_x).ok()?,
        u32::try_from(min_y).ok()?,
        u32::try_from(max_x - min_x + 1).ok()?,
        u32::try_from(max_y - min_y + 1).ok()?,
    ))
}
