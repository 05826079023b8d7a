use image::{GrayImage, Luma, RgbImage};

use crate::{
    error::{Result, SegmentationError},
    pipeline::{StageContext, Value},
    traits::Processor,
    types::Parameters,
};

/// Gaussian blur applied to the page before segmentation
#[derive(Debug, Clone)]
pub struct BlurProcessor {
    sigma: f32,
}

impl BlurProcessor {
    pub const NAME: &'static str = "blur";

    /// `sigma == 0` disables blurring.
    pub fn new(sigma: f32) -> Result<Self> {
        if !sigma.is_finite() || sigma < 0.0 {
            return Err(SegmentationError::config(
                "blur.sigma",
                format!("must be a finite value >= 0, got {sigma}"),
            ));
        }
        Ok(Self { sigma })
    }

    pub fn sigma(&self) -> f32 {
        self.sigma
    }

    pub fn blur(&self, image: &RgbImage) -> RgbImage {
        if self.sigma == 0.0 || image.width() == 0 || image.height() == 0 {
            return image.clone();
        }
        imageproc::filter::gaussian_blur_f32(image, self.sigma)
    }
}

impl Default for BlurProcessor {
    fn default() -> Self {
        Self { sigma: 1.0 }
    }
}

impl Processor for BlurProcessor {
    fn name(&self) -> &str {
        Self::NAME
    }

    fn parameters(&self) -> Parameters {
        Parameters::from([("sigma".to_string(), self.sigma.into())])
    }

    fn process(&self, input: Value, _ctx: &mut StageContext<'_>) -> Result<Value> {
        let image = input.into_image(Self::NAME)?;
        Ok(Value::Image(self.blur(&image)))
    }
}

/// Single channel intensity copy of a color page.
pub fn to_intensity(image: &RgbImage) -> GrayImage {
    image::imageops::grayscale(image)
}

/// Checks a thresholding neighborhood size: odd and greater than one.
pub fn validate_block_size(block_size: u32) -> Result<()> {
    if block_size <= 1 || block_size % 2 == 0 {
        return Err(SegmentationError::config(
            "block_size",
            format!("must be an odd number greater than 1, got {block_size}"),
        ));
    }
    Ok(())
}

/// Local mean thresholding that marks ink as foreground.
///
/// A pixel becomes foreground (255) when it is at least `c` darker than the
/// mean of the `block_size x block_size` square centered on it. Uneven
/// illumination across a scanned page shifts the local mean, not the
/// decision.
pub fn adaptive_threshold(image: &GrayImage, block_size: u32, c: f64) -> Result<GrayImage> {
    validate_block_size(block_size)?;
    if !c.is_finite() {
        return Err(SegmentationError::config("c", format!("must be finite, got {c}")));
    }

    let (width, height) = image.dimensions();
    let mut binary = GrayImage::new(width, height);
    if width == 0 || height == 0 {
        return Ok(binary);
    }

    let radius = block_size / 2;
    let means = imageproc::filter::box_filter(image, radius, radius);
    for (x, y, pixel) in binary.enumerate_pixels_mut() {
        let value = f64::from(image.get_pixel(x, y)[0]);
        let mean = f64::from(means.get_pixel(x, y)[0]);
        if value <= mean - c {
            *pixel = Luma([255]);
        }
    }
    Ok(binary)
}
