use image::RgbImage;
use tracing::{debug, info};

use crate::{
    algorithms::{
        guess_line_starts, guess_line_starts_ends_and_middles, max_line_height, BlurProcessor,
        ContainedFilter, FilterStage, LargeAreaFilter, LargeFilter, NearLineFilter,
        RawContourSegmenter, SegmentOrderer, SmallFilter,
    },
    config::SegmenterConfig,
    error::Result,
    pipeline::{attributes, Broadcast, ProcessorStack, RunContext, Source, StageContext, StageId, Value},
    traits::Processor,
    types::{Parameters, SegmentTable},
};

/// Handles of the stages of a [`ContourSegmenter`], for inspecting a run.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StageHandles {
    pub blur: StageId,
    pub raw: StageId,
    /// Every filter stage in chain order; the near-line filter is last.
    pub filters: Vec<StageId>,
    pub near_line: StageId,
    pub orderer: StageId,
}

/// Result of segmenting one page.
#[derive(Debug)]
pub struct SegmentationRun {
    /// Segments in reading order
    pub segments: SegmentTable,
    /// Everything stages and broadcasts stored during the run
    pub context: RunContext,
}

impl SegmentationRun {
    pub fn attribute(&self, stage: StageId, name: &str) -> Option<&Value> {
        self.context.get(stage, name)
    }
}

/// The contour based segmentation pipeline.
///
/// blur -> raw contours -> large -> small -> large area -> contained ->
/// near line -> orderer, with three broadcasts wired between them:
///
/// - the page as given to the blur stage goes to every filter's `image`;
/// - the line estimate of the contained filter's output goes to the near-line
///   filter's `lines`;
/// - the largest line start spacing of that same output goes to the orderer's
///   `max_line_height`, unless fewer than two lines were found.
pub struct ContourSegmenter {
    stack: ProcessorStack,
    handles: StageHandles,
}

impl ContourSegmenter {
    pub const NAME: &'static str = "contour_segmenter";

    pub fn new(config: &SegmenterConfig) -> Result<Self> {
        config.validate()?;

        let mut stack = ProcessorStack::new(Self::NAME);
        let blur = stack.push(BlurProcessor::new(config.blur.sigma)?)?;
        let raw = stack.push(RawContourSegmenter::new(
            config.raw_contour.block_size,
            config.raw_contour.c,
        )?)?;
        let large = stack.push(FilterStage::new(LargeFilter {
            min_width: config.large.min_width,
            min_height: config.large.min_height,
        }))?;
        let small = stack.push(FilterStage::new(SmallFilter {
            max_width: config.small.max_width,
            max_height: config.small.max_height,
        }))?;
        let large_area = stack.push(FilterStage::new(LargeAreaFilter {
            min_area: config.large_area.min_area,
        }))?;
        let contained = stack.push(FilterStage::new(ContainedFilter))?;
        let near_line = stack.push(FilterStage::new(NearLineFilter {
            nearline_tolerance: config.near_line.nearline_tolerance,
            line_gap: config.near_line.line_gap,
        }))?;
        let orderer = stack.push(SegmentOrderer::new(config.orderer.max_line_height))?;
        let filters = vec![large, small, large_area, contained, near_line];

        stack.add_pre_hook(
            blur,
            Broadcast::new(Source::Input, filters.iter().copied(), attributes::IMAGE),
        )?;

        let line_gap = config.near_line.line_gap;
        stack.add_post_hook(
            contained,
            Broadcast::new(Source::Output, [near_line], attributes::LINES).with_transform(
                move |value| {
                    let segments = value.segments_for("contained")?;
                    Ok(Some(Value::Lines(guess_line_starts_ends_and_middles(
                        segments, line_gap,
                    ))))
                },
            ),
        )?;
        stack.add_post_hook(
            contained,
            Broadcast::new(Source::Output, [orderer], attributes::MAX_LINE_HEIGHT).with_transform(
                move |value| {
                    let starts = guess_line_starts(value.segments_for("contained")?, line_gap);
                    Ok(max_line_height(&starts).map(|height| Value::Integer(height.into())))
                },
            ),
        )?;

        debug!("{}", stack.info());
        Ok(Self {
            stack,
            handles: StageHandles {
                blur,
                raw,
                filters,
                near_line,
                orderer,
            },
        })
    }

    /// Segment one page. `image` is left untouched.
    pub fn segment(&self, image: &RgbImage) -> Result<SegmentationRun> {
        let (output, context) = self.stack.run(Value::Image(image.clone()))?;
        let segments = output.into_segments(Self::NAME)?;
        info!(
            width = image.width(),
            height = image.height(),
            segments = segments.len(),
            "Segmented page"
        );
        Ok(SegmentationRun { segments, context })
    }

    pub fn handles(&self) -> &StageHandles {
        &self.handles
    }

    pub fn stage_names(&self) -> Vec<&str> {
        self.stack.stage_names()
    }

    pub fn info(&self) -> String {
        self.stack.info()
    }
}

impl Processor for ContourSegmenter {
    fn name(&self) -> &str {
        Self::NAME
    }

    /// The merged `stage.parameter` surface of the whole pipeline.
    fn parameters(&self) -> Parameters {
        self.stack.parameters()
    }

    fn process(&self, input: Value, ctx: &mut StageContext<'_>) -> Result<Value> {
        self.stack.process(input, ctx)
    }
}

/// A ready to run segmenter for `image`.
///
/// Every page currently gets the default contour segmenter.
pub fn best_segmenter(_image: &RgbImage) -> Result<ContourSegmenter> {
    ContourSegmenter::new(&SegmenterConfig::default())
}
