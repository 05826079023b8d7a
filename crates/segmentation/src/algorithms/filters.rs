//! Geometric filters that prune candidate segments.
//!
//! Every filter answers "keep or drop" per segment, so no filter can ever add
//! segments: the count is non-increasing across the chain.

use tracing::debug;

use crate::{
    algorithms::lines::guess_line_starts_ends_and_middles,
    error::{Result, SegmentationError},
    pipeline::{attributes, StageContext, Value},
    traits::{Processor, SegmentFilter},
    types::{Parameters, SegmentTable},
};

/// Runs a [`SegmentFilter`] as a pipeline stage.
///
/// The discarded rows are stored as the stage's `rejected` attribute.
#[derive(Debug, Clone, Default)]
pub struct FilterStage<F> {
    filter: F,
}

impl<F: SegmentFilter> FilterStage<F> {
    pub fn new(filter: F) -> Self {
        Self { filter }
    }

    pub fn filter(&self) -> &F {
        &self.filter
    }
}

impl<F: SegmentFilter> Processor for FilterStage<F> {
    fn name(&self) -> &str {
        self.filter.name()
    }

    fn parameters(&self) -> Parameters {
        self.filter.parameters()
    }

    fn process(&self, input: Value, ctx: &mut StageContext<'_>) -> Result<Value> {
        let segments = input.into_segments(self.filter.name())?;
        let mask = self.filter.good_segments(&segments, ctx)?;
        if mask.len() != segments.len() {
            return Err(SegmentationError::FilterMaskMismatch {
                stage: self.filter.name().to_string(),
                mask_len: mask.len(),
                segment_count: segments.len(),
            });
        }

        let kept = segments.select(&mask);
        let inverse: Vec<bool> = mask.iter().map(|keep| !keep).collect();
        let rejected = segments.select(&inverse);
        debug_assert_eq!(kept.len() + rejected.len(), segments.len());
        debug!(
            filter = self.filter.name(),
            kept = kept.len(),
            rejected = rejected.len(),
            "Filtered segments"
        );

        ctx.set_attribute(attributes::REJECTED, Value::Segments(rejected));
        Ok(Value::Segments(kept))
    }
}

/// Drops segments too thin or too short to be glyphs
#[derive(Debug, Clone)]
pub struct LargeFilter {
    pub min_width: u32,
    pub min_height: u32,
}

impl Default for LargeFilter {
    fn default() -> Self {
        Self {
            min_width: 4,
            min_height: 8,
        }
    }
}

impl SegmentFilter for LargeFilter {
    fn name(&self) -> &str {
        "large"
    }

    fn parameters(&self) -> Parameters {
        Parameters::from([
            ("min_width".to_string(), self.min_width.into()),
            ("min_height".to_string(), self.min_height.into()),
        ])
    }

    fn good_segments(&self, segments: &SegmentTable, _ctx: &StageContext<'_>) -> Result<Vec<bool>> {
        Ok(segments
            .iter()
            .map(|s| s.width >= self.min_width && s.height >= self.min_height)
            .collect())
    }
}

/// Drops segments too wide or too tall to be glyphs (pictures, rules, frames)
#[derive(Debug, Clone)]
pub struct SmallFilter {
    pub max_width: u32,
    pub max_height: u32,
}

impl Default for SmallFilter {
    fn default() -> Self {
        Self {
            max_width: 30,
            max_height: 50,
        }
    }
}

impl SegmentFilter for SmallFilter {
    fn name(&self) -> &str {
        "small"
    }

    fn parameters(&self) -> Parameters {
        Parameters::from([
            ("max_width".to_string(), self.max_width.into()),
            ("max_height".to_string(), self.max_height.into()),
        ])
    }

    fn good_segments(&self, segments: &SegmentTable, _ctx: &StageContext<'_>) -> Result<Vec<bool>> {
        Ok(segments
            .iter()
            .map(|s| s.width <= self.max_width && s.height <= self.max_height)
            .collect())
    }
}

/// Drops segments whose area is below `min_area`
#[derive(Debug, Clone)]
pub struct LargeAreaFilter {
    pub min_area: u32,
}

impl Default for LargeAreaFilter {
    fn default() -> Self {
        Self { min_area: 45 }
    }
}

impl SegmentFilter for LargeAreaFilter {
    fn name(&self) -> &str {
        "large_area"
    }

    fn parameters(&self) -> Parameters {
        Parameters::from([("min_area".to_string(), self.min_area.into())])
    }

    fn good_segments(&self, segments: &SegmentTable, _ctx: &StageContext<'_>) -> Result<Vec<bool>> {
        Ok(segments.iter().map(|s| s.area() >= u64::from(self.min_area)).collect())
    }
}

/// Drops segments lying inside another segment.
///
/// Of several identical segments only the first one is kept.
#[derive(Debug, Clone, Default)]
pub struct ContainedFilter;

impl SegmentFilter for ContainedFilter {
    fn name(&self) -> &str {
        "contained"
    }

    fn good_segments(&self, segments: &SegmentTable, _ctx: &StageContext<'_>) -> Result<Vec<bool>> {
        let all = segments.to_segments();
        Ok(all
            .iter()
            .enumerate()
            .map(|(i, inner)| {
                !all.iter().enumerate().any(|(j, outer)| {
                    i != j && outer.contains(inner) && (outer != inner || j < i)
                })
            })
            .collect())
    }
}

/// Drops segments whose top is far from every estimated line boundary.
///
/// Distances are measured from each segment's `y` to the closest line start,
/// end or middle. A segment is an outlier when its distance exceeds
/// `mean + nearline_tolerance * stddev` of all distances.
///
/// The line estimate is read from the stage's `lines` attribute; when nothing
/// delivered one, it is estimated from the input itself using `line_gap`.
#[derive(Debug, Clone)]
pub struct NearLineFilter {
    pub nearline_tolerance: f64,
    pub line_gap: u32,
}

impl Default for NearLineFilter {
    fn default() -> Self {
        Self {
            nearline_tolerance: 5.0,
            line_gap: 0,
        }
    }
}

impl SegmentFilter for NearLineFilter {
    fn name(&self) -> &str {
        "near_line"
    }

    fn parameters(&self) -> Parameters {
        Parameters::from([
            ("nearline_tolerance".to_string(), self.nearline_tolerance.into()),
            ("line_gap".to_string(), self.line_gap.into()),
        ])
    }

    fn good_segments(&self, segments: &SegmentTable, ctx: &StageContext<'_>) -> Result<Vec<bool>> {
        let coordinates = match ctx.attribute(attributes::LINES) {
            Some(value) => value
                .as_lines()
                .ok_or_else(|| value.unexpected(self.name(), "lines"))?
                .coordinates(),
            None => {
                debug!("No line estimate delivered, estimating from input");
                guess_line_starts_ends_and_middles(segments, self.line_gap).coordinates()
            }
        };
        if coordinates.is_empty() || segments.is_empty() {
            return Ok(vec![true; segments.len()]);
        }

        let distances: Vec<f64> = segments
            .iter()
            .map(|segment| {
                coordinates
                    .iter()
                    .map(|&line| segment.y.abs_diff(line))
                    .min()
                    .unwrap_or(0) as f64
            })
            .collect();
        let n = distances.len() as f64;
        let mean = distances.iter().sum::<f64>() / n;
        let variance = distances.iter().map(|d| (d - mean).powi(2)).sum::<f64>() / n;
        let limit = mean + self.nearline_tolerance * variance.sqrt();

        Ok(distances.iter().map(|&distance| distance <= limit).collect())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::pipeline::{RunContext, StageId};
    use crate::types::{LineBand, LineEstimate, Segment};

    fn table(tuples: &[(i64, i64, i64, i64)]) -> SegmentTable {
        SegmentTable::from_tuples(tuples).unwrap()
    }

    fn run_filter<F: SegmentFilter>(filter: F, segments: &SegmentTable, lines: Option<LineEstimate>) -> SegmentTable {
        let stage = FilterStage::new(filter);
        let mut run = RunContext::new();
        let id = StageId::next();
        if let Some(lines) = lines {
            run.set(id, attributes::LINES, lines.into());
        }
        let mut ctx = StageContext::new(id, stage.name(), &mut run);
        stage
            .process(segments.clone().into(), &mut ctx)
            .expect("filter should succeed")
            .into_segments("test")
            .unwrap()
    }

    fn candidates() -> SegmentTable {
        table(&[
            (0, 0, 2, 2),
            (10, 10, 10, 20),
            (50, 0, 200, 300),
            (12, 12, 4, 4),
            (30, 10, 10, 20),
            (30, 10, 10, 20),
            (80, 11, 3, 9),
        ])
    }

    #[test]
    fn test_large_filter() {
        let kept = run_filter(LargeFilter::default(), &candidates(), None);
        assert_eq!(kept.len(), 4);
        assert!(kept.iter().all(|s| s.width >= 4 && s.height >= 8));
    }

    #[test]
    fn test_small_filter() {
        let kept = run_filter(SmallFilter::default(), &candidates(), None);
        assert!(!kept.iter().any(|s| s == Segment::new(50, 0, 200, 300)));
        assert_eq!(kept.len(), 6);
    }

    #[test]
    fn test_large_area_filter() {
        let kept = run_filter(LargeAreaFilter { min_area: 27 }, &candidates(), None);
        assert_eq!(kept.len(), 5);
    }

    #[test]
    fn test_contained_filter() {
        let kept = run_filter(ContainedFilter, &candidates(), None).to_segments();
        assert_eq!(
            kept,
            vec![
                Segment::new(0, 0, 2, 2),
                Segment::new(10, 10, 10, 20),
                Segment::new(50, 0, 200, 300),
                Segment::new(30, 10, 10, 20),
            ]
        );
    }

    #[test]
    fn test_every_filter_is_monotonic() {
        let input = candidates();
        let lines = LineEstimate::new(vec![LineBand { start: 10, end: 30, middle: 20 }]);
        let counts = [
            run_filter(LargeFilter::default(), &input, None).len(),
            run_filter(SmallFilter::default(), &input, None).len(),
            run_filter(LargeAreaFilter::default(), &input, None).len(),
            run_filter(ContainedFilter, &input, None).len(),
            run_filter(NearLineFilter::default(), &input, Some(lines)).len(),
        ];
        for count in counts {
            assert!(count <= input.len());
        }
    }

    #[test]
    fn test_filters_accept_empty_tables() {
        let empty = SegmentTable::empty();
        assert!(run_filter(LargeFilter::default(), &empty, None).is_empty());
        assert!(run_filter(ContainedFilter, &empty, None).is_empty());
        assert!(run_filter(NearLineFilter::default(), &empty, Some(LineEstimate::default())).is_empty());
        assert!(run_filter(NearLineFilter::default(), &empty, None).is_empty());
    }

    #[test]
    fn test_near_line_drops_outliers() {
        let mut tuples: Vec<(i64, i64, i64, i64)> = (0..9).map(|i| (i * 12, 10, 8, 20)).collect();
        tuples.push((200, 200, 8, 20));
        let segments = table(&tuples);
        let lines = LineEstimate::new(vec![LineBand { start: 10, end: 30, middle: 20 }]);

        let strict = NearLineFilter { nearline_tolerance: 1.0, line_gap: 0 };
        let kept = run_filter(strict, &segments, Some(lines.clone()));
        assert_eq!(kept.len(), 9);
        assert!(kept.iter().all(|s| s.y == 10));

        let lenient = NearLineFilter::default();
        assert_eq!(run_filter(lenient, &segments, Some(lines)).len(), 10);
    }

    #[test]
    fn test_near_line_without_lines_keeps_everything() {
        let segments = table(&[(0, 0, 5, 10), (0, 500, 5, 10)]);
        let kept = run_filter(NearLineFilter::default(), &segments, Some(LineEstimate::default()));
        assert_eq!(kept, segments);
    }

    #[test]
    fn test_rejected_rows_are_recorded() {
        let stage = FilterStage::new(LargeFilter::default());
        let mut run = RunContext::new();
        let id = StageId::next();
        let mut ctx = StageContext::new(id, stage.name(), &mut run);
        stage.process(candidates().into(), &mut ctx).unwrap();

        let rejected = run.get(id, attributes::REJECTED).and_then(Value::as_segments).unwrap();
        assert_eq!(
            rejected.to_segments(),
            vec![Segment::new(0, 0, 2, 2), Segment::new(12, 12, 4, 4), Segment::new(80, 11, 3, 9)]
        );
    }

    struct Broken;

    impl SegmentFilter for Broken {
        fn name(&self) -> &str {
            "broken"
        }

        fn good_segments(&self, _segments: &SegmentTable, _ctx: &StageContext<'_>) -> Result<Vec<bool>> {
            Ok(vec![true])
        }
    }

    #[test]
    fn test_mask_length_is_checked() {
        let stage = FilterStage::new(Broken);
        let mut run = RunContext::new();
        let mut ctx = StageContext::new(StageId::next(), "broken", &mut run);
        let err = stage.process(candidates().into(), &mut ctx).unwrap_err();
        assert!(matches!(err, SegmentationError::FilterMaskMismatch { mask_len: 1, segment_count: 7, .. }));
    }
}
