use tracing::debug;

use crate::{
    error::{Result, SegmentationError},
    pipeline::{attributes, StageContext, Value},
    traits::Processor,
    types::{Column, Parameters, SegmentTable},
};

/// Sorts segments in reading order: lines top to bottom, segments left to
/// right within a line.
#[derive(Debug, Clone)]
pub struct SegmentOrderer {
    max_line_height: u32,
}

impl SegmentOrderer {
    pub const NAME: &'static str = "orderer";

    /// `max_line_height` is the fallback grouping tolerance, used when no
    /// upstream stage delivers one.
    pub fn new(max_line_height: u32) -> Self {
        Self { max_line_height }
    }

    pub fn max_line_height(&self) -> u32 {
        self.max_line_height
    }

    fn line_height(&self, ctx: &StageContext<'_>) -> Result<u32> {
        match ctx.attribute(attributes::MAX_LINE_HEIGHT) {
            None => Ok(self.max_line_height),
            Some(value) => {
                let height = value
                    .as_integer()
                    .ok_or_else(|| value.unexpected(Self::NAME, "integer"))?;
                u32::try_from(height).map_err(|_| SegmentationError::UnexpectedInput {
                    stage: Self::NAME.to_string(),
                    expected: "non-negative line height",
                    found: "negative integer",
                })
            }
        }
    }
}

impl Default for SegmentOrderer {
    fn default() -> Self {
        Self::new(20)
    }
}

impl Processor for SegmentOrderer {
    fn name(&self) -> &str {
        Self::NAME
    }

    fn parameters(&self) -> Parameters {
        Parameters::from([("max_line_height".to_string(), self.max_line_height.into())])
    }

    fn process(&self, input: Value, ctx: &mut StageContext<'_>) -> Result<Value> {
        let segments = input.into_segments(Self::NAME)?;
        let line_height = self.line_height(ctx)?;
        debug!(line_height, segments = segments.len(), "Ordering segments");
        Ok(Value::Segments(order_segments(&segments, line_height)))
    }
}

/// Reading order of `segments`.
///
/// Segments are taken top to bottom; one joins the current line while its
/// `y` is less than `max_line_height` below the line's first (topmost)
/// segment, otherwise it starts a new line. Each line is then sorted by `x`,
/// ties keeping their original order.
pub fn order_segments(segments: &SegmentTable, max_line_height: u32) -> SegmentTable {
    let order = group_lines(segments, max_line_height).concat();
    segments.take(&order)
}

/// Row indices of `segments` grouped into lines, in reading order.
pub fn group_lines(segments: &SegmentTable, max_line_height: u32) -> Vec<Vec<usize>> {
    let tolerance = max_line_height.max(1);
    let y = |row: usize| u32::from(segments.value(row, Column::Y));
    let x = |row: usize| segments.value(row, Column::X);

    let mut rows: Vec<usize> = (0..segments.len()).collect();
    rows.sort_by_key(|&row| y(row));

    let mut lines: Vec<Vec<usize>> = Vec::new();
    let mut anchor = 0;
    for row in rows {
        match lines.last_mut() {
            Some(line) if y(row) - anchor < tolerance => line.push(row),
            _ => {
                anchor = y(row);
                lines.push(vec![row]);
            }
        }
    }
    for line in &mut lines {
        line.sort_by_key(|&row| (x(row), row));
    }
    lines
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::pipeline::{RunContext, StageId};

    fn table(tuples: &[(i64, i64, i64, i64)]) -> SegmentTable {
        SegmentTable::from_tuples(tuples).unwrap()
    }

    fn two_lines() -> SegmentTable {
        table(&[(50, 10, 8, 20), (20, 100, 8, 20), (10, 10, 8, 20)])
    }

    #[test]
    fn test_lines_top_to_bottom_left_to_right() {
        let ordered = order_segments(&two_lines(), 90);
        assert_eq!(
            ordered.to_tuples(),
            vec![(10, 10, 8, 20), (50, 10, 8, 20), (20, 100, 8, 20)]
        );
    }

    #[test]
    fn test_uses_delivered_line_height() {
        let orderer = SegmentOrderer::new(1000);
        let id = StageId::next();
        let mut run = RunContext::new();
        run.set(id, attributes::MAX_LINE_HEIGHT, Value::Integer(90));
        let mut ctx = StageContext::new(id, SegmentOrderer::NAME, &mut run);

        let output = orderer.process(two_lines().into(), &mut ctx).unwrap();
        let ordered = output.into_segments("test").unwrap();
        assert_eq!(ordered.get(0).map(|s| s.x), Some(10));
        assert_eq!(ordered.get(2).map(|s| s.y), Some(100));
    }

    #[test]
    fn test_falls_back_to_default_line_height() {
        // Without a delivered height the whole page is one line.
        let orderer = SegmentOrderer::new(1000);
        let id = StageId::next();
        let mut run = RunContext::new();
        let mut ctx = StageContext::new(id, SegmentOrderer::NAME, &mut run);
        let ordered = orderer
            .process(two_lines().into(), &mut ctx)
            .unwrap()
            .into_segments("test")
            .unwrap();
        let xs: Vec<u32> = ordered.iter().map(|s| s.x).collect();
        assert_eq!(xs, vec![10, 20, 50]);
    }

    #[test]
    fn test_negative_line_height_is_rejected() {
        let id = StageId::next();
        let mut run = RunContext::new();
        run.set(id, attributes::MAX_LINE_HEIGHT, Value::Integer(-5));
        let mut ctx = StageContext::new(id, SegmentOrderer::NAME, &mut run);
        let err = SegmentOrderer::default()
            .process(two_lines().into(), &mut ctx)
            .unwrap_err();
        assert!(err.is_programming());
    }

    #[test]
    fn test_ties_keep_original_order() {
        let segments = table(&[(30, 5, 4, 10), (10, 7, 6, 10), (10, 6, 5, 10)]);
        let ordered = order_segments(&segments, 20);
        assert_eq!(
            ordered.to_tuples(),
            vec![(10, 7, 6, 10), (10, 6, 5, 10), (30, 5, 4, 10)]
        );
    }

    #[test]
    fn test_slightly_offset_glyphs_stay_on_their_line() {
        let segments = table(&[(40, 13, 5, 10), (0, 10, 5, 10), (20, 45, 5, 10), (5, 42, 5, 10)]);
        let lines = group_lines(&segments, 30);
        assert_eq!(lines, vec![vec![1, 0], vec![3, 2]]);
    }

    #[test]
    fn test_is_deterministic() {
        let segments = table(&[(5, 5, 3, 9), (5, 5, 3, 9), (1, 40, 3, 9), (9, 6, 3, 9)]);
        let first = order_segments(&segments, 20);
        for _ in 0..5 {
            assert_eq!(order_segments(&segments, 20), first);
        }
    }

    #[test]
    fn test_empty_input() {
        assert!(order_segments(&SegmentTable::empty(), 20).is_empty());
    }
}
