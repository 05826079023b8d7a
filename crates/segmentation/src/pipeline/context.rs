use std::collections::HashMap;
use std::sync::atomic::{AtomicUsize, Ordering};

use image::RgbImage;

use crate::{
    error::{Result, SegmentationError},
    types::{LineEstimate, SegmentTable},
};

/// Attribute names shared between stages and the hooks that feed them.
pub mod attributes {
    /// The untouched page image, delivered to every filter.
    pub const IMAGE: &str = "image";
    /// Line estimate consumed by the near-line filter.
    pub const LINES: &str = "lines";
    /// Largest distance between consecutive line starts, consumed by the orderer.
    pub const MAX_LINE_HEIGHT: &str = "max_line_height";
    /// Segments a filter discarded during the run.
    pub const REJECTED: &str = "rejected";
    /// Number of borders, outer and hole, the contour segmenter traced.
    pub const CONTOURS: &str = "contours";
}

static NEXT_STAGE_ID: AtomicUsize = AtomicUsize::new(0);

/// Handle to a stage, captured when the stage is added to a stack.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct StageId(usize);

impl StageId {
    pub(crate) fn next() -> Self {
        Self(NEXT_STAGE_ID.fetch_add(1, Ordering::Relaxed))
    }

    pub fn index(self) -> usize {
        self.0
    }
}

/// Data flowing between stages and through broadcasts.
#[derive(Debug, Clone, PartialEq)]
pub enum Value {
    Image(RgbImage),
    Segments(SegmentTable),
    Lines(LineEstimate),
    Integer(i64),
}

impl Value {
    pub fn kind(&self) -> &'static str {
        match self {
            Value::Image(_) => "image",
            Value::Segments(_) => "segments",
            Value::Lines(_) => "lines",
            Value::Integer(_) => "integer",
        }
    }

    /// Short human readable description for logs
    pub fn summary(&self) -> String {
        match self {
            Value::Image(image) => format!("image {}x{}", image.width(), image.height()),
            Value::Segments(table) => format!("{} segments", table.len()),
            Value::Lines(lines) => format!("{} lines", lines.len()),
            Value::Integer(value) => value.to_string(),
        }
    }

    pub fn as_image(&self) -> Option<&RgbImage> {
        match self {
            Value::Image(image) => Some(image),
            _ => None,
        }
    }

    pub fn as_segments(&self) -> Option<&SegmentTable> {
        match self {
            Value::Segments(table) => Some(table),
            _ => None,
        }
    }

    pub fn as_lines(&self) -> Option<&LineEstimate> {
        match self {
            Value::Lines(lines) => Some(lines),
            _ => None,
        }
    }

    pub fn as_integer(&self) -> Option<i64> {
        match self {
            Value::Integer(value) => Some(*value),
            _ => None,
        }
    }

    /// Borrow the segment table or report which stage got the wrong payload.
    pub fn segments_for(&self, stage: &str) -> Result<&SegmentTable> {
        self.as_segments()
            .ok_or_else(|| self.unexpected(stage, "segments"))
    }

    pub fn into_segments(self, stage: &str) -> Result<SegmentTable> {
        match self {
            Value::Segments(table) => Ok(table),
            other => Err(other.unexpected(stage, "segments")),
        }
    }

    pub fn into_image(self, stage: &str) -> Result<RgbImage> {
        match self {
            Value::Image(image) => Ok(image),
            other => Err(other.unexpected(stage, "image")),
        }
    }

    pub(crate) fn unexpected(&self, stage: &str, expected: &'static str) -> SegmentationError {
        SegmentationError::UnexpectedInput {
            stage: stage.to_string(),
            expected,
            found: self.kind(),
        }
    }
}

impl From<RgbImage> for Value {
    fn from(image: RgbImage) -> Self {
        Value::Image(image)
    }
}

impl From<SegmentTable> for Value {
    fn from(table: SegmentTable) -> Self {
        Value::Segments(table)
    }
}

impl From<LineEstimate> for Value {
    fn from(lines: LineEstimate) -> Self {
        Value::Lines(lines)
    }
}

/// Transient state of one pipeline run.
///
/// Every attribute a stage reads or a hook delivers lives here, keyed by the
/// stage it belongs to. A fresh context is created for each run, so nothing
/// computed for one image can be observed while processing the next.
#[derive(Debug, Default)]
pub struct RunContext {
    attributes: HashMap<StageId, HashMap<String, Value>>,
}

impl RunContext {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn set(&mut self, stage: StageId, attribute: impl Into<String>, value: Value) {
        self.attributes
            .entry(stage)
            .or_default()
            .insert(attribute.into(), value);
    }

    pub fn get(&self, stage: StageId, attribute: &str) -> Option<&Value> {
        self.attributes.get(&stage)?.get(attribute)
    }

    /// Attribute names currently held for `stage`, sorted.
    pub fn attribute_names(&self, stage: StageId) -> Vec<&str> {
        let mut names: Vec<&str> = self
            .attributes
            .get(&stage)
            .map(|values| values.keys().map(String::as_str).collect())
            .unwrap_or_default();
        names.sort_unstable();
        names
    }
}

/// A stage's view of the run while its `process` executes.
pub struct StageContext<'a> {
    id: StageId,
    name: &'a str,
    run: &'a mut RunContext,
}

impl<'a> StageContext<'a> {
    pub fn new(id: StageId, name: &'a str, run: &'a mut RunContext) -> Self {
        Self { id, name, run }
    }

    pub fn id(&self) -> StageId {
        self.id
    }

    pub fn name(&self) -> &str {
        self.name
    }

    /// Value delivered to this stage under `attribute`, if any.
    pub fn attribute(&self, attribute: &str) -> Option<&Value> {
        self.run.get(self.id, attribute)
    }

    pub fn require(&self, attribute: &str) -> Result<&Value> {
        self.attribute(attribute)
            .ok_or_else(|| SegmentationError::MissingAttribute {
                stage: self.name.to_string(),
                attribute: attribute.to_string(),
            })
    }

    pub fn set_attribute(&mut self, attribute: impl Into<String>, value: Value) {
        self.run.set(self.id, attribute, value);
    }

    /// The whole run, for stages that drive other stages.
    pub fn run_mut(&mut self) -> &mut RunContext {
        &mut *self.run
    }
}

/// What a hook sees of the stage it is attached to.
pub struct HookPoint<'a> {
    pub stage: StageId,
    pub name: &'a str,
    /// Set for pre-hooks
    pub input: Option<&'a Value>,
    /// Set for post-hooks
    pub output: Option<&'a Value>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_stage_ids_are_unique() {
        let a = StageId::next();
        let b = StageId::next();
        assert_ne!(a, b);
    }

    #[test]
    fn test_attributes_are_scoped_per_stage() {
        let (a, b) = (StageId::next(), StageId::next());
        let mut run = RunContext::new();
        run.set(a, attributes::MAX_LINE_HEIGHT, Value::Integer(42));

        assert_eq!(run.get(a, attributes::MAX_LINE_HEIGHT), Some(&Value::Integer(42)));
        assert_eq!(run.get(b, attributes::MAX_LINE_HEIGHT), None);
        assert_eq!(run.attribute_names(a), vec![attributes::MAX_LINE_HEIGHT]);
    }

    #[test]
    fn test_stage_context_require() {
        let id = StageId::next();
        let mut run = RunContext::new();
        let mut ctx = StageContext::new(id, "orderer", &mut run);
        let err = ctx.require(attributes::LINES).unwrap_err();
        assert!(matches!(err, SegmentationError::MissingAttribute { .. }));
        assert!(err.is_programming());

        ctx.set_attribute(attributes::LINES, LineEstimate::default().into());
        assert!(ctx.require(attributes::LINES).is_ok());
    }

    #[test]
    fn test_value_conversions() {
        let value = Value::from(SegmentTable::empty());
        assert_eq!(value.kind(), "segments");
        assert!(value.as_image().is_none());

        let err = value.into_image("blur").unwrap_err();
        assert!(matches!(
            err,
            SegmentationError::UnexpectedInput { expected: "image", found: "segments", .. }
        ));
    }
}
