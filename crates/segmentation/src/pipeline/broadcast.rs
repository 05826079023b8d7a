use std::fmt;

use tracing::{debug, trace};

use crate::{
    error::{Result, SegmentationError},
    pipeline::{HookPoint, RunContext, StageId, Value},
    traits::Hook,
};

/// Which value of the hooked stage a broadcast reads.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Source {
    /// The stage's input; only visible to pre-hooks
    Input,
    /// The stage's output; only visible to post-hooks
    Output,
    /// An attribute stored for the stage in the run context
    Attribute(String),
}

impl fmt::Display for Source {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Source::Input => f.write_str("input"),
            Source::Output => f.write_str("output"),
            Source::Attribute(name) => f.write_str(name),
        }
    }
}

/// Maps the broadcast source to the delivered value. `Ok(None)` skips delivery.
pub type Transform = Box<dyn Fn(&Value) -> Result<Option<Value>> + Send + Sync>;

/// Copies a value of one stage into an attribute of other stages.
///
/// Register it as a pre- or post-hook on the source stage. Each time the
/// hook fires it reads `source`, applies the transform and stores the result
/// under `attribute` for every target stage.
pub struct Broadcast {
    source: Source,
    targets: Vec<StageId>,
    attribute: String,
    transform: Option<Transform>,
}

impl Broadcast {
    pub fn new(
        source: Source,
        targets: impl IntoIterator<Item = StageId>,
        attribute: impl Into<String>,
    ) -> Self {
        Self {
            source,
            targets: targets.into_iter().collect(),
            attribute: attribute.into(),
            transform: None,
        }
    }

    pub fn with_transform<F>(mut self, transform: F) -> Self
    where
        F: Fn(&Value) -> Result<Option<Value>> + Send + Sync + 'static,
    {
        self.transform = Some(Box::new(transform));
        self
    }

    pub fn targets(&self) -> &[StageId] {
        &self.targets
    }

    pub fn attribute(&self) -> &str {
        &self.attribute
    }
}

impl fmt::Debug for Broadcast {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Broadcast")
            .field("source", &self.source)
            .field("targets", &self.targets)
            .field("attribute", &self.attribute)
            .field("transform", &self.transform.is_some())
            .finish()
    }
}

impl Hook for Broadcast {
    fn deliver(&self, point: &HookPoint<'_>, run: &mut RunContext) -> Result<()> {
        let source = match &self.source {
            Source::Input => point.input,
            Source::Output => point.output,
            Source::Attribute(name) => run.get(point.stage, name),
        }
        .ok_or_else(|| SegmentationError::MissingAttribute {
            stage: point.name.to_string(),
            attribute: self.source.to_string(),
        })?;

        let value = match &self.transform {
            Some(transform) => transform(source)?,
            None => Some(source.clone()),
        };
        let Some(value) = value else {
            debug!(
                stage = point.name,
                attribute = %self.attribute,
                "Nothing to broadcast for this run"
            );
            return Ok(());
        };

        trace!(
            stage = point.name,
            attribute = %self.attribute,
            targets = self.targets.len(),
            value = %value.summary(),
            "Broadcasting"
        );
        if let Some((last, rest)) = self.targets.split_last() {
            for target in rest {
                run.set(*target, self.attribute.as_str(), value.clone());
            }
            run.set(*last, self.attribute.as_str(), value);
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::SegmentTable;

    fn table(n: usize) -> Value {
        let tuples: Vec<_> = (0..n as i64).map(|i| (i, i, 1, 1)).collect();
        Value::Segments(SegmentTable::from_tuples(&tuples).unwrap())
    }

    #[test]
    fn test_fans_out_to_every_target() {
        let source = StageId::next();
        let targets = [StageId::next(), StageId::next(), StageId::next()];
        let broadcast = Broadcast::new(Source::Input, targets, "image");

        let input = table(2);
        let mut run = RunContext::new();
        let point = HookPoint { stage: source, name: "blur", input: Some(&input), output: None };
        broadcast.deliver(&point, &mut run).unwrap();

        for target in targets {
            assert_eq!(run.get(target, "image"), Some(&input));
        }
        assert_eq!(run.get(source, "image"), None);
    }

    #[test]
    fn test_transform_and_skip() {
        let source = StageId::next();
        let target = StageId::next();
        let count = Broadcast::new(Source::Output, [target], "count").with_transform(|value| {
            let n = value.segments_for("test")?.len();
            Ok((n > 0).then(|| Value::Integer(n as i64)))
        });

        let mut run = RunContext::new();
        let empty = table(0);
        let point = HookPoint { stage: source, name: "contained", input: None, output: Some(&empty) };
        count.deliver(&point, &mut run).unwrap();
        assert_eq!(run.get(target, "count"), None);

        let three = table(3);
        let point = HookPoint { stage: source, name: "contained", input: None, output: Some(&three) };
        count.deliver(&point, &mut run).unwrap();
        assert_eq!(run.get(target, "count"), Some(&Value::Integer(3)));
    }

    #[test]
    fn test_missing_source_is_an_error() {
        let source = StageId::next();
        let broadcast = Broadcast::new(Source::Output, [StageId::next()], "lines");
        let mut run = RunContext::new();
        let input = table(1);
        let point = HookPoint { stage: source, name: "contained", input: Some(&input), output: None };
        let err = broadcast.deliver(&point, &mut run).unwrap_err();
        assert!(matches!(err, SegmentationError::MissingAttribute { .. }));
    }

    #[test]
    fn test_reads_named_attribute() {
        let source = StageId::next();
        let target = StageId::next();
        let mut run = RunContext::new();
        run.set(source, "rejected", table(4));

        let broadcast = Broadcast::new(Source::Attribute("rejected".into()), [target], "seen");
        let point = HookPoint { stage: source, name: "large", input: None, output: None };
        broadcast.deliver(&point, &mut run).unwrap();
        assert_eq!(run.get(target, "seen"), Some(&table(4)));
    }
}
