pub mod broadcast;
pub mod builder;
pub mod context;

pub use broadcast::{Broadcast, Source, Transform};
pub use builder::{ContourSegmenter, SegmentationRun, StageHandles};
pub use context::{attributes, HookPoint, RunContext, StageContext, StageId, Value};

use tracing::debug;

use crate::{
    error::{Result, SegmentationError},
    traits::{Hook, Processor},
    types::Parameters,
};

/// A stage inside a stack, together with the hooks wrapped around it.
struct StageSlot {
    id: StageId,
    processor: Box<dyn Processor>,
    pre_hooks: Vec<Box<dyn Hook>>,
    post_hooks: Vec<Box<dyn Hook>>,
}

impl StageSlot {
    fn run(&self, input: Value, run: &mut RunContext) -> Result<Value> {
        let name = self.processor.name();
        let _span = tracing::debug_span!("stage", name).entered();

        let point = HookPoint {
            stage: self.id,
            name,
            input: Some(&input),
            output: None,
        };
        for hook in &self.pre_hooks {
            hook.deliver(&point, run)?;
        }

        debug!(input = %input.summary(), "Processing");
        let output = {
            let mut ctx = StageContext::new(self.id, name, run);
            self.processor.process(input, &mut ctx)?
        };
        debug!(output = %output.summary(), "Processed");

        let point = HookPoint {
            stage: self.id,
            name,
            input: None,
            output: Some(&output),
        };
        for hook in &self.post_hooks {
            hook.deliver(&point, run)?;
        }
        Ok(output)
    }
}

/// An ordered chain of processors that behaves as a single processor.
///
/// Each stage's output is the next stage's input. The first failure aborts
/// the rest of the chain.
pub struct ProcessorStack {
    id: StageId,
    name: String,
    slots: Vec<StageSlot>,
}

impl ProcessorStack {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            id: StageId::next(),
            name: name.into(),
            slots: Vec::new(),
        }
    }

    /// Append a stage and return the handle used to wire hooks to it.
    pub fn push<P>(&mut self, processor: P) -> Result<StageId>
    where
        P: Processor + 'static,
    {
        self.push_boxed(Box::new(processor))
    }

    pub fn push_boxed(&mut self, processor: Box<dyn Processor>) -> Result<StageId> {
        if self.slots.iter().any(|slot| slot.processor.name() == processor.name()) {
            return Err(SegmentationError::DuplicateStage(processor.name().to_string()));
        }
        let id = StageId::next();
        self.slots.push(StageSlot {
            id,
            processor,
            pre_hooks: Vec::new(),
            post_hooks: Vec::new(),
        });
        Ok(id)
    }

    /// Run `hook` right before `stage` processes its input.
    pub fn add_pre_hook<H>(&mut self, stage: StageId, hook: H) -> Result<()>
    where
        H: Hook + 'static,
    {
        self.slot_mut(stage)?.pre_hooks.push(Box::new(hook));
        Ok(())
    }

    /// Run `hook` right after `stage` produced its output.
    pub fn add_post_hook<H>(&mut self, stage: StageId, hook: H) -> Result<()>
    where
        H: Hook + 'static,
    {
        self.slot_mut(stage)?.post_hooks.push(Box::new(hook));
        Ok(())
    }

    fn slot_mut(&mut self, stage: StageId) -> Result<&mut StageSlot> {
        let stack = &self.name;
        self.slots
            .iter_mut()
            .find(|slot| slot.id == stage)
            .ok_or_else(|| SegmentationError::UnknownStage {
                stack: stack.clone(),
                stage: stage.index(),
            })
    }

    pub fn id(&self) -> StageId {
        self.id
    }

    pub fn len(&self) -> usize {
        self.slots.len()
    }

    pub fn is_empty(&self) -> bool {
        self.slots.is_empty()
    }

    pub fn stage_ids(&self) -> Vec<StageId> {
        self.slots.iter().map(|slot| slot.id).collect()
    }

    pub fn stage_names(&self) -> Vec<&str> {
        self.slots.iter().map(|slot| slot.processor.name()).collect()
    }

    /// Run the whole stack on `input` with a fresh run context.
    pub fn run(&self, input: Value) -> Result<(Value, RunContext)> {
        let mut run = RunContext::new();
        let output = {
            let mut ctx = StageContext::new(self.id, &self.name, &mut run);
            self.process(input, &mut ctx)?
        };
        Ok((output, run))
    }

    /// Get information about the stack configuration
    pub fn info(&self) -> String {
        let hooks: usize = self
            .slots
            .iter()
            .map(|slot| slot.pre_hooks.len() + slot.post_hooks.len())
            .sum();
        format!(
            "Stack '{}': {} stages [{}], {} hooks",
            self.name,
            self.slots.len(),
            self.stage_names().join(" -> "),
            hooks
        )
    }
}

impl Processor for ProcessorStack {
    fn name(&self) -> &str {
        &self.name
    }

    /// Parameters of all member stages, qualified as `stage.parameter`.
    fn parameters(&self) -> Parameters {
        self.slots
            .iter()
            .flat_map(|slot| {
                let stage = slot.processor.name();
                slot.processor
                    .parameters()
                    .into_iter()
                    .map(move |(key, value)| (format!("{stage}.{key}"), value))
            })
            .collect()
    }

    fn process(&self, input: Value, ctx: &mut StageContext<'_>) -> Result<Value> {
        let mut value = input;
        for slot in &self.slots {
            value = slot.run(value, ctx.run_mut())?;
        }
        Ok(value)
    }
}

#[cfg(test)]
mod tests {
    use std::sync::{Arc, Mutex};

    use super::*;
    use crate::types::{ParamValue, SegmentTable};

    /// Appends a segment at `x = offset` to its input table.
    struct Append {
        name: String,
        offset: i64,
    }

    impl Append {
        fn new(name: &str, offset: i64) -> Self {
            Self { name: name.to_string(), offset }
        }
    }

    impl Processor for Append {
        fn name(&self) -> &str {
            &self.name
        }

        fn parameters(&self) -> Parameters {
            Parameters::from([("offset".to_string(), ParamValue::Integer(self.offset))])
        }

        fn process(&self, input: Value, _ctx: &mut StageContext<'_>) -> Result<Value> {
            let mut tuples = input.into_segments(&self.name)?.to_tuples();
            tuples.push((self.offset, 0, 1, 1));
            Ok(SegmentTable::from_tuples(&tuples)?.into())
        }
    }

    struct Fail;

    impl Processor for Fail {
        fn name(&self) -> &str {
            "fail"
        }

        fn process(&self, input: Value, _ctx: &mut StageContext<'_>) -> Result<Value> {
            Err(input.unexpected("fail", "image"))
        }
    }

    /// Records `label` every time it fires.
    struct Record {
        label: &'static str,
        log: Arc<Mutex<Vec<&'static str>>>,
    }

    impl Hook for Record {
        fn deliver(&self, _point: &HookPoint<'_>, _run: &mut RunContext) -> Result<()> {
            self.log.lock().expect("log lock").push(self.label);
            Ok(())
        }
    }

    fn xs(value: &Value) -> Vec<i64> {
        value
            .as_segments()
            .expect("segments")
            .to_tuples()
            .into_iter()
            .map(|(x, ..)| x)
            .collect()
    }

    #[test]
    fn test_threads_output_to_next_input() {
        let mut stack = ProcessorStack::new("stack");
        stack.push(Append::new("a", 1)).unwrap();
        stack.push(Append::new("b", 2)).unwrap();
        stack.push(Append::new("c", 3)).unwrap();

        let (output, _) = stack.run(SegmentTable::empty().into()).unwrap();
        assert_eq!(xs(&output), vec![1, 2, 3]);
    }

    #[test]
    fn test_empty_stack_is_identity() {
        let stack = ProcessorStack::new("empty");
        let input: Value = SegmentTable::from_tuples(&[(5, 5, 5, 5)]).unwrap().into();
        let (output, _) = stack.run(input.clone()).unwrap();
        assert_eq!(output, input);
    }

    #[test]
    fn test_nested_stacks_compose() {
        let mut inner = ProcessorStack::new("inner");
        inner.push(Append::new("b", 2)).unwrap();
        inner.push(Append::new("c", 3)).unwrap();

        let mut outer = ProcessorStack::new("outer");
        outer.push(Append::new("a", 1)).unwrap();
        outer.push(inner).unwrap();

        let (output, _) = outer.run(SegmentTable::empty().into()).unwrap();
        assert_eq!(xs(&output), vec![1, 2, 3]);

        let params = outer.parameters();
        assert_eq!(params.get("a.offset"), Some(&ParamValue::Integer(1)));
        assert_eq!(params.get("inner.c.offset"), Some(&ParamValue::Integer(3)));
    }

    #[test]
    fn test_failure_aborts_remaining_stages() {
        let log = Arc::new(Mutex::new(Vec::new()));
        let mut stack = ProcessorStack::new("stack");
        stack.push(Append::new("a", 1)).unwrap();
        let fail = stack.push(Fail).unwrap();
        let after = stack.push(Append::new("b", 2)).unwrap();
        stack
            .add_post_hook(fail, Record { label: "after fail", log: log.clone() })
            .unwrap();
        stack
            .add_pre_hook(after, Record { label: "before b", log: log.clone() })
            .unwrap();

        let err = stack.run(SegmentTable::empty().into()).unwrap_err();
        assert!(err.is_programming());
        assert!(log.lock().unwrap().is_empty());
    }

    #[test]
    fn test_hooks_run_in_registration_order() {
        let log = Arc::new(Mutex::new(Vec::new()));
        let mut stack = ProcessorStack::new("stack");
        let a = stack.push(Append::new("a", 1)).unwrap();
        let b = stack.push(Append::new("b", 2)).unwrap();
        for (stage, label, pre) in [
            (a, "a pre 1", true),
            (a, "a post", false),
            (a, "a pre 2", true),
            (b, "b pre", true),
            (b, "b post 1", false),
            (b, "b post 2", false),
        ] {
            let hook = Record { label, log: log.clone() };
            if pre {
                stack.add_pre_hook(stage, hook).unwrap();
            } else {
                stack.add_post_hook(stage, hook).unwrap();
            }
        }

        stack.run(SegmentTable::empty().into()).unwrap();
        assert_eq!(
            *log.lock().unwrap(),
            vec!["a pre 1", "a pre 2", "a post", "b pre", "b post 1", "b post 2"]
        );
    }

    #[test]
    fn test_duplicate_and_unknown_stages_are_rejected() {
        let mut stack = ProcessorStack::new("stack");
        stack.push(Append::new("a", 1)).unwrap();
        let err = stack.push(Append::new("a", 2)).unwrap_err();
        assert!(matches!(err, SegmentationError::DuplicateStage(name) if name == "a"));

        let other = ProcessorStack::new("other").id();
        let broadcast = Broadcast::new(Source::Output, [other], "x");
        assert!(stack.add_post_hook(other, broadcast).is_err());
    }

    #[test]
    fn test_broadcast_between_stages() {
        let mut stack = ProcessorStack::new("stack");
        let a = stack.push(Append::new("a", 1)).unwrap();
        let b = stack.push(Append::new("b", 2)).unwrap();
        stack
            .add_post_hook(a, Broadcast::new(Source::Output, [b], "from_a"))
            .unwrap();

        let (_, run) = stack.run(SegmentTable::empty().into()).unwrap();
        let delivered = run.get(b, "from_a").expect("delivered");
        assert_eq!(xs(delivered), vec![1]);
    }

    #[test]
    fn test_each_run_starts_clean() {
        let mut stack = ProcessorStack::new("stack");
        let a = stack.push(Append::new("a", 1)).unwrap();
        let b = stack.push(Append::new("b", 2)).unwrap();
        stack
            .add_pre_hook(a, Broadcast::new(Source::Input, [b], "seen"))
            .unwrap();

        let first: Value = SegmentTable::from_tuples(&[(9, 9, 9, 9)]).unwrap().into();
        let (_, run) = stack.run(first.clone()).unwrap();
        assert_eq!(run.get(b, "seen"), Some(&first));

        let second: Value = SegmentTable::empty().into();
        let (_, run) = stack.run(second.clone()).unwrap();
        assert_eq!(run.get(b, "seen"), Some(&second));
    }
}
