use crate::{
    error::Result,
    pipeline::{HookPoint, RunContext, StageContext, Value},
    types::{Parameters, SegmentTable},
};

/// A single pipeline stage
pub trait Processor: Send + Sync {
    /// Stage name, unique within its stack. Used to qualify parameters.
    fn name(&self) -> &str;

    /// Effective parameters of this stage instance
    fn parameters(&self) -> Parameters {
        Parameters::new()
    }

    /// Consume the previous stage's output and produce this stage's output.
    ///
    /// Anything that must outlive the call, or be visible to hooks, goes into
    /// `ctx` rather than into `self`.
    fn process(&self, input: Value, ctx: &mut StageContext<'_>) -> Result<Value>;
}

/// Trait for geometric segment filters
pub trait SegmentFilter: Send + Sync {
    fn name(&self) -> &str;

    fn parameters(&self) -> Parameters {
        Parameters::new()
    }

    /// One entry per row of `segments`, `true` for the rows to keep.
    fn good_segments(&self, segments: &SegmentTable, ctx: &StageContext<'_>) -> Result<Vec<bool>>;
}

/// Callback run right before or after a stage's `process`
pub trait Hook: Send + Sync {
    fn deliver(&self, point: &HookPoint<'_>, run: &mut RunContext) -> Result<()>;
}
