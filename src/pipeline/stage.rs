//! Core stage abstraction for the extraction pipeline.

use crate::pipeline::error::StageError;

/// A unit of transformation in the pipeline.
///
/// A stage never touches queues: its pool pulls inputs, calls [`process`],
/// and pushes whatever comes back. Pools run one clone of the stage per
/// worker, so per-worker state lives in `self`.
///
/// [`process`]: Stage::process
pub trait Stage: Send + 'static {
    /// The input type this stage receives.
    type Input: Send + 'static;
    /// The output type this stage produces.
    type Output: Send + 'static;

    /// Returns the name of this stage for logging and error reporting.
    fn name(&self) -> &'static str;

    /// Processes a single input item into zero or more outputs.
    ///
    /// Returns:
    /// - `Ok(outputs)` - Outputs to push downstream (possibly none)
    /// - `Err(StageError::Recoverable)` - Item skipped, worker continues
    /// - `Err(StageError::Fatal | StageError::Invariant)` - Worker stops
    fn process(&mut self, input: Self::Input) -> Result<Vec<Self::Output>, StageError>;

    /// Produces final outputs once the pool's input is closed and drained.
    ///
    /// Called exactly once per pool, by the last worker to finish, before the
    /// pool closes its output queue.
    fn finalize(&mut self) -> Result<Vec<Self::Output>, StageError> {
        Ok(Vec::new())
    }

    /// Upper bound on the pool size this stage tolerates.
    ///
    /// Stateful stages that must own all their state return `Some(1)`.
    fn max_concurrency(&self) -> Option<usize> {
        None
    }
}
