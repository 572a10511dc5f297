//! Chains stage pools into a batch pipeline.
//!
//! ```text
//! inputs → [queue 0] → pool 0 → [queue 1] → pool 1 → ... → [queue N] → report
//! ```
//!
//! Each call to [`Pipeline::stage`] adds one pool and one queue, so a chain of
//! N stages owns N+1 queues. Every queue has exactly one producer side (the
//! orchestrator for queue 0, pool k-1 for queue k) and one consumer side.

use crate::error::Result;
use crate::pipeline::error::{ErrorReporter, LogReporter, StageError, StageFailure};
use crate::pipeline::pool::{PoolContext, PoolHandle, validate_concurrency};
use crate::pipeline::queue::Queue;
use crate::pipeline::stage::Stage;
use crate::pipeline::telemetry::Telemetry;
use std::fmt;
use std::sync::Arc;
use std::time::{Duration, Instant};

/// Name and pool size of one configured stage.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct StageDescriptor {
    pub name: &'static str,
    pub concurrency: usize,
}

impl fmt::Display for StageDescriptor {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}×{}", self.name, self.concurrency)
    }
}

/// Result of a completed pipeline run.
#[derive(Debug)]
pub struct PipelineReport<T> {
    /// Everything the last stage produced, in arrival order.
    pub items: Vec<T>,
    /// Errors recorded by any worker of any stage.
    pub failures: Vec<StageFailure>,
    pub descriptors: Vec<StageDescriptor>,
    pub elapsed: Duration,
}

impl<T> PipelineReport<T> {
    /// Returns true if no stage recorded any failure.
    pub fn is_clean(&self) -> bool {
        self.failures.is_empty()
    }

    /// Returns true if any worker reported a violated invariant.
    pub fn has_invariant_violation(&self) -> bool {
        self.failures
            .iter()
            .any(|f| matches!(f.error, StageError::Invariant(_)))
    }
}

type Launcher = Box<dyn FnOnce(PoolContext) -> Result<PoolHandle> + Send>;

/// Typed builder and runner for a chain of stage pools.
///
/// `In` is the type seeded into the first queue, `Out` the type drained from
/// the last one.
pub struct Pipeline<In, Out> {
    input: Arc<Queue<In>>,
    output: Arc<Queue<Out>>,
    launchers: Vec<Launcher>,
    descriptors: Vec<StageDescriptor>,
    error_reporter: Arc<dyn ErrorReporter>,
    telemetry: Telemetry,
}

impl<T: Send + 'static> Pipeline<T, T> {
    /// Creates an empty pipeline. Without stages it returns its inputs.
    pub fn new() -> Self {
        let queue = Arc::new(Queue::unbounded("input"));
        Self {
            input: queue.clone(),
            output: queue,
            launchers: Vec::new(),
            descriptors: Vec::new(),
            error_reporter: Arc::new(LogReporter),
            telemetry: Telemetry::disabled(),
        }
    }
}

impl<T: Send + 'static> Default for Pipeline<T, T> {
    fn default() -> Self {
        Self::new()
    }
}

impl<In, Out> Pipeline<In, Out>
where
    In: Send + 'static,
    Out: Send + 'static,
{
    /// Appends a stage run by `concurrency` workers.
    ///
    /// Fails with `InvalidConcurrency` when `concurrency` is zero or above
    /// what the stage allows. Nothing is started until [`run`](Self::run).
    pub fn stage<S>(self, stage: S, concurrency: usize) -> Result<Pipeline<In, S::Output>>
    where
        S: Stage<Input = Out> + Clone,
    {
        validate_concurrency(&stage, concurrency)?;

        let Pipeline {
            input,
            output: stage_input,
            mut launchers,
            mut descriptors,
            error_reporter,
            telemetry,
        } = self;

        let name = stage.name();
        let stage_output = Arc::new(Queue::unbounded(name));
        let pool_output = stage_output.clone();
        launchers.push(Box::new(move |context| {
            PoolHandle::spawn(stage, concurrency, stage_input, pool_output, context)
        }));
        descriptors.push(StageDescriptor { name, concurrency });

        Ok(Pipeline {
            input,
            output: stage_output,
            launchers,
            descriptors,
            error_reporter,
            telemetry,
        })
    }

    /// Sets the side channel every pool publishes progress messages to.
    pub fn with_telemetry(mut self, telemetry: Telemetry) -> Self {
        self.telemetry = telemetry;
        self
    }

    /// Sets a custom error reporter.
    pub fn with_error_reporter(mut self, reporter: Arc<dyn ErrorReporter>) -> Self {
        self.error_reporter = reporter;
        self
    }

    /// Returns the configured stages in order.
    pub fn descriptors(&self) -> &[StageDescriptor] {
        &self.descriptors
    }

    /// Number of queues the pipeline owns: one more than its stages.
    pub fn queue_count(&self) -> usize {
        self.descriptors.len() + 1
    }

    /// Runs the whole chain to completion.
    ///
    /// Starts every pool, seeds queue 0 with `inputs` and closes it, waits for
    /// every pool to terminate, then drains the last queue. Stage failures do
    /// not abort the run; they are collected in the report.
    pub fn run(self, inputs: impl IntoIterator<Item = In>) -> Result<PipelineReport<Out>> {
        let started = Instant::now();
        let context = PoolContext {
            error_reporter: self.error_reporter,
            telemetry: self.telemetry,
        };

        let mut pools = Vec::with_capacity(self.launchers.len());
        for launch in self.launchers {
            match launch(context.clone()) {
                Ok(pool) => pools.push(pool),
                Err(e) => {
                    abort(&self.input, pools);
                    return Err(e);
                }
            }
        }
        log::debug!(
            "Started {} pool(s): {}",
            pools.len(),
            self.descriptors
                .iter()
                .map(ToString::to_string)
                .collect::<Vec<_>>()
                .join(" → ")
        );

        let mut seeded = 0usize;
        for item in inputs {
            if let Err(e) = self.input.put(item) {
                abort(&self.input, pools);
                return Err(e);
            }
            seeded += 1;
        }
        self.input.close();
        log::debug!("Seeded {seeded} input item(s)");

        let mut failures = Vec::new();
        for pool in pools {
            let name = pool.name();
            let pool_failures = pool.join();
            if !pool_failures.is_empty() {
                log::warn!("Stage '{name}' recorded {} failure(s)", pool_failures.len());
            }
            failures.extend(pool_failures);
        }

        let items = self.output.drain();
        let elapsed = started.elapsed();
        log::info!(
            "Pipeline finished: {} item(s) out, {} failure(s), {:.2}s",
            items.len(),
            failures.len(),
            elapsed.as_secs_f64()
        );

        Ok(PipelineReport {
            items,
            failures,
            descriptors: self.descriptors,
            elapsed,
        })
    }
}

/// Closes queue 0 and waits for the pools already started.
fn abort<T: Send>(input: &Queue<T>, pools: Vec<PoolHandle>) {
    input.close();
    for pool in pools {
        for failure in pool.join() {
            log::error!("{failure}");
        }
    }
}
