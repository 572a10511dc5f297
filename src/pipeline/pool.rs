//! Runs parallel workers of one stage between two shared queues.
//!
//! Every worker pulls from the same input queue and pushes to the same
//! output queue. The output queue is closed exactly once, by whichever
//! worker is last to arrive at the pool's [`CompletionLatch`], after it has
//! run the stage's `finalize` and flushed the result. A worker that stops on
//! a fatal error still arrives at the latch, so the pool always closes.

use crate::error::{HardsubError, Result};
use crate::pipeline::error::{ErrorReporter, StageError, StageFailure};
use crate::pipeline::queue::{Queue, Received};
use crate::pipeline::stage::Stage;
use crate::pipeline::telemetry::{Level, Telemetry};
use std::any::Any;
use std::panic::{self, AssertUnwindSafe};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex, PoisonError};
use std::thread::{self, JoinHandle};

/// Countdown barrier sized to a pool's concurrency.
#[derive(Debug)]
pub struct CompletionLatch {
    remaining: AtomicUsize,
}

impl CompletionLatch {
    /// Creates a latch expecting `count` arrivals.
    pub fn new(count: usize) -> Self {
        Self {
            remaining: AtomicUsize::new(count),
        }
    }

    /// Records one arrival.
    ///
    /// Returns true for exactly one caller: the one whose arrival brings the
    /// count to zero. Arrivals past zero return false.
    pub fn arrive(&self) -> bool {
        self.remaining
            .fetch_update(Ordering::AcqRel, Ordering::Acquire, |n| n.checked_sub(1))
            .is_ok_and(|previous| previous == 1)
    }
}

/// Shared services handed to every pool.
#[derive(Clone)]
pub struct PoolContext {
    pub error_reporter: Arc<dyn ErrorReporter>,
    pub telemetry: Telemetry,
}

struct PoolShared<I, O> {
    name: &'static str,
    input: Arc<Queue<I>>,
    output: Arc<Queue<O>>,
    latch: CompletionLatch,
    failures: Arc<Mutex<Vec<StageFailure>>>,
    context: PoolContext,
}

impl<I: Send, O: Send> PoolShared<I, O> {
    fn record(&self, worker_id: usize, error: StageError) {
        self.context
            .error_reporter
            .report(self.name, worker_id, &error);
        let level = match error {
            StageError::Recoverable(_) => Level::Warning,
            _ => Level::Error,
        };
        self.context
            .telemetry
            .emit(self.name, worker_id, level, error.to_string());
        self.failures
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .push(StageFailure {
                stage: self.name,
                worker_id,
                error,
            });
    }

    fn push_all(&self, outputs: Vec<O>) -> Result<()> {
        for output in outputs {
            self.output.put(output)?;
        }
        Ok(())
    }

    /// Arrives at the latch; the last arrival finalizes and closes the output.
    fn finish_worker<S>(&self, stage: &mut S, worker_id: usize)
    where
        S: Stage<Input = I, Output = O>,
    {
        if !self.latch.arrive() {
            return;
        }

        match catch_stage_panic(|| stage.finalize()) {
            Ok(outputs) => {
                let count = outputs.len();
                match self.push_all(outputs) {
                    Ok(()) if count > 0 => self.context.telemetry.emit(
                        self.name,
                        worker_id,
                        Level::Debug,
                        format!("Flushed {count} final item(s)"),
                    ),
                    Ok(()) => {}
                    Err(e) => self.record(worker_id, e.into()),
                }
            }
            Err(e) => self.record(worker_id, e),
        }

        // Announce before closing so downstream pools always report after us.
        self.context.telemetry.emit(
            self.name,
            worker_id,
            Level::Info,
            format!("All workers done, closing queue '{}'", self.output.name()),
        );
        self.output.close();
    }
}

/// Handle to the worker threads of a running pool.
pub struct PoolHandle {
    name: &'static str,
    threads: Vec<JoinHandle<()>>,
    failures: Arc<Mutex<Vec<StageFailure>>>,
}

impl PoolHandle {
    /// Spawns `concurrency` workers, each running its own clone of `stage`.
    pub fn spawn<S>(
        stage: S,
        concurrency: usize,
        input: Arc<Queue<S::Input>>,
        output: Arc<Queue<S::Output>>,
        context: PoolContext,
    ) -> Result<Self>
    where
        S: Stage + Clone,
    {
        let name = stage.name();
        validate_concurrency(&stage, concurrency)?;

        let failures = Arc::new(Mutex::new(Vec::new()));
        let shared = Arc::new(PoolShared {
            name,
            input,
            output,
            latch: CompletionLatch::new(concurrency),
            failures: failures.clone(),
            context,
        });

        let mut threads = Vec::with_capacity(concurrency);
        for worker_id in 0..concurrency {
            let worker_stage = stage.clone();
            let worker_shared = shared.clone();
            let spawned = thread::Builder::new()
                .name(format!("{name}-{worker_id}"))
                .spawn(move || run_worker(worker_stage, worker_id, &worker_shared));

            match spawned {
                Ok(handle) => threads.push(handle),
                Err(e) => {
                    // Arrive on behalf of the missing worker so the latch can
                    // still reach zero.
                    let error = HardsubError::WorkerSpawn {
                        stage: name.to_string(),
                        message: e.to_string(),
                    };
                    shared.record(worker_id, StageError::Fatal(error.to_string()));
                    shared.finish_worker(&mut stage.clone(), worker_id);
                }
            }
        }

        Ok(Self {
            name,
            threads,
            failures,
        })
    }

    /// Returns the name of the pooled stage.
    pub fn name(&self) -> &'static str {
        self.name
    }

    /// Waits for every worker and returns the failures they recorded.
    pub fn join(self) -> Vec<StageFailure> {
        let mut failures = Vec::new();
        for (worker_id, handle) in self.threads.into_iter().enumerate() {
            if let Err(panic_info) = handle.join() {
                failures.push(StageFailure {
                    stage: self.name,
                    worker_id,
                    error: StageError::Fatal(format!(
                        "worker thread panicked: {}",
                        panic_message(panic_info.as_ref())
                    )),
                });
            }
        }

        let mut recorded = std::mem::take(
            &mut *self
                .failures
                .lock()
                .unwrap_or_else(PoisonError::into_inner),
        );
        recorded.extend(failures);
        recorded
    }
}

pub(crate) fn validate_concurrency<S: Stage>(stage: &S, concurrency: usize) -> Result<()> {
    let reason = if concurrency == 0 {
        Some("at least 1 worker is required".to_string())
    } else {
        stage
            .max_concurrency()
            .filter(|max| concurrency > *max)
            .map(|max| format!("at most {max} worker(s) allowed"))
    };

    match reason {
        Some(reason) => Err(HardsubError::InvalidConcurrency {
            stage: stage.name().to_string(),
            requested: concurrency,
            reason,
        }),
        None => Ok(()),
    }
}

/// Main processing loop for one worker.
fn run_worker<S: Stage>(mut stage: S, worker_id: usize, shared: &PoolShared<S::Input, S::Output>) {
    let telemetry = &shared.context.telemetry;
    telemetry.emit(shared.name, worker_id, Level::Debug, "Started");

    let mut processed: usize = 0;
    while let Received::Item(item) = shared.input.get() {
        let result = catch_stage_panic(|| stage.process(item));
        processed += 1;

        match result {
            Ok(outputs) => {
                if let Err(e) = shared.push_all(outputs) {
                    shared.record(worker_id, e.into());
                    break;
                }
            }
            Err(error) => {
                let stop = error.stops_worker();
                shared.record(worker_id, error);
                if stop {
                    break;
                }
            }
        }
    }

    telemetry.emit(
        shared.name,
        worker_id,
        Level::Debug,
        format!("Finished after {processed} item(s)"),
    );
    shared.finish_worker(&mut stage, worker_id);
}

/// Runs a stage callback, turning a panic into a fatal stage error.
fn catch_stage_panic<T>(
    f: impl FnOnce() -> std::result::Result<T, StageError>,
) -> std::result::Result<T, StageError> {
    panic::catch_unwind(AssertUnwindSafe(f)).unwrap_or_else(|panic_info| {
        Err(StageError::Fatal(format!(
            "stage panicked: {}",
            panic_message(panic_info.as_ref())
        )))
    })
}

fn panic_message(panic_info: &(dyn Any + Send)) -> &str {
    panic_info
        .downcast_ref::<&str>()
        .copied()
        .or_else(|| panic_info.downcast_ref::<String>().map(|s| s.as_str()))
        .unwrap_or("unknown panic")
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::pipeline::error::LogReporter;
    use std::time::Duration;

    fn context() -> PoolContext {
        PoolContext {
            error_reporter: Arc::new(LogReporter),
            telemetry: Telemetry::disabled(),
        }
    }

    fn seeded_queue(name: &str, items: impl IntoIterator<Item = u32>) -> Arc<Queue<u32>> {
        let queue = Arc::new(Queue::unbounded(name));
        for item in items {
            queue.put(item).unwrap();
        }
        queue.close();
        queue
    }

    // Doubles its input after a small, item-dependent delay so workers
    // finish out of order.
    #[derive(Clone)]
    struct SlowDoubler;

    impl Stage for SlowDoubler {
        type Input = u32;
        type Output = u32;

        fn name(&self) -> &'static str {
            "doubler"
        }

        fn process(&mut self, input: u32) -> std::result::Result<Vec<u32>, StageError> {
            thread::sleep(Duration::from_millis(u64::from(input % 4)));
            Ok(vec![input * 2])
        }
    }

    // Counts processed items and emits a sentinel from finalize.
    #[derive(Clone)]
    struct FinalizeRecorder {
        processed: Arc<AtomicUsize>,
        finalize_calls: Arc<AtomicUsize>,
        seen_at_finalize: Arc<AtomicUsize>,
    }

    const SENTINEL: u32 = u32::MAX;

    impl Stage for FinalizeRecorder {
        type Input = u32;
        type Output = u32;

        fn name(&self) -> &'static str {
            "recorder"
        }

        fn process(&mut self, input: u32) -> std::result::Result<Vec<u32>, StageError> {
            thread::sleep(Duration::from_millis(u64::from((input * 7) % 5)));
            self.processed.fetch_add(1, Ordering::SeqCst);
            Ok(vec![input])
        }

        fn finalize(&mut self) -> std::result::Result<Vec<u32>, StageError> {
            self.finalize_calls.fetch_add(1, Ordering::SeqCst);
            self.seen_at_finalize
                .store(self.processed.load(Ordering::SeqCst), Ordering::SeqCst);
            Ok(vec![SENTINEL])
        }
    }

    // Fails on selected inputs with the configured error.
    #[derive(Clone)]
    struct FailingStage {
        fail_on: Vec<u32>,
        error: StageError,
    }

    impl Stage for FailingStage {
        type Input = u32;
        type Output = u32;

        fn name(&self) -> &'static str {
            "failing"
        }

        fn process(&mut self, input: u32) -> std::result::Result<Vec<u32>, StageError> {
            if self.fail_on.contains(&input) {
                Err(self.error.clone())
            } else {
                Ok(vec![input])
            }
        }
    }

    #[derive(Clone)]
    struct SingleOwner;

    impl Stage for SingleOwner {
        type Input = u32;
        type Output = u32;

        fn name(&self) -> &'static str {
            "single"
        }

        fn process(&mut self, input: u32) -> std::result::Result<Vec<u32>, StageError> {
            Ok(vec![input])
        }

        fn max_concurrency(&self) -> Option<usize> {
            Some(1)
        }
    }

    #[derive(Clone)]
    struct PanickingStage;

    impl Stage for PanickingStage {
        type Input = u32;
        type Output = u32;

        fn name(&self) -> &'static str {
            "panicking"
        }

        fn process(&mut self, input: u32) -> std::result::Result<Vec<u32>, StageError> {
            if input == 3 {
                panic!("bad frame {input}");
            }
            Ok(vec![input])
        }
    }

    #[test]
    fn test_latch_only_last_arrival_wins() {
        let latch = Arc::new(CompletionLatch::new(8));
        let handles: Vec<_> = (0..8u64)
            .map(|i| {
                let latch = latch.clone();
                thread::spawn(move || {
                    thread::sleep(Duration::from_millis((i * 7) % 13));
                    latch.arrive()
                })
            })
            .collect();

        let winners = handles
            .into_iter()
            .map(|h| h.join().unwrap())
            .filter(|won| *won)
            .count();
        assert_eq!(winners, 1);
        assert_eq!(latch.remaining.load(Ordering::Acquire), 0);
    }

    #[test]
    fn test_latch_arrivals_past_zero_return_false() {
        let latch = CompletionLatch::new(1);
        assert!(latch.arrive());
        assert!(!latch.arrive());
        assert_eq!(latch.remaining.load(Ordering::Acquire), 0);
    }

    #[test]
    fn test_pool_processes_every_item() {
        let input = seeded_queue("in", 0..50);
        let output = Arc::new(Queue::unbounded("out"));

        let pool = PoolHandle::spawn(SlowDoubler, 4, input, output.clone(), context()).unwrap();
        assert_eq!(pool.name(), "doubler");

        let mut results = output.drain();
        let failures = pool.join();

        results.sort_unstable();
        assert_eq!(results, (0..50).map(|i| i * 2).collect::<Vec<_>>());
        assert!(failures.is_empty());
        assert_eq!(output.close_calls(), 1);
    }

    #[test]
    fn test_output_closed_once_after_all_workers() {
        for concurrency in [1, 2, 5, 8] {
            let recorder = FinalizeRecorder {
                processed: Arc::new(AtomicUsize::new(0)),
                finalize_calls: Arc::new(AtomicUsize::new(0)),
                seen_at_finalize: Arc::new(AtomicUsize::new(0)),
            };
            let input = seeded_queue("in", 0..40);
            let output = Arc::new(Queue::unbounded("out"));

            let pool = PoolHandle::spawn(
                recorder.clone(),
                concurrency,
                input,
                output.clone(),
                context(),
            )
            .unwrap();

            let results = output.drain();
            pool.join();

            assert_eq!(results.len(), 41, "concurrency {concurrency}");
            assert_eq!(results.last(), Some(&SENTINEL), "finalize output must come last");
            assert_eq!(recorder.finalize_calls.load(Ordering::SeqCst), 1);
            assert_eq!(recorder.seen_at_finalize.load(Ordering::SeqCst), 40);
            assert_eq!(output.close_calls(), 1);
            assert!(output.is_closed());
        }
    }

    #[test]
    fn test_recoverable_error_skips_item() {
        let stage = FailingStage {
            fail_on: vec![2, 4],
            error: StageError::Recoverable("skip".to_string()),
        };
        let input = seeded_queue("in", 0..6);
        let output = Arc::new(Queue::unbounded("out"));

        let pool = PoolHandle::spawn(stage, 1, input, output.clone(), context()).unwrap();
        let results = output.drain();
        let failures = pool.join();

        assert_eq!(results, vec![0, 1, 3, 5]);
        assert_eq!(failures.len(), 2);
        assert!(failures.iter().all(|f| f.stage == "failing"));
    }

    #[test]
    fn test_fatal_error_stops_only_that_worker() {
        let stage = FailingStage {
            fail_on: vec![5],
            error: StageError::Fatal("tool crashed".to_string()),
        };
        let input = seeded_queue("in", 0..30);
        let output = Arc::new(Queue::unbounded("out"));

        let pool = PoolHandle::spawn(stage, 3, input, output.clone(), context()).unwrap();
        let mut results = output.drain();
        let failures = pool.join();

        results.sort_unstable();
        let expected: Vec<u32> = (0..30).filter(|i| *i != 5).collect();
        assert_eq!(results, expected);
        assert_eq!(failures.len(), 1);
        assert_eq!(
            failures[0].error,
            StageError::Fatal("tool crashed".to_string())
        );
        assert_eq!(output.close_calls(), 1);
    }

    #[test]
    fn test_pool_closes_even_when_every_worker_dies() {
        let stage = FailingStage {
            fail_on: (0..10).collect(),
            error: StageError::Fatal("broken".to_string()),
        };
        let input = seeded_queue("in", 0..10);
        let output = Arc::new(Queue::unbounded("out"));

        let pool = PoolHandle::spawn(stage, 2, input.clone(), output.clone(), context()).unwrap();
        let results = output.drain();
        let failures = pool.join();

        assert!(results.is_empty());
        assert_eq!(failures.len(), 2);
        assert_eq!(input.len(), 8);
        assert!(output.is_closed());
    }

    #[test]
    fn test_panic_becomes_fatal_failure() {
        let input = seeded_queue("in", 0..6);
        let output = Arc::new(Queue::unbounded("out"));

        let pool = PoolHandle::spawn(PanickingStage, 1, input, output.clone(), context()).unwrap();
        let results = output.drain();
        let failures = pool.join();

        assert_eq!(results, vec![0, 1, 2]);
        assert_eq!(failures.len(), 1);
        match &failures[0].error {
            StageError::Fatal(msg) => assert!(msg.contains("bad frame 3"), "got: {msg}"),
            other => panic!("Expected Fatal error, got {:?}", other),
        }
    }

    #[test]
    fn test_push_to_closed_output_is_invariant_violation() {
        let input = seeded_queue("in", 0..3);
        let output: Arc<Queue<u32>> = Arc::new(Queue::unbounded("out"));
        output.close();

        let pool = PoolHandle::spawn(SlowDoubler, 1, input, output, context()).unwrap();
        let failures = pool.join();

        assert_eq!(failures.len(), 1);
        assert!(matches!(failures[0].error, StageError::Invariant(_)));
    }

    #[test]
    fn test_zero_concurrency_rejected() {
        let input = seeded_queue("in", 0..1);
        let output = Arc::new(Queue::unbounded("out"));

        let result = PoolHandle::spawn(SlowDoubler, 0, input, output, context());
        assert!(matches!(
            result,
            Err(HardsubError::InvalidConcurrency { requested: 0, .. })
        ));
    }

    #[test]
    fn test_single_owner_stage_rejects_pooling() {
        let input = seeded_queue("in", 0..1);
        let output = Arc::new(Queue::unbounded("out"));

        match PoolHandle::spawn(SingleOwner, 2, input, output, context()) {
            Err(HardsubError::InvalidConcurrency {
                stage, requested, ..
            }) => {
                assert_eq!(stage, "single");
                assert_eq!(requested, 2);
            }
            Err(other) => panic!("Expected InvalidConcurrency, got {:?}", other),
            Ok(_) => panic!("Expected InvalidConcurrency, got a running pool"),
        }
    }

    #[test]
    fn test_lifecycle_telemetry() {
        let (telemetry, rx) = Telemetry::channel(64);
        let ctx = PoolContext {
            error_reporter: Arc::new(LogReporter),
            telemetry,
        };
        let input = seeded_queue("in", 0..4);
        let output = Arc::new(Queue::unbounded("out"));

        let pool = PoolHandle::spawn(SlowDoubler, 2, input, output.clone(), ctx).unwrap();
        output.drain();
        pool.join();

        let messages: Vec<_> = rx.try_iter().collect();
        let started = messages.iter().filter(|m| m.text == "Started").count();
        let finished = messages
            .iter()
            .filter(|m| m.text.starts_with("Finished after"))
            .count();
        assert_eq!(started, 2);
        assert_eq!(finished, 2);
        assert!(
            messages
                .iter()
                .any(|m| m.level == Level::Info && m.text.contains("closing queue 'out'"))
        );
    }
}
