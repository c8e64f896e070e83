use crossbeam_channel::{unbounded, Receiver, Sender};
use once_cell::sync::Lazy;
use quanta::{Clock, Instant};
use std::any::Any;
use std::panic::{self, AssertUnwindSafe};
use std::sync::mpsc;
use std::thread;

type Task = Box<dyn FnOnce() + Send + 'static>;

static PROCESS_CONTEXT: Lazy<ExecutionContext> = Lazy::new(ExecutionContext::new);

/// An owner of a serialized task queue and a clock.
///
/// Every state-mutating or state-reading operation on a metric is submitted to
/// a context as a task.  Tasks submitted to the same context execute strictly
/// in submission order, one at a time, never concurrently with each other --
/// the context is the unit of sequential-consistency guarantee, replacing
/// per-metric locks.
///
/// Multiple metrics may share a context, in which case their operations
/// interleave in submission order, or each may own a private context for
/// isolation.  There is no ordering guarantee between tasks submitted to
/// different contexts.
///
/// A context is a cheap handle: clones share the same queue and clock.  The
/// consumer runs until every handle has been dropped.
#[derive(Clone, Debug)]
pub struct ExecutionContext {
    tx: Sender<Task>,
    clock: Clock,
}

impl ExecutionContext {
    /// Creates a new context with its own queue and a high-resolution clock.
    pub fn new() -> ExecutionContext {
        Self::with_clock(Clock::new())
    }

    /// Creates a new context that reads time from the given clock.
    ///
    /// Pairing this with [`quanta::Clock::mock`] gives tests full control over
    /// the passage of time.
    pub fn with_clock(clock: Clock) -> ExecutionContext {
        let (tx, rx) = unbounded();
        thread::spawn(move || run_consumer(rx));
        ExecutionContext { tx, clock }
    }

    /// Returns a handle to the process-wide default context.
    ///
    /// Lazily constructed on first use.  Metrics built without an explicit
    /// context attach here; tests wanting isolation or a deterministic clock
    /// should construct metrics with a private context instead.
    pub fn for_current_process() -> ExecutionContext {
        PROCESS_CONTEXT.clone()
    }

    /// Submits a task to this context's queue.
    ///
    /// Never blocks the caller past hand-off, and never fails for a well-formed
    /// task.  If the task panics when executed, the panic is caught and logged
    /// at the dequeue boundary; subsequent tasks are unaffected.
    pub fn submit<F>(&self, task: F)
    where
        F: FnOnce() + Send + 'static,
    {
        // Send only fails once the consumer is gone, which can only happen at
        // process teardown; submissions at that point are dropped.
        let _ = self.tx.send(Box::new(task));
    }

    /// Returns the current reading of this context's clock.
    pub fn tick(&self) -> Instant {
        self.clock.now()
    }

    /// Returns a reference to this context's clock.
    pub fn clock(&self) -> &Clock {
        &self.clock
    }

    /// Blocks until every task submitted before this call has executed.
    ///
    /// Intended for tests and shutdown-time reporting.  Must not be called
    /// from within a task running on this same context: the barrier task could
    /// then never be reached, deadlocking the caller.
    pub fn flush(&self) {
        let (tx, rx) = mpsc::channel();
        self.submit(move || {
            let _ = tx.send(());
        });
        let _ = rx.recv();
    }
}

impl Default for ExecutionContext {
    fn default() -> Self {
        Self::new()
    }
}

fn run_consumer(rx: Receiver<Task>) {
    while let Ok(task) = rx.recv() {
        // A faulty task must not starve the queue: catch, log, move on.
        if let Err(err) = panic::catch_unwind(AssertUnwindSafe(task)) {
            log::error!("metric task panicked: {}", panic_message(&err));
        }
    }
}

fn panic_message(err: &(dyn Any + Send)) -> &str {
    if let Some(s) = err.downcast_ref::<&'static str>() {
        s
    } else if let Some(s) = err.downcast_ref::<String>() {
        s.as_str()
    } else {
        "non-string panic payload"
    }
}
