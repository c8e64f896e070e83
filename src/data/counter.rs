use crate::{ExecutionContext, Measure, MetricConfig};
use quanta::Instant;
use std::sync::atomic::{AtomicI64, Ordering};
use std::sync::Arc;

/// A signed 64-bit accumulator.
///
/// All mutation and observation happens through tasks submitted to the
/// counter's [`ExecutionContext`]: the value observed by any read reflects
/// exactly the increments and decrements submitted strictly before it in
/// queue order.
#[derive(Clone, Debug)]
pub struct Counter {
    config: MetricConfig,
    context: ExecutionContext,
    value: Arc<AtomicI64>,
}

impl Counter {
    /// Creates a `Counter` on the process-wide default context.
    pub fn new(config: MetricConfig) -> Counter {
        Self::with_context(config, ExecutionContext::for_current_process())
    }

    /// Creates a `Counter` on the given context.
    pub fn with_context(config: MetricConfig, context: ExecutionContext) -> Counter {
        Counter { config, context, value: Arc::new(AtomicI64::new(0)) }
    }

    /// Increments the counter by one.
    pub fn increment(&self) {
        self.increment_by(1);
    }

    /// Increments the counter by `n`.
    pub fn increment_by(&self, n: i64) {
        let value = self.value.clone();
        self.context.submit(move || {
            value.fetch_add(n, Ordering::Relaxed);
        });
    }

    /// Increments the counter by `n`, then invokes `f` with the counter once
    /// the update has been applied.
    ///
    /// The callback runs on the context's consumer thread, enabling chained
    /// asynchronous composition without blocking the producer.
    pub fn increment_by_then<F>(&self, n: i64, f: F)
    where
        F: FnOnce(Counter) + Send + 'static,
    {
        let this = self.clone();
        self.context.submit(move || {
            this.value.fetch_add(n, Ordering::Relaxed);
            f(this);
        });
    }

    /// Decrements the counter by one.
    pub fn decrement(&self) {
        self.increment_by(-1);
    }

    /// Decrements the counter by `n`.
    pub fn decrement_by(&self, n: i64) {
        self.increment_by(-n);
    }

    /// Delivers the current count to `f`.
    ///
    /// The timestamp is captured at submission time, while the count reflects
    /// this read's position in the queue: the timestamp says "when requested",
    /// the value says "as of every update submitted before the request".
    pub fn get_count<F>(&self, f: F)
    where
        F: FnOnce(i64, Instant) + Send + 'static,
    {
        let requested = self.context.tick();
        let value = self.value.clone();
        self.context.submit(move || {
            f(value.load(Ordering::Relaxed), requested);
        });
    }

    /// Delivers the current count as a [`Measure`] to `f`.
    ///
    /// A never-incremented counter reports zero, observable.
    pub fn get_measure<F>(&self, f: F)
    where
        F: FnOnce(Measure) + Send + 'static,
    {
        let requested = self.context.tick();
        let value = self.value.clone();
        let config = self.config.clone();
        self.context.submit(move || {
            let count = value.load(Ordering::Relaxed);
            f(Measure::observable(config, count as f64, requested));
        });
    }

    /// Identity of this counter.
    pub fn config(&self) -> &MetricConfig {
        &self.config
    }

    /// Applies a delta directly, bypassing submission.
    ///
    /// Only for use from a task already running on this counter's context.
    pub(crate) fn apply(&self, n: i64) {
        self.value.fetch_add(n, Ordering::Relaxed);
    }

    /// Reads the value directly, bypassing submission.
    ///
    /// Only for use from a task already running on this counter's context.
    pub(crate) fn peek(&self) -> i64 {
        self.value.load(Ordering::Relaxed)
    }
}

#[cfg(test)]
mod tests {
    use super::Counter;
    use crate::{ExecutionContext, MetricConfig};
    use std::sync::mpsc;

    fn isolated_counter() -> (Counter, ExecutionContext) {
        let context = ExecutionContext::new();
        (Counter::with_context(MetricConfig::new("test"), context.clone()), context)
    }

    #[test]
    fn increments_and_decrements_sum() {
        let (counter, _context) = isolated_counter();

        counter.increment();
        counter.increment_by(10);
        counter.decrement();
        counter.decrement_by(4);

        let (tx, rx) = mpsc::channel();
        counter.get_count(move |count, _| {
            let _ = tx.send(count);
        });
        assert_eq!(rx.recv().unwrap(), 6);
    }

    #[test]
    fn read_reflects_queue_position() {
        let (counter, _context) = isolated_counter();
        let (tx, rx) = mpsc::channel();

        counter.increment();
        let early = tx.clone();
        counter.get_count(move |count, _| {
            let _ = early.send(count);
        });
        counter.increment_by(41);
        counter.get_count(move |count, _| {
            let _ = tx.send(count);
        });

        assert_eq!(rx.recv().unwrap(), 1);
        assert_eq!(rx.recv().unwrap(), 42);
    }

    #[test]
    fn completion_callback_sees_applied_update() {
        let (counter, _context) = isolated_counter();
        let (tx, rx) = mpsc::channel();

        counter.increment_by_then(5, move |c| {
            c.get_count(move |count, _| {
                let _ = tx.send(count);
            });
        });

        assert_eq!(rx.recv().unwrap(), 5);
    }

    #[test]
    fn fresh_counter_measure_is_observable_zero() {
        let (counter, _context) = isolated_counter();
        let (tx, rx) = mpsc::channel();

        counter.get_measure(move |measure| {
            let _ = tx.send(measure);
        });
        let measure = rx.recv().unwrap();
        assert!(measure.is_observable());
        assert_eq!(measure.value(), 0.0);
    }
}
