use crate::{ExecutionContext, Measure, MetricConfig};
use parking_lot::Mutex;
use quanta::Instant;
use std::sync::Arc;

#[derive(Debug)]
struct GaugeState {
    value: f64,
    last_updated: Option<Instant>,
}

/// A point-in-time value, holding the last value it was set to.
///
/// Unobservable until the first [`set`](Gauge::set).
#[derive(Clone, Debug)]
pub struct Gauge {
    config: MetricConfig,
    context: ExecutionContext,
    state: Arc<Mutex<GaugeState>>,
}

impl Gauge {
    /// Creates a `Gauge` on the process-wide default context.
    pub fn new(config: MetricConfig) -> Gauge {
        Self::with_context(config, ExecutionContext::for_current_process())
    }

    /// Creates a `Gauge` on the given context.
    pub fn with_context(config: MetricConfig, context: ExecutionContext) -> Gauge {
        Gauge {
            config,
            context,
            state: Arc::new(Mutex::new(GaugeState { value: 0.0, last_updated: None })),
        }
    }

    /// Sets the gauge to `value`.
    ///
    /// The update time is captured at submission.
    pub fn set(&self, value: f64) {
        let updated = self.context.tick();
        let state = self.state.clone();
        self.context.submit(move || {
            let mut state = state.lock();
            state.value = value;
            state.last_updated = Some(updated);
        });
    }

    /// Delivers the current value as a [`Measure`] to `f`.
    pub fn get_measure<F>(&self, f: F)
    where
        F: FnOnce(Measure) + Send + 'static,
    {
        let requested = self.context.tick();
        let state = self.state.clone();
        let config = self.config.clone();
        self.context.submit(move || {
            let state = state.lock();
            let measure = if state.last_updated.is_some() {
                Measure::observable(config, state.value, requested)
            } else {
                Measure::unobservable(config, requested)
            };
            f(measure);
        });
    }

    /// Delivers the time of the last update to `f`, or `None` if the gauge
    /// has never been set.
    pub fn get_last_updated<F>(&self, f: F)
    where
        F: FnOnce(Option<Instant>) + Send + 'static,
    {
        let state = self.state.clone();
        self.context.submit(move || {
            f(state.lock().last_updated);
        });
    }

    /// Identity of this gauge.
    pub fn config(&self) -> &MetricConfig {
        &self.config
    }
}

/// A read-only gauge that evaluates a function on every observation.
///
/// The function runs inside the context's task, so a panicking callable is
/// isolated at the dequeue boundary like any other faulty task: the queue
/// keeps draining, and the observation's callback is simply dropped.
#[derive(Clone, Debug)]
pub struct CallableGauge<F> {
    config: MetricConfig,
    context: ExecutionContext,
    callable: Arc<F>,
}

impl<F> CallableGauge<F>
where
    F: Fn() -> f64 + Send + Sync + 'static,
{
    /// Creates a `CallableGauge` on the process-wide default context.
    pub fn new(config: MetricConfig, callable: F) -> CallableGauge<F> {
        Self::with_context(config, callable, ExecutionContext::for_current_process())
    }

    /// Creates a `CallableGauge` on the given context.
    pub fn with_context(
        config: MetricConfig,
        callable: F,
        context: ExecutionContext,
    ) -> CallableGauge<F> {
        CallableGauge { config, context, callable: Arc::new(callable) }
    }

    /// Evaluates the callable and delivers the result as a [`Measure`] to `f`.
    pub fn get_measure<C>(&self, f: C)
    where
        C: FnOnce(Measure) + Send + 'static,
    {
        let requested = self.context.tick();
        let callable = self.callable.clone();
        let config = self.config.clone();
        self.context.submit(move || {
            let value = callable();
            f(Measure::observable(config, value, requested));
        });
    }

    /// Identity of this gauge.
    pub fn config(&self) -> &MetricConfig {
        &self.config
    }
}

#[derive(Debug)]
struct ExtremeState {
    value: f64,
    observed: bool,
}

// Shared machinery for the resettable min/max gauges; `prefer` picks the
// surviving value out of the current extreme and a new observation.
#[derive(Clone, Debug)]
struct ExtremeGauge {
    config: MetricConfig,
    context: ExecutionContext,
    prefer: fn(f64, f64) -> f64,
    state: Arc<Mutex<ExtremeState>>,
}

impl ExtremeGauge {
    fn new(config: MetricConfig, context: ExecutionContext, prefer: fn(f64, f64) -> f64) -> Self {
        ExtremeGauge {
            config,
            context,
            prefer,
            state: Arc::new(Mutex::new(ExtremeState { value: 0.0, observed: false })),
        }
    }

    fn update(&self, value: f64) {
        let this = self.clone();
        self.context.submit(move || this.record(value));
    }

    fn record(&self, value: f64) {
        let mut state = self.state.lock();
        state.value = if state.observed { (self.prefer)(state.value, value) } else { value };
        state.observed = true;
    }

    fn reset(&self) {
        let state = self.state.clone();
        self.context.submit(move || {
            let mut state = state.lock();
            state.value = 0.0;
            state.observed = false;
        });
    }

    fn reset_direct(&self) {
        let mut state = self.state.lock();
        state.value = 0.0;
        state.observed = false;
    }

    fn get_measure<F>(&self, f: F)
    where
        F: FnOnce(Measure) + Send + 'static,
    {
        let requested = self.context.tick();
        let state = self.state.clone();
        let config = self.config.clone();
        self.context.submit(move || {
            f(Self::measure_locked(&state, config, requested));
        });
    }

    fn measure_locked(
        state: &Mutex<ExtremeState>,
        config: MetricConfig,
        requested: Instant,
    ) -> Measure {
        let state = state.lock();
        if state.observed {
            Measure::observable(config, state.value, requested)
        } else {
            Measure::unobservable(config, requested)
        }
    }

    fn measure_direct(&self, requested: Instant) -> Measure {
        Self::measure_locked(&self.state, self.config.clone(), requested)
    }
}

/// A gauge tracking the smallest value observed since its last reset.
///
/// Unobservable after construction or [`reset`](ResettableMinGauge::reset)
/// until the next update.  Used inside timers to report per-reporting-window
/// minimums rather than all-time ones.
#[derive(Clone, Debug)]
pub struct ResettableMinGauge(ExtremeGauge);

impl ResettableMinGauge {
    /// Creates a `ResettableMinGauge` on the process-wide default context.
    pub fn new(config: MetricConfig) -> ResettableMinGauge {
        Self::with_context(config, ExecutionContext::for_current_process())
    }

    /// Creates a `ResettableMinGauge` on the given context.
    pub fn with_context(config: MetricConfig, context: ExecutionContext) -> ResettableMinGauge {
        ResettableMinGauge(ExtremeGauge::new(config, context, f64::min))
    }

    /// Folds `value` into the running minimum.
    pub fn update(&self, value: f64) {
        self.0.update(value);
    }

    /// Returns the gauge to its unobservable state.
    pub fn reset(&self) {
        self.0.reset();
    }

    /// Delivers the current minimum as a [`Measure`] to `f`.
    pub fn get_measure<F>(&self, f: F)
    where
        F: FnOnce(Measure) + Send + 'static,
    {
        self.0.get_measure(f);
    }

    /// Identity of this gauge.
    pub fn config(&self) -> &MetricConfig {
        &self.0.config
    }

    pub(crate) fn record(&self, value: f64) {
        self.0.record(value);
    }

    pub(crate) fn reset_direct(&self) {
        self.0.reset_direct();
    }

    pub(crate) fn measure_direct(&self, requested: Instant) -> Measure {
        self.0.measure_direct(requested)
    }
}

/// A gauge tracking the largest value observed since its last reset.
///
/// Unobservable after construction or [`reset`](ResettableMaxGauge::reset)
/// until the next update.
#[derive(Clone, Debug)]
pub struct ResettableMaxGauge(ExtremeGauge);

impl ResettableMaxGauge {
    /// Creates a `ResettableMaxGauge` on the process-wide default context.
    pub fn new(config: MetricConfig) -> ResettableMaxGauge {
        Self::with_context(config, ExecutionContext::for_current_process())
    }

    /// Creates a `ResettableMaxGauge` on the given context.
    pub fn with_context(config: MetricConfig, context: ExecutionContext) -> ResettableMaxGauge {
        ResettableMaxGauge(ExtremeGauge::new(config, context, f64::max))
    }

    /// Folds `value` into the running maximum.
    pub fn update(&self, value: f64) {
        self.0.update(value);
    }

    /// Returns the gauge to its unobservable state.
    pub fn reset(&self) {
        self.0.reset();
    }

    /// Delivers the current maximum as a [`Measure`] to `f`.
    pub fn get_measure<F>(&self, f: F)
    where
        F: FnOnce(Measure) + Send + 'static,
    {
        self.0.get_measure(f);
    }

    /// Identity of this gauge.
    pub fn config(&self) -> &MetricConfig {
        &self.0.config
    }

    pub(crate) fn record(&self, value: f64) {
        self.0.record(value);
    }

    pub(crate) fn reset_direct(&self) {
        self.0.reset_direct();
    }

    pub(crate) fn measure_direct(&self, requested: Instant) -> Measure {
        self.0.measure_direct(requested)
    }
}

#[cfg(test)]
mod tests {
    use super::{CallableGauge, Gauge, ResettableMaxGauge, ResettableMinGauge};
    use crate::{ExecutionContext, Measure, MetricConfig};
    use std::sync::mpsc;

    fn measure_of<F>(get: F) -> Measure
    where
        F: FnOnce(Box<dyn FnOnce(Measure) + Send>),
    {
        let (tx, rx) = mpsc::channel();
        get(Box::new(move |m| {
            let _ = tx.send(m);
        }));
        rx.recv().unwrap()
    }

    #[test]
    fn gauge_unobservable_until_set() {
        let context = ExecutionContext::new();
        let gauge = Gauge::with_context(MetricConfig::new("g"), context);

        let before = measure_of(|cb| gauge.get_measure(cb));
        assert!(!before.is_observable());

        gauge.set(12.5);
        let after = measure_of(|cb| gauge.get_measure(cb));
        assert!(after.is_observable());
        assert_eq!(after.value(), 12.5);

        let (tx, rx) = mpsc::channel();
        gauge.get_last_updated(move |at| {
            let _ = tx.send(at);
        });
        assert!(rx.recv().unwrap().is_some());
    }

    #[test]
    fn callable_gauge_evaluates_each_read() {
        use std::sync::atomic::{AtomicUsize, Ordering};
        use std::sync::Arc;

        let context = ExecutionContext::new();
        let calls = Arc::new(AtomicUsize::new(0));
        let calls2 = calls.clone();
        let gauge = CallableGauge::with_context(
            MetricConfig::new("cg"),
            move || calls2.fetch_add(1, Ordering::SeqCst) as f64,
            context,
        );

        assert_eq!(measure_of(|cb| gauge.get_measure(cb)).value(), 0.0);
        assert_eq!(measure_of(|cb| gauge.get_measure(cb)).value(), 1.0);
        assert_eq!(calls.load(Ordering::SeqCst), 2);
    }

    #[test]
    fn panicking_callable_is_isolated() {
        let context = ExecutionContext::new();
        let faulty = CallableGauge::with_context(
            MetricConfig::new("faulty"),
            || panic!("broken callable"),
            context.clone(),
        );
        let healthy = Gauge::with_context(MetricConfig::new("healthy"), context);

        faulty.get_measure(|_| unreachable!("callback must be dropped on panic"));
        healthy.set(1.0);

        let after = measure_of(|cb| healthy.get_measure(cb));
        assert_eq!(after.value(), 1.0);
    }

    #[test]
    fn min_gauge_tracks_and_resets() {
        let context = ExecutionContext::new();
        let gauge = ResettableMinGauge::with_context(MetricConfig::new("min"), context);

        assert!(!measure_of(|cb| gauge.get_measure(cb)).is_observable());

        gauge.update(5.0);
        gauge.update(9.0);
        gauge.update(2.0);
        let m = measure_of(|cb| gauge.get_measure(cb));
        assert!(m.is_observable());
        assert_eq!(m.value(), 2.0);

        gauge.reset();
        assert!(!measure_of(|cb| gauge.get_measure(cb)).is_observable());

        gauge.update(7.0);
        assert_eq!(measure_of(|cb| gauge.get_measure(cb)).value(), 7.0);
    }

    #[test]
    fn max_gauge_tracks_and_resets() {
        let context = ExecutionContext::new();
        let gauge = ResettableMaxGauge::with_context(MetricConfig::new("max"), context);

        gauge.update(5.0);
        gauge.update(2.0);
        gauge.update(9.0);
        assert_eq!(measure_of(|cb| gauge.get_measure(cb)).value(), 9.0);

        gauge.reset();
        assert!(!measure_of(|cb| gauge.get_measure(cb)).is_observable());
    }
}
