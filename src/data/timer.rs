use crate::data::{Histogram, Meter};
use crate::{ExecutionContext, Measure, MetricConfig, MetricValueSet, TimeUnit};
use quanta::Instant;
use std::time::Duration;

/// Measures the durations and throughput of an operation.
///
/// A composite pairing a [`Histogram`] of elapsed time, expressed in the
/// configured [`TimeUnit`], with a [`Meter`] of how often the operation runs.
/// Both sub-metrics share the timer's context and carry its identity plus a
/// `unit` tag, so a single [`report`](Timer::report) reflects one consistent
/// point in the update stream.
#[derive(Clone, Debug)]
pub struct Timer {
    config: MetricConfig,
    context: ExecutionContext,
    unit: TimeUnit,
    histogram: Histogram,
    meter: Meter,
}

impl Timer {
    /// Creates a `Timer` recording milliseconds on the process-wide default
    /// context.
    pub fn new(config: MetricConfig) -> Timer {
        Self::with_context(config, ExecutionContext::for_current_process())
    }

    /// Creates a `Timer` recording milliseconds on the given context.
    pub fn with_context(config: MetricConfig, context: ExecutionContext) -> Timer {
        Self::with_unit(config, TimeUnit::Milliseconds, context)
    }

    /// Creates a `Timer` recording durations in `unit` on the given context.
    pub fn with_unit(config: MetricConfig, unit: TimeUnit, context: ExecutionContext) -> Timer {
        let sub_config = config.with_tag("unit", unit.abbreviation());
        let histogram = Histogram::with_context(sub_config.clone(), context.clone());
        let meter = Meter::with_context(sub_config, context.clone());
        Timer { config, context, unit, histogram, meter }
    }

    /// Records one completed operation of the given duration.
    ///
    /// Zero-length durations are ignored.  The duration distribution and the
    /// throughput meter are updated under one serialized task.
    pub fn update(&self, duration: Duration) {
        if duration.is_zero() {
            return;
        }
        let this = self.clone();
        self.context.submit(move || this.record(duration));
    }

    /// Times the execution of `f`, recording its elapsed time.
    ///
    /// The duration is recorded even when `f` panics; the panic then
    /// propagates to the caller unchanged.
    pub fn time<T, F>(&self, f: F) -> T
    where
        F: FnOnce() -> T,
    {
        // Recording lives in the guard's drop so that unwinding still times
        // the failed call.
        let _guard = self.start();
        f()
    }

    /// Starts a manual stopwatch against this timer.
    ///
    /// For operations whose start and stop cannot be expressed as a single
    /// wrapped call.  [`StartedTimer::stop`] records the elapsed duration and
    /// returns it; dropping the guard unstopped records as well.
    pub fn start(&self) -> StartedTimer {
        StartedTimer { timer: self.clone(), started: self.context.tick(), stopped: false }
    }

    /// Delivers the duration distribution and throughput values as one
    /// consistent [`MetricValueSet`] to `f`.
    pub fn report<F>(&self, f: F)
    where
        F: FnOnce(MetricValueSet) + Send + 'static,
    {
        let requested = self.context.tick();
        let this = self.clone();
        self.context.submit(move || {
            let mut values = this.histogram.collect_direct();
            values.extend(this.meter.collect_direct());
            f(MetricValueSet::new(this.config.clone(), values, requested));
        });
    }

    /// Delivers this composite's sub-metric count as a [`Measure`] to `f`.
    pub fn get_measure<F>(&self, f: F)
    where
        F: FnOnce(Measure) + Send + 'static,
    {
        let requested = self.context.tick();
        let config = self.config.clone();
        self.context.submit(move || {
            f(Measure::observable(config, 2.0, requested));
        });
    }

    /// Identity of this timer.
    pub fn config(&self) -> &MetricConfig {
        &self.config
    }

    /// The unit durations are recorded in.
    pub fn unit(&self) -> TimeUnit {
        self.unit
    }

    fn record(&self, duration: Duration) {
        self.histogram.record(self.unit.convert(duration));
        self.meter.record(1);
    }
}

/// A running stopwatch handed out by [`Timer::start`].
#[derive(Debug)]
pub struct StartedTimer {
    timer: Timer,
    started: Instant,
    stopped: bool,
}

impl StartedTimer {
    /// Stops the clock, records the elapsed duration against the timer, and
    /// returns it.
    pub fn stop(mut self) -> Duration {
        self.stopped = true;
        let elapsed = self.elapsed();
        self.timer.update(elapsed);
        elapsed
    }

    /// Time elapsed since the stopwatch started, without stopping it.
    pub fn elapsed(&self) -> Duration {
        self.timer.context.tick().duration_since(self.started)
    }
}

impl Drop for StartedTimer {
    fn drop(&mut self) {
        if !self.stopped {
            self.timer.update(self.elapsed());
        }
    }
}
