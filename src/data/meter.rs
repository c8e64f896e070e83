use crate::data::ewma::{Ewma, TICK_INTERVAL};
use crate::{ExecutionContext, MetricConfig, MetricValue, MetricValueSet, TimeUnit, ValueKind};
use parking_lot::Mutex;
use quanta::Instant;
use std::sync::Arc;
use std::time::Duration;

#[derive(Debug)]
struct MeterInner {
    count: i64,
    start: Instant,
    last_tick: Instant,
    m1: Ewma,
    m5: Ewma,
    m15: Ewma,
}

impl MeterInner {
    // Lazy catch-up: a long gap between marks is represented as decay, not
    // silently skipped.  Applies floor(elapsed / interval) ticks to all three
    // averages and advances the tick cursor by whole intervals.
    fn tick_if_necessary(&mut self, now: Instant) {
        let elapsed = now.duration_since(self.last_tick);
        let ticks = (elapsed.as_nanos() / TICK_INTERVAL.as_nanos()) as u64;
        for _ in 0..ticks {
            self.m1.tick();
            self.m5.tick();
            self.m15.tick();
        }
        if ticks > 0 {
            self.last_tick += Duration::from_nanos(TICK_INTERVAL.as_nanos() as u64 * ticks);
        }
    }

    fn mean_rate(&self, now: Instant, unit: TimeUnit) -> f64 {
        let elapsed = now.duration_since(self.start).as_secs_f64();
        if elapsed == 0.0 {
            0.0
        } else {
            self.count as f64 / elapsed * unit.per_second_factor()
        }
    }
}

/// Measures the rate at which events occur.
///
/// Combines a total event count with one, five, and fifteen-minute
/// exponentially-weighted moving averages.  Marking and every rate read first
/// perform lazy catch-up ticking against the context's clock, so rates stay
/// honest across long idle gaps.
#[derive(Clone, Debug)]
pub struct Meter {
    config: MetricConfig,
    context: ExecutionContext,
    rate_unit: TimeUnit,
    inner: Arc<Mutex<MeterInner>>,
}

impl Meter {
    /// Creates a `Meter` reporting events per second on the process-wide
    /// default context.
    pub fn new(config: MetricConfig) -> Meter {
        Self::with_context(config, ExecutionContext::for_current_process())
    }

    /// Creates a `Meter` reporting events per second on the given context.
    pub fn with_context(config: MetricConfig, context: ExecutionContext) -> Meter {
        Self::with_rate_unit(config, TimeUnit::Seconds, context)
    }

    /// Creates a `Meter` reporting events per `rate_unit` on the given
    /// context.
    pub fn with_rate_unit(
        config: MetricConfig,
        rate_unit: TimeUnit,
        context: ExecutionContext,
    ) -> Meter {
        let now = context.tick();
        let inner = MeterInner {
            count: 0,
            start: now,
            last_tick: now,
            m1: Ewma::one_minute(),
            m5: Ewma::five_minute(),
            m15: Ewma::fifteen_minute(),
        };
        Meter { config, context, rate_unit, inner: Arc::new(Mutex::new(inner)) }
    }

    /// Marks the occurrence of one event.
    pub fn mark(&self) {
        self.mark_by(1);
    }

    /// Marks the occurrence of `n` events.
    pub fn mark_by(&self, n: i64) {
        let this = self.clone();
        self.context.submit(move || this.record(n));
    }

    /// Delivers the total event count to `f`.
    pub fn get_count<F>(&self, f: F)
    where
        F: FnOnce(i64) + Send + 'static,
    {
        let inner = self.inner.clone();
        self.context.submit(move || {
            f(inner.lock().count);
        });
    }

    /// Delivers the mean rate since construction, in events per the
    /// configured rate unit, to `f`.
    pub fn get_mean_rate<F>(&self, f: F)
    where
        F: FnOnce(f64) + Send + 'static,
    {
        let this = self.clone();
        self.context.submit(move || {
            let now = this.context.tick();
            let mut inner = this.inner.lock();
            inner.tick_if_necessary(now);
            f(inner.mean_rate(now, this.rate_unit));
        });
    }

    /// Delivers the one-minute moving average rate to `f`.
    pub fn get_one_minute_rate<F>(&self, f: F)
    where
        F: FnOnce(f64) + Send + 'static,
    {
        self.get_rate(f, |inner| &inner.m1);
    }

    /// Delivers the five-minute moving average rate to `f`.
    pub fn get_five_minute_rate<F>(&self, f: F)
    where
        F: FnOnce(f64) + Send + 'static,
    {
        self.get_rate(f, |inner| &inner.m5);
    }

    /// Delivers the fifteen-minute moving average rate to `f`.
    pub fn get_fifteen_minute_rate<F>(&self, f: F)
    where
        F: FnOnce(f64) + Send + 'static,
    {
        self.get_rate(f, |inner| &inner.m15);
    }

    fn get_rate<F>(&self, f: F, select: fn(&MeterInner) -> &Ewma)
    where
        F: FnOnce(f64) + Send + 'static,
    {
        let this = self.clone();
        self.context.submit(move || {
            let now = this.context.tick();
            let mut inner = this.inner.lock();
            inner.tick_if_necessary(now);
            f(select(&inner).rate(this.rate_unit));
        });
    }

    /// Delivers the count and all four rates as one consistent
    /// [`MetricValueSet`] to `f`.
    pub fn report<F>(&self, f: F)
    where
        F: FnOnce(MetricValueSet) + Send + 'static,
    {
        let requested = self.context.tick();
        let this = self.clone();
        self.context.submit(move || {
            let now = this.context.tick();
            let mut inner = this.inner.lock();
            inner.tick_if_necessary(now);
            let values = this.collect(&inner, now);
            f(MetricValueSet::new(this.config.clone(), values, requested));
        });
    }

    /// Identity of this meter.
    pub fn config(&self) -> &MetricConfig {
        &self.config
    }

    /// Marks directly, bypassing submission.
    ///
    /// Only for use from a task already running on this meter's context.
    pub(crate) fn record(&self, n: i64) {
        let now = self.context.tick();
        let mut inner = self.inner.lock();
        inner.tick_if_necessary(now);
        inner.count += n;
        inner.m1.update(n as f64);
        inner.m5.update(n as f64);
        inner.m15.update(n as f64);
    }

    /// Collects reportable values, bypassing submission.
    ///
    /// Only for use from a task already running on this meter's context.
    pub(crate) fn collect_direct(&self) -> Vec<MetricValue> {
        let now = self.context.tick();
        let mut inner = self.inner.lock();
        inner.tick_if_necessary(now);
        self.collect(&inner, now)
    }

    fn collect(&self, inner: &MeterInner, now: Instant) -> Vec<MetricValue> {
        let unit = format!("events/{}", self.rate_unit);
        vec![
            MetricValue::new(ValueKind::Count, inner.count as f64),
            MetricValue::with_unit(
                ValueKind::MeanRate,
                inner.mean_rate(now, self.rate_unit),
                unit.clone(),
            ),
            MetricValue::with_unit(
                ValueKind::OneMinuteRate,
                inner.m1.rate(self.rate_unit),
                unit.clone(),
            ),
            MetricValue::with_unit(
                ValueKind::FiveMinuteRate,
                inner.m5.rate(self.rate_unit),
                unit.clone(),
            ),
            MetricValue::with_unit(
                ValueKind::FifteenMinuteRate,
                inner.m15.rate(self.rate_unit),
                unit,
            ),
        ]
    }
}

#[derive(Debug)]
struct ManualMeterInner {
    count: i64,
    m1: Ewma,
    m5: Ewma,
    m15: Ewma,
}

/// A [`Meter`] whose ticking is driven by the caller instead of a clock.
///
/// Marking never consults time; each explicit [`tick`](ManualMeter::tick)
/// stands for one five-second interval.  Useful when event time is decoupled
/// from wall-clock time, such as replaying recorded traffic.
#[derive(Clone, Debug)]
pub struct ManualMeter {
    config: MetricConfig,
    context: ExecutionContext,
    rate_unit: TimeUnit,
    inner: Arc<Mutex<ManualMeterInner>>,
}

impl ManualMeter {
    /// Creates a `ManualMeter` reporting events per second on the
    /// process-wide default context.
    pub fn new(config: MetricConfig) -> ManualMeter {
        Self::with_rate_unit(config, TimeUnit::Seconds, ExecutionContext::for_current_process())
    }

    /// Creates a `ManualMeter` reporting events per `rate_unit` on the given
    /// context.
    pub fn with_rate_unit(
        config: MetricConfig,
        rate_unit: TimeUnit,
        context: ExecutionContext,
    ) -> ManualMeter {
        let inner = ManualMeterInner {
            count: 0,
            m1: Ewma::one_minute(),
            m5: Ewma::five_minute(),
            m15: Ewma::fifteen_minute(),
        };
        ManualMeter { config, context, rate_unit, inner: Arc::new(Mutex::new(inner)) }
    }

    /// Marks the occurrence of one event.
    pub fn mark(&self) {
        self.mark_by(1);
    }

    /// Marks the occurrence of `n` events.
    pub fn mark_by(&self, n: i64) {
        let inner = self.inner.clone();
        self.context.submit(move || {
            let mut inner = inner.lock();
            inner.count += n;
            inner.m1.update(n as f64);
            inner.m5.update(n as f64);
            inner.m15.update(n as f64);
        });
    }

    /// Advances all three moving averages by one tick interval.
    pub fn tick(&self) {
        let inner = self.inner.clone();
        self.context.submit(move || {
            let mut inner = inner.lock();
            inner.m1.tick();
            inner.m5.tick();
            inner.m15.tick();
        });
    }

    /// Delivers the total event count to `f`.
    pub fn get_count<F>(&self, f: F)
    where
        F: FnOnce(i64) + Send + 'static,
    {
        let inner = self.inner.clone();
        self.context.submit(move || {
            f(inner.lock().count);
        });
    }

    /// Delivers the one-minute moving average rate to `f`.
    pub fn get_one_minute_rate<F>(&self, f: F)
    where
        F: FnOnce(f64) + Send + 'static,
    {
        let inner = self.inner.clone();
        let unit = self.rate_unit;
        self.context.submit(move || {
            f(inner.lock().m1.rate(unit));
        });
    }

    /// Delivers the count and the three moving average rates as one
    /// consistent [`MetricValueSet`] to `f`.
    pub fn report<F>(&self, f: F)
    where
        F: FnOnce(MetricValueSet) + Send + 'static,
    {
        let requested = self.context.tick();
        let this = self.clone();
        self.context.submit(move || {
            let inner = this.inner.lock();
            let unit = format!("events/{}", this.rate_unit);
            let values = vec![
                MetricValue::new(ValueKind::Count, inner.count as f64),
                MetricValue::with_unit(
                    ValueKind::OneMinuteRate,
                    inner.m1.rate(this.rate_unit),
                    unit.clone(),
                ),
                MetricValue::with_unit(
                    ValueKind::FiveMinuteRate,
                    inner.m5.rate(this.rate_unit),
                    unit.clone(),
                ),
                MetricValue::with_unit(
                    ValueKind::FifteenMinuteRate,
                    inner.m15.rate(this.rate_unit),
                    unit,
                ),
            ];
            f(MetricValueSet::new(this.config.clone(), values, requested));
        });
    }

    /// Identity of this meter.
    pub fn config(&self) -> &MetricConfig {
        &self.config
    }
}

#[cfg(test)]
mod tests {
    use super::{ManualMeter, Meter};
    use crate::{ExecutionContext, MetricConfig, TimeUnit, ValueKind};
    use approx::assert_relative_eq;
    use quanta::Clock;
    use std::sync::mpsc;
    use std::time::Duration;

    fn mocked_meter() -> (Meter, ExecutionContext, std::sync::Arc<quanta::Mock>) {
        let (clock, mock) = Clock::mock();
        let context = ExecutionContext::with_clock(clock);
        let meter =
            Meter::with_rate_unit(MetricConfig::new("meter"), TimeUnit::Seconds, context.clone());
        (meter, context, mock)
    }

    fn one_minute_rate(meter: &Meter) -> f64 {
        let (tx, rx) = mpsc::channel();
        meter.get_one_minute_rate(move |rate| {
            let _ = tx.send(rate);
        });
        rx.recv().unwrap()
    }

    #[test]
    fn rates_are_zero_before_first_interval() {
        let (meter, context, _mock) = mocked_meter();
        meter.mark_by(100);
        context.flush();
        assert_eq!(one_minute_rate(&meter), 0.0);
    }

    #[test]
    fn rate_reflects_marks_after_one_interval() {
        let (meter, context, mock) = mocked_meter();

        meter.mark_by(50);
        context.flush();
        mock.increment(Duration::from_secs(5));

        // The read itself performs the catch-up tick.
        assert_relative_eq!(one_minute_rate(&meter), 10.0);
    }

    #[test]
    fn idle_gap_decays_instead_of_skipping() {
        let (meter, context, mock) = mocked_meter();

        meter.mark_by(50);
        context.flush();
        mock.increment(Duration::from_secs(5));
        assert_relative_eq!(one_minute_rate(&meter), 10.0);

        // A full idle minute is twelve missed ticks worth of decay.
        mock.increment(Duration::from_secs(60));
        assert_relative_eq!(
            one_minute_rate(&meter),
            10.0 * (-1.0_f64).exp(),
            max_relative = 1e-9
        );
    }

    #[test]
    fn mean_rate_is_count_over_elapsed() {
        let (meter, context, mock) = mocked_meter();

        meter.mark_by(50);
        context.flush();
        mock.increment(Duration::from_secs(25));

        let (tx, rx) = mpsc::channel();
        meter.get_mean_rate(move |rate| {
            let _ = tx.send(rate);
        });
        assert_relative_eq!(rx.recv().unwrap(), 2.0);
    }

    #[test]
    fn report_is_consistent() {
        let (meter, context, mock) = mocked_meter();

        meter.mark_by(10);
        context.flush();
        mock.increment(Duration::from_secs(5));

        let (tx, rx) = mpsc::channel();
        meter.report(move |set| {
            let _ = tx.send(set);
        });
        let set = rx.recv().unwrap();

        assert_eq!(set.get(ValueKind::Count).unwrap().value(), 10.0);
        assert_relative_eq!(set.get(ValueKind::OneMinuteRate).unwrap().value(), 2.0);
        assert_eq!(set.get(ValueKind::OneMinuteRate).unwrap().unit(), Some("events/s"));
    }

    #[test]
    fn manual_meter_ticks_on_demand() {
        let context = ExecutionContext::new();
        let meter = ManualMeter::with_rate_unit(
            MetricConfig::new("manual"),
            TimeUnit::Seconds,
            context.clone(),
        );

        meter.mark_by(15);
        let (tx, rx) = mpsc::channel();
        let early = tx.clone();
        meter.get_one_minute_rate(move |rate| {
            let _ = early.send(rate);
        });
        meter.tick();
        meter.get_one_minute_rate(move |rate| {
            let _ = tx.send(rate);
        });

        assert_eq!(rx.recv().unwrap(), 0.0);
        assert_relative_eq!(rx.recv().unwrap(), 3.0);
    }
}
