use crate::data::{Counter, ResettableMaxGauge, ResettableMinGauge};
use crate::error::BucketTimerError;
use crate::{
    ExecutionContext, Measure, MetricConfig, MetricValue, MetricValueSet, TimeUnit, ValueKind,
};
use std::sync::Arc;
use std::time::Duration;

#[derive(Debug)]
struct BucketTimerInner {
    total_time: Counter,
    count: Counter,
    min: ResettableMinGauge,
    max: ResettableMaxGauge,
    // Ascending boundary, expressed in the timer's unit, with its counter.
    buckets: Vec<(u64, Counter)>,
    overflow: Counter,
}

/// Measures operation durations classified into fixed buckets.
///
/// A composite holding a total-time counter, a total count, per-window
/// min/max gauges, one counter per configured boundary, and one overflow
/// counter -- all namespaced under the timer's identity with `statistic` and
/// `bucket` tags, all sharing the timer's context.
///
/// A recorded duration increments exactly one bucket counter: the first
/// boundary greater than or equal to the duration converted into the timer's
/// unit, or overflow when none matches.  Boundaries must be supplied strictly
/// ascending and duplicate-free; anything else is a construction-time error.
#[derive(Clone, Debug)]
pub struct BucketTimer {
    config: MetricConfig,
    context: ExecutionContext,
    unit: TimeUnit,
    inner: Arc<BucketTimerInner>,
}

impl BucketTimer {
    /// Creates a `BucketTimer` on the process-wide default context.
    ///
    /// `boundaries` are thresholds in `unit`, strictly ascending.
    pub fn new(
        config: MetricConfig,
        unit: TimeUnit,
        boundaries: &[u64],
    ) -> Result<BucketTimer, BucketTimerError> {
        Self::with_context(config, unit, boundaries, ExecutionContext::for_current_process())
    }

    /// Creates a `BucketTimer` on the given context.
    pub fn with_context(
        config: MetricConfig,
        unit: TimeUnit,
        boundaries: &[u64],
        context: ExecutionContext,
    ) -> Result<BucketTimer, BucketTimerError> {
        if boundaries.is_empty() {
            return Err(BucketTimerError::EmptyBoundaries);
        }
        for pair in boundaries.windows(2) {
            if pair[0] >= pair[1] {
                return Err(BucketTimerError::NonAscendingBoundaries {
                    prev: pair[0],
                    next: pair[1],
                });
            }
        }

        let buckets = boundaries
            .iter()
            .map(|boundary| {
                let tag = format!("{}{}", boundary, unit.abbreviation());
                let counter =
                    Counter::with_context(config.with_tag("bucket", tag), context.clone());
                (*boundary, counter)
            })
            .collect();

        let inner = BucketTimerInner {
            total_time: Counter::with_context(
                config.with_tag("statistic", "total"),
                context.clone(),
            ),
            count: Counter::with_context(config.with_tag("statistic", "count"), context.clone()),
            min: ResettableMinGauge::with_context(
                config.with_tag("statistic", "min"),
                context.clone(),
            ),
            max: ResettableMaxGauge::with_context(
                config.with_tag("statistic", "max"),
                context.clone(),
            ),
            buckets,
            overflow: Counter::with_context(
                config.with_tag("bucket", "overflow"),
                context.clone(),
            ),
        };
        Ok(BucketTimer { config, context, unit, inner: Arc::new(inner) })
    }

    /// Records one completed operation of the given duration.
    ///
    /// Zero-length durations are ignored.  All sub-metrics are updated under
    /// one serialized task, and exactly one bucket counter is incremented.
    pub fn update(&self, duration: Duration) {
        if duration.is_zero() {
            return;
        }
        let this = self.clone();
        self.context.submit(move || {
            let nanos = duration.as_nanos() as f64;
            this.inner.total_time.apply(duration.as_nanos() as i64);
            this.inner.min.record(nanos);
            this.inner.max.record(nanos);
            this.inner.count.apply(1);

            let converted = this.unit.convert(duration);
            // First boundary >= the converted duration wins; this early-exit
            // scan is the classification rule, there is no rounding to the
            // nearest bucket.
            let bucket = this
                .inner
                .buckets
                .iter()
                .find(|(boundary, _)| converted <= *boundary as f64)
                .map(|(_, counter)| counter)
                .unwrap_or(&this.inner.overflow);
            bucket.apply(1);
        });
    }

    /// Returns the min/max gauges to their unobservable state, starting a new
    /// reporting window.
    pub fn reset_extremes(&self) {
        let this = self.clone();
        self.context.submit(move || {
            this.inner.min.reset_direct();
            this.inner.max.reset_direct();
        });
    }

    /// Delivers every sub-metric's value as one consistent
    /// [`MetricValueSet`] to `f`.
    ///
    /// Bucket counters are reported as [`ValueKind::Count`] values whose unit
    /// carries the bucket tag; min and max are omitted while unobservable.
    pub fn report<F>(&self, f: F)
    where
        F: FnOnce(MetricValueSet) + Send + 'static,
    {
        let requested = self.context.tick();
        let this = self.clone();
        self.context.submit(move || {
            let inner = &this.inner;
            let mut values = vec![
                MetricValue::with_unit(
                    ValueKind::Total,
                    inner.total_time.peek() as f64,
                    TimeUnit::Nanoseconds.abbreviation(),
                ),
                MetricValue::new(ValueKind::Count, inner.count.peek() as f64),
            ];

            let min = inner.min.measure_direct(requested);
            if min.is_observable() {
                values.push(MetricValue::with_unit(
                    ValueKind::Min,
                    min.value(),
                    TimeUnit::Nanoseconds.abbreviation(),
                ));
            }
            let max = inner.max.measure_direct(requested);
            if max.is_observable() {
                values.push(MetricValue::with_unit(
                    ValueKind::Max,
                    max.value(),
                    TimeUnit::Nanoseconds.abbreviation(),
                ));
            }

            for (boundary, counter) in &inner.buckets {
                values.push(MetricValue::with_unit(
                    ValueKind::Count,
                    counter.peek() as f64,
                    format!("bucket={}{}", boundary, this.unit.abbreviation()),
                ));
            }
            values.push(MetricValue::with_unit(
                ValueKind::Count,
                inner.overflow.peek() as f64,
                "bucket=overflow",
            ));

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
        let sub_metrics = (5 + self.inner.buckets.len()) as f64;
        self.context.submit(move || {
            f(Measure::observable(config, sub_metrics, requested));
        });
    }

    /// Identity of this timer.
    pub fn config(&self) -> &MetricConfig {
        &self.config
    }

    /// The unit bucket boundaries are expressed in.
    pub fn unit(&self) -> TimeUnit {
        self.unit
    }

    #[cfg(test)]
    fn bucket_count(&self, index: usize) -> i64 {
        self.context.flush();
        self.inner.buckets[index].1.peek()
    }

    #[cfg(test)]
    fn overflow_count(&self) -> i64 {
        self.context.flush();
        self.inner.overflow.peek()
    }
}
