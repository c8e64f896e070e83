use crate::data::reservoir::{SamplingReservoir, DEFAULT_RESERVOIR_SIZE};
use crate::data::snapshot::Snapshot;
use crate::{ExecutionContext, MetricConfig, MetricValue, MetricValueSet, ValueKind};
use parking_lot::Mutex;
use std::sync::Arc;

const REPORTED_QUANTILES: [f64; 6] = [0.5, 0.75, 0.95, 0.98, 0.99, 0.999];

#[derive(Debug)]
struct HistogramInner {
    count: u64,
    min: f64,
    max: f64,
    sum: f64,
    // Welford's online variance accumulators.
    m: f64,
    s: f64,
    reservoir: SamplingReservoir,
}

impl HistogramInner {
    fn record(&mut self, value: f64) {
        self.count += 1;
        if self.count == 1 {
            self.min = value;
            self.max = value;
            self.m = value;
            self.s = 0.0;
        } else {
            self.min = self.min.min(value);
            self.max = self.max.max(value);
            let old_m = self.m;
            self.m += (value - old_m) / self.count as f64;
            self.s += (value - old_m) * (value - self.m);
        }
        self.sum += value;
        self.reservoir.push(value);
    }

    fn mean(&self) -> f64 {
        if self.count == 0 {
            0.0
        } else {
            self.sum / self.count as f64
        }
    }

    fn std_dev(&self) -> f64 {
        if self.count > 1 {
            (self.s / (self.count - 1) as f64).sqrt()
        } else {
            0.0
        }
    }
}

/// Measures the statistical distribution of a stream of values.
///
/// Count, min, max, mean, and variance are maintained in O(1) per update via
/// Welford's method; order statistics are approximated lazily from a uniform
/// sampling reservoir via [`get_snapshot`](Histogram::get_snapshot).
///
/// An empty histogram reports zero for every value, observable.
#[derive(Clone, Debug)]
pub struct Histogram {
    config: MetricConfig,
    context: ExecutionContext,
    inner: Arc<Mutex<HistogramInner>>,
}

impl Histogram {
    /// Creates a `Histogram` on the process-wide default context.
    pub fn new(config: MetricConfig) -> Histogram {
        Self::with_context(config, ExecutionContext::for_current_process())
    }

    /// Creates a `Histogram` on the given context.
    pub fn with_context(config: MetricConfig, context: ExecutionContext) -> Histogram {
        let inner = HistogramInner {
            count: 0,
            min: 0.0,
            max: 0.0,
            sum: 0.0,
            m: 0.0,
            s: 0.0,
            reservoir: SamplingReservoir::with_capacity(DEFAULT_RESERVOIR_SIZE),
        };
        Histogram { config, context, inner: Arc::new(Mutex::new(inner)) }
    }

    /// Records a value.
    pub fn update(&self, value: f64) {
        let inner = self.inner.clone();
        self.context.submit(move || {
            inner.lock().record(value);
        });
    }

    /// Delivers the number of recorded values to `f`.
    pub fn get_count<F>(&self, f: F)
    where
        F: FnOnce(u64) + Send + 'static,
    {
        let inner = self.inner.clone();
        self.context.submit(move || {
            f(inner.lock().count);
        });
    }

    /// Delivers a [`Snapshot`] of the reservoir's current contents to `f`,
    /// for percentile queries.
    pub fn get_snapshot<F>(&self, f: F)
    where
        F: FnOnce(Snapshot) + Send + 'static,
    {
        let inner = self.inner.clone();
        self.context.submit(move || {
            let snapshot = inner.lock().reservoir.snapshot();
            f(snapshot);
        });
    }

    /// Delivers count, min, max, mean, standard deviation, and the standard
    /// percentiles as one consistent [`MetricValueSet`] to `f`.
    pub fn report<F>(&self, f: F)
    where
        F: FnOnce(MetricValueSet) + Send + 'static,
    {
        let requested = self.context.tick();
        let this = self.clone();
        self.context.submit(move || {
            let values = this.collect_direct();
            f(MetricValueSet::new(this.config.clone(), values, requested));
        });
    }

    /// Identity of this histogram.
    pub fn config(&self) -> &MetricConfig {
        &self.config
    }

    /// Records directly, bypassing submission.
    ///
    /// Only for use from a task already running on this histogram's context.
    pub(crate) fn record(&self, value: f64) {
        self.inner.lock().record(value);
    }

    /// Collects reportable values, bypassing submission.
    ///
    /// Only for use from a task already running on this histogram's context.
    pub(crate) fn collect_direct(&self) -> Vec<MetricValue> {
        let inner = self.inner.lock();
        let snapshot = inner.reservoir.snapshot();

        let mut values = vec![
            MetricValue::new(ValueKind::Count, inner.count as f64),
            MetricValue::new(ValueKind::Min, inner.min),
            MetricValue::new(ValueKind::Max, inner.max),
            MetricValue::new(ValueKind::Mean, inner.mean()),
            MetricValue::new(ValueKind::StdDev, inner.std_dev()),
        ];
        for q in REPORTED_QUANTILES {
            values.push(MetricValue::new(ValueKind::Percentile(q), snapshot.quantile(q)));
        }
        values
    }
}
