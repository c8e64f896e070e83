use crate::{MetricConfig, SharedString};
use quanta::Instant;
use std::fmt;
use std::slice::Iter;

/// An immutable snapshot of a single metric value.
///
/// Carries the numeric value, the [`MetricConfig`] that produced it, the time
/// the observation was requested, and a validity flag: a freshly-reset min/max
/// gauge, for example, has no meaningful value until its next update and
/// reports an unobservable measure.
#[derive(Clone, Debug)]
pub struct Measure {
    config: MetricConfig,
    value: f64,
    observable: bool,
    timestamp: Instant,
}

impl Measure {
    /// Creates a measure holding a meaningful value.
    pub fn observable(config: MetricConfig, value: f64, timestamp: Instant) -> Measure {
        Measure { config, value, observable: true, timestamp }
    }

    /// Creates a measure whose value is not (yet) meaningful.
    pub fn unobservable(config: MetricConfig, timestamp: Instant) -> Measure {
        Measure { config, value: 0.0, observable: false, timestamp }
    }

    /// The numeric value.  Zero when the measure is not observable.
    pub fn value(&self) -> f64 {
        self.value
    }

    /// Whether the value is meaningful.
    pub fn is_observable(&self) -> bool {
        self.observable
    }

    /// Identity of the metric that produced this measure.
    pub fn config(&self) -> &MetricConfig {
        &self.config
    }

    /// When the observation was requested.
    pub fn timestamp(&self) -> Instant {
        self.timestamp
    }
}

/// The kind of value carried by a [`MetricValue`].
#[derive(Clone, Copy, Debug, PartialEq)]
pub enum ValueKind {
    /// Number of observations.
    Count,
    /// Sum of all observations.
    Total,
    /// Smallest observation.
    Min,
    /// Largest observation.
    Max,
    /// Arithmetic mean of observations.
    Mean,
    /// Sample standard deviation of observations.
    StdDev,
    /// Rate since the metric was created.
    MeanRate,
    /// Exponentially-decayed rate over the last minute.
    OneMinuteRate,
    /// Exponentially-decayed rate over the last five minutes.
    FiveMinuteRate,
    /// Exponentially-decayed rate over the last fifteen minutes.
    FifteenMinuteRate,
    /// An order statistic, expressed as a quantile in `[0.0, 1.0]`.
    Percentile(f64),
}

impl fmt::Display for ValueKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ValueKind::Count => f.write_str("count"),
            ValueKind::Total => f.write_str("total"),
            ValueKind::Min => f.write_str("min"),
            ValueKind::Max => f.write_str("max"),
            ValueKind::Mean => f.write_str("mean"),
            ValueKind::StdDev => f.write_str("stddev"),
            ValueKind::MeanRate => f.write_str("mean_rate"),
            ValueKind::OneMinuteRate => f.write_str("m1_rate"),
            ValueKind::FiveMinuteRate => f.write_str("m5_rate"),
            ValueKind::FifteenMinuteRate => f.write_str("m15_rate"),
            ValueKind::Percentile(q) => {
                // Renders the familiar abbreviated form: 0.99 -> "p99",
                // 0.999 -> "p999".
                let label = format!("p{}", q * 100.0).replace('.', "");
                f.write_str(&label)
            }
        }
    }
}

/// A single named value reported by a metric, optionally carrying a unit.
#[derive(Clone, Debug)]
pub struct MetricValue {
    kind: ValueKind,
    value: f64,
    unit: Option<SharedString>,
}

impl MetricValue {
    /// Creates a unit-less `MetricValue`.
    pub fn new(kind: ValueKind, value: f64) -> MetricValue {
        MetricValue { kind, value, unit: None }
    }

    /// Creates a `MetricValue` carrying a unit string.
    pub fn with_unit<U>(kind: ValueKind, value: f64, unit: U) -> MetricValue
    where
        U: Into<SharedString>,
    {
        MetricValue { kind, value, unit: Some(unit.into()) }
    }

    /// Kind of this value.
    pub fn kind(&self) -> ValueKind {
        self.kind
    }

    /// The numeric value.
    pub fn value(&self) -> f64 {
        self.value
    }

    /// Unit of this value, if any.
    pub fn unit(&self) -> Option<&str> {
        self.unit.as_deref()
    }
}

/// A set of named values reported by one metric in one observation.
///
/// Produced by the multi-value `report` path of meters, histograms, and
/// timers: all values in a set are read under a single serialized task, so
/// they reflect one consistent point in the metric's update stream.
#[derive(Clone, Debug)]
pub struct MetricValueSet {
    config: MetricConfig,
    values: Vec<MetricValue>,
    timestamp: Instant,
}

impl MetricValueSet {
    /// Creates a `MetricValueSet` from the originating config and its values.
    pub fn new(config: MetricConfig, values: Vec<MetricValue>, timestamp: Instant) -> Self {
        MetricValueSet { config, values, timestamp }
    }

    /// Identity of the metric that produced this set.
    pub fn config(&self) -> &MetricConfig {
        &self.config
    }

    /// The reported values.
    pub fn values(&self) -> Iter<'_, MetricValue> {
        self.values.iter()
    }

    /// Finds the first value of the given kind, if present.
    pub fn get(&self, kind: ValueKind) -> Option<&MetricValue> {
        self.values.iter().find(|v| v.kind() == kind)
    }

    /// When the observation was requested.
    pub fn timestamp(&self) -> Instant {
        self.timestamp
    }
}

#[cfg(test)]
mod tests {
    use super::{Measure, MetricValue, MetricValueSet, ValueKind};
    use crate::MetricConfig;
    use quanta::Clock;

    #[test]
    fn observable_flag() {
        let (clock, _mock) = Clock::mock();
        let now = clock.now();

        let m = Measure::observable(MetricConfig::new("m"), 3.5, now);
        assert!(m.is_observable());
        assert_eq!(m.value(), 3.5);

        let u = Measure::unobservable(MetricConfig::new("m"), now);
        assert!(!u.is_observable());
        assert_eq!(u.value(), 0.0);
    }

    #[test]
    fn percentile_labels() {
        assert_eq!(ValueKind::Percentile(0.5).to_string(), "p50");
        assert_eq!(ValueKind::Percentile(0.75).to_string(), "p75");
        assert_eq!(ValueKind::Percentile(0.99).to_string(), "p99");
        assert_eq!(ValueKind::Percentile(0.999).to_string(), "p999");
        assert_eq!(ValueKind::Count.to_string(), "count");
    }

    #[test]
    fn value_set_lookup() {
        let (clock, _mock) = Clock::mock();
        let set = MetricValueSet::new(
            MetricConfig::new("m"),
            vec![
                MetricValue::new(ValueKind::Count, 4.0),
                MetricValue::with_unit(ValueKind::Mean, 1.5, "ms"),
            ],
            clock.now(),
        );

        assert_eq!(set.get(ValueKind::Count).unwrap().value(), 4.0);
        let mean = set.get(ValueKind::Mean).unwrap();
        assert_eq!(mean.unit(), Some("ms"));
        assert!(set.get(ValueKind::Max).is_none());
    }
}
