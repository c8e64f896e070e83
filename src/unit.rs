use std::fmt;
use std::time::Duration;

/// A unit of time, used for expressing durations and rates.
///
/// Timers convert recorded durations into their configured unit before feeding
/// them to their distribution statistics, and meters express rates as events
/// per unit.
#[derive(PartialEq, Eq, Hash, Clone, Copy, Debug)]
pub enum TimeUnit {
    /// Billionths of a second.
    Nanoseconds,
    /// Millionths of a second.
    Microseconds,
    /// Thousandths of a second.
    Milliseconds,
    /// Seconds.
    Seconds,
    /// Sixty seconds.
    Minutes,
    /// Sixty minutes.
    Hours,
}

impl TimeUnit {
    /// Number of nanoseconds in one of this unit.
    pub fn nanos(&self) -> u64 {
        match self {
            TimeUnit::Nanoseconds => 1,
            TimeUnit::Microseconds => 1_000,
            TimeUnit::Milliseconds => 1_000_000,
            TimeUnit::Seconds => 1_000_000_000,
            TimeUnit::Minutes => 60_000_000_000,
            TimeUnit::Hours => 3_600_000_000_000,
        }
    }

    /// Abbreviated name of this unit, e.g. `ms` for milliseconds.
    pub fn abbreviation(&self) -> &'static str {
        match self {
            TimeUnit::Nanoseconds => "ns",
            TimeUnit::Microseconds => "us",
            TimeUnit::Milliseconds => "ms",
            TimeUnit::Seconds => "s",
            TimeUnit::Minutes => "min",
            TimeUnit::Hours => "h",
        }
    }

    /// Converts a duration into a fractional number of this unit.
    ///
    /// No rounding is performed: 10ms and 100ns converts to `10.0001`
    /// milliseconds, not `10.0`.
    pub fn convert(&self, duration: Duration) -> f64 {
        duration.as_nanos() as f64 / self.nanos() as f64
    }

    /// Number of seconds in one of this unit.
    pub fn per_second_factor(&self) -> f64 {
        self.nanos() as f64 / 1_000_000_000.0
    }
}

impl fmt::Display for TimeUnit {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.abbreviation())
    }
}

#[cfg(test)]
mod tests {
    use super::TimeUnit;
    use std::time::Duration;

    #[test]
    fn conversion_is_fractional() {
        let unit = TimeUnit::Milliseconds;
        assert_eq!(unit.convert(Duration::from_millis(10)), 10.0);
        assert!(unit.convert(Duration::new(0, 10_000_100)) > 10.0);
        assert_eq!(TimeUnit::Seconds.convert(Duration::from_millis(1500)), 1.5);
    }

    #[test]
    fn abbreviations() {
        assert_eq!(TimeUnit::Nanoseconds.to_string(), "ns");
        assert_eq!(TimeUnit::Minutes.to_string(), "min");
    }
}
