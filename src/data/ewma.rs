use crate::TimeUnit;
use std::time::Duration;

/// The expected interval between [`Ewma::tick`] calls for the standard
/// one/five/fifteen-minute windows.
pub const TICK_INTERVAL: Duration = Duration::from_secs(5);

const TICK_INTERVAL_SECS: f64 = 5.0;

/// An exponentially-weighted moving average of an event rate.
///
/// A decaying rate estimator: updates accumulate into an uncounted sum, and
/// each [`tick`](Ewma::tick) folds that sum into the average with a per-window
/// decay constant (alpha).  The rate is only meaningful after at least one
/// tick; before that it reports zero.
///
/// This is a plain value type with no queue discipline of its own; it is
/// normally owned by a [`Meter`](crate::Meter), which serializes access
/// through its context and drives ticking from its clock.
#[derive(Clone, Debug)]
pub struct Ewma {
    alpha: f64,
    interval_secs: f64,
    uncounted: f64,
    rate: f64,
    initialized: bool,
}

impl Ewma {
    /// Creates an `Ewma` with an explicit decay factor and tick interval.
    pub fn with_alpha(alpha: f64, interval: Duration) -> Ewma {
        Ewma { alpha, interval_secs: interval.as_secs_f64(), uncounted: 0.0, rate: 0.0, initialized: false }
    }

    /// Creates an `Ewma` averaging over a one-minute window, ticked every
    /// five seconds: alpha is `1 - e^(-5/60)`.
    pub fn one_minute() -> Ewma {
        Self::with_alpha(1.0 - (-TICK_INTERVAL_SECS / 60.0).exp(), TICK_INTERVAL)
    }

    /// Creates an `Ewma` averaging over a five-minute window, ticked every
    /// five seconds: alpha is `1 - e^(-5/300)`.
    pub fn five_minute() -> Ewma {
        Self::with_alpha(1.0 - (-TICK_INTERVAL_SECS / 300.0).exp(), TICK_INTERVAL)
    }

    /// Creates an `Ewma` averaging over a fifteen-minute window, ticked every
    /// five seconds: alpha is `1 - e^(-5/900)`.
    pub fn fifteen_minute() -> Ewma {
        Self::with_alpha(1.0 - (-TICK_INTERVAL_SECS / 900.0).exp(), TICK_INTERVAL)
    }

    /// Adds `n` events to the uncounted sum.
    ///
    /// Safe to call any number of times between ticks.
    pub fn update(&mut self, n: f64) {
        self.uncounted += n;
    }

    /// Folds the uncounted sum into the average.
    ///
    /// The very first tick seeds the rate with the instantaneous rate of the
    /// interval just ended; subsequent ticks decay towards it.
    pub fn tick(&mut self) {
        let instant_rate = self.uncounted / self.interval_secs;
        self.uncounted = 0.0;

        if self.initialized {
            self.rate += self.alpha * (instant_rate - self.rate);
        } else {
            self.rate = instant_rate;
            self.initialized = true;
        }
    }

    /// The current rate, in events per `unit`.
    pub fn rate(&self, unit: TimeUnit) -> f64 {
        self.rate * unit.per_second_factor()
    }

    /// Whether at least one tick has occurred.
    pub fn is_initialized(&self) -> bool {
        self.initialized
    }
}
