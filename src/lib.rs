//! Actor-style runtime metrics instrumentation.
//!
//! `pulse-metrics` lets application code record counters, gauges, rates,
//! histograms and timers, and later retrieve point-in-time values of each,
//! while guaranteeing that concurrent updates to the same metric never race
//! and never block the caller indefinitely.
//!
//! # Design
//!
//! Instead of locking, every metric is attached to an [`ExecutionContext`]: a
//! serialized task queue with a single consumer and an owned clock.  Every
//! operation that touches a metric's state -- mutation or read -- is handed to
//! the context as a task.  Tasks submitted to the same context execute strictly
//! in submission order, one at a time, so a metric's state is only ever touched
//! from one thread while producers remain entirely lock-free and non-blocking.
//!
//! Reads are asynchronous by callback: rather than returning a value, the
//! observation methods take a closure which is invoked with the result when the
//! context reaches that read in queue order.
//!
//! ```rust
//! use pulse_metrics::{Counter, MetricConfig};
//! use std::sync::mpsc;
//!
//! let requests = Counter::new(MetricConfig::new("requests").with_tag("endpoint", "/login"));
//! requests.increment();
//! requests.increment_by(4);
//!
//! // Reads deliver through a callback once the queue reaches them.
//! let (tx, rx) = mpsc::channel();
//! requests.get_count(move |count, _when| {
//!     let _ = tx.send(count);
//! });
//! assert_eq!(rx.recv().unwrap(), 5);
//! ```
//!
//! # Metrics
//!
//! * [`Counter`] -- a signed accumulator.
//! * [`Gauge`], [`CallableGauge`], [`ResettableMinGauge`], [`ResettableMaxGauge`]
//!   -- point-in-time values.
//! * [`Meter`] / [`ManualMeter`] -- throughput with 1/5/15-minute
//!   exponentially-weighted moving averages.
//! * [`Histogram`] -- online min/max/mean/stddev plus reservoir-sampled
//!   percentiles.
//! * [`Timer`] -- operation durations: a histogram of elapsed time paired with
//!   a meter of call throughput.
//! * [`BucketTimer`] -- durations classified into fixed, ascending buckets.
//!
//! Composite metrics keep all of their sub-metrics on one shared context so
//! that a single report reflects one consistent point in the update stream.
//!
//! # Time
//!
//! Clocks come from [`quanta`]; tests substitute [`quanta::Clock::mock`] and a
//! private context to drive time deterministically.
#![deny(missing_docs)]

use std::borrow::Cow;

// Clocks and timestamps come straight from quanta; re-exported so callers can
// name them without depending on it directly.
pub use quanta::{Clock, Instant};

mod config;
mod context;
pub mod data;
mod error;
mod measure;
mod unit;

/// An allocation-optimized string for metric names and tag parts.
///
/// Permits static strings to be shared without copying, while still accepting
/// owned strings when names are built at runtime.
pub type SharedString = Cow<'static, str>;

pub use self::{
    config::{IntoTags, MetricConfig, Tag},
    context::ExecutionContext,
    data::{
        BucketTimer, CallableGauge, Counter, Ewma, Gauge, Histogram, ManualMeter, Meter,
        ResettableMaxGauge, ResettableMinGauge, Snapshot, StartedTimer, Timer, TICK_INTERVAL,
    },
    error::BucketTimerError,
    measure::{Measure, MetricValue, MetricValueSet, ValueKind},
    unit::TimeUnit,
};
