//! End-to-end behavior of the metric engine across threads and composites.

use approx::assert_relative_eq;
use pulse_metrics::{
    BucketTimer, Counter, ExecutionContext, Meter, MetricConfig, MetricValueSet, TimeUnit, Timer,
    ValueKind,
};
use quanta::Clock;
use std::sync::mpsc;
use std::thread;
use std::time::Duration;

fn report_of<F>(report: F) -> MetricValueSet
where
    F: FnOnce(Box<dyn FnOnce(MetricValueSet) + Send>),
{
    let (tx, rx) = mpsc::channel();
    report(Box::new(move |set| {
        let _ = tx.send(set);
    }));
    rx.recv().unwrap()
}

// Any interleaving of mutations submitted from many threads must sum exactly:
// no update skipped, none applied twice, and a read submitted after all of
// them observes the algebraic sum.
#[test]
fn counter_updates_never_race() {
    let context = ExecutionContext::new();
    let counter = Counter::with_context(MetricConfig::new("contended"), context.clone());

    let threads: i64 = 8;
    let per_thread: i64 = 1_000;
    let handles: Vec<_> = (0..threads)
        .map(|i| {
            let counter = counter.clone();
            thread::spawn(move || {
                for _ in 0..per_thread {
                    if i % 2 == 0 {
                        counter.increment_by(3);
                    } else {
                        counter.decrement();
                    }
                }
            })
        })
        .collect();
    for handle in handles {
        handle.join().unwrap();
    }

    let (tx, rx) = mpsc::channel();
    counter.get_count(move |count, _| {
        let _ = tx.send(count);
    });

    let expected = (threads / 2) * per_thread * 3 - (threads / 2) * per_thread;
    assert_eq!(rx.recv().unwrap(), expected);
}

// Marking at a constant rate long enough converges the one-minute average to
// that rate.
#[test]
fn meter_converges_to_constant_rate() {
    let (clock, mock) = Clock::mock();
    let context = ExecutionContext::with_clock(clock);
    let meter = Meter::with_context(MetricConfig::new("steady"), context.clone());

    // 40 events per 5-second interval = 8 events/sec, held for 20 ticks.
    for _ in 0..20 {
        meter.mark_by(40);
        context.flush();
        mock.increment(Duration::from_secs(5));
    }

    let (tx, rx) = mpsc::channel();
    meter.get_one_minute_rate(move |rate| {
        let _ = tx.send(rate);
    });
    assert_relative_eq!(rx.recv().unwrap(), 8.0, max_relative = 0.05);
}

// A timer queried right after N updates, with nothing else submitted, must
// show both halves of the composite reflecting exactly those N updates.
#[test]
fn composite_report_is_atomic_under_shared_context() {
    let context = ExecutionContext::new();
    let timer =
        Timer::with_unit(MetricConfig::new("shared"), TimeUnit::Milliseconds, context.clone());

    let updates = 250;
    for i in 1..=updates {
        timer.update(Duration::from_millis(i));
    }
    let set = report_of(|cb| timer.report(cb));

    // Count appears once from the histogram and once from the meter; both
    // must agree.
    let counts: Vec<f64> = set
        .values()
        .filter(|v| v.kind() == ValueKind::Count)
        .map(|v| v.value())
        .collect();
    assert_eq!(counts, vec![updates as f64, updates as f64]);

    let expected_mean = (1..=updates).sum::<u64>() as f64 / updates as f64;
    assert_relative_eq!(set.get(ValueKind::Mean).unwrap().value(), expected_mean);
    assert_eq!(set.get(ValueKind::Max).unwrap().value(), updates as f64);
}

// Concurrent producers feeding one bucket timer: every update lands in
// exactly one bucket, so bucket counts plus overflow equal the total count.
#[test]
fn bucket_counters_partition_the_updates() {
    let context = ExecutionContext::new();
    let timer = BucketTimer::with_context(
        MetricConfig::new("latency"),
        TimeUnit::Milliseconds,
        &[5, 25, 100],
        context.clone(),
    )
    .unwrap();

    let handles: Vec<_> = (0..4)
        .map(|i| {
            let timer = timer.clone();
            thread::spawn(move || {
                for j in 1..=200u64 {
                    timer.update(Duration::from_millis(i * 37 + j));
                }
            })
        })
        .collect();
    for handle in handles {
        handle.join().unwrap();
    }

    let set = report_of(|cb| timer.report(cb));
    let total = set.get(ValueKind::Count).unwrap().value();
    assert_eq!(total, 800.0);

    let bucketed: f64 = set
        .values()
        .filter(|v| v.unit().is_some_and(|u| u.starts_with("bucket=")))
        .map(|v| v.value())
        .sum();
    assert_eq!(bucketed, total);
}

// Unrelated metrics on one context interleave in submission order without
// corrupting each other, even when a faulty task sits between them.
#[test]
fn shared_context_survives_faulty_neighbors() {
    let context = ExecutionContext::new();
    let requests = Counter::with_context(MetricConfig::new("requests"), context.clone());
    let latency =
        Timer::with_unit(MetricConfig::new("latency"), TimeUnit::Milliseconds, context.clone());

    requests.increment();
    context.submit(|| panic!("misbehaving neighbor"));
    latency.update(Duration::from_millis(7));
    requests.increment();

    let (tx, rx) = mpsc::channel();
    requests.get_count(move |count, _| {
        let _ = tx.send(count);
    });
    assert_eq!(rx.recv().unwrap(), 2);

    let set = report_of(|cb| latency.report(cb));
    assert_eq!(set.get(ValueKind::Count).unwrap().value(), 1.0);
}
