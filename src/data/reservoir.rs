use crate::data::snapshot::Snapshot;
use rand::Rng;
use rand::SeedableRng;
use rand_xoshiro::Xoshiro256StarStar;

pub(crate) const DEFAULT_RESERVOIR_SIZE: usize = 1028;

/// A uniform sampling reservoir, per Vitter's "Algorithm R".
///
/// Keeps a bounded, statistically representative sample of an unbounded value
/// stream without knowing its length in advance.  Single-writer by design:
/// the owning histogram only ever touches it from its context's serialized
/// tasks, so no atomics are needed, just a fast PRNG (Xoshiro256**) to keep
/// the per-push sampling overhead low.
#[derive(Debug)]
pub(crate) struct SamplingReservoir {
    values: Vec<f64>,
    capacity: usize,
    count: u64,
    rng: Xoshiro256StarStar,
}

impl SamplingReservoir {
    pub(crate) fn with_capacity(capacity: usize) -> SamplingReservoir {
        SamplingReservoir {
            values: Vec::with_capacity(capacity),
            capacity,
            count: 0,
            rng: Xoshiro256StarStar::from_rng(&mut rand::rng()),
        }
    }

    pub(crate) fn push(&mut self, value: f64) {
        self.count += 1;
        if self.values.len() < self.capacity {
            self.values.push(value);
        } else {
            let idx = self.rng.random_range(0..self.count);
            if (idx as usize) < self.capacity {
                self.values[idx as usize] = value;
            }
        }
    }

    pub(crate) fn snapshot(&self) -> Snapshot {
        Snapshot::new(self.values.clone())
    }

    #[cfg(test)]
    fn len(&self) -> usize {
        self.values.len()
    }
}

#[cfg(test)]
mod tests {
    use super::{SamplingReservoir, DEFAULT_RESERVOIR_SIZE};

    #[test]
    fn holds_everything_until_full() {
        let mut reservoir = SamplingReservoir::with_capacity(100);
        for i in 0..100 {
            reservoir.push(i as f64);
        }

        let snapshot = reservoir.snapshot();
        assert_eq!(snapshot.len(), 100);
        assert_eq!(snapshot.values(), (0..100).map(|i| i as f64).collect::<Vec<_>>().as_slice());
    }

    #[test]
    fn stays_bounded_past_capacity() {
        let mut reservoir = SamplingReservoir::with_capacity(64);
        for i in 0..10_000 {
            reservoir.push(i as f64);
        }

        assert_eq!(reservoir.len(), 64);
        // Every retained sample came from the stream.
        for value in reservoir.snapshot().values() {
            assert!(*value >= 0.0 && *value < 10_000.0);
        }
    }

    #[test]
    fn default_size_matches_construction() {
        let reservoir = SamplingReservoir::with_capacity(DEFAULT_RESERVOIR_SIZE);
        assert_eq!(reservoir.capacity, DEFAULT_RESERVOIR_SIZE);
    }
}
