/// A point-in-time set of sampled values supporting order-statistic queries.
///
/// Produced on demand from a histogram's reservoir; percentiles are computed
/// lazily from the sample held here, never updated eagerly on the write path.
#[derive(Clone, Debug)]
pub struct Snapshot {
    // Sorted ascending at construction.
    values: Vec<f64>,
}

impl Snapshot {
    pub(crate) fn new(mut values: Vec<f64>) -> Snapshot {
        values.sort_by(|a, b| a.total_cmp(b));
        Snapshot { values }
    }

    /// Number of samples in this snapshot.
    pub fn len(&self) -> usize {
        self.values.len()
    }

    /// Whether this snapshot holds no samples.
    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }

    /// The sampled values, sorted ascending.
    pub fn values(&self) -> &[f64] {
        &self.values
    }

    /// The value at the given quantile, interpolated between neighboring
    /// samples.
    ///
    /// `quantile` is clamped to `[0.0, 1.0]`.  An empty snapshot yields 0 for
    /// every quantile.
    pub fn quantile(&self, quantile: f64) -> f64 {
        if self.values.is_empty() {
            return 0.0;
        }
        let quantile = quantile.clamp(0.0, 1.0);

        let pos = quantile * (self.values.len() + 1) as f64;
        if pos < 1.0 {
            return self.values[0];
        }
        if pos >= self.values.len() as f64 {
            return self.values[self.values.len() - 1];
        }

        let lower = self.values[pos as usize - 1];
        let upper = self.values[pos as usize];
        lower + (pos - pos.floor()) * (upper - lower)
    }

    /// The middle value of the sample.
    pub fn median(&self) -> f64 {
        self.quantile(0.5)
    }
}
