use thiserror::Error;

/// Errors during [`BucketTimer`](crate::BucketTimer) construction.
///
/// Structural misuse of bucket boundaries is a loud, construction-time failure
/// rather than a runtime one.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum BucketTimerError {
    /// No bucket boundaries were supplied.
    #[error("at least one bucket boundary is required")]
    EmptyBoundaries,

    /// Boundaries were not supplied in strictly ascending, duplicate-free
    /// order.
    #[error("bucket boundaries must be strictly ascending: {prev} is not less than {next}")]
    NonAscendingBoundaries {
        /// The earlier boundary.
        prev: u64,
        /// The boundary that failed to exceed it.
        next: u64,
    },
}
