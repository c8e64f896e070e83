//! Core metric types.
//!
//! Every type here is a cheap, cloneable handle: clones share the underlying
//! state and context.  Mutations are fire-and-forget tasks; observations
//! deliver through caller-supplied closures when the owning context reaches
//! them in queue order.

mod bucket_timer;
mod counter;
mod ewma;
mod gauge;
mod histogram;
mod meter;
mod reservoir;
mod snapshot;
mod timer;

pub use self::bucket_timer::BucketTimer;
pub use self::counter::Counter;
pub use self::ewma::{Ewma, TICK_INTERVAL};
pub use self::gauge::{CallableGauge, Gauge, ResettableMaxGauge, ResettableMinGauge};
pub use self::histogram::Histogram;
pub use self::meter::{ManualMeter, Meter};
pub use self::snapshot::Snapshot;
pub use self::timer::{StartedTimer, Timer};
