//! Time-to-live cache for contract reads.
//!
//! This crate provides:
//! - [`ReadThroughCache`]: thread-safe TTL map, generic over the cached value
//! - [`Clock`]: time source, with [`ManualClock`] for deterministic tests
//! - [`CacheMetrics`]: hit/miss/expiry counters
//! - [`keys`]: canonical key builders for every cached read

pub mod clock;
pub mod keys;
pub mod metrics;
pub mod read_through;

pub use clock::{Clock, ManualClock, SystemClock};
pub use metrics::{CacheMetrics, MetricsSnapshot};
pub use read_through::{ReadThroughCache, DEFAULT_TTL};
