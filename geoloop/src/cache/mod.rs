//! Two-level overlay cache.
//!
//! Decoded images live in a byte-bounded memory layer backed by a flat disk
//! store keyed by the same cache key. Misses fall through to the network
//! with at most one request per key in flight.

mod coalesce;
mod disk;
mod memory;
mod repair;
mod stats;
mod system;
mod types;

pub use coalesce::{
    CoalescerStats, FetchCoalescer, FetchOutcome, LeaderTicket, Registration, Waiter,
};
pub use disk::DiskStore;
pub use memory::{image_size, MemoryCache};
pub use repair::{decode, header_dimensions, needs_repair, repair_stored, RepairOutcome};
pub use stats::{CacheStatistics, CacheStats};
pub use system::{AsyncFetch, TileCache};
pub use types::{
    CacheConfig, CacheError, RepairPolicy, DEFAULT_CANONICAL_SIZE, DEFAULT_MEMORY_SIZE,
};
