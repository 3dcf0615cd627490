//! Bounded result cache with explicit freshness.
//!
//! [`LruTable`] holds ready results under a hard capacity. Reads come back
//! wrapped in [`CacheRead`], which says whether the caller got a stored
//! result or a fresh computation, and whether the stored result has outlived
//! its advisory TTL.

pub mod freshness;
pub mod lru;
pub mod stats;

pub use freshness::{CacheRead, CacheStatus};
pub use lru::LruTable;
pub use stats::CacheStats;
