//! Two-level query cache for research searches
//!
//! Memoizes `query -> resolved sources` across process restarts:
//!
//! - [`CacheManager`] - unified L1 (memory) / L2 (SQLite) cache with TTL,
//!   LRU capacity and staleness eviction, a time-sensitivity bypass and
//!   hit/miss statistics
//! - [`CacheStore`] / [`SqliteCacheStore`] - the persistent layer, which
//!   migrates older table layouts in place on open
//! - [`CacheKey`] - salted, normalized key derivation
//! - [`Clock`] / [`ManualClock`] - injectable time source

#![deny(warnings)]
#![cfg_attr(not(test), deny(clippy::unwrap_used))]
#![cfg_attr(not(test), deny(clippy::expect_used))]

mod clock;
mod error;
mod freshness;
mod key;
mod manager;
mod memory;
mod stats;
mod store;

pub use clock::{Clock, ManualClock, SystemClock};
pub use error::{CacheError, Result};
pub use freshness::TimeSensitivity;
pub use key::CacheKey;
pub use manager::{CacheLayer, CacheLookup, CacheManager, CacheReport};
pub use stats::{CacheStats, EvictionReport};
pub use store::{CacheRecord, CacheStore, SqliteCacheStore, StoreSnapshot, CURRENT_SCHEMA_VERSION};
