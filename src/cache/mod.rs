//! Rendered-listing cache.
//!
//! Listings are cached as encoded payloads under keys derived from the
//! request's display attributes and normalized criteria:
//!
//! ```toml
//! [cache]
//! capacity = 256
//!
//! [archive]
//! cache_duration_seconds = 3600
//! ```
//!
//! Lifetime comes from the archive settings at write time, so a settings
//! change takes effect on the next store. Settings updates also flush the
//! whole [`LIST_NAMESPACE`].

mod config;
mod keys;
pub(crate) mod lock;
mod store;

pub use config::CacheConfig;
pub use keys::{CacheKey, LIST_NAMESPACE, canonical_encoding, list_key};
pub use store::{
    ArchiveCache, METRIC_CACHE_EVICT, METRIC_CACHE_HIT, METRIC_CACHE_INVALIDATE,
    METRIC_CACHE_MISS, METRIC_CACHE_STORE, MemoryCache,
};
