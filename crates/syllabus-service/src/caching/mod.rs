//! # Module loading and caching
//!
//! Content modules are expensive to read and decode, and at startup many screens request
//! overlapping sets of them at the same time. This module contains the machinery that makes
//! sure each module is loaded at most once at a time, and kept in memory afterwards.
//!
//! ## Layers
//!
//! - The [`CacheStore`] is a plain in-memory map of resolved modules, keyed by
//!   [`ModuleKey`](crate::catalog::ModuleKey). It does no I/O and no locking on its own.
//! - The [`LoadCoordinator`] owns the store together with the map of currently running loads,
//!   both behind a single lock. This is what does request coalescing: concurrent requests
//!   for the same key share one load, through a shared one-shot channel.
//! - The actual reading and decoding is done by a [`ContentSource`](crate::sources::ContentSource).
//!
//! A request goes through the following steps:
//! - The requested key is resolved to its canonical key. Unknown identifiers resolve to the
//!   fallback module of their kind.
//! - On a cache hit, the cached payload is returned right away.
//! - If a load for the key is already running, the caller waits for its outcome.
//! - Otherwise a new load is spawned as an independent task, bounded by the fetch timeout.
//! - On success, the payload is stored and the attempt retired in one step, then all waiters
//!   receive the payload. On failure, nothing is stored and all waiters receive the error.
//!
//! Dropping the future returned by [`LoadCoordinator::acquire`] does not cancel the load, as
//! other callers might be waiting for it as well.
//!
//! ## Eviction
//!
//! There is no TTL and no size-based eviction. Entries only go away through
//! [`LoadCoordinator::evict`] and [`LoadCoordinator::clear`], which are meant to be called in
//! response to memory pressure. [`LoadCoordinator::stats`] reports the number of entries and
//! an approximate size to base that decision on.
//!
//! ## Errors
//!
//! [`CacheError`] is cloned to every waiter of a failed load. Failures are never cached, so a
//! failed module is retried on the next request.
//!
//! ### Metrics
//!
//! - `modules.access`: All accesses.
//! - `modules.memory.hit`: Accesses served from the cache.
//! - `modules.channel.hit`: Accesses that joined an already running load.
//! - `modules.channel.miss`: Accesses that started a new load.
//! - `modules.fallback`: New loads started for an unknown identifier, served by the fallback.
//! - `modules.fetch`: Loads, and `modules.fetch.error` for the failed ones.
//! - `modules.fetch.duration`: A timer for each load.
//! - `modules.size_bytes`: A gauge with the approximate size of the cache.
//! - `modules.evicted`: The number of entries removed by eviction.

mod cache_error;
mod coordinator;
mod store;

pub use cache_error::{CacheContents, CacheError};
pub use coordinator::{LoadCoordinator, ModuleState};
pub use store::{CacheEntry, CacheStats, CacheStore};
