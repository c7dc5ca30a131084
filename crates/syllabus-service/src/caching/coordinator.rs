use std::collections::BTreeMap;
use std::fmt;
use std::sync::Arc;
use std::time::{Duration, Instant};

use futures::channel::oneshot;
use futures::future::{FutureExt, Shared};
use parking_lot::Mutex;
use tokio::sync::Notify;

use super::{CacheContents, CacheError, CacheStats, CacheStore};
use crate::catalog::ModuleKey;
use crate::sources::ContentSource;

// The payload is wrapped in an `Arc` so the outcome can be cloned to every waiter of the
// shared channel.
type ComputationChannel<T> = Shared<oneshot::Receiver<CacheContents<Arc<T>>>>;

/// A load that is currently running.
struct InFlightAttempt<T> {
    /// Distinguishes this attempt from later attempts for the same key.
    id: u64,
    channel: ComputationChannel<T>,
}

/// All mutable state of the loader. Lives behind a single lock, so that checking the cache,
/// checking the in-flight loads and registering a new load form one atomic step.
struct State<T> {
    store: CacheStore<T>,
    in_flight: BTreeMap<ModuleKey, InFlightAttempt<T>>,
    next_attempt: u64,
    closed: bool,
}

/// Where a module currently is in its lifecycle.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum ModuleState {
    /// Never requested, evicted, or the last attempt failed.
    Unrequested,
    Loading,
    Cached,
}

/// Resolves modules through a [`ContentSource`], deduplicating concurrent loads of the same
/// key and memoizing successful results.
///
/// Loads run as independent tasks: a caller that stops waiting does not cancel the load for
/// anybody else, and the result is cached once it arrives. Failures are never cached.
pub struct LoadCoordinator<S: ContentSource> {
    source: Arc<S>,
    state: Arc<Mutex<State<S::Item>>>,
    /// Notified whenever the last in-flight load finishes.
    idle: Arc<Notify>,
    fetch_timeout: Duration,
}

impl<S: ContentSource> Clone for LoadCoordinator<S> {
    fn clone(&self) -> Self {
        Self {
            source: Arc::clone(&self.source),
            state: Arc::clone(&self.state),
            idle: Arc::clone(&self.idle),
            fetch_timeout: self.fetch_timeout,
        }
    }
}

impl<S: ContentSource> fmt::Debug for LoadCoordinator<S> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let (cached, in_flight) = self
            .state
            .try_lock()
            .map(|state| (state.store.stats().entry_count, state.in_flight.len()))
            .unwrap_or_default();
        f.debug_struct("LoadCoordinator")
            .field("cached modules", &cached)
            .field("running loads", &in_flight)
            .field("fetch_timeout", &self.fetch_timeout)
            .finish()
    }
}

/// Removes an in-flight attempt from the map when the load task ends, however it ends.
///
/// Only removes the attempt it was created for, in case that attempt already completed and
/// a newer one for the same key took its place.
struct AttemptGuard<T> {
    state: Arc<Mutex<State<T>>>,
    idle: Arc<Notify>,
    key: ModuleKey,
    id: u64,
}

impl<T> Drop for AttemptGuard<T> {
    fn drop(&mut self) {
        let mut state = self.state.lock();
        if state
            .in_flight
            .get(&self.key)
            .is_some_and(|attempt| attempt.id == self.id)
        {
            state.in_flight.remove(&self.key);
        }
        if state.in_flight.is_empty() {
            self.idle.notify_waiters();
        }
    }
}

impl<S: ContentSource> LoadCoordinator<S> {
    pub fn new(source: Arc<S>, fetch_timeout: Duration) -> Self {
        let state = State {
            store: CacheStore::new(),
            in_flight: BTreeMap::new(),
            next_attempt: 0,
            closed: false,
        };
        Self {
            source,
            state: Arc::new(Mutex::new(state)),
            idle: Arc::new(Notify::new()),
            fetch_timeout,
        }
    }

    /// Returns the payload of the module named by `key`, loading it if necessary.
    ///
    /// At most one load per (canonical) key runs at any time; concurrent callers share its
    /// outcome. A successful result is cached until evicted, an error is returned to all
    /// current waiters and the next call starts a fresh load.
    pub async fn acquire(&self, requested: &ModuleKey) -> CacheContents<Arc<S::Item>> {
        metric!(counter("modules.access") += 1, "kind" => requested.kind().as_ref());
        let key = self.source.resolve(requested)?;

        let channel = {
            let mut state = self.state.lock();
            if state.closed {
                return Err(CacheError::ShutDown);
            }

            if let Some(entry) = state.store.get(&key) {
                metric!(counter("modules.memory.hit") += 1, "kind" => key.kind().as_ref());
                tracing::trace!(module = %key, "Module cache hit");
                return Ok(Arc::clone(entry.payload()));
            }

            match state.in_flight.get(&key) {
                Some(attempt) => {
                    // A concurrent load of the same module was deduplicated.
                    metric!(counter("modules.channel.hit") += 1, "kind" => key.kind().as_ref());
                    attempt.channel.clone()
                }
                None => {
                    metric!(counter("modules.channel.miss") += 1, "kind" => key.kind().as_ref());
                    if key != *requested {
                        metric!(counter("modules.fallback") += 1, "kind" => key.kind().as_ref());
                        tracing::warn!(
                            module = %requested,
                            fallback = %key,
                            "Unknown module identifier, loading fallback module"
                        );
                    }
                    self.spawn_load(&mut state, key.clone())
                }
            }
        };

        channel.await.unwrap_or_else(|_canceled| {
            tracing::error!(module = %key, "Module load channel dropped");
            Err(CacheError::InternalError)
        })
    }

    /// Registers a new in-flight attempt for `key` and spawns its load.
    ///
    /// Must be called with the state lock held, after checking that neither a cache entry
    /// nor another attempt exists for `key`.
    fn spawn_load(&self, state: &mut State<S::Item>, key: ModuleKey) -> ComputationChannel<S::Item> {
        let (sender, receiver) = oneshot::channel();
        let channel = receiver.shared();

        let id = state.next_attempt;
        state.next_attempt += 1;
        let attempt = InFlightAttempt {
            id,
            channel: channel.clone(),
        };
        let previous = state.in_flight.insert(key.clone(), attempt);
        debug_assert!(previous.is_none());

        let guard = AttemptGuard {
            state: Arc::clone(&self.state),
            idle: Arc::clone(&self.idle),
            key: key.clone(),
            id,
        };
        let source = Arc::clone(&self.source);
        let shared_state = Arc::clone(&self.state);
        let fetch_timeout = self.fetch_timeout;

        tracing::trace!(module = %key, "Spawning module load");

        let task = async move {
            let kind = key.kind();
            metric!(counter("modules.fetch") += 1, "kind" => kind.as_ref());

            let start = Instant::now();
            let result = tokio::time::timeout(fetch_timeout, source.fetch(&key))
                .await
                .unwrap_or(Err(CacheError::Timeout(fetch_timeout)));
            metric!(timer("modules.fetch.duration") = start.elapsed(), "kind" => kind.as_ref());

            let result = match result {
                Ok(item) => {
                    let size = S::weight(&item);
                    let payload = Arc::new(item);

                    // Writing the entry and retiring the attempt happen under one lock, so
                    // that no caller can observe the key as neither cached nor loading.
                    let mut state = shared_state.lock();
                    state.store.put(key.clone(), Arc::clone(&payload), size);
                    state.in_flight.remove(&key);
                    let stats = state.store.stats();
                    drop(state);

                    metric!(gauge("modules.size_bytes") = stats.approximate_size_bytes as u64);
                    tracing::debug!(module = %key, size, "Module loaded");
                    Ok(payload)
                }
                Err(err) => {
                    metric!(
                        counter("modules.fetch.error") += 1,
                        "kind" => kind.as_ref(),
                        "error" => err.metrics_tag(),
                    );
                    tracing::warn!(
                        module = %key,
                        error = &err as &dyn std::error::Error,
                        "Failed to load module"
                    );
                    Err(err)
                }
            };

            // Retire the attempt before broadcasting. Callers arriving after this point
            // either hit the cache or start a fresh attempt.
            drop(guard);
            sender.send(result).ok();
        };
        tokio::spawn(task);

        channel
    }

    /// Removes the named modules from the cache; the next `acquire` is a clean miss.
    ///
    /// Loads that are currently running are not affected.
    pub fn evict(&self, keys: &[ModuleKey]) -> usize {
        let evicted = self.state.lock().store.evict(keys);
        metric!(counter("modules.evicted") += evicted as i64);
        tracing::debug!(evicted, "Evicted modules");
        evicted
    }

    /// Removes every cached module except the ones in `keep`.
    pub fn clear(&self, keep: &[ModuleKey]) -> usize {
        let evicted = self.state.lock().store.clear(keep);
        metric!(counter("modules.evicted") += evicted as i64);
        tracing::debug!(evicted, kept = keep.len(), "Cleared module cache");
        evicted
    }

    pub fn stats(&self) -> CacheStats {
        self.state.lock().store.stats()
    }

    pub fn module_state(&self, key: &ModuleKey) -> ModuleState {
        let state = self.state.lock();
        if state.store.contains(key) {
            ModuleState::Cached
        } else if state.in_flight.contains_key(key) {
            ModuleState::Loading
        } else {
            ModuleState::Unrequested
        }
    }

    /// The keys of all cached modules.
    pub fn cached_keys(&self) -> Vec<ModuleKey> {
        self.state.lock().store.keys().cloned().collect()
    }

    /// Stops accepting new loads. Running loads complete normally.
    pub fn close(&self) {
        self.state.lock().closed = true;
    }

    /// Accepts new loads again after [`close`](Self::close).
    pub fn open(&self) {
        self.state.lock().closed = false;
    }

    /// Waits until no load is in flight.
    pub async fn drain(&self) {
        loop {
            let notified = self.idle.notified();
            tokio::pin!(notified);
            // Register interest before checking, so a notification in between is not lost.
            notified.as_mut().enable();

            if self.state.lock().in_flight.is_empty() {
                return;
            }
            notified.await;
        }
    }
}
