//! Typed response cache with staleness and in-flight deduplication.
//!
//! Each resource gets its own `QueryCache<K, V>` keyed by the tuple of
//! parameters that identifies a request. Two read paths exist:
//!
//! - `fetch`: await the value, joining an in-flight request when one exists.
//! - `status`: non-blocking read for views. Kicks off a fetch when needed and
//!   reports `Ready`, `Loading` (optionally with the previously settled value
//!   as a placeholder) or `Failed`.
//!
//! Requests run on their own task and write their result back when they land,
//! so a caller that stops waiting does not cancel the request. A failed entry
//! is never re-fetched by `status`; only an explicit `fetch` or
//! `forget_failure` retries it.

use std::collections::HashMap;
use std::fmt::Debug;
use std::future::Future;
use std::hash::Hash;
use std::sync::{Arc, Mutex, MutexGuard};
use std::time::{Duration, Instant};

use futures::future::{BoxFuture, FutureExt, Shared};

use crate::errors::ApiError;

/// How long a settled value counts as fresh.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Staleness {
    After(Duration),
    Never,
}

impl Staleness {
    fn is_stale(&self, fetched_at: Instant) -> bool {
        match self {
            Staleness::After(ttl) => fetched_at.elapsed() >= *ttl,
            Staleness::Never => false,
        }
    }
}

/// What a view sees when it reads a query without waiting.
#[derive(Debug, Clone, PartialEq)]
pub enum QueryStatus<V> {
    Ready(V),
    /// No value for this key yet. `placeholder` is the last value settled
    /// under any key when the cache keeps previous data.
    Loading { placeholder: Option<V> },
    Failed(ApiError),
}

impl<V> QueryStatus<V> {
    /// The value to display: ready data or the loading placeholder.
    pub fn data(&self) -> Option<&V> {
        match self {
            QueryStatus::Ready(v) => Some(v),
            QueryStatus::Loading { placeholder } => placeholder.as_ref(),
            QueryStatus::Failed(_) => None,
        }
    }

    pub fn is_loading(&self) -> bool {
        matches!(self, QueryStatus::Loading { .. })
    }

    pub fn error(&self) -> Option<&ApiError> {
        match self {
            QueryStatus::Failed(e) => Some(e),
            _ => None,
        }
    }
}

type SharedFetch<V> = Shared<BoxFuture<'static, Result<V, ApiError>>>;

struct Settled<V> {
    value: V,
    fetched_at: Instant,
}

struct Entry<V> {
    data: Option<Settled<V>>,
    error: Option<ApiError>,
    /// In-flight request, tagged with the generation that started it.
    pending: Option<(u64, SharedFetch<V>)>,
}

impl<V> Entry<V> {
    fn new() -> Self {
        Self {
            data: None,
            error: None,
            pending: None,
        }
    }
}

struct Inner<K, V> {
    entries: HashMap<K, Entry<V>>,
    last_settled: Option<V>,
    next_generation: u64,
}

/// Cache of one resource type.
pub struct QueryCache<K, V> {
    name: &'static str,
    staleness: Staleness,
    keep_previous: bool,
    inner: Arc<Mutex<Inner<K, V>>>,
}

impl<K, V> QueryCache<K, V>
where
    K: Eq + Hash + Clone + Debug + Send + 'static,
    V: Clone + Send + Sync + 'static,
{
    pub fn new(name: &'static str, staleness: Staleness) -> Self {
        Self {
            name,
            staleness,
            keep_previous: false,
            inner: Arc::new(Mutex::new(Inner {
                entries: HashMap::new(),
                last_settled: None,
                next_generation: 0,
            })),
        }
    }

    /// Serve the most recently settled value as a placeholder while a new
    /// key loads.
    pub fn keep_previous(mut self) -> Self {
        self.keep_previous = true;
        self
    }

    pub fn name(&self) -> &'static str {
        self.name
    }

    fn lock(&self) -> MutexGuard<'_, Inner<K, V>> {
        lock_inner(&self.inner)
    }

    /// Return fresh data for `key`, or wait for the (single) in-flight
    /// request, starting one if needed.
    pub async fn fetch<F, Fut>(&self, key: K, fetcher: F) -> Result<V, ApiError>
    where
        F: FnOnce() -> Fut,
        Fut: Future<Output = Result<V, ApiError>> + Send + 'static,
    {
        let pending = {
            let mut guard = self.lock();
            let inner = &mut *guard;
            let entry = inner.entries.entry(key.clone()).or_insert_with(Entry::new);

            if let Some(settled) = &entry.data {
                if !self.staleness.is_stale(settled.fetched_at) {
                    tracing::debug!("{} cache hit for {:?}", self.name, key);
                    return Ok(settled.value.clone());
                }
            }

            match &entry.pending {
                Some((_, shared)) => {
                    tracing::debug!("{} joining in-flight request for {:?}", self.name, key);
                    shared.clone()
                }
                None => {
                    let generation = inner.next_generation;
                    inner.next_generation += 1;
                    self.start_fetch(entry, generation, key, fetcher)
                }
            }
        };

        pending.await
    }

    /// Non-blocking read. Stale data is returned as `Ready` while a refresh
    /// runs in the background.
    pub fn status<F, Fut>(&self, key: K, fetcher: F) -> QueryStatus<V>
    where
        F: FnOnce() -> Fut,
        Fut: Future<Output = Result<V, ApiError>> + Send + 'static,
    {
        let mut guard = self.lock();
        let inner = &mut *guard;
        let entry = inner.entries.entry(key.clone()).or_insert_with(Entry::new);

        let fresh = entry
            .data
            .as_ref()
            .is_some_and(|s| !self.staleness.is_stale(s.fetched_at));

        if !fresh && entry.pending.is_none() && entry.error.is_none() {
            let generation = inner.next_generation;
            inner.next_generation += 1;
            self.start_fetch(entry, generation, key, fetcher);
        }

        if let Some(settled) = &entry.data {
            return QueryStatus::Ready(settled.value.clone());
        }
        if let Some(err) = &entry.error {
            if entry.pending.is_none() {
                return QueryStatus::Failed(err.clone());
            }
        }

        let placeholder = if self.keep_previous {
            inner.last_settled.clone()
        } else {
            None
        };
        QueryStatus::Loading { placeholder }
    }

    fn start_fetch<F, Fut>(
        &self,
        entry: &mut Entry<V>,
        generation: u64,
        key: K,
        fetcher: F,
    ) -> SharedFetch<V>
    where
        F: FnOnce() -> Fut,
        Fut: Future<Output = Result<V, ApiError>> + Send + 'static,
    {
        tracing::debug!("{} cache miss for {:?}, fetching", self.name, key);

        let request = fetcher();
        let inner = Arc::clone(&self.inner);
        let name = self.name;

        let handle = tokio::spawn(async move {
            let result = request.await;

            let mut guard = lock_inner(&inner);
            let state = &mut *guard;
            match state.entries.get_mut(&key) {
                Some(entry) if matches!(entry.pending, Some((g, _)) if g == generation) => {
                    entry.pending = None;
                    match &result {
                        Ok(value) => {
                            entry.data = Some(Settled {
                                value: value.clone(),
                                fetched_at: Instant::now(),
                            });
                            entry.error = None;
                            state.last_settled = Some(value.clone());
                        }
                        Err(e) => {
                            tracing::warn!("{} request for {:?} failed: {}", name, key, e);
                            entry.error = Some(e.clone());
                        }
                    }
                }
                _ => {
                    tracing::debug!("{} result for {:?} superseded, not cached", name, key);
                }
            }

            result
        });

        let shared = async move {
            handle.await.unwrap_or_else(|e| {
                Err(ApiError::Transport(format!("Fetch task failed: {}", e)))
            })
        }
        .boxed()
        .shared();

        entry.pending = Some((generation, shared.clone()));
        shared
    }

    /// Whether a request for `key` is currently in flight.
    pub fn is_fetching(&self, key: &K) -> bool {
        self.lock()
            .entries
            .get(key)
            .is_some_and(|e| e.pending.is_some())
    }

    /// Number of keys with a request in flight.
    pub fn in_flight(&self) -> usize {
        self.lock()
            .entries
            .values()
            .filter(|e| e.pending.is_some())
            .count()
    }

    /// Settled value for `key`, fresh or not.
    pub fn peek(&self, key: &K) -> Option<V> {
        self.lock()
            .entries
            .get(key)
            .and_then(|e| e.data.as_ref())
            .map(|s| s.value.clone())
    }

    /// Forget `key` only if its last request failed and nothing is in
    /// flight, so the next read requests it again. Settled values are kept.
    pub fn forget_failure(&self, key: &K) -> bool {
        let mut guard = self.lock();
        let failed = guard
            .entries
            .get(key)
            .is_some_and(|e| e.error.is_some() && e.pending.is_none());
        if failed {
            tracing::debug!("{} dropping failed entry for {:?}", self.name, key);
            guard.entries.remove(key);
        }
        failed
    }

    /// Forget every key. Requests still in flight complete but their
    /// results are not cached.
    pub fn clear(&self) {
        let mut guard = self.lock();
        guard.entries.clear();
        guard.last_settled = None;
    }
}

fn lock_inner<K, V>(inner: &Mutex<Inner<K, V>>) -> MutexGuard<'_, Inner<K, V>> {
    // A panic while holding the lock cannot leave an entry half-written in a
    // way later readers care about, so poisoning is ignored.
    inner.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
}
