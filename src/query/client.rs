use futures_util::FutureExt;
use log::{debug, trace};
use std::any::Any;
use std::collections::HashMap;
use std::future::Future;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex, MutexGuard, Weak};
use std::time::Duration;
use tokio::time::Instant;

use crate::error::{ApiError, Result};

use super::key::QueryKey;
use super::state::{CacheEntry, Flight, QueryEvent, QueryOptions, QueryState, QueryStatus};

type Listener = Arc<dyn Fn(&QueryKey, &QueryEvent) + Send + Sync>;
type FetchResult = Result<Arc<dyn Any + Send + Sync>>;

const MAX_RETRY_DELAY: Duration = Duration::from_secs(30);

pub(crate) struct QueryInner {
    entries: Mutex<HashMap<QueryKey, CacheEntry>>,
    listeners: Mutex<HashMap<QueryKey, Vec<(u64, Listener)>>>,
    next_id: AtomicU64,
    defaults: QueryOptions,
}

fn lock<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
}

impl QueryInner {
    fn next_id(&self) -> u64 {
        self.next_id.fetch_add(1, Ordering::Relaxed) + 1
    }

    fn notify(&self, key: &QueryKey, event: QueryEvent) {
        let listeners: Vec<Listener> = lock(&self.listeners)
            .get(key)
            .map(|list| list.iter().map(|(_, l)| Arc::clone(l)).collect())
            .unwrap_or_default();
        for listener in listeners {
            listener(key, &event);
        }
    }

    pub(super) fn state<T: Send + Sync + 'static>(&self, key: &QueryKey) -> QueryState<T> {
        lock(&self.entries)
            .get(key)
            .map(CacheEntry::state)
            .unwrap_or_else(QueryState::idle)
    }

    /// Apply a finished fetch unless the entry was removed or refetched since
    fn complete(&self, key: &QueryKey, generation: u64, result: FetchResult) {
        let event = {
            let mut entries = lock(&self.entries);
            let entry = match entries.get_mut(key) {
                Some(entry) if entry.generation == generation => entry,
                _ => {
                    trace!("Discarding superseded result for {}", key);
                    return;
                }
            };
            entry.in_flight = None;
            match result {
                Ok(data) => {
                    entry.data = Some(data);
                    entry.error = None;
                    entry.status = QueryStatus::Success;
                    entry.updated_at = Some(Instant::now());
                    QueryEvent::Success
                }
                Err(e) => {
                    debug!("Query {} failed: {}", key, e);
                    entry.error = Some(e.clone());
                    entry.status = QueryStatus::Error;
                    QueryEvent::Error(e)
                }
            }
        };
        self.notify(key, event);
    }

    fn unsubscribe(&self, key: &QueryKey, id: u64) {
        let mut listeners = lock(&self.listeners);
        if let Some(list) = listeners.get_mut(key) {
            list.retain(|(other, _)| *other != id);
            if list.is_empty() {
                listeners.remove(key);
            }
        }
    }
}

/// Keyed cache of server data with in-flight de-duplication.
///
/// At most one fetch per key runs at a time; concurrent callers share its result.
/// Stale data is served immediately while a single background refetch runs. Results
/// of fetches started before a `remove` or `clear` are discarded. The internal locks
/// are never held across an await.
#[derive(Clone)]
pub struct QueryClient {
    inner: Arc<QueryInner>,
}

enum Access {
    Ready,
    Wait(Flight),
}

impl QueryClient {
    pub fn new(defaults: QueryOptions) -> Self {
        Self {
            inner: Arc::new(QueryInner {
                entries: Mutex::new(HashMap::new()),
                listeners: Mutex::new(HashMap::new()),
                next_id: AtomicU64::new(0),
                defaults,
            }),
        }
    }

    pub(crate) fn downgrade(&self) -> Weak<QueryInner> {
        Arc::downgrade(&self.inner)
    }

    /// Options used by the resource query helpers when they set nothing else
    pub fn default_options(&self) -> &QueryOptions {
        &self.inner.defaults
    }

    /// Read a query through the cache.
    ///
    /// Fresh data returns without a request. Stale data returns immediately and
    /// starts a background refetch. Without data the call waits for the (possibly
    /// shared) fetch. A disabled query only reports what is already cached.
    pub async fn query<T, F, Fut>(&self, key: &QueryKey, options: &QueryOptions, fetcher: F) -> QueryState<T>
    where
        T: Send + Sync + 'static,
        F: Fn() -> Fut + Send + Sync + 'static,
        Fut: Future<Output = Result<T>> + Send + 'static,
    {
        if !options.enabled {
            return self.get_query_state(key);
        }

        let (access, started) = {
            let mut entries = lock(&self.inner.entries);
            let entry = entries.entry(key.clone()).or_insert_with(CacheEntry::new);
            let mut started = false;
            if entry.needs_fetch(options.stale_time, Instant::now()) {
                self.start_fetch(entry, key, options.retry, fetcher);
                started = true;
            }
            let access = match (&entry.in_flight, &entry.data) {
                (Some(flight), None) => Access::Wait(flight.clone()),
                _ => Access::Ready,
            };
            (access, started)
        };

        if started {
            self.inner.notify(key, QueryEvent::Fetching);
        }
        if let Access::Wait(flight) = access {
            flight.await;
        }
        self.get_query_state(key)
    }

    /// Fetch unless fresh data is cached, waiting for the result even when stale
    /// data exists
    pub async fn fetch_query<T, F, Fut>(&self, key: &QueryKey, options: &QueryOptions, fetcher: F) -> Result<Arc<T>>
    where
        T: Send + Sync + 'static,
        F: Fn() -> Fut + Send + Sync + 'static,
        Fut: Future<Output = Result<T>> + Send + 'static,
    {
        let (flight, started) = {
            let mut entries = lock(&self.inner.entries);
            let entry = entries.entry(key.clone()).or_insert_with(CacheEntry::new);
            let mut started = false;
            if entry.needs_fetch(options.stale_time, Instant::now()) {
                self.start_fetch(entry, key, options.retry, fetcher);
                started = true;
            }
            (entry.in_flight.clone(), started)
        };

        if started {
            self.inner.notify(key, QueryEvent::Fetching);
        }
        if let Some(flight) = flight {
            flight.await;
        }

        let state = self.get_query_state::<T>(key);
        match (state.status, state.data, state.error) {
            (QueryStatus::Error, _, Some(e)) => Err(e),
            (_, Some(data), _) => Ok(data),
            _ => Err(ApiError::storage(format!("no cached data for {}", key))),
        }
    }

    // Caller holds the entries lock
    fn start_fetch<T, F, Fut>(&self, entry: &mut CacheEntry, key: &QueryKey, retry: u32, fetcher: F)
    where
        T: Send + Sync + 'static,
        F: Fn() -> Fut + Send + Sync + 'static,
        Fut: Future<Output = Result<T>> + Send + 'static,
    {
        let generation = self.inner.next_id();
        let inner = Arc::clone(&self.inner);
        let task_key = key.clone();

        let flight = async move {
            let result = fetch_with_retry(&task_key, retry, fetcher).await;
            inner.complete(&task_key, generation, result);
        }
        .boxed()
        .shared();

        trace!("Fetching {}", key);
        entry.generation = generation;
        entry.invalidated = false;
        if entry.data.is_none() {
            entry.status = QueryStatus::Pending;
        }
        entry.in_flight = Some(flight.clone());
        tokio::spawn(flight);
    }

    /// Cached data for a key, if any
    pub fn get_query_data<T: Send + Sync + 'static>(&self, key: &QueryKey) -> Option<Arc<T>> {
        self.get_query_state(key).data
    }

    pub fn get_query_state<T: Send + Sync + 'static>(&self, key: &QueryKey) -> QueryState<T> {
        self.inner.state(key)
    }

    /// Store data directly, marking the entry fresh. A fetch already in flight for
    /// the key is superseded and will not overwrite this value.
    pub fn set_query_data<T: Send + Sync + 'static>(&self, key: &QueryKey, data: T) {
        {
            let mut entries = lock(&self.inner.entries);
            let entry = entries.entry(key.clone()).or_insert_with(CacheEntry::new);
            entry.generation = self.inner.next_id();
            entry.in_flight = None;
            entry.data = Some(Arc::new(data));
            entry.error = None;
            entry.status = QueryStatus::Success;
            entry.updated_at = Some(Instant::now());
            entry.invalidated = false;
        }
        self.inner.notify(key, QueryEvent::Updated);
    }

    /// Mark an entry so its next access refetches regardless of staleness. A fetch
    /// already in flight keeps running; its result does not clear the mark.
    pub fn invalidate(&self, key: &QueryKey) -> bool {
        let found = match lock(&self.inner.entries).get_mut(key) {
            Some(entry) => {
                entry.invalidated = true;
                true
            }
            None => false,
        };
        if found {
            debug!("Invalidated {}", key);
            self.inner.notify(key, QueryEvent::Invalidated);
        }
        found
    }

    /// Invalidate every entry selected by `filter` (see [`QueryKey::matches`])
    pub fn invalidate_matching(&self, filter: &QueryKey) -> usize {
        let keys: Vec<QueryKey> = {
            let mut entries = lock(&self.inner.entries);
            entries
                .iter_mut()
                .filter(|(key, _)| key.matches(filter))
                .map(|(key, entry)| {
                    entry.invalidated = true;
                    key.clone()
                })
                .collect()
        };
        debug!("Invalidated {} entries matching {}", keys.len(), filter);
        for key in &keys {
            self.inner.notify(key, QueryEvent::Invalidated);
        }
        keys.len()
    }

    /// Invalidate every entry of a resource kind
    pub fn invalidate_kind(&self, kind: &str) -> usize {
        self.invalidate_matching(&QueryKey::kind_only(kind))
    }

    /// Drop an entry; a fetch still in flight for it will not write back
    pub fn remove(&self, key: &QueryKey) {
        let removed = lock(&self.inner.entries).remove(key).is_some();
        if removed {
            self.inner.notify(key, QueryEvent::Removed);
        }
    }

    /// Drop every entry
    pub fn clear(&self) {
        let keys: Vec<QueryKey> = lock(&self.inner.entries).drain().map(|(key, _)| key).collect();
        debug!("Cleared {} cached queries", keys.len());
        for key in &keys {
            self.inner.notify(key, QueryEvent::Removed);
        }
    }

    /// Number of cached entries
    pub fn len(&self) -> usize {
        lock(&self.inner.entries).len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Call `listener` on every transition of `key` until the subscription is
    /// dropped or unsubscribed
    pub fn subscribe<F>(&self, key: &QueryKey, listener: F) -> Subscription
    where
        F: Fn(&QueryKey, &QueryEvent) + Send + Sync + 'static,
    {
        let id = self.inner.next_id();
        lock(&self.inner.listeners)
            .entry(key.clone())
            .or_default()
            .push((id, Arc::new(listener)));
        Subscription {
            inner: self.downgrade(),
            key: key.clone(),
            id,
        }
    }
}

async fn fetch_with_retry<T, F, Fut>(key: &QueryKey, retry: u32, fetcher: F) -> FetchResult
where
    T: Send + Sync + 'static,
    F: Fn() -> Fut,
    Fut: Future<Output = Result<T>>,
{
    let mut attempt = 0;
    loop {
        match fetcher().await {
            Ok(data) => return Ok(Arc::new(data) as Arc<dyn Any + Send + Sync>),
            Err(e) if attempt < retry && e.is_retryable() => {
                attempt += 1;
                let delay = retry_delay(attempt);
                debug!("Retrying {} in {:?} after: {}", key, delay, e);
                tokio::time::sleep(delay).await;
            }
            Err(e) => return Err(e),
        }
    }
}

fn retry_delay(attempt: u32) -> Duration {
    let millis = 500u64.saturating_mul(1 << attempt.min(10));
    Duration::from_millis(millis).min(MAX_RETRY_DELAY)
}

/// Handle for a cache listener; unsubscribes when dropped
pub struct Subscription {
    inner: Weak<QueryInner>,
    key: QueryKey,
    id: u64,
}

impl Subscription {
    pub fn key(&self) -> &QueryKey {
        &self.key
    }

    pub fn unsubscribe(self) {}
}

impl Drop for Subscription {
    fn drop(&mut self) {
        if let Some(inner) = self.inner.upgrade() {
            inner.unsubscribe(&self.key, self.id);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;
    use std::sync::atomic::AtomicUsize;

    fn counting_fetcher(
        calls: Arc<AtomicUsize>,
        delay: Duration,
    ) -> impl Fn() -> BoxedFetch<usize> + Send + Sync + 'static {
        move || {
            let calls = Arc::clone(&calls);
            async move {
                tokio::time::sleep(delay).await;
                Ok::<_, ApiError>(calls.fetch_add(1, Ordering::SeqCst) + 1)
            }
            .boxed()
        }
    }

    type BoxedFetch<T> = futures_util::future::BoxFuture<'static, Result<T>>;

    fn key() -> QueryKey {
        QueryKey::new("recipes", json!({"difficulty": "easy", "page": 1}))
    }

    #[tokio::test(start_paused = true)]
    async fn test_concurrent_queries_share_one_fetch() {
        let client = QueryClient::new(QueryOptions::default());
        let calls = Arc::new(AtomicUsize::new(0));
        let options = QueryOptions::new().with_stale_time(Duration::from_secs(60));

        let key = key();

        let (a, b, c) = tokio::join!(
            client.query(&key, &options, counting_fetcher(calls.clone(), Duration::from_millis(50))),
            client.query(&key, &options, counting_fetcher(calls.clone(), Duration::from_millis(50))),
            client.query(&key, &options, counting_fetcher(calls.clone(), Duration::from_millis(50))),
        );

        assert_eq!(calls.load(Ordering::SeqCst), 1);
        for state in [a, b, c] {
            assert!(state.is_success());
            assert_eq!(state.data.as_deref(), Some(&1));
        }
    }

    #[tokio::test(start_paused = true)]
    async fn test_fresh_data_skips_fetch_and_stale_data_revalidates() {
        let client = QueryClient::new(QueryOptions::default());
        let calls = Arc::new(AtomicUsize::new(0));
        let options = QueryOptions::new().with_stale_time(Duration::from_secs(60));

        client.query(&key(), &options, counting_fetcher(calls.clone(), Duration::ZERO)).await;
        let state = client.query(&key(), &options, counting_fetcher(calls.clone(), Duration::ZERO)).await;
        assert_eq!(calls.load(Ordering::SeqCst), 1);
        assert_eq!(state.data.as_deref(), Some(&1));

        tokio::time::advance(Duration::from_secs(61)).await;
        let state = client
            .query(&key(), &options, counting_fetcher(calls.clone(), Duration::from_millis(10)))
            .await;
        // stale value served while the refetch runs
        assert_eq!(state.data.as_deref(), Some(&1));
        assert!(state.is_fetching);

        tokio::time::sleep(Duration::from_millis(20)).await;
        assert_eq!(client.get_query_data::<usize>(&key()).as_deref(), Some(&2));
    }

    #[tokio::test(start_paused = true)]
    async fn test_invalidate_forces_refetch() {
        let client = QueryClient::new(QueryOptions::default());
        let calls = Arc::new(AtomicUsize::new(0));
        let options = QueryOptions::new().with_stale_time(Duration::from_secs(300));

        client.query(&key(), &options, counting_fetcher(calls.clone(), Duration::ZERO)).await;
        assert_eq!(client.invalidate_kind("recipes"), 1);
        assert_eq!(client.invalidate_kind("comments"), 0);

        client.fetch_query(&key(), &options, counting_fetcher(calls.clone(), Duration::ZERO)).await.unwrap();
        assert_eq!(calls.load(Ordering::SeqCst), 2);
    }

    #[tokio::test(start_paused = true)]
    async fn test_invalidate_during_flight_keeps_entry_stale() {
        let client = QueryClient::new(QueryOptions::default());
        let calls = Arc::new(AtomicUsize::new(0));
        let options = QueryOptions::new().with_stale_time(Duration::from_secs(300));

        let key = key();

        let pending = client.query(&key, &options, counting_fetcher(calls.clone(), Duration::from_millis(100)));
        let invalidate = async {
            tokio::time::sleep(Duration::from_millis(10)).await;
            client.invalidate(&key);
        };
        let (state, _) = tokio::join!(pending, invalidate);
        assert_eq!(state.data.as_deref(), Some(&1));

        client.fetch_query(&key, &options, counting_fetcher(calls.clone(), Duration::ZERO)).await.unwrap();
        assert_eq!(calls.load(Ordering::SeqCst), 2);
    }

    #[tokio::test(start_paused = true)]
    async fn test_error_keeps_previous_data() {
        let client = QueryClient::new(QueryOptions::default());
        client.set_query_data(&key(), 5usize);
        client.invalidate(&key());

        let options = QueryOptions::new().with_retry(0);
        client
            .fetch_query(&key(), &options, || async { Err::<usize, _>(ApiError::http(500, "boom")) })
            .await
            .unwrap_err();

        let state = client.get_query_state::<usize>(&key());
        assert!(state.is_error());
        assert_eq!(state.data.as_deref(), Some(&5));
        assert_eq!(state.error.and_then(|e| e.status()), Some(500));
    }

    #[tokio::test(start_paused = true)]
    async fn test_retry_only_for_retryable_errors() {
        let client = QueryClient::new(QueryOptions::default());
        let calls = Arc::new(AtomicUsize::new(0));
        let options = QueryOptions::new().with_retry(2);

        let counter = calls.clone();
        let state = client
            .query(&key(), &options, move || {
                counter.fetch_add(1, Ordering::SeqCst);
                async { Err::<usize, _>(ApiError::http(404, "Not found")) }
            })
            .await;
        assert!(state.is_error());
        assert_eq!(calls.load(Ordering::SeqCst), 1);

        let other = QueryKey::kind_only("unread-count");
        let counter = Arc::new(AtomicUsize::new(0));
        let attempts = counter.clone();
        let state = client
            .query(&other, &options, move || {
                let n = attempts.fetch_add(1, Ordering::SeqCst);
                async move {
                    if n == 0 {
                        Err(ApiError::network("connection reset"))
                    } else {
                        Ok(3usize)
                    }
                }
            })
            .await;
        assert_eq!(state.data.as_deref(), Some(&3));
        assert_eq!(counter.load(Ordering::SeqCst), 2);
    }

    #[tokio::test(start_paused = true)]
    async fn test_disabled_query_stays_idle() {
        let client = QueryClient::new(QueryOptions::default());
        let calls = Arc::new(AtomicUsize::new(0));
        let options = QueryOptions::new().with_enabled(false);

        let state = client.query(&key(), &options, counting_fetcher(calls.clone(), Duration::ZERO)).await;
        assert_eq!(state.status, QueryStatus::Idle);
        assert!(state.data.is_none());
        assert_eq!(calls.load(Ordering::SeqCst), 0);
        assert!(client.is_empty());
    }

    #[tokio::test(start_paused = true)]
    async fn test_removed_entry_ignores_late_result() {
        let client = QueryClient::new(QueryOptions::default());
        let calls = Arc::new(AtomicUsize::new(0));
        let options = QueryOptions::default();

        let key = key();

        let pending = client.query(&key, &options, counting_fetcher(calls.clone(), Duration::from_millis(100)));
        let teardown = async {
            tokio::time::sleep(Duration::from_millis(10)).await;
            client.clear();
        };
        let (state, _) = tokio::join!(pending, teardown);

        assert!(state.data.is_none());
        assert!(client.get_query_data::<usize>(&key).is_none());
    }

    #[tokio::test(start_paused = true)]
    async fn test_manual_write_wins_over_earlier_fetch() {
        let client = QueryClient::new(QueryOptions::default());
        let calls = Arc::new(AtomicUsize::new(0));
        let options = QueryOptions::new().with_stale_time(Duration::from_secs(60));

        let key = key();

        let pending = client.query(&key, &options, counting_fetcher(calls.clone(), Duration::from_millis(100)));
        let write = async {
            tokio::time::sleep(Duration::from_millis(20)).await;
            client.set_query_data(&key, 0usize);
        };
        let (state, _) = tokio::join!(pending, write);

        assert_eq!(calls.load(Ordering::SeqCst), 1);
        assert_eq!(state.data.as_deref(), Some(&0));
        assert_eq!(client.get_query_data::<usize>(&key).as_deref(), Some(&0));
        assert!(!client.get_query_state::<usize>(&key).is_fetching);
    }

    #[tokio::test]
    async fn test_subscription_events() {
        let client = QueryClient::new(QueryOptions::default());
        let events = Arc::new(Mutex::new(Vec::new()));

        let sink = events.clone();
        let subscription = client.subscribe(&key(), move |_, event| {
            lock(&sink).push(event.clone());
        });

        client.set_query_data(&key(), 1usize);
        client.invalidate(&key());
        subscription.unsubscribe();
        client.remove(&key());

        assert_eq!(*lock(&events), vec![QueryEvent::Updated, QueryEvent::Invalidated]);
    }
}
