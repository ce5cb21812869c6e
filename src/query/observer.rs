use std::future::Future;
use std::marker::PhantomData;
use std::sync::{Arc, Mutex, MutexGuard};

use crate::error::Result;

use super::client::{QueryClient, Subscription};
use super::key::QueryKey;
use super::state::{QueryOptions, QueryState};

type StateListener<T> = Arc<dyn Fn(QueryState<T>) + Send + Sync>;

struct Binding {
    key: Option<QueryKey>,
    generation: u64,
    subscription: Option<Subscription>,
}

/// Binds a view to one query whose key changes over time, such as a search box
/// feeding a recipe listing.
///
/// Only the most recent key counts: a result that arrives for a key the observer
/// has already moved away from is cached but never reported.
pub struct QueryObserver<T> {
    client: QueryClient,
    options: QueryOptions,
    binding: Mutex<Binding>,
    listener: Option<StateListener<T>>,
    _marker: PhantomData<fn() -> T>,
}

impl<T: Send + Sync + 'static> QueryObserver<T> {
    pub fn new(client: QueryClient, options: QueryOptions) -> Self {
        Self {
            client,
            options,
            binding: Mutex::new(Binding {
                key: None,
                generation: 0,
                subscription: None,
            }),
            listener: None,
            _marker: PhantomData,
        }
    }

    /// Receive the current key's state on every cache transition
    pub fn with_listener<F>(mut self, listener: F) -> Self
    where
        F: Fn(QueryState<T>) + Send + Sync + 'static,
    {
        self.listener = Some(Arc::new(listener));
        self
    }

    fn binding(&self) -> MutexGuard<'_, Binding> {
        self.binding.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    pub fn key(&self) -> Option<QueryKey> {
        self.binding().key.clone()
    }

    /// Switch to `key` and read it through the cache.
    ///
    /// Returns `None` when another `set_key` call superseded this one before its
    /// result arrived.
    pub async fn set_key<F, Fut>(&self, key: QueryKey, fetcher: F) -> Option<QueryState<T>>
    where
        F: Fn() -> Fut + Send + Sync + 'static,
        Fut: Future<Output = Result<T>> + Send + 'static,
    {
        let generation = {
            let mut binding = self.binding();
            binding.generation += 1;
            if binding.key.as_ref() != Some(&key) {
                binding.subscription = None;
                binding.subscription = self.listen(&key);
                binding.key = Some(key.clone());
            }
            binding.generation
        };

        let state = self.client.query(&key, &self.options, fetcher).await;

        if self.binding().generation == generation {
            Some(state)
        } else {
            None
        }
    }

    fn listen(&self, key: &QueryKey) -> Option<Subscription> {
        let listener = Arc::clone(self.listener.as_ref()?);
        let cache = self.client.downgrade();
        Some(self.client.subscribe(key, move |key, _| {
            if let Some(inner) = cache.upgrade() {
                listener(inner.state(key));
            }
        }))
    }

    /// Cached state of the current key
    pub fn current(&self) -> QueryState<T> {
        match self.key() {
            Some(key) => self.client.get_query_state(&key),
            None => QueryState::idle(),
        }
    }

    /// Detach from the current key
    pub fn reset(&self) {
        let mut binding = self.binding();
        binding.generation += 1;
        binding.key = None;
        binding.subscription = None;
    }
}
