use futures_util::future::{BoxFuture, Shared};
use std::any::Any;
use std::sync::Arc;
use std::time::Duration;
use tokio::time::Instant;

use crate::error::ApiError;

/// Lifecycle of a cache entry
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum QueryStatus {
    /// Never requested, or the query is disabled
    #[default]
    Idle,
    /// First fetch in progress, no data yet
    Pending,
    Success,
    Error,
}

/// Transition reported to subscribers
#[derive(Debug, Clone, PartialEq)]
pub enum QueryEvent {
    Fetching,
    Success,
    Error(ApiError),
    /// Data written directly through `set_query_data`
    Updated,
    Invalidated,
    Removed,
}

/// Per-query options
#[derive(Debug, Clone, PartialEq)]
pub struct QueryOptions {
    /// How long a successful result stays fresh
    pub stale_time: Duration,
    /// Disabled queries never fetch
    pub enabled: bool,
    /// Extra attempts for network failures and 5xx responses
    pub retry: u32,
}

impl Default for QueryOptions {
    fn default() -> Self {
        Self {
            stale_time: Duration::ZERO,
            enabled: true,
            retry: 1,
        }
    }
}

impl QueryOptions {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_stale_time(mut self, stale_time: Duration) -> Self {
        self.stale_time = stale_time;
        self
    }

    pub fn with_enabled(mut self, enabled: bool) -> Self {
        self.enabled = enabled;
        self
    }

    pub fn with_retry(mut self, retry: u32) -> Self {
        self.retry = retry;
        self
    }
}

/// Snapshot of one query as seen by a caller
#[derive(Debug, Clone)]
pub struct QueryState<T> {
    pub status: QueryStatus,
    /// Last successful data; kept through later errors and refetches
    pub data: Option<Arc<T>>,
    /// Error of the most recent failed fetch
    pub error: Option<ApiError>,
    /// A fetch for this key is in flight
    pub is_fetching: bool,
    pub updated_at: Option<Instant>,
}

impl<T> QueryState<T> {
    pub(crate) fn idle() -> Self {
        Self {
            status: QueryStatus::Idle,
            data: None,
            error: None,
            is_fetching: false,
            updated_at: None,
        }
    }

    /// Waiting for the first result
    pub fn is_loading(&self) -> bool {
        self.status == QueryStatus::Pending
    }

    pub fn is_success(&self) -> bool {
        self.status == QueryStatus::Success
    }

    pub fn is_error(&self) -> bool {
        self.status == QueryStatus::Error
    }
}

pub(crate) type Flight = Shared<BoxFuture<'static, ()>>;

pub(crate) struct CacheEntry {
    pub status: QueryStatus,
    pub data: Option<Arc<dyn Any + Send + Sync>>,
    pub error: Option<ApiError>,
    pub updated_at: Option<Instant>,
    pub invalidated: bool,
    /// Identifies the fetch whose result may be applied
    pub generation: u64,
    pub in_flight: Option<Flight>,
}

impl CacheEntry {
    pub fn new() -> Self {
        Self {
            status: QueryStatus::Idle,
            data: None,
            error: None,
            updated_at: None,
            invalidated: false,
            generation: 0,
            in_flight: None,
        }
    }

    /// Whether an access now must start a fetch
    pub fn needs_fetch(&self, stale_time: Duration, now: Instant) -> bool {
        if self.in_flight.is_some() {
            return false;
        }
        if self.invalidated || self.status != QueryStatus::Success {
            return true;
        }
        match self.updated_at {
            Some(at) => now.saturating_duration_since(at) >= stale_time,
            None => true,
        }
    }

    pub fn state<T: Send + Sync + 'static>(&self) -> QueryState<T> {
        let data = self
            .data
            .clone()
            .and_then(|data| Arc::downcast::<T>(data).ok());
        QueryState {
            status: self.status,
            data,
            error: self.error.clone(),
            is_fetching: self.in_flight.is_some(),
            updated_at: self.updated_at,
        }
    }
}
