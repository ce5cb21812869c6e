//! Keyed cache of server reads
//!
//! [`QueryClient`] stores one entry per [`QueryKey`], coalesces concurrent fetches
//! of the same key, serves stale data while revalidating in the background and
//! reports every transition to subscribers. [`Queries`] wires each resource
//! service to it.

mod client;
mod key;
pub mod keys;
mod observer;
mod queries;
mod state;

pub use client::{QueryClient, Subscription};
pub use key::QueryKey;
pub use observer::QueryObserver;
pub use queries::{Queries, RECIPES_STALE_TIME, UNREAD_COUNT_STALE_TIME};
pub use state::{QueryEvent, QueryOptions, QueryState, QueryStatus};
