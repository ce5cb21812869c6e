//! Recipe API Rust Client Library
//!
//! An async client for the recipe-sharing API: authentication with a persisted
//! token session, typed services for recipes, comments, follows, leaderboards and
//! notifications, and a keyed query cache with request de-duplication and
//! stale-while-revalidate reads.

pub mod auth;
pub mod comments;
pub mod config;
pub mod error;
pub mod fetch;
pub mod leaderboard;
pub mod notifications;
pub mod pagination;
pub mod query;
pub mod recipes;
pub mod social;

use log::info;
use std::sync::Arc;

use crate::auth::session::SessionState;
use crate::auth::{MemoryStorage, SessionStore, TokenStorage, User};
use crate::comments::CommentService;
use crate::config::ClientOptions;
use crate::error::Result;
use crate::fetch::ApiClient;
use crate::leaderboard::LeaderboardService;
use crate::notifications::{NotificationService, UnreadCountPoller};
use crate::query::{Queries, QueryClient, QueryOptions};
use crate::recipes::RecipeService;
use crate::social::SocialService;

/// The main entry point for the recipe API client
///
/// One instance owns the session and the query cache; clones of the services it
/// hands out share both.
pub struct RecipeClient {
    api: ApiClient,
    session: SessionStore,
    recipes: RecipeService,
    comments: CommentService,
    social: SocialService,
    leaderboard: LeaderboardService,
    notifications: NotificationService,
    cache: QueryClient,
    queries: Queries,
}

impl RecipeClient {
    /// Create a client that keeps tokens in memory only
    ///
    /// # Example
    ///
    /// ```
    /// use recipe_client::{config::ClientOptions, RecipeClient};
    ///
    /// let client = RecipeClient::new(ClientOptions::new("http://localhost:8000/api")).unwrap();
    /// assert!(!client.session().is_authenticated());
    /// ```
    pub fn new(options: ClientOptions) -> Result<Self> {
        Self::with_storage(options, Arc::new(MemoryStorage::new()))
    }

    /// Create a client persisting tokens to `storage`
    pub fn with_storage(options: ClientOptions, storage: Arc<dyn TokenStorage>) -> Result<Self> {
        let defaults = QueryOptions::new()
            .with_stale_time(options.default_stale_time)
            .with_retry(options.default_retry);

        let state = Arc::new(SessionState::new(storage, &options));
        let api = ApiClient::new(options, state)?;
        let cache = QueryClient::new(defaults);

        Ok(Self {
            session: SessionStore::new(api.clone()),
            recipes: RecipeService::new(api.clone()),
            comments: CommentService::new(api.clone()),
            social: SocialService::new(api.clone()),
            leaderboard: LeaderboardService::new(api.clone()),
            notifications: NotificationService::new(api.clone()),
            queries: Queries::new(cache.clone(), api.clone()),
            cache,
            api,
        })
    }

    pub fn options(&self) -> &ClientOptions {
        self.api.options()
    }

    /// Restore a persisted session, returning its user when still valid
    pub async fn init(&self) -> Result<Option<User>> {
        self.session.init().await
    }

    pub fn session(&self) -> &SessionStore {
        &self.session
    }

    pub fn recipes(&self) -> &RecipeService {
        &self.recipes
    }

    pub fn comments(&self) -> &CommentService {
        &self.comments
    }

    pub fn social(&self) -> &SocialService {
        &self.social
    }

    pub fn leaderboard(&self) -> &LeaderboardService {
        &self.leaderboard
    }

    pub fn notifications(&self) -> &NotificationService {
        &self.notifications
    }

    /// The shared query cache
    pub fn cache(&self) -> &QueryClient {
        &self.cache
    }

    /// Cached reads and invalidating writes
    pub fn queries(&self) -> &Queries {
        &self.queries
    }

    /// Sign out and drop everything cached for the previous user
    pub async fn logout(&self) {
        self.session.logout().await;
        self.cache.clear();
    }

    /// Start polling the unread notification count for the current session
    pub fn spawn_unread_poller(&self) -> UnreadCountPoller {
        UnreadCountPoller::spawn(
            self.notifications.clone(),
            self.cache.clone(),
            self.session.subscribe(),
            self.options().unread_poll_interval,
        )
    }

    /// Tear down the cache. Fetches still in flight complete without writing back.
    pub fn shutdown(&self) {
        info!("Shutting down recipe client");
        self.cache.clear();
    }
}

pub mod prelude {
    pub use crate::auth::{FileStorage, LoginRequest, MemoryStorage, RegisterRequest, Session, SessionStore, TokenStorage, UpdateProfileRequest, User};
    pub use crate::config::ClientOptions;
    pub use crate::error::{ApiError, ErrorKind, Result};
    pub use crate::pagination::Page;
    pub use crate::query::{keys, QueryKey, QueryObserver, QueryOptions, QueryState, QueryStatus};
    pub use crate::recipes::{Difficulty, Rarity, RecipeFilters};
    pub use crate::RecipeClient;
}
