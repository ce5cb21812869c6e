//! Cached reads for every resource service, plus writes that invalidate the
//! entries they affect

use std::time::Duration;

use crate::comments::{Comment, CommentService, CreatedComment};
use crate::error::Result;
use crate::fetch::ApiClient;
use crate::leaderboard::{LeaderboardEntry, LeaderboardKind, LeaderboardService, Timeframe};
use crate::notifications::{MarkAllReadResponse, NotificationService, NotificationsPage, UnreadCount};
use crate::pagination::Page;
use crate::recipes::{MarkCookedResponse, Recipe, RecipeFilters, RecipeListItem, RecipeService, SaveToggleResponse};
use crate::social::{FeedRecipe, FollowToggle, FollowUser, SocialService};

use super::client::QueryClient;
use super::keys;
use super::state::{QueryOptions, QueryState};

/// Recipe listings stay fresh for two minutes
pub const RECIPES_STALE_TIME: Duration = Duration::from_secs(120);
/// Unread count stays fresh for thirty seconds
pub const UNREAD_COUNT_STALE_TIME: Duration = Duration::from_secs(30);

#[derive(Clone)]
pub struct Queries {
    cache: QueryClient,
    recipes: RecipeService,
    comments: CommentService,
    social: SocialService,
    leaderboard: LeaderboardService,
    notifications: NotificationService,
}

impl Queries {
    pub fn new(cache: QueryClient, api: ApiClient) -> Self {
        Self {
            cache,
            recipes: RecipeService::new(api.clone()),
            comments: CommentService::new(api.clone()),
            social: SocialService::new(api.clone()),
            leaderboard: LeaderboardService::new(api.clone()),
            notifications: NotificationService::new(api),
        }
    }

    pub fn cache(&self) -> &QueryClient {
        &self.cache
    }

    fn options(&self) -> QueryOptions {
        self.cache.default_options().clone()
    }

    pub async fn recipes(&self, filters: &RecipeFilters) -> QueryState<Page<RecipeListItem>> {
        let service = self.recipes.clone();
        let owned = filters.clone();
        let options = self.options().with_stale_time(RECIPES_STALE_TIME);
        self.cache
            .query(&keys::recipes(filters), &options, move || {
                let service = service.clone();
                let filters = owned.clone();
                async move { service.list_page(&filters).await }
            })
            .await
    }

    /// A recipe by slug; an empty slug leaves the query disabled
    pub async fn recipe(&self, slug: &str) -> QueryState<Recipe> {
        let service = self.recipes.clone();
        let owned = slug.to_string();
        let options = self.options().with_enabled(!slug.is_empty());
        self.cache
            .query(&keys::recipe(slug), &options, move || {
                let service = service.clone();
                let slug = owned.clone();
                async move { service.get(&slug).await }
            })
            .await
    }

    pub async fn saved_recipes(&self) -> QueryState<Vec<Recipe>> {
        let service = self.recipes.clone();
        self.cache
            .query(&keys::saved_recipes(), &self.options(), move || {
                let service = service.clone();
                async move { service.saved().await.map(|c| c.results) }
            })
            .await
    }

    pub async fn cooked_recipes(&self) -> QueryState<Vec<Recipe>> {
        let service = self.recipes.clone();
        self.cache
            .query(&keys::cooked_recipes(), &self.options(), move || {
                let service = service.clone();
                async move { service.cooked().await.map(|c| c.results) }
            })
            .await
    }

    pub async fn comments(&self, slug: &str, page: u32) -> QueryState<Page<Comment>> {
        let service = self.comments.clone();
        let owned = slug.to_string();
        let options = self.options().with_enabled(!slug.is_empty());
        self.cache
            .query(&keys::comments(slug, page), &options, move || {
                let service = service.clone();
                let slug = owned.clone();
                async move { service.list(&slug, page).await.map(|p| p.into_page()) }
            })
            .await
    }

    pub async fn followers(&self, user_id: &str, page: u32) -> QueryState<Page<FollowUser>> {
        let service = self.social.clone();
        let owned = user_id.to_string();
        self.cache
            .query(&keys::followers(user_id, page), &self.options(), move || {
                let service = service.clone();
                let user_id = owned.clone();
                async move { service.followers(&user_id, page).await.map(|p| p.into_page()) }
            })
            .await
    }

    pub async fn following(&self, user_id: &str, page: u32) -> QueryState<Page<FollowUser>> {
        let service = self.social.clone();
        let owned = user_id.to_string();
        self.cache
            .query(&keys::following(user_id, page), &self.options(), move || {
                let service = service.clone();
                let user_id = owned.clone();
                async move { service.following(&user_id, page).await.map(|p| p.into_page()) }
            })
            .await
    }

    pub async fn feed(&self, page: u32) -> QueryState<Page<FeedRecipe>> {
        let service = self.social.clone();
        self.cache
            .query(&keys::feed(page), &self.options(), move || {
                let service = service.clone();
                async move { service.feed(page).await.map(|p| p.into_page()) }
            })
            .await
    }

    pub async fn leaderboard(
        &self,
        kind: LeaderboardKind,
        timeframe: Timeframe,
        page: u32,
    ) -> QueryState<Page<LeaderboardEntry>> {
        let service = self.leaderboard.clone();
        self.cache
            .query(&keys::leaderboard(kind, timeframe, page), &self.options(), move || {
                let service = service.clone();
                async move { service.get(kind, timeframe, page).await.map(|p| p.into_page()) }
            })
            .await
    }

    pub async fn notifications(&self, page: u32, unread_only: bool) -> QueryState<NotificationsPage> {
        let service = self.notifications.clone();
        self.cache
            .query(&keys::notifications(page, unread_only), &self.options(), move || {
                let service = service.clone();
                async move { service.list(page, unread_only).await }
            })
            .await
    }

    pub async fn unread_count(&self) -> QueryState<UnreadCount> {
        let service = self.notifications.clone();
        let options = self.options().with_stale_time(UNREAD_COUNT_STALE_TIME);
        self.cache
            .query(&keys::unread_count(), &options, move || {
                let service = service.clone();
                async move { service.unread_count().await }
            })
            .await
    }

    /// Record a cook. The session's user is not touched; call
    /// `SessionStore::fetch_user` to pick up the new XP and level.
    pub async fn mark_cooked(&self, slug: &str) -> Result<MarkCookedResponse> {
        let response = self.recipes.mark_cooked(slug).await?;
        self.cache.invalidate(&keys::recipe(slug));
        self.cache.invalidate(&keys::cooked_recipes());
        self.cache.invalidate_kind(keys::LEADERBOARD);
        Ok(response)
    }

    pub async fn toggle_save(&self, slug: &str) -> Result<SaveToggleResponse> {
        let response = self.recipes.toggle_save(slug).await?;
        self.cache.invalidate(&keys::recipe(slug));
        self.cache.invalidate(&keys::saved_recipes());
        Ok(response)
    }

    pub async fn create_comment(&self, slug: &str, content: &str) -> Result<CreatedComment> {
        let created = self.comments.create(slug, content).await?;
        self.cache.invalidate_matching(&keys::all_comments(slug));
        Ok(created)
    }

    pub async fn delete_comment(&self, slug: &str, comment_id: &str) -> Result<()> {
        self.comments.delete(slug, comment_id).await?;
        self.cache.invalidate_matching(&keys::all_comments(slug));
        Ok(())
    }

    pub async fn toggle_follow(&self, user_id: &str) -> Result<FollowToggle> {
        let response = self.social.toggle_follow(user_id).await?;
        self.cache.invalidate_kind(keys::FOLLOWERS);
        self.cache.invalidate_kind(keys::FOLLOWING);
        self.cache.invalidate_kind(keys::FEED);
        Ok(response)
    }

    pub async fn mark_notification_read(&self, notification_id: &str) -> Result<()> {
        self.notifications.mark_read(notification_id).await?;
        self.cache.invalidate_kind(keys::NOTIFICATIONS);
        self.cache.invalidate(&keys::unread_count());
        Ok(())
    }

    pub async fn mark_all_notifications_read(&self) -> Result<MarkAllReadResponse> {
        let response = self.notifications.mark_all_read().await?;
        self.cache.invalidate_kind(keys::NOTIFICATIONS);
        self.cache.set_query_data(&keys::unread_count(), UnreadCount { unread_count: 0 });
        Ok(response)
    }
}
