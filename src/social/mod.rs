//! Follow graph and activity feed

use serde::{Deserialize, Serialize};

use crate::error::Result;
use crate::fetch::{ApiClient, QueryParams};
use crate::pagination::NumberedPage;
use crate::recipes::{AuthorSummary, Difficulty, RatingStats};

/// Users requested per page
pub const FOLLOW_PAGE_SIZE: u32 = 20;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FollowUser {
    pub id: String,
    pub username: String,
    #[serde(default)]
    pub level: u32,
    #[serde(default)]
    pub xp: u64,
    #[serde(default)]
    pub followers_count: u64,
    #[serde(default)]
    pub is_following: bool,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FollowToggle {
    /// `followed` or `unfollowed`
    pub action: String,
    pub is_following: bool,
    pub followers_count: u64,
    pub following_count: u64,
}

/// Recipe posted by a followed user
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FeedRecipe {
    pub id: String,
    pub slug: String,
    pub title: String,
    #[serde(default)]
    pub description: String,
    pub author: AuthorSummary,
    #[serde(default)]
    pub images: Vec<String>,
    pub difficulty: Difficulty,
    #[serde(default)]
    pub total_time: u32,
    #[serde(default)]
    pub rating_stats: RatingStats,
    #[serde(default)]
    pub created_at: Option<String>,
}

/// Client for the follow endpoints
#[derive(Clone)]
pub struct SocialService {
    api: ApiClient,
}

impl SocialService {
    pub fn new(api: ApiClient) -> Self {
        Self { api }
    }

    fn page_query(page: u32) -> QueryParams {
        QueryParams::new()
            .set("page", page)
            .set("limit", FOLLOW_PAGE_SIZE)
    }

    /// Follow the user, or unfollow when already following
    pub async fn toggle_follow(&self, user_id: &str) -> Result<FollowToggle> {
        self.api
            .post(&format!("/users/{}/follow", user_id), None)
            .await
    }

    pub async fn followers(&self, user_id: &str, page: u32) -> Result<NumberedPage<FollowUser>> {
        self.api
            .get(
                &format!("/users/{}/followers", user_id),
                Some(&Self::page_query(page)),
            )
            .await
    }

    pub async fn following(&self, user_id: &str, page: u32) -> Result<NumberedPage<FollowUser>> {
        self.api
            .get(
                &format!("/users/{}/following", user_id),
                Some(&Self::page_query(page)),
            )
            .await
    }

    /// Recipes from followed users, newest first
    pub async fn feed(&self, page: u32) -> Result<NumberedPage<FeedRecipe>> {
        self.api
            .get("/users/feed", Some(&Self::page_query(page)))
            .await
    }
}
