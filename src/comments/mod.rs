//! Recipe comment service

use serde::{Deserialize, Serialize};
use serde_json::{json, Value};

use crate::error::Result;
use crate::fetch::{ApiClient, QueryParams};
use crate::pagination::{Page, PaginationInfo};

/// Comments requested per page
pub const COMMENTS_PAGE_SIZE: u32 = 20;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CommentAuthor {
    pub id: String,
    pub username: String,
    #[serde(default)]
    pub level: Option<u32>,
    #[serde(default)]
    pub avatar_url: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Comment {
    pub id: String,
    #[serde(default)]
    pub recipe: Option<String>,
    pub author: CommentAuthor,
    pub content: String,
    #[serde(default)]
    pub likes_count: u64,
    #[serde(default)]
    pub is_liked: bool,
    #[serde(default)]
    pub created_at: Option<String>,
    #[serde(default)]
    pub updated_at: Option<String>,
}

/// `{comments, pagination}` listing
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CommentsPage {
    pub comments: Vec<Comment>,
    pub pagination: PaginationInfo,
}

impl CommentsPage {
    pub fn into_page(self) -> Page<Comment> {
        Page {
            items: self.comments,
            page: self.pagination.page,
            page_size: self.pagination.limit,
            total_count: self.pagination.total,
            total_pages: self.pagination.total_pages,
        }
    }
}

/// Result of posting a comment
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CreatedComment {
    pub comment: Comment,
    #[serde(default)]
    pub xp_awarded: u64,
    /// Level-up details when the comment pushed the author to a new level
    #[serde(default)]
    pub level_up: Option<Value>,
    #[serde(default)]
    pub badges_earned: Option<Value>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct LikeToggle {
    pub is_liked: bool,
    pub likes_count: u64,
}

// Edits come back either bare or wrapped in `{"comment": ...}`
#[derive(Deserialize)]
#[serde(untagged)]
enum CommentEnvelope {
    Wrapped { comment: Comment },
    Bare(Comment),
}

impl From<CommentEnvelope> for Comment {
    fn from(envelope: CommentEnvelope) -> Self {
        match envelope {
            CommentEnvelope::Wrapped { comment } => comment,
            CommentEnvelope::Bare(comment) => comment,
        }
    }
}

/// Client for the comment endpoints of a recipe
#[derive(Clone)]
pub struct CommentService {
    api: ApiClient,
}

impl CommentService {
    pub fn new(api: ApiClient) -> Self {
        Self { api }
    }

    pub async fn list(&self, recipe_slug: &str, page: u32) -> Result<CommentsPage> {
        let query = QueryParams::new()
            .set("page", page)
            .set("limit", COMMENTS_PAGE_SIZE);
        self.api
            .get(&format!("/recipes/{}/comments", recipe_slug), Some(&query))
            .await
    }

    pub async fn create(&self, recipe_slug: &str, content: &str) -> Result<CreatedComment> {
        self.api
            .post(
                &format!("/recipes/{}/comments", recipe_slug),
                Some(json!({ "content": content })),
            )
            .await
    }

    pub async fn update(&self, recipe_slug: &str, comment_id: &str, content: &str) -> Result<Comment> {
        let envelope: CommentEnvelope = self
            .api
            .put(
                &format!("/recipes/{}/comments/{}", recipe_slug, comment_id),
                json!({ "content": content }),
            )
            .await?;
        Ok(envelope.into())
    }

    pub async fn delete(&self, recipe_slug: &str, comment_id: &str) -> Result<()> {
        self.api
            .delete(&format!("/recipes/{}/comments/{}", recipe_slug, comment_id))
            .await
    }

    pub async fn toggle_like(&self, recipe_slug: &str, comment_id: &str) -> Result<LikeToggle> {
        self.api
            .post(
                &format!("/recipes/{}/comments/{}/like", recipe_slug, comment_id),
                None,
            )
            .await
    }
}
