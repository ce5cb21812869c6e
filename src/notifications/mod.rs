//! Notification inbox

mod poller;

use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::error::Result;
use crate::fetch::{ApiClient, QueryParams};
use crate::pagination::NumberedPage;

pub use poller::UnreadCountPoller;

/// Notifications requested per page
pub const NOTIFICATIONS_PAGE_SIZE: u32 = 20;

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum NotificationType {
    NewFollower,
    Comment,
    RecipeComment,
    CommentLike,
    CommentReply,
    RecipeLike,
    RecipeLiked,
    RecipeCooked,
    BadgeEarned,
    LevelUp,
    Mention,
    #[serde(other)]
    Other,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct NotificationSender {
    pub id: String,
    pub username: String,
    #[serde(default)]
    pub level: Option<u32>,
    #[serde(default)]
    pub avatar_url: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Notification {
    pub id: String,
    #[serde(rename = "type")]
    pub kind: NotificationType,
    pub title: String,
    pub message: String,
    /// Object the notification refers to, e.g. `{"type": "recipe", "id": "..."}`
    #[serde(default)]
    pub related_object: Option<Value>,
    #[serde(default)]
    pub metadata: Option<Value>,
    pub is_read: bool,
    #[serde(default)]
    pub sender: Option<NotificationSender>,
    #[serde(default)]
    pub created_at: Option<String>,
    #[serde(default)]
    pub read_at: Option<String>,
}

/// Numbered page of notifications with the unread total
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct NotificationsPage {
    #[serde(default)]
    pub unread_count: Option<u64>,
    #[serde(flatten)]
    pub page: NumberedPage<Notification>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct UnreadCount {
    pub unread_count: u64,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MarkAllReadResponse {
    #[serde(default)]
    pub message: Option<String>,
    #[serde(default)]
    pub count: u64,
}

/// Client for the notification endpoints
#[derive(Clone)]
pub struct NotificationService {
    api: ApiClient,
}

impl NotificationService {
    pub fn new(api: ApiClient) -> Self {
        Self { api }
    }

    pub async fn list(&self, page: u32, unread_only: bool) -> Result<NotificationsPage> {
        let query = QueryParams::new()
            .set("page", page)
            .set("limit", NOTIFICATIONS_PAGE_SIZE)
            .flag("unread_only", unread_only);
        self.api.get("/notifications", Some(&query)).await
    }

    pub async fn unread_count(&self) -> Result<UnreadCount> {
        self.api.get("/notifications/unread-count", None).await
    }

    pub async fn mark_read(&self, notification_id: &str) -> Result<()> {
        self.api
            .post::<Value>(&format!("/notifications/{}/read", notification_id), None)
            .await
            .map(|_| ())
    }

    pub async fn mark_all_read(&self) -> Result<MarkAllReadResponse> {
        self.api.post("/notifications/mark-all-read", None).await
    }

    pub async fn delete(&self, notification_id: &str) -> Result<()> {
        self.api
            .delete(&format!("/notifications/{}", notification_id))
            .await
    }
}
