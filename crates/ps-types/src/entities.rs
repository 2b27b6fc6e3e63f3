use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use sqlx::FromRow;

use crate::enums::{OfficialTag, PostStatus};

/// Row in `posts`. Externally visible iff `status == Approved` and
/// `deleted_at` is null.
#[derive(Debug, Clone, Serialize, Deserialize, FromRow)]
pub struct Post {
    pub id: i64,
    pub title: String,
    pub author_id: String,
    pub author_avatar: String,
    pub author_username: String,
    pub status: PostStatus,
    pub view_count: i64,
    pub official_tag: OfficialTag,
    pub audit_reason: Option<String>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
    pub deleted_at: Option<DateTime<Utc>>,
}

impl Post {
    pub fn is_visible(&self) -> bool {
        self.status == PostStatus::Approved && self.deleted_at.is_none()
    }
}

/// Row in `post_details`. At most one non-deleted detail per post.
#[derive(Debug, Clone, Serialize, Deserialize, FromRow)]
pub struct PostDetail {
    pub id: i64,
    pub post_id: i64,
    pub content: String,
    pub price_per_unit: Decimal,
    pub contact_info: String,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
    pub deleted_at: Option<DateTime<Utc>>,
}

/// Row in `post_detail_images`, ordered within a detail by `display_order`.
#[derive(Debug, Clone, Serialize, Deserialize, FromRow)]
pub struct PostDetailImage {
    pub id: i64,
    pub post_detail_id: i64,
    pub image_url: String,
    pub object_key: String,
    pub display_order: i32,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
    pub deleted_at: Option<DateTime<Utc>>,
}

#[cfg(test)]
mod tests {
    use super::*;

    fn post(status: PostStatus, deleted: bool) -> Post {
        let now = Utc::now();
        Post {
            id: 1,
            title: "hello".into(),
            author_id: "a".repeat(36),
            author_avatar: "https://cdn.example.com/a.png".into(),
            author_username: "alice".into(),
            status,
            view_count: 0,
            official_tag: OfficialTag::None,
            audit_reason: None,
            created_at: now,
            updated_at: now,
            deleted_at: deleted.then_some(now),
        }
    }

    #[test]
    fn only_approved_live_posts_are_visible() {
        assert!(post(PostStatus::Approved, false).is_visible());
        assert!(!post(PostStatus::Pending, false).is_visible());
        assert!(!post(PostStatus::Rejected, false).is_visible());
        assert!(!post(PostStatus::Approved, true).is_visible());
    }
}
