use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

use crate::entities::{Post, PostDetail, PostDetailImage};
use crate::enums::{OfficialTag, PostStatus};

/// Compact post representation cached in the summary hash and returned by
/// list endpoints. `view_count` is the snapshot score, not the live counter.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PostSummary {
    pub id: i64,
    pub title: String,
    pub author_id: String,
    pub author_avatar: String,
    pub author_username: String,
    pub status: PostStatus,
    pub view_count: i64,
    pub official_tag: OfficialTag,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl PostSummary {
    pub fn from_post(post: &Post) -> Self {
        Self {
            id: post.id,
            title: post.title.clone(),
            author_id: post.author_id.clone(),
            author_avatar: post.author_avatar.clone(),
            author_username: post.author_username.clone(),
            status: post.status,
            view_count: post.view_count,
            official_tag: post.official_tag,
            created_at: post.created_at,
            updated_at: post.updated_at,
        }
    }

    pub fn with_view_count(post: &Post, view_count: i64) -> Self {
        let mut summary = Self::from_post(post);
        summary.view_count = view_count;
        summary
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PostImageView {
    pub image_url: String,
    pub object_key: String,
    pub display_order: i32,
}

impl From<&PostDetailImage> for PostImageView {
    fn from(image: &PostDetailImage) -> Self {
        Self {
            image_url: image.image_url.clone(),
            object_key: image.object_key.clone(),
            display_order: image.display_order,
        }
    }
}

/// Aggregated detail object cached per post and served by detail endpoints.
/// Images are sorted by display order at aggregation time.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PostDetailView {
    pub id: i64,
    pub title: String,
    pub author_id: String,
    pub author_avatar: String,
    pub author_username: String,
    pub view_count: i64,
    pub official_tag: OfficialTag,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
    pub content: String,
    pub price_per_unit: Decimal,
    pub contact_info: String,
    pub images: Vec<PostImageView>,
}

impl PostDetailView {
    pub fn assemble(
        post: &Post,
        detail: &PostDetail,
        images: &[PostDetailImage],
        view_count: i64,
    ) -> Self {
        let mut views: Vec<PostImageView> = images.iter().map(PostImageView::from).collect();
        views.sort_by_key(|image| image.display_order);
        Self {
            id: post.id,
            title: post.title.clone(),
            author_id: post.author_id.clone(),
            author_avatar: post.author_avatar.clone(),
            author_username: post.author_username.clone(),
            view_count,
            official_tag: post.official_tag,
            created_at: post.created_at,
            updated_at: post.updated_at,
            content: detail.content.clone(),
            price_per_unit: detail.price_per_unit,
            contact_info: detail.contact_info.clone(),
            images: views,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    fn fixture_post() -> Post {
        let at = Utc.with_ymd_and_hms(2025, 6, 1, 12, 0, 0).unwrap();
        Post {
            id: 42,
            title: "garden tools".into(),
            author_id: "f3b4a1d2-0000-0000-0000-000000000042".into(),
            author_avatar: "https://cdn.example.com/u/42.png".into(),
            author_username: "gardener".into(),
            status: PostStatus::Approved,
            view_count: 7,
            official_tag: OfficialTag::Certified,
            audit_reason: None,
            created_at: at,
            updated_at: at,
            deleted_at: None,
        }
    }

    fn fixture_detail() -> PostDetail {
        let at = Utc.with_ymd_and_hms(2025, 6, 1, 12, 0, 0).unwrap();
        PostDetail {
            id: 9,
            post_id: 42,
            content: "three sets of tools".into(),
            price_per_unit: Decimal::new(1250, 2),
            contact_info: "gardener@example.com".into(),
            created_at: at,
            updated_at: at,
            deleted_at: None,
        }
    }

    fn fixture_image(order: i32) -> PostDetailImage {
        let at = Utc.with_ymd_and_hms(2025, 6, 1, 12, 0, 0).unwrap();
        PostDetailImage {
            id: order as i64,
            post_detail_id: 9,
            image_url: format!("https://cdn.example.com/p/42/{order}.png"),
            object_key: format!("posts/42/{order}.png"),
            display_order: order,
            created_at: at,
            updated_at: at,
            deleted_at: None,
        }
    }

    #[test]
    fn summary_overrides_view_count() {
        let summary = PostSummary::with_view_count(&fixture_post(), 100);
        assert_eq!(summary.view_count, 100);
        assert_eq!(summary.id, 42);
    }

    #[test]
    fn summary_serialization_is_canonical() {
        let summary = PostSummary::with_view_count(&fixture_post(), 100);
        let json = serde_json::to_string(&summary).unwrap();
        let back: PostSummary = serde_json::from_str(&json).unwrap();
        assert_eq!(back, summary);
        // Re-serializing the decoded value yields the same bytes.
        assert_eq!(serde_json::to_string(&back).unwrap(), json);
    }

    #[test]
    fn assemble_sorts_images_by_display_order() {
        let images = vec![fixture_image(2), fixture_image(0), fixture_image(1)];
        let view = PostDetailView::assemble(&fixture_post(), &fixture_detail(), &images, 55);
        let orders: Vec<i32> = view.images.iter().map(|image| image.display_order).collect();
        assert_eq!(orders, vec![0, 1, 2]);
        assert_eq!(view.view_count, 55);
    }

    #[test]
    fn detail_view_round_trips_through_json() {
        let images = vec![fixture_image(0), fixture_image(1)];
        let view = PostDetailView::assemble(&fixture_post(), &fixture_detail(), &images, 7);
        let json = serde_json::to_string(&view).unwrap();
        let back: PostDetailView = serde_json::from_str(&json).unwrap();
        assert_eq!(back, view);
        assert_eq!(serde_json::to_string(&back).unwrap(), json);
    }
}
