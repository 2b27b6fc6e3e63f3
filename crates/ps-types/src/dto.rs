use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

use crate::enums::{OfficialTag, PostStatus};

pub const MAX_TITLE_LEN: usize = 255;
pub const MAX_CONTACT_LEN: usize = 255;
pub const AUTHOR_ID_LEN: usize = 36;
pub const MAX_AUTHOR_NAME_LEN: usize = 50;

/// Fields of `POST /posts` after multipart decoding; image bytes travel
/// separately.
#[derive(Debug, Clone, Deserialize)]
pub struct CreatePostRequest {
    pub title: String,
    pub content: String,
    pub price_per_unit: Decimal,
    pub contact_info: String,
    pub author_id: String,
    pub author_avatar: String,
    pub author_username: String,
}

impl CreatePostRequest {
    pub fn validate(&self) -> Result<(), String> {
        if self.title.trim().is_empty() {
            return Err("title is required".into());
        }
        if self.title.chars().count() > MAX_TITLE_LEN {
            return Err(format!("title exceeds {MAX_TITLE_LEN} characters"));
        }
        if self.content.trim().is_empty() {
            return Err("content is required".into());
        }
        if self.price_per_unit < Decimal::ZERO {
            return Err("price_per_unit must be >= 0".into());
        }
        if self.contact_info.trim().is_empty() {
            return Err("contact_info is required".into());
        }
        if self.contact_info.chars().count() > MAX_CONTACT_LEN {
            return Err(format!("contact_info exceeds {MAX_CONTACT_LEN} characters"));
        }
        if self.author_id.len() != AUTHOR_ID_LEN {
            return Err(format!("author_id must be {AUTHOR_ID_LEN} characters"));
        }
        if self.author_username.chars().count() > MAX_AUTHOR_NAME_LEN {
            return Err(format!(
                "author_username exceeds {MAX_AUTHOR_NAME_LEN} characters"
            ));
        }
        Ok(())
    }
}

/// `GET /posts/mine` filters, offset-paginated.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct OwnPostsQuery {
    pub title: Option<String>,
    pub status: Option<PostStatus>,
    pub official_tag: Option<OfficialTag>,
    #[serde(default = "default_page")]
    pub page: i64,
    #[serde(default = "default_page_size")]
    pub page_size: i64,
}

impl OwnPostsQuery {
    pub fn validate(&self) -> Result<(), String> {
        validate_page(self.page, self.page_size)
    }

    pub fn offset(&self) -> i64 {
        (self.page - 1) * self.page_size
    }
}

/// Keyset cursor for the timeline: strictly-descending `(created_at, id)`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct TimelineCursor {
    pub created_at: DateTime<Utc>,
    pub id: i64,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct TimelineQuery {
    pub title: Option<String>,
    pub official_tag: Option<OfficialTag>,
    pub cursor_created_at: Option<DateTime<Utc>>,
    pub cursor_id: Option<i64>,
    #[serde(default = "default_page_size")]
    pub limit: i64,
}

impl TimelineQuery {
    pub fn validate(&self) -> Result<(), String> {
        if self.limit < 1 {
            return Err("limit must be >= 1".into());
        }
        match (self.cursor_created_at, self.cursor_id) {
            (Some(_), Some(_)) | (None, None) => Ok(()),
            _ => Err("cursor_created_at and cursor_id must be passed together".into()),
        }
    }

    pub fn cursor(&self) -> Option<TimelineCursor> {
        match (self.cursor_created_at, self.cursor_id) {
            (Some(created_at), Some(id)) => Some(TimelineCursor { created_at, id }),
            _ => None,
        }
    }
}

/// `GET /posts/by-author`: id-cursor pagination of one author's approved
/// posts.
#[derive(Debug, Clone, Deserialize)]
pub struct AuthorPostsQuery {
    pub author_id: String,
    pub cursor: Option<i64>,
    #[serde(default = "default_page_size")]
    pub limit: i64,
}

impl AuthorPostsQuery {
    pub fn validate(&self) -> Result<(), String> {
        if self.author_id.trim().is_empty() {
            return Err("author_id is required".into());
        }
        if self.limit < 1 {
            return Err("limit must be >= 1".into());
        }
        Ok(())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum AdminOrderBy {
    CreatedAt,
    UpdatedAt,
}

impl Default for AdminOrderBy {
    fn default() -> Self {
        AdminOrderBy::CreatedAt
    }
}

/// Admin conditional query. An exact `id` overrides every other filter.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct AdminListQuery {
    pub id: Option<i64>,
    pub title_prefix: Option<String>,
    pub author_name_prefix: Option<String>,
    pub status: Option<PostStatus>,
    pub official_tag: Option<OfficialTag>,
    pub view_count_min: Option<i64>,
    pub view_count_max: Option<i64>,
    #[serde(default)]
    pub order_by: AdminOrderBy,
    #[serde(default)]
    pub order_desc: bool,
    #[serde(default = "default_page")]
    pub page: i64,
    #[serde(default = "default_page_size")]
    pub page_size: i64,
}

impl AdminListQuery {
    pub fn validate(&self) -> Result<(), String> {
        validate_page(self.page, self.page_size)?;
        if let (Some(min), Some(max)) = (self.view_count_min, self.view_count_max) {
            if min > max {
                return Err("view_count_min must be <= view_count_max".into());
            }
        }
        Ok(())
    }

    pub fn offset(&self) -> i64 {
        (self.page - 1) * self.page_size
    }
}

#[derive(Debug, Clone, Deserialize)]
pub struct UpdateStatusRequest {
    pub status: PostStatus,
    pub reason: Option<String>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct UpdateOfficialTagRequest {
    pub official_tag: OfficialTag,
}

fn default_page() -> i64 {
    1
}

fn default_page_size() -> i64 {
    20
}

fn validate_page(page: i64, page_size: i64) -> Result<(), String> {
    if page < 1 {
        return Err("page must be >= 1".into());
    }
    if page_size < 1 {
        return Err("page_size must be >= 1".into());
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn create_request() -> CreatePostRequest {
        CreatePostRequest {
            title: "garden tools".into(),
            content: "three sets".into(),
            price_per_unit: Decimal::new(1250, 2),
            contact_info: "gardener@example.com".into(),
            author_id: "f3b4a1d2-0000-0000-0000-000000000042".into(),
            author_avatar: "https://cdn.example.com/u/42.png".into(),
            author_username: "gardener".into(),
        }
    }

    #[test]
    fn create_request_accepts_valid_input() {
        assert!(create_request().validate().is_ok());
    }

    #[test]
    fn create_request_rejects_blank_title_and_negative_price() {
        let mut request = create_request();
        request.title = "  ".into();
        assert!(request.validate().is_err());

        let mut request = create_request();
        request.price_per_unit = Decimal::new(-1, 0);
        assert!(request.validate().is_err());
    }

    #[test]
    fn create_request_rejects_wrong_author_id_length() {
        let mut request = create_request();
        request.author_id = "short".into();
        assert!(request.validate().is_err());
    }

    #[test]
    fn page_below_one_is_invalid() {
        let query = AdminListQuery {
            page: 0,
            ..Default::default()
        };
        assert!(query.validate().is_err());
    }

    #[test]
    fn admin_query_rejects_inverted_view_count_range() {
        let query = AdminListQuery {
            view_count_min: Some(100),
            view_count_max: Some(10),
            page: 1,
            page_size: 20,
            ..Default::default()
        };
        assert!(query.validate().is_err());
    }

    #[test]
    fn timeline_cursor_halves_must_travel_together() {
        let query = TimelineQuery {
            cursor_id: Some(10),
            limit: 2,
            ..Default::default()
        };
        assert!(query.validate().is_err());
    }

    #[test]
    fn own_posts_offset_is_zero_based() {
        let query = OwnPostsQuery {
            page: 3,
            page_size: 20,
            ..Default::default()
        };
        assert_eq!(query.offset(), 40);
    }
}
