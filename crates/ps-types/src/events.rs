use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::enums::{OfficialTag, PostStatus};
use crate::views::PostImageView;

/// Common envelope fields carried by every lifecycle event. Consumers use
/// `event_id` for idempotency.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EventMeta {
    pub event_id: Uuid,
    pub timestamp: DateTime<Utc>,
}

impl EventMeta {
    pub fn new() -> Self {
        Self {
            event_id: Uuid::new_v4(),
            timestamp: Utc::now(),
        }
    }
}

impl Default for EventMeta {
    fn default() -> Self {
        Self::new()
    }
}

/// Full aggregate shipped to the moderation service so it never has to read
/// the database.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PendingAuditEvent {
    #[serde(flatten)]
    pub meta: EventMeta,
    pub post_id: i64,
    pub title: String,
    pub content: String,
    pub author_id: String,
    pub author_avatar: String,
    pub author_username: String,
    pub status: PostStatus,
    pub view_count: i64,
    pub official_tag: OfficialTag,
    pub price_per_unit: Decimal,
    pub contact_info: String,
    pub images: Vec<PostImageView>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ApprovedEvent {
    #[serde(flatten)]
    pub meta: EventMeta,
    pub post_id: i64,
}

/// One machine-detected problem inside a rejected post.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RejectionDetail {
    pub label: String,
    pub suggestion: String,
    pub score: f64,
    #[serde(default)]
    pub matched_content: Vec<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RejectedEvent {
    #[serde(flatten)]
    pub meta: EventMeta,
    pub post_id: i64,
    pub suggestion: String,
    #[serde(default)]
    pub details: Vec<RejectionDetail>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DeletedEvent {
    #[serde(flatten)]
    pub meta: EventMeta,
    pub post_id: i64,
}

impl ApprovedEvent {
    pub fn new(post_id: i64) -> Self {
        Self {
            meta: EventMeta::new(),
            post_id,
        }
    }
}

impl DeletedEvent {
    pub fn new(post_id: i64) -> Self {
        Self {
            meta: EventMeta::new(),
            post_id,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn meta_fields_flatten_into_the_payload() {
        let event = DeletedEvent::new(42);
        let value = serde_json::to_value(&event).unwrap();
        assert!(value.get("event_id").is_some());
        assert!(value.get("timestamp").is_some());
        assert_eq!(value.get("post_id").unwrap(), 42);
    }

    #[test]
    fn rejected_event_parses_without_details() {
        let raw = r#"{
            "event_id": "0b946e0a-88a3-4c11-8f4c-1a70c06e7a10",
            "timestamp": "2025-06-01T12:00:00Z",
            "post_id": 7,
            "suggestion": "block"
        }"#;
        let event: RejectedEvent = serde_json::from_str(raw).unwrap();
        assert_eq!(event.post_id, 7);
        assert!(event.details.is_empty());
    }

    #[test]
    fn rejected_event_round_trips_details() {
        let event = RejectedEvent {
            meta: EventMeta::new(),
            post_id: 7,
            suggestion: "block".into(),
            details: vec![RejectionDetail {
                label: "Abuse".into(),
                suggestion: "block".into(),
                score: 0.93,
                matched_content: vec!["bad phrase".into()],
            }],
        };
        let json = serde_json::to_string(&event).unwrap();
        let back: RejectedEvent = serde_json::from_str(&json).unwrap();
        assert_eq!(back, event);
    }

    #[test]
    fn pending_audit_event_carries_the_full_aggregate() {
        let event = PendingAuditEvent {
            meta: EventMeta::new(),
            post_id: 42,
            title: "garden tools".into(),
            content: "three sets".into(),
            author_id: "f3b4a1d2-0000-0000-0000-000000000042".into(),
            author_avatar: "https://cdn.example.com/u/42.png".into(),
            author_username: "gardener".into(),
            status: PostStatus::Pending,
            view_count: 0,
            official_tag: OfficialTag::None,
            price_per_unit: Decimal::new(1250, 2),
            contact_info: "gardener@example.com".into(),
            images: vec![PostImageView {
                image_url: "https://cdn.example.com/p/42/0.png".into(),
                object_key: "posts/42/0.png".into(),
                display_order: 0,
            }],
        };
        let value = serde_json::to_value(&event).unwrap();
        assert_eq!(value["post_id"], 42);
        assert_eq!(value["status"], 0);
        assert_eq!(value["images"][0]["display_order"], 0);
        assert!(value.get("event_id").is_some());
    }

    #[test]
    fn every_event_gets_a_unique_id() {
        assert_ne!(
            ApprovedEvent::new(1).meta.event_id,
            ApprovedEvent::new(1).meta.event_id
        );
    }
}
