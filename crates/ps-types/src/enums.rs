use serde::{Deserialize, Serialize};

/// Moderation state of a post. Stored as INT in the posts table and carried
/// as a bare integer in JSON payloads.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, sqlx::Type, Default,
)]
#[serde(try_from = "i32", into = "i32")]
#[repr(i32)]
pub enum PostStatus {
    #[default]
    Pending = 0,
    Approved = 1,
    Rejected = 2,
}

impl TryFrom<i32> for PostStatus {
    type Error = String;

    fn try_from(value: i32) -> Result<Self, Self::Error> {
        match value {
            0 => Ok(PostStatus::Pending),
            1 => Ok(PostStatus::Approved),
            2 => Ok(PostStatus::Rejected),
            other => Err(format!("invalid post status: {other}")),
        }
    }
}

impl From<PostStatus> for i32 {
    fn from(value: PostStatus) -> Self {
        value as i32
    }
}

/// Editorial badge assigned by admins.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, sqlx::Type, Default,
)]
#[serde(try_from = "i32", into = "i32")]
#[repr(i32)]
pub enum OfficialTag {
    #[default]
    None = 0,
    Certified = 1,
    Deposit = 2,
    Rapid = 3,
}

impl TryFrom<i32> for OfficialTag {
    type Error = String;

    fn try_from(value: i32) -> Result<Self, Self::Error> {
        match value {
            0 => Ok(OfficialTag::None),
            1 => Ok(OfficialTag::Certified),
            2 => Ok(OfficialTag::Deposit),
            3 => Ok(OfficialTag::Rapid),
            other => Err(format!("invalid official tag: {other}")),
        }
    }
}

impl From<OfficialTag> for i32 {
    fn from(value: OfficialTag) -> Self {
        value as i32
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn status_round_trips_through_json_as_integer() {
        let json = serde_json::to_string(&PostStatus::Approved).unwrap();
        assert_eq!(json, "1");
        let back: PostStatus = serde_json::from_str(&json).unwrap();
        assert_eq!(back, PostStatus::Approved);
    }

    #[test]
    fn out_of_range_status_is_rejected() {
        let result: Result<PostStatus, _> = serde_json::from_str("7");
        assert!(result.is_err());
    }

    #[test]
    fn tag_defaults_to_none() {
        assert_eq!(OfficialTag::default(), OfficialTag::None);
        assert_eq!(i32::from(OfficialTag::Rapid), 3);
    }
}
