pub mod dto;
pub mod entities;
pub mod enums;
pub mod events;
pub mod views;

pub use entities::{Post, PostDetail, PostDetailImage};
pub use enums::{OfficialTag, PostStatus};
pub use views::{PostDetailView, PostImageView, PostSummary};
