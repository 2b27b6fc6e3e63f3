use axum::extract::{Multipart, Path, Query, State};
use axum::Json;
use rust_decimal::Decimal;
use serde::Serialize;
use uuid::Uuid;

use ps_core::blob::{BlobStore, StoredObject};
use ps_types::dto::{AuthorPostsQuery, CreatePostRequest, OwnPostsQuery, TimelineCursor, TimelineQuery};
use ps_types::events::{EventMeta, PendingAuditEvent};
use ps_types::views::PostImageView;
use ps_types::{PostDetailView, PostSummary};

use ps_store::images::NewPostImage;
use ps_store::lifecycle::{self, NewPostAggregate};
use ps_store::posts::{self as post_queries, NewPost};

use crate::envelope::{ok, ApiError, ApiResult, Envelope};
use crate::identity::Identity;
use crate::AppState;

#[derive(Debug, Serialize)]
pub struct PagedBody {
    pub items: Vec<PostSummary>,
    pub total: i64,
}

#[derive(Debug, Serialize)]
pub struct CursorBody {
    pub items: Vec<PostSummary>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub next_cursor: Option<i64>,
}

#[derive(Debug, Serialize)]
pub struct TimelineBody {
    pub items: Vec<PostSummary>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub next_cursor: Option<TimelineCursor>,
}

struct UploadedImage {
    object: StoredObject,
    display_order: i32,
}

/// Multipart create: text fields plus any number of `images` parts. Blobs
/// are uploaded before the transaction; if the transaction fails they are
/// deleted best-effort and the error surfaces.
pub async fn create_post<B>(
    State(state): State<AppState<B>>,
    identity: Identity,
    mut multipart: Multipart,
) -> ApiResult<Json<Envelope<PostSummary>>>
where
    B: BlobStore + Clone + Send + Sync + 'static,
{
    let mut title = String::new();
    let mut content = String::new();
    let mut price_per_unit = Decimal::ZERO;
    let mut contact_info = String::new();
    let mut author_avatar = String::new();
    let mut author_username = String::new();
    let mut images: Vec<(String, String, Vec<u8>)> = Vec::new(); // filename, content type, bytes

    while let Some(field) = multipart
        .next_field()
        .await
        .map_err(|err| ApiError::bad_request(format!("malformed multipart body: {err}")))?
    {
        let name = field.name().unwrap_or_default().to_string();
        match name.as_str() {
            "title" => title = read_text(field).await?,
            "content" => content = read_text(field).await?,
            "price_per_unit" => {
                let raw = read_text(field).await?;
                price_per_unit = raw
                    .parse()
                    .map_err(|_| ApiError::bad_request(format!("invalid price_per_unit: {raw}")))?;
            }
            "contact_info" => contact_info = read_text(field).await?,
            "author_avatar" => author_avatar = read_text(field).await?,
            "author_username" => author_username = read_text(field).await?,
            "images" => {
                let filename = field.file_name().unwrap_or("image").to_string();
                let content_type = field
                    .content_type()
                    .unwrap_or("application/octet-stream")
                    .to_string();
                let bytes = field
                    .bytes()
                    .await
                    .map_err(|err| ApiError::bad_request(format!("unreadable image part: {err}")))?;
                images.push((filename, content_type, bytes.to_vec()));
            }
            other => {
                tracing::debug!(field = other, "unknown multipart field ignored");
            }
        }
    }

    let request = CreatePostRequest {
        title,
        content,
        price_per_unit,
        contact_info,
        author_id: identity.user_id.clone(),
        author_avatar,
        author_username,
    };
    request.validate().map_err(ApiError::bad_request)?;

    // Blob uploads happen first so the transaction only ever references
    // objects that exist.
    let mut uploaded: Vec<UploadedImage> = Vec::with_capacity(images.len());
    for (index, (filename, content_type, bytes)) in images.into_iter().enumerate() {
        let key = object_key(&filename, index);
        let object = state
            .blob
            .put(&key, &content_type, bytes)
            .await
            .map_err(ApiError::from)?;
        uploaded.push(UploadedImage {
            object,
            display_order: index as i32,
        });
    }

    let aggregate = NewPostAggregate {
        post: NewPost {
            title: request.title.clone(),
            author_id: request.author_id.clone(),
            author_avatar: request.author_avatar.clone(),
            author_username: request.author_username.clone(),
        },
        detail_content: request.content.clone(),
        price_per_unit: request.price_per_unit,
        contact_info: request.contact_info.clone(),
        images: uploaded
            .iter()
            .map(|image| NewPostImage {
                image_url: image.object.url.clone(),
                object_key: image.object.object_key.clone(),
                display_order: image.display_order,
            })
            .collect(),
    };

    let (post, detail) = match lifecycle::create_post_aggregate(state.db.write(), &aggregate).await
    {
        Ok(created) => created,
        Err(err) => {
            rollback_uploads(&state.blob, &uploaded).await;
            return Err(err.into());
        }
    };

    let event = PendingAuditEvent {
        meta: EventMeta::new(),
        post_id: post.id,
        title: post.title.clone(),
        content: detail.content.clone(),
        author_id: post.author_id.clone(),
        author_avatar: post.author_avatar.clone(),
        author_username: post.author_username.clone(),
        status: post.status,
        view_count: post.view_count,
        official_tag: post.official_tag,
        price_per_unit: detail.price_per_unit,
        contact_info: detail.contact_info.clone(),
        images: uploaded
            .iter()
            .map(|image| PostImageView {
                image_url: image.object.url.clone(),
                object_key: image.object.object_key.clone(),
                display_order: image.display_order,
            })
            .collect(),
    };
    state.producer.spawn_pending_audit(event);

    tracing::info!(post_id = post.id, author = %post.author_id, "post created");
    Ok(ok(PostSummary::from_post(&post)))
}

async fn read_text(field: axum::extract::multipart::Field<'_>) -> Result<String, ApiError> {
    field
        .text()
        .await
        .map_err(|err| ApiError::bad_request(format!("unreadable field: {err}")))
}

fn object_key(filename: &str, index: usize) -> String {
    let extension = std::path::Path::new(filename)
        .extension()
        .and_then(|ext| ext.to_str())
        .unwrap_or("bin");
    format!("posts/{}-{}.{}", Uuid::new_v4(), index, extension)
}

async fn rollback_uploads<B: BlobStore>(blob: &B, uploaded: &[UploadedImage]) {
    for image in uploaded {
        if let Err(err) = blob.delete(&image.object.object_key).await {
            tracing::warn!(
                object_key = %image.object.object_key,
                error = %err,
                "orphaned blob left behind after rollback"
            );
        }
    }
}

/// Owner delete with cascade. Strictly ownership-gated: admin removals go
/// through the admin surface, which audit-logs the acting admin.
pub async fn delete_post<B>(
    State(state): State<AppState<B>>,
    identity: Identity,
    Path(id): Path<i64>,
) -> ApiResult<Json<Envelope<()>>>
where
    B: BlobStore + Clone + Send + Sync + 'static,
{
    let post = post_queries::get_post(state.db.write(), id).await?;
    if post.author_id != identity.user_id {
        return Err(ApiError::forbidden("not the author of this post"));
    }

    lifecycle::delete_post_cascade(state.db.write(), id).await?;
    state
        .producer
        .spawn_deleted(ps_types::events::DeletedEvent::new(id));

    tracing::info!(post_id = id, user = %identity.user_id, "post deleted by owner");
    Ok(ok(()))
}

/// Detail read against the durable store; triggers the same detached view
/// increment as the hot path.
pub async fn post_detail<B>(
    State(state): State<AppState<B>>,
    identity: Identity,
    Path(id): Path<i64>,
) -> ApiResult<Json<Envelope<PostDetailView>>>
where
    B: BlobStore + Clone + Send + Sync + 'static,
{
    if !identity.user_id.is_empty() {
        state.accountant.spawn_increment(id, identity.user_id.clone());
    }
    let view = lifecycle::load_detail_view(state.db.read(), id).await?;
    Ok(ok(view))
}

pub async fn own_posts<B>(
    State(state): State<AppState<B>>,
    identity: Identity,
    Query(query): Query<OwnPostsQuery>,
) -> ApiResult<Json<Envelope<PagedBody>>>
where
    B: BlobStore + Clone + Send + Sync + 'static,
{
    query.validate().map_err(ApiError::bad_request)?;
    let (posts, total) =
        post_queries::own_posts(state.db.read(), &identity.user_id, &query).await?;
    Ok(ok(PagedBody {
        items: posts.iter().map(PostSummary::from_post).collect(),
        total,
    }))
}

pub async fn timeline<B>(
    State(state): State<AppState<B>>,
    _identity: Identity,
    Query(query): Query<TimelineQuery>,
) -> ApiResult<Json<Envelope<TimelineBody>>>
where
    B: BlobStore + Clone + Send + Sync + 'static,
{
    query.validate().map_err(ApiError::bad_request)?;
    let (posts, next_cursor) = post_queries::timeline(state.db.read(), &query).await?;
    Ok(ok(TimelineBody {
        items: posts.iter().map(PostSummary::from_post).collect(),
        next_cursor,
    }))
}

pub async fn posts_by_author<B>(
    State(state): State<AppState<B>>,
    _identity: Identity,
    Query(query): Query<AuthorPostsQuery>,
) -> ApiResult<Json<Envelope<CursorBody>>>
where
    B: BlobStore + Clone + Send + Sync + 'static,
{
    query.validate().map_err(ApiError::bad_request)?;
    let (posts, next_cursor) = post_queries::posts_by_author(state.db.read(), &query).await?;
    Ok(ok(CursorBody {
        items: posts.iter().map(PostSummary::from_post).collect(),
        next_cursor,
    }))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn object_keys_keep_the_extension_and_order() {
        let key = object_key("cover.PNG", 0);
        assert!(key.starts_with("posts/"));
        assert!(key.ends_with("-0.PNG"));
    }

    #[test]
    fn object_keys_default_extension_for_bare_names() {
        let key = object_key("cover", 3);
        assert!(key.ends_with("-3.bin"));
    }
}
