use sqlx::{Pool, Postgres};

use ps_core::{ServiceError, ServiceResult};
use ps_types::{Post, PostDetail, PostDetailView};

use crate::details::{self, NewPostDetail};
use crate::images::{self, NewPostImage};
use crate::posts::{self, NewPost};

pub struct NewPostAggregate {
    pub post: NewPost,
    pub detail_content: String,
    pub price_per_unit: rust_decimal::Decimal,
    pub contact_info: String,
    pub images: Vec<NewPostImage>,
}

/// Inserts post, detail, and images in one transaction. The caller has
/// already uploaded the image blobs; on error it owns their cleanup.
pub async fn create_post_aggregate(
    pool: &Pool<Postgres>,
    aggregate: &NewPostAggregate,
) -> ServiceResult<(Post, PostDetail)> {
    let mut tx = pool.begin().await?;

    let post = posts::create_post(&mut tx, &aggregate.post).await?;
    let detail = details::create_detail(
        &mut tx,
        &NewPostDetail {
            post_id: post.id,
            content: aggregate.detail_content.clone(),
            price_per_unit: aggregate.price_per_unit,
            contact_info: aggregate.contact_info.clone(),
        },
    )
    .await?;
    images::insert_images(&mut tx, detail.id, &aggregate.images).await?;

    tx.commit().await?;
    Ok((post, detail))
}

/// Soft-deletes a post and everything hanging off it in one transaction.
/// A missing detail is not an error: the post row is the authoritative
/// target, so the operation stays idempotent at the detail level.
pub async fn delete_post_cascade(pool: &Pool<Postgres>, post_id: i64) -> ServiceResult<()> {
    let mut tx = pool.begin().await?;

    if let Some(detail) = details::find_detail_by_post_id(&mut tx, post_id).await? {
        images::soft_delete_images_by_detail_id(&mut tx, detail.id).await?;
        details::soft_delete_detail(&mut tx, detail.id).await?;
    }

    if !posts::soft_delete_post(&mut tx, post_id).await? {
        return Err(ServiceError::not_found(format!("post {post_id}")));
    }

    tx.commit().await?;
    Ok(())
}

/// Durable-store fallback for detail reads; mirrors the shape the cache
/// serves, with the live counter as the view count.
pub async fn load_detail_view(pool: &Pool<Postgres>, post_id: i64) -> ServiceResult<PostDetailView> {
    let post = posts::get_post(pool, post_id).await?;
    let detail = details::get_detail_by_post_id(pool, post_id).await?;
    let images = images::images_by_detail_id(pool, detail.id).await?;
    Ok(PostDetailView::assemble(
        &post,
        &detail,
        &images,
        post.view_count,
    ))
}
