use rust_decimal::Decimal;
use sqlx::{Pool, Postgres, Transaction};

use ps_core::{ServiceError, ServiceResult};
use ps_types::PostDetail;

pub struct NewPostDetail {
    pub post_id: i64,
    pub content: String,
    pub price_per_unit: Decimal,
    pub contact_info: String,
}

pub async fn create_detail(
    tx: &mut Transaction<'_, Postgres>,
    new_detail: &NewPostDetail,
) -> ServiceResult<PostDetail> {
    let detail = sqlx::query_as::<_, PostDetail>(
        "INSERT INTO post_details (post_id, content, price_per_unit, contact_info)          VALUES ($1, $2, $3, $4)          RETURNING *",
    )
    .bind(new_detail.post_id)
    .bind(&new_detail.content)
    .bind(new_detail.price_per_unit)
    .bind(&new_detail.contact_info)
    .fetch_one(&mut **tx)
    .await?;
    Ok(detail)
}

pub async fn get_detail_by_post_id(pool: &Pool<Postgres>, post_id: i64) -> ServiceResult<PostDetail> {
    sqlx::query_as::<_, PostDetail>(
        "SELECT * FROM post_details WHERE post_id = $1 AND deleted_at IS NULL",
    )
    .bind(post_id)
    .fetch_optional(pool)
    .await?
    .ok_or_else(|| ServiceError::not_found(format!("detail for post {post_id}")))
}

/// Same lookup inside a transaction, `None` when absent (delete flows treat a
/// missing detail as already handled).
pub async fn find_detail_by_post_id(
    tx: &mut Transaction<'_, Postgres>,
    post_id: i64,
) -> ServiceResult<Option<PostDetail>> {
    let detail = sqlx::query_as::<_, PostDetail>(
        "SELECT * FROM post_details WHERE post_id = $1 AND deleted_at IS NULL",
    )
    .bind(post_id)
    .fetch_optional(&mut **tx)
    .await?;
    Ok(detail)
}

pub async fn soft_delete_detail(
    tx: &mut Transaction<'_, Postgres>,
    detail_id: i64,
) -> ServiceResult<()> {
    sqlx::query(
        "UPDATE post_details SET deleted_at = NOW(), updated_at = NOW()          WHERE id = $1 AND deleted_at IS NULL",
    )
    .bind(detail_id)
    .execute(&mut **tx)
    .await?;
    Ok(())
}
