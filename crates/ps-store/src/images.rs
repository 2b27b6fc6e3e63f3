use sqlx::{Pool, Postgres, QueryBuilder, Transaction};

use ps_core::ServiceResult;
use ps_types::PostDetailImage;

pub struct NewPostImage {
    pub image_url: String,
    pub object_key: String,
    pub display_order: i32,
}

pub async fn insert_images(
    tx: &mut Transaction<'_, Postgres>,
    detail_id: i64,
    images: &[NewPostImage],
) -> ServiceResult<()> {
    if images.is_empty() {
        return Ok(());
    }
    let mut builder = QueryBuilder::new(
        "INSERT INTO post_detail_images (post_detail_id, image_url, object_key, display_order) ",
    );
    builder.push_values(images, |mut row, image| {
        row.push_bind(detail_id)
            .push_bind(&image.image_url)
            .push_bind(&image.object_key)
            .push_bind(image.display_order);
    });
    builder.build().execute(&mut **tx).await?;
    Ok(())
}

pub async fn images_by_detail_id(
    pool: &Pool<Postgres>,
    detail_id: i64,
) -> ServiceResult<Vec<PostDetailImage>> {
    let images = sqlx::query_as::<_, PostDetailImage>(
        "SELECT * FROM post_detail_images          WHERE post_detail_id = $1 AND deleted_at IS NULL          ORDER BY display_order, id",
    )
    .bind(detail_id)
    .fetch_all(pool)
    .await?;
    Ok(images)
}

pub async fn soft_delete_images_by_detail_id(
    tx: &mut Transaction<'_, Postgres>,
    detail_id: i64,
) -> ServiceResult<()> {
    sqlx::query(
        "UPDATE post_detail_images SET deleted_at = NOW(), updated_at = NOW()          WHERE post_detail_id = $1 AND deleted_at IS NULL",
    )
    .bind(detail_id)
    .execute(&mut **tx)
    .await?;
    Ok(())
}
