use sqlx::{Pool, Postgres, QueryBuilder};

use ps_core::{ServiceError, ServiceResult};
use ps_types::dto::{AdminListQuery, AdminOrderBy};
use ps_types::enums::{OfficialTag, PostStatus};
use ps_types::Post;

use crate::posts::escape_like;

/// Conditional admin listing. An exact id short-circuits every other filter;
/// `total` reflects the filters without pagination.
pub async fn list_by_condition(
    pool: &Pool<Postgres>,
    query: &AdminListQuery,
) -> ServiceResult<(Vec<Post>, i64)> {
    if let Some(id) = query.id {
        let post = sqlx::query_as::<_, Post>(
            "SELECT * FROM posts WHERE id = $1 AND deleted_at IS NULL",
        )
        .bind(id)
        .fetch_optional(pool)
        .await?;
        return Ok(match post {
            Some(post) => (vec![post], 1),
            None => (Vec::new(), 0),
        });
    }

    let mut count = QueryBuilder::new("SELECT COUNT(*) FROM posts WHERE deleted_at IS NULL");
    push_filters(&mut count, query);
    let total: i64 = count.build_query_scalar().fetch_one(pool).await?;

    if total == 0 {
        return Ok((Vec::new(), 0));
    }

    let mut select = QueryBuilder::new("SELECT * FROM posts WHERE deleted_at IS NULL");
    push_filters(&mut select, query);
    select.push(match (query.order_by, query.order_desc) {
        (AdminOrderBy::CreatedAt, false) => " ORDER BY created_at ASC",
        (AdminOrderBy::CreatedAt, true) => " ORDER BY created_at DESC",
        (AdminOrderBy::UpdatedAt, false) => " ORDER BY updated_at ASC",
        (AdminOrderBy::UpdatedAt, true) => " ORDER BY updated_at DESC",
    });
    select.push(" LIMIT ");
    select.push_bind(query.page_size);
    select.push(" OFFSET ");
    select.push_bind(query.offset());

    let posts = select.build_query_as::<Post>().fetch_all(pool).await?;
    Ok((posts, total))
}

fn push_filters(builder: &mut QueryBuilder<'_, Postgres>, query: &AdminListQuery) {
    if let Some(prefix) = &query.title_prefix {
        builder.push(" AND title LIKE ");
        builder.push_bind(format!("{}%", escape_like(prefix)));
    }
    if let Some(prefix) = &query.author_name_prefix {
        builder.push(" AND author_username LIKE ");
        builder.push_bind(format!("{}%", escape_like(prefix)));
    }
    if let Some(status) = query.status {
        builder.push(" AND status = ");
        builder.push_bind(status);
    }
    if let Some(tag) = query.official_tag {
        builder.push(" AND official_tag = ");
        builder.push_bind(tag);
    }
    if let Some(min) = query.view_count_min {
        builder.push(" AND view_count >= ");
        builder.push_bind(min);
    }
    if let Some(max) = query.view_count_max {
        builder.push(" AND view_count <= ");
        builder.push_bind(max);
    }
}

/// Status transition with the audit-reason rule: a reason is stored only for
/// rejections and only when non-empty; every other transition clears it.
pub async fn update_status(
    pool: &Pool<Postgres>,
    post_id: i64,
    status: PostStatus,
    reason: Option<&str>,
) -> ServiceResult<()> {
    let audit_reason = effective_audit_reason(status, reason);

    let result = sqlx::query(
        "UPDATE posts SET status = $2, audit_reason = $3, updated_at = NOW()          WHERE id = $1 AND deleted_at IS NULL",
    )
    .bind(post_id)
    .bind(status)
    .bind(audit_reason)
    .execute(pool)
    .await?;

    if result.rows_affected() == 0 {
        return Err(ServiceError::not_found(format!("post {post_id}")));
    }
    Ok(())
}

/// Non-empty reasons are stored for rejections only; approvals and pending
/// transitions always clear the column.
fn effective_audit_reason(status: PostStatus, reason: Option<&str>) -> Option<&str> {
    match (status, reason) {
        (PostStatus::Rejected, Some(reason)) if !reason.trim().is_empty() => Some(reason.trim()),
        _ => None,
    }
}

pub async fn update_official_tag(
    pool: &Pool<Postgres>,
    post_id: i64,
    tag: OfficialTag,
) -> ServiceResult<()> {
    let result = sqlx::query(
        "UPDATE posts SET official_tag = $2, updated_at = NOW()          WHERE id = $1 AND deleted_at IS NULL",
    )
    .bind(post_id)
    .bind(tag)
    .execute(pool)
    .await?;

    if result.rows_affected() == 0 {
        return Err(ServiceError::not_found(format!("post {post_id}")));
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn reason_is_kept_only_for_nonempty_rejections() {
        assert_eq!(
            effective_audit_reason(PostStatus::Rejected, Some(" spam ")),
            Some("spam")
        );
        assert_eq!(effective_audit_reason(PostStatus::Rejected, Some("  ")), None);
        assert_eq!(effective_audit_reason(PostStatus::Rejected, None), None);
        assert_eq!(
            effective_audit_reason(PostStatus::Approved, Some("spam")),
            None
        );
        assert_eq!(
            effective_audit_reason(PostStatus::Pending, Some("spam")),
            None
        );
    }
}
