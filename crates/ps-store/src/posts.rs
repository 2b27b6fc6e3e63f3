use sqlx::{Pool, Postgres, QueryBuilder, Transaction};

use ps_core::{ServiceError, ServiceResult};
use ps_types::dto::{AuthorPostsQuery, OwnPostsQuery, TimelineCursor, TimelineQuery};
use ps_types::enums::PostStatus;
use ps_types::Post;

pub struct NewPost {
    pub title: String,
    pub author_id: String,
    pub author_avatar: String,
    pub author_username: String,
}

pub async fn create_post(
    tx: &mut Transaction<'_, Postgres>,
    new_post: &NewPost,
) -> ServiceResult<Post> {
    let post = sqlx::query_as::<_, Post>(
        "INSERT INTO posts (title, author_id, author_avatar, author_username, status, view_count, official_tag)          VALUES ($1, $2, $3, $4, 0, 0, 0)          RETURNING *",
    )
    .bind(&new_post.title)
    .bind(&new_post.author_id)
    .bind(&new_post.author_avatar)
    .bind(&new_post.author_username)
    .fetch_one(&mut **tx)
    .await?;
    Ok(post)
}

/// Live (non-deleted) post by id.
pub async fn get_post(pool: &Pool<Postgres>, id: i64) -> ServiceResult<Post> {
    sqlx::query_as::<_, Post>("SELECT * FROM posts WHERE id = $1 AND deleted_at IS NULL")
        .bind(id)
        .fetch_optional(pool)
        .await?
        .ok_or_else(|| ServiceError::not_found(format!("post {id}")))
}

/// Soft-delete; returns false when the post was already gone.
pub async fn soft_delete_post(tx: &mut Transaction<'_, Postgres>, id: i64) -> ServiceResult<bool> {
    let result = sqlx::query(
        "UPDATE posts SET deleted_at = NOW(), updated_at = NOW()          WHERE id = $1 AND deleted_at IS NULL",
    )
    .bind(id)
    .execute(&mut **tx)
    .await?;
    Ok(result.rows_affected() > 0)
}

/// One page of a user's own posts plus the unpaginated total.
pub async fn own_posts(
    pool: &Pool<Postgres>,
    user_id: &str,
    query: &OwnPostsQuery,
) -> ServiceResult<(Vec<Post>, i64)> {
    let mut count = QueryBuilder::new("SELECT COUNT(*) FROM posts WHERE deleted_at IS NULL AND author_id = ");
    count.push_bind(user_id);
    push_own_filters(&mut count, query);
    let total: i64 = count.build_query_scalar().fetch_one(pool).await?;

    if total == 0 {
        return Ok((Vec::new(), 0));
    }

    let mut select = QueryBuilder::new("SELECT * FROM posts WHERE deleted_at IS NULL AND author_id = ");
    select.push_bind(user_id);
    push_own_filters(&mut select, query);
    select.push(" ORDER BY created_at DESC, id DESC LIMIT ");
    select.push_bind(query.page_size);
    select.push(" OFFSET ");
    select.push_bind(query.offset());
    let posts = select.build_query_as::<Post>().fetch_all(pool).await?;

    Ok((posts, total))
}

fn push_own_filters(builder: &mut QueryBuilder<'_, Postgres>, query: &OwnPostsQuery) {
    if let Some(title) = &query.title {
        builder.push(" AND title LIKE ");
        builder.push_bind(format!("%{}%", escape_like(title)));
    }
    if let Some(status) = query.status {
        builder.push(" AND status = ");
        builder.push_bind(status);
    }
    if let Some(tag) = query.official_tag {
        builder.push(" AND official_tag = ");
        builder.push_bind(tag);
    }
}

/// Global approved feed, keyset-paginated by `(created_at, id)` descending.
pub async fn timeline(
    pool: &Pool<Postgres>,
    query: &TimelineQuery,
) -> ServiceResult<(Vec<Post>, Option<TimelineCursor>)> {
    let mut select = QueryBuilder::new("SELECT * FROM posts WHERE deleted_at IS NULL AND status = ");
    select.push_bind(PostStatus::Approved);
    if let Some(title) = &query.title {
        select.push(" AND title LIKE ");
        select.push_bind(format!("%{}%", escape_like(title)));
    }
    if let Some(tag) = query.official_tag {
        select.push(" AND official_tag = ");
        select.push_bind(tag);
    }
    if let Some(cursor) = query.cursor() {
        select.push(" AND (created_at, id) < (");
        select.push_bind(cursor.created_at);
        select.push(", ");
        select.push_bind(cursor.id);
        select.push(")");
    }
    select.push(" ORDER BY created_at DESC, id DESC LIMIT ");
    select.push_bind(query.limit);

    let posts = select.build_query_as::<Post>().fetch_all(pool).await?;

    let next_cursor = if posts.len() as i64 == query.limit {
        posts.last().map(|post| TimelineCursor {
            created_at: post.created_at,
            id: post.id,
        })
    } else {
        None
    };

    Ok((posts, next_cursor))
}

/// Approved posts of one author, id-cursor paginated, newest first.
pub async fn posts_by_author(
    pool: &Pool<Postgres>,
    query: &AuthorPostsQuery,
) -> ServiceResult<(Vec<Post>, Option<i64>)> {
    let mut select = QueryBuilder::new(
        "SELECT * FROM posts WHERE deleted_at IS NULL AND status = ",
    );
    select.push_bind(PostStatus::Approved);
    select.push(" AND author_id = ");
    select.push_bind(&query.author_id);
    if let Some(cursor) = query.cursor {
        select.push(" AND id < ");
        select.push_bind(cursor);
    }
    select.push(" ORDER BY id DESC LIMIT ");
    select.push_bind(query.limit);

    let posts = select.build_query_as::<Post>().fetch_all(pool).await?;

    let next_cursor = if posts.len() as i64 == query.limit {
        posts.last().map(|post| post.id)
    } else {
        None
    };

    Ok((posts, next_cursor))
}

/// LIKE wildcards in user input are literals, not patterns.
pub(crate) fn escape_like(input: &str) -> String {
    input
        .replace('\\', "\\\\")
        .replace('%', "\\%")
        .replace('_', "\\_")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn escape_like_neutralizes_wildcards() {
        assert_eq!(escape_like("10% off_now"), "10\\% off\\_now");
        assert_eq!(escape_like("back\\slash"), "back\\\\slash");
        assert_eq!(escape_like("plain"), "plain");
    }
}
