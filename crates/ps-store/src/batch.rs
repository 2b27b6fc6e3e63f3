use std::collections::HashMap;

use sqlx::{Pool, Postgres, QueryBuilder};

use ps_core::{ServiceError, ServiceResult};
use ps_types::{Post, PostDetail, PostDetailImage};

/// Batched reads feeding the hot-snapshot refresh. Soft-deleted rows are
/// excluded so a just-deleted post drops out of the snapshot at the next
/// cycle.
pub async fn posts_by_ids(pool: &Pool<Postgres>, ids: &[i64]) -> ServiceResult<Vec<Post>> {
    if ids.is_empty() {
        return Ok(Vec::new());
    }
    let posts = sqlx::query_as::<_, Post>(
        "SELECT * FROM posts WHERE id = ANY($1) AND deleted_at IS NULL",
    )
    .bind(ids)
    .fetch_all(pool)
    .await?;
    Ok(posts)
}

pub async fn details_by_post_ids(
    pool: &Pool<Postgres>,
    post_ids: &[i64],
) -> ServiceResult<Vec<PostDetail>> {
    if post_ids.is_empty() {
        return Ok(Vec::new());
    }
    let details = sqlx::query_as::<_, PostDetail>(
        "SELECT * FROM post_details WHERE post_id = ANY($1) AND deleted_at IS NULL",
    )
    .bind(post_ids)
    .fetch_all(pool)
    .await?;
    Ok(details)
}

pub async fn images_by_detail_ids(
    pool: &Pool<Postgres>,
    detail_ids: &[i64],
) -> ServiceResult<HashMap<i64, Vec<PostDetailImage>>> {
    if detail_ids.is_empty() {
        return Ok(HashMap::new());
    }
    let rows = sqlx::query_as::<_, PostDetailImage>(
        "SELECT * FROM post_detail_images          WHERE post_detail_id = ANY($1) AND deleted_at IS NULL          ORDER BY post_detail_id, display_order, id",
    )
    .bind(detail_ids)
    .fetch_all(pool)
    .await?;

    let mut grouped: HashMap<i64, Vec<PostDetailImage>> = HashMap::new();
    for row in rows {
        grouped.entry(row.post_detail_id).or_default().push(row);
    }
    Ok(grouped)
}

/// Writes the harvested view counters back to the posts table. Work is split
/// into `batch_size` chunks; up to `concurrency` workers run in parallel,
/// each issuing one multi-row `CASE id WHEN …` update per chunk. Ids with no
/// matching row are ignored by the `WHERE id = ANY` clause. Failed chunks do
/// not roll back completed ones; their errors are aggregated into a single
/// `PartialFailure`.
pub async fn batch_update_view_counts(
    pool: &Pool<Postgres>,
    view_counts: &HashMap<i64, i64>,
    batch_size: usize,
    concurrency: usize,
) -> ServiceResult<()> {
    if view_counts.is_empty() {
        tracing::info!("view-count writeback: nothing to update");
        return Ok(());
    }

    let batch_size = batch_size.max(1);
    let concurrency = concurrency.max(1);

    let items: Vec<(i64, i64)> = view_counts.iter().map(|(id, count)| (*id, *count)).collect();
    let batches = chunk_items(&items, batch_size);
    let total = batches.len();
    tracing::info!(
        rows = items.len(),
        batches = total,
        batch_size,
        concurrency,
        "view-count writeback: starting"
    );

    // Round-robin assignment keeps worker load even without a shared queue.
    let mut lanes: Vec<Vec<Vec<(i64, i64)>>> = vec![Vec::new(); concurrency];
    for (index, batch) in batches.into_iter().enumerate() {
        lanes[index % concurrency].push(batch);
    }

    let mut workers = Vec::with_capacity(concurrency);
    for (worker_id, lane) in lanes.into_iter().enumerate() {
        let pool = pool.clone();
        workers.push(tokio::spawn(async move {
            let mut errors = Vec::new();
            for batch in lane {
                if let Err(err) = update_one_batch(&pool, &batch).await {
                    tracing::error!(
                        worker = worker_id,
                        batch_size = batch.len(),
                        error = %err,
                        "view-count writeback: batch failed"
                    );
                    errors.push(format!("worker {worker_id}: {err}"));
                }
            }
            errors
        }));
    }

    let mut failures = Vec::new();
    for worker in workers {
        match worker.await {
            Ok(errors) => failures.extend(errors),
            Err(err) => failures.push(format!("worker panicked: {err}")),
        }
    }

    if failures.is_empty() {
        tracing::info!(batches = total, "view-count writeback: complete");
        Ok(())
    } else {
        Err(ServiceError::PartialFailure {
            failed: failures.len(),
            total,
            detail: failures.join("; "),
        })
    }
}

async fn update_one_batch(pool: &Pool<Postgres>, batch: &[(i64, i64)]) -> ServiceResult<()> {
    let mut builder = QueryBuilder::new("UPDATE posts SET view_count = CASE id ");
    for (id, count) in batch {
        builder.push("WHEN ");
        builder.push_bind(id);
        builder.push(" THEN ");
        builder.push_bind(count);
        builder.push(" ");
    }
    builder.push("ELSE view_count END, updated_at = NOW() WHERE id = ANY(");
    let ids: Vec<i64> = batch.iter().map(|(id, _)| *id).collect();
    builder.push_bind(ids);
    builder.push(")");

    builder.build().execute(pool).await?;
    Ok(())
}

fn chunk_items(items: &[(i64, i64)], batch_size: usize) -> Vec<Vec<(i64, i64)>> {
    items
        .chunks(batch_size)
        .map(|chunk| chunk.to_vec())
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn chunking_splits_with_remainder() {
        let items: Vec<(i64, i64)> = (0..5).map(|n| (n, n * 10)).collect();
        let chunks = chunk_items(&items, 2);
        assert_eq!(chunks.len(), 3);
        assert_eq!(chunks[0].len(), 2);
        assert_eq!(chunks[2], vec![(4, 40)]);
    }

    #[test]
    fn chunking_single_batch_when_size_exceeds_items() {
        let items: Vec<(i64, i64)> = vec![(1, 7), (2, 12), (3, 0)];
        let chunks = chunk_items(&items, 500);
        assert_eq!(chunks.len(), 1);
        assert_eq!(chunks[0].len(), 3);
    }
}
