use std::collections::{HashMap, HashSet};
use std::time::{SystemTime, UNIX_EPOCH};

use redis::Script;

use ps_core::db::Db;
use ps_core::kv::Kv;
use ps_core::{ServiceError, ServiceResult};
use ps_store::batch;
use ps_types::{PostDetailView, PostSummary};

use crate::keys;

/// Atomic copy of the top-N of the global ranking over the hot ranking.
/// ZREVRANGE returns member,score pairs; ZADD wants score,member, so the
/// argument list is rebuilt in place.
const SNAPSHOT_RANKING: &str = r#"
local items = redis.call("ZREVRANGE", KEYS[1], 0, tonumber(ARGV[1]) - 1, "WITHSCORES")
redis.call("DEL", KEYS[2])
if #items > 0 then
    local args = { KEYS[2] }
    for i = 1, #items, 2 do
        table.insert(args, items[i + 1])
        table.insert(args, items[i])
    end
    redis.call("ZADD", unpack(args))
end
return #items / 2
"#;

/// Periodic task that materializes the hot snapshot: ranking copy, summary
/// hash refresh, differential detail refresh. Each step is failure-isolated;
/// a failed ranking copy aborts the cycle so later steps never publish from
/// a half-written source.
pub struct HotSnapshotBuilder {
    kv: Kv,
    db: Db,
    hot_list_size: i64,
    scan_batch_size: u64,
}

impl HotSnapshotBuilder {
    pub fn new(kv: Kv, db: Db, hot_list_size: i64, scan_batch_size: u64) -> Self {
        Self {
            kv,
            db,
            hot_list_size,
            scan_batch_size,
        }
    }

    pub async fn run(&self) -> ServiceResult<()> {
        self.snapshot_ranking().await?;

        let entries = self.hot_entries().await?;
        if entries.is_empty() {
            tracing::info!("hot ranking empty; clearing summary hash and detail cache");
            self.clear_summaries().await?;
            self.clear_details().await?;
            ps_core::metrics::inc_snapshot_cycle();
            return Ok(());
        }

        let mut step_errors = Vec::new();
        if let Err(err) = self.refresh_summaries(&entries).await {
            tracing::error!(error = %err, "summary hash refresh failed; live hash retained");
            step_errors.push(format!("summaries: {err}"));
        }
        if let Err(err) = self.refresh_details(&entries).await {
            tracing::error!(error = %err, "detail cache refresh failed");
            step_errors.push(format!("details: {err}"));
        }

        if step_errors.is_empty() {
            ps_core::metrics::inc_snapshot_cycle();
            tracing::info!(hot_posts = entries.len(), "hot snapshot cycle complete");
            Ok(())
        } else {
            Err(ServiceError::PartialFailure {
                failed: step_errors.len(),
                total: 2,
                detail: step_errors.join("; "),
            })
        }
    }

    /// Step 1.
    pub async fn snapshot_ranking(&self) -> ServiceResult<i64> {
        let mut conn = self.kv.clone();
        let copied: i64 = Script::new(SNAPSHOT_RANKING)
            .key(keys::POST_RANK_KEY)
            .key(keys::HOT_POST_RANK_KEY)
            .arg(self.hot_list_size)
            .invoke_async(&mut conn)
            .await?;
        tracing::info!(copied, "hot ranking snapshot written");
        Ok(copied)
    }

    /// Hot ids with their snapshot scores, rank order.
    async fn hot_entries(&self) -> ServiceResult<Vec<(i64, i64)>> {
        let mut conn = self.kv.clone();
        let raw: Vec<(String, f64)> = redis::cmd("ZREVRANGE")
            .arg(keys::HOT_POST_RANK_KEY)
            .arg(0)
            .arg(self.hot_list_size - 1)
            .arg("WITHSCORES")
            .query_async(&mut conn)
            .await?;

        let mut entries = Vec::with_capacity(raw.len());
        for (member, score) in raw {
            match member.parse::<i64>() {
                Ok(id) => entries.push((id, score as i64)),
                Err(err) => {
                    tracing::warn!(member, error = %err, "non-numeric member in hot ranking skipped");
                }
            }
        }
        Ok(entries)
    }

    /// Step 2: rebuild the summary hash under a temp key and swap it in with
    /// RENAME so readers see the old map or the new map, never a mix.
    pub async fn refresh_summaries(&self, entries: &[(i64, i64)]) -> ServiceResult<()> {
        let ids: Vec<i64> = entries.iter().map(|(id, _)| *id).collect();
        let scores: HashMap<i64, i64> = entries.iter().copied().collect();

        let posts = batch::posts_by_ids(self.db.read(), &ids).await?;
        let by_id: HashMap<i64, _> = posts.into_iter().map(|post| (post.id, post)).collect();

        let mut fields = Vec::with_capacity(ids.len());
        for id in &ids {
            let Some(post) = by_id.get(id) else {
                tracing::warn!(post_id = id, "hot post missing from durable store; skipped");
                continue;
            };
            let summary = PostSummary::with_view_count(post, scores[id]);
            match serde_json::to_string(&summary) {
                Ok(json) => fields.push((id.to_string(), json)),
                Err(err) => {
                    tracing::warn!(post_id = id, error = %err, "summary serialization failed; skipped");
                }
            }
        }

        if fields.is_empty() {
            return Err(ServiceError::CacheCorrupt {
                key: keys::POSTS_HASH_KEY.into(),
                message: "no publishable summaries for the current hot ranking".into(),
            });
        }

        let temp_key = keys::summary_temp_key(now_nanos());
        let mut conn = self.kv.clone();

        let mut pipe = redis::pipe();
        pipe.cmd("DEL").arg(&temp_key).ignore();
        pipe.cmd("HSET").arg(&temp_key);
        for (field, value) in &fields {
            pipe.arg(field).arg(value);
        }
        pipe.ignore();
        let staged_write: redis::RedisResult<()> = pipe.query_async(&mut conn).await;
        if let Err(err) = staged_write {
            self.discard_keys(&[temp_key]).await;
            return Err(err.into());
        }

        let swapped: redis::RedisResult<()> = redis::cmd("RENAME")
            .arg(&temp_key)
            .arg(keys::POSTS_HASH_KEY)
            .query_async(&mut conn)
            .await;
        if let Err(err) = swapped {
            self.discard_keys(&[temp_key]).await;
            return Err(err.into());
        }

        tracing::info!(published = fields.len(), "summary hash published");
        Ok(())
    }

    /// Step 3: differential detail refresh. Every hot id is re-aggregated
    /// and staged under a temp key; ids that left the ranking are deleted;
    /// staged keys are activated with a pipelined RENAME batch. A RENAME
    /// failure is a hard error (readers may see a mix until the next cycle).
    pub async fn refresh_details(&self, entries: &[(i64, i64)]) -> ServiceResult<()> {
        let hot_ids: HashSet<i64> = entries.iter().map(|(id, _)| *id).collect();
        let scores: HashMap<i64, i64> = entries.iter().copied().collect();

        let cached = self.cached_detail_keys().await?;
        let removed: Vec<String> = stale_detail_keys(&hot_ids, &cached);

        let ids: Vec<i64> = entries.iter().map(|(id, _)| *id).collect();
        let posts = batch::posts_by_ids(self.db.read(), &ids).await?;
        let details = batch::details_by_post_ids(self.db.read(), &ids).await?;
        let posts_by_id: HashMap<i64, _> = posts.into_iter().map(|post| (post.id, post)).collect();
        let details_by_post: HashMap<i64, _> = details
            .into_iter()
            .map(|detail| (detail.post_id, detail))
            .collect();
        let detail_ids: Vec<i64> = details_by_post.values().map(|detail| detail.id).collect();
        let images_by_detail = batch::images_by_detail_ids(self.db.read(), &detail_ids).await?;

        let mut staged: Vec<(String, String)> = Vec::new(); // temp key -> final key
        let mut conn = self.kv.clone();
        let mut pipe = redis::pipe();
        for id in &ids {
            let (Some(post), Some(detail)) = (posts_by_id.get(id), details_by_post.get(id)) else {
                tracing::warn!(post_id = id, "incomplete aggregate for hot post; skipped");
                continue;
            };
            let images = images_by_detail
                .get(&detail.id)
                .map(Vec::as_slice)
                .unwrap_or(&[]);
            let view = PostDetailView::assemble(post, detail, images, scores[id]);
            let json = match serde_json::to_string(&view) {
                Ok(json) => json,
                Err(err) => {
                    tracing::warn!(post_id = id, error = %err, "detail serialization failed; skipped");
                    continue;
                }
            };
            let temp_key = keys::detail_temp_key(*id);
            pipe.cmd("SET").arg(&temp_key).arg(json).ignore();
            staged.push((temp_key, keys::detail_key(*id)));
        }

        if !staged.is_empty() {
            let staged_write: redis::RedisResult<()> = pipe.query_async(&mut conn).await;
            if let Err(err) = staged_write {
                let temps: Vec<String> = staged.into_iter().map(|(temp, _)| temp).collect();
                self.discard_keys(&temps).await;
                return Err(err.into());
            }
        }

        if !removed.is_empty() {
            let dropped: redis::RedisResult<()> = redis::cmd("DEL")
                .arg(&removed)
                .query_async(&mut conn)
                .await;
            if let Err(err) = dropped {
                tracing::warn!(count = removed.len(), error = %err, "stale detail delete failed; keys may linger");
            } else {
                tracing::info!(count = removed.len(), "stale detail keys deleted");
            }
        }

        if !staged.is_empty() {
            let mut rename_pipe = redis::pipe();
            for (temp, final_key) in &staged {
                rename_pipe.cmd("RENAME").arg(temp).arg(final_key).ignore();
            }
            let activated: redis::RedisResult<()> = rename_pipe.query_async(&mut conn).await;
            if let Err(err) = activated {
                let temps: Vec<String> = staged.into_iter().map(|(temp, _)| temp).collect();
                self.discard_keys(&temps).await;
                return Err(err.into());
            }
            tracing::info!(activated = staged.len(), "detail cache refreshed");
        }

        Ok(())
    }

    /// Final (non-temp) detail keys currently cached, by post id.
    async fn cached_detail_keys(&self) -> ServiceResult<HashMap<i64, String>> {
        let mut conn = self.kv.clone();
        let mut cached = HashMap::new();
        let mut cursor: u64 = 0;
        let pattern = format!("{}*", keys::POST_DETAIL_PREFIX);

        loop {
            let (next_cursor, batch): (u64, Vec<String>) = redis::cmd("SCAN")
                .arg(cursor)
                .arg("MATCH")
                .arg(&pattern)
                .arg("COUNT")
                .arg(self.scan_batch_size)
                .query_async(&mut conn)
                .await?;
            for key in batch {
                if let Some(id) = keys::parse_detail_key(&key) {
                    cached.insert(id, key);
                }
            }
            cursor = next_cursor;
            if cursor == 0 {
                break;
            }
        }
        Ok(cached)
    }

    async fn clear_summaries(&self) -> ServiceResult<()> {
        let mut conn = self.kv.clone();
        let _: () = redis::cmd("DEL")
            .arg(keys::POSTS_HASH_KEY)
            .query_async(&mut conn)
            .await?;
        Ok(())
    }

    async fn clear_details(&self) -> ServiceResult<()> {
        let cached = self.cached_detail_keys().await?;
        if cached.is_empty() {
            return Ok(());
        }
        let stale: Vec<String> = cached.into_values().collect();
        let mut conn = self.kv.clone();
        let _: () = redis::cmd("DEL")
            .arg(&stale)
            .query_async(&mut conn)
            .await?;
        tracing::info!(count = stale.len(), "detail cache cleared");
        Ok(())
    }

    async fn discard_keys(&self, keys: &[String]) {
        if keys.is_empty() {
            return;
        }
        let mut conn = self.kv.clone();
        let cleaned: redis::RedisResult<()> = redis::cmd("DEL")
            .arg(keys)
            .query_async(&mut conn)
            .await;
        if let Err(err) = cleaned {
            tracing::warn!(count = keys.len(), error = %err, "temp key cleanup failed");
        }
    }
}

fn now_nanos() -> u128 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|elapsed| elapsed.as_nanos())
        .unwrap_or_default()
}

/// Cached final keys whose post left the hot ranking.
fn stale_detail_keys(hot_ids: &HashSet<i64>, cached: &HashMap<i64, String>) -> Vec<String> {
    cached
        .iter()
        .filter(|(id, _)| !hot_ids.contains(id))
        .map(|(_, key)| key.clone())
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn stale_keys_are_cached_minus_hot() {
        let hot: HashSet<i64> = [1, 2].into_iter().collect();
        let cached: HashMap<i64, String> = [
            (1, "post_detail:1".to_string()),
            (3, "post_detail:3".to_string()),
        ]
        .into_iter()
        .collect();

        let removed = stale_detail_keys(&hot, &cached);
        assert_eq!(removed, vec!["post_detail:3".to_string()]);
    }

    #[test]
    fn no_stale_keys_when_cache_is_subset_of_hot() {
        let hot: HashSet<i64> = [1, 2, 3].into_iter().collect();
        let cached: HashMap<i64, String> = [(2, "post_detail:2".to_string())].into_iter().collect();
        assert!(stale_detail_keys(&hot, &cached).is_empty());
    }
}
