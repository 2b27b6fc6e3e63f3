use std::collections::HashMap;
use std::time::Duration;

use redis::Script;

use ps_core::config::DedupConfig;
use ps_core::kv::Kv;
use ps_core::{metrics, ServiceResult};

use crate::keys;

/// Counter increment and ranking update in one atomic block: concurrent
/// increments for the same post can never leave the ranking score behind the
/// counter.
const COUNT_AND_RANK: &str = r#"
local count = redis.call("INCR", KEYS[1])
redis.call("ZADD", KEYS[2], count, ARGV[1])
return count
"#;

/// Per-user deduplicated view accounting against the KV store.
#[derive(Clone)]
pub struct ViewAccountant {
    kv: Kv,
    dedup: DedupConfig,
    scan_batch_size: u64,
}

impl ViewAccountant {
    pub fn new(kv: Kv, dedup: DedupConfig, scan_batch_size: u64) -> Self {
        Self {
            kv,
            dedup,
            scan_batch_size,
        }
    }

    /// Counts one view unless `user_id` probably saw the post inside the
    /// dedup window. Returns whether the counter actually moved. Filter
    /// bookkeeping failures after the membership check are logged and
    /// swallowed: they only weaken dedup, never lose a view.
    pub async fn increment(&self, post_id: i64, user_id: &str) -> ServiceResult<bool> {
        let bloom_key = keys::bloom_key(post_id);
        let mut conn = self.kv.clone();

        let filter_exists: i64 = redis::cmd("EXISTS")
            .arg(&bloom_key)
            .query_async(&mut conn)
            .await?;
        if filter_exists == 0 {
            // Racing creators both issue BF.RESERVE; the loser's "item
            // exists" error is the no-op the protocol expects.
            let reserved: redis::RedisResult<()> = redis::cmd("BF.RESERVE")
                .arg(&bloom_key)
                .arg(self.dedup.error_rate)
                .arg(self.dedup.capacity)
                .query_async(&mut conn)
                .await;
            if let Err(err) = reserved {
                if !err.to_string().contains("exists") {
                    return Err(err.into());
                }
            }
        }

        let seen: bool = redis::cmd("BF.EXISTS")
            .arg(&bloom_key)
            .arg(user_id)
            .query_async(&mut conn)
            .await?;
        if seen {
            metrics::inc_view_deduped();
            tracing::debug!(post_id, user_id, "view already counted inside dedup window");
            return Ok(false);
        }

        let added: redis::RedisResult<bool> = redis::cmd("BF.ADD")
            .arg(&bloom_key)
            .arg(user_id)
            .query_async(&mut conn)
            .await;
        if let Err(err) = added {
            tracing::warn!(post_id, user_id, error = %err, "dedup filter add failed");
        }
        // Sliding window: every write refreshes the TTL.
        let expired: redis::RedisResult<bool> = redis::cmd("EXPIRE")
            .arg(&bloom_key)
            .arg(self.dedup.ttl.as_secs())
            .query_async(&mut conn)
            .await;
        if let Err(err) = expired {
            tracing::warn!(post_id, error = %err, "dedup filter expire failed");
        }

        let count: i64 = Script::new(COUNT_AND_RANK)
            .key(keys::view_count_key(post_id))
            .key(keys::POST_RANK_KEY)
            .arg(post_id)
            .invoke_async(&mut conn)
            .await?;

        metrics::inc_view_counted();
        tracing::debug!(post_id, count, "view counted");
        Ok(true)
    }

    /// Detached increment bounded by a short deadline, for read paths that
    /// must never block or fail on accounting.
    pub fn spawn_increment(&self, post_id: i64, user_id: String) {
        let accountant = self.clone();
        tokio::spawn(async move {
            let deadline = Duration::from_secs(2);
            match tokio::time::timeout(deadline, accountant.increment(post_id, &user_id)).await {
                Ok(Ok(_)) => {}
                Ok(Err(err)) => {
                    tracing::warn!(post_id, user_id, error = %err, "detached view increment failed");
                }
                Err(_) => {
                    tracing::warn!(post_id, user_id, "detached view increment timed out");
                }
            }
        });
    }

    /// Harvests every counter via cursor SCAN + MGET. Unparseable keys are
    /// skipped, unparseable values count as zero; a failed SCAN or MGET
    /// aborts the whole read so the writeback never works from a partial
    /// harvest.
    pub async fn all_view_counts(&self) -> ServiceResult<HashMap<i64, i64>> {
        let mut conn = self.kv.clone();
        let mut counts = HashMap::new();
        let mut cursor: u64 = 0;
        let pattern = format!("{}*", keys::POST_VIEW_COUNT_PREFIX);

        loop {
            let (next_cursor, batch): (u64, Vec<String>) = redis::cmd("SCAN")
                .arg(cursor)
                .arg("MATCH")
                .arg(&pattern)
                .arg("COUNT")
                .arg(self.scan_batch_size)
                .query_async(&mut conn)
                .await?;

            if !batch.is_empty() {
                let values: Vec<Option<String>> = redis::cmd("MGET")
                    .arg(&batch)
                    .query_async(&mut conn)
                    .await?;

                for (key, value) in batch.iter().zip(values) {
                    let Some(post_id) = keys::parse_view_count_key(key) else {
                        tracing::warn!(key, "unparseable view-count key skipped");
                        continue;
                    };
                    let count = match value.as_deref() {
                        Some(raw) => match raw.parse::<i64>() {
                            Ok(count) => count,
                            Err(err) => {
                                tracing::warn!(key, raw, error = %err, "non-integer view count treated as zero");
                                0
                            }
                        },
                        None => continue,
                    };
                    counts.insert(post_id, count);
                }
            }

            cursor = next_cursor;
            if cursor == 0 {
                break;
            }
        }

        tracing::info!(posts = counts.len(), "view counters harvested");
        Ok(counts)
    }
}
