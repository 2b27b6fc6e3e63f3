use ps_core::kv::Kv;
use ps_core::{ServiceError, ServiceResult};
use ps_types::{PostDetailView, PostSummary};

use crate::keys;
use crate::views::ViewAccountant;

#[derive(Debug, Clone)]
pub struct HotPage {
    pub items: Vec<PostSummary>,
    pub next_cursor: Option<i64>,
}

/// Read side of the hot snapshot. Reads never synchronize with snapshot
/// publication; a cursor may legitimately span two publications.
#[derive(Clone)]
pub struct HotReader {
    kv: Kv,
    accountant: ViewAccountant,
}

impl HotReader {
    pub fn new(kv: Kv, accountant: ViewAccountant) -> Self {
        Self { kv, accountant }
    }

    /// One page of the hot list. `last_id = None` starts at rank 0; a
    /// `last_id` that has left the hot ranking yields `CursorExpired` rather
    /// than silently restarting. Ids whose summaries are missing from the
    /// hash are skipped as soft inconsistency.
    pub async fn list_by_cursor(
        &self,
        last_id: Option<i64>,
        limit: i64,
    ) -> ServiceResult<HotPage> {
        if limit < 1 {
            return Err(ServiceError::invalid("limit must be >= 1"));
        }
        let mut conn = self.kv.clone();

        let start = match last_id {
            None => 0,
            Some(last_id) => {
                let rank: Option<i64> = redis::cmd("ZREVRANK")
                    .arg(keys::HOT_POST_RANK_KEY)
                    .arg(last_id)
                    .query_async(&mut conn)
                    .await?;
                match rank {
                    Some(rank) => rank + 1,
                    None => return Err(ServiceError::CursorExpired(last_id)),
                }
            }
        };

        let members: Vec<String> = redis::cmd("ZREVRANGE")
            .arg(keys::HOT_POST_RANK_KEY)
            .arg(start)
            .arg(start + limit - 1)
            .query_async(&mut conn)
            .await?;

        let mut ids = Vec::with_capacity(members.len());
        for member in &members {
            match member.parse::<i64>() {
                Ok(id) => ids.push(id),
                Err(err) => {
                    tracing::warn!(member, error = %err, "non-numeric member in hot ranking skipped");
                }
            }
        }

        if ids.is_empty() {
            return Ok(HotPage {
                items: Vec::new(),
                next_cursor: None,
            });
        }

        let fields: Vec<String> = ids.iter().map(|id| id.to_string()).collect();
        let values: Vec<Option<String>> = redis::cmd("HMGET")
            .arg(keys::POSTS_HASH_KEY)
            .arg(&fields)
            .query_async(&mut conn)
            .await?;

        let mut items = Vec::with_capacity(ids.len());
        for (id, value) in ids.iter().zip(values) {
            let Some(json) = value else {
                tracing::debug!(post_id = id, "summary missing from hash; skipped");
                continue;
            };
            match serde_json::from_str::<PostSummary>(&json) {
                Ok(summary) => items.push(summary),
                Err(err) => {
                    tracing::warn!(post_id = id, error = %err, "corrupt summary in hash; skipped");
                }
            }
        }

        // The cursor comes from the ranking, not from the (possibly shorter)
        // item list, so pagination never skips ids with missing summaries.
        let next_cursor = next_cursor(&ids, limit);
        Ok(HotPage { items, next_cursor })
    }

    /// Cached detail read. Missing key is a `CacheMiss` the caller may
    /// resolve against the durable store; an unparseable payload is
    /// `CacheCorrupt` and the key is dropped best-effort. A non-empty viewer
    /// schedules a detached, deadline-bounded view increment.
    pub async fn get_detail(
        &self,
        post_id: i64,
        viewer_id: Option<&str>,
    ) -> ServiceResult<PostDetailView> {
        if let Some(viewer_id) = viewer_id.filter(|viewer| !viewer.is_empty()) {
            self.accountant.spawn_increment(post_id, viewer_id.to_string());
        }

        let key = keys::detail_key(post_id);
        let mut conn = self.kv.clone();
        let value: Option<String> = redis::cmd("GET")
            .arg(&key)
            .query_async(&mut conn)
            .await?;

        let Some(json) = value else {
            return Err(ServiceError::CacheMiss(key));
        };

        match serde_json::from_str::<PostDetailView>(&json) {
            Ok(view) => Ok(view),
            Err(err) => {
                tracing::error!(key, error = %err, "corrupt detail payload");
                let dropped: redis::RedisResult<()> =
                    redis::cmd("DEL").arg(&key).query_async(&mut conn).await;
                if let Err(del_err) = dropped {
                    tracing::warn!(key, error = %del_err, "corrupt detail cleanup failed");
                }
                Err(ServiceError::CacheCorrupt {
                    key,
                    message: err.to_string(),
                })
            }
        }
    }
}

/// Next cursor is the last ranking id of a full page; a short page ends the
/// sequence.
fn next_cursor(ids: &[i64], limit: i64) -> Option<i64> {
    if ids.len() as i64 == limit {
        ids.last().copied()
    } else {
        None
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn full_page_carries_last_ranking_id() {
        assert_eq!(next_cursor(&[10, 9], 2), Some(9));
        assert_eq!(next_cursor(&[8, 7], 2), Some(7));
    }

    #[test]
    fn short_or_empty_page_ends_the_sequence() {
        assert_eq!(next_cursor(&[6], 2), None);
        assert_eq!(next_cursor(&[], 2), None);
    }
}
