use axum::extract::{Path, Query, State};
use axum::Json;
use serde::{Deserialize, Serialize};

use ps_core::blob::BlobStore;
use ps_core::error::ErrorKind;
use ps_store::lifecycle;
use ps_types::{PostDetailView, PostSummary};

use crate::envelope::{ok, ApiResult, Envelope};
use crate::identity::Identity;
use crate::AppState;

#[derive(Debug, Deserialize)]
pub struct HotListQuery {
    pub cursor: Option<i64>,
    #[serde(default = "default_limit")]
    pub limit: i64,
}

fn default_limit() -> i64 {
    10
}

#[derive(Debug, Serialize)]
pub struct HotListBody {
    pub items: Vec<PostSummary>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub next_cursor: Option<i64>,
}

/// Cursor-paginated hot list. An expired cursor surfaces as its own
/// envelope code so clients can restart from the top instead of silently
/// being handed rank 0.
pub async fn hot_list<B>(
    State(state): State<AppState<B>>,
    _identity: Identity,
    Query(query): Query<HotListQuery>,
) -> ApiResult<Json<Envelope<HotListBody>>>
where
    B: BlobStore + Clone + Send + Sync + 'static,
{
    let page = state.reader.list_by_cursor(query.cursor, query.limit).await?;
    Ok(ok(HotListBody {
        items: page.items,
        next_cursor: page.next_cursor,
    }))
}

/// Hot detail with durable-store fallback on cache miss. The view increment
/// is scheduled by the reader before the lookup, so a miss still counts.
pub async fn hot_detail<B>(
    State(state): State<AppState<B>>,
    identity: Identity,
    Path(id): Path<i64>,
) -> ApiResult<Json<Envelope<PostDetailView>>>
where
    B: BlobStore + Clone + Send + Sync + 'static,
{
    match state.reader.get_detail(id, Some(&identity.user_id)).await {
        Ok(view) => Ok(ok(view)),
        Err(err) if err.kind() == ErrorKind::CacheMiss => {
            tracing::debug!(post_id = id, "hot detail miss; falling back to durable store");
            let view = lifecycle::load_detail_view(state.db.read(), id).await?;
            Ok(ok(view))
        }
        Err(err) => Err(err.into()),
    }
}
