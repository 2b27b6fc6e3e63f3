use axum::extract::{Path, Query, State};
use axum::http::StatusCode;
use axum::response::IntoResponse;
use axum::routing::{delete, get, put};
use axum::{Json, Router};
use serde::Serialize;

use ps_api::envelope::{ok, ApiError, ApiResult, Envelope};
use ps_api::identity::Identity;
use ps_core::db::Db;
use ps_core::kv::Kv;
use ps_core::{health, metrics};
use ps_mq::EventProducer;
use ps_store::{admin, lifecycle};
use ps_types::dto::{AdminListQuery, UpdateOfficialTagRequest, UpdateStatusRequest};
use ps_types::events::DeletedEvent;
use ps_types::{Post, PostSummary};

pub const SERVICE_NAME: &str = "ps-admin-api";

#[derive(Clone)]
pub struct AppState {
    pub db: Db,
    pub kv: Kv,
    pub producer: EventProducer,
}

pub fn router(state: AppState) -> Router {
    Router::new()
        .route("/healthz", get(health::healthz))
        .route("/readyz", get(readyz))
        .route("/metrics", get(|| async { metrics::metrics_response(SERVICE_NAME) }))
        .route("/admin/posts", get(list_posts))
        .route("/admin/posts/{id}", delete(delete_post))
        .route("/admin/posts/{id}/status", put(update_status))
        .route("/admin/posts/{id}/official-tag", put(update_official_tag))
        .with_state(state)
}

async fn readyz(State(state): State<AppState>) -> impl IntoResponse {
    let status: StatusCode = health::check_ready(&state.db, &state.kv).await;
    status
}

#[derive(Debug, Serialize)]
pub struct AdminListBody {
    pub items: Vec<AdminPostRow>,
    pub total: i64,
}

/// Admin rows keep moderation fields the public summary hides.
#[derive(Debug, Serialize)]
pub struct AdminPostRow {
    #[serde(flatten)]
    pub summary: PostSummary,
    pub audit_reason: Option<String>,
}

impl AdminPostRow {
    fn from_post(post: &Post) -> Self {
        Self {
            summary: PostSummary::from_post(post),
            audit_reason: post.audit_reason.clone(),
        }
    }
}

async fn list_posts(
    State(state): State<AppState>,
    identity: Identity,
    Query(query): Query<AdminListQuery>,
) -> ApiResult<Json<Envelope<AdminListBody>>> {
    identity.require_admin()?;
    query.validate().map_err(ApiError::bad_request)?;

    let (posts, total) = admin::list_by_condition(state.db.read(), &query).await?;
    Ok(ok(AdminListBody {
        items: posts.iter().map(AdminPostRow::from_post).collect(),
        total,
    }))
}

async fn update_status(
    State(state): State<AppState>,
    identity: Identity,
    Path(id): Path<i64>,
    Json(request): Json<UpdateStatusRequest>,
) -> ApiResult<Json<Envelope<()>>> {
    identity.require_admin()?;

    admin::update_status(
        state.db.write(),
        id,
        request.status,
        request.reason.as_deref(),
    )
    .await?;

    tracing::info!(
        post_id = id,
        admin = %identity.user_id,
        status = ?request.status,
        "post status updated"
    );
    Ok(ok(()))
}

async fn update_official_tag(
    State(state): State<AppState>,
    identity: Identity,
    Path(id): Path<i64>,
    Json(request): Json<UpdateOfficialTagRequest>,
) -> ApiResult<Json<Envelope<()>>> {
    identity.require_admin()?;

    admin::update_official_tag(state.db.write(), id, request.official_tag).await?;

    tracing::info!(
        post_id = id,
        admin = %identity.user_id,
        tag = ?request.official_tag,
        "official tag updated"
    );
    Ok(ok(()))
}

/// Same transactional cascade as the owner delete, plus an audit log line
/// carrying the acting admin.
async fn delete_post(
    State(state): State<AppState>,
    identity: Identity,
    Path(id): Path<i64>,
) -> ApiResult<Json<Envelope<()>>> {
    identity.require_admin()?;

    lifecycle::delete_post_cascade(state.db.write(), id).await?;
    state.producer.spawn_deleted(DeletedEvent::new(id));

    tracing::info!(post_id = id, admin = %identity.user_id, "post deleted by admin");
    Ok(ok(()))
}
