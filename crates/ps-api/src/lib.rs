use axum::extract::State;
use axum::http::StatusCode;
use axum::response::IntoResponse;
use axum::routing::{get, post};
use axum::Router;

use ps_cache::{HotReader, ViewAccountant};
use ps_core::blob::BlobStore;
use ps_core::db::Db;
use ps_core::kv::Kv;
use ps_core::{health, metrics};
use ps_mq::EventProducer;

pub mod envelope;
pub mod hot;
pub mod identity;
pub mod posts;

pub const SERVICE_NAME: &str = "ps-api";

#[derive(Clone)]
pub struct AppState<B: BlobStore + Clone> {
    pub db: Db,
    pub kv: Kv,
    pub reader: HotReader,
    pub accountant: ViewAccountant,
    pub producer: EventProducer,
    pub blob: B,
}

pub fn router<B>(state: AppState<B>) -> Router
where
    B: BlobStore + Clone + Send + Sync + 'static,
{
    Router::new()
        .route("/healthz", get(health::healthz))
        .route("/readyz", get(readyz::<B>))
        .route("/metrics", get(|| async { metrics::metrics_response(SERVICE_NAME) }))
        .route("/posts", post(posts::create_post::<B>))
        .route("/posts/mine", get(posts::own_posts::<B>))
        .route("/posts/timeline", get(posts::timeline::<B>))
        .route("/posts/by-author", get(posts::posts_by_author::<B>))
        .route(
            "/posts/{id}",
            get(posts::post_detail::<B>).delete(posts::delete_post::<B>),
        )
        .route("/hot-posts", get(hot::hot_list::<B>))
        .route("/hot-posts/{id}", get(hot::hot_detail::<B>))
        .with_state(state)
}

async fn readyz<B>(State(state): State<AppState<B>>) -> impl IntoResponse
where
    B: BlobStore + Clone + Send + Sync + 'static,
{
    let status: StatusCode = health::check_ready(&state.db, &state.kv).await;
    status
}
