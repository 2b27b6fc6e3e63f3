use axum::http::StatusCode;

use crate::db::Db;
use crate::kv::Kv;

/// Liveness: the process is up.
pub async fn healthz() -> StatusCode {
    StatusCode::OK
}

/// Readiness: both backing stores answer.
pub async fn check_ready(db: &Db, kv: &Kv) -> StatusCode {
    if let Err(err) = db.check_ready().await {
        tracing::warn!(error = %err, "readiness: database not ready");
        return StatusCode::SERVICE_UNAVAILABLE;
    }
    if let Err(err) = crate::kv::check_ready(kv).await {
        tracing::warn!(error = %err, "readiness: kv not ready");
        return StatusCode::SERVICE_UNAVAILABLE;
    }
    StatusCode::OK
}
