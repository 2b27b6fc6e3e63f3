use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::Json;
use serde::Serialize;

use ps_core::error::ErrorKind;
use ps_core::ServiceError;

/// Uniform response body: `code` 0 on success, a stable non-zero code per
/// error family otherwise.
#[derive(Debug, Serialize)]
pub struct Envelope<T> {
    pub code: i32,
    pub message: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub data: Option<T>,
}

pub fn ok<T: Serialize>(data: T) -> Json<Envelope<T>> {
    Json(Envelope {
        code: 0,
        message: "ok".into(),
        data: Some(data),
    })
}

#[derive(Debug)]
pub struct ApiError {
    status: StatusCode,
    code: i32,
    message: String,
}

pub type ApiResult<T> = Result<T, ApiError>;

impl ApiError {
    pub fn new(status: StatusCode, code: i32, message: impl Into<String>) -> Self {
        Self {
            status,
            code,
            message: message.into(),
        }
    }

    pub fn unauthorized(message: impl Into<String>) -> Self {
        Self::new(StatusCode::UNAUTHORIZED, 40101, message)
    }

    pub fn forbidden(message: impl Into<String>) -> Self {
        Self::new(StatusCode::FORBIDDEN, 40301, message)
    }

    pub fn bad_request(message: impl Into<String>) -> Self {
        Self::new(StatusCode::BAD_REQUEST, 40001, message)
    }

    pub fn code(&self) -> i32 {
        self.code
    }
}

impl From<ServiceError> for ApiError {
    fn from(err: ServiceError) -> Self {
        match err.kind() {
            ErrorKind::InvalidInput => Self::new(StatusCode::BAD_REQUEST, 40001, err.to_string()),
            ErrorKind::NotFound | ErrorKind::CacheMiss => {
                Self::new(StatusCode::NOT_FOUND, 40401, err.to_string())
            }
            ErrorKind::CursorExpired => Self::new(StatusCode::GONE, 41001, err.to_string()),
            ErrorKind::CacheCorrupt => {
                // The offending key is already logged where it was found;
                // clients get a generic retrieval error.
                Self::new(StatusCode::INTERNAL_SERVER_ERROR, 50001, "retrieval failed")
            }
            ErrorKind::TransientIo | ErrorKind::PartialFailure => {
                Self::new(StatusCode::INTERNAL_SERVER_ERROR, 50001, "internal error")
            }
        }
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let body = Envelope::<()> {
            code: self.code,
            message: self.message,
            data: None,
        };
        (self.status, Json(body)).into_response()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn success_envelope_uses_code_zero() {
        let body = serde_json::to_value(&ok(serde_json::json!({"id": 1})).0).unwrap();
        assert_eq!(body["code"], 0);
        assert_eq!(body["data"]["id"], 1);
    }

    #[test]
    fn cursor_expired_maps_to_gone_with_its_own_code() {
        let err: ApiError = ServiceError::CursorExpired(99).into();
        assert_eq!(err.code(), 41001);
        assert_eq!(err.status, StatusCode::GONE);
    }

    #[test]
    fn cache_miss_maps_to_not_found() {
        let err: ApiError = ServiceError::CacheMiss("post_detail:5".into()).into();
        assert_eq!(err.status, StatusCode::NOT_FOUND);
    }

    #[test]
    fn corrupt_cache_hides_the_key_from_clients() {
        let err: ApiError = ServiceError::CacheCorrupt {
            key: "post_detail:5".into(),
            message: "bad json".into(),
        }
        .into();
        assert_eq!(err.status, StatusCode::INTERNAL_SERVER_ERROR);
        assert!(!err.message.contains("post_detail"));
    }
}
