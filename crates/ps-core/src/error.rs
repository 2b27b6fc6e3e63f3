use thiserror::Error;

/// Error taxonomy shared by every crate in the workspace. Callers that need
/// to branch (HTTP mapping, consumer ack decisions, cache fallback) match on
/// the variant; everything else propagates with `?`.
#[derive(Debug, Error)]
pub enum ServiceError {
    #[error("not found: {0}")]
    NotFound(String),

    /// Key absent in the KV store. Not a failure for callers that can fall
    /// back to the durable store.
    #[error("cache miss: {0}")]
    CacheMiss(String),

    /// Value present but unparseable. The offending key is kept so the
    /// caller can log it or delete it.
    #[error("cache corrupt at {key}: {message}")]
    CacheCorrupt { key: String, message: String },

    #[error("invalid input: {0}")]
    InvalidInput(String),

    #[error("cursor expired: post {0} left the hot ranking")]
    CursorExpired(i64),

    #[error("database error: {0}")]
    Database(#[from] sqlx::Error),

    #[error("kv error: {0}")]
    Kv(#[from] redis::RedisError),

    #[error("event bus error: {0}")]
    Bus(String),

    #[error("blob store error: {0}")]
    Blob(String),

    /// A subset of batches in a bulk job failed. Individual batch errors are
    /// logged where they happen; this carries the aggregate.
    #[error("{failed}/{total} batches failed: {detail}")]
    PartialFailure {
        failed: usize,
        total: usize,
        detail: String,
    },
}

pub type ServiceResult<T> = Result<T, ServiceError>;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorKind {
    NotFound,
    CacheMiss,
    CacheCorrupt,
    InvalidInput,
    CursorExpired,
    TransientIo,
    PartialFailure,
}

impl ServiceError {
    pub fn kind(&self) -> ErrorKind {
        match self {
            ServiceError::NotFound(_) => ErrorKind::NotFound,
            ServiceError::CacheMiss(_) => ErrorKind::CacheMiss,
            ServiceError::CacheCorrupt { .. } => ErrorKind::CacheCorrupt,
            ServiceError::InvalidInput(_) => ErrorKind::InvalidInput,
            ServiceError::CursorExpired(_) => ErrorKind::CursorExpired,
            ServiceError::Database(_) | ServiceError::Kv(_) => ErrorKind::TransientIo,
            ServiceError::Bus(_) | ServiceError::Blob(_) => ErrorKind::TransientIo,
            ServiceError::PartialFailure { .. } => ErrorKind::PartialFailure,
        }
    }

    pub fn code(&self) -> &'static str {
        match self.kind() {
            ErrorKind::NotFound => "NOT_FOUND",
            ErrorKind::CacheMiss => "CACHE_MISS",
            ErrorKind::CacheCorrupt => "CACHE_CORRUPT",
            ErrorKind::InvalidInput => "INVALID_INPUT",
            ErrorKind::CursorExpired => "CURSOR_EXPIRED",
            ErrorKind::TransientIo => "TRANSIENT_IO",
            ErrorKind::PartialFailure => "PARTIAL_FAILURE",
        }
    }

    pub fn invalid(message: impl Into<String>) -> Self {
        ServiceError::InvalidInput(message.into())
    }

    pub fn not_found(message: impl Into<String>) -> Self {
        ServiceError::NotFound(message.into())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn kinds_map_to_stable_codes() {
        assert_eq!(ServiceError::not_found("post 1").code(), "NOT_FOUND");
        assert_eq!(ServiceError::invalid("page must be >= 1").code(), "INVALID_INPUT");
        assert_eq!(ServiceError::CursorExpired(99).code(), "CURSOR_EXPIRED");
        assert_eq!(
            ServiceError::CacheCorrupt {
                key: "post_detail:3".into(),
                message: "bad json".into(),
            }
            .code(),
            "CACHE_CORRUPT"
        );
    }

    #[test]
    fn io_variants_share_the_transient_kind() {
        let db: ServiceError = sqlx::Error::PoolTimedOut.into();
        assert_eq!(db.kind(), ErrorKind::TransientIo);
        assert_eq!(ServiceError::Bus("broker down".into()).kind(), ErrorKind::TransientIo);
    }

    #[test]
    fn partial_failure_formats_counts() {
        let err = ServiceError::PartialFailure {
            failed: 2,
            total: 7,
            detail: "worker 0: timeout; worker 1: timeout".into(),
        };
        assert!(err.to_string().starts_with("2/7 batches failed"));
    }
}
