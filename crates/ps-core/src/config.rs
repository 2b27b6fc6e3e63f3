use anyhow::{anyhow, Context, Result};
use std::env;
use std::net::SocketAddr;
use std::str::FromStr;
use std::time::Duration;

pub fn required_env(name: &str) -> Result<String> {
    env::var(name).with_context(|| format!("missing env: {name}"))
}

pub fn env_or(name: &str, default: &str) -> String {
    env::var(name).unwrap_or_else(|_| default.to_string())
}

pub fn parsed_env<T>(name: &str, default: T) -> Result<T>
where
    T: FromStr,
    T::Err: std::fmt::Display,
{
    match env::var(name) {
        Ok(value) => value
            .parse()
            .map_err(|err| anyhow!("invalid value for {name}: {err}")),
        Err(_) => Ok(default),
    }
}

pub fn socket_addr_from_env(name: &str, default: &str) -> Result<SocketAddr> {
    let value = env::var(name).unwrap_or_else(|_| default.to_string());
    SocketAddr::from_str(&value).map_err(|err| anyhow!("invalid socket addr for {name}: {err}"))
}

/// Comma-separated list env, empty entries dropped.
pub fn list_from_env(name: &str) -> Vec<String> {
    env::var(name)
        .unwrap_or_default()
        .split(',')
        .map(str::trim)
        .filter(|entry| !entry.is_empty())
        .map(str::to_string)
        .collect()
}

#[derive(Debug, Clone)]
pub struct DatabaseConfig {
    pub write_url: String,
    pub read_urls: Vec<String>,
    pub max_connections: u32,
}

#[derive(Debug, Clone)]
pub struct DedupConfig {
    pub capacity: i64,
    pub error_rate: f64,
    pub ttl: Duration,
}

#[derive(Debug, Clone)]
pub struct WritebackConfig {
    pub batch_size: usize,
    pub concurrency: usize,
    pub scan_batch_size: u64,
    pub interval: Duration,
    pub deadline: Duration,
}

#[derive(Debug, Clone)]
pub struct SnapshotConfig {
    pub hot_list_size: i64,
    pub interval: Duration,
    pub deadline: Duration,
}

#[derive(Debug, Clone)]
pub struct KafkaConfig {
    pub brokers: String,
    pub consumer_group: String,
    pub topic_pending_audit: String,
    pub topic_approved: String,
    pub topic_rejected: String,
    pub topic_deleted: String,
}

#[derive(Debug, Clone)]
pub struct BlobConfig {
    pub endpoint: String,
    pub bucket: String,
    pub public_base_url: String,
}

#[derive(Debug, Clone)]
pub struct AppConfig {
    pub listen_addr: SocketAddr,
    pub admin_listen_addr: SocketAddr,
    pub database: DatabaseConfig,
    pub redis_url: String,
    pub kafka: KafkaConfig,
    pub blob: BlobConfig,
    pub dedup: DedupConfig,
    pub writeback: WritebackConfig,
    pub snapshot: SnapshotConfig,
}

impl AppConfig {
    pub fn from_env() -> Result<Self> {
        Ok(Self {
            listen_addr: socket_addr_from_env("PS_LISTEN_ADDR", "0.0.0.0:8080")?,
            admin_listen_addr: socket_addr_from_env("PS_ADMIN_LISTEN_ADDR", "0.0.0.0:8081")?,
            database: DatabaseConfig {
                write_url: required_env("PS_DATABASE_URL")?,
                read_urls: list_from_env("PS_DATABASE_READ_URLS"),
                max_connections: parsed_env("PS_DATABASE_MAX_CONNECTIONS", 10)?,
            },
            redis_url: required_env("PS_REDIS_URL")?,
            kafka: KafkaConfig {
                brokers: required_env("PS_KAFKA_BROKERS")?,
                consumer_group: env_or("PS_KAFKA_CONSUMER_GROUP", "post-service"),
                topic_pending_audit: env_or("PS_TOPIC_PENDING_AUDIT", "post_pending_audit"),
                topic_approved: env_or("PS_TOPIC_APPROVED", "post_audit_approved"),
                topic_rejected: env_or("PS_TOPIC_REJECTED", "post_audit_rejected"),
                topic_deleted: env_or("PS_TOPIC_DELETED", "post_deleted"),
            },
            blob: BlobConfig {
                endpoint: required_env("PS_BLOB_ENDPOINT")?,
                bucket: env_or("PS_BLOB_BUCKET", "post-images"),
                public_base_url: required_env("PS_BLOB_PUBLIC_BASE_URL")?,
            },
            dedup: DedupConfig {
                capacity: parsed_env("PS_DEDUP_CAPACITY", 100_000)?,
                error_rate: parsed_env("PS_DEDUP_ERROR_RATE", 0.01)?,
                ttl: Duration::from_secs(parsed_env("PS_DEDUP_TTL_SECS", 43_200)?),
            },
            writeback: WritebackConfig {
                batch_size: parsed_env("PS_WRITEBACK_BATCH_SIZE", 500)?,
                concurrency: parsed_env("PS_WRITEBACK_CONCURRENCY", 2)?,
                scan_batch_size: parsed_env("PS_SCAN_BATCH_SIZE", 1_000)?,
                interval: Duration::from_secs(parsed_env("PS_WRITEBACK_INTERVAL_SECS", 600)?),
                deadline: Duration::from_secs(parsed_env("PS_WRITEBACK_DEADLINE_SECS", 180)?),
            },
            snapshot: SnapshotConfig {
                hot_list_size: parsed_env("PS_HOT_LIST_SIZE", 100)?,
                interval: Duration::from_secs(parsed_env("PS_SNAPSHOT_INTERVAL_SECS", 900)?),
                deadline: Duration::from_secs(parsed_env("PS_SNAPSHOT_DEADLINE_SECS", 600)?),
            },
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    struct EnvGuard {
        key: &'static str,
    }

    impl Drop for EnvGuard {
        fn drop(&mut self) {
            env::remove_var(self.key);
        }
    }

    fn set_env(key: &'static str, value: &str) -> EnvGuard {
        env::set_var(key, value);
        EnvGuard { key }
    }

    #[test]
    fn required_env_missing_returns_error() {
        env::remove_var("PS_TEST_REQUIRED_MISSING");
        assert!(required_env("PS_TEST_REQUIRED_MISSING").is_err());
    }

    #[test]
    fn parsed_env_uses_default_when_unset() {
        env::remove_var("PS_TEST_PARSED_DEFAULT");
        let value: usize = parsed_env("PS_TEST_PARSED_DEFAULT", 500).unwrap();
        assert_eq!(value, 500);
    }

    #[test]
    fn parsed_env_rejects_garbage() {
        let _guard = set_env("PS_TEST_PARSED_GARBAGE", "not-a-number");
        let result: Result<usize> = parsed_env("PS_TEST_PARSED_GARBAGE", 1);
        assert!(result.is_err());
    }

    #[test]
    fn list_from_env_splits_and_trims() {
        let _guard = set_env(
            "PS_TEST_LIST",
            "postgres://replica-1/posts, postgres://replica-2/posts,,",
        );
        let urls = list_from_env("PS_TEST_LIST");
        assert_eq!(
            urls,
            vec![
                "postgres://replica-1/posts".to_string(),
                "postgres://replica-2/posts".to_string(),
            ]
        );
    }

    #[test]
    fn socket_addr_from_env_uses_default() {
        env::remove_var("PS_TEST_SOCKET_DEFAULT");
        let addr = socket_addr_from_env("PS_TEST_SOCKET_DEFAULT", "127.0.0.1:8080").unwrap();
        assert_eq!(addr, "127.0.0.1:8080".parse().unwrap());
    }
}
