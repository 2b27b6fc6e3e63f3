use anyhow::Result;
use redis::aio::ConnectionManager;

/// Shared handle to the KV store. `ConnectionManager` multiplexes one
/// connection and reconnects on failure, so clones are cheap and safe to use
/// from every task.
pub type Kv = ConnectionManager;

pub async fn connect(redis_url: &str) -> Result<Kv> {
    let client = redis::Client::open(redis_url)?;
    let manager = ConnectionManager::new(client).await?;
    Ok(manager)
}

pub async fn check_ready(kv: &Kv) -> Result<()> {
    let mut conn = kv.clone();
    let _: String = redis::cmd("PING").query_async(&mut conn).await?;
    Ok(())
}
