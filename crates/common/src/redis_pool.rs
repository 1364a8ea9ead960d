use redis::Client;
use redis::aio::ConnectionManager;

/// Connect to the Redis instance holding the delay event queue.
///
/// The manager reconnects on its own; a dropped connection surfaces as a
/// receive error in the dispatch loop, which backs off and retries.
pub async fn create_redis_pool(redis_url: &str) -> anyhow::Result<ConnectionManager> {
    let client = Client::open(redis_url)?;
    let manager = ConnectionManager::new(client).await?;

    tracing::info!("Connected to Redis event queue");
    Ok(manager)
}
