//! Event sources the dispatch loop consumes from.
//!
//! The production source is a Redis list used as a reliable queue: the
//! collector `LPUSH`es JSON events onto `<queue>`, the dispatcher atomically
//! moves each one onto `<queue>:processing` with `BLMOVE` and removes it
//! from there on acknowledgement. Anything left in the processing list by a
//! previous run is put back on the queue at startup.

use async_trait::async_trait;
use redis::aio::ConnectionManager;

use delay_common::error::AppError;

/// Seconds one `BLMOVE` blocks before polling again.
const POLL_TIMEOUT_SECS: f64 = 1.0;

/// One message received from an event source, pending acknowledgement.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Delivery {
    pub tag: u64,
    pub body: Vec<u8>,
}

#[async_trait]
pub trait EventSource: Send {
    /// Wait for the next message. `None` means the source is closed and will
    /// never yield again.
    async fn receive(&mut self) -> Result<Option<Delivery>, AppError>;

    /// Acknowledge a processed message so it is not redelivered.
    async fn ack(&mut self, delivery: &Delivery) -> Result<(), AppError>;

    async fn close(&mut self);
}

/// Redis list-backed [`EventSource`].
pub struct RedisQueue {
    redis: ConnectionManager,
    queue: String,
    processing: String,
    next_tag: u64,
}

impl RedisQueue {
    /// Attach to `queue`, requeueing messages a previous run left unacknowledged.
    pub async fn connect(redis: ConnectionManager, queue: impl Into<String>) -> Result<Self, AppError> {
        let queue = queue.into();
        let processing = format!("{}:processing", queue);

        let mut source = Self {
            redis,
            queue,
            processing,
            next_tag: 0,
        };

        let recovered = source.requeue_unacked().await?;
        if recovered > 0 {
            tracing::warn!(
                queue = %source.queue,
                recovered,
                "Requeued unacknowledged events from a previous run"
            );
        }

        tracing::info!(queue = %source.queue, "Listening for delay events");
        Ok(source)
    }

    async fn requeue_unacked(&mut self) -> Result<usize, AppError> {
        let mut recovered = 0;

        loop {
            let moved: Option<Vec<u8>> = redis::cmd("LMOVE")
                .arg(&self.processing)
                .arg(&self.queue)
                .arg("RIGHT")
                .arg("RIGHT")
                .query_async(&mut self.redis)
                .await?;

            if moved.is_none() {
                return Ok(recovered);
            }
            recovered += 1;
        }
    }
}

#[async_trait]
impl EventSource for RedisQueue {
    async fn receive(&mut self) -> Result<Option<Delivery>, AppError> {
        loop {
            // BLMOVE <queue> <processing> RIGHT LEFT <timeout>
            // Returns nil when the timeout elapses with the queue still empty.
            let moved: Option<Vec<u8>> = redis::cmd("BLMOVE")
                .arg(&self.queue)
                .arg(&self.processing)
                .arg("RIGHT")
                .arg("LEFT")
                .arg(POLL_TIMEOUT_SECS)
                .query_async(&mut self.redis)
                .await?;

            if let Some(body) = moved {
                self.next_tag += 1;
                return Ok(Some(Delivery {
                    tag: self.next_tag,
                    body,
                }));
            }
        }
    }

    async fn ack(&mut self, delivery: &Delivery) -> Result<(), AppError> {
        let removed: i64 = redis::cmd("LREM")
            .arg(&self.processing)
            .arg(1)
            .arg(delivery.body.as_slice())
            .query_async(&mut self.redis)
            .await?;

        if removed == 0 {
            tracing::warn!(
                tag = delivery.tag,
                queue = %self.processing,
                "Acknowledged event was not in the processing list"
            );
        }

        Ok(())
    }

    async fn close(&mut self) {
        tracing::info!(queue = %self.queue, "Event queue closed");
    }
}
