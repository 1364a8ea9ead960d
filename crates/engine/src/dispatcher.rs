//! Dispatch loop and shutdown coordinator.
//!
//! **Running**: wait on the event source and the shutdown signal. Each
//! received event is decoded, routed to the cancellation or delay fan-out,
//! then acknowledged. Malformed events are dropped (and acknowledged); they
//! never stop the loop.
//!
//! **Draining**: entered on the shutdown signal or when the source closes.
//! No further events are received; the loop waits until every spawned
//! notification task has finished, closes the source and returns.

use std::future::Future;
use std::sync::Arc;
use std::time::Duration;

use delay_common::error::AppError;
use delay_common::types::DelayEvent;

use crate::processor::Pipeline;
use crate::queue::{Delivery, EventSource};
use crate::tracker::InFlight;
use crate::window::LOOK_AHEAD;

/// Upper bound on the pause after consecutive receive errors.
const MAX_RECEIVE_BACKOFF: Duration = Duration::from_secs(5);

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum State {
    Running,
    Draining,
}

/// Counters reported when the dispatcher stops.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct DispatchStats {
    pub received: u64,
    pub delays: u64,
    pub cancellations: u64,
    /// Malformed or stale events that were dropped
    pub dropped: u64,
    pub ack_failures: u64,
    pub receive_errors: u64,
}

pub struct Dispatcher<S> {
    source: S,
    pipeline: Arc<Pipeline>,
    tasks: InFlight,
    look_ahead: usize,
    state: State,
    stats: DispatchStats,
}

impl<S: EventSource> Dispatcher<S> {
    pub fn new(source: S, pipeline: Pipeline) -> Self {
        Self {
            source,
            pipeline: Arc::new(pipeline),
            tasks: InFlight::new(),
            look_ahead: LOOK_AHEAD,
            state: State::Running,
            stats: DispatchStats::default(),
        }
    }

    pub fn with_look_ahead(mut self, look_ahead: usize) -> Self {
        self.look_ahead = look_ahead;
        self
    }

    /// Run until `shutdown` resolves or the source closes, then drain.
    pub async fn run<F>(mut self, shutdown: F) -> DispatchStats
    where
        F: Future<Output = ()>,
    {
        tokio::pin!(shutdown);
        let mut consecutive_errors = 0u32;

        tracing::info!(look_ahead = self.look_ahead, "Dispatcher running");

        while self.state == State::Running {
            tokio::select! {
                biased;

                _ = &mut shutdown => {
                    tracing::info!("Shutdown signal received");
                    self.state = State::Draining;
                }
                received = self.source.receive() => match received {
                    Ok(Some(delivery)) => {
                        consecutive_errors = 0;
                        self.handle(&delivery);
                        self.acknowledge(&delivery).await;
                    }
                    Ok(None) => {
                        tracing::info!("Event source closed");
                        self.state = State::Draining;
                    }
                    Err(e) => {
                        consecutive_errors = consecutive_errors.saturating_add(1);
                        self.stats.receive_errors += 1;
                        let backoff = receive_backoff(consecutive_errors);
                        tracing::error!(
                            error = %e,
                            consecutive_errors,
                            backoff_ms = backoff.as_millis() as u64,
                            "Failed to receive from event source"
                        );

                        tokio::select! {
                            biased;
                            _ = &mut shutdown => {
                                tracing::info!("Shutdown signal received");
                                self.state = State::Draining;
                            }
                            _ = tokio::time::sleep(backoff) => {}
                        }
                    }
                }
            }
        }

        tracing::info!(
            in_flight = self.tasks.count(),
            "Draining in-flight notification tasks"
        );
        self.tasks.wait_idle().await;
        self.source.close().await;

        tracing::info!(
            received = self.stats.received,
            delays = self.stats.delays,
            cancellations = self.stats.cancellations,
            dropped = self.stats.dropped,
            "Dispatcher stopped"
        );

        self.stats
    }

    fn handle(&mut self, delivery: &Delivery) {
        self.stats.received += 1;

        if let Err(e) = self.route(delivery) {
            if e.is_malformed_input() {
                tracing::warn!(
                    tag = delivery.tag,
                    bytes = delivery.body.len(),
                    error = %e,
                    "Dropping malformed delay event"
                );
            } else {
                tracing::error!(tag = delivery.tag, error = %e, "Failed to dispatch delay event");
            }
            self.stats.dropped += 1;
        }
    }

    /// Decode one event and start its fan-out.
    fn route(&mut self, delivery: &Delivery) -> Result<(), AppError> {
        let event = Arc::new(DelayEvent::from_slice(&delivery.body)?);

        if event.cancelled {
            self.pipeline.fan_out_cancellation(&self.tasks, event);
            self.stats.cancellations += 1;
            return Ok(());
        }

        let stops = self
            .pipeline
            .fan_out_delay(&self.tasks, Arc::clone(&event), self.look_ahead)?;

        tracing::debug!(
            trip_id = %event.trip_id,
            stoptime_id = %event.stoptime_id,
            delay = event.delay,
            stops,
            "Delay event dispatched"
        );
        self.stats.delays += 1;
        Ok(())
    }

    async fn acknowledge(&mut self, delivery: &Delivery) {
        if let Err(e) = self.source.ack(delivery).await {
            self.stats.ack_failures += 1;
            tracing::error!(tag = delivery.tag, error = %e, "Failed to acknowledge event");
        }
    }
}

/// 250ms doubling per consecutive error, capped at [`MAX_RECEIVE_BACKOFF`].
fn receive_backoff(consecutive_errors: u32) -> Duration {
    let exp = consecutive_errors.saturating_sub(1).min(5);
    Duration::from_millis(250 * 2u64.pow(exp)).min(MAX_RECEIVE_BACKOFF)
}
