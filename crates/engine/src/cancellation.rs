//! Cancellation handler: trip-wide alerts when a trip is cancelled.
//!
//! Unlike delays, a cancellation reaches every subscription on the trip
//! regardless of stop, and is not subject to the cooldown.

use std::sync::Arc;

use delay_common::types::{DelayEvent, Subscription};

use crate::composer;
use crate::eligibility;
use crate::processor::{Outcome, Pipeline};
use crate::tracker::InFlight;

impl Pipeline {
    /// Spawn the trip-wide cancellation fan-out for `event`.
    pub fn fan_out_cancellation(self: &Arc<Self>, tasks: &InFlight, event: Arc<DelayEvent>) {
        let pipeline = Arc::clone(self);
        let trip_tasks = tasks.clone();
        tasks.spawn(async move {
            pipeline.process_cancellation(trip_tasks, event).await;
        });
    }

    async fn process_cancellation(self: Arc<Self>, tasks: InFlight, event: Arc<DelayEvent>) {
        let subs = match self.subscriptions.get_by_trip(&event.trip_id).await {
            Ok(subs) => subs,
            Err(e) => {
                tracing::error!(
                    trip_id = %event.trip_id,
                    error = %e,
                    "Failed to load subscriptions for cancelled trip"
                );
                return;
            }
        };

        tracing::info!(
            trip_id = %event.trip_id,
            subscriptions = subs.len(),
            "Trip cancelled"
        );

        for sub in subs {
            let pipeline = Arc::clone(&self);
            let event = Arc::clone(&event);
            tasks.spawn(async move {
                pipeline.process_cancellation_subscription(&sub, &event).await;
            });
        }
    }

    /// Notify one subscriber that their trip was cancelled.
    pub async fn process_cancellation_subscription(
        &self,
        subscription: &Subscription,
        event: &DelayEvent,
    ) -> Outcome {
        let _permit = self.permit().await;

        if !eligibility::subscribed_for_today(subscription, self.clock.as_ref()) {
            return Outcome::NotToday;
        }

        let payload = composer::compose_cancellation(event);
        self.deliver_and_mark(subscription, &payload).await
    }
}
