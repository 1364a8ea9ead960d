//! Notification pipeline for delay events.
//!
//! For one delay event:
//! 1. Select the look-ahead window of stop times (`window`)
//! 2. Per stop time, load its subscriptions and compute the ETA
//! 3. Per subscription, concurrently: recency gate → day gate → compose →
//!    deliver → mark notified
//!
//! Every task is spawned through the dispatcher's [`InFlight`] tracker so
//! shutdown can wait for it.

use std::sync::Arc;

use chrono::{DateTime, FixedOffset};
use tokio::sync::Semaphore;

use delay_common::error::AppError;
use delay_common::types::{DelayEvent, NotificationPayload, StopTime, Subscription};
use delay_notifier::PushTransport;

use crate::clock::Clock;
use crate::composer;
use crate::delivery::DeliveryMultiplexer;
use crate::eligibility;
use crate::store::{NotificationMethodStore, SubscriptionStore};
use crate::tracker::InFlight;
use crate::window;

/// Result of one per-subscription notification task.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Outcome {
    /// Delivery loop ran and the subscription was marked notified.
    Notified,
    /// Suppressed: alerted within the cooldown window.
    RecentlyNotified,
    /// Suppressed: the subscriber opted out of today.
    NotToday,
    /// A lookup or store failure ended the task.
    Failed,
}

/// Shared collaborators for every notification task.
pub struct Pipeline {
    pub(crate) subscriptions: Arc<dyn SubscriptionStore>,
    pub(crate) delivery: DeliveryMultiplexer,
    pub(crate) clock: Arc<dyn Clock>,
    limiter: Option<Semaphore>,
}

impl Pipeline {
    pub fn new(
        subscriptions: Arc<dyn SubscriptionStore>,
        methods: Arc<dyn NotificationMethodStore>,
        push: Arc<dyn PushTransport>,
        clock: Arc<dyn Clock>,
    ) -> Self {
        Self {
            subscriptions,
            delivery: DeliveryMultiplexer::new(methods, push),
            clock,
            limiter: None,
        }
    }

    /// Cap how many notification tasks deliver at once. `None` leaves the
    /// fan-out unbounded.
    pub fn with_concurrency_limit(mut self, limit: Option<usize>) -> Self {
        self.limiter = limit.map(Semaphore::new);
        self
    }

    /// Spawn one task per stop time in the event's look-ahead window.
    ///
    /// Fails with `NotFound` when the event's stop time is not part of its
    /// own trip, and with `Validation` when the delay puts any window ETA out
    /// of range. Nothing is spawned in either case.
    pub fn fan_out_delay(
        self: &Arc<Self>,
        tasks: &InFlight,
        event: Arc<DelayEvent>,
        look_ahead: usize,
    ) -> Result<usize, AppError> {
        let stops = window::select_window(&event.stop_times, &event.stoptime_id, look_ahead)?;
        let etas = stops
            .iter()
            .map(|stop_time| composer::eta(stop_time, event.delay))
            .collect::<Result<Vec<_>, _>>()?;

        for (stop_time, eta) in stops.iter().zip(etas) {
            let pipeline = Arc::clone(self);
            let stop_tasks = tasks.clone();
            let stop_time = stop_time.clone();
            let event = Arc::clone(&event);
            tasks.spawn(async move {
                pipeline
                    .process_stop_time(stop_tasks, stop_time, eta, event)
                    .await;
            });
        }

        Ok(stops.len())
    }

    /// Load the subscriptions for one stop time and spawn a task for each.
    async fn process_stop_time(
        self: Arc<Self>,
        tasks: InFlight,
        stop_time: StopTime,
        eta: DateTime<FixedOffset>,
        event: Arc<DelayEvent>,
    ) {
        let subs = match self.subscriptions.get_by_stop_time(&stop_time.id).await {
            Ok(subs) => subs,
            Err(e) => {
                tracing::error!(
                    stop_time_id = %stop_time.id,
                    error = %e,
                    "Failed to load subscriptions for stop time"
                );
                return;
            }
        };

        if subs.is_empty() {
            return;
        }

        let stop_time = Arc::new(stop_time);

        tracing::debug!(
            stop_time_id = %stop_time.id,
            subscriptions = subs.len(),
            eta = %eta,
            "Fanning out delay notification"
        );

        for sub in subs {
            let pipeline = Arc::clone(&self);
            let stop_time = Arc::clone(&stop_time);
            let event = Arc::clone(&event);
            tasks.spawn(async move {
                pipeline
                    .process_subscription(&sub, eta, &stop_time, &event)
                    .await;
            });
        }
    }

    /// Notify one subscriber of a delay at one stop.
    pub async fn process_subscription(
        &self,
        subscription: &Subscription,
        eta: DateTime<FixedOffset>,
        stop_time: &StopTime,
        event: &DelayEvent,
    ) -> Outcome {
        let _permit = self.permit().await;

        match self.subscriptions.recently_notified(subscription.id).await {
            Ok(true) => {
                tracing::debug!(
                    subscription_id = %subscription.id,
                    "Alert suppressed, subscription notified recently"
                );
                return Outcome::RecentlyNotified;
            }
            Ok(false) => {}
            Err(e) => {
                tracing::error!(
                    subscription_id = %subscription.id,
                    error = %e,
                    "Failed to check whether subscription was recently notified"
                );
                return Outcome::Failed;
            }
        }

        if !eligibility::subscribed_for_today(subscription, self.clock.as_ref()) {
            return Outcome::NotToday;
        }

        let payload = composer::compose_delay(event, stop_time, eta);
        self.deliver_and_mark(subscription, &payload).await
    }

    /// Run the delivery loop, then record the notification if it was attempted.
    pub(crate) async fn deliver_and_mark(
        &self,
        subscription: &Subscription,
        payload: &NotificationPayload,
    ) -> Outcome {
        let report = match self.delivery.deliver(subscription, payload).await {
            Ok(report) => report,
            Err(e) => {
                tracing::error!(
                    subscription_id = %subscription.id,
                    error = %e,
                    "Delivery aborted"
                );
                return Outcome::Failed;
            }
        };

        if let Err(e) = self.subscriptions.mark_notified(subscription).await {
            tracing::error!(
                subscription_id = %subscription.id,
                error = %e,
                "Failed to mark subscription as notified"
            );
            return Outcome::Failed;
        }

        tracing::info!(
            subscription_id = %subscription.id,
            pushed = report.pushed,
            unsupported = report.unsupported,
            complete = report.is_complete(),
            "Subscription notified"
        );

        Outcome::Notified
    }

    pub(crate) async fn permit(&self) -> Option<tokio::sync::SemaphorePermit<'_>> {
        match &self.limiter {
            Some(limiter) => limiter.acquire().await.ok(),
            None => None,
        }
    }
}
