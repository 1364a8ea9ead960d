//! In-memory implementations of the dispatcher's collaborators.
//!
//! Used to embed the engine without PostgreSQL or Redis, and as the fixtures
//! for the dispatch integration tests.

use std::collections::HashMap;
use std::sync::Arc;

use async_trait::async_trait;
use chrono::{DateTime, TimeDelta, Utc};
use parking_lot::{Mutex, RwLock};
use tokio::sync::mpsc;
use uuid::Uuid;

use delay_common::error::AppError;
use delay_common::types::{NotificationEvent, NotificationMethod, Subscription};

use crate::clock::Clock;
use crate::queue::{Delivery, EventSource};
use crate::recency::{CooldownWindow, event_timestamp};
use crate::store::{NotificationMethodStore, SubscriptionStore};

/// Clock that only moves when told to.
#[derive(Debug)]
pub struct ManualClock {
    now: Mutex<DateTime<Utc>>,
}

impl ManualClock {
    pub fn new(now: DateTime<Utc>) -> Self {
        Self {
            now: Mutex::new(now),
        }
    }

    pub fn advance(&self, by: TimeDelta) {
        *self.now.lock() += by;
    }
}

impl Clock for ManualClock {
    fn now(&self) -> DateTime<Utc> {
        *self.now.lock()
    }
}

/// [`SubscriptionStore`] holding subscriptions and notification events in memory.
pub struct InMemorySubscriptionStore {
    subscriptions: RwLock<Vec<Subscription>>,
    events: Mutex<Vec<NotificationEvent>>,
    clock: Arc<dyn Clock>,
    cooldown: CooldownWindow,
}

impl InMemorySubscriptionStore {
    pub fn new(clock: Arc<dyn Clock>, cooldown: CooldownWindow) -> Self {
        Self {
            subscriptions: RwLock::new(Vec::new()),
            events: Mutex::new(Vec::new()),
            clock,
            cooldown,
        }
    }

    pub fn insert(&self, subscription: Subscription) {
        self.subscriptions.write().push(subscription);
    }

    /// Record a notification event at an arbitrary time.
    pub fn record_notified_at(&self, subscription_id: Uuid, at: DateTime<Utc>) {
        self.events.lock().push(NotificationEvent {
            id: Uuid::new_v4(),
            subscription_id,
            created_at: event_timestamp(at),
        });
    }

    /// Number of notification events recorded for a subscription.
    pub fn notification_count(&self, subscription_id: Uuid) -> usize {
        self.events
            .lock()
            .iter()
            .filter(|e| e.subscription_id == subscription_id)
            .count()
    }

    pub fn total_notifications(&self) -> usize {
        self.events.lock().len()
    }

    fn select(&self, predicate: impl Fn(&Subscription) -> bool) -> Vec<Subscription> {
        self.subscriptions
            .read()
            .iter()
            .filter(|s| !s.archived && predicate(s))
            .cloned()
            .collect()
    }
}

#[async_trait]
impl SubscriptionStore for InMemorySubscriptionStore {
    async fn get_by_stop_time(&self, stop_time_id: &str) -> Result<Vec<Subscription>, AppError> {
        Ok(self.select(|s| s.stop_time_id == stop_time_id))
    }

    async fn get_by_trip(&self, trip_id: &str) -> Result<Vec<Subscription>, AppError> {
        Ok(self.select(|s| s.trip_id == trip_id))
    }

    async fn recently_notified(&self, subscription_id: Uuid) -> Result<bool, AppError> {
        let now = self.clock.now();
        Ok(self
            .events
            .lock()
            .iter()
            .any(|e| e.subscription_id == subscription_id && self.cooldown.is_recent(e.created_at, now)))
    }

    async fn mark_notified(&self, subscription: &Subscription) -> Result<(), AppError> {
        self.record_notified_at(subscription.id, self.clock.now());
        Ok(())
    }
}

/// [`NotificationMethodStore`] over a map.
#[derive(Default)]
pub struct InMemoryMethodStore {
    methods: RwLock<HashMap<Uuid, NotificationMethod>>,
}

impl InMemoryMethodStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn insert(&self, method: NotificationMethod) {
        self.methods.write().insert(method.id, method);
    }
}

#[async_trait]
impl NotificationMethodStore for InMemoryMethodStore {
    async fn get(&self, method_id: Uuid) -> Result<NotificationMethod, AppError> {
        self.methods
            .read()
            .get(&method_id)
            .cloned()
            .ok_or_else(|| AppError::NotFound(format!("Notification method {} not found", method_id)))
    }
}

/// [`EventSource`] fed through a tokio channel. Closes when every sender is dropped.
pub struct ChannelSource {
    receiver: mpsc::UnboundedReceiver<Vec<u8>>,
    next_tag: u64,
    acked: Arc<Mutex<Vec<u64>>>,
}

impl ChannelSource {
    pub fn new() -> (mpsc::UnboundedSender<Vec<u8>>, Self) {
        let (sender, receiver) = mpsc::unbounded_channel();
        let source = Self {
            receiver,
            next_tag: 0,
            acked: Arc::new(Mutex::new(Vec::new())),
        };
        (sender, source)
    }

    /// Shared view of acknowledged delivery tags, readable after the source
    /// has been moved into a dispatcher.
    pub fn acked(&self) -> Arc<Mutex<Vec<u64>>> {
        Arc::clone(&self.acked)
    }
}

#[async_trait]
impl EventSource for ChannelSource {
    async fn receive(&mut self) -> Result<Option<Delivery>, AppError> {
        Ok(self.receiver.recv().await.map(|body| {
            self.next_tag += 1;
            Delivery {
                tag: self.next_tag,
                body,
            }
        }))
    }

    async fn ack(&mut self, delivery: &Delivery) -> Result<(), AppError> {
        self.acked.lock().push(delivery.tag);
        Ok(())
    }

    async fn close(&mut self) {
        self.receiver.close();
    }
}
