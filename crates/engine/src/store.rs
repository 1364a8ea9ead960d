//! Capability traits for the dispatcher's storage collaborators.
//!
//! Each trait carries only the operations the dispatch engine needs. The
//! PostgreSQL services and the in-memory stores are interchangeable behind
//! them.

use async_trait::async_trait;
use uuid::Uuid;

use delay_common::error::AppError;
use delay_common::types::{NotificationMethod, Subscription};

#[async_trait]
pub trait SubscriptionStore: Send + Sync {
    /// Non-archived subscriptions for one stop time.
    async fn get_by_stop_time(&self, stop_time_id: &str) -> Result<Vec<Subscription>, AppError>;

    /// Non-archived subscriptions anywhere on a trip.
    async fn get_by_trip(&self, trip_id: &str) -> Result<Vec<Subscription>, AppError>;

    /// Whether the subscription was notified within the cooldown window.
    async fn recently_notified(&self, subscription_id: Uuid) -> Result<bool, AppError>;

    /// Record that the subscription has just been notified.
    async fn mark_notified(&self, subscription: &Subscription) -> Result<(), AppError>;
}

#[async_trait]
pub trait NotificationMethodStore: Send + Sync {
    async fn get(&self, method_id: Uuid) -> Result<NotificationMethod, AppError>;
}
