//! Subscription service: PostgreSQL storage for rider subscriptions.
//!
//! A subscription links a user to one stop time of one trip, with weekday
//! opt-ins and an ordered list of notification methods.

use std::sync::Arc;

use async_trait::async_trait;
use chrono::{SubsecRound, Utc};
use sqlx::PgPool;
use uuid::Uuid;

use delay_common::error::AppError;
use delay_common::types::{Day, Subscription, WeekdayFlags};

use crate::clock::Clock;
use crate::recency::{self, CooldownWindow};
use crate::store::SubscriptionStore;

/// Parameters for creating a new subscription.
#[derive(Debug, Clone, serde::Deserialize)]
pub struct NewSubscription {
    pub trip_id: String,
    pub stop_time_id: String,
    pub user_id: Uuid,
    pub days: Vec<Day>,
    pub notification_ids: Vec<Uuid>,
}

/// Columns and method-id aggregation shared by every subscription query.
fn select_subscriptions(filter: &str) -> String {
    format!(
        r#"
        SELECT s.id, s.trip_id, s.stop_time_id, s.user_id, s.archived, s.created_at,
               s.monday, s.tuesday, s.wednesday, s.thursday, s.friday, s.saturday, s.sunday,
               COALESCE(
                   ARRAY_AGG(sm.method_id ORDER BY sm.position)
                       FILTER (WHERE sm.method_id IS NOT NULL),
                   '{{}}'
               ) AS notification_ids
        FROM subscriptions s
        LEFT JOIN subscription_methods sm ON sm.subscription_id = s.id
        WHERE {}
        GROUP BY s.id
        ORDER BY s.created_at
        "#,
        filter
    )
}

/// Service layer for subscription administration.
pub struct SubscriptionService;

impl SubscriptionService {
    /// Create a subscription and link its notification methods.
    ///
    /// At least one notification method is required.
    pub async fn create(pool: &PgPool, params: &NewSubscription) -> Result<Subscription, AppError> {
        if params.notification_ids.is_empty() {
            return Err(AppError::Validation(
                "A subscription needs at least one notification method".to_string(),
            ));
        }

        let subscription = Subscription {
            id: Uuid::new_v4(),
            trip_id: params.trip_id.clone(),
            stop_time_id: params.stop_time_id.clone(),
            user_id: params.user_id,
            archived: false,
            created_at: Utc::now().trunc_subsecs(0),
            days: WeekdayFlags::from_days(&params.days),
            notification_ids: params.notification_ids.clone(),
        };
        let days = subscription.days;

        let mut tx = pool.begin().await?;

        sqlx::query(
            r#"
            INSERT INTO subscriptions (
                id, trip_id, stop_time_id, user_id, archived, created_at,
                monday, tuesday, wednesday, thursday, friday, saturday, sunday
            ) VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11, $12, $13)
            "#,
        )
        .bind(subscription.id)
        .bind(&subscription.trip_id)
        .bind(&subscription.stop_time_id)
        .bind(subscription.user_id)
        .bind(subscription.archived)
        .bind(subscription.created_at)
        .bind(days.monday)
        .bind(days.tuesday)
        .bind(days.wednesday)
        .bind(days.thursday)
        .bind(days.friday)
        .bind(days.saturday)
        .bind(days.sunday)
        .execute(&mut *tx)
        .await?;

        for (position, method_id) in subscription.notification_ids.iter().enumerate() {
            sqlx::query(
                r#"
                INSERT INTO subscription_methods (subscription_id, method_id, position)
                VALUES ($1, $2, $3)
                "#,
            )
            .bind(subscription.id)
            .bind(method_id)
            .bind(position as i32)
            .execute(&mut *tx)
            .await?;
        }

        tx.commit().await?;

        tracing::info!(
            subscription_id = %subscription.id,
            user_id = %subscription.user_id,
            stop_time_id = %subscription.stop_time_id,
            "Subscription created"
        );

        Ok(subscription)
    }

    /// Get a single subscription by ID, archived or not.
    pub async fn get(pool: &PgPool, subscription_id: Uuid) -> Result<Subscription, AppError> {
        sqlx::query_as(&select_subscriptions("s.id = $1"))
            .bind(subscription_id)
            .fetch_optional(pool)
            .await?
            .ok_or_else(|| AppError::NotFound(format!("Subscription {} not found", subscription_id)))
    }

    /// Archive a subscription so it no longer receives alerts.
    pub async fn archive(pool: &PgPool, subscription_id: Uuid) -> Result<bool, AppError> {
        let result = sqlx::query("UPDATE subscriptions SET archived = true WHERE id = $1")
            .bind(subscription_id)
            .execute(pool)
            .await?;

        let archived = result.rows_affected() > 0;
        if archived {
            tracing::info!(subscription_id = %subscription_id, "Subscription archived");
        }

        Ok(archived)
    }

    pub async fn list_by_stop_time(
        pool: &PgPool,
        stop_time_id: &str,
    ) -> Result<Vec<Subscription>, AppError> {
        let subs = sqlx::query_as(&select_subscriptions(
            "s.stop_time_id = $1 AND s.archived = false",
        ))
        .bind(stop_time_id)
        .fetch_all(pool)
        .await?;

        Ok(subs)
    }

    pub async fn list_by_trip(pool: &PgPool, trip_id: &str) -> Result<Vec<Subscription>, AppError> {
        let subs = sqlx::query_as(&select_subscriptions(
            "s.trip_id = $1 AND s.archived = false",
        ))
        .bind(trip_id)
        .fetch_all(pool)
        .await?;

        Ok(subs)
    }
}

/// [`SubscriptionStore`] over PostgreSQL.
pub struct PgSubscriptionStore {
    pool: PgPool,
    clock: Arc<dyn Clock>,
    cooldown: CooldownWindow,
}

impl PgSubscriptionStore {
    pub fn new(pool: PgPool, clock: Arc<dyn Clock>, cooldown: CooldownWindow) -> Self {
        Self {
            pool,
            clock,
            cooldown,
        }
    }
}

#[async_trait]
impl SubscriptionStore for PgSubscriptionStore {
    async fn get_by_stop_time(&self, stop_time_id: &str) -> Result<Vec<Subscription>, AppError> {
        SubscriptionService::list_by_stop_time(&self.pool, stop_time_id).await
    }

    async fn get_by_trip(&self, trip_id: &str) -> Result<Vec<Subscription>, AppError> {
        SubscriptionService::list_by_trip(&self.pool, trip_id).await
    }

    async fn recently_notified(&self, subscription_id: Uuid) -> Result<bool, AppError> {
        let cutoff = self.cooldown.cutoff(self.clock.now());
        recency::recently_notified(&self.pool, subscription_id, cutoff).await
    }

    async fn mark_notified(&self, subscription: &Subscription) -> Result<(), AppError> {
        recency::mark_notified(&self.pool, subscription.id, self.clock.now()).await?;
        Ok(())
    }
}
