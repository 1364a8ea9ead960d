//! Recency guard: per-subscription cooldown backed by notification events.
//!
//! Every completed delivery inserts one `notification_events` row. A
//! subscription counts as recently notified while any of its rows is newer
//! than the cooldown cutoff. Rows are never updated, so the table needs no
//! locking. The check and the insert are separate statements: two tasks for
//! the same subscription can both pass the check and both alert.

use chrono::{DateTime, DurationRound, SubsecRound, TimeDelta, Utc};
use sqlx::PgPool;
use uuid::Uuid;

use delay_common::error::AppError;

/// Default cooldown between alerts for one subscription.
pub const DEFAULT_COOLDOWN_MINUTES: i64 = 15;

/// Trailing window during which a subscription stays suppressed.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CooldownWindow {
    length: TimeDelta,
}

impl CooldownWindow {
    pub fn minutes(minutes: i64) -> Self {
        Self {
            length: TimeDelta::minutes(minutes),
        }
    }

    /// Events created strictly after this instant are recent.
    pub fn cutoff(&self, now: DateTime<Utc>) -> DateTime<Utc> {
        now - self.length
    }

    pub fn is_recent(&self, notified_at: DateTime<Utc>, now: DateTime<Utc>) -> bool {
        notified_at > self.cutoff(now)
    }
}

impl Default for CooldownWindow {
    fn default() -> Self {
        Self::minutes(DEFAULT_COOLDOWN_MINUTES)
    }
}

/// Timestamp stored for a notification event: `now` rounded to the second.
pub fn event_timestamp(now: DateTime<Utc>) -> DateTime<Utc> {
    now.duration_round(TimeDelta::seconds(1))
        .unwrap_or_else(|_| now.trunc_subsecs(0))
}

/// Count events for the subscription created after `cutoff`.
pub async fn recently_notified(
    pool: &PgPool,
    subscription_id: Uuid,
    cutoff: DateTime<Utc>,
) -> Result<bool, AppError> {
    let count: i64 = sqlx::query_scalar(
        r#"
        SELECT COUNT(*)
        FROM notification_events
        WHERE subscription_id = $1
          AND created_at > $2
        "#,
    )
    .bind(subscription_id)
    .bind(cutoff)
    .fetch_one(pool)
    .await?;

    Ok(count >= 1)
}

/// Insert a notification event and return its id.
pub async fn mark_notified(
    pool: &PgPool,
    subscription_id: Uuid,
    notified_at: DateTime<Utc>,
) -> Result<Uuid, AppError> {
    let id = Uuid::new_v4();

    sqlx::query(
        r#"
        INSERT INTO notification_events (id, subscription_id, created_at)
        VALUES ($1, $2, $3)
        "#,
    )
    .bind(id)
    .bind(subscription_id)
    .bind(event_timestamp(notified_at))
    .execute(pool)
    .await?;

    tracing::debug!(subscription_id = %subscription_id, event_id = %id, "Subscription marked notified");

    Ok(id)
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    fn at(h: u32, m: u32, s: u32) -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2026, 10, 14, h, m, s).unwrap()
    }

    #[test]
    fn test_default_window_is_fifteen_minutes() {
        let window = CooldownWindow::default();
        assert_eq!(window.cutoff(at(9, 0, 0)), at(8, 45, 0));
    }

    #[test]
    fn test_recent_inside_window() {
        let window = CooldownWindow::default();
        let now = at(9, 0, 0);
        assert!(window.is_recent(at(8, 55, 0), now));
        assert!(window.is_recent(now, now));
    }

    #[test]
    fn test_not_recent_at_or_past_cutoff() {
        let window = CooldownWindow::default();
        let now = at(9, 0, 0);
        assert!(!window.is_recent(at(8, 45, 0), now));
        assert!(!window.is_recent(at(8, 40, 0), now));
    }

    #[test]
    fn test_event_timestamp_rounds_to_second() {
        let base = at(9, 0, 0);
        let early = base + TimeDelta::milliseconds(400);
        let late = base + TimeDelta::milliseconds(600);
        assert_eq!(event_timestamp(early), base);
        assert_eq!(event_timestamp(late), at(9, 0, 1));
    }
}
