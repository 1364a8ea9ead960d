//! Notification composer: rider-facing text for delays and cancellations.

use chrono::{DateTime, FixedOffset, TimeDelta};

use delay_common::error::AppError;
use delay_common::types::{DelayEvent, NotificationPayload, StopTime};

const ETA_FORMAT: &str = "%H:%M";

/// Expected arrival: scheduled arrival shifted by the signed delay.
///
/// A delay that pushes the arrival outside the representable date range is
/// rejected as a `Validation` error.
pub fn eta(stop_time: &StopTime, delay_secs: i64) -> Result<DateTime<FixedOffset>, AppError> {
    TimeDelta::try_seconds(delay_secs)
        .and_then(|delay| stop_time.arrival.checked_add_signed(delay))
        .ok_or_else(|| {
            AppError::Validation(format!(
                "Delay of {}s puts stop time {} out of range",
                delay_secs, stop_time.id
            ))
        })
}

/// Build the alert for a delayed (or early) service at one stop.
pub fn compose_delay(
    event: &DelayEvent,
    stop_time: &StopTime,
    eta: DateTime<FixedOffset>,
) -> NotificationPayload {
    let late_early = if event.delay > 0 { "Late" } else { "Early" };
    let eta_display = eta.format(ETA_FORMAT).to_string();

    NotificationPayload {
        title: format!("{} is Running {}", event.route.long_name, late_early),
        body: format!(
            "{} expected to arrive at {} by {}",
            event.route.short_name, stop_time.stop.code, eta_display
        ),
        data: serde_json::json!({
            "stop_time": stop_time,
            "route": event.route,
            "delay": event.delay,
            "eta": eta_display,
        }),
    }
}

/// Build the alert for a cancelled trip.
pub fn compose_cancellation(event: &DelayEvent) -> NotificationPayload {
    NotificationPayload {
        title: "Your Trip is Cancelled".to_string(),
        body: format!("{} has been cancelled.", event.route.long_name),
        data: serde_json::json!({
            "stop_time": null,
            "route": event.route,
            "delay": 0,
            "eta": "",
            "cancelled": true,
        }),
    }
}
