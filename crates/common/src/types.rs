use chrono::{DateTime, FixedOffset, Utc, Weekday};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::error::AppError;

/// Delivery channel of a notification method.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, sqlx::Type)]
#[sqlx(type_name = "text", rename_all = "lowercase")]
#[serde(rename_all = "lowercase")]
pub enum MethodKind {
    Push,
    Txt,
    Email,
}

impl std::fmt::Display for MethodKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            MethodKind::Push => write!(f, "push"),
            MethodKind::Txt => write!(f, "txt"),
            MethodKind::Email => write!(f, "email"),
        }
    }
}

/// Three-letter day code used when creating subscriptions.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Day {
    Mon,
    Tue,
    Wed,
    #[serde(alias = "Thur")]
    Thu,
    Fri,
    Sat,
    Sun,
}

impl Day {
    pub fn as_str(&self) -> &'static str {
        match self {
            Day::Mon => "Mon",
            Day::Tue => "Tue",
            Day::Wed => "Wed",
            Day::Thu => "Thu",
            Day::Fri => "Fri",
            Day::Sat => "Sat",
            Day::Sun => "Sun",
        }
    }
}

impl std::fmt::Display for Day {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

impl std::str::FromStr for Day {
    type Err = AppError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "Mon" => Ok(Day::Mon),
            "Tue" => Ok(Day::Tue),
            "Wed" => Ok(Day::Wed),
            "Thu" | "Thur" => Ok(Day::Thu),
            "Fri" => Ok(Day::Fri),
            "Sat" => Ok(Day::Sat),
            "Sun" => Ok(Day::Sun),
            other => Err(AppError::Validation(format!(
                "Invalid day code '{}'. Valid codes: Mon, Tue, Wed, Thu, Fri, Sat, Sun",
                other
            ))),
        }
    }
}

impl From<Weekday> for Day {
    fn from(weekday: Weekday) -> Self {
        match weekday {
            Weekday::Mon => Day::Mon,
            Weekday::Tue => Day::Tue,
            Weekday::Wed => Day::Wed,
            Weekday::Thu => Day::Thu,
            Weekday::Fri => Day::Fri,
            Weekday::Sat => Day::Sat,
            Weekday::Sun => Day::Sun,
        }
    }
}

/// The seven per-subscription weekday opt-in flags.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize, sqlx::FromRow)]
pub struct WeekdayFlags {
    pub monday: bool,
    pub tuesday: bool,
    pub wednesday: bool,
    pub thursday: bool,
    pub friday: bool,
    pub saturday: bool,
    pub sunday: bool,
}

impl WeekdayFlags {
    /// Build flags from a list of day codes; days not listed stay off.
    pub fn from_days(days: &[Day]) -> Self {
        let mut flags = Self::default();
        for day in days {
            match day {
                Day::Mon => flags.monday = true,
                Day::Tue => flags.tuesday = true,
                Day::Wed => flags.wednesday = true,
                Day::Thu => flags.thursday = true,
                Day::Fri => flags.friday = true,
                Day::Sat => flags.saturday = true,
                Day::Sun => flags.sunday = true,
            }
        }
        flags
    }

    pub fn every_day() -> Self {
        Self {
            monday: true,
            tuesday: true,
            wednesday: true,
            thursday: true,
            friday: true,
            saturday: true,
            sunday: true,
        }
    }
}

/// A transit route, denormalised into each delay event by the collector.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Route {
    #[serde(alias = "ID", default)]
    pub id: String,
    #[serde(alias = "GTFSID", default)]
    pub gtfs_id: String,
    #[serde(alias = "AgencyID", default)]
    pub agency_id: String,
    #[serde(alias = "ShortName", default)]
    pub short_name: String,
    #[serde(alias = "LongName", default)]
    pub long_name: String,
}

/// A scheduled trip along a route.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Trip {
    #[serde(alias = "ID", default)]
    pub id: String,
    #[serde(alias = "RouteID", default)]
    pub route_id: String,
    #[serde(alias = "ServiceID", default)]
    pub service_id: String,
    #[serde(alias = "GTFSID", default)]
    pub gtfs_id: String,
    #[serde(alias = "Headsign", default)]
    pub headsign: String,
}

/// A physical stop.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Stop {
    #[serde(alias = "ID", default)]
    pub id: String,
    #[serde(alias = "Code", default)]
    pub code: String,
    #[serde(alias = "Name", default)]
    pub name: String,
    #[serde(alias = "Lat", default)]
    pub lat: f64,
    #[serde(alias = "Lon", default)]
    pub lon: f64,
}

/// A trip's scheduled visit to a stop.
///
/// Arrival and departure keep the offset they were published with so that
/// rider-facing times render in the agency's local time.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StopTime {
    #[serde(alias = "ID")]
    pub id: String,
    #[serde(alias = "TripID", default)]
    pub trip_id: String,
    #[serde(alias = "Arrival")]
    pub arrival: DateTime<FixedOffset>,
    #[serde(alias = "Departure")]
    pub departure: DateTime<FixedOffset>,
    #[serde(alias = "StopSequence", default)]
    pub stop_sequence: i32,
    #[serde(alias = "StopInfo", alias = "stop_info", default)]
    pub stop: Stop,
}

/// A real-time delay or cancellation observed by the collector.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DelayEvent {
    #[serde(alias = "Cancelled")]
    pub cancelled: bool,
    #[serde(alias = "TripID")]
    pub trip_id: String,
    #[serde(alias = "StopTimeID", alias = "stop_time_id")]
    pub stoptime_id: String,
    /// Signed delay in seconds; negative values mean the service is early.
    #[serde(alias = "Delay")]
    pub delay: i64,
    #[serde(alias = "Lat", default)]
    pub lat: f64,
    #[serde(alias = "Lon", default)]
    pub lon: f64,
    #[serde(alias = "Route", default)]
    pub route: Route,
    #[serde(alias = "Trip", default)]
    pub trip: Trip,
    #[serde(alias = "StopTimes", default)]
    pub stop_times: Vec<StopTime>,
}

impl DelayEvent {
    /// Decode a queue message body.
    pub fn from_slice(body: &[u8]) -> Result<Self, AppError> {
        Ok(serde_json::from_slice(body)?)
    }
}

/// A rider's alert subscription for one stop time of one trip.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, sqlx::FromRow)]
pub struct Subscription {
    pub id: Uuid,
    pub trip_id: String,
    pub stop_time_id: String,
    pub user_id: Uuid,
    pub archived: bool,
    pub created_at: DateTime<Utc>,
    #[sqlx(flatten)]
    #[serde(flatten)]
    pub days: WeekdayFlags,
    /// Linked notification methods, in the order they were attached.
    pub notification_ids: Vec<Uuid>,
}

/// A user's registered way of being notified.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, sqlx::FromRow)]
pub struct NotificationMethod {
    pub id: Uuid,
    pub user_id: Uuid,
    pub kind: MethodKind,
    pub name: String,
    /// Device token, phone number or email address depending on `kind`.
    pub value: String,
    pub created_at: DateTime<Utc>,
}

/// Append-only record of a subscription having been notified.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, sqlx::FromRow)]
pub struct NotificationEvent {
    pub id: Uuid,
    pub subscription_id: Uuid,
    pub created_at: DateTime<Utc>,
}

/// Rider-facing notification ready for delivery.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct NotificationPayload {
    pub title: String,
    pub body: String,
    /// Structured data for client-side rendering
    pub data: serde_json::Value,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_decode_snake_case_event() {
        let body = br#"{
            "cancelled": false,
            "trip_id": "trip-1",
            "stoptime_id": "st-2",
            "delay": -90,
            "lat": -36.84,
            "lon": 174.76,
            "route": {"id": "r1", "short_name": "120", "long_name": "Akoranga to Henderson"},
            "trip": {"id": "trip-1", "headsign": "Henderson"},
            "stop_times": [{
                "id": "st-2",
                "trip_id": "trip-1",
                "arrival": "2026-10-14T08:30:00+13:00",
                "departure": "2026-10-14T08:31:00+13:00",
                "stop_sequence": 2,
                "stop": {"id": "s9", "code": "8011", "name": "Queen St", "lat": -36.8, "lon": 174.7}
            }]
        }"#;

        let event = DelayEvent::from_slice(body).unwrap();
        assert!(!event.cancelled);
        assert_eq!(event.delay, -90);
        assert_eq!(event.route.short_name, "120");
        assert_eq!(event.stop_times.len(), 1);
        assert_eq!(event.stop_times[0].stop.code, "8011");
        assert_eq!(event.stop_times[0].arrival.offset().local_minus_utc(), 13 * 3600);
    }

    #[test]
    fn test_decode_collector_field_names() {
        let body = br#"{
            "Cancelled": true,
            "TripID": "trip-7",
            "StopTimeID": "",
            "Delay": 0,
            "Route": {"ID": "r1", "GTFSID": "g", "AgencyID": "a", "ShortName": "NX1", "LongName": "Northern Express"},
            "StopTimes": [{
                "ID": "st-1",
                "TripID": "trip-7",
                "Arrival": "2026-10-14T08:30:00Z",
                "Departure": "2026-10-14T08:30:00Z",
                "StopSequence": 1,
                "StopInfo": {"ID": "s1", "Code": "1001", "Name": "Britomart", "Lat": 0.0, "Lon": 0.0}
            }]
        }"#;

        let event = DelayEvent::from_slice(body).unwrap();
        assert!(event.cancelled);
        assert_eq!(event.trip_id, "trip-7");
        assert_eq!(event.route.long_name, "Northern Express");
        assert_eq!(event.stop_times[0].stop.name, "Britomart");
        assert_eq!(event.lat, 0.0);
    }

    #[test]
    fn test_decode_tolerates_missing_nested_ids() {
        let body = br#"{
            "cancelled": false,
            "trip_id": "trip-1",
            "stoptime_id": "st-1",
            "delay": 60,
            "route": {"short_name": "70", "long_name": "Botany to Britomart"},
            "trip": {"headsign": "Britomart"},
            "stop_times": [{
                "id": "st-1",
                "arrival": "2026-10-14T08:30:00+13:00",
                "departure": "2026-10-14T08:30:00+13:00",
                "stop": {"code": "200"}
            }]
        }"#;

        let event = DelayEvent::from_slice(body).unwrap();
        assert_eq!(event.route.id, "");
        assert_eq!(event.route.short_name, "70");
        assert_eq!(event.trip.id, "");
        assert_eq!(event.stop_times[0].stop.id, "");
        assert_eq!(event.stop_times[0].stop.code, "200");
    }

    #[test]
    fn test_decode_rejects_missing_trip() {
        let err = DelayEvent::from_slice(br#"{"cancelled": false}"#).unwrap_err();
        assert!(err.is_malformed_input());
        assert!(DelayEvent::from_slice(b"not json").is_err());
    }

    #[test]
    fn test_day_codes() {
        assert_eq!("Thur".parse::<Day>().unwrap(), Day::Thu);
        assert_eq!("Sun".parse::<Day>().unwrap(), Day::Sun);
        assert!("Funday".parse::<Day>().is_err());
        assert_eq!(Day::from(Weekday::Wed).as_str(), "Wed");
    }

    #[test]
    fn test_flags_from_days() {
        let flags = WeekdayFlags::from_days(&[Day::Mon, Day::Thu]);
        assert!(flags.monday);
        assert!(flags.thursday);
        assert!(!flags.tuesday);
        assert!(!flags.sunday);
        assert_eq!(WeekdayFlags::from_days(&[]), WeekdayFlags::default());
    }
}
