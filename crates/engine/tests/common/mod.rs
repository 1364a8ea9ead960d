//! Shared fixtures for the engine integration tests.

#![allow(dead_code)]

use std::collections::{HashSet, VecDeque};
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use chrono::{DateTime, TimeDelta, TimeZone, Utc, Weekday};
use parking_lot::Mutex;
use tokio::sync::Notify;
use uuid::Uuid;

use delay_common::error::AppError;
use delay_common::types::{
    Day, DelayEvent, MethodKind, NotificationMethod, Route, Stop, StopTime, Subscription, Trip,
    WeekdayFlags,
};
use delay_engine::clock::Clock;
use delay_engine::memory::{InMemoryMethodStore, InMemorySubscriptionStore, ManualClock};
use delay_engine::processor::Pipeline;
use delay_engine::queue::{Delivery, EventSource};
use delay_engine::recency::CooldownWindow;
use delay_notifier::{PushError, PushTransport};

pub const TRIP_ID: &str = "trip-1";

/// One push handed to the transport.
#[derive(Debug, Clone, PartialEq)]
pub struct SentPush {
    pub to: String,
    pub title: String,
    pub body: String,
    pub data: serde_json::Value,
}

/// Push transport that records every send.
#[derive(Default)]
pub struct RecordingPush {
    attempts: Mutex<Vec<SentPush>>,
    rejected_tokens: Mutex<HashSet<String>>,
    latency: Option<Duration>,
    started: Notify,
}

impl RecordingPush {
    pub fn new() -> Self {
        Self::default()
    }

    /// Every send sleeps for `latency` before returning.
    pub fn slow(latency: Duration) -> Self {
        Self {
            latency: Some(latency),
            ..Self::default()
        }
    }

    /// Sends to `token` fail with `InvalidCredentials`.
    pub fn reject(&self, token: &str) {
        self.rejected_tokens.lock().insert(token.to_string());
    }

    pub fn attempts(&self) -> Vec<SentPush> {
        self.attempts.lock().clone()
    }

    pub fn attempted_tokens(&self) -> HashSet<String> {
        self.attempts.lock().iter().map(|p| p.to.clone()).collect()
    }

    /// Resolves once at least one send has started.
    pub async fn wait_started(&self) {
        self.started.notified().await;
    }
}

#[async_trait]
impl PushTransport for RecordingPush {
    async fn send(
        &self,
        to: &str,
        title: &str,
        body: &str,
        data: &serde_json::Value,
    ) -> Result<(), PushError> {
        self.attempts.lock().push(SentPush {
            to: to.to_string(),
            title: title.to_string(),
            body: body.to_string(),
            data: data.clone(),
        });
        self.started.notify_one();

        if let Some(latency) = self.latency {
            tokio::time::sleep(latency).await;
        }

        if self.rejected_tokens.lock().contains(to) {
            return Err(PushError::InvalidCredentials);
        }
        Ok(())
    }
}

/// In-memory collaborators wired around one manual clock.
pub struct Harness {
    pub clock: Arc<ManualClock>,
    pub subscriptions: Arc<InMemorySubscriptionStore>,
    pub methods: Arc<InMemoryMethodStore>,
    pub push: Arc<RecordingPush>,
}

impl Harness {
    pub fn new() -> Self {
        Self::with_push(RecordingPush::new())
    }

    pub fn with_push(push: RecordingPush) -> Self {
        // A Wednesday morning.
        let clock = Arc::new(ManualClock::new(
            Utc.with_ymd_and_hms(2026, 10, 14, 7, 30, 0).unwrap(),
        ));
        let subscriptions = Arc::new(InMemorySubscriptionStore::new(
            clock.clone(),
            CooldownWindow::default(),
        ));

        Self {
            clock,
            subscriptions,
            methods: Arc::new(InMemoryMethodStore::new()),
            push: Arc::new(push),
        }
    }

    pub fn pipeline(&self) -> Pipeline {
        Pipeline::new(
            self.subscriptions.clone(),
            self.methods.clone(),
            self.push.clone(),
            self.clock.clone(),
        )
    }

    pub fn now(&self) -> DateTime<Utc> {
        self.clock.now()
    }

    pub fn today(&self) -> Weekday {
        self.clock.today()
    }

    /// Register a push method for `token` and return its id.
    pub fn push_method(&self, token: &str) -> Uuid {
        self.method(MethodKind::Push, token)
    }

    pub fn method(&self, kind: MethodKind, value: &str) -> Uuid {
        let id = Uuid::new_v4();
        self.methods.insert(NotificationMethod {
            id,
            user_id: Uuid::new_v4(),
            kind,
            name: format!("{} {}", kind, value),
            value: value.to_string(),
            created_at: self.now(),
        });
        id
    }

    /// Insert a subscription and return it.
    pub fn subscribe(
        &self,
        stop_time_id: &str,
        notification_ids: Vec<Uuid>,
        days: WeekdayFlags,
    ) -> Subscription {
        let subscription = Subscription {
            id: Uuid::new_v4(),
            trip_id: TRIP_ID.to_string(),
            stop_time_id: stop_time_id.to_string(),
            user_id: Uuid::new_v4(),
            archived: false,
            created_at: self.now(),
            days,
            notification_ids,
        };
        self.subscriptions.insert(subscription.clone());
        subscription
    }

    /// Subscription to `stop_time_id` with one push method for `token`, every day.
    pub fn subscribe_push(&self, stop_time_id: &str, token: &str) -> Subscription {
        let method = self.push_method(token);
        self.subscribe(stop_time_id, vec![method], WeekdayFlags::every_day())
    }

    pub fn notified_ago(&self, subscription: &Subscription, ago: TimeDelta) {
        self.subscriptions
            .record_notified_at(subscription.id, self.now() - ago);
    }
}

/// Flags with every day on except `weekday`.
pub fn every_day_except(weekday: Weekday) -> WeekdayFlags {
    let skipped = Day::from(weekday);
    let days: Vec<Day> = [
        Day::Mon,
        Day::Tue,
        Day::Wed,
        Day::Thu,
        Day::Fri,
        Day::Sat,
        Day::Sun,
    ]
    .into_iter()
    .filter(|d| *d != skipped)
    .collect();
    WeekdayFlags::from_days(&days)
}

pub fn stop_id(index: usize) -> String {
    format!("st-{}", index)
}

/// A trip with `stops` stop times `st-0..`, two minutes apart from 08:00 +13:00.
pub fn stop_times(stops: usize) -> Vec<StopTime> {
    let start = DateTime::parse_from_rfc3339("2026-10-14T08:00:00+13:00").unwrap();
    (0..stops)
        .map(|i| {
            let arrival = start + TimeDelta::minutes(2 * i as i64);
            StopTime {
                id: stop_id(i),
                trip_id: TRIP_ID.to_string(),
                arrival,
                departure: arrival + TimeDelta::seconds(30),
                stop_sequence: i as i32 + 1,
                stop: Stop {
                    id: format!("stop-{}", i),
                    code: format!("{}", 7000 + i),
                    name: format!("Stop {}", i),
                    lat: -36.85,
                    lon: 174.76,
                },
            }
        })
        .collect()
}

pub fn delay_event(stoptime_id: &str, delay: i64, stops: usize) -> DelayEvent {
    DelayEvent {
        cancelled: false,
        trip_id: TRIP_ID.to_string(),
        stoptime_id: stoptime_id.to_string(),
        delay,
        lat: -36.85,
        lon: 174.76,
        route: Route {
            id: "route-1".to_string(),
            gtfs_id: "NX1-203".to_string(),
            agency_id: "AT".to_string(),
            short_name: "NX1".to_string(),
            long_name: "Hibiscus Coast to Britomart".to_string(),
        },
        trip: Trip {
            id: TRIP_ID.to_string(),
            route_id: "route-1".to_string(),
            service_id: "weekday".to_string(),
            gtfs_id: "1203-40101".to_string(),
            headsign: "Britomart".to_string(),
        },
        stop_times: stop_times(stops),
    }
}

pub fn cancellation_event(stops: usize) -> DelayEvent {
    DelayEvent {
        cancelled: true,
        delay: 0,
        ..delay_event(&stop_id(0), 0, stops)
    }
}

pub fn encode(event: &DelayEvent) -> Vec<u8> {
    serde_json::to_vec(event).unwrap()
}

pub fn tokens(list: &[&str]) -> HashSet<String> {
    list.iter().map(|t| t.to_string()).collect()
}

/// One scripted `receive` result.
pub enum Step {
    /// Fail with a connection error.
    Fail,
    Deliver(Vec<u8>),
}

/// [`EventSource`] that replays a fixed script, optionally refusing every ack.
pub struct ScriptedSource {
    steps: VecDeque<Step>,
    next_tag: u64,
    reject_acks: bool,
    /// After the script, wait forever instead of reporting the source closed.
    hold_open: bool,
    failed: Arc<Notify>,
}

impl ScriptedSource {
    pub fn new(steps: Vec<Step>) -> Self {
        Self {
            steps: steps.into(),
            next_tag: 0,
            reject_acks: false,
            hold_open: false,
            failed: Arc::new(Notify::new()),
        }
    }

    pub fn rejecting_acks(mut self) -> Self {
        self.reject_acks = true;
        self
    }

    pub fn held_open(mut self) -> Self {
        self.hold_open = true;
        self
    }

    /// Signalled each time a scripted receive error is returned.
    pub fn failures(&self) -> Arc<Notify> {
        Arc::clone(&self.failed)
    }
}

fn connection_reset() -> AppError {
    AppError::Redis(redis::RedisError::from((
        redis::ErrorKind::IoError,
        "connection reset",
    )))
}

#[async_trait]
impl EventSource for ScriptedSource {
    async fn receive(&mut self) -> Result<Option<Delivery>, AppError> {
        match self.steps.pop_front() {
            Some(Step::Fail) => {
                self.failed.notify_one();
                Err(connection_reset())
            }
            Some(Step::Deliver(body)) => {
                self.next_tag += 1;
                Ok(Some(Delivery {
                    tag: self.next_tag,
                    body,
                }))
            }
            None if self.hold_open => std::future::pending().await,
            None => Ok(None),
        }
    }

    async fn ack(&mut self, _delivery: &Delivery) -> Result<(), AppError> {
        if self.reject_acks {
            return Err(connection_reset());
        }
        Ok(())
    }

    async fn close(&mut self) {}
}
