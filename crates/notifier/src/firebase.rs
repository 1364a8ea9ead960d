//! Firebase Cloud Messaging (legacy HTTP API) push transport.

use std::time::Duration;

use async_trait::async_trait;
use reqwest::StatusCode;
use serde::Serialize;

use delay_common::config::AppConfig;

use crate::{PushError, PushTransport};

pub const FIREBASE_URL: &str = "https://fcm.googleapis.com/fcm/send";

/// How long FCM keeps an undelivered alert, in seconds. Delay alerts go stale fast.
const TIME_TO_LIVE_SECS: u32 = 150;

#[derive(Debug, Serialize)]
struct FcmNotification<'a> {
    title: &'a str,
    body: &'a str,
    sound: &'a str,
}

#[derive(Debug, Serialize)]
struct FcmRequest<'a> {
    to: &'a str,
    notification: FcmNotification<'a>,
    time_to_live: u32,
    data: &'a serde_json::Value,
    dry_run: bool,
}

/// Push transport backed by FCM.
pub struct FirebasePusher {
    client: reqwest::Client,
    server_key: String,
    endpoint: String,
    dry_run: bool,
}

impl FirebasePusher {
    pub fn new(
        server_key: impl Into<String>,
        timeout: Duration,
        dry_run: bool,
    ) -> Result<Self, PushError> {
        let client = reqwest::Client::builder().timeout(timeout).build()?;

        Ok(Self {
            client,
            server_key: server_key.into(),
            endpoint: FIREBASE_URL.to_string(),
            dry_run,
        })
    }

    pub fn from_config(config: &AppConfig) -> Result<Self, PushError> {
        if config.firebase_key.is_empty() {
            tracing::warn!("FIREBASE_KEY is not set; push notifications will be rejected");
        }

        Self::new(
            config.firebase_key.clone(),
            Duration::from_secs(config.push_timeout_secs),
            config.push_dry_run,
        )
    }

    /// Point the client at a different FCM-compatible endpoint.
    pub fn with_endpoint(mut self, endpoint: impl Into<String>) -> Self {
        self.endpoint = endpoint.into();
        self
    }

    fn build_request<'a>(
        &self,
        to: &'a str,
        title: &'a str,
        body: &'a str,
        data: &'a serde_json::Value,
    ) -> FcmRequest<'a> {
        FcmRequest {
            to,
            notification: FcmNotification {
                title,
                body,
                sound: "default",
            },
            time_to_live: TIME_TO_LIVE_SECS,
            data,
            dry_run: self.dry_run,
        }
    }
}

#[async_trait]
impl PushTransport for FirebasePusher {
    async fn send(
        &self,
        to: &str,
        title: &str,
        body: &str,
        data: &serde_json::Value,
    ) -> Result<(), PushError> {
        let request = self.build_request(to, title, body, data);

        let response = self
            .client
            .post(&self.endpoint)
            .header("Authorization", format!("key={}", self.server_key))
            .json(&request)
            .send()
            .await?;

        classify_status(response.status())
    }
}

/// Map an FCM response status onto the push error taxonomy.
///
/// Statuses outside 400, 401 and 5xx count as delivered.
fn classify_status(status: StatusCode) -> Result<(), PushError> {
    match status.as_u16() {
        400 => Err(PushError::InvalidPayload),
        401 => Err(PushError::InvalidCredentials),
        code @ 500..=599 => Err(PushError::Server(code)),
        _ => Ok(()),
    }
}
