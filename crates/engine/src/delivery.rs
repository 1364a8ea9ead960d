//! Delivery multiplexer: routes a composed notification to each of a
//! subscription's notification methods by channel kind.
//!
//! Push goes to the push transport. Text and email are accepted kinds with no
//! delivery behind them yet; they are logged and counted. The first failure
//! stops delivery for the remaining methods of that subscription only.

use std::sync::Arc;

use thiserror::Error;
use uuid::Uuid;

use delay_common::error::AppError;
use delay_common::types::{MethodKind, NotificationPayload, Subscription};
use delay_notifier::{PushError, PushTransport};

use crate::store::NotificationMethodStore;

#[derive(Debug, Error)]
pub enum DeliveryError {
    #[error("Failed to load notification method {method_id}: {source}")]
    Lookup {
        method_id: Uuid,
        #[source]
        source: AppError,
    },
}

/// What happened while delivering to one subscription's methods.
#[derive(Debug, Default)]
pub struct DeliveryReport {
    /// Push sends accepted by the transport
    pub pushed: usize,
    /// Text/email methods passed over
    pub unsupported: usize,
    /// Push failure that stopped the remaining methods, if any
    pub push_failure: Option<PushError>,
}

impl DeliveryReport {
    pub fn is_complete(&self) -> bool {
        self.push_failure.is_none()
    }
}

pub struct DeliveryMultiplexer {
    methods: Arc<dyn NotificationMethodStore>,
    push: Arc<dyn PushTransport>,
}

impl DeliveryMultiplexer {
    pub fn new(methods: Arc<dyn NotificationMethodStore>, push: Arc<dyn PushTransport>) -> Self {
        Self { methods, push }
    }

    /// Deliver `payload` to every method of `subscription`, in order.
    ///
    /// A method lookup failure is returned as an error. A push failure ends
    /// the loop but still yields a report, since delivery was attempted.
    pub async fn deliver(
        &self,
        subscription: &Subscription,
        payload: &NotificationPayload,
    ) -> Result<DeliveryReport, DeliveryError> {
        let mut report = DeliveryReport::default();

        for &method_id in &subscription.notification_ids {
            let method = self
                .methods
                .get(method_id)
                .await
                .map_err(|source| DeliveryError::Lookup { method_id, source })?;

            match method.kind {
                MethodKind::Push => {
                    if let Err(e) = self
                        .push
                        .send(&method.value, &payload.title, &payload.body, &payload.data)
                        .await
                    {
                        if e.is_credential_failure() {
                            tracing::error!(
                                error = %e,
                                "Push provider rejected the server key; check FIREBASE_KEY"
                            );
                        }
                        tracing::warn!(
                            subscription_id = %subscription.id,
                            method_id = %method_id,
                            error = %e,
                            "Push delivery failed, skipping remaining methods"
                        );
                        report.push_failure = Some(e);
                        break;
                    }
                    report.pushed += 1;
                }
                MethodKind::Txt | MethodKind::Email => {
                    tracing::info!(
                        subscription_id = %subscription.id,
                        method_id = %method_id,
                        kind = %method.kind,
                        title = %payload.title,
                        "No delivery channel for notification method kind"
                    );
                    report.unsupported += 1;
                }
            }
        }

        Ok(report)
    }
}
