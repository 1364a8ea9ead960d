//! Outbound push delivery.
//!
//! The dispatcher only ever talks to a [`PushTransport`]; the Firebase Cloud
//! Messaging client is the production implementation.

pub mod error;
pub mod firebase;

use async_trait::async_trait;

pub use error::PushError;
pub use firebase::FirebasePusher;

/// Capability for sending one push notification to one device.
#[async_trait]
pub trait PushTransport: Send + Sync {
    /// Send `title`/`body` to the device token `to`, with `data` attached for
    /// client-side rendering.
    async fn send(
        &self,
        to: &str,
        title: &str,
        body: &str,
        data: &serde_json::Value,
    ) -> Result<(), PushError>;
}
