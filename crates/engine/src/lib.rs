//! Delay notification engine.
//!
//! Consumes delay events from a queue, works out which subscriptions are
//! affected and delivers alerts through each subscriber's notification
//! methods.

pub mod cancellation;
pub mod clock;
pub mod composer;
pub mod delivery;
pub mod dispatcher;
pub mod eligibility;
pub mod memory;
pub mod method;
pub mod processor;
pub mod queue;
pub mod recency;
pub mod store;
pub mod subscription;
pub mod tracker;
pub mod window;

pub use dispatcher::{DispatchStats, Dispatcher};
pub use processor::{Outcome, Pipeline};
