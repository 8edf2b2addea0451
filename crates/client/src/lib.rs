//! Client side of the OnlyValidEmails job progress relay.
//!
//! - [`RelayClient`]: opens WebSocket connections to `/api/v1/ws`.
//! - [`JobWatcher`]: keeps one connection alive, reconnecting with
//!   exponential backoff, and hands out [`Subscription`]s. Each
//!   subscription joins its job's channel on creation and leaves it on
//!   drop.
//! - [`JobView`]: the latest known state of one job.

pub mod client;
pub mod reconnect;
pub mod view;
pub mod watcher;

pub use client::{ClientError, RelayClient, RelayStream};
pub use reconnect::ReconnectConfig;
pub use view::{JobState, JobView};
pub use watcher::{JobWatcher, Subscription};
