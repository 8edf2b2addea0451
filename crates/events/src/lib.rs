//! Job event distribution for OnlyValidEmails.
//!
//! - [`ChannelRegistry`]: per-job subscriber rooms used by the WebSocket
//!   relay.
//! - [`EventBus`]: in-process broadcast of every emitted [`JobEvent`] to
//!   secondary consumers.
//! - [`JobPersistence`]: mirrors job snapshots into `verification_jobs`.
//! - [`JobNotifier`] and [`WebhookDelivery`]: signed completion webhooks.
//!
//! [`JobEvent`]: onlyvalid_core::job_events::JobEvent

pub mod bus;
pub mod delivery;
pub mod notifier;
pub mod persistence;
pub mod registry;

pub use bus::EventBus;
pub use delivery::webhook::{WebhookDelivery, WebhookError};
pub use notifier::JobNotifier;
pub use persistence::JobPersistence;
pub use registry::ChannelRegistry;
