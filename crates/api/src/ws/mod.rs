//! WebSocket relay for job progress.
//!
//! Provides connection management, heartbeat pings, and the upgrade
//! handler that dispatches `join-job` / `leave-job` control messages to the
//! channel registry.

mod handler;
mod heartbeat;
pub mod manager;

pub use handler::ws_handler;
pub use heartbeat::start_heartbeat;
pub use manager::{ConnId, WsManager};
