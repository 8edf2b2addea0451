//! OnlyValidEmails API server library.
//!
//! Exposes config, state, error handling, routes, the WebSocket relay and
//! the job event emitter so the binary and the integration tests build the
//! same application.

pub mod config;
pub mod engine;
pub mod error;
pub mod handlers;
pub mod middleware;
pub mod query;
pub mod response;
pub mod router;
pub mod routes;
pub mod state;
pub mod ws;
