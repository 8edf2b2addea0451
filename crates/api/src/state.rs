use std::sync::Arc;

use onlyvalid_db::DbPool;
use onlyvalid_events::{ChannelRegistry, EventBus};

use crate::config::ServerConfig;
use crate::engine::JobEmitter;
use crate::ws::{ConnId, WsManager};

/// Shared application state available to all Axum handlers via `State<AppState>`.
///
/// Cheaply cloneable: everything is behind `Arc` or already `Clone`.
#[derive(Clone)]
pub struct AppState {
    pub pool: DbPool,
    pub config: Arc<ServerConfig>,
    /// Open WebSocket connections and their outbound queues.
    pub ws_manager: Arc<WsManager>,
    /// Job channel memberships of WebSocket connections.
    pub registry: Arc<ChannelRegistry<ConnId>>,
    /// In-process bus feeding persistence and webhooks.
    pub event_bus: Arc<EventBus>,
    pub emitter: Arc<JobEmitter>,
}

impl AppState {
    /// Wire up a fresh relay (connections, registry, bus, emitter) around
    /// `pool`.
    pub fn new(pool: DbPool, config: ServerConfig) -> Self {
        let ws_manager = Arc::new(WsManager::new());
        let registry = Arc::new(ChannelRegistry::new());
        let event_bus = Arc::new(EventBus::default());
        let emitter = Arc::new(JobEmitter::new(
            Arc::clone(&registry),
            Arc::clone(&ws_manager),
            Arc::clone(&event_bus),
        ));

        Self {
            pool,
            config: Arc::new(config),
            ws_manager,
            registry,
            event_bus,
            emitter,
        }
    }
}
