//! Application state wiring all services together.
//!
//! Services are generic over repository, transport and broadcaster traits;
//! AppState pins them to the concrete infra implementations.

use std::sync::Arc;

use chrono::{DateTime, Utc};
use rendezvous_core::location::service::LocationService;
use rendezvous_core::message::service::MessageService;
use rendezvous_core::realtime::hub::ConnectionHub;
use rendezvous_core::realtime::session::SessionManager;
use rendezvous_core::resilience::client::ResilientClient;
use rendezvous_core::room::coordinator::RoomCoordinator;
use rendezvous_infra::http::transport::ReqwestTransport;
use rendezvous_infra::sqlite::message::SqliteMessageRepository;
use rendezvous_infra::sqlite::pool::DatabasePool;
use rendezvous_infra::sqlite::room::SqliteRoomRepository;
use rendezvous_types::config::AppConfig;

/// Concrete type aliases for the service generics pinned to infra implementations.
pub type MapClient = ResilientClient<ReqwestTransport>;

pub type ConcreteRoomCoordinator = RoomCoordinator<SqliteRoomRepository>;

pub type ConcreteMessageService = MessageService<SqliteMessageRepository>;

pub type ConcreteLocationService = LocationService<SqliteRoomRepository, MapClient>;

pub type ConcreteSessionManager =
    SessionManager<SqliteRoomRepository, SqliteMessageRepository, MapClient, ConnectionHub>;

/// Shared application state holding all services.
#[derive(Clone)]
pub struct AppState {
    pub rooms: Arc<ConcreteRoomCoordinator>,
    pub messages: Arc<ConcreteMessageService>,
    pub locations: Arc<ConcreteLocationService>,
    pub hub: Arc<ConnectionHub>,
    pub sessions: Arc<ConcreteSessionManager>,
    pub config: Arc<AppConfig>,
    pub started_at: DateTime<Utc>,
}

impl AppState {
    /// Wire services on top of an open database pool.
    pub fn new(config: AppConfig, db_pool: DatabasePool) -> anyhow::Result<Self> {
        let transport = ReqwestTransport::new(config.map_service.url.clone())?;
        let map_client = ResilientClient::from_config(transport, &config.map_service);

        let rooms = Arc::new(RoomCoordinator::new(SqliteRoomRepository::new(
            db_pool.clone(),
        )));
        let messages = Arc::new(MessageService::new(SqliteMessageRepository::new(db_pool)));
        let locations = Arc::new(LocationService::new(rooms.clone(), map_client));
        let hub = Arc::new(ConnectionHub::new(config.realtime.outbound_buffer));
        let sessions = Arc::new(SessionManager::new(
            rooms.clone(),
            messages.clone(),
            locations.clone(),
            hub.clone(),
        ));

        Ok(Self {
            rooms,
            messages,
            locations,
            hub,
            sessions,
            config: Arc::new(config),
            started_at: Utc::now(),
        })
    }

    /// Seconds since the state was built.
    pub fn uptime_secs(&self) -> i64 {
        (Utc::now() - self.started_at).num_seconds()
    }
}
