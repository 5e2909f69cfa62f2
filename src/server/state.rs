use axum::extract::FromRef;

use crate::letters::DeliveryService;
use crate::store::ComusicStore;
use std::sync::Arc;
use std::time::Instant;

use super::ServerConfig;

pub type GuardedStore = Arc<dyn ComusicStore>;
pub type GuardedDelivery = Arc<DeliveryService>;

#[derive(Clone)]
pub struct ServerState {
    pub config: ServerConfig,
    pub start_time: Instant,
    pub store: GuardedStore,
    pub delivery: GuardedDelivery,
    pub hash: String,
}

impl FromRef<ServerState> for GuardedStore {
    fn from_ref(input: &ServerState) -> Self {
        input.store.clone()
    }
}

impl FromRef<ServerState> for GuardedDelivery {
    fn from_ref(input: &ServerState) -> Self {
        input.delivery.clone()
    }
}

impl FromRef<ServerState> for ServerConfig {
    fn from_ref(input: &ServerState) -> Self {
        input.config.clone()
    }
}
