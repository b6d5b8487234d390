use crate::chat::ChatHub;
use crate::config::PushConfig;
use crate::hub::Hub;
use crate::store::{MemoryStore, MessageStore};
use std::sync::Arc;

/// Shared application state
#[derive(Clone)]
pub struct AppState {
    pub hub: Hub,
    pub chat: ChatHub,
    pub store: Arc<dyn MessageStore>,
    pub config: Arc<PushConfig>,
}

impl AppState {
    /// Spawn the hub and wire it to `store`. Must be called inside a Tokio runtime.
    pub fn new(config: PushConfig, store: Arc<dyn MessageStore>) -> Self {
        let hub = Hub::spawn(config.hub_queue);
        let chat = ChatHub::new(hub.clone());
        Self {
            hub,
            chat,
            store,
            config: Arc::new(config),
        }
    }

    /// Default config backed by an in-memory store
    pub fn in_memory() -> Self {
        Self::new(PushConfig::default(), Arc::new(MemoryStore::new()))
    }
}
