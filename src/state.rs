use std::sync::Arc;

use crate::config::ServerConfig;
use crate::core::assistant::{AssistantConnector, AssistantSlot, OpenAIConnector};
use crate::core::session::SessionManager;

/// Shared application state
pub struct AppState {
    pub config: ServerConfig,
    pub sessions: SessionManager,
}

impl AppState {
    /// Build state backed by the OpenAI Realtime API.
    pub fn new(config: ServerConfig) -> Arc<Self> {
        let connector = Arc::new(OpenAIConnector::new(
            config.realtime_settings(),
            AssistantSlot::new(),
        ));
        Self::with_connector(config, connector)
    }

    /// Build state around any assistant connector.
    pub fn with_connector(config: ServerConfig, connector: Arc<dyn AssistantConnector>) -> Arc<Self> {
        let sessions = SessionManager::new(connector, config.bridge_settings());
        Arc::new(Self { config, sessions })
    }
}
