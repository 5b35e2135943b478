// Storage backend selection
// Decision: Callers hold an Arc<dyn BoardServerStore>; the concrete backend is chosen once here
//
// No caller branches on the concrete store type. Backend-specific behavior
// (e.g. listing by email instead of user id) lives inside each store.

use anyhow::Context;
use std::sync::Arc;

use crate::agent_flows::AgentFlowBoardStore;
use crate::config::{BackendKind, StorageConfig};
use crate::credentials::{AccessTokenSource, MetadataServerTokenSource, StaticTokenSource};
use crate::integration_versions::IntegrationVersionBoardStore;
use crate::memory::InMemoryBoardStore;
use crate::store::BoardServerStore;

/// Shared handle to the configured board store
pub type SharedBoardStore = Arc<dyn BoardServerStore>;

/// Build the board store described by `config`
pub fn open_board_store(config: &StorageConfig) -> anyhow::Result<SharedBoardStore> {
    let store: SharedBoardStore = match config.backend {
        BackendKind::InMemory => Arc::new(InMemoryBoardStore::new()),
        BackendKind::AgentFlows => {
            let remote = config
                .remote
                .clone()
                .context("agent_flows storage needs remote configuration")?;
            Arc::new(AgentFlowBoardStore::new(remote, token_source(config)))
        }
        BackendKind::IntegrationVersions => {
            let remote = config
                .remote
                .clone()
                .context("integration_versions storage needs remote configuration")?;
            Arc::new(IntegrationVersionBoardStore::new(remote, token_source(config)))
        }
    };
    tracing::info!(backend = %config.backend, "Opened board store");
    Ok(store)
}

/// Build the board store described by the environment
pub fn open_board_store_from_env() -> anyhow::Result<SharedBoardStore> {
    open_board_store(&StorageConfig::from_env()?)
}

fn token_source(config: &StorageConfig) -> Arc<dyn AccessTokenSource> {
    match &config.access_token {
        Some(token) => Arc::new(StaticTokenSource::new(token.clone())),
        None => Arc::new(MetadataServerTokenSource::new()),
    }
}
