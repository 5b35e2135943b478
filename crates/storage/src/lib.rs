//! # Board Storage
//!
//! Persistence for boards, user API keys and reanimation tickets behind one
//! async contract, [`BoardServerStore`].
//!
//! ## Backends
//!
//! - [`InMemoryBoardStore`]: process-local maps, boards keyed by name
//! - [`AgentFlowBoardStore`]: one remote agent flow per board, updated in place
//! - [`IntegrationVersionBoardStore`]: append-only integration versions, the
//!   newest version of each board wins
//!
//! ## Example
//!
//! ```
//! use boardserver_storage::{BoardServerStore, InMemoryBoardStore, LoadBoardRequest};
//!
//! # tokio_test::block_on(async {
//! let store = InMemoryBoardStore::new();
//! store.create_board("alice", "demo").await.unwrap();
//! let board = store.load_board(&LoadBoardRequest::named("demo")).await.unwrap();
//! assert_eq!(board.unwrap().owner, "alice");
//! # });
//! ```

pub mod agent_flows;
pub mod backend;
pub mod config;
pub mod credentials;
pub mod error;
pub mod identity;
pub mod integration_versions;
pub mod key_lock;
pub mod memory;
pub mod remote;
pub mod store;
pub mod tickets;

pub use agent_flows::{agent_flows_server_info, AgentFlowBoardStore};
pub use backend::{open_board_store, open_board_store_from_env, SharedBoardStore};
pub use config::{BackendKind, RemoteConfig, StorageConfig};
pub use credentials::{AccessTokenSource, MetadataServerTokenSource, StaticTokenSource};
pub use error::{Result, StorageError};
pub use identity::UserRegistry;
pub use integration_versions::{latest_per_integration, BoardVersion, IntegrationVersionBoardStore};
pub use memory::{in_memory_server_info, InMemoryBoardStore};
pub use store::{BoardServerStore, LoadBoardRequest, Requester};
pub use tickets::TicketStore;

pub use boardserver_schemas::{GraphDescriptor, ReanimationState, ServerInfo, StorageBoard};
