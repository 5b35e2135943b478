// Board Server Schemas
//
// Decision: This crate is the source of truth for the board data model
// Decision: Minimal dependencies - only serde and serde_json
// Decision: Graphs stay opaque; only metadata keys used by storage are named here

pub mod board;
pub mod graph;
pub mod reanimation;
pub mod server_info;

// Board types
pub use board::{board_resource_id, StorageBoard, BOARD_NAME_SUFFIX, PUBLISHED_TAG};

// Graph types
pub use graph::{GraphDescriptor, METADATA_LINKED_AGENT_ID, METADATA_LINKED_AGENT_PARENT};

// Execution snapshot
pub use reanimation::ReanimationState;

// Server descriptor
pub use server_info::ServerInfo;
