// Board domain types
//
// A board is a named, owned graph plus the listing attributes shown in the
// board picker. The JSON form is camelCase because the same document is
// embedded verbatim in remote records.

use serde::{Deserialize, Serialize};

use crate::graph::GraphDescriptor;

/// File suffix carried by board names coming from the editor
pub const BOARD_NAME_SUFFIX: &str = ".bgl.json";

/// Tag that makes a board visible to every user of the in-memory store
pub const PUBLISHED_TAG: &str = "published";

/// Board as persisted by a storage backend
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct StorageBoard {
    pub name: String,
    pub owner: String,
    #[serde(default)]
    pub display_name: String,
    #[serde(default)]
    pub description: String,
    /// Order is kept but carries no meaning
    #[serde(default)]
    pub tags: Vec<String>,
    #[serde(default)]
    pub thumbnail: String,
    #[serde(default)]
    pub graph: GraphDescriptor,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub creator_email: Option<String>,
}

impl StorageBoard {
    /// A fresh board with a blank graph, as produced by `createBoard`
    pub fn new(owner: impl Into<String>, name: impl Into<String>) -> Self {
        let name = name.into();
        Self {
            display_name: name.clone(),
            name,
            owner: owner.into(),
            description: String::new(),
            tags: Vec::new(),
            thumbnail: String::new(),
            graph: GraphDescriptor::blank(),
            creator_email: None,
        }
    }

    pub fn is_published(&self) -> bool {
        self.tags.iter().any(|t| t == PUBLISHED_TAG)
    }

    /// Identity recorded as the creator on remote backends
    pub fn creator(&self) -> &str {
        self.creator_email
            .as_deref()
            .filter(|e| !e.is_empty())
            .unwrap_or(&self.owner)
    }

    /// Remote resource id for this board
    pub fn resource_id(&self) -> &str {
        board_resource_id(&self.name)
    }
}

/// Strip the editor file suffix from a board name
pub fn board_resource_id(name: &str) -> &str {
    name.strip_suffix(BOARD_NAME_SUFFIX).unwrap_or(name)
}
