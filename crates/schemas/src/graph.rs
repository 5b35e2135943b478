// Graph descriptor
//
// The graph is an opaque document owned by the editor. Storage only reads the
// handful of metadata keys it mirrors to remote attributes; everything else is
// carried through untouched.

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

/// Metadata key holding the identifier of the linked agent
pub const METADATA_LINKED_AGENT_ID: &str = "noCodeAgentId";

/// Metadata key holding the resource path of the engine the linked agent lives in
pub const METADATA_LINKED_AGENT_PARENT: &str = "noCodeAgentParent";

/// Structured board graph
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct GraphDescriptor {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub title: Option<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub version: Option<String>,

    #[serde(default)]
    pub metadata: Map<String, Value>,

    #[serde(default)]
    pub nodes: Vec<Value>,

    #[serde(default)]
    pub edges: Vec<Value>,

    /// Fields this layer does not interpret (kits, graphs, assets, ...)
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

impl GraphDescriptor {
    /// The starting graph of every newly created board
    pub fn blank() -> Self {
        Self {
            title: Some("Blank board".to_string()),
            description: Some(
                "A blank board. Use it as a starting point for your creations.".to_string(),
            ),
            version: Some("0.0.1".to_string()),
            metadata: Map::new(),
            nodes: Vec::new(),
            edges: Vec::new(),
            extra: Map::new(),
        }
    }

    /// Read a string-valued metadata entry, treating empty strings as absent
    pub fn metadata_str(&self, key: &str) -> Option<&str> {
        self.metadata
            .get(key)
            .and_then(Value::as_str)
            .filter(|v| !v.is_empty())
    }

    pub fn linked_agent_id(&self) -> Option<&str> {
        self.metadata_str(METADATA_LINKED_AGENT_ID)
    }

    pub fn linked_agent_parent(&self) -> Option<&str> {
        self.metadata_str(METADATA_LINKED_AGENT_PARENT)
    }

    /// Remove the metadata entries that are mirrored to top-level remote fields
    pub fn strip_linked_agent(&mut self) {
        self.metadata.remove(METADATA_LINKED_AGENT_ID);
        self.metadata.remove(METADATA_LINKED_AGENT_PARENT);
    }
}

impl Default for GraphDescriptor {
    fn default() -> Self {
        Self::blank()
    }
}
