//! Plumbing shared by the remote backends
//!
//! - [`RemoteClient`] for authenticated JSON calls
//! - board content encoding: remote records embed the board as a JSON
//!   *string*, so the envelope encoder escapes an already-serialized board
//! - shallow merge of a caller's board over a persisted one
//! - resource path parsing

mod client;

pub use client::RemoteClient;

use boardserver_schemas::StorageBoard;
use regex::Regex;
use serde_json::Value;
use std::sync::OnceLock;

use crate::error::{Result, StorageError};

/// Serialize a board for the `flowConfig` field of a remote record
///
/// The result is itself placed in a JSON envelope as a string, which yields
/// the double encoding the remote API expects.
pub fn encode_board(board: &StorageBoard) -> Result<String> {
    Ok(serde_json::to_string(board)?)
}

/// Parse the embedded board of a remote record
pub fn decode_board(flow_config: Option<&str>, record: &str) -> Result<StorageBoard> {
    let raw = flow_config
        .filter(|c| !c.is_empty())
        .ok_or_else(|| StorageError::invalid_data(format!("{record} has no board content")))?;
    serde_json::from_str(raw)
        .map_err(|e| StorageError::invalid_data(format!("{record} has malformed board: {e}")))
}

/// Overlay the caller's top-level fields on the persisted board
///
/// Caller wins on every field it carries; optional fields it leaves out keep
/// their persisted value.
pub fn merge_boards(existing: &StorageBoard, incoming: &StorageBoard) -> Result<StorageBoard> {
    let mut merged = serde_json::to_value(existing)?;
    if let (Value::Object(base), Value::Object(overlay)) =
        (&mut merged, serde_json::to_value(incoming)?)
    {
        for (key, value) in overlay {
            base.insert(key, value);
        }
    }
    Ok(serde_json::from_value(merged)?)
}

/// Collection and engine named by an engine resource path
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EngineRef {
    pub project: String,
    pub location: String,
    pub collection: String,
    pub engine: String,
}

impl EngineRef {
    /// Parse `projects/{p}/locations/{l}/collections/{c}/engines/{e}`
    pub fn parse(path: &str) -> Result<Self> {
        static PATTERN: OnceLock<Regex> = OnceLock::new();
        let pattern = PATTERN.get_or_init(|| {
            Regex::new(r"^projects/([^/]+)/locations/([^/]+)/collections/([^/]+)/engines/([^/]+)$")
                .expect("engine path pattern is valid")
        });

        let caps = pattern.captures(path).ok_or_else(|| {
            StorageError::invalid_request(format!("invalid resource path format: {path}"))
        })?;
        Ok(Self {
            project: caps[1].to_string(),
            location: caps[2].to_string(),
            collection: caps[3].to_string(),
            engine: caps[4].to_string(),
        })
    }
}

/// Segment following `/{collection}/` in a resource name
///
/// `segment_after("a/agentFlows/xyz", "agentFlows") == Some("xyz")`
pub fn segment_after<'a>(resource_name: &'a str, collection: &str) -> Option<&'a str> {
    let marker = format!("/{collection}/");
    let start = resource_name.rfind(&marker)? + marker.len();
    resource_name[start..]
        .split('/')
        .next()
        .filter(|s| !s.is_empty())
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_board_content_is_double_encoded_in_envelope() {
        let board = StorageBoard::new("alice", "demo");
        let envelope = json!({ "flowConfig": encode_board(&board).unwrap() });
        let wire = serde_json::to_string(&envelope).unwrap();

        assert!(wire.contains(r#""flowConfig":"{\"name\":\"demo\""#));

        let parsed: Value = serde_json::from_str(&wire).unwrap();
        let decoded = decode_board(parsed["flowConfig"].as_str(), "record").unwrap();
        assert_eq!(decoded, board);
    }

    #[test]
    fn test_decode_rejects_missing_or_malformed_content() {
        assert!(matches!(
            decode_board(None, "r"),
            Err(StorageError::InvalidData(_))
        ));
        assert!(matches!(
            decode_board(Some(""), "r"),
            Err(StorageError::InvalidData(_))
        ));
        assert!(matches!(
            decode_board(Some("{not json"), "r"),
            Err(StorageError::InvalidData(_))
        ));
    }

    #[test]
    fn test_merge_caller_wins_and_keeps_absent_optionals() {
        let mut existing = StorageBoard::new("alice", "demo");
        existing.description = "old".to_string();
        existing.creator_email = Some("alice@example.com".to_string());

        let mut incoming = StorageBoard::new("alice", "demo");
        incoming.description = "new".to_string();
        incoming.tags = vec!["published".to_string()];

        let merged = merge_boards(&existing, &incoming).unwrap();
        assert_eq!(merged.description, "new");
        assert_eq!(merged.tags, vec!["published"]);
        assert_eq!(merged.creator_email.as_deref(), Some("alice@example.com"));
    }

    #[test]
    fn test_engine_ref_parse() {
        let parsed =
            EngineRef::parse("projects/p1/locations/us/collections/col/engines/eng").unwrap();
        assert_eq!(parsed.collection, "col");
        assert_eq!(parsed.engine, "eng");

        assert!(matches!(
            EngineRef::parse("projects/p1/engines/eng"),
            Err(StorageError::InvalidRequest(_))
        ));
    }

    #[test]
    fn test_segment_after() {
        assert_eq!(
            segment_after("projects/1/x/agentFlows/abc", "agentFlows"),
            Some("abc")
        );
        assert_eq!(
            segment_after("projects/1/integrations/demo/versions/v1", "integrations"),
            Some("demo")
        );
        assert_eq!(segment_after("projects/1/agentFlows/", "agentFlows"), None);
        assert_eq!(segment_after("agentFlows/abc", "agentFlows"), None);
    }
}
