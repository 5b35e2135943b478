// Agent flow storage backend
// Decision: One remote agent flow per board, addressed by the board name minus its file suffix
// Decision: Promoted fields (description, display name, linked agent) live on the flow itself
//
// Creating a flow is always followed by an update: the server picks the flow
// id, and the board embedded in the flow must be rewritten to carry that id
// as its name before the first real content write.
//
// After the rename a flow is reachable by its id alone. Upserting the
// original name again probes an id that does not exist and creates another
// flow; the per-key lock does not prevent that.

use async_trait::async_trait;
use boardserver_schemas::{board_resource_id, ReanimationState, ServerInfo, StorageBoard};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::sync::Arc;

use crate::config::RemoteConfig;
use crate::credentials::AccessTokenSource;
use crate::error::{Result, StorageError};
use crate::identity::UserRegistry;
use crate::key_lock::KeyedLocks;
use crate::remote::{decode_board, encode_board, merge_boards, segment_after, EngineRef, RemoteClient};
use crate::store::{BoardServerStore, LoadBoardRequest, Requester};
use crate::tickets::TicketStore;

const AGENT_FLOWS: &str = "agentFlows";

/// Agent flow as returned by the remote API
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
struct AgentFlow {
    name: String,
    #[serde(default)]
    flow_config: Option<String>,
}

impl AgentFlow {
    fn board(&self) -> Result<StorageBoard> {
        decode_board(self.flow_config.as_deref(), &self.name)
    }
}

#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
struct ListAgentFlowsResponse {
    #[serde(default)]
    agent_flows: Vec<Value>,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct CreateAgentFlowBody<'a> {
    description: &'a str,
    display_name: &'a str,
    flow_config: String,
    creator: &'a str,
    no_code_agent: &'a str,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct UpdateAgentFlowBody<'a> {
    name: &'a str,
    description: &'a str,
    display_name: &'a str,
    flow_config: String,
    no_code_agent: &'a str,
}

/// Descriptor reported by the agent flow backend
pub fn agent_flows_server_info() -> ServerInfo {
    ServerInfo::new(
        "Application Integration",
        "Stores boards in Application Integration",
        "https://example.com/board-server",
    )
}

/// Board store backed by remote agent flows
pub struct AgentFlowBoardStore {
    client: RemoteClient,
    users: UserRegistry,
    tickets: TicketStore,
    locks: KeyedLocks,
}

impl AgentFlowBoardStore {
    pub fn new(config: RemoteConfig, tokens: Arc<dyn AccessTokenSource>) -> Self {
        Self {
            client: RemoteClient::new(config, tokens),
            users: UserRegistry::new(),
            tickets: TicketStore::new(),
            locks: KeyedLocks::new(),
        }
    }

    fn flows_parent(&self) -> String {
        format!("{}/{}", self.client.config().assistant_path(), AGENT_FLOWS)
    }

    fn flow_resource(&self, board_name: &str) -> String {
        format!("{}/{}", self.flows_parent(), board_resource_id(board_name))
    }

    async fn get_agent_flow(&self, board_name: &str) -> Result<AgentFlow> {
        tracing::debug!(board = board_name, "Getting agent flow");
        self.client
            .get("GetAgentFlow", &self.flow_resource(board_name), &[])
            .await
    }

    async fn create_agent_flow(&self, mut board: StorageBoard) -> Result<AgentFlow> {
        let linked_agent = board.graph.linked_agent_id().unwrap_or_default().to_string();
        let parent = match board.graph.linked_agent_parent() {
            Some(path) => {
                let engine = EngineRef::parse(path)?;
                format!(
                    "{}/{}",
                    self.client
                        .config()
                        .engine_path(&engine.collection, &engine.engine),
                    AGENT_FLOWS
                )
            }
            None => self.flows_parent(),
        };
        board.graph.strip_linked_agent();

        let body = CreateAgentFlowBody {
            description: &board.description,
            display_name: &board.display_name,
            flow_config: encode_board(&board)?,
            creator: board.creator(),
            no_code_agent: &linked_agent,
        };
        tracing::debug!(parent = %parent, "Creating agent flow");
        self.client.post("CreateAgentFlow", &parent, &body).await
    }

    async fn update_agent_flow(
        &self,
        mut board: StorageBoard,
        resource_name: &str,
    ) -> Result<AgentFlow> {
        let linked_agent = board.graph.linked_agent_id().unwrap_or_default().to_string();
        let update_mask = update_mask(&board, &linked_agent);
        board.graph.strip_linked_agent();

        let body = UpdateAgentFlowBody {
            name: resource_name,
            description: &board.description,
            display_name: &board.display_name,
            flow_config: encode_board(&board)?,
            no_code_agent: &linked_agent,
        };
        tracing::debug!(resource = resource_name, update_mask = %update_mask, "Updating agent flow");
        self.client
            .patch(
                "UpdateAgentFlow",
                resource_name,
                &[("update_mask", update_mask.as_str())],
                &body,
            )
            .await
    }

    async fn list_agent_flows(&self, filter: &str) -> Result<Vec<Value>> {
        tracing::debug!(filter, "Listing agent flows");
        let query: Vec<(&str, &str)> = if filter.is_empty() {
            Vec::new()
        } else {
            vec![("filter", filter)]
        };
        let response: ListAgentFlowsResponse = self
            .client
            .get("ListAgentFlows", &self.flows_parent(), &query)
            .await?;
        Ok(response.agent_flows)
    }

    /// Create the flow, then rewrite the embedded board name to the server id
    async fn create_then_rename(&self, board: StorageBoard) -> Result<StorageBoard> {
        let created = self.create_agent_flow(board).await?;
        let flow_id = segment_after(&created.name, AGENT_FLOWS).ok_or_else(|| {
            StorageError::invalid_data(format!("created agent flow has no id: {}", created.name))
        })?;
        tracing::info!(flow = flow_id, "Created agent flow");

        let mut created_board = created.board()?;
        created_board.name = flow_id.to_string();
        let updated = self.update_agent_flow(created_board, &created.name).await?;
        updated.board()
    }
}

/// Fields named in the PATCH update mask
fn update_mask(board: &StorageBoard, linked_agent: &str) -> String {
    let mut mask = String::from("flowConfig");
    if !board.description.is_empty() {
        mask.push_str(",description");
    }
    if !board.display_name.is_empty() {
        mask.push_str(",display_name");
    }
    if !linked_agent.is_empty() {
        mask.push_str(",no_code_agent");
    }
    mask
}

fn require_name(name: &str) -> Result<()> {
    if board_resource_id(name).is_empty() {
        return Err(StorageError::invalid_request("Board name is empty"));
    }
    Ok(())
}

#[async_trait]
impl BoardServerStore for AgentFlowBoardStore {
    async fn get_server_info(&self) -> ServerInfo {
        agent_flows_server_info()
    }

    async fn create_user(&self, user_id: &str, api_key: &str) -> Result<()> {
        self.users.create_user(user_id, api_key)
    }

    async fn find_user_id_by_api_key(&self, api_key: &str) -> Result<String> {
        Ok(self.users.find_user_id_by_api_key(api_key))
    }

    async fn load_board(&self, request: &LoadBoardRequest) -> Result<Option<StorageBoard>> {
        require_name(&request.name)?;
        match self.get_agent_flow(&request.name).await {
            Ok(flow) => flow.board().map(Some),
            Err(e) if e.is_not_found() => Ok(None),
            Err(e) => Err(e),
        }
    }

    async fn list_boards(&self, requester: &Requester) -> Result<Vec<StorageBoard>> {
        let filter = format!("creator=\"{}\"", requester.email_or_user_id());
        let flows = self.list_agent_flows(&filter).await?;

        let boards = flows
            .into_iter()
            .filter_map(|raw| {
                let parsed = serde_json::from_value::<AgentFlow>(raw)
                    .map_err(StorageError::from)
                    .and_then(|flow| flow.board());
                match parsed {
                    Ok(board) => Some(board),
                    Err(e) => {
                        tracing::warn!(error = %e, "Skipping unreadable agent flow");
                        None
                    }
                }
            })
            .collect();
        Ok(boards)
    }

    async fn create_board(&self, user_id: &str, name: &str) -> Result<()> {
        self.upsert_board(StorageBoard::new(user_id, name)).await?;
        Ok(())
    }

    async fn update_board(&self, board: StorageBoard) -> Result<()> {
        self.upsert_board(board).await?;
        Ok(())
    }

    async fn upsert_board(&self, board: StorageBoard) -> Result<StorageBoard> {
        require_name(&board.name)?;
        let _guard = self.locks.lock(board.resource_id()).await;

        let existing = match self.get_agent_flow(&board.name).await {
            Ok(flow) => flow,
            Err(e) if e.is_not_found() => {
                tracing::info!(board = %board.name, "Agent flow not found, creating a new one");
                return self.create_then_rename(board).await;
            }
            Err(e) => return Err(e),
        };

        let merged = merge_boards(&existing.board()?, &board)?;
        let updated = self.update_agent_flow(merged, &existing.name).await?;
        updated.board()
    }

    async fn delete_board(&self, _user_id: &str, name: &str) -> Result<()> {
        require_name(name)?;
        let _guard = self.locks.lock(board_resource_id(name)).await;

        match self
            .client
            .delete("DeleteAgentFlow", &self.flow_resource(name))
            .await
        {
            Ok(()) => {
                tracing::info!(board = name, "Deleted agent flow");
                Ok(())
            }
            Err(e) if e.is_not_found() => Err(StorageError::not_found(format!("board {name}"))),
            Err(e) => Err(e),
        }
    }

    async fn save_reanimation_state(
        &self,
        user: &str,
        state: ReanimationState,
    ) -> Result<String> {
        Ok(self.tickets.save(user, state))
    }

    async fn load_reanimation_state(
        &self,
        user: &str,
        ticket: &str,
    ) -> Result<Option<ReanimationState>> {
        Ok(self.tickets.load(user, ticket))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::credentials::StaticTokenSource;
    use boardserver_schemas::{METADATA_LINKED_AGENT_ID, METADATA_LINKED_AGENT_PARENT};
    use serde_json::json;
    use wiremock::matchers::{method, path, query_param};
    use wiremock::{Mock, MockServer, Request, ResponseTemplate};

    const FLOWS: &str = "/v1/projects/42/locations/us-central1/collections/default_collection/engines/eng/assistants/default_assistant/agentFlows";

    fn store(server: &MockServer) -> AgentFlowBoardStore {
        AgentFlowBoardStore::new(
            RemoteConfig::new(server.uri(), "42", "eng"),
            Arc::new(StaticTokenSource::new("token")),
        )
    }

    fn flow_resource(id: &str) -> String {
        format!("projects/42/locations/us-central1/collections/default_collection/engines/eng/assistants/default_assistant/agentFlows/{id}")
    }

    fn flow_json(id: &str, board: &StorageBoard) -> Value {
        json!({
            "name": flow_resource(id),
            "flowConfig": serde_json::to_string(board).unwrap(),
        })
    }

    async fn requests_with(server: &MockServer, verb: &str) -> Vec<Request> {
        server
            .received_requests()
            .await
            .unwrap_or_default()
            .into_iter()
            .filter(|r| r.method.as_str() == verb)
            .collect()
    }

    fn sent_board(request: &Request) -> StorageBoard {
        let body: Value = request.body_json().unwrap();
        decode_board(body["flowConfig"].as_str(), "request").unwrap()
    }

    #[tokio::test]
    async fn test_upsert_creates_then_renames() {
        let server = MockServer::start().await;
        let board = StorageBoard::new("alice", "demo.bgl.json");

        let mut renamed = board.clone();
        renamed.name = "srv-1".to_string();

        Mock::given(method("GET"))
            .and(path(format!("{FLOWS}/demo")))
            .respond_with(ResponseTemplate::new(404))
            .expect(1)
            .mount(&server)
            .await;
        Mock::given(method("POST"))
            .and(path(FLOWS))
            .respond_with(ResponseTemplate::new(200).set_body_json(flow_json("srv-1", &board)))
            .expect(1)
            .mount(&server)
            .await;
        Mock::given(method("PATCH"))
            .and(path(format!("{FLOWS}/srv-1")))
            .and(query_param("update_mask", "flowConfig,display_name"))
            .respond_with(ResponseTemplate::new(200).set_body_json(flow_json("srv-1", &renamed)))
            .expect(1)
            .mount(&server)
            .await;

        let saved = store(&server).upsert_board(board).await.unwrap();
        assert_eq!(saved, renamed);

        let patches = requests_with(&server, "PATCH").await;
        assert_eq!(sent_board(&patches[0]).name, "srv-1");

        let posts = requests_with(&server, "POST").await;
        let body: Value = posts[0].body_json().unwrap();
        assert_eq!(body["creator"], json!("alice"));
        assert!(body["flowConfig"].is_string());
    }

    #[tokio::test]
    async fn test_upsert_merges_over_existing_flow() {
        let server = MockServer::start().await;

        let mut existing = StorageBoard::new("alice", "demo");
        existing.description = "old".to_string();
        existing.creator_email = Some("alice@example.com".to_string());

        let mut incoming = StorageBoard::new("alice", "demo");
        incoming.description = "new".to_string();

        let mut confirmed = incoming.clone();
        confirmed.creator_email = existing.creator_email.clone();
        confirmed.thumbnail = "server-side".to_string();

        Mock::given(method("GET"))
            .and(path(format!("{FLOWS}/demo")))
            .respond_with(ResponseTemplate::new(200).set_body_json(flow_json("demo", &existing)))
            .mount(&server)
            .await;
        Mock::given(method("PATCH"))
            .and(path(format!("{FLOWS}/demo")))
            .and(query_param("update_mask", "flowConfig,description,display_name"))
            .respond_with(ResponseTemplate::new(200).set_body_json(flow_json("demo", &confirmed)))
            .expect(1)
            .mount(&server)
            .await;
        Mock::given(method("POST"))
            .respond_with(ResponseTemplate::new(500))
            .expect(0)
            .mount(&server)
            .await;

        let saved = store(&server).upsert_board(incoming).await.unwrap();
        // The backend's answer is returned, not the locally merged board.
        assert_eq!(saved.thumbnail, "server-side");

        let patches = requests_with(&server, "PATCH").await;
        let sent = sent_board(&patches[0]);
        assert_eq!(sent.description, "new");
        assert_eq!(sent.creator_email.as_deref(), Some("alice@example.com"));
    }

    #[tokio::test]
    async fn test_linked_agent_is_promoted_and_stripped() {
        let server = MockServer::start().await;

        let mut board = StorageBoard::new("alice", "agentic");
        board.creator_email = Some("alice@example.com".to_string());
        board
            .graph
            .metadata
            .insert(METADATA_LINKED_AGENT_ID.to_string(), json!("agent-7"));
        board.graph.metadata.insert(
            METADATA_LINKED_AGENT_PARENT.to_string(),
            json!("projects/9/locations/eu/collections/col2/engines/eng2"),
        );
        board.graph.metadata.insert("comments".to_string(), json!([]));

        let parent_flows =
            "/v1/projects/42/locations/us-central1/collections/col2/engines/eng2/agentFlows";
        let created_name = "projects/42/locations/us-central1/collections/col2/engines/eng2/agentFlows/af-9";

        let mut stored = board.clone();
        stored.graph.strip_linked_agent();

        Mock::given(method("GET"))
            .respond_with(ResponseTemplate::new(404))
            .mount(&server)
            .await;
        Mock::given(method("POST"))
            .and(path(parent_flows))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({
                "name": created_name,
                "flowConfig": serde_json::to_string(&stored).unwrap(),
            })))
            .expect(1)
            .mount(&server)
            .await;
        Mock::given(method("PATCH"))
            .and(path(format!("/v1/{created_name}")))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({
                "name": created_name,
                "flowConfig": serde_json::to_string(&stored).unwrap(),
            })))
            .expect(1)
            .mount(&server)
            .await;

        store(&server).upsert_board(board).await.unwrap();

        let posts = requests_with(&server, "POST").await;
        let body: Value = posts[0].body_json().unwrap();
        assert_eq!(body["noCodeAgent"], json!("agent-7"));
        assert_eq!(body["creator"], json!("alice@example.com"));

        let sent = sent_board(&posts[0]);
        assert!(sent.graph.linked_agent_id().is_none());
        assert!(sent.graph.linked_agent_parent().is_none());
        assert!(sent.graph.metadata.contains_key("comments"));
    }

    #[tokio::test]
    async fn test_probe_failure_other_than_not_found_propagates() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .respond_with(ResponseTemplate::new(500))
            .mount(&server)
            .await;
        Mock::given(method("POST"))
            .respond_with(ResponseTemplate::new(200))
            .expect(0)
            .mount(&server)
            .await;

        let err = store(&server)
            .upsert_board(StorageBoard::new("alice", "demo"))
            .await
            .unwrap_err();
        assert!(matches!(
            err,
            StorageError::RemoteFailure { status: 500, ref action, .. } if action == "GetAgentFlow"
        ));
    }

    #[tokio::test]
    async fn test_load_board() {
        let server = MockServer::start().await;
        let board = StorageBoard::new("alice", "demo");

        Mock::given(method("GET"))
            .and(path(format!("{FLOWS}/demo")))
            .respond_with(ResponseTemplate::new(200).set_body_json(flow_json("demo", &board)))
            .mount(&server)
            .await;
        Mock::given(method("GET"))
            .and(path(format!("{FLOWS}/gone")))
            .respond_with(ResponseTemplate::new(404))
            .mount(&server)
            .await;
        Mock::given(method("GET"))
            .and(path(format!("{FLOWS}/hollow")))
            .respond_with(
                ResponseTemplate::new(200).set_body_json(json!({"name": flow_resource("hollow")})),
            )
            .mount(&server)
            .await;

        let store = store(&server);
        let loaded = store
            .load_board(&LoadBoardRequest::named("demo.bgl.json"))
            .await
            .unwrap();
        assert_eq!(loaded, Some(board));

        let missing = store.load_board(&LoadBoardRequest::named("gone")).await.unwrap();
        assert!(missing.is_none());

        let err = store
            .load_board(&LoadBoardRequest::named("hollow"))
            .await
            .unwrap_err();
        assert!(matches!(err, StorageError::InvalidData(_)));

        let err = store.load_board(&LoadBoardRequest::named("")).await.unwrap_err();
        assert!(matches!(err, StorageError::InvalidRequest(_)));
    }

    #[tokio::test]
    async fn test_list_filters_by_email_and_skips_corrupt_flows() {
        let server = MockServer::start().await;
        let board = StorageBoard::new("u-1", "good");

        Mock::given(method("GET"))
            .and(path(FLOWS))
            .and(query_param("filter", "creator=\"alice@example.com\""))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({
                "agentFlows": [
                    flow_json("good", &board),
                    {"name": flow_resource("bad"), "flowConfig": "{broken"},
                    {"name": flow_resource("empty")},
                    42
                ]
            })))
            .expect(1)
            .mount(&server)
            .await;

        let requester = Requester::new("u-1").with_email("alice@example.com");
        let boards = store(&server).list_boards(&requester).await.unwrap();
        assert_eq!(boards, vec![board]);
    }

    #[tokio::test]
    async fn test_list_without_flows_is_empty() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path(FLOWS))
            .and(query_param("filter", "creator=\"u-1\""))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({})))
            .mount(&server)
            .await;

        let boards = store(&server)
            .list_boards(&Requester::new("u-1"))
            .await
            .unwrap();
        assert!(boards.is_empty());
    }

    #[tokio::test]
    async fn test_delete_board() {
        let server = MockServer::start().await;
        Mock::given(method("DELETE"))
            .and(path(format!("{FLOWS}/demo")))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({})))
            .expect(1)
            .mount(&server)
            .await;
        Mock::given(method("DELETE"))
            .and(path(format!("{FLOWS}/missing")))
            .respond_with(ResponseTemplate::new(404))
            .mount(&server)
            .await;

        let store = store(&server);
        store.delete_board("alice", "demo.bgl.json").await.unwrap();

        let err = store.delete_board("alice", "missing").await.unwrap_err();
        assert!(matches!(err, StorageError::NotFound(_)));
    }

    #[tokio::test]
    async fn test_server_info_is_static() {
        let server = MockServer::start().await;
        let info = store(&server).get_server_info().await;
        assert_eq!(info, agent_flows_server_info());
        assert_eq!(info.title, "Application Integration");
        assert_eq!(info.url, "https://example.com/board-server");
    }

    #[tokio::test]
    async fn test_suffix_only_name_is_invalid() {
        let server = MockServer::start().await;
        Mock::given(wiremock::matchers::any())
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({})))
            .expect(0)
            .mount(&server)
            .await;

        let store = store(&server);
        let err = store.delete_board("alice", ".bgl.json").await.unwrap_err();
        assert!(matches!(err, StorageError::InvalidRequest(_)));

        let err = store
            .load_board(&LoadBoardRequest::named(".bgl.json"))
            .await
            .unwrap_err();
        assert!(matches!(err, StorageError::InvalidRequest(_)));

        let err = store
            .upsert_board(StorageBoard::new("alice", ".bgl.json"))
            .await
            .unwrap_err();
        assert!(matches!(err, StorageError::InvalidRequest(_)));
    }

    #[tokio::test]
    async fn test_missing_token_fails_call() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .respond_with(ResponseTemplate::new(200))
            .expect(0)
            .mount(&server)
            .await;

        let store = AgentFlowBoardStore::new(
            RemoteConfig::new(server.uri(), "42", "eng"),
            Arc::new(StaticTokenSource::new("")),
        );
        let err = store
            .load_board(&LoadBoardRequest::named("demo"))
            .await
            .unwrap_err();
        assert!(matches!(err, StorageError::Credentials(_)));
    }
}
