// Integration version storage backend
// Decision: Writes never mutate in place; every write appends an immutable version
// Decision: The current board of an integration is its version with the latest updateTime
//
// Version records are addressed as
// `projects/{p}/locations/{r}/integrations/{integration}/versions/{version}`;
// the integration segment is the board's resource id and the grouping key
// for latest-wins reconciliation.

use async_trait::async_trait;
use boardserver_schemas::{board_resource_id, ReanimationState, ServerInfo, StorageBoard};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::collections::HashMap;
use std::sync::Arc;

use crate::config::RemoteConfig;
use crate::credentials::AccessTokenSource;
use crate::error::{Result, StorageError};
use crate::identity::UserRegistry;
use crate::key_lock::KeyedLocks;
use crate::remote::{decode_board, encode_board, merge_boards, segment_after, RemoteClient};
use crate::store::{BoardServerStore, LoadBoardRequest, Requester};
use crate::tickets::TicketStore;

const INTEGRATIONS: &str = "integrations";

/// Path segment matching every integration in a list call
const ALL_INTEGRATIONS: &str = "-";

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct IntegrationVersionRecord {
    name: String,
    #[serde(default)]
    update_time: Option<String>,
    #[serde(default)]
    flow_config: Option<String>,
}

#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
struct ListIntegrationVersionsResponse {
    #[serde(default)]
    integration_versions: Vec<Value>,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct CreateVersionBody<'a> {
    description: &'a str,
    flow_config: String,
    creator: &'a str,
}

/// One parsed, immutable board version
#[derive(Debug, Clone, PartialEq)]
pub struct BoardVersion {
    /// Full resource name of the version record
    pub name: String,
    /// Integration the version belongs to
    pub integration: String,
    pub updated_at: DateTime<Utc>,
    pub board: StorageBoard,
}

impl BoardVersion {
    fn parse(raw: Value) -> Result<Self> {
        let record: IntegrationVersionRecord = serde_json::from_value(raw)?;
        let integration = segment_after(&record.name, INTEGRATIONS)
            .ok_or_else(|| {
                StorageError::invalid_data(format!("no integration in {}", record.name))
            })?
            .to_string();
        let updated_at = record
            .update_time
            .as_deref()
            .ok_or_else(|| StorageError::invalid_data(format!("{} has no updateTime", record.name)))
            .and_then(|t| {
                DateTime::parse_from_rfc3339(t).map_err(|e| {
                    StorageError::invalid_data(format!("{} has bad updateTime: {e}", record.name))
                })
            })?
            .with_timezone(&Utc);
        let board = decode_board(record.flow_config.as_deref(), &record.name)?;

        Ok(Self {
            name: record.name,
            integration,
            updated_at,
            board,
        })
    }
}

/// Keep only the newest version of each integration
///
/// Groups come out in order of first appearance. When two versions of one
/// integration share a timestamp the one that arrived first is kept; the
/// arrival order is whatever the backend returned, so ties are not stable
/// across backends.
pub fn latest_per_integration(versions: Vec<BoardVersion>) -> Vec<BoardVersion> {
    let mut slots: HashMap<String, usize> = HashMap::new();
    let mut latest: Vec<BoardVersion> = Vec::new();

    for version in versions {
        match slots.get(&version.integration) {
            Some(&slot) => {
                if version.updated_at > latest[slot].updated_at {
                    latest[slot] = version;
                }
            }
            None => {
                slots.insert(version.integration.clone(), latest.len());
                latest.push(version);
            }
        }
    }
    latest
}

/// Board store backed by append-only integration versions
pub struct IntegrationVersionBoardStore {
    client: RemoteClient,
    users: UserRegistry,
    tickets: TicketStore,
    locks: KeyedLocks,
}

impl IntegrationVersionBoardStore {
    pub fn new(config: RemoteConfig, tokens: Arc<dyn AccessTokenSource>) -> Self {
        Self {
            client: RemoteClient::new(config, tokens),
            users: UserRegistry::new(),
            tickets: TicketStore::new(),
            locks: KeyedLocks::new(),
        }
    }

    fn integration_resource(&self, integration: &str) -> String {
        format!(
            "{}/{}/{}",
            self.client.config().location_path(),
            INTEGRATIONS,
            integration
        )
    }

    fn versions_resource(&self, integration: &str) -> String {
        format!("{}/versions", self.integration_resource(integration))
    }

    /// Raw version records of one integration (or all, with `-`)
    async fn list_versions(&self, integration: &str, filter: &str) -> Result<Vec<Value>> {
        tracing::debug!(integration, filter, "Listing integration versions");
        let query: Vec<(&str, &str)> = if filter.is_empty() {
            Vec::new()
        } else {
            vec![("filter", filter)]
        };
        let listed: Result<ListIntegrationVersionsResponse> = self
            .client
            .get(
                "ListIntegrationVersions",
                &self.versions_resource(integration),
                &query,
            )
            .await;
        match listed {
            Ok(response) => Ok(response.integration_versions),
            Err(e) if e.is_not_found() => Ok(Vec::new()),
            Err(e) => Err(e),
        }
    }

    /// Parse records, logging and skipping the ones that cannot be read
    fn parse_versions(records: Vec<Value>) -> Vec<BoardVersion> {
        records
            .into_iter()
            .filter_map(|raw| match BoardVersion::parse(raw) {
                Ok(version) => Some(version),
                Err(e) => {
                    tracing::warn!(error = %e, "Skipping unreadable integration version");
                    None
                }
            })
            .collect()
    }

    /// Current version of one owner's board, if any
    async fn current_version(
        &self,
        integration: &str,
        owner: &str,
    ) -> Result<Option<BoardVersion>> {
        let versions = Self::parse_versions(self.list_versions(integration, "").await?)
            .into_iter()
            .filter(|v| v.integration == integration && v.board.owner == owner)
            .collect();
        Ok(latest_per_integration(versions).into_iter().next())
    }

    async fn append_version(&self, board: &StorageBoard) -> Result<StorageBoard> {
        let integration = board.resource_id();
        let body = CreateVersionBody {
            description: &board.description,
            flow_config: encode_board(board)?,
            creator: board.creator(),
        };
        let created: Value = self
            .client
            .post(
                "CreateIntegrationVersion",
                &self.versions_resource(integration),
                &body,
            )
            .await?;
        let version = BoardVersion::parse(created)?;
        tracing::info!(integration, version = %version.name, "Appended integration version");
        Ok(version.board)
    }
}

fn require_name(name: &str) -> Result<()> {
    if board_resource_id(name).is_empty() {
        return Err(StorageError::invalid_request("Board name is empty"));
    }
    Ok(())
}

#[async_trait]
impl BoardServerStore for IntegrationVersionBoardStore {
    async fn get_server_info(&self) -> ServerInfo {
        ServerInfo::new(
            "Integration versions",
            "Stores every board revision as an integration version",
            "https://example.com/board-server",
        )
    }

    async fn create_user(&self, user_id: &str, api_key: &str) -> Result<()> {
        self.users.create_user(user_id, api_key)
    }

    async fn find_user_id_by_api_key(&self, api_key: &str) -> Result<String> {
        Ok(self.users.find_user_id_by_api_key(api_key))
    }

    async fn load_board(&self, request: &LoadBoardRequest) -> Result<Option<StorageBoard>> {
        require_name(&request.name)?;
        let integration = board_resource_id(&request.name);
        let versions = Self::parse_versions(self.list_versions(integration, "").await?)
            .into_iter()
            .filter(|v| v.integration == integration)
            .filter(|v| request.owner.as_ref().map_or(true, |o| &v.board.owner == o))
            .collect();

        Ok(latest_per_integration(versions)
            .into_iter()
            .next()
            .map(|v| v.board))
    }

    async fn list_boards(&self, requester: &Requester) -> Result<Vec<StorageBoard>> {
        let filter = format!("creator=\"{}\"", requester.email_or_user_id());
        let records = self.list_versions(ALL_INTEGRATIONS, &filter).await?;
        Ok(latest_per_integration(Self::parse_versions(records))
            .into_iter()
            .map(|v| v.board)
            .collect())
    }

    async fn create_board(&self, user_id: &str, name: &str) -> Result<()> {
        self.upsert_board(StorageBoard::new(user_id, name)).await?;
        Ok(())
    }

    async fn update_board(&self, board: StorageBoard) -> Result<()> {
        // Replace: the new version holds exactly the caller's board.
        require_name(&board.name)?;
        let _guard = self.locks.lock(board.resource_id()).await;
        self.append_version(&board).await?;
        Ok(())
    }

    async fn upsert_board(&self, board: StorageBoard) -> Result<StorageBoard> {
        require_name(&board.name)?;
        let _guard = self.locks.lock(board.resource_id()).await;

        let current = self
            .current_version(board.resource_id(), &board.owner)
            .await?;
        let next = match current {
            Some(latest) => merge_boards(&latest.board, &board)?,
            None => {
                tracing::info!(board = %board.name, "No versions for this owner yet, creating the first one");
                board
            }
        };
        self.append_version(&next).await
    }

    async fn delete_board(&self, _user_id: &str, name: &str) -> Result<()> {
        require_name(name)?;
        let integration = board_resource_id(name);
        let _guard = self.locks.lock(integration).await;

        if self.list_versions(integration, "").await?.is_empty() {
            return Err(StorageError::not_found(format!("board {name}")));
        }

        match self
            .client
            .delete("DeleteIntegration", &self.integration_resource(integration))
            .await
        {
            Ok(()) => {
                tracing::info!(integration, "Deleted integration");
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
