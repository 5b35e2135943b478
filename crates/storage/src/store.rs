//! BoardServerStore trait definition

use async_trait::async_trait;
use boardserver_schemas::{ReanimationState, ServerInfo, StorageBoard};

use crate::error::Result;

/// Parameters of a single-board lookup
#[derive(Debug, Clone, Default)]
pub struct LoadBoardRequest {
    pub name: String,
    pub owner: Option<String>,
    pub requesting_user_id: Option<String>,
}

impl LoadBoardRequest {
    pub fn named(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            ..Default::default()
        }
    }

    pub fn with_owner(mut self, owner: impl Into<String>) -> Self {
        self.owner = Some(owner.into());
        self
    }

    pub fn with_requesting_user(mut self, user_id: impl Into<String>) -> Self {
        self.requesting_user_id = Some(user_id.into());
        self
    }
}

/// Identity of the caller, already resolved by the auth layer
///
/// Each backend decides which of the two keys it lists by.
#[derive(Debug, Clone, Default)]
pub struct Requester {
    pub user_id: String,
    pub email: Option<String>,
}

impl Requester {
    pub fn new(user_id: impl Into<String>) -> Self {
        Self {
            user_id: user_id.into(),
            email: None,
        }
    }

    pub fn with_email(mut self, email: impl Into<String>) -> Self {
        self.email = Some(email.into());
        self
    }

    /// Email when known, user id otherwise
    pub fn email_or_user_id(&self) -> &str {
        self.email
            .as_deref()
            .filter(|e| !e.is_empty())
            .unwrap_or(&self.user_id)
    }
}

/// Storage contract shared by every board backend
///
/// Implementations must be thread-safe and support concurrent access.
/// None of the operations filter by access rights; callers do that.
#[async_trait]
pub trait BoardServerStore: Send + Sync + 'static {
    // =========================================================================
    // Server
    // =========================================================================

    /// Static descriptor of this backend
    async fn get_server_info(&self) -> ServerInfo;

    // =========================================================================
    // Users
    // =========================================================================

    /// Register `api_key` for `user_id`
    ///
    /// Fails with `AlreadyExists` if the user is registered under any key.
    async fn create_user(&self, user_id: &str, api_key: &str) -> Result<()>;

    /// Resolve an API key; returns an empty string when the key is unknown
    async fn find_user_id_by_api_key(&self, api_key: &str) -> Result<String>;

    // =========================================================================
    // Boards
    // =========================================================================

    /// Load one board, `None` when absent
    async fn load_board(&self, request: &LoadBoardRequest) -> Result<Option<StorageBoard>>;

    /// Boards visible to `requester`
    async fn list_boards(&self, requester: &Requester) -> Result<Vec<StorageBoard>>;

    /// Create a board with a blank graph
    async fn create_board(&self, user_id: &str, name: &str) -> Result<()>;

    /// Write a board; replace vs. merge semantics are backend specific
    async fn update_board(&self, board: StorageBoard) -> Result<()>;

    /// Create the board if absent, merge otherwise
    ///
    /// Returns the state the backend holds after the write, which may carry a
    /// backend-assigned name.
    async fn upsert_board(&self, board: StorageBoard) -> Result<StorageBoard>;

    async fn delete_board(&self, user_id: &str, name: &str) -> Result<()>;

    // =========================================================================
    // Reanimation
    // =========================================================================

    /// Store a paused run and return a fresh single-use ticket
    async fn save_reanimation_state(&self, user: &str, state: ReanimationState)
        -> Result<String>;

    /// Redeem a ticket; the state is erased on the first successful load
    async fn load_reanimation_state(
        &self,
        user: &str,
        ticket: &str,
    ) -> Result<Option<ReanimationState>>;
}
