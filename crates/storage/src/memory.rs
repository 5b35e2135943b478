// In-memory storage implementation for dev mode
// Decision: Use parking_lot for thread-safe access
// Decision: Board names generated via uuid v4 when the caller leaves them empty
//
// This implementation backs the board contract with HashMaps, allowing the
// board server to run without any remote backend for development and tests.
// All data is lost on restart.

use async_trait::async_trait;
use boardserver_schemas::{ReanimationState, ServerInfo, StorageBoard};
use parking_lot::Mutex;
use std::collections::HashMap;
use uuid::Uuid;

use crate::error::Result;
use crate::identity::UserRegistry;
use crate::store::{BoardServerStore, LoadBoardRequest, Requester};
use crate::tickets::TicketStore;

/// Descriptor reported by the in-memory backend
pub fn in_memory_server_info() -> ServerInfo {
    ServerInfo::new(
        "In-memory board server",
        "Stores boards in memory",
        "https://example.com/board-server",
    )
}

/// In-memory board store
///
/// Boards are keyed by name alone. Every operation holds the board lock for
/// its whole read-modify-write.
#[derive(Default)]
pub struct InMemoryBoardStore {
    users: UserRegistry,
    boards: Mutex<HashMap<String, StorageBoard>>,
    tickets: TicketStore,
}

impl InMemoryBoardStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Get the number of stored boards
    pub fn board_count(&self) -> usize {
        self.boards.lock().len()
    }

    /// Clear all data (for testing)
    pub fn clear(&self) {
        self.boards.lock().clear();
        self.tickets.clear();
    }
}

#[async_trait]
impl BoardServerStore for InMemoryBoardStore {
    async fn get_server_info(&self) -> ServerInfo {
        in_memory_server_info()
    }

    async fn create_user(&self, user_id: &str, api_key: &str) -> Result<()> {
        self.users.create_user(user_id, api_key)
    }

    async fn find_user_id_by_api_key(&self, api_key: &str) -> Result<String> {
        Ok(self.users.find_user_id_by_api_key(api_key))
    }

    async fn load_board(&self, request: &LoadBoardRequest) -> Result<Option<StorageBoard>> {
        Ok(self.boards.lock().get(&request.name).cloned())
    }

    async fn list_boards(&self, requester: &Requester) -> Result<Vec<StorageBoard>> {
        let boards = self.boards.lock();
        let mut result: Vec<_> = boards
            .values()
            .filter(|b| b.owner == requester.user_id || b.is_published())
            .cloned()
            .collect();
        result.sort_by(|a, b| a.name.cmp(&b.name));
        Ok(result)
    }

    async fn create_board(&self, user_id: &str, name: &str) -> Result<()> {
        self.upsert_board(StorageBoard::new(user_id, name)).await?;
        Ok(())
    }

    async fn update_board(&self, board: StorageBoard) -> Result<()> {
        // Full replace, unlike the remote backends.
        self.boards.lock().insert(board.name.clone(), board);
        Ok(())
    }

    async fn upsert_board(&self, mut board: StorageBoard) -> Result<StorageBoard> {
        if board.name.is_empty() {
            board.name = Uuid::new_v4().to_string();
            tracing::debug!(board = %board.name, "Assigned generated board name");
        }
        self.boards.lock().insert(board.name.clone(), board.clone());
        Ok(board)
    }

    async fn delete_board(&self, _user_id: &str, name: &str) -> Result<()> {
        self.boards.lock().remove(name);
        Ok(())
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
