// API key registry
// Decision: Use parking_lot for thread-safe access
//
// Shared by every backend. The uniqueness check and the insert happen under
// one lock so two concurrent registrations of the same user cannot both win.

use parking_lot::Mutex;
use std::collections::HashMap;

use crate::error::{Result, StorageError};

/// apiKey -> userId mapping
#[derive(Default)]
pub struct UserRegistry {
    users: Mutex<HashMap<String, String>>,
}

impl UserRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn create_user(&self, user_id: &str, api_key: &str) -> Result<()> {
        let mut users = self.users.lock();
        if users.values().any(|existing| existing == user_id) {
            return Err(StorageError::already_exists(format!("user {user_id}")));
        }
        users.insert(api_key.to_string(), user_id.to_string());
        Ok(())
    }

    /// Empty string on miss
    pub fn find_user_id_by_api_key(&self, api_key: &str) -> String {
        self.users.lock().get(api_key).cloned().unwrap_or_default()
    }

    pub fn len(&self) -> usize {
        self.users.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.users.lock().is_empty()
    }
}
