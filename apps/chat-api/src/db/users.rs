use std::collections::HashMap;
use std::sync::Mutex;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::error::ApiError;

/// A user profile as exposed to the real-time layer.
///
/// Deliberately excludes secrets (password hash, refresh token) held by the
/// full user document in the persistence layer.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct UserProfile {
    pub id: String,
    pub username: String,
    pub email: String,
    pub avatar_url: Option<String>,
    pub created_at: DateTime<Utc>,
}

/// Abstraction over the user store consulted at socket handshake.
///
/// Backed by the document database in production and an in-memory map in
/// tests.
#[async_trait]
pub trait UserStore: Send + Sync {
    async fn find_by_id(&self, user_id: &str) -> Result<Option<UserProfile>, ApiError>;
}

// ---------------------------------------------------------------------------
// In-memory implementation (for Phase 1 / tests)
// ---------------------------------------------------------------------------

pub struct MemoryUserStore {
    data: Mutex<HashMap<String, UserProfile>>,
}

impl MemoryUserStore {
    pub fn new() -> Self {
        Self {
            data: Mutex::new(HashMap::new()),
        }
    }

    pub fn insert(&self, profile: UserProfile) {
        self.data
            .lock()
            .unwrap()
            .insert(profile.id.clone(), profile);
    }
}

impl Default for MemoryUserStore {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl UserStore for MemoryUserStore {
    async fn find_by_id(&self, user_id: &str) -> Result<Option<UserProfile>, ApiError> {
        Ok(self.data.lock().unwrap().get(user_id).cloned())
    }
}
