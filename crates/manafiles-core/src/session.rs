use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::User;

/// An authenticated identity as held by a client.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Session {
    /// Raw bearer token. Only its SHA-256 digest is persisted server-side.
    pub token: String,
    pub user: User,
    pub expires_at: DateTime<Utc>,
}

impl Session {
    pub fn user_id(&self) -> &str {
        &self.user.id
    }
}

/// A row of the sessions table.
#[derive(Debug, Clone)]
pub struct SessionRecord {
    pub id: String,
    pub user_id: String,
    pub token_hash: String,
    pub created_at: DateTime<Utc>,
    pub expires_at: DateTime<Utc>,
}

impl SessionRecord {
    pub fn is_expired(&self, now: DateTime<Utc>) -> bool {
        self.expires_at <= now
    }
}
