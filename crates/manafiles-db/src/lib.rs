pub mod sqlite;

use std::path::PathBuf;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use thiserror::Error;

use manafiles_core::password_reset::PasswordReset;
use manafiles_core::session::SessionRecord;
use manafiles_core::user::CreateUser;
use manafiles_core::{Category, FileRecord, User};

pub use sqlite::SqliteDatabase;

#[derive(Debug, Error)]
pub enum DbError {
    #[error("not found: {0}")]
    NotFound(String),

    /// A unique key (record id, username, email) is already taken.
    #[error("conflict: {0}")]
    Conflict(String),

    #[error("forbidden: {0}")]
    Forbidden(String),

    /// A foreign key points at a row that does not exist.
    #[error("invalid reference: {0}")]
    InvalidReference(String),

    #[error("io error: {0}")]
    Io(#[from] std::io::Error),

    #[error("database error: {0}")]
    Internal(String),
}

/// Where the database lives.
#[derive(Debug, Clone, Default)]
pub struct DbConfig {
    /// SQLite file path. Defaults to `<data dir>/manafiles.db`.
    pub sqlite_path: Option<String>,
}

impl DbConfig {
    pub fn from_env() -> Self {
        Self {
            sqlite_path: std::env::var("MANAFILES_DB_PATH").ok(),
        }
    }
}

/// Base directory for persistent state: `MANAFILES_DATA_DIR`, else
/// `$XDG_DATA_HOME/manafiles`, else `~/.local/share/manafiles`.
pub fn data_dir() -> PathBuf {
    if let Ok(dir) = std::env::var("MANAFILES_DATA_DIR") {
        return PathBuf::from(dir);
    }
    let base = if let Ok(xdg) = std::env::var("XDG_DATA_HOME") {
        PathBuf::from(xdg)
    } else if let Some(home) = std::env::var_os("HOME") {
        PathBuf::from(home).join(".local/share")
    } else {
        PathBuf::from(".")
    };
    base.join("manafiles")
}

/// Persistence for users, file records, sessions and password resets.
///
/// The file methods form the record store: inserts are validated against
/// the users table, listings are always scoped to one owner, and deletes
/// are refused for anyone but the owner.
#[async_trait]
pub trait Database: Send + Sync {
    // -- Users --
    async fn create_user(&self, input: &CreateUser) -> Result<User, DbError>;
    async fn get_user(&self, id: &str) -> Result<User, DbError>;
    async fn find_user_by_username(&self, username: &str) -> Result<Option<User>, DbError>;
    async fn find_user_by_email(&self, email: &str) -> Result<Option<User>, DbError>;
    async fn list_users(&self) -> Result<Vec<User>, DbError>;
    async fn update_user_password(&self, id: &str, password_hash: &str) -> Result<(), DbError>;

    // -- Files --
    /// Insert a record under its own id. `Conflict` if the id is taken,
    /// `InvalidReference` if the owner does not exist.
    async fn insert_file(&self, record: &FileRecord) -> Result<FileRecord, DbError>;
    async fn get_file(&self, id: &str) -> Result<FileRecord, DbError>;
    /// Records of one owner in one category, oldest first.
    async fn list_files_by_category(
        &self,
        category: Category,
        owner_id: &str,
    ) -> Result<Vec<FileRecord>, DbError>;
    /// One entry per category in `Category::ALL` order, zero-filled.
    async fn count_files_by_category(&self, owner_id: &str)
        -> Result<Vec<(Category, i64)>, DbError>;
    /// Delete a record on behalf of `requester_id`, returning it.
    /// `NotFound` if absent, `Forbidden` if the requester is not the owner.
    async fn delete_file(&self, id: &str, requester_id: &str) -> Result<FileRecord, DbError>;

    // -- Sessions --
    async fn create_session(
        &self,
        user_id: &str,
        token_hash: &str,
        expires_at: DateTime<Utc>,
    ) -> Result<SessionRecord, DbError>;
    async fn find_session_by_hash(&self, token_hash: &str)
        -> Result<Option<SessionRecord>, DbError>;
    async fn delete_session(&self, id: &str) -> Result<(), DbError>;
    async fn delete_sessions_for_user(&self, user_id: &str) -> Result<u64, DbError>;

    // -- Password resets --
    async fn create_password_reset(
        &self,
        user_id: &str,
        code_hash: &str,
        expires_at: DateTime<Utc>,
    ) -> Result<PasswordReset, DbError>;
    /// The most recently issued, not yet verified reset of a user.
    async fn latest_pending_reset(&self, user_id: &str) -> Result<Option<PasswordReset>, DbError>;
    async fn mark_reset_verified(&self, id: &str, token_hash: &str) -> Result<(), DbError>;
    /// Count a wrong code against a reset; returns the attempts so far.
    async fn record_failed_reset_attempt(&self, id: &str) -> Result<i64, DbError>;
    async fn find_reset_by_token(&self, token_hash: &str)
        -> Result<Option<PasswordReset>, DbError>;
    async fn delete_resets_for_user(&self, user_id: &str) -> Result<(), DbError>;

    // -- Housekeeping --
    /// Remove sessions and password resets that expired before `now`.
    /// Returns the number of rows removed.
    async fn purge_expired(&self, now: DateTime<Utc>) -> Result<u64, DbError>;
}
