pub(crate) mod migrations;
pub mod queries;

use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex};

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use rusqlite::{Connection, ErrorCode};

use manafiles_core::password_reset::PasswordReset;
use manafiles_core::session::SessionRecord;
use manafiles_core::user::CreateUser;
use manafiles_core::{Category, FileRecord, User};

use crate::{Database, DbConfig, DbError};

/// Extension trait that converts `rusqlite::Result<T>` into `Result<T, DbError>`.
///
/// Constraint violations become `Conflict` / `InvalidReference`; everything
/// else becomes `Internal`.
pub(crate) trait SqliteResultExt<T> {
    fn to_db(self) -> Result<T, DbError>;
}

impl<T> SqliteResultExt<T> for rusqlite::Result<T> {
    fn to_db(self) -> Result<T, DbError> {
        self.map_err(map_sqlite_err)
    }
}

#[derive(Clone)]
pub struct SqliteDatabase {
    conn: Arc<Mutex<Connection>>,
}

impl SqliteDatabase {
    pub fn open(config: &DbConfig) -> Result<Self, DbError> {
        let path = config
            .sqlite_path
            .as_deref()
            .map(PathBuf::from)
            .unwrap_or_else(|| crate::data_dir().join("manafiles.db"));
        std::fs::create_dir_all(path.parent().unwrap_or(Path::new(".")))?;
        Self::open_path(&path)
    }

    pub fn open_path(path: &Path) -> Result<Self, DbError> {
        let conn = Connection::open(path).to_db()?;
        conn.execute_batch(
            "PRAGMA journal_mode=WAL;
             PRAGMA foreign_keys=ON;
             PRAGMA busy_timeout=5000;",
        )
        .to_db()?;
        let db = Self {
            conn: Arc::new(Mutex::new(conn)),
        };
        db.run_migrations()?;
        tracing::debug!(path = %path.display(), "opened sqlite database");
        Ok(db)
    }

    pub fn open_in_memory() -> Result<Self, DbError> {
        let conn = Connection::open_in_memory().to_db()?;
        conn.execute_batch("PRAGMA foreign_keys=ON;").to_db()?;
        let db = Self {
            conn: Arc::new(Mutex::new(conn)),
        };
        db.run_migrations()?;
        Ok(db)
    }

    pub(crate) fn with_conn<F, T>(&self, f: F) -> Result<T, DbError>
    where
        F: FnOnce(&Connection) -> Result<T, DbError>,
    {
        let conn = self
            .conn
            .lock()
            .map_err(|_| DbError::Internal("lock poisoned".into()))?;
        f(&conn)
    }

    fn run_migrations(&self) -> Result<(), DbError> {
        self.with_conn(|conn| {
            migrations::run(conn)?;
            Ok(())
        })
    }

    /// Run a synchronous query on the blocking pool.
    async fn blocking<F, T>(&self, f: F) -> Result<T, DbError>
    where
        F: FnOnce(&SqliteDatabase) -> Result<T, DbError> + Send + 'static,
        T: Send + 'static,
    {
        let db = self.clone();
        tokio::task::spawn_blocking(move || f(&db))
            .await
            .map_err(|e| DbError::Internal(e.to_string()))?
    }
}

/// Map a `rusqlite::Error` into a `DbError`.
pub(crate) fn map_sqlite_err(e: rusqlite::Error) -> DbError {
    if let rusqlite::Error::SqliteFailure(ref err, ref msg) = e {
        if err.code == ErrorCode::ConstraintViolation {
            let detail = msg.clone().unwrap_or_else(|| e.to_string());
            match err.extended_code {
                rusqlite::ffi::SQLITE_CONSTRAINT_FOREIGNKEY => {
                    return DbError::InvalidReference(detail)
                }
                rusqlite::ffi::SQLITE_CONSTRAINT_PRIMARYKEY
                | rusqlite::ffi::SQLITE_CONSTRAINT_UNIQUE => return DbError::Conflict(detail),
                _ => {}
            }
        }
    }
    DbError::Internal(e.to_string())
}

/// Map "no rows" to `NotFound(what)`, everything else through `map_sqlite_err`.
pub(crate) fn not_found_or(what: impl Into<String>) -> impl FnOnce(rusqlite::Error) -> DbError {
    let what = what.into();
    move |e| match e {
        rusqlite::Error::QueryReturnedNoRows => DbError::NotFound(what),
        other => map_sqlite_err(other),
    }
}


#[async_trait]
impl Database for SqliteDatabase {
    // -- Users --
    async fn create_user(&self, input: &CreateUser) -> Result<User, DbError> {
        let input = input.clone();
        self.blocking(move |db| db.create_user_sync(&input)).await
    }
    async fn get_user(&self, id: &str) -> Result<User, DbError> {
        let id = id.to_string();
        self.blocking(move |db| db.get_user_sync(&id)).await
    }
    async fn find_user_by_username(&self, username: &str) -> Result<Option<User>, DbError> {
        let username = username.to_string();
        self.blocking(move |db| db.find_user_by_username_sync(&username))
            .await
    }
    async fn find_user_by_email(&self, email: &str) -> Result<Option<User>, DbError> {
        let email = email.to_string();
        self.blocking(move |db| db.find_user_by_email_sync(&email)).await
    }
    async fn list_users(&self) -> Result<Vec<User>, DbError> {
        self.blocking(|db| db.list_users_sync()).await
    }
    async fn update_user_password(&self, id: &str, password_hash: &str) -> Result<(), DbError> {
        let id = id.to_string();
        let password_hash = password_hash.to_string();
        self.blocking(move |db| db.update_user_password_sync(&id, &password_hash))
            .await
    }

    // -- Files --
    async fn insert_file(&self, record: &FileRecord) -> Result<FileRecord, DbError> {
        let record = record.clone();
        self.blocking(move |db| db.insert_file_sync(&record)).await
    }
    async fn get_file(&self, id: &str) -> Result<FileRecord, DbError> {
        let id = id.to_string();
        self.blocking(move |db| db.get_file_sync(&id)).await
    }
    async fn list_files_by_category(
        &self,
        category: Category,
        owner_id: &str,
    ) -> Result<Vec<FileRecord>, DbError> {
        let owner_id = owner_id.to_string();
        self.blocking(move |db| db.list_files_by_category_sync(category, &owner_id))
            .await
    }
    async fn count_files_by_category(
        &self,
        owner_id: &str,
    ) -> Result<Vec<(Category, i64)>, DbError> {
        let owner_id = owner_id.to_string();
        self.blocking(move |db| db.count_files_by_category_sync(&owner_id))
            .await
    }
    async fn delete_file(&self, id: &str, requester_id: &str) -> Result<FileRecord, DbError> {
        let id = id.to_string();
        let requester_id = requester_id.to_string();
        self.blocking(move |db| db.delete_file_sync(&id, &requester_id))
            .await
    }

    // -- Sessions --
    async fn create_session(
        &self,
        user_id: &str,
        token_hash: &str,
        expires_at: DateTime<Utc>,
    ) -> Result<SessionRecord, DbError> {
        let user_id = user_id.to_string();
        let token_hash = token_hash.to_string();
        self.blocking(move |db| db.create_session_sync(&user_id, &token_hash, expires_at))
            .await
    }
    async fn find_session_by_hash(
        &self,
        token_hash: &str,
    ) -> Result<Option<SessionRecord>, DbError> {
        let token_hash = token_hash.to_string();
        self.blocking(move |db| db.find_session_by_hash_sync(&token_hash))
            .await
    }
    async fn delete_session(&self, id: &str) -> Result<(), DbError> {
        let id = id.to_string();
        self.blocking(move |db| db.delete_session_sync(&id)).await
    }
    async fn delete_sessions_for_user(&self, user_id: &str) -> Result<u64, DbError> {
        let user_id = user_id.to_string();
        self.blocking(move |db| db.delete_sessions_for_user_sync(&user_id))
            .await
    }

    // -- Password resets --
    async fn create_password_reset(
        &self,
        user_id: &str,
        code_hash: &str,
        expires_at: DateTime<Utc>,
    ) -> Result<PasswordReset, DbError> {
        let user_id = user_id.to_string();
        let code_hash = code_hash.to_string();
        self.blocking(move |db| db.create_password_reset_sync(&user_id, &code_hash, expires_at))
            .await
    }
    async fn latest_pending_reset(&self, user_id: &str) -> Result<Option<PasswordReset>, DbError> {
        let user_id = user_id.to_string();
        self.blocking(move |db| db.latest_pending_reset_sync(&user_id))
            .await
    }
    async fn mark_reset_verified(&self, id: &str, token_hash: &str) -> Result<(), DbError> {
        let id = id.to_string();
        let token_hash = token_hash.to_string();
        self.blocking(move |db| db.mark_reset_verified_sync(&id, &token_hash))
            .await
    }
    async fn record_failed_reset_attempt(&self, id: &str) -> Result<i64, DbError> {
        let id = id.to_string();
        self.blocking(move |db| db.record_failed_reset_attempt_sync(&id))
            .await
    }
    async fn find_reset_by_token(
        &self,
        token_hash: &str,
    ) -> Result<Option<PasswordReset>, DbError> {
        let token_hash = token_hash.to_string();
        self.blocking(move |db| db.find_reset_by_token_sync(&token_hash))
            .await
    }
    async fn delete_resets_for_user(&self, user_id: &str) -> Result<(), DbError> {
        let user_id = user_id.to_string();
        self.blocking(move |db| db.delete_resets_for_user_sync(&user_id))
            .await
    }

    // -- Housekeeping --
    async fn purge_expired(&self, now: DateTime<Utc>) -> Result<u64, DbError> {
        self.blocking(move |db| db.purge_expired_sync(now)).await
    }
}
