use chrono::{DateTime, Utc};
use rusqlite::{params, OptionalExtension, Row};

use manafiles_core::session::SessionRecord;

use super::super::{SqliteDatabase, SqliteResultExt};
use crate::DbError;

fn row_to_session(row: &Row) -> rusqlite::Result<SessionRecord> {
    Ok(SessionRecord {
        id: row.get("id")?,
        user_id: row.get("user_id")?,
        token_hash: row.get("token_hash")?,
        created_at: row.get("created_at")?,
        expires_at: row.get("expires_at")?,
    })
}

impl SqliteDatabase {
    pub fn create_session_sync(
        &self,
        user_id: &str,
        token_hash: &str,
        expires_at: DateTime<Utc>,
    ) -> Result<SessionRecord, DbError> {
        self.with_conn(|conn| {
            let id = uuid::Uuid::new_v4().to_string();
            let now = Utc::now();
            conn.execute(
                "INSERT INTO sessions (id, user_id, token_hash, created_at, expires_at)
                 VALUES (?1, ?2, ?3, ?4, ?5)",
                params![id, user_id, token_hash, now, expires_at],
            )
            .to_db()?;
            conn.query_row(
                "SELECT * FROM sessions WHERE id = ?1",
                params![id],
                row_to_session,
            )
            .to_db()
        })
    }

    pub fn find_session_by_hash_sync(
        &self,
        token_hash: &str,
    ) -> Result<Option<SessionRecord>, DbError> {
        self.with_conn(|conn| {
            conn.query_row(
                "SELECT * FROM sessions WHERE token_hash = ?1",
                params![token_hash],
                row_to_session,
            )
            .optional()
            .to_db()
        })
    }

    pub fn delete_session_sync(&self, id: &str) -> Result<(), DbError> {
        self.with_conn(|conn| {
            conn.execute("DELETE FROM sessions WHERE id = ?1", params![id])
                .to_db()?;
            Ok(())
        })
    }

    pub fn delete_sessions_for_user_sync(&self, user_id: &str) -> Result<u64, DbError> {
        self.with_conn(|conn| {
            let n = conn
                .execute("DELETE FROM sessions WHERE user_id = ?1", params![user_id])
                .to_db()?;
            Ok(n as u64)
        })
    }

    /// Drop expired sessions and password resets. Returns the number of rows removed.
    pub fn purge_expired_sync(&self, now: DateTime<Utc>) -> Result<u64, DbError> {
        self.with_conn(|conn| {
            let sessions = conn
                .execute("DELETE FROM sessions WHERE expires_at <= ?1", params![now])
                .to_db()?;
            let resets = conn
                .execute(
                    "DELETE FROM password_resets WHERE expires_at <= ?1",
                    params![now],
                )
                .to_db()?;
            if sessions + resets > 0 {
                tracing::debug!(sessions, resets, "purged expired rows");
            }
            Ok((sessions + resets) as u64)
        })
    }
}
