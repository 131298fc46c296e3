use chrono::{DateTime, Utc};
use rusqlite::{params, OptionalExtension, Row};

use manafiles_core::password_reset::PasswordReset;

use super::super::{not_found_or, SqliteDatabase, SqliteResultExt};
use crate::DbError;

fn row_to_reset(row: &Row) -> rusqlite::Result<PasswordReset> {
    Ok(PasswordReset {
        id: row.get("id")?,
        user_id: row.get("user_id")?,
        code_hash: row.get("code_hash")?,
        token_hash: row.get("token_hash")?,
        verified: row.get("verified")?,
        attempts: row.get("attempts")?,
        created_at: row.get("created_at")?,
        expires_at: row.get("expires_at")?,
    })
}

impl SqliteDatabase {
    pub fn create_password_reset_sync(
        &self,
        user_id: &str,
        code_hash: &str,
        expires_at: DateTime<Utc>,
    ) -> Result<PasswordReset, DbError> {
        self.with_conn(|conn| {
            let id = uuid::Uuid::new_v4().to_string();
            let now = Utc::now();
            conn.execute(
                "INSERT INTO password_resets (id, user_id, code_hash, created_at, expires_at)
                 VALUES (?1, ?2, ?3, ?4, ?5)",
                params![id, user_id, code_hash, now, expires_at],
            )
            .to_db()?;
            conn.query_row(
                "SELECT * FROM password_resets WHERE id = ?1",
                params![id],
                row_to_reset,
            )
            .to_db()
        })
    }

    /// Most recently issued reset for the user that has not been verified yet.
    pub fn latest_pending_reset_sync(
        &self,
        user_id: &str,
    ) -> Result<Option<PasswordReset>, DbError> {
        self.with_conn(|conn| {
            conn.query_row(
                "SELECT * FROM password_resets
                 WHERE user_id = ?1 AND verified = 0
                 ORDER BY created_at DESC, rowid DESC
                 LIMIT 1",
                params![user_id],
                row_to_reset,
            )
            .optional()
            .to_db()
        })
    }

    pub fn mark_reset_verified_sync(&self, id: &str, token_hash: &str) -> Result<(), DbError> {
        self.with_conn(|conn| {
            let changed = conn
                .execute(
                    "UPDATE password_resets SET verified = 1, token_hash = ?1 WHERE id = ?2",
                    params![token_hash, id],
                )
                .to_db()?;
            if changed == 0 {
                return Err(DbError::NotFound(format!("password reset {id}")));
            }
            Ok(())
        })
    }

    /// Count one wrong code against a reset and return the new total.
    pub fn record_failed_reset_attempt_sync(&self, id: &str) -> Result<i64, DbError> {
        self.with_conn(|conn| {
            conn.query_row(
                "UPDATE password_resets SET attempts = attempts + 1 WHERE id = ?1
                 RETURNING attempts",
                params![id],
                |r| r.get(0),
            )
            .map_err(not_found_or(format!("password reset {id}")))
        })
    }

    pub fn find_reset_by_token_sync(
        &self,
        token_hash: &str,
    ) -> Result<Option<PasswordReset>, DbError> {
        self.with_conn(|conn| {
            conn.query_row(
                "SELECT * FROM password_resets WHERE token_hash = ?1 AND verified = 1",
                params![token_hash],
                row_to_reset,
            )
            .optional()
            .to_db()
        })
    }

    pub fn delete_resets_for_user_sync(&self, user_id: &str) -> Result<(), DbError> {
        self.with_conn(|conn| {
            conn.execute(
                "DELETE FROM password_resets WHERE user_id = ?1",
                params![user_id],
            )
            .to_db()?;
            Ok(())
        })
    }
}
