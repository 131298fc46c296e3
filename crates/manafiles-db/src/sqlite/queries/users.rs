use chrono::Utc;
use rusqlite::{params, OptionalExtension, Row};

use manafiles_core::user::CreateUser;
use manafiles_core::User;

use super::super::{map_sqlite_err, not_found_or, SqliteDatabase, SqliteResultExt};
use crate::DbError;

fn row_to_user(row: &Row) -> rusqlite::Result<User> {
    Ok(User {
        id: row.get("id")?,
        username: row.get("username")?,
        email: row.get("email")?,
        password_hash: row.get("password_hash")?,
        created_at: row.get("created_at")?,
    })
}

impl SqliteDatabase {
    pub fn create_user_sync(&self, input: &CreateUser) -> Result<User, DbError> {
        self.with_conn(|conn| {
            let id = uuid::Uuid::new_v4().to_string();
            let now = Utc::now();
            conn.execute(
                "INSERT INTO users (id, username, email, password_hash, created_at)
                 VALUES (?1, ?2, ?3, ?4, ?5)",
                params![id, input.username, input.email, input.password_hash, now],
            )
            .map_err(|e| match map_sqlite_err(e) {
                DbError::Conflict(detail) if detail.contains("users.email") => {
                    DbError::Conflict("email already registered".into())
                }
                DbError::Conflict(_) => {
                    DbError::Conflict(format!("username '{}' already exists", input.username))
                }
                other => other,
            })?;
            conn.query_row("SELECT * FROM users WHERE id = ?1", params![id], row_to_user)
                .to_db()
        })
    }

    pub fn get_user_sync(&self, id: &str) -> Result<User, DbError> {
        self.with_conn(|conn| {
            conn.query_row("SELECT * FROM users WHERE id = ?1", params![id], row_to_user)
                .map_err(not_found_or(format!("user {id}")))
        })
    }

    pub fn find_user_by_username_sync(&self, username: &str) -> Result<Option<User>, DbError> {
        self.with_conn(|conn| {
            conn.query_row(
                "SELECT * FROM users WHERE username = ?1",
                params![username],
                row_to_user,
            )
            .optional()
            .to_db()
        })
    }

    pub fn find_user_by_email_sync(&self, email: &str) -> Result<Option<User>, DbError> {
        self.with_conn(|conn| {
            conn.query_row(
                "SELECT * FROM users WHERE email = ?1",
                params![email],
                row_to_user,
            )
            .optional()
            .to_db()
        })
    }

    pub fn list_users_sync(&self) -> Result<Vec<User>, DbError> {
        self.with_conn(|conn| {
            let mut stmt = conn
                .prepare("SELECT * FROM users ORDER BY created_at, username")
                .to_db()?;
            let users = stmt
                .query_map([], row_to_user)
                .to_db()?
                .collect::<Result<Vec<_>, _>>()
                .to_db()?;
            Ok(users)
        })
    }

    pub fn update_user_password_sync(&self, id: &str, password_hash: &str) -> Result<(), DbError> {
        self.with_conn(|conn| {
            let changed = conn
                .execute(
                    "UPDATE users SET password_hash = ?1 WHERE id = ?2",
                    params![password_hash, id],
                )
                .to_db()?;
            if changed == 0 {
                return Err(DbError::NotFound(format!("user {id}")));
            }
            Ok(())
        })
    }
}
