use rusqlite::Connection;

use super::SqliteResultExt;
use crate::DbError;

pub(crate) const LATEST_VERSION: i64 = 3;

pub fn run(conn: &Connection) -> Result<(), DbError> {
    conn.execute_batch(
        "CREATE TABLE IF NOT EXISTS schema_version (
            version    INTEGER PRIMARY KEY,
            applied_at TEXT NOT NULL
        );",
    )
    .to_db()?;

    let current_version: i64 = conn
        .query_row(
            "SELECT COALESCE(MAX(version), 0) FROM schema_version",
            [],
            |r| r.get(0),
        )
        .to_db()?;

    if current_version >= LATEST_VERSION {
        return Ok(());
    }

    if current_version < 1 {
        // v1: users and their files
        conn.execute_batch(
            "
            CREATE TABLE IF NOT EXISTS users (
                id            TEXT PRIMARY KEY,
                username      TEXT NOT NULL UNIQUE,
                email         TEXT UNIQUE COLLATE NOCASE,
                password_hash TEXT NOT NULL,
                created_at    TEXT NOT NULL
            );

            CREATE TABLE IF NOT EXISTS files (
                id                TEXT PRIMARY KEY,
                owner_id          TEXT NOT NULL REFERENCES users(id),
                name              TEXT NOT NULL,
                category          TEXT NOT NULL
                                      CHECK(category IN ('images', 'documents', 'certificates', 'notes')),
                content_ref       TEXT NOT NULL,
                original_filename TEXT NOT NULL DEFAULT '',
                content_type      TEXT NOT NULL DEFAULT 'application/octet-stream',
                size_bytes        INTEGER NOT NULL DEFAULT 0,
                created_at        TEXT NOT NULL
            );
            CREATE INDEX IF NOT EXISTS idx_files_owner_category
                ON files(owner_id, category);

            INSERT INTO schema_version (version, applied_at) VALUES (1, datetime('now'));
            ",
        )
        .to_db()?;
    }

    if current_version < 2 {
        // v2: login sessions and password resets
        conn.execute_batch(
            "
            CREATE TABLE IF NOT EXISTS sessions (
                id         TEXT PRIMARY KEY,
                user_id    TEXT NOT NULL REFERENCES users(id) ON DELETE CASCADE,
                token_hash TEXT NOT NULL UNIQUE,
                created_at TEXT NOT NULL,
                expires_at TEXT NOT NULL
            );
            CREATE INDEX IF NOT EXISTS idx_sessions_user ON sessions(user_id);

            CREATE TABLE IF NOT EXISTS password_resets (
                id         TEXT PRIMARY KEY,
                user_id    TEXT NOT NULL REFERENCES users(id) ON DELETE CASCADE,
                code_hash  TEXT NOT NULL,
                token_hash TEXT UNIQUE,
                verified   INTEGER NOT NULL DEFAULT 0,
                created_at TEXT NOT NULL,
                expires_at TEXT NOT NULL
            );
            CREATE INDEX IF NOT EXISTS idx_password_resets_user ON password_resets(user_id);

            INSERT INTO schema_version (version, applied_at) VALUES (2, datetime('now'));
            ",
        )
        .to_db()?;
    }

    if current_version < 3 {
        // v3: failed verification counter on password resets
        conn.execute_batch(
            "
            ALTER TABLE password_resets ADD COLUMN attempts INTEGER NOT NULL DEFAULT 0;

            INSERT INTO schema_version (version, applied_at) VALUES (3, datetime('now'));
            ",
        )
        .to_db()?;
    }

    Ok(())
}
