use rusqlite::types::Type;
use rusqlite::{params, Row};

use manafiles_core::{Category, FileRecord};

use super::super::{map_sqlite_err, not_found_or, SqliteDatabase, SqliteResultExt};
use crate::DbError;

fn row_to_file(row: &Row) -> rusqlite::Result<FileRecord> {
    let category_str: String = row.get("category")?;
    let category = Category::parse_str(&category_str).ok_or_else(|| {
        rusqlite::Error::FromSqlConversionFailure(
            3,
            Type::Text,
            format!("unknown category '{category_str}'").into(),
        )
    })?;
    Ok(FileRecord {
        id: row.get("id")?,
        owner_id: row.get("owner_id")?,
        name: row.get("name")?,
        category,
        content_ref: row.get("content_ref")?,
        original_filename: row.get("original_filename")?,
        content_type: row.get("content_type")?,
        size_bytes: row.get("size_bytes")?,
        created_at: row.get("created_at")?,
    })
}

impl SqliteDatabase {
    pub fn insert_file_sync(&self, record: &FileRecord) -> Result<FileRecord, DbError> {
        self.with_conn(|conn| {
            conn.execute(
                "INSERT INTO files (id, owner_id, name, category, content_ref,
                                    original_filename, content_type, size_bytes, created_at)
                 VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9)",
                params![
                    record.id,
                    record.owner_id,
                    record.name,
                    record.category.as_str(),
                    record.content_ref,
                    record.original_filename,
                    record.content_type,
                    record.size_bytes,
                    record.created_at,
                ],
            )
            .map_err(|e| match map_sqlite_err(e) {
                DbError::Conflict(_) => {
                    DbError::Conflict(format!("file {} already exists", record.id))
                }
                DbError::InvalidReference(_) => {
                    DbError::InvalidReference(format!("owner {} does not exist", record.owner_id))
                }
                other => other,
            })?;
            conn.query_row(
                "SELECT * FROM files WHERE id = ?1",
                params![record.id],
                row_to_file,
            )
            .to_db()
        })
    }

    pub fn get_file_sync(&self, id: &str) -> Result<FileRecord, DbError> {
        self.with_conn(|conn| {
            conn.query_row("SELECT * FROM files WHERE id = ?1", params![id], row_to_file)
                .map_err(not_found_or(format!("file {id}")))
        })
    }

    pub fn list_files_by_category_sync(
        &self,
        category: Category,
        owner_id: &str,
    ) -> Result<Vec<FileRecord>, DbError> {
        self.with_conn(|conn| {
            let mut stmt = conn
                .prepare(
                    "SELECT * FROM files
                     WHERE owner_id = ?1 AND category = ?2
                     ORDER BY created_at, rowid",
                )
                .to_db()?;
            let files = stmt
                .query_map(params![owner_id, category.as_str()], row_to_file)
                .to_db()?
                .collect::<Result<Vec<_>, _>>()
                .to_db()?;
            Ok(files)
        })
    }

    /// One entry per category, in `Category::ALL` order, zero-filled.
    pub fn count_files_by_category_sync(
        &self,
        owner_id: &str,
    ) -> Result<Vec<(Category, i64)>, DbError> {
        self.with_conn(|conn| {
            let mut stmt = conn
                .prepare(
                    "SELECT category, COUNT(*) FROM files
                     WHERE owner_id = ?1
                     GROUP BY category",
                )
                .to_db()?;
            let rows = stmt
                .query_map(params![owner_id], |row| {
                    Ok((row.get::<_, String>(0)?, row.get::<_, i64>(1)?))
                })
                .to_db()?
                .collect::<Result<Vec<_>, _>>()
                .to_db()?;

            Ok(Category::ALL
                .iter()
                .map(|cat| {
                    let count = rows
                        .iter()
                        .find(|(name, _)| name == cat.as_str())
                        .map(|(_, n)| *n)
                        .unwrap_or(0);
                    (*cat, count)
                })
                .collect())
        })
    }

    /// Remove a record owned by `requester_id` and return what was removed.
    pub fn delete_file_sync(&self, id: &str, requester_id: &str) -> Result<FileRecord, DbError> {
        self.with_conn(|conn| {
            let record = conn
                .query_row("SELECT * FROM files WHERE id = ?1", params![id], row_to_file)
                .map_err(not_found_or(format!("file {id}")))?;
            if !record.is_owned_by(requester_id) {
                return Err(DbError::Forbidden(format!(
                    "file {id} belongs to another user"
                )));
            }
            conn.execute("DELETE FROM files WHERE id = ?1", params![id])
                .to_db()?;
            Ok(record)
        })
    }
}
