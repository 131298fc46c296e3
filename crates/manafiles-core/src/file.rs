use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::Category;

pub const DEFAULT_CONTENT_TYPE: &str = "application/octet-stream";

/// Metadata for one uploaded file. Records are immutable once stored.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FileRecord {
    pub id: String,
    pub owner_id: String,
    pub name: String,
    pub category: Category,
    /// Object store key holding the file bytes.
    pub content_ref: String,
    #[serde(default)]
    pub original_filename: String,
    pub content_type: String,
    pub size_bytes: i64,
    pub created_at: DateTime<Utc>,
}

impl FileRecord {
    pub fn is_owned_by(&self, user_id: &str) -> bool {
        self.owner_id == user_id
    }

    /// Name offered to the browser on download: the label plus the
    /// extension of the uploaded file, if it had one.
    pub fn download_name(&self) -> String {
        match extension_of(&self.original_filename) {
            Some(ext) if !self.name.ends_with(&format!(".{ext}")) => {
                format!("{}.{ext}", self.name)
            }
            _ => self.name.clone(),
        }
    }
}

/// Derive a label from an uploaded file name by dropping its extension.
///
/// `"report.final.pdf"` becomes `"report.final"`; names without a dot, or
/// with only a leading dot, are returned unchanged.
pub fn label_from_filename(filename: &str) -> String {
    let trimmed = filename.trim();
    match trimmed.rfind('.') {
        Some(idx) if idx > 0 => trimmed[..idx].to_string(),
        _ => trimmed.to_string(),
    }
}

fn extension_of(filename: &str) -> Option<&str> {
    let idx = filename.rfind('.')?;
    if idx == 0 || idx + 1 == filename.len() {
        return None;
    }
    Some(&filename[idx + 1..])
}
