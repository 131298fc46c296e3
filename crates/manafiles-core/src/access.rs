//! Ownership rules for file visibility.
//!
//! A caller sees a file only when it is the file's owner. An anonymous
//! caller sees nothing.

use crate::{Category, FileRecord, Session};

/// The owner id a listing must be scoped to, or `None` for an anonymous
/// caller whose listing is always empty.
pub fn owner_scope(session: Option<&Session>) -> Option<&str> {
    session.map(Session::user_id)
}

/// Whether `requester_id` may read or delete `record`.
pub fn can_access(record: &FileRecord, requester_id: &str) -> bool {
    record.is_owned_by(requester_id)
}

/// Select the records an identity may see in one category, keeping their
/// original order.
pub fn filter_visible<'a, I>(
    records: I,
    owner: Option<&str>,
    category: Category,
) -> Vec<&'a FileRecord>
where
    I: IntoIterator<Item = &'a FileRecord>,
{
    let Some(owner) = owner else {
        return Vec::new();
    };
    records
        .into_iter()
        .filter(|r| r.category == category && r.is_owned_by(owner))
        .collect()
}
