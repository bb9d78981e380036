//! Row decoding helpers shared by the CRUD modules.

use chrono::{DateTime, SecondsFormat, Utc};
use mural_shared::AuthorSummary;

/// Fixed-width RFC 3339 so that text ordering matches time ordering.
pub(crate) fn encode_ts(ts: &DateTime<Utc>) -> String {
    ts.to_rfc3339_opts(SecondsFormat::Micros, true)
}

pub(crate) fn decode_ts(idx: usize, s: &str) -> rusqlite::Result<DateTime<Utc>> {
    DateTime::parse_from_rfc3339(s)
        .map(|dt| dt.with_timezone(&Utc))
        .map_err(|e| {
            rusqlite::Error::FromSqlConversionFailure(idx, rusqlite::types::Type::Text, Box::new(e))
        })
}

/// Read an author summary from four consecutive columns starting at `start`
/// (`id, name, email, avatar`).
pub(crate) fn author_at(row: &rusqlite::Row<'_>, start: usize) -> rusqlite::Result<AuthorSummary> {
    Ok(AuthorSummary {
        id: row.get(start)?,
        name: row.get(start + 1)?,
        email: row.get(start + 2)?,
        avatar: row.get(start + 3)?,
    })
}

pub(crate) fn new_id() -> String {
    uuid::Uuid::new_v4().to_string()
}
