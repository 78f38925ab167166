//! Domain model structs persisted in the SQLite database.
//!
//! Every struct derives `Serialize` and `Deserialize`; the JSON encoding is
//! the wire format served over HTTP and pushed to WebSocket subscribers.

use chrono::{DateTime, SecondsFormat, SubsecRound, Utc};
use serde::{Deserialize, Serialize};

// ---------------------------------------------------------------------------
// Group
// ---------------------------------------------------------------------------

/// A support group that partitions messages and live subscribers.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct Group {
    /// Identifier assigned by the database.
    pub id: i64,
    pub name: String,
    pub description: String,
    /// Free-form theme used for filtering (e.g. "ansiedad", "duelo").
    pub topic: String,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

// ---------------------------------------------------------------------------
// Message
// ---------------------------------------------------------------------------

/// A persisted chat message.  Immutable once stored.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct Message {
    /// Identifier assigned by the database on insert.
    pub id: i64,
    /// The group this message was posted to.
    pub group_id: i64,
    /// Display name of the sender.
    pub username: String,
    pub content: String,
    /// Server-assigned creation time.
    pub timestamp: DateTime<Utc>,
    /// Whether the moderation filter flagged the content at ingestion.
    pub is_moderated: bool,
}

// ---------------------------------------------------------------------------
// Timestamp encoding
// ---------------------------------------------------------------------------

/// Timestamps are stored as fixed-width RFC-3339 text (UTC, microseconds) so
/// that lexical order in SQLite matches chronological order.
pub(crate) fn to_db_timestamp(ts: &DateTime<Utc>) -> String {
    ts.to_rfc3339_opts(SecondsFormat::Micros, true)
}

/// Current time truncated to the precision kept in the database, so values
/// returned from an insert compare equal to the same row read back later.
pub(crate) fn now_truncated() -> DateTime<Utc> {
    Utc::now().trunc_subsecs(6)
}

pub(crate) fn timestamp_column(row: &rusqlite::Row<'_>, idx: usize) -> rusqlite::Result<DateTime<Utc>> {
    let raw: String = row.get(idx)?;
    DateTime::parse_from_rfc3339(&raw)
        .map(|dt| dt.with_timezone(&Utc))
        .map_err(|e| {
            rusqlite::Error::FromSqlConversionFailure(idx, rusqlite::types::Type::Text, Box::new(e))
        })
}
