//! v001 -- Initial schema creation.
//!
//! Creates the `groups` catalog and the append-only `messages` log.

use rusqlite::Connection;

/// SQL executed when upgrading from version 0 to version 1.
const UP_SQL: &str = r#"
-- ----------------------------------------------------------------
-- Groups
-- ----------------------------------------------------------------
CREATE TABLE IF NOT EXISTS groups (
    id          INTEGER PRIMARY KEY AUTOINCREMENT,
    name        TEXT NOT NULL,
    description TEXT NOT NULL DEFAULT '',
    topic       TEXT NOT NULL,
    created_at  TEXT NOT NULL,                -- RFC-3339, microsecond precision
    updated_at  TEXT NOT NULL
);

CREATE INDEX IF NOT EXISTS idx_groups_topic ON groups(topic);

-- ----------------------------------------------------------------
-- Messages
-- ----------------------------------------------------------------
-- group_id is not a foreign key: messages may reference groups that are
-- absent from the catalog.
CREATE TABLE IF NOT EXISTS messages (
    id           INTEGER PRIMARY KEY AUTOINCREMENT,
    group_id     INTEGER NOT NULL,
    username     TEXT NOT NULL,
    content      TEXT NOT NULL,
    timestamp    TEXT NOT NULL,               -- RFC-3339, microsecond precision
    is_moderated INTEGER NOT NULL DEFAULT 0   -- boolean 0/1
);

CREATE INDEX IF NOT EXISTS idx_messages_group_ts
    ON messages(group_id, timestamp ASC);
"#;

/// Apply the initial migration.
pub fn up(conn: &Connection) -> Result<(), rusqlite::Error> {
    conn.execute_batch(UP_SQL)
}
