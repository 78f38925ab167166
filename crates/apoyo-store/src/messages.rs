//! Append-only message log.

use rusqlite::params;

use crate::database::Database;
use crate::error::Result;
use crate::models::{now_truncated, timestamp_column, to_db_timestamp, Message};

impl Database {
    /// Persist a new message and return it with its assigned id and timestamp.
    pub fn insert_message(
        &self,
        group_id: i64,
        username: &str,
        content: &str,
        is_moderated: bool,
    ) -> Result<Message> {
        let timestamp = now_truncated();
        self.conn().execute(
            "INSERT INTO messages (group_id, username, content, timestamp, is_moderated)
             VALUES (?1, ?2, ?3, ?4, ?5)",
            params![
                group_id,
                username,
                content,
                to_db_timestamp(&timestamp),
                is_moderated,
            ],
        )?;

        Ok(Message {
            id: self.conn().last_insert_rowid(),
            group_id,
            username: username.to_string(),
            content: content.to_string(),
            timestamp,
            is_moderated,
        })
    }

    /// All messages of a group, oldest first.
    pub fn get_messages_for_group(&self, group_id: i64) -> Result<Vec<Message>> {
        let mut stmt = self.conn().prepare(
            "SELECT id, group_id, username, content, timestamp, is_moderated
             FROM messages
             WHERE group_id = ?1
             ORDER BY timestamp ASC, id ASC",
        )?;

        let rows = stmt.query_map(params![group_id], row_to_message)?;

        let mut messages = Vec::new();
        for row in rows {
            messages.push(row?);
        }
        Ok(messages)
    }
}

fn row_to_message(row: &rusqlite::Row<'_>) -> rusqlite::Result<Message> {
    Ok(Message {
        id: row.get(0)?,
        group_id: row.get(1)?,
        username: row.get(2)?,
        content: row.get(3)?,
        timestamp: timestamp_column(row, 4)?,
        is_moderated: row.get(5)?,
    })
}
