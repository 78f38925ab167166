//! CRUD operations for [`Group`] records.

use apoyo_shared::NewGroup;
use rusqlite::{params, params_from_iter};

use crate::database::Database;
use crate::error::{Result, StoreError};
use crate::models::{now_truncated, timestamp_column, to_db_timestamp, Group};

/// Optional filters for [`Database::list_groups`].
#[derive(Debug, Clone, Default)]
pub struct GroupFilter {
    /// Exact topic match.
    pub topic: Option<String>,
    /// Substring match against name or description.
    pub search: Option<String>,
}

impl Database {
    // ------------------------------------------------------------------
    // Create
    // ------------------------------------------------------------------

    /// Insert a new group and return the stored record.
    pub fn create_group(&self, group: &NewGroup) -> Result<Group> {
        let now = now_truncated();
        let ts = to_db_timestamp(&now);
        self.conn().execute(
            "INSERT INTO groups (name, description, topic, created_at, updated_at)
             VALUES (?1, ?2, ?3, ?4, ?5)",
            params![group.name, group.description, group.topic, ts, ts],
        )?;

        Ok(Group {
            id: self.conn().last_insert_rowid(),
            name: group.name.clone(),
            description: group.description.clone(),
            topic: group.topic.clone(),
            created_at: now,
            updated_at: now,
        })
    }

    // ------------------------------------------------------------------
    // Read
    // ------------------------------------------------------------------

    /// Fetch a single group by id.
    pub fn get_group(&self, id: i64) -> Result<Group> {
        self.conn()
            .query_row(
                "SELECT id, name, description, topic, created_at, updated_at
                 FROM groups
                 WHERE id = ?1",
                params![id],
                row_to_group,
            )
            .map_err(|e| match e {
                rusqlite::Error::QueryReturnedNoRows => StoreError::NotFound,
                other => StoreError::Sqlite(other),
            })
    }

    /// List groups matching `filter`, newest first.
    pub fn list_groups(&self, filter: &GroupFilter) -> Result<Vec<Group>> {
        let mut sql = String::from(
            "SELECT id, name, description, topic, created_at, updated_at FROM groups",
        );
        let mut clauses = Vec::new();
        let mut args: Vec<String> = Vec::new();

        if let Some(topic) = filter.topic.as_deref().filter(|t| !t.is_empty()) {
            args.push(topic.to_string());
            clauses.push(format!("topic = ?{}", args.len()));
        }
        if let Some(search) = filter.search.as_deref().filter(|s| !s.is_empty()) {
            args.push(format!("%{search}%"));
            let n = args.len();
            clauses.push(format!("(name LIKE ?{n} OR description LIKE ?{n})"));
        }

        if !clauses.is_empty() {
            sql.push_str(" WHERE ");
            sql.push_str(&clauses.join(" AND "));
        }
        sql.push_str(" ORDER BY created_at DESC, id DESC");

        tracing::debug!(sql = %sql, args = ?args, "listing groups");

        let mut stmt = self.conn().prepare(&sql)?;
        let rows = stmt.query_map(params_from_iter(args.iter()), row_to_group)?;

        let mut groups = Vec::new();
        for row in rows {
            groups.push(row?);
        }
        Ok(groups)
    }
}

fn row_to_group(row: &rusqlite::Row<'_>) -> rusqlite::Result<Group> {
    Ok(Group {
        id: row.get(0)?,
        name: row.get(1)?,
        description: row.get(2)?,
        topic: row.get(3)?,
        created_at: timestamp_column(row, 4)?,
        updated_at: timestamp_column(row, 5)?,
    })
}
