//! Schema versioning for the Apoyo database.
//!
//! The schema version lives in SQLite's `user_version` pragma. Opening a
//! database applies every step above the stored version, each inside its own
//! transaction together with the version bump, so a failed step leaves the
//! file at the last good version.

pub mod v001_initial;

use rusqlite::Connection;

use crate::error::{Result, StoreError};

type Step = fn(&Connection) -> rusqlite::Result<()>;

/// Ordered schema steps, keyed by the version they produce.
const STEPS: &[(u32, Step)] = &[(1, v001_initial::up)];

/// Schema version of a fully migrated database.
pub const CURRENT_VERSION: u32 = 1;

/// Bring `conn` up to [`CURRENT_VERSION`].
pub fn run_migrations(conn: &Connection) -> Result<()> {
    let stored: u32 = conn.pragma_query_value(None, "user_version", |row| row.get(0))?;
    if stored >= CURRENT_VERSION {
        tracing::debug!(version = stored, "database schema up to date");
        return Ok(());
    }

    for &(version, step) in STEPS.iter().filter(|(v, _)| *v > stored) {
        tracing::info!(from = stored, to = version, "migrating database schema");
        let tx = conn.unchecked_transaction()?;
        step(&tx).map_err(|source| StoreError::Migration { version, source })?;
        tx.pragma_update(None, "user_version", version)?;
        tx.commit()?;
    }

    Ok(())
}
