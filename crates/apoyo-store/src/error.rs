use thiserror::Error;

/// Failures surfaced by the group catalog and the message log.
#[derive(Error, Debug)]
pub enum StoreError {
    #[error("Database error: {0}")]
    Sqlite(#[from] rusqlite::Error),

    /// Creating the directory that holds the database file failed, or a
    /// blocking storage task could not be joined.
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// `get_group` was asked for an id the catalog does not hold. Message
    /// queries never produce this: an unknown group simply has no history.
    #[error("Record not found")]
    NotFound,

    /// A schema step failed; the database stays at the previous version.
    #[error("Migration to schema v{version} failed: {source}")]
    Migration {
        version: u32,
        #[source]
        source: rusqlite::Error,
    },
}

pub type Result<T> = std::result::Result<T, StoreError>;
