//! # apoyo-store
//!
//! Durable storage for support groups and their messages, backed by SQLite.
//!
//! The crate exposes a synchronous `Database` handle that wraps a
//! `rusqlite::Connection` and provides typed helpers for every domain model.
//! Callers running on an async runtime are expected to move calls onto a
//! blocking thread.

pub mod database;
pub mod groups;
pub mod messages;
pub mod migrations;
pub mod models;

mod error;

pub use database::Database;
pub use error::StoreError;
pub use groups::GroupFilter;
pub use models::*;
