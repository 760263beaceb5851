//! # unimart-store
//!
//! Device-local storage for the UniMart client, backed by SQLite.
//!
//! Nothing in here is shared with other users: the store keeps each user's
//! favorites list, the persisted sign-in session and the app settings. The
//! crate exposes a synchronous `Database` handle that wraps a
//! `rusqlite::Connection` and provides typed helpers for each of them.

pub mod database;
pub mod favorites;
pub mod migrations;
pub mod models;
pub mod session;
pub mod settings;

mod error;

pub use database::Database;
pub use error::StoreError;
pub use models::*;
