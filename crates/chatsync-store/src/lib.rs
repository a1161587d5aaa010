//! # chatsync-store
//!
//! Local chat archive backed by SQLite.
//!
//! The crate exposes a [`Database`] handle that is safe to share between
//! threads: the background sync writer and any number of RPC request
//! handlers use the same handle concurrently. Message text is indexed with
//! FTS5 when the SQLite build supports it.

pub mod chats;
pub mod database;
pub mod messages;
pub mod migrations;
pub mod models;
pub mod search;

mod error;

pub use database::Database;
pub use error::{Result, StoreError};
pub use models::*;
