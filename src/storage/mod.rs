//! Storage Layer - SQLite-backed persistence
//!
//! System of record is SQLite with one table:
//! - facts(seq, id, text)
//!
//! `SqliteStore` is the synchronous layer; `Store` puts it behind a single
//! serial worker and is what the rest of the crate talks to.

pub mod schema;
pub mod sqlite;
pub mod worker;

pub use sqlite::{SqliteStore, DbStats};
pub use worker::{Commit, Pending, Store};
