//! # factsync - fetch, persist and watch facts
//!
//! factsync provides:
//! - `Fact` records with locally generated, stable identifiers
//! - A SQLite-backed `Store` that serializes every write onto one worker thread
//! - `LiveQuery` subscriptions that re-emit the full fact list after each commit
//! - A `FetchClient` for the remote facts API
//! - A `BindingAdapter` that exposes the latest list as observable view state

pub mod fact;
pub mod storage;
pub mod live;
pub mod fetch;
pub mod binding;
pub mod server;
pub mod config;
pub mod output;
pub mod ui;

// Re-exports for convenient access
pub use fact::{Fact, FactId};
pub use storage::{Commit, Pending, SqliteStore, Store};
pub use live::{LiveQuery, Snapshot, SubscriptionHandle};
pub use fetch::{FactSource, FetchClient, FetchConfig};
pub use binding::{BindingAdapter, FactsViewModel, Status, ViewState};

/// Result type alias for factsync operations
pub type Result<T> = std::result::Result<T, Error>;

/// Error types for factsync operations
#[derive(Debug, thiserror::Error)]
pub enum Error {
    #[error("Storage error: {0}")]
    Storage(#[from] rusqlite::Error),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    #[error("Unexpected status code: {0}")]
    Status(u16),

    #[error("Decode error: {0}")]
    Decode(#[from] serde_json::Error),

    #[error("Duplicate fact id: {0}")]
    DuplicateFact(FactId),

    #[error("Invalid fact id: {0}")]
    InvalidFactId(String),

    #[error("Live query terminated: {0}")]
    Subscription(String),

    #[error("Store is closed")]
    StoreClosed,

    #[error("Config error: {0}")]
    Config(String),
}
