//! Descendants closure-table index for hierarchical item trees.
//!
//! This crate keeps an ancestor/descendant relation table consistent with a
//! live item tree so that "is X an ancestor of Y" and "list descendants of X"
//! run in O(result size):
//! - Incremental maintenance on create, delete, move and restore
//! - Bulk-update batching with a threshold fallback to a full rebuild
//! - Shared/exclusive locking between per-node writers and the rebuild
//! - Retry of transient backend failures through an injected policy

pub mod bus;
pub mod config;
pub mod delayed;
pub mod error;
pub mod executor;
pub mod lock;
pub mod maintainer;
pub mod provider;
pub mod query;
pub mod rebuild;
pub mod restore;
pub mod retry;
pub mod scope;
pub mod sqlite;
pub mod statements;
pub mod tree;
pub mod types;

#[cfg(test)]
mod testing;

// Re-export main types
pub use bus::{NotificationBus, RestoreItemCompleted, TreeEvent};
pub use config::{load_settings, DescendantsSettings, RetrySettings};
pub use delayed::{DelayedAction, DelayedActionQueue};
pub use error::{IndexError, Result};
pub use executor::{CommandExecutor, Params, Transaction};
pub use lock::DescendantsLock;
pub use maintainer::DescendantsIndex;
pub use provider::{BlobCleanup, ItemProvider};
pub use rebuild::RebuildReport;
pub use retry::{RetryPolicy, Retryer};
pub use scope::{BulkUpdate, UpdateScope};
pub use sqlite::SqliteStore;
pub use tree::TreeAccessor;
pub use types::{ClosureRow, IndexStats, Item, ItemId};
