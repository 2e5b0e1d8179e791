//! Transactional command executor seam.
//!
//! The index only issues parameterized statements against the closure table
//! and the primary edge table. Anything that can run those statements inside
//! a transaction can back it; `SqliteStore` is the bundled implementation.

use crate::error::Result;
use crate::types::ItemId;

/// Named item-id bindings, e.g. `&[(":itemId", id)]`.
pub type Params<'a> = &'a [(&'a str, ItemId)];

/// Opens transactions and runs read-only queries.
pub trait CommandExecutor: Send + Sync {
    /// Starts a transaction. Dropping it without `complete` rolls it back.
    fn begin_transaction(&self) -> Result<Box<dyn Transaction + '_>>;

    /// Runs a query returning a single id column.
    fn query_ids(&self, statement: &str, params: Params<'_>) -> Result<Vec<ItemId>>;

    /// Runs a query returning two id columns.
    fn query_pairs(&self, statement: &str, params: Params<'_>) -> Result<Vec<(ItemId, ItemId)>>;
}

/// An open transaction.
pub trait Transaction {
    /// Executes one statement, returning the number of rows affected.
    fn execute(&mut self, statement: &str, params: Params<'_>) -> Result<usize>;

    /// Commits the transaction.
    fn complete(self: Box<Self>) -> Result<()>;
}
