//! Reads over the closure table.
//!
//! Queries take the lock shared, so they never observe a rebuild halfway.

use crate::error::Result;
use crate::maintainer::DescendantsIndex;
use crate::statements;
use crate::types::ItemId;

impl DescendantsIndex {
    /// Proper ancestors of `item_id`, excluding the root sentinel.
    pub fn ancestors_of(&self, item_id: ItemId) -> Result<Vec<ItemId>> {
        let _shared = self.lock.read();
        self.executor
            .query_ids(statements::SELECT_ANCESTORS, &[(":itemId", item_id)])
    }

    /// Every node below `item_id`.
    pub fn descendants_of(&self, item_id: ItemId) -> Result<Vec<ItemId>> {
        let _shared = self.lock.read();
        self.executor
            .query_ids(statements::SELECT_DESCENDANTS, &[(":itemId", item_id)])
    }

    pub fn is_ancestor(&self, ancestor_id: ItemId, item_id: ItemId) -> Result<bool> {
        let _shared = self.lock.read();
        let found = self.executor.query_ids(
            statements::SELECT_IS_ANCESTOR,
            &[(":ancestorId", ancestor_id), (":itemId", item_id)],
        )?;
        Ok(!found.is_empty())
    }

    /// All `(ancestor, descendant)` pairs, sorted.
    pub fn closure_rows(&self) -> Result<Vec<(ItemId, ItemId)>> {
        let _shared = self.lock.read();
        self.executor
            .query_pairs(statements::SELECT_CLOSURE_PAIRS, &[])
    }
}
