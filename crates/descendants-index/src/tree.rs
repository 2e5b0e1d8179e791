//! Read access to the primary item tree.

use crate::error::Result;
use crate::types::{Item, ItemId};

/// Looks items up in the authoritative tree.
pub trait TreeAccessor: Send + Sync {
    /// Returns the item with its current children, or `None` if it does not exist.
    fn get_item(&self, id: ItemId) -> Result<Option<Item>>;
}
