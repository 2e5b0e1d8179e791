//! Core value types shared by the index, the store adapter and the bus.

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::error::{IndexError, Result};

/// Identifier of an item in the content tree.
///
/// `ItemId::NULL` is the root sentinel: items whose parent is `NULL` are roots
/// and never appear as a descendant of anything.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ItemId(Uuid);

impl ItemId {
    pub const NULL: ItemId = ItemId(Uuid::nil());

    /// Creates a fresh random id.
    pub fn new() -> Self {
        Self(Uuid::new_v4())
    }

    pub fn from_uuid(uuid: Uuid) -> Self {
        Self(uuid)
    }

    pub fn as_uuid(&self) -> &Uuid {
        &self.0
    }

    #[inline]
    pub fn is_null(&self) -> bool {
        self.0.is_nil()
    }

    /// Parses the hyphenated text form stored in the tables.
    pub fn parse(value: &str) -> Result<Self> {
        Uuid::parse_str(value)
            .map(Self)
            .map_err(|error| IndexError::InvalidData(format!("invalid item id {value:?}: {error}")))
    }
}

impl Default for ItemId {
    fn default() -> Self {
        Self::NULL
    }
}

impl fmt::Display for ItemId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0.hyphenated())
    }
}

impl FromStr for ItemId {
    type Err = IndexError;

    fn from_str(value: &str) -> Result<Self> {
        Self::parse(value)
    }
}

/// An item as seen through the tree accessor.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Item {
    pub id: ItemId,
    pub parent_id: ItemId,
    children: Vec<ItemId>,
}

impl Item {
    pub fn new(id: ItemId, parent_id: ItemId, children: Vec<ItemId>) -> Self {
        Self {
            id,
            parent_id,
            children,
        }
    }

    /// Child ids in the accessor's stable order. Can be iterated repeatedly.
    pub fn children(&self) -> impl DoubleEndedIterator<Item = ItemId> + '_ {
        self.children.iter().copied()
    }

    pub fn has_children(&self) -> bool {
        !self.children.is_empty()
    }
}

/// One row of the `Descendants` closure table.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ClosureRow {
    /// Opaque row identifier.
    pub id: String,
    pub ancestor: ItemId,
    pub descendant: ItemId,
}

/// A snapshot of index maintenance counters.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct IndexStats {
    /// Completed full rebuilds.
    pub rebuilds: u64,
    /// Index updates or rebuilds that failed after retries.
    pub failures: u64,
    /// Whether edits were skipped and a reconcile is still owed.
    pub needs_update: bool,
    /// Whether a background rebuild was started and has not been released.
    pub rebuild_outstanding: bool,
}
