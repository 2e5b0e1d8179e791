//! Caller-supplied update context.
//!
//! An `UpdateScope` tells the index whether a batch of tree edits is in
//! progress. Immediate scopes apply every event straight away; bulk scopes
//! collect events in their own `DelayedActionQueue` until the scope is left.
//!
//! Bulk scopes are not synchronized. Callers must not nest them or drive
//! two of them concurrently against the same index.

use crate::delayed::DelayedActionQueue;
use crate::maintainer::DescendantsIndex;
use crate::types::ItemId;

#[derive(Debug, Default)]
pub struct UpdateScope {
    queue: Option<DelayedActionQueue>,
}

impl UpdateScope {
    pub fn immediate() -> Self {
        Self { queue: None }
    }

    pub fn bulk() -> Self {
        Self {
            queue: Some(DelayedActionQueue::new()),
        }
    }

    pub fn is_bulk_active(&self) -> bool {
        self.queue.is_some()
    }

    /// Number of queued actions; zero for immediate scopes.
    pub fn pending(&self) -> usize {
        self.queue.as_ref().map_or(0, DelayedActionQueue::count)
    }

    pub(crate) fn queue_mut(&mut self) -> Option<&mut DelayedActionQueue> {
        self.queue.as_mut()
    }

    /// Ends bulk mode, handing back the queue. Later calls return `None`.
    pub(crate) fn take_queue(&mut self) -> Option<DelayedActionQueue> {
        self.queue.take()
    }
}

/// A bulk scope that is left when dropped.
///
/// ```ignore
/// let mut bulk = index.begin_bulk_update();
/// provider.create_item(bulk.scope_mut(), child, parent)?;
/// drop(bulk); // replays or rebuilds
/// ```
#[derive(Debug)]
pub struct BulkUpdate<'a> {
    index: &'a DescendantsIndex,
    scope: UpdateScope,
}

impl<'a> BulkUpdate<'a> {
    pub(crate) fn new(index: &'a DescendantsIndex) -> Self {
        Self {
            index,
            scope: UpdateScope::bulk(),
        }
    }

    pub fn item_created(&mut self, parent_id: ItemId, item_id: ItemId) {
        self.index.item_created(&mut self.scope, parent_id, item_id);
    }

    pub fn item_deleted(&mut self, item_id: ItemId) {
        self.index.item_deleted(&mut self.scope, item_id);
    }

    pub fn item_moved(&mut self, item_id: ItemId, new_parent_id: ItemId) {
        self.index.item_moved(&mut self.scope, item_id, new_parent_id);
    }

    pub fn pending(&self) -> usize {
        self.scope.pending()
    }

    /// The underlying scope, for passing to `ItemProvider` calls.
    pub fn scope_mut(&mut self) -> &mut UpdateScope {
        &mut self.scope
    }

    /// Leaves the scope now instead of at drop.
    pub fn finish(self) {}
}

impl Drop for BulkUpdate<'_> {
    fn drop(&mut self) {
        self.index.leave_scope(&mut self.scope);
    }
}
