//! Deferred per-node index updates collected during a bulk-update scope.

use std::collections::VecDeque;

use crate::error::{IndexError, Result};
use crate::types::ItemId;

/// A tree edit whose index update was postponed.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DelayedAction {
    Created { parent_id: ItemId, item_id: ItemId },
    Deleted { item_id: ItemId },
}

impl DelayedAction {
    pub fn item_id(&self) -> ItemId {
        match self {
            Self::Created { item_id, .. } | Self::Deleted { item_id } => *item_id,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Created { .. } => "created",
            Self::Deleted { .. } => "deleted",
        }
    }
}

/// FIFO buffer of delayed actions. No deduplication: repeated actions for the
/// same item are replayed in arrival order. Not synchronized; owned by one
/// bulk scope at a time.
#[derive(Debug, Default)]
pub struct DelayedActionQueue {
    actions: VecDeque<DelayedAction>,
}

impl DelayedActionQueue {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn enqueue(&mut self, action: DelayedAction) {
        self.actions.push_back(action);
    }

    pub fn dequeue(&mut self) -> Result<DelayedAction> {
        self.actions.pop_front().ok_or(IndexError::EmptyQueue)
    }

    pub fn count(&self) -> usize {
        self.actions.len()
    }

    pub fn is_empty(&self) -> bool {
        self.actions.is_empty()
    }

    pub fn clear(&mut self) {
        self.actions.clear();
    }
}
