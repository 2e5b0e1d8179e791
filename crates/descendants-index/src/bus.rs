use serde::{Deserialize, Serialize};
use tokio::sync::broadcast;

use crate::types::ItemId;

/// A subtree restored from an archive is back in `Items`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RestoreItemCompleted {
    pub database_name: String,
    pub parent_id: ItemId,
    pub item_id: ItemId,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum TreeEvent {
    RestoreItemCompleted(RestoreItemCompleted),
}

#[derive(Debug, Clone)]
pub struct NotificationBus {
    sender: broadcast::Sender<TreeEvent>,
}

impl NotificationBus {
    pub fn new(capacity: usize) -> Self {
        let (sender, _) = broadcast::channel(capacity);
        Self { sender }
    }

    pub fn subscribe(&self) -> broadcast::Receiver<TreeEvent> {
        self.sender.subscribe()
    }

    pub fn publish(
        &self,
        event: TreeEvent,
    ) -> Result<usize, broadcast::error::SendError<TreeEvent>> {
        self.sender.send(event)
    }

    pub fn publish_restore_completed(
        &self,
        database_name: impl Into<String>,
        parent_id: ItemId,
        item_id: ItemId,
    ) -> Result<usize, broadcast::error::SendError<TreeEvent>> {
        self.publish(TreeEvent::RestoreItemCompleted(RestoreItemCompleted {
            database_name: database_name.into(),
            parent_id,
            item_id,
        }))
    }
}
