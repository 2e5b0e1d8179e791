//! Background listener reconciling restored subtrees.

use std::io;
use std::sync::Arc;
use std::thread::{self, JoinHandle};

use tokio::sync::broadcast::{self, error::RecvError};

use crate::bus::TreeEvent;
use crate::maintainer::DescendantsIndex;

/// Spawns the `descendants-restore` thread.
///
/// Events for other databases are ignored. If the receiver lags, the missed
/// events cannot be recovered, so the whole table is rebuilt. The thread
/// exits once every sender of the bus is dropped.
pub fn spawn_restore_listener(
    index: Arc<DescendantsIndex>,
    mut receiver: broadcast::Receiver<TreeEvent>,
    database_name: String,
) -> io::Result<JoinHandle<()>> {
    thread::Builder::new()
        .name("descendants-restore".to_string())
        .spawn(move || loop {
            match receiver.blocking_recv() {
                Ok(TreeEvent::RestoreItemCompleted(event)) => {
                    if !event.database_name.eq_ignore_ascii_case(&database_name) {
                        continue;
                    }
                    log::debug!(
                        "descendants restore completed db={} parent={} item={}",
                        event.database_name,
                        event.parent_id,
                        event.item_id
                    );
                    index.restore_item_completed(event.parent_id, event.item_id);
                }
                Err(RecvError::Lagged(missed)) => {
                    log::warn!(
                        "descendants restore listener lagged db={} missed={}, rebuilding",
                        database_name,
                        missed
                    );
                    index.rebuild_all();
                }
                Err(RecvError::Closed) => {
                    log::debug!("descendants restore listener stopped db={}", database_name);
                    break;
                }
            }
        })
}
