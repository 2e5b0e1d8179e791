//! Primary tree edits with index hooks.
//!
//! `ItemProvider` writes the `Items` row first and only then informs the
//! index. A failure to write `Items` is returned to the caller; a failure to
//! update the index is not.

use std::io;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::thread::{self, JoinHandle};

use fnv::FnvHashSet;

use crate::bus::NotificationBus;
use crate::error::{IndexError, Result};
use crate::maintainer::DescendantsIndex;
use crate::restore::spawn_restore_listener;
use crate::scope::UpdateScope;
use crate::statements;
use crate::types::{Item, ItemId};

/// Removes storage that belonged to a deleted item.
pub trait BlobCleanup: Send + Sync {
    fn remove_related_blobs(&self, item: &Item) -> Result<()>;
}

pub struct ItemProvider {
    index: Arc<DescendantsIndex>,
    blob_cleanup: Option<Arc<dyn BlobCleanup>>,
    listening: AtomicBool,
}

impl ItemProvider {
    pub fn new(index: Arc<DescendantsIndex>) -> Self {
        Self {
            index,
            blob_cleanup: None,
            listening: AtomicBool::new(false),
        }
    }

    pub fn with_blob_cleanup(mut self, cleanup: Arc<dyn BlobCleanup>) -> Self {
        self.blob_cleanup = Some(cleanup);
        self
    }

    pub fn index(&self) -> &Arc<DescendantsIndex> {
        &self.index
    }

    pub fn get_item(&self, item_id: ItemId) -> Result<Option<Item>> {
        self.index.tree.get_item(item_id)
    }

    /// Inserts `item_id` under `parent_id` (`ItemId::NULL` for a root).
    pub fn create_item(
        &self,
        scope: &mut UpdateScope,
        item_id: ItemId,
        parent_id: ItemId,
    ) -> Result<()> {
        if item_id.is_null() {
            return Err(IndexError::InvalidInput(
                "the null id cannot name an item".to_string(),
            ));
        }
        if item_id == parent_id {
            return Err(IndexError::InvalidInput(format!(
                "item {item_id} cannot be its own parent"
            )));
        }

        let _shared = self.index.lock.read();
        let params = [(":itemId", item_id), (":parentId", parent_id)];
        self.index.retryer.execute_no_result(&mut || {
            let mut tx = self.index.executor.begin_transaction()?;
            tx.execute(statements::INSERT_ITEM, &params)?;
            tx.complete()
        })?;

        self.index.item_created_shared(scope, parent_id, item_id);
        Ok(())
    }

    /// Deletes `item_id` and its whole subtree. Returns false when the item
    /// does not exist.
    pub fn delete_item(&self, scope: &mut UpdateScope, item_id: ItemId) -> Result<bool> {
        let Some(item) = self.index.tree.get_item(item_id)? else {
            return Ok(false);
        };

        {
            let _shared = self.index.lock.read();
            let params = [(":itemId", item_id)];
            self.index.retryer.execute_no_result(&mut || {
                let mut tx = self.index.executor.begin_transaction()?;
                tx.execute(statements::DELETE_ITEM_SUBTREE, &params)?;
                tx.complete()
            })?;

            self.index.item_deleted_shared(scope, item_id);
        }

        if self.index.settings.remove_unused_blobs_on_save {
            if let Some(cleanup) = &self.blob_cleanup {
                spawn_blob_cleanup(Arc::clone(cleanup), item);
            }
        }
        Ok(true)
    }

    /// Reparents `item_id` under `new_parent_id`, carrying its subtree.
    pub fn move_item(
        &self,
        scope: &mut UpdateScope,
        item_id: ItemId,
        new_parent_id: ItemId,
    ) -> Result<()> {
        let item = self
            .index
            .tree
            .get_item(item_id)?
            .ok_or(IndexError::ItemNotFound(item_id))?;
        if item.parent_id == new_parent_id {
            return Ok(());
        }
        self.ensure_not_within(item_id, new_parent_id)?;

        let _shared = self.index.lock.read();
        let params = [(":parentId", new_parent_id), (":itemId", item_id)];
        self.index.retryer.execute_no_result(&mut || {
            let mut tx = self.index.executor.begin_transaction()?;
            tx.execute(statements::UPDATE_ITEM_PARENT, &params)?;
            tx.complete()
        })?;

        self.index.item_moved_shared(scope, item_id, new_parent_id);
        Ok(())
    }

    /// Walks the `Items` parents of `target` and rejects it if `item_id` is
    /// among them. The closure table may be stale, so it is not consulted.
    fn ensure_not_within(&self, item_id: ItemId, target: ItemId) -> Result<()> {
        let mut visited = FnvHashSet::default();
        let mut current = target;
        while !current.is_null() {
            if current == item_id {
                return Err(IndexError::InvalidInput(format!(
                    "cannot move item {item_id} under itself or its descendant {target}"
                )));
            }
            if !visited.insert(current) {
                return Err(IndexError::InvalidData(format!(
                    "parent chain of {target} is cyclic at {current}"
                )));
            }
            current = self
                .index
                .tree
                .get_item(current)?
                .ok_or(IndexError::ItemNotFound(current))?
                .parent_id;
        }
        Ok(())
    }

    /// Starts reconciling restore events for `database_name`.
    ///
    /// Only the first call subscribes; later calls return `Ok(None)`.
    pub fn listen_for_restores(
        &self,
        bus: &NotificationBus,
        database_name: impl Into<String>,
    ) -> io::Result<Option<JoinHandle<()>>> {
        if self.listening.swap(true, Ordering::AcqRel) {
            return Ok(None);
        }

        match spawn_restore_listener(Arc::clone(&self.index), bus.subscribe(), database_name.into()) {
            Ok(handle) => Ok(Some(handle)),
            Err(error) => {
                self.listening.store(false, Ordering::Release);
                Err(error)
            }
        }
    }
}

fn spawn_blob_cleanup(cleanup: Arc<dyn BlobCleanup>, item: Item) {
    let item_id = item.id;
    let spawned = thread::Builder::new()
        .name("descendants-blob-cleanup".to_string())
        .spawn(move || {
            if let Err(error) = cleanup.remove_related_blobs(&item) {
                log::warn!("blob cleanup failed item={}: {}", item.id, error);
            }
        });

    if let Err(error) = spawned {
        log::warn!(
            "failed to start blob cleanup item={}: {}",
            item_id,
            error
        );
    }
}

#[cfg(test)]
mod tests {
    use std::sync::mpsc;
    use std::time::Duration;

    use parking_lot::Mutex;

    use super::*;
    use crate::config::DescendantsSettings;
    use crate::testing::{assert_closure_exact, fixture, fixture_with, test_settings};

    struct ChannelCleanup {
        sender: Mutex<mpsc::Sender<ItemId>>,
    }

    impl BlobCleanup for ChannelCleanup {
        fn remove_related_blobs(&self, item: &Item) -> Result<()> {
            let _ = self.sender.lock().send(item.id);
            Ok(())
        }
    }

    fn channel_cleanup() -> (Arc<ChannelCleanup>, mpsc::Receiver<ItemId>) {
        let (sender, receiver) = mpsc::channel();
        (
            Arc::new(ChannelCleanup {
                sender: Mutex::new(sender),
            }),
            receiver,
        )
    }

    #[test]
    fn create_item_indexes_new_items() {
        let fx = fixture();
        let provider = ItemProvider::new(fx.index.clone());
        let mut scope = UpdateScope::immediate();
        let root = ItemId::new();
        let a = ItemId::new();
        let b = ItemId::new();

        provider.create_item(&mut scope, root, ItemId::NULL).expect("root");
        provider.create_item(&mut scope, a, root).expect("a");
        provider.create_item(&mut scope, b, a).expect("b");

        assert_closure_exact(&fx);
        assert!(fx.index.is_ancestor(root, b).expect("query"));
        assert_eq!(fx.index.ancestors_of(b).expect("query").len(), 2);
    }

    #[test]
    fn create_item_rejects_bad_ids() {
        let fx = fixture();
        let provider = ItemProvider::new(fx.index.clone());
        let mut scope = UpdateScope::immediate();
        let id = ItemId::new();

        assert!(matches!(
            provider.create_item(&mut scope, ItemId::NULL, id),
            Err(IndexError::InvalidInput(_))
        ));
        assert!(matches!(
            provider.create_item(&mut scope, id, id),
            Err(IndexError::InvalidInput(_))
        ));
    }

    #[test]
    fn duplicate_create_propagates_store_error() {
        let fx = fixture();
        let provider = ItemProvider::new(fx.index.clone());
        let mut scope = UpdateScope::immediate();
        let id = ItemId::new();

        provider.create_item(&mut scope, id, ItemId::NULL).expect("first");
        assert!(matches!(
            provider.create_item(&mut scope, id, ItemId::NULL),
            Err(IndexError::Sqlite(_))
        ));
    }

    #[test]
    fn delete_item_removes_subtree_and_cleans_blobs() {
        let fx = fixture();
        let (cleanup, deleted) = channel_cleanup();
        let provider = ItemProvider::new(fx.index.clone()).with_blob_cleanup(cleanup);
        let mut scope = UpdateScope::immediate();
        let root = ItemId::new();
        let a = ItemId::new();
        let b = ItemId::new();
        let sibling = ItemId::new();
        provider.create_item(&mut scope, root, ItemId::NULL).expect("root");
        provider.create_item(&mut scope, a, root).expect("a");
        provider.create_item(&mut scope, b, a).expect("b");
        provider.create_item(&mut scope, sibling, root).expect("sibling");

        assert!(provider.delete_item(&mut scope, a).expect("delete"));

        assert!(provider.get_item(b).expect("get").is_none());
        assert_eq!(fx.index.closure_rows().expect("rows"), vec![(root, sibling)]);
        assert_closure_exact(&fx);
        let cleaned = deleted
            .recv_timeout(Duration::from_secs(5))
            .expect("cleanup ran");
        assert_eq!(cleaned, a);
    }

    #[test]
    fn delete_missing_item_reports_false() {
        let fx = fixture();
        let provider = ItemProvider::new(fx.index.clone());
        let mut scope = UpdateScope::immediate();
        assert!(!provider.delete_item(&mut scope, ItemId::new()).expect("delete"));
    }

    #[test]
    fn blob_cleanup_respects_setting() {
        let settings = DescendantsSettings {
            remove_unused_blobs_on_save: false,
            ..test_settings()
        };
        let fx = fixture_with(settings);
        let (cleanup, deleted) = channel_cleanup();
        let provider = ItemProvider::new(fx.index.clone()).with_blob_cleanup(cleanup);
        let mut scope = UpdateScope::immediate();
        let id = ItemId::new();
        provider.create_item(&mut scope, id, ItemId::NULL).expect("create");

        assert!(provider.delete_item(&mut scope, id).expect("delete"));
        assert!(deleted.recv_timeout(Duration::from_millis(100)).is_err());
    }

    #[test]
    fn move_item_reparents_subtree() {
        let fx = fixture();
        let provider = ItemProvider::new(fx.index.clone());
        let mut scope = UpdateScope::immediate();
        let root = ItemId::new();
        let left = ItemId::new();
        let right = ItemId::new();
        let a = ItemId::new();
        let b = ItemId::new();
        provider.create_item(&mut scope, root, ItemId::NULL).expect("root");
        provider.create_item(&mut scope, left, root).expect("left");
        provider.create_item(&mut scope, right, root).expect("right");
        provider.create_item(&mut scope, a, left).expect("a");
        provider.create_item(&mut scope, b, a).expect("b");

        provider.move_item(&mut scope, a, right).expect("move");

        assert_closure_exact(&fx);
        assert!(fx.index.is_ancestor(right, b).expect("query"));
        assert!(!fx.index.is_ancestor(left, b).expect("query"));
        assert!(fx.index.descendants_of(left).expect("query").is_empty());
    }

    #[test]
    fn move_item_to_root_keeps_subtree_rows() {
        let fx = fixture();
        let provider = ItemProvider::new(fx.index.clone());
        let mut scope = UpdateScope::immediate();
        let root = ItemId::new();
        let a = ItemId::new();
        let b = ItemId::new();
        provider.create_item(&mut scope, root, ItemId::NULL).expect("root");
        provider.create_item(&mut scope, a, root).expect("a");
        provider.create_item(&mut scope, b, a).expect("b");

        provider.move_item(&mut scope, a, ItemId::NULL).expect("move");

        assert!(provider.get_item(a).expect("get").expect("a exists").parent_id.is_null());
        assert_eq!(fx.index.closure_rows().expect("rows"), vec![(a, b)]);
        assert_closure_exact(&fx);
    }

    #[test]
    fn move_item_rejects_cycles() {
        let fx = fixture();
        let provider = ItemProvider::new(fx.index.clone());
        let mut scope = UpdateScope::immediate();
        let root = ItemId::new();
        let a = ItemId::new();
        let b = ItemId::new();
        provider.create_item(&mut scope, root, ItemId::NULL).expect("root");
        provider.create_item(&mut scope, a, root).expect("a");
        provider.create_item(&mut scope, b, a).expect("b");

        assert!(matches!(
            provider.move_item(&mut scope, a, b),
            Err(IndexError::InvalidInput(_))
        ));
        assert!(matches!(
            provider.move_item(&mut scope, a, a),
            Err(IndexError::InvalidInput(_))
        ));
        assert!(matches!(
            provider.move_item(&mut scope, ItemId::new(), root),
            Err(IndexError::ItemNotFound(_))
        ));
        assert_closure_exact(&fx);
    }

    #[test]
    fn bulk_scope_defers_provider_edits() {
        let fx = fixture();
        let provider = ItemProvider::new(fx.index.clone());
        let root = ItemId::new();
        let a = ItemId::new();

        let mut bulk = fx.index.begin_bulk_update();
        provider.create_item(bulk.scope_mut(), root, ItemId::NULL).expect("root");
        provider.create_item(bulk.scope_mut(), a, root).expect("a");
        assert_eq!(bulk.pending(), 2);
        assert!(fx.index.closure_rows().expect("rows").is_empty());
        bulk.finish();

        assert_eq!(fx.index.closure_rows().expect("rows"), vec![(root, a)]);
    }

    #[test]
    fn restore_listener_subscribes_once() {
        let fx = fixture();
        let provider = ItemProvider::new(fx.index.clone());
        let bus = NotificationBus::new(16);

        let handle = provider
            .listen_for_restores(&bus, "master")
            .expect("spawn")
            .expect("first call subscribes");
        assert!(provider
            .listen_for_restores(&bus, "master")
            .expect("spawn")
            .is_none());

        drop(bus);
        handle.join().expect("listener exits");
    }
}
