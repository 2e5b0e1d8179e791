//! Incremental maintenance of the `Descendants` closure table.
//!
//! Tree-edit events arrive through `item_created` / `item_deleted`. Each is
//! either applied straight away under the shared side of the descendants
//! lock, queued in the caller's bulk scope, or dropped in favour of a full
//! rebuild when the scope has already queued more than the threshold.
//!
//! Index failures never reach the caller. The primary edit has already
//! happened, so a failed update is logged and counted, and the table is
//! left stale until a later update or rebuild reconciles it.

use std::fmt;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::Arc;

use fnv::FnvHashSet;

use crate::config::DescendantsSettings;
use crate::delayed::DelayedAction;
use crate::error::Result;
use crate::executor::CommandExecutor;
use crate::lock::DescendantsLock;
use crate::retry::{RetryPolicy, Retryer};
use crate::scope::{BulkUpdate, UpdateScope};
use crate::sqlite::SqliteStore;
use crate::statements;
use crate::tree::TreeAccessor;
use crate::types::{IndexStats, ItemId};

pub struct DescendantsIndex {
    pub(crate) executor: Arc<dyn CommandExecutor>,
    pub(crate) tree: Arc<dyn TreeAccessor>,
    pub(crate) retryer: Arc<dyn Retryer>,
    pub(crate) settings: DescendantsSettings,
    pub(crate) lock: DescendantsLock,
    /// Set whenever an event is skipped; cleared by every rebuild.
    pub(crate) needs_update: AtomicBool,
    /// Set while a background rebuild thread is owned by the index.
    pub(crate) rebuild_outstanding: AtomicBool,
    pub(crate) rebuild_count: AtomicU64,
    pub(crate) failure_count: AtomicU64,
}

impl fmt::Debug for DescendantsIndex {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("DescendantsIndex")
            .field("settings", &self.settings)
            .field("lock", &self.lock)
            .field("stats", &self.stats())
            .finish()
    }
}

impl DescendantsIndex {
    pub fn new(
        executor: Arc<dyn CommandExecutor>,
        tree: Arc<dyn TreeAccessor>,
        retryer: Arc<dyn Retryer>,
        settings: DescendantsSettings,
    ) -> Self {
        Self {
            executor,
            tree,
            retryer,
            settings,
            lock: DescendantsLock::new(),
            needs_update: AtomicBool::new(false),
            rebuild_outstanding: AtomicBool::new(false),
            rebuild_count: AtomicU64::new(0),
            failure_count: AtomicU64::new(0),
        }
    }

    /// Builds an index over a SQLite store, retrying per `settings.retry`.
    pub fn with_store(store: Arc<SqliteStore>, settings: DescendantsSettings) -> Self {
        let retryer = Arc::new(RetryPolicy::from(&settings.retry));
        Self::new(store.clone(), store, retryer, settings)
    }

    pub fn settings(&self) -> &DescendantsSettings {
        &self.settings
    }

    pub fn lock(&self) -> &DescendantsLock {
        &self.lock
    }

    pub fn stats(&self) -> IndexStats {
        IndexStats {
            rebuilds: self.rebuild_count.load(Ordering::Relaxed),
            failures: self.failure_count.load(Ordering::Relaxed),
            needs_update: self.needs_update.load(Ordering::Acquire),
            rebuild_outstanding: self.rebuild_outstanding.load(Ordering::Acquire),
        }
    }

    /// Flags the table as owing a reconcile.
    pub fn mark_needs_update(&self) {
        self.needs_update.store(true, Ordering::Release);
    }

    // -------------------------------------------------------------------------
    // Tree-edit events
    // -------------------------------------------------------------------------

    /// Records that `item_id` was attached under `parent_id`.
    ///
    /// Also writes rows for any children `item_id` already has, so
    /// reattaching a whole subtree repairs every node beneath it.
    pub fn item_created(&self, scope: &mut UpdateScope, parent_id: ItemId, item_id: ItemId) {
        if self.defer(scope, DelayedAction::Created { parent_id, item_id }) {
            return;
        }
        let _shared = self.lock.read();
        self.apply_created(parent_id, item_id);
    }

    /// Records that `item_id` and its subtree were removed.
    pub fn item_deleted(&self, scope: &mut UpdateScope, item_id: ItemId) {
        if self.defer(scope, DelayedAction::Deleted { item_id }) {
            return;
        }
        let _shared = self.lock.read();
        self.apply_deleted(item_id);
    }

    /// Records that `item_id` was moved under `new_parent_id`.
    pub fn item_moved(&self, scope: &mut UpdateScope, item_id: ItemId, new_parent_id: ItemId) {
        self.item_deleted(scope, item_id);
        self.item_created(scope, new_parent_id, item_id);
    }

    /// Variants for callers that already hold the lock shared.
    pub(crate) fn item_created_shared(
        &self,
        scope: &mut UpdateScope,
        parent_id: ItemId,
        item_id: ItemId,
    ) {
        if !self.defer(scope, DelayedAction::Created { parent_id, item_id }) {
            self.apply_created(parent_id, item_id);
        }
    }

    pub(crate) fn item_deleted_shared(&self, scope: &mut UpdateScope, item_id: ItemId) {
        if !self.defer(scope, DelayedAction::Deleted { item_id }) {
            self.apply_deleted(item_id);
        }
    }

    pub(crate) fn item_moved_shared(
        &self,
        scope: &mut UpdateScope,
        item_id: ItemId,
        new_parent_id: ItemId,
    ) {
        self.item_deleted_shared(scope, item_id);
        self.item_created_shared(scope, new_parent_id, item_id);
    }

    /// Reconciles a subtree restored from an archive.
    pub fn restore_item_completed(&self, parent_id: ItemId, item_id: ItemId) {
        if self.settings.fast_query_descendants_disabled {
            self.mark_needs_update();
            return;
        }
        let _shared = self.lock.read();
        self.apply_created(parent_id, item_id);
    }

    // -------------------------------------------------------------------------
    // Bulk scopes
    // -------------------------------------------------------------------------

    pub fn begin_bulk_update(&self) -> BulkUpdate<'_> {
        BulkUpdate::new(self)
    }

    /// Leaves a bulk scope, replaying its queue or rebuilding when it grew
    /// past the threshold. Immediate scopes are ignored.
    pub fn leave_bulk_update(&self, mut scope: UpdateScope) {
        self.leave_scope(&mut scope);
    }

    pub(crate) fn leave_scope(&self, scope: &mut UpdateScope) {
        let Some(mut queue) = scope.take_queue() else {
            return;
        };

        if self.settings.fast_query_descendants_disabled
            || !self.needs_update.load(Ordering::Acquire)
        {
            if !queue.is_empty() {
                log::debug!(
                    "descendants bulk update discarded queued={} (no update owed)",
                    queue.count()
                );
            }
            return;
        }

        if self.settings.rebuild_threshold < queue.count() {
            log::info!(
                "descendants bulk update queued={} threshold={}, rebuilding",
                queue.count(),
                self.settings.rebuild_threshold
            );
            queue.clear();
            self.rebuild_all();
            return;
        }

        while let Ok(action) = queue.dequeue() {
            self.replay(action);
        }
    }

    fn replay(&self, action: DelayedAction) {
        let _shared = self.lock.read();
        match action {
            DelayedAction::Created { parent_id, item_id } => self.apply_created(parent_id, item_id),
            DelayedAction::Deleted { item_id } => self.apply_deleted(item_id),
        }
    }

    /// Returns true when the event must not be applied now.
    fn defer(&self, scope: &mut UpdateScope, action: DelayedAction) -> bool {
        if self.settings.fast_query_descendants_disabled {
            self.mark_needs_update();
            return true;
        }
        let Some(queue) = scope.queue_mut() else {
            return false;
        };

        self.mark_needs_update();
        if queue.count() <= self.settings.rebuild_threshold {
            queue.enqueue(action);
        } else {
            log::debug!(
                "descendants bulk queue over threshold, dropping {} item={}",
                action.as_str(),
                action.item_id()
            );
        }
        true
    }

    // -------------------------------------------------------------------------
    // Applying updates (lock held shared by the caller)
    // -------------------------------------------------------------------------

    /// Writes rows for `item_id` and then for every existing descendant,
    /// depth-first in child order. Each node is its own transaction.
    ///
    /// A root item gets no rows of its own, but its subtree is still walked:
    /// a move to the root has already dropped the subtree's internal rows.
    fn apply_created(&self, parent_id: ItemId, item_id: ItemId) {
        let mut pending = vec![(parent_id, item_id)];
        let mut visited = FnvHashSet::default();
        while let Some((parent_id, item_id)) = pending.pop() {
            if !visited.insert(item_id) {
                log::warn!(
                    "descendants propagation reached item={} twice (cycle under parent={}), skipping",
                    item_id,
                    parent_id
                );
                continue;
            }

            if !parent_id.is_null() {
                if let Err(error) = self.write_created_rows(parent_id, item_id) {
                    self.failure_count.fetch_add(1, Ordering::Relaxed);
                    log::error!(
                        "failed to update descendants table parent={} item={}: {}",
                        parent_id,
                        item_id,
                        error
                    );
                }
                self.rebuild_outstanding.store(false, Ordering::Release);
            }

            match self.tree.get_item(item_id) {
                Ok(Some(item)) => {
                    pending.extend(item.children().rev().map(|child| (item_id, child)));
                }
                Ok(None) => {}
                Err(error) => {
                    log::warn!(
                        "descendants propagation could not load item={}: {}",
                        item_id,
                        error
                    );
                }
            }
        }
    }

    fn write_created_rows(&self, parent_id: ItemId, item_id: ItemId) -> Result<()> {
        let params = [(":parentId", parent_id), (":itemId", item_id)];
        self.retryer.execute_no_result(&mut || {
            let mut tx = self.executor.begin_transaction()?;
            tx.execute(statements::INSERT_PARENT_ROW, &params)?;
            tx.execute(statements::INSERT_ANCESTOR_ROWS, &params)?;
            tx.complete()
        })
    }

    fn apply_deleted(&self, item_id: ItemId) {
        let params = [(":itemId", item_id)];
        let result = self.retryer.execute_no_result(&mut || {
            let mut tx = self.executor.begin_transaction()?;
            tx.execute(statements::DELETE_SUBTREE_ROWS, &params)?;
            tx.execute(statements::DELETE_ITEM_ROWS, &params)?;
            tx.complete()
        });

        if let Err(error) = result {
            self.failure_count.fetch_add(1, Ordering::Relaxed);
            log::error!(
                "failed to update descendants table item={} (delete): {}",
                item_id,
                error
            );
        }
        self.rebuild_outstanding.store(false, Ordering::Release);
    }
}
