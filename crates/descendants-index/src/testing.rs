//! Shared fixtures for the unit tests.

use std::sync::atomic::{AtomicBool, AtomicU32, Ordering};
use std::sync::Arc;
use std::thread;
use std::time::Duration;

use fnv::FnvHashMap;

use crate::config::{DescendantsSettings, RetrySettings};
use crate::error::{IndexError, Result};
use crate::executor::{CommandExecutor, Params, Transaction};
use crate::maintainer::DescendantsIndex;
use crate::retry::RetryPolicy;
use crate::sqlite::SqliteStore;
use crate::statements;
use crate::types::ItemId;

pub(crate) struct Fixture {
    pub store: Arc<SqliteStore>,
    pub index: Arc<DescendantsIndex>,
}

/// Defaults with retries that do not sleep.
pub(crate) fn test_settings() -> DescendantsSettings {
    DescendantsSettings {
        retry: RetrySettings {
            repeat_number: 3,
            interval_ms: 0,
        },
        ..DescendantsSettings::default()
    }
}

pub(crate) fn fixture() -> Fixture {
    fixture_with(test_settings())
}

/// Routes `log` output to the test harness; `RUST_LOG=debug` shows it.
pub(crate) fn init_logging() {
    let _ = env_logger::builder().is_test(true).try_init();
}

pub(crate) fn fixture_with(settings: DescendantsSettings) -> Fixture {
    init_logging();
    let store = Arc::new(SqliteStore::open_in_memory(&settings).expect("open store"));
    let index = Arc::new(DescendantsIndex::with_store(store.clone(), settings));
    Fixture { store, index }
}

/// Builds an index whose statements go through `executor` instead of the store.
pub(crate) fn fixture_with_executor(
    store: Arc<SqliteStore>,
    executor: Arc<dyn CommandExecutor>,
    settings: DescendantsSettings,
) -> Fixture {
    init_logging();
    let retryer = Arc::new(RetryPolicy::from(&settings.retry));
    let index = Arc::new(DescendantsIndex::new(
        executor,
        store.clone(),
        retryer,
        settings,
    ));
    Fixture { store, index }
}

/// Writes an `Items` row without telling the index.
pub(crate) fn insert_item(store: &SqliteStore, item_id: ItemId, parent_id: ItemId) {
    let mut tx = store.begin_transaction().expect("begin");
    tx.execute(
        statements::INSERT_ITEM,
        &[(":itemId", item_id), (":parentId", parent_id)],
    )
    .expect("insert item");
    tx.complete().expect("commit");
}

pub(crate) fn reparent_item(store: &SqliteStore, item_id: ItemId, parent_id: ItemId) {
    let mut tx = store.begin_transaction().expect("begin");
    tx.execute(
        statements::UPDATE_ITEM_PARENT,
        &[(":parentId", parent_id), (":itemId", item_id)],
    )
    .expect("update parent");
    tx.complete().expect("commit");
}

pub(crate) fn delete_item_subtree(store: &SqliteStore, item_id: ItemId) {
    let mut tx = store.begin_transaction().expect("begin");
    tx.execute(statements::DELETE_ITEM_SUBTREE, &[(":itemId", item_id)])
        .expect("delete subtree");
    tx.complete().expect("commit");
}

/// Transitive closure of the `Items` edges, sorted.
pub(crate) fn expected_closure(store: &SqliteStore) -> Vec<(ItemId, ItemId)> {
    let parents: FnvHashMap<ItemId, ItemId> =
        store.item_edges().expect("edges").into_iter().collect();

    let mut pairs = Vec::new();
    for &item_id in parents.keys() {
        let mut current = parents.get(&item_id).copied().unwrap_or(ItemId::NULL);
        let mut steps = 0;
        while !current.is_null() && steps <= parents.len() {
            pairs.push((current, item_id));
            current = parents.get(&current).copied().unwrap_or(ItemId::NULL);
            steps += 1;
        }
    }
    pairs.sort();
    pairs
}

pub(crate) fn actual_closure(index: &DescendantsIndex) -> Vec<(ItemId, ItemId)> {
    let mut pairs = index.closure_rows().expect("closure rows");
    pairs.sort();
    pairs
}

pub(crate) fn assert_closure_exact(fx: &Fixture) {
    assert_eq!(actual_closure(&fx.index), expected_closure(&fx.store));
}

/// Fails the first `failures` transactions with a transient error.
pub(crate) struct FlakyExecutor {
    inner: Arc<SqliteStore>,
    failures: AtomicU32,
    pub begins: AtomicU32,
}

impl FlakyExecutor {
    pub fn new(inner: Arc<SqliteStore>, failures: u32) -> Self {
        Self {
            inner,
            failures: AtomicU32::new(failures),
            begins: AtomicU32::new(0),
        }
    }

    pub fn fail_next(&self, failures: u32) {
        self.failures.store(failures, Ordering::SeqCst);
    }
}

impl CommandExecutor for FlakyExecutor {
    fn begin_transaction(&self) -> Result<Box<dyn Transaction + '_>> {
        self.begins.fetch_add(1, Ordering::SeqCst);
        let failed = self
            .failures
            .fetch_update(Ordering::SeqCst, Ordering::SeqCst, |left| left.checked_sub(1))
            .is_ok();
        if failed {
            return Err(IndexError::Backend("injected connection reset".to_string()));
        }
        self.inner.begin_transaction()
    }

    fn query_ids(&self, statement: &str, params: Params<'_>) -> Result<Vec<ItemId>> {
        self.inner.query_ids(statement, params)
    }

    fn query_pairs(&self, statement: &str, params: Params<'_>) -> Result<Vec<(ItemId, ItemId)>> {
        self.inner.query_pairs(statement, params)
    }
}

/// Stalls the next transaction once `hold` is armed, keeping its caller
/// inside whatever lock it holds.
pub(crate) struct GatedExecutor {
    inner: Arc<SqliteStore>,
    pub hold: AtomicBool,
    delay: Duration,
}

impl GatedExecutor {
    pub fn new(inner: Arc<SqliteStore>, delay: Duration) -> Self {
        Self {
            inner,
            hold: AtomicBool::new(false),
            delay,
        }
    }
}

impl CommandExecutor for GatedExecutor {
    fn begin_transaction(&self) -> Result<Box<dyn Transaction + '_>> {
        if self.hold.swap(false, Ordering::SeqCst) {
            thread::sleep(self.delay);
        }
        self.inner.begin_transaction()
    }

    fn query_ids(&self, statement: &str, params: Params<'_>) -> Result<Vec<ItemId>> {
        self.inner.query_ids(statement, params)
    }

    fn query_pairs(&self, statement: &str, params: Params<'_>) -> Result<Vec<(ItemId, ItemId)>> {
        self.inner.query_pairs(statement, params)
    }
}
