//! Full reconciliation of the closure table against `Items`.

use std::io;
use std::sync::atomic::Ordering;
use std::sync::Arc;
use std::thread::{self, JoinHandle};
use std::time::Instant;

use crate::maintainer::DescendantsIndex;
use crate::statements;
use crate::types::ItemId;

/// Row counts of one rebuild. Duplicate pairs removed are counted as deleted.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct RebuildReport {
    pub inserted: usize,
    pub deleted: usize,
}

impl RebuildReport {
    pub fn is_noop(&self) -> bool {
        self.inserted == 0 && self.deleted == 0
    }
}

impl DescendantsIndex {
    /// Recomputes the closure and applies the difference in one transaction.
    ///
    /// Holds the lock exclusively for the whole run. Rows that are already
    /// correct keep their ids. Returns `None` when the rebuild failed; the
    /// failure is logged and counted.
    pub fn rebuild_all(&self) -> Option<RebuildReport> {
        let exclusive = self.lock.write();
        let started = Instant::now();

        let null_param = [(":nullId", ItemId::NULL)];
        let mut report = RebuildReport::default();
        let result = self.retryer.execute_no_result(&mut || {
            report = RebuildReport::default();
            let mut tx = self.executor.begin_transaction()?;
            tx.execute(statements::CREATE_REBUILD_SCRATCH, &[])?;
            tx.execute(statements::CLEAR_REBUILD_SCRATCH, &[])?;
            tx.execute(statements::COLLECT_CLOSURE, &null_param)?;
            report.deleted += tx.execute(statements::DELETE_DUPLICATE_ROWS, &[])?;
            report.inserted += tx.execute(statements::INSERT_MISSING_ROWS, &[])?;
            report.deleted += tx.execute(statements::DELETE_STALE_ROWS, &[])?;
            tx.execute(statements::CLEAR_REBUILD_SCRATCH, &[])?;
            tx.complete()
        });

        self.needs_update.store(false, Ordering::Release);
        drop(exclusive);
        self.rebuild_outstanding.store(false, Ordering::Release);

        match result {
            Ok(()) => {
                self.rebuild_count.fetch_add(1, Ordering::Relaxed);
                log::info!(
                    "descendants rebuild complete inserted={} deleted={} elapsed_ms={}",
                    report.inserted,
                    report.deleted,
                    started.elapsed().as_millis()
                );
                Some(report)
            }
            Err(error) => {
                self.failure_count.fetch_add(1, Ordering::Relaxed);
                log::error!(
                    "descendants rebuild failed elapsed_ms={}: {}",
                    started.elapsed().as_millis(),
                    error
                );
                None
            }
        }
    }

    /// Runs `rebuild_all` on a background thread.
    pub fn start_rebuild(self: &Arc<Self>) -> io::Result<JoinHandle<Option<RebuildReport>>> {
        self.rebuild_outstanding.store(true, Ordering::Release);
        let index = Arc::clone(self);
        let spawned = thread::Builder::new()
            .name("descendants-rebuild".to_string())
            .spawn(move || index.rebuild_all());

        if spawned.is_err() {
            self.rebuild_outstanding.store(false, Ordering::Release);
        }
        spawned
    }
}
