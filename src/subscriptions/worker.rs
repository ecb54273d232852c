//! Per-subscription delivery worker.

use super::snapshot::{push_frame, relax_json};
use super::types::{Connection, SnapshotSource, SubscriptionId};
use crate::error::Result;
use crate::patch::diff;
use crossbeam_channel::{bounded, Receiver, Sender};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Weak};
use std::thread::{self, JoinHandle};
use tracing::{debug, trace, warn};

/// Work item on a subscription's queue.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub(crate) enum Job {
    Recompute,
}

/// Registry side of a running worker.
pub(crate) struct WorkerHandle {
    pub queue: Sender<Job>,
    pub removed: Arc<AtomicBool>,
    pub thread: JoinHandle<()>,
}

/// Everything a worker owns. `last` is only ever touched by the worker thread.
pub(crate) struct Delivery {
    id: SubscriptionId,
    connection: Weak<dyn Connection>,
    source: Arc<dyn SnapshotSource>,
    removed: Arc<AtomicBool>,
    last: String,
}

impl Delivery {
    pub fn new(
        id: SubscriptionId,
        connection: Weak<dyn Connection>,
        source: Arc<dyn SnapshotSource>,
    ) -> Self {
        Self {
            id,
            connection,
            source,
            removed: Arc::new(AtomicBool::new(false)),
            last: String::new(),
        }
    }

    /// Start the worker thread with a queue of `capacity` pending jobs.
    ///
    /// Threads are named by the registry-assigned `serial`; subscription ids
    /// are client text and may not be valid thread names.
    pub fn spawn(self, serial: u64, capacity: usize) -> Result<WorkerHandle> {
        let (queue, jobs) = bounded(capacity.max(1));
        let removed = Arc::clone(&self.removed);
        let thread = thread::Builder::new()
            .name(format!("livesync-sub-{}", serial))
            .spawn(move || self.run(jobs))?;

        Ok(WorkerHandle {
            queue,
            removed,
            thread,
        })
    }

    /// Serve jobs in enqueue order until every sender is gone and the queue
    /// is drained.
    fn run(mut self, jobs: Receiver<Job>) {
        for job in jobs.iter() {
            match job {
                Job::Recompute => self.recompute(),
            }
        }
        trace!(subscription = %self.id, "worker finished");
    }

    fn recompute(&mut self) {
        let snapshot = match self.source.snapshot().and_then(|value| relax_json(&value)) {
            Ok(text) => text,
            Err(e) => {
                warn!(subscription = %self.id, error = %e, "recompute failed, baseline kept");
                return;
            }
        };

        let patch = diff(&self.last, &snapshot);

        if self.removed.load(Ordering::SeqCst) {
            debug!(subscription = %self.id, "subscription removed, delivery suppressed");
        } else {
            match self.connection.upgrade() {
                Some(connection) => {
                    let sent = push_frame(&self.id, &patch).and_then(|frame| connection.send(&frame));
                    if let Err(e) = sent {
                        debug!(subscription = %self.id, error = %e, "delivery dropped");
                    } else {
                        trace!(subscription = %self.id, ops = patch.len(), "delivered");
                    }
                }
                None => debug!(subscription = %self.id, "connection gone, delivery dropped"),
            }
        }

        self.last = snapshot;
    }

    #[cfg(test)]
    pub fn last(&self) -> &str {
        &self.last
    }
}
