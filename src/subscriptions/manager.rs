//! Subscription registry: live queries and their delivery workers.

use crate::error::{Result, SyncError};
use crate::repo::ChangeEvent;
use crate::store::Store;
use crate::types::ConnectionId;
use crossbeam_channel::{unbounded, Receiver, Sender, TrySendError};
use parking_lot::{Mutex, RwLock};
use std::collections::HashMap;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::thread::{self, JoinHandle};
use tracing::{debug, info};

use super::types::{
    Connection, RegistryConfig, SnapshotSource, SubscriptionId, SubscriptionSummary,
};
use super::worker::{Delivery, Job, WorkerHandle};

/// Internal subscription state.
struct Subscription {
    id: SubscriptionId,
    connection: ConnectionId,
    record_types: Vec<String>,
    worker: WorkerHandle,
}

impl Subscription {
    fn watches(&self, record_type: &str) -> bool {
        self.record_types.iter().any(|t| t == record_type)
    }

    /// Stop accepting jobs. Jobs already queued still run, but their output
    /// is not delivered.
    fn remove(self) -> JoinHandle<()> {
        self.worker.removed.store(true, Ordering::SeqCst);
        self.worker.thread
    }

    fn summary(&self) -> SubscriptionSummary {
        SubscriptionSummary {
            id: self.id.clone(),
            connection: self.connection,
            record_types: self.record_types.clone(),
        }
    }
}

type Key = (ConnectionId, SubscriptionId);

/// Thread forwarding a store's change feed into the registry.
struct Dispatcher {
    stop: Sender<()>,
    thread: JoinHandle<()>,
}

/// Tracks live subscriptions and fans change events out to them.
///
/// Each subscription owns a bounded FIFO queue served by one worker thread,
/// so its recompute jobs run one at a time in notification order while
/// different subscriptions proceed in parallel.
pub struct SubscriptionRegistry {
    config: RegistryConfig,
    subscriptions: RwLock<HashMap<Key, Subscription>>,
    dispatchers: Mutex<Vec<Dispatcher>>,
    /// Workers of removed subscriptions, joined on shutdown.
    retired: Mutex<Vec<JoinHandle<()>>>,
    /// Worker thread names.
    serial: AtomicU64,
}

impl SubscriptionRegistry {
    pub fn new(config: RegistryConfig) -> Self {
        Self {
            config,
            subscriptions: RwLock::new(HashMap::new()),
            dispatchers: Mutex::new(Vec::new()),
            retired: Mutex::new(Vec::new()),
            serial: AtomicU64::new(0),
        }
    }

    pub fn config(&self) -> &RegistryConfig {
        &self.config
    }

    /// Register a subscription and start its worker.
    ///
    /// The baseline starts empty; nothing is pushed until the first change
    /// event for one of `record_types`. An active subscription with the same
    /// id on the same connection is replaced. A connection already holding
    /// `max_per_connection` other subscriptions is refused.
    pub fn subscribe(
        &self,
        connection: &Arc<dyn Connection>,
        id: SubscriptionId,
        record_types: Vec<String>,
        source: Arc<dyn SnapshotSource>,
    ) -> Result<()> {
        let connection_id = connection.id();
        let key = (connection_id, id.clone());

        let replaced = {
            let mut subs = self.subscriptions.write();
            if !subs.contains_key(&key) {
                let held = subs.keys().filter(|(owner, _)| *owner == connection_id).count();
                if held >= self.config.max_per_connection {
                    debug!(
                        subscription = %id,
                        connection = %connection_id,
                        held,
                        "subscription limit reached"
                    );
                    return Err(SyncError::InvalidInput(format!(
                        "connection {} already holds {} subscriptions",
                        connection_id, held
                    )));
                }
            }

            let serial = self.serial.fetch_add(1, Ordering::Relaxed);
            let delivery = Delivery::new(id.clone(), Arc::downgrade(connection), source);
            let worker = delivery.spawn(serial, self.config.queue_capacity)?;

            info!(
                subscription = %id,
                connection = %connection_id,
                record_types = ?record_types,
                "subscribed"
            );

            subs.insert(
                key,
                Subscription {
                    id: id.clone(),
                    connection: connection_id,
                    record_types,
                    worker,
                },
            )
        };

        if let Some(old) = replaced {
            debug!(subscription = %id, "replaced existing subscription");
            self.retire(old);
        }

        Ok(())
    }

    /// Remove one subscription of a connection. Returns false if none matched.
    pub fn unsubscribe(&self, connection: ConnectionId, id: &SubscriptionId) -> bool {
        let removed = self.subscriptions.write().remove(&(connection, id.clone()));
        match removed {
            Some(subscription) => {
                info!(subscription = %id, connection = %connection, "unsubscribed");
                self.retire(subscription);
                true
            }
            None => false,
        }
    }

    /// Remove every subscription of a closed connection.
    pub fn connection_closed(&self, connection: ConnectionId) -> usize {
        let removed: Vec<Subscription> = {
            let mut subs = self.subscriptions.write();
            let keys: Vec<Key> = subs
                .keys()
                .filter(|(owner, _)| *owner == connection)
                .cloned()
                .collect();
            keys.iter().filter_map(|key| subs.remove(key)).collect()
        };

        let count = removed.len();
        for subscription in removed {
            self.retire(subscription);
        }

        if count > 0 {
            info!(connection = %connection, count, "connection closed, subscriptions removed");
        }
        count
    }

    /// Queue a recompute on every subscription watching `record_type`.
    /// Returns the number of jobs queued.
    pub fn notify(&self, record_type: &str) -> usize {
        let subs = self.subscriptions.read();
        let mut queued = 0;

        for sub in subs.values().filter(|sub| sub.watches(record_type)) {
            match sub.worker.queue.try_send(Job::Recompute) {
                Ok(()) => queued += 1,
                Err(TrySendError::Full(_)) => {
                    debug!(subscription = %sub.id, "queue full, job coalesced");
                }
                Err(TrySendError::Disconnected(_)) => {
                    debug!(subscription = %sub.id, "worker gone, job dropped");
                }
            }
        }

        queued
    }

    /// Forward every change event of `store` to [`notify`](Self::notify)
    /// from a dispatcher thread.
    pub fn attach(self: &Arc<Self>, store: &Store) -> Result<()> {
        self.listen(store.changes())
    }

    /// Forward change events from any receiver.
    pub fn listen(self: &Arc<Self>, changes: Receiver<ChangeEvent>) -> Result<()> {
        let (stop, stopped) = unbounded::<()>();
        let registry = Arc::downgrade(self);

        let thread = thread::Builder::new()
            .name("livesync-dispatch".to_string())
            .spawn(move || loop {
                crossbeam_channel::select! {
                    recv(changes) -> event => {
                        let Ok(event) = event else { break };
                        let Some(registry) = registry.upgrade() else { break };
                        let queued = registry.notify(&event.record_type);
                        debug!(record_type = %event.record_type, queued, "change dispatched");
                    }
                    recv(stopped) -> _ => break,
                }
            })?;

        self.dispatchers.lock().push(Dispatcher { stop, thread });
        Ok(())
    }

    /// Number of active subscriptions.
    pub fn subscription_count(&self) -> usize {
        self.subscriptions.read().len()
    }

    /// Active subscriptions, sorted by connection then id.
    pub fn subscriptions(&self) -> Vec<SubscriptionSummary> {
        let mut list: Vec<SubscriptionSummary> =
            self.subscriptions.read().values().map(Subscription::summary).collect();
        list.sort_by(|a, b| (a.connection, &a.id).cmp(&(b.connection, &b.id)));
        list
    }

    /// Stop dispatchers, remove every subscription and wait for workers to
    /// drain their queues.
    pub fn shutdown(&self) {
        let dispatchers: Vec<Dispatcher> = self.dispatchers.lock().drain(..).collect();
        for dispatcher in dispatchers {
            let _ = dispatcher.stop.send(());
            if dispatcher.thread.join().is_err() {
                debug!("dispatcher panicked");
            }
        }

        let removed: Vec<Subscription> = self.subscriptions.write().drain().map(|(_, s)| s).collect();
        for subscription in removed {
            self.retire(subscription);
        }

        let workers: Vec<JoinHandle<()>> = self.retired.lock().drain(..).collect();
        let count = workers.len();
        for worker in workers {
            if worker.join().is_err() {
                debug!("subscription worker panicked");
            }
        }
        info!(workers = count, "registry shut down");
    }

    fn retire(&self, subscription: Subscription) {
        let thread = subscription.remove();
        let mut retired = self.retired.lock();
        retired.retain(|handle| !handle.is_finished());
        retired.push(thread);
    }
}

impl Default for SubscriptionRegistry {
    fn default() -> Self {
        Self::new(RegistryConfig::default())
    }
}

impl Drop for SubscriptionRegistry {
    fn drop(&mut self) {
        for dispatcher in self.dispatchers.get_mut().drain(..) {
            let _ = dispatcher.stop.send(());
        }
    }
}
