//! Change notifications published by repos.

use crossbeam_channel::{unbounded, Receiver, Sender};
use parking_lot::Mutex;
use std::sync::Arc;

/// A committed mutation of one record type.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct ChangeEvent {
    pub record_type: String,
}

impl ChangeEvent {
    pub fn new(record_type: impl Into<String>) -> Self {
        Self {
            record_type: record_type.into(),
        }
    }
}

/// Fan-out of change events to any number of listeners.
///
/// Listeners whose receiver was dropped are pruned on the next publish.
#[derive(Clone, Default)]
pub struct ChangeFeed {
    listeners: Arc<Mutex<Vec<Sender<ChangeEvent>>>>,
}

impl ChangeFeed {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a listener. Events published from now on are delivered to it.
    pub fn subscribe(&self) -> Receiver<ChangeEvent> {
        let (sender, receiver) = unbounded();
        self.listeners.lock().push(sender);
        receiver
    }

    pub fn publish(&self, event: ChangeEvent) {
        self.listeners
            .lock()
            .retain(|listener| listener.send(event.clone()).is_ok());
    }

    pub fn listener_count(&self) -> usize {
        self.listeners.lock().len()
    }
}
