use std::collections::{HashSet, VecDeque};
use std::sync::Mutex;
use tokio::sync::Notify;

/// Shared device state: the FIFO of labels waiting for a pipeline run and
/// the set of labels that finished successfully and await physical removal.
///
/// Mutated by the event-intake task and the worker; the `Notify` is raised
/// on every accepted event so the worker wakes promptly. Plain data only,
/// no I/O.
#[derive(Default)]
pub struct DeviceTracker {
    pending: Mutex<VecDeque<String>>,
    finished: Mutex<HashSet<String>>,
    wake: Notify,
}

impl DeviceTracker {
    pub fn new() -> Self {
        Self::default()
    }

    /// Append a label to the pending queue and wake the worker. The queue
    /// does not deduplicate; the event source is expected to be well
    /// behaved about repeats.
    pub fn enqueue_added(&self, label: &str) {
        self.pending.lock().unwrap().push_back(label.to_string());
        self.wake.notify_one();
    }

    /// Drop a label from the finished set when its disk is unplugged.
    /// Idempotent: removing an absent label is a no-op.
    pub fn mark_removed(&self, label: &str) {
        self.finished.lock().unwrap().remove(label);
        self.wake.notify_one();
    }

    /// Pop the next pending label in FIFO order.
    pub fn drain_next(&self) -> Option<String> {
        self.pending.lock().unwrap().pop_front()
    }

    /// Record a successful pipeline run; the label now awaits removal.
    pub fn mark_finished(&self, label: &str) {
        self.finished.lock().unwrap().insert(label.to_string());
    }

    /// Remove a label observed physically absent during a presence sweep.
    pub fn remove_finished(&self, label: &str) {
        self.finished.lock().unwrap().remove(label);
    }

    pub fn finished_labels(&self) -> Vec<String> {
        self.finished.lock().unwrap().iter().cloned().collect()
    }

    pub fn awaiting_removal(&self) -> bool {
        !self.finished.lock().unwrap().is_empty()
    }

    pub fn pending_len(&self) -> usize {
        self.pending.lock().unwrap().len()
    }

    /// Wait until the next wake signal.
    pub async fn notified(&self) {
        self.wake.notified().await;
    }
}
