//! Scriptable adapter for tests and for `--simulation` runs without real
//! hardware. A [`Simulator`] handle injects attach/detach commands; the
//! adapter tracks presence and bridges events into the daemon channel.

use crate::core::hardware::{HardwareAdapter, HardwareEvent};
use std::collections::HashSet;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex};
use tokio::sync::mpsc;

enum SimCommand {
    Attach(String),
    Detach(String),
}

/// Controller handle for injecting hotplug activity.
#[derive(Clone)]
pub struct Simulator {
    tx: mpsc::UnboundedSender<SimCommand>,
    present: Arc<Mutex<HashSet<String>>>,
}

impl Simulator {
    /// Plug in a volume with the given label.
    pub fn attach(&self, label: &str) {
        self.present.lock().unwrap().insert(label.to_string());
        let _ = self.tx.send(SimCommand::Attach(label.to_string()));
    }

    /// Unplug the volume with the given label.
    pub fn detach(&self, label: &str) {
        self.present.lock().unwrap().remove(label);
        let _ = self.tx.send(SimCommand::Detach(label.to_string()));
    }
}

pub struct SimulatedAdapter {
    // Wrapped so the receiver can be moved out inside `start()`, which
    // takes &self. Start is only called once.
    cmd_rx: Arc<Mutex<Option<mpsc::UnboundedReceiver<SimCommand>>>>,
    present: Arc<Mutex<HashSet<String>>>,
    chimes: Arc<AtomicU64>,
}

impl SimulatedAdapter {
    pub fn new() -> (Self, Simulator) {
        let (tx, rx) = mpsc::unbounded_channel();
        let present = Arc::new(Mutex::new(HashSet::new()));

        (
            Self {
                cmd_rx: Arc::new(Mutex::new(Some(rx))),
                present: present.clone(),
                chimes: Arc::new(AtomicU64::new(0)),
            },
            Simulator { tx, present },
        )
    }

    /// Number of audible cues emitted so far.
    pub fn chime_count(&self) -> u64 {
        self.chimes.load(Ordering::Relaxed)
    }
}

impl HardwareAdapter for SimulatedAdapter {
    fn start(&self, event_sender: mpsc::Sender<HardwareEvent>) {
        let mut rx = self
            .cmd_rx
            .lock()
            .unwrap()
            .take()
            .expect("SimulatedAdapter::start() called twice");

        let chimes = self.chimes.clone();

        tokio::spawn(async move {
            while let Some(cmd) = rx.recv().await {
                let event = match cmd {
                    SimCommand::Attach(label) => HardwareEvent::Added(label),
                    SimCommand::Detach(label) => HardwareEvent::Removed(label),
                };

                chimes.fetch_add(1, Ordering::Relaxed);
                if event_sender.send(event).await.is_err() {
                    break;
                }
            }
        });
    }

    fn stop(&self) {}

    fn is_present(&self, label: &str) -> bool {
        self.present.lock().unwrap().contains(label)
    }

    fn chime(&self) {
        self.chimes.fetch_add(1, Ordering::Relaxed);
    }
}
