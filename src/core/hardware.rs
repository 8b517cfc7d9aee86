use tokio::sync::mpsc;

/// Abstract hotplug event for a managed storage volume, identified by its
/// filesystem label.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum HardwareEvent {
    Added(String),
    Removed(String),
}

impl HardwareEvent {
    pub fn label(&self) -> &str {
        match self {
            Self::Added(label) | Self::Removed(label) => label,
        }
    }
}

/// Platform adapter producing [`HardwareEvent`]s and answering presence
/// queries for finished-disk sweeps.
pub trait HardwareAdapter: Send + Sync {
    /// Start listening for hotplug events. Spawns an internal listener
    /// that sends filtered events to the provided channel.
    fn start(&self, event_sender: mpsc::Sender<HardwareEvent>);

    /// Stop the listener gracefully.
    fn stop(&self);

    /// Whether the volume with the given filesystem label is currently
    /// physically attached.
    fn is_present(&self, label: &str) -> bool;

    /// Best-effort audible cue for the operator. Never blocks, never fails.
    fn chime(&self);
}
