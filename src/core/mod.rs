pub mod executor;
pub mod hardware;
pub mod notifications;
pub mod orchestrator;
pub mod pipeline;
pub mod tracker;

pub use executor::{CommandExecutor, CommandOutput, SystemExecutor};
pub use hardware::{HardwareAdapter, HardwareEvent};
pub use notifications::{Notifier, Severity};
pub use orchestrator::Orchestrator;
pub use tracker::DeviceTracker;
