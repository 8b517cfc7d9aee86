use crate::core::hardware::HardwareAdapter;
use std::sync::Arc;

#[cfg(target_os = "linux")]
mod linux;
mod simulated;

#[cfg(target_os = "linux")]
pub use linux::LinuxAdapter;
pub use simulated::{SimulatedAdapter, Simulator};

pub fn get_adapter(simulation: bool) -> Arc<dyn HardwareAdapter> {
    if simulation {
        let (adapter, controller) = SimulatedAdapter::new();

        std::thread::spawn(move || {
            let stdin = std::io::stdin();
            for line in stdin.lines() {
                let Ok(cmd) = line else { break };
                let parts: Vec<&str> = cmd.trim().split_whitespace().collect();
                match (parts.first().copied(), parts.get(1).copied()) {
                    (Some("attach"), Some(label)) => controller.attach(label),
                    (Some("detach"), Some(label)) => controller.detach(label),
                    _ => println!("(Simulator) Use: 'attach <label>' or 'detach <label>'"),
                }
            }
        });

        return Arc::new(adapter);
    }

    #[cfg(target_os = "linux")]
    {
        return Arc::new(LinuxAdapter::new());
    }
}
