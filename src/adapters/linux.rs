//! udev-backed hotplug source. A dedicated thread polls the udev monitor
//! socket, filters block events down to labeled `zfs_member` volumes, and
//! bridges them into the daemon's event channel.

use crate::core::hardware::{HardwareAdapter, HardwareEvent};
use anyhow::{Context, Result};
use nix::errno::Errno;
use nix::poll::{PollFd, PollFlags, PollTimeout, poll};
use std::io::Write;
use std::os::fd::{AsRawFd, BorrowedFd};
use std::path::Path;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use tokio::sync::mpsc;
use tracing::{debug, error, info};

/// Filesystem-type tag udev reports for ZFS vdev members.
const ZFS_MEMBER: &str = "zfs_member";

/// Presence of a label is equivalent to its by-label symlink existing.
const BY_LABEL_DIR: &str = "/dev/disk/by-label";

/// Poll granularity; also bounds how long stop() takes to be observed.
const POLL_INTERVAL_MS: u16 = 1000;

pub struct LinuxAdapter {
    stop: Arc<AtomicBool>,
}

impl LinuxAdapter {
    pub fn new() -> Self {
        Self {
            stop: Arc::new(AtomicBool::new(false)),
        }
    }
}

impl Default for LinuxAdapter {
    fn default() -> Self {
        Self::new()
    }
}

impl HardwareAdapter for LinuxAdapter {
    fn start(&self, event_sender: mpsc::Sender<HardwareEvent>) {
        let stop = self.stop.clone();
        let spawned = std::thread::Builder::new()
            .name("udev-monitor".into())
            .spawn(move || {
                if let Err(e) = monitor_loop(event_sender, stop) {
                    error!("udev monitor failed: {e:#}");
                }
            });
        if let Err(e) = spawned {
            error!("failed to spawn udev monitor thread: {e}");
        }
    }

    fn stop(&self) {
        self.stop.store(true, Ordering::SeqCst);
    }

    fn is_present(&self, label: &str) -> bool {
        Path::new(BY_LABEL_DIR).join(label).exists()
    }

    fn chime(&self) {
        bell();
    }
}

fn monitor_loop(tx: mpsc::Sender<HardwareEvent>, stop: Arc<AtomicBool>) -> Result<()> {
    let socket = udev::MonitorBuilder::new()
        .context("failed to open udev monitor")?
        .match_subsystem("block")
        .context("failed to filter udev monitor to block subsystem")?
        .listen()
        .context("failed to listen on udev monitor socket")?;

    info!("udev monitor listening for block hotplug events");

    let raw_fd = socket.as_raw_fd();
    while !stop.load(Ordering::SeqCst) {
        // The monitor socket is non-blocking; wait for readability with a
        // bounded poll so the stop flag is checked periodically.
        let fd = unsafe { BorrowedFd::borrow_raw(raw_fd) };
        let mut fds = [PollFd::new(fd, PollFlags::POLLIN)];
        match poll(&mut fds, PollTimeout::from(POLL_INTERVAL_MS)) {
            Ok(0) => continue,
            Ok(_) => {}
            Err(Errno::EINTR) => continue,
            Err(e) => return Err(e).context("poll on udev monitor socket failed"),
        }

        for event in socket.iter() {
            if let Some(hw_event) = translate(&event) {
                debug!(?hw_event, "udev event accepted");
                bell();
                if tx.blocking_send(hw_event).is_err() {
                    // Daemon side is gone; nothing left to report to.
                    return Ok(());
                }
            }
        }
    }

    Ok(())
}

/// Filter a raw udev event down to a managed-volume event. Anything that
/// is not an add/remove of a labeled zfs_member filesystem is dropped
/// without comment.
fn translate(event: &udev::Event) -> Option<HardwareEvent> {
    let fs_type = event.property_value("ID_FS_TYPE")?.to_str()?;
    if fs_type != ZFS_MEMBER {
        return None;
    }

    let label = event.property_value("ID_FS_LABEL")?.to_str()?;
    if label.is_empty() {
        return None;
    }

    match event.event_type() {
        udev::EventType::Add => Some(HardwareEvent::Added(label.to_string())),
        udev::EventType::Remove => Some(HardwareEvent::Removed(label.to_string())),
        _ => None,
    }
}

/// BEL to the controlling terminal, if there is one.
fn bell() {
    for dev in ["/dev/tty", "/dev/console"] {
        if let Ok(mut out) = std::fs::OpenOptions::new().write(true).open(dev) {
            let _ = out.write_all(b"\x07");
            return;
        }
    }
}
