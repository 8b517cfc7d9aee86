//! Event intake, the serialized backup worker, and the removal sweep.
//!
//! One intake task turns adapter events into tracker mutations; one worker
//! drains the pending queue a label at a time, running the full pipeline
//! for each before touching the next. After every drain the worker sweeps
//! the finished set, prompting the operator until all finished disks are
//! physically unplugged.

use crate::config::PoolConfig;
use crate::context::AppContext;
use crate::core::hardware::{HardwareAdapter, HardwareEvent};
use crate::core::notifications::Severity;
use crate::core::pipeline::{self, PipelineError};
use crate::core::tracker::DeviceTracker;
use crate::logging::LogThrottle;
use anyhow::Result;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::mpsc;
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info};

/// How often the sweep re-checks presence and chimes while finished disks
/// remain attached.
const REMOVAL_PROMPT_INTERVAL: Duration = Duration::from_secs(3);

/// The reminder log line repeats less often than the chime.
const REMINDER_LOG_INTERVAL: Duration = Duration::from_secs(30);

#[derive(Clone)]
pub struct Orchestrator {
    ctx: AppContext,
    adapter: Arc<dyn HardwareAdapter>,
    tracker: Arc<DeviceTracker>,
    shutdown: CancellationToken,
    reminder: Arc<LogThrottle>,
}

impl Orchestrator {
    pub fn new(ctx: AppContext, adapter: Arc<dyn HardwareAdapter>) -> Self {
        Self {
            ctx,
            adapter,
            tracker: Arc::new(DeviceTracker::new()),
            shutdown: CancellationToken::new(),
            reminder: Arc::new(LogThrottle::new(REMINDER_LOG_INTERVAL)),
        }
    }

    pub fn tracker(&self) -> &DeviceTracker {
        &self.tracker
    }

    /// Token cancelled to request an orderly shutdown. Any in-flight
    /// pipeline is abandoned at whatever stage it reached.
    pub fn shutdown_token(&self) -> CancellationToken {
        self.shutdown.clone()
    }

    /// Run the daemon: start the adapter, consume its events, and process
    /// the queue until shutdown is requested.
    pub async fn start(&self) -> Result<()> {
        info!("watching for managed volumes");

        let (tx, mut rx) = mpsc::channel(32);
        self.adapter.start(tx);

        let intake = {
            let orchestrator = self.clone();
            tokio::spawn(async move {
                while let Some(event) = rx.recv().await {
                    orchestrator.handle_event(event).await;
                }
            })
        };

        loop {
            while let Some(label) = self.tracker.drain_next() {
                self.process_device(&label).await;
            }

            self.sweep_finished();

            tokio::select! {
                _ = self.shutdown.cancelled() => break,
                _ = self.tracker.notified() => {}
                _ = tokio::time::sleep(REMOVAL_PROMPT_INTERVAL),
                    if self.tracker.awaiting_removal() => {}
            }
        }

        info!("shutting down");
        self.adapter.stop();
        intake.abort();
        Ok(())
    }

    /// Test mode: run the pipeline once for every configured volume that
    /// is currently attached, then return instead of waiting for events.
    pub async fn run_present(&self) -> Result<()> {
        let mut labels: Vec<String> = self
            .ctx
            .config
            .pools
            .keys()
            .filter(|label| self.adapter.is_present(label))
            .cloned()
            .collect();
        labels.sort();

        if labels.is_empty() {
            info!("no configured volumes are currently attached");
            return Ok(());
        }

        for label in &labels {
            self.tracker.enqueue_added(label);
        }
        while let Some(label) = self.tracker.drain_next() {
            self.process_device(&label).await;
        }
        Ok(())
    }

    /// Classify one adapter event: recognized additions queue a pipeline
    /// run, unrecognized ones only inform the operator, removals clear the
    /// finished set.
    pub async fn handle_event(&self, event: HardwareEvent) {
        match event {
            HardwareEvent::Added(label) => match self.ctx.config.pools.get(&label) {
                Some(_) => {
                    info!(label = %label, "recognized volume attached, queueing backup");
                    self.tracker.enqueue_added(&label);
                }
                None => self.notify_unrecognized(&label).await,
            },
            HardwareEvent::Removed(label) => {
                debug!(label = %label, "volume detached");
                self.tracker.mark_removed(&label);
            }
        }
    }

    /// Run the full pipeline for one dequeued label and report the
    /// outcome. Never fails the worker: every problem ends in a
    /// notification, and a panic inside the pipeline is caught at the
    /// task join.
    pub async fn process_device(&self, label: &str) {
        let Some(pool) = self.ctx.config.pools.get(label).cloned() else {
            // Dequeued label without a descriptor; nothing to run.
            self.notify_unrecognized(label).await;
            return;
        };

        self.ctx
            .notifier
            .notify(
                Severity::Info,
                &format!("Backup starting: {label}"),
                &format!(
                    "Plugged in disk {label} matching configured pool:\n{pool}\n\n\
                     Starting the backup now. You will receive a notification once \
                     the backup has completed and you can safely unplug the disk."
                ),
            )
            .await;

        let run = tokio::spawn({
            let pool = pool.clone();
            let executor = self.ctx.executor.clone();
            async move { pipeline::run(&pool, &*executor).await }
        });

        match run.await {
            Ok(Ok(run)) => {
                let mut body = format!(
                    "Backup finished. You can safely unplug the disk {label} now."
                );
                if self.ctx.config.send_backup_output {
                    body.push_str(&format!(
                        "\n\nBackup engine output:\n{}",
                        run.backup_output
                    ));
                }
                self.ctx
                    .notifier
                    .notify(Severity::Info, &format!("Backup finished: {label}"), &body)
                    .await;
                self.tracker.mark_finished(label);
            }
            Ok(Err(failure)) => self.report_failure(label, &pool, failure).await,
            Err(join_err) => {
                error!(label = %label, "pipeline run aborted unexpectedly: {join_err}");
                self.ctx
                    .notifier
                    .notify(
                        Severity::Error,
                        &format!("Backup failed: {label}"),
                        &format!(
                            "An unexpected error occurred during the backup of disk \
                             {label}. The backup may have failed. Please investigate.\n\n\
                             Error:\n{join_err}"
                        ),
                    )
                    .await;
            }
        }
    }

    async fn notify_unrecognized(&self, label: &str) {
        self.ctx
            .notifier
            .notify(
                Severity::Info,
                &format!("Unrecognized disk: {label}"),
                &format!(
                    "Plugged in disk {label} that does not match any configured \
                     pool. You can unplug it again safely."
                ),
            )
            .await;
    }

    async fn report_failure(&self, label: &str, pool: &PoolConfig, failure: PipelineError) {
        let name = &pool.pool_name;
        let verbose = self.ctx.config.send_backup_output;

        let (subject, body) = match failure {
            PipelineError::Import { stderr } => (
                format!("Import failed: {label}"),
                format!("Failed to import pool {name}. Backup not yet run.\n\nError:\n{stderr}"),
            ),
            PipelineError::Decrypt { stderr } => (
                format!("Decrypt failed: {label}"),
                format!(
                    "Failed to decrypt pool {name}. Backup not yet run. The pool is \
                     still imported; do not unplug the disk before investigating.\n\n\
                     Error:\n{stderr}"
                ),
            ),
            PipelineError::Backup { output } => {
                // Keep the full output in the local log even when the
                // notification only points at it.
                error!(label = %label, "backup engine output:\n{output}");
                let body = if verbose {
                    format!(
                        "Backup engine error! Disk will not be exported \
                         automatically:\n\n{output}"
                    )
                } else {
                    "Backup engine error! Disk will not be exported automatically. \
                     Check logs for details."
                        .to_string()
                };
                (format!("Backup failed: {label}"), body)
            }
            PipelineError::ReadOnly {
                stderr,
                backup_output,
            } => {
                let mut body = format!(
                    "Backup succeeded but setting pool {name} read-only failed. The \
                     disk is not safe to remove and will not be exported \
                     automatically.\n\nError:\n{stderr}"
                );
                if verbose {
                    body.push_str(&format!("\n\nBackup engine output:\n{backup_output}"));
                }
                (format!("Set read-only failed: {label}"), body)
            }
            PipelineError::Export { stderr, .. } => (
                format!("Export failed: {label}"),
                format!(
                    "Failed to export pool {name}. The pool is still imported; do \
                     not unplug the disk.\n\nError:\n{stderr}"
                ),
            ),
        };

        self.ctx
            .notifier
            .notify(Severity::Error, &subject, &body)
            .await;
    }

    /// Presence sweep: drop finished labels whose disks are gone, and
    /// prompt the operator while any remain attached.
    pub fn sweep_finished(&self) {
        for label in self.tracker.finished_labels() {
            if !self.adapter.is_present(&label) {
                self.tracker.remove_finished(&label);
                info!(label = %label, "finished disk removed");
            }
        }

        if self.tracker.awaiting_removal() {
            self.adapter.chime();
            if self.reminder.should_emit() {
                info!(
                    "finished disks safe to unplug: {}",
                    self.tracker.finished_labels().join(", ")
                );
            }
        } else {
            self.reminder.reset();
        }
    }
}
