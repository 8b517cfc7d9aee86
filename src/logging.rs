//! Logging and tracing initialization.
//!
//! Structured logging via the `tracing` ecosystem: pretty console output
//! for interactive use, JSON output when the daemon's logs are collected
//! by something else.

use std::sync::atomic::{AtomicU64, Ordering};
use std::time::Instant;
use tracing::Level;
use tracing_subscriber::{EnvFilter, fmt, layer::SubscriberExt, util::SubscriberInitExt};

/// Configuration for the logging system.
#[derive(Default)]
pub struct LogConfig {
    /// Output logs as JSON (for machine parsing)
    pub json: bool,
    /// Enable verbose logging (sets default level to DEBUG)
    pub verbose: bool,
}

/// Initialize the tracing subscriber. Call once, early in main().
/// The log level can be overridden at runtime via `RUST_LOG`.
pub fn init(config: LogConfig) {
    let default_level = if config.verbose {
        Level::DEBUG
    } else {
        Level::INFO
    };

    let env_filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| {
        EnvFilter::new(format!("zbakd={}", default_level.as_str().to_lowercase()))
    });

    if config.json {
        tracing_subscriber::registry()
            .with(env_filter)
            .with(fmt::layer().json().with_target(true))
            .init();
    } else {
        tracing_subscriber::registry()
            .with(env_filter)
            .with(
                fmt::layer()
                    .with_target(false)
                    .with_file(false)
                    .with_line_number(false),
            )
            .init();
    }
}

/// Rate limiter for repetitive log lines. The daemon's presence sweep runs
/// every few seconds while finished disks stay plugged in; the "safe to
/// unplug" reminder goes through one of these so it repeats on a calmer
/// cadence than the sweep itself.
pub struct LogThrottle {
    interval_ms: u64,
    /// Time of the last emitted line in ms, or the sentinel below.
    last_emit_ms: AtomicU64,
    start: Instant,
}

/// Sentinel meaning nothing has been emitted yet.
const NEVER_EMITTED: u64 = u64::MAX;

impl LogThrottle {
    pub fn new(interval: std::time::Duration) -> Self {
        Self {
            interval_ms: interval.as_millis() as u64,
            last_emit_ms: AtomicU64::new(NEVER_EMITTED),
            start: Instant::now(),
        }
    }

    /// Returns true when the line should be emitted: on the first call,
    /// and whenever a full interval has elapsed since the last emission.
    pub fn should_emit(&self) -> bool {
        let now_ms = self.start.elapsed().as_millis() as u64;
        let last = self.last_emit_ms.load(Ordering::Relaxed);

        let due = last == NEVER_EMITTED || now_ms.saturating_sub(last) >= self.interval_ms;

        if due {
            // Losing this race means another thread just emitted.
            self.last_emit_ms
                .compare_exchange(last, now_ms, Ordering::Relaxed, Ordering::Relaxed)
                .is_ok()
        } else {
            false
        }
    }

    /// Forget the last emission so the next call emits immediately. Used
    /// when the finished set empties, so the next batch of disks gets its
    /// first reminder without delay.
    pub fn reset(&self) {
        self.last_emit_ms.store(NEVER_EMITTED, Ordering::Relaxed);
    }
}
