mod webhook;

use crate::config::AppConfig;
use async_trait::async_trait;
use std::sync::Arc;
use tracing::{error, info};

pub use webhook::WebhookNotifier;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Severity {
    Info,
    Error,
}

/// Best-effort operator notification. Implementations log every message
/// locally and swallow their own delivery failures; nothing here may
/// disturb the pipeline.
#[async_trait]
pub trait Notifier: Send + Sync {
    async fn notify(&self, severity: Severity, subject: &str, body: &str);
}

/// Fallback when no transport is configured: local log lines only.
pub struct LogNotifier;

#[async_trait]
impl Notifier for LogNotifier {
    async fn notify(&self, severity: Severity, subject: &str, body: &str) {
        log_notice(severity, subject, body);
    }
}

pub(crate) fn log_notice(severity: Severity, subject: &str, body: &str) {
    match severity {
        Severity::Info => info!("{subject}\n{body}"),
        Severity::Error => error!("{subject}\n{body}"),
    }
}

/// Pick the notifier implied by the configuration.
pub fn create_notifier(config: &AppConfig) -> Arc<dyn Notifier> {
    match &config.notify {
        Some(notify) if !notify.webhook_url.is_empty() => {
            Arc::new(WebhookNotifier::new(notify.webhook_url.clone()))
        }
        _ => Arc::new(LogNotifier),
    }
}
