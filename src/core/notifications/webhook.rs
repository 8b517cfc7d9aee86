use super::{Notifier, Severity, log_notice};
use async_trait::async_trait;
use serde_json::json;
use tracing::warn;

/// Delivers notifications as JSON posts to a webhook endpoint
/// (Slack-compatible payload). Delivery failures are logged and dropped.
pub struct WebhookNotifier {
    webhook_url: String,
    client: reqwest::Client,
}

impl WebhookNotifier {
    pub fn new(webhook_url: String) -> Self {
        Self {
            webhook_url,
            client: reqwest::Client::new(),
        }
    }

    fn format_message(&self, severity: Severity, subject: &str, body: &str) -> serde_json::Value {
        let subject = match severity {
            Severity::Info => subject.to_string(),
            Severity::Error => format!("ERROR: {subject}"),
        };
        json!({
            "text": format!("*{subject}*\n{body}"),
            "subject": subject,
            "body": body,
        })
    }
}

#[async_trait]
impl Notifier for WebhookNotifier {
    async fn notify(&self, severity: Severity, subject: &str, body: &str) {
        log_notice(severity, subject, body);

        let payload = self.format_message(severity, subject, body);
        let result = self
            .client
            .post(&self.webhook_url)
            .json(&payload)
            .send()
            .await
            .and_then(|response| response.error_for_status());

        match result {
            Ok(_) => tracing::debug!(subject, "notification delivered"),
            Err(e) => warn!(subject, "failed to deliver notification: {e}"),
        }
    }
}
