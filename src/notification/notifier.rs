use std::path::PathBuf;

use chrono::Utc;
use tokio::fs::OpenOptions;
use tokio::io::AsyncWriteExt;
use tokio::process::Command;
use tracing::{debug, warn};

use super::WardenEvent;
use crate::config::NotificationConfig;

/// Best-effort fan-out of warden events: JSONL event log, optional shell
/// hook, optional webhook. Failures are logged and swallowed; a broken
/// channel never becomes a daemon error.
#[derive(Clone)]
pub struct Notifier {
    config: NotificationConfig,
    logs_dir: Option<PathBuf>,
    http: reqwest::Client,
}

impl Notifier {
    pub fn new(config: NotificationConfig, logs_dir: Option<PathBuf>) -> Self {
        Self {
            config,
            logs_dir,
            http: reqwest::Client::new(),
        }
    }

    pub async fn notify(&self, event: &WardenEvent) {
        if !self.config.enabled {
            return;
        }

        if self.config.event_log {
            self.write_event_log(event).await;
        }

        if let Some(hook) = &self.config.hook_command {
            self.run_hook(hook, event).await;
        }

        if let Some(url) = self.config.effective_webhook_url() {
            self.post_webhook(&url, event).await;
        }
    }

    /// Escalations additionally go out even when only error events are of
    /// interest; they are the reason the channel exists.
    pub async fn notify_escalation(&self, event: &WardenEvent) {
        self.notify(event).await;
        debug!(pr = ?event.pr_number, message = ?event.message, "Escalation notification sent");
    }

    async fn write_event_log(&self, event: &WardenEvent) {
        let Some(logs_dir) = &self.logs_dir else {
            return;
        };

        if let Err(e) = tokio::fs::create_dir_all(logs_dir).await {
            warn!(error = %e, "Failed to create logs directory");
            return;
        }

        let log_path = logs_dir.join("events.jsonl");
        let mut line = match serde_json::to_string(event) {
            Ok(l) => l,
            Err(e) => {
                warn!(error = %e, "Failed to serialize event");
                return;
            }
        };
        line.push('\n');

        let result = OpenOptions::new()
            .create(true)
            .append(true)
            .open(&log_path)
            .await;

        match result {
            Ok(mut file) => {
                if let Err(e) = file.write_all(line.as_bytes()).await {
                    warn!(error = %e, "Failed to write event log");
                }
            }
            Err(e) => {
                warn!(error = %e, path = %log_path.display(), "Failed to open event log");
            }
        }
    }

    async fn run_hook(&self, hook_cmd: &str, event: &WardenEvent) {
        let json = match serde_json::to_string(event) {
            Ok(j) => j,
            Err(_) => return,
        };

        let result = Command::new("sh")
            .args(["-c", hook_cmd])
            .env("WARDEN_EVENT", event.event_type.as_str())
            .env(
                "WARDEN_PR",
                event.pr_number.map(|n| n.to_string()).unwrap_or_default(),
            )
            .env("WARDEN_EVENT_JSON", &json)
            .env("WARDEN_TIMESTAMP", Utc::now().to_rfc3339())
            .output()
            .await;

        if let Err(e) = result {
            debug!(error = %e, hook = %hook_cmd, "Failed to run notification hook");
        }
    }

    async fn post_webhook(&self, url: &str, event: &WardenEvent) {
        let text = format!("{}\n{}", event.title(), event.body());
        let payload = serde_json::json!({ "text": text });

        match self.http.post(url).json(&payload).send().await {
            Ok(response) if !response.status().is_success() => {
                warn!(status = %response.status(), "Webhook returned non-success status");
            }
            Ok(_) => debug!(event = event.event_type.as_str(), "Webhook delivered"),
            Err(e) => warn!(error = %e, "Webhook delivery failed"),
        }
    }
}
