use anyhow::{anyhow, Context, Result};
use reqwest::Client;
use serde::{Deserialize, Serialize};
use std::time::Duration;

use super::{Credentials, Notification, Notifier};

pub const DEFAULT_PUSHOVER_URL: &str = "https://api.pushover.net/1/messages.json";
pub const ENV_PUSHOVER_URL: &str = "PUSHOVER_API_URL";

#[derive(Clone)]
pub struct PushoverNotifier {
    endpoint: String,
    client: Client,
    timeout: Duration,
}

impl PushoverNotifier {
    pub fn new(endpoint: impl Into<String>) -> Self {
        Self {
            endpoint: endpoint.into(),
            client: Client::new(),
            timeout: Duration::from_secs(10),
        }
    }

    /// Uses `$PUSHOVER_API_URL` when set, the public API otherwise.
    pub fn from_env() -> Self {
        let endpoint =
            std::env::var(ENV_PUSHOVER_URL).unwrap_or_else(|_| DEFAULT_PUSHOVER_URL.to_string());
        Self::new(endpoint)
    }

}

#[derive(Serialize)]
struct MessageForm<'a> {
    token: &'a str,
    user: &'a str,
    message: &'a str,
    priority: i8,
    #[serde(skip_serializing_if = "Option::is_none")]
    url: Option<&'a str>,
}

#[derive(Debug, Deserialize)]
struct PushoverResponse {
    status: i64,
    #[serde(default)]
    errors: Vec<String>,
}

#[async_trait::async_trait]
impl Notifier for PushoverNotifier {
    async fn send(&self, to: &Credentials, notification: &Notification) -> Result<()> {
        let form = MessageForm {
            token: &to.token,
            user: &to.user,
            message: &notification.message,
            priority: notification.priority,
            url: notification.url.as_deref(),
        };

        let rsp = self
            .client
            .post(&self.endpoint)
            .timeout(self.timeout)
            .form(&form)
            .send()
            .await
            .context("pushover request failed")?;

        let status = rsp.status();
        let body = rsp.text().await.context("read pushover body")?;
        let parsed: Option<PushoverResponse> = serde_json::from_str(&body).ok();

        match parsed {
            Some(r) if status.is_success() && r.status == 1 => Ok(()),
            Some(r) => Err(anyhow!(
                "pushover rejected message (HTTP {status}, status {}): {}",
                r.status,
                r.errors.join("; ")
            )),
            None => Err(anyhow!("pushover HTTP {status}: unexpected body: {body}")),
        }
    }

    fn name(&self) -> &'static str {
        "pushover"
    }
}
