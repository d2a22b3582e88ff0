// src/notify/mod.rs
pub mod pushover;

use std::fmt;

use anyhow::Result;

pub use pushover::PushoverNotifier;

/// Destination credentials of one watch target. Opaque to routing.
#[derive(Clone, PartialEq, Eq)]
pub struct Credentials {
    pub user: String,
    pub token: String,
}

impl fmt::Debug for Credentials {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        // never print the application token
        f.debug_struct("Credentials")
            .field("user", &self.user)
            .field("token", &"***")
            .finish()
    }
}

/// A formatted alert ready for the transport.
#[derive(Debug, Clone, PartialEq)]
pub struct Notification {
    pub message: String,
    pub priority: i8,
    pub url: Option<String>,
}

/// Transport seam. `Ok(())` means delivery was confirmed; only then may
/// callers record the notification as sent.
#[async_trait::async_trait]
pub trait Notifier: Send + Sync {
    async fn send(&self, to: &Credentials, notification: &Notification) -> Result<()>;
    fn name(&self) -> &'static str;
}

/// Logs instead of delivering. Used for dry runs and the replay tool.
#[derive(Debug, Clone, Copy, Default)]
pub struct LogNotifier;

#[async_trait::async_trait]
impl Notifier for LogNotifier {
    async fn send(&self, to: &Credentials, notification: &Notification) -> Result<()> {
        tracing::info!(
            target: "notify",
            user = %to.user,
            priority = notification.priority,
            url = notification.url.as_deref().unwrap_or_default(),
            "dry run: {}",
            notification.message
        );
        Ok(())
    }

    fn name(&self) -> &'static str {
        "log"
    }
}

/// Deep link to the station on aprs.fi.
pub fn aprs_fi_link(source: &str) -> String {
    format!("https://aprs.fi/#!call=a%2F{source}")
}
