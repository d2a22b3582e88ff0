// src/ingest/aprs_is.rs
use std::time::Duration;

use anyhow::{anyhow, Context, Result};
use metrics::counter;
use tokio::io::{AsyncBufReadExt, AsyncWriteExt, BufReader};
use tokio::net::TcpStream;
use tokio::sync::mpsc;

use super::packet::parse_tnc2;
use super::types::Report;

const MIN_BACKOFF: Duration = Duration::from_secs(1);
const MAX_BACKOFF: Duration = Duration::from_secs(60);

/// Servers send a keepalive comment every ~20 s; silence this long means a dead link.
const IDLE_TIMEOUT: Duration = Duration::from_secs(120);

#[derive(Debug, Clone)]
pub struct AprsIsConfig {
    /// `host:port`; port 10152 is the unfiltered full feed, 14580 needs a filter.
    pub server: String,
    pub login: String,
    pub filter: Option<String>,
}

/// Receive-only APRS-IS client. Owns connect/reconnect; forwards every
/// decoded packet into a channel.
pub struct AprsIsClient {
    cfg: AprsIsConfig,
}

enum SessionEnd {
    /// The consumer went away; stop for good.
    ReceiverClosed,
}

impl AprsIsClient {
    pub fn new(cfg: AprsIsConfig) -> Self {
        Self { cfg }
    }

    /// Receive-only login (passcode -1).
    pub fn login_line(&self) -> String {
        let mut line = format!(
            "user {} pass -1 vers beacon-watch {}",
            self.cfg.login,
            env!("CARGO_PKG_VERSION")
        );
        if let Some(filter) = &self.cfg.filter {
            line.push_str(" filter ");
            line.push_str(filter);
        }
        line
    }

    /// Run until the receiving side of `tx` is dropped, reconnecting with
    /// exponential backoff on any connection error.
    pub async fn run(&self, tx: mpsc::Sender<Report>) -> Result<()> {
        let mut backoff = MIN_BACKOFF;
        loop {
            match self.session(&tx).await {
                Ok(SessionEnd::ReceiverClosed) => {
                    tracing::info!(target: "feed", "report consumer closed; feed stopping");
                    return Ok(());
                }
                Err(e) => {
                    counter!("feed_reconnects_total").increment(1);
                    tracing::warn!(
                        target: "feed",
                        server = %self.cfg.server,
                        retry_in_secs = backoff.as_secs(),
                        "feed connection lost: {e:#}"
                    );
                    tokio::time::sleep(backoff).await;
                    backoff = (backoff * 2).min(MAX_BACKOFF);
                }
            }
        }
    }

    async fn session(&self, tx: &mpsc::Sender<Report>) -> Result<SessionEnd> {
        let stream = TcpStream::connect(&self.cfg.server)
            .await
            .with_context(|| format!("connect {}", self.cfg.server))?;
        let (read_half, mut write_half) = stream.into_split();

        let login = self.login_line();
        write_half
            .write_all(format!("{login}\r\n").as_bytes())
            .await
            .context("send login")?;
        tracing::info!(target: "feed", server = %self.cfg.server, "connected to APRS-IS");

        let mut reader = BufReader::new(read_half);
        let mut buf = Vec::with_capacity(512);
        loop {
            buf.clear();
            let n = tokio::time::timeout(IDLE_TIMEOUT, reader.read_until(b'\n', &mut buf))
                .await
                .map_err(|_| anyhow!("no data for {}s", IDLE_TIMEOUT.as_secs()))?
                .context("read from server")?;
            if n == 0 {
                return Err(anyhow!("server closed the connection"));
            }

            // packets are not guaranteed to be UTF-8
            let line = String::from_utf8_lossy(&buf);
            if line.starts_with('#') {
                tracing::debug!(target: "feed", "{}", line.trim_end());
                continue;
            }

            match parse_tnc2(&line) {
                Some(report) => {
                    if tx.send(report).await.is_err() {
                        return Ok(SessionEnd::ReceiverClosed);
                    }
                }
                None => {
                    counter!("feed_parse_skipped_total").increment(1);
                    tracing::trace!(target: "feed", "skipped line: {}", line.trim_end());
                }
            }
        }
    }
}
