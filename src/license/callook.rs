use std::time::Duration;

use anyhow::{Context, Result};

use super::{LicenseLookup, LicenseRecord};

pub const DEFAULT_LICENSE_URL: &str = "https://callook.info";
pub const ENV_LICENSE_URL: &str = "LICENSE_LOOKUP_URL";

/// callook.info-compatible lookup: `GET <base>/<CALL>/json`.
pub struct CallookClient {
    http: reqwest::Client,
    base_url: String,
}

impl CallookClient {
    pub fn new(base_url: impl Into<String>) -> Result<Self> {
        let http = reqwest::Client::builder()
            .user_agent(concat!("beacon-watch/", env!("CARGO_PKG_VERSION")))
            .connect_timeout(Duration::from_secs(4))
            .timeout(Duration::from_secs(10))
            .build()
            .context("build license http client")?;
        Ok(Self {
            http,
            base_url: base_url.into().trim_end_matches('/').to_string(),
        })
    }

    /// Uses `$LICENSE_LOOKUP_URL` when set, callook.info otherwise.
    pub fn from_env() -> Result<Self> {
        let base =
            std::env::var(ENV_LICENSE_URL).unwrap_or_else(|_| DEFAULT_LICENSE_URL.to_string());
        Self::new(base)
    }

    pub fn url_for(&self, call: &str) -> String {
        format!("{}/{}/json", self.base_url, call)
    }
}

#[async_trait::async_trait]
impl LicenseLookup for CallookClient {
    async fn fetch(&self, call: &str) -> Result<LicenseRecord> {
        let record = self
            .http
            .get(self.url_for(call))
            .send()
            .await
            .context("license lookup request")?
            .error_for_status()
            .context("license lookup non-2xx")?
            .json::<LicenseRecord>()
            .await
            .context("parse license lookup json")?;
        Ok(record)
    }

    fn name(&self) -> &'static str {
        "callook"
    }
}
