//! HTTP client for a remote scan server (the server-mediated path).

use super::probe::LivenessCheck;
use crate::classify::{ErrorBody, ErrorKind, ScanError};
use crate::report::ScanReport;
use anyhow::{Context, Result};
use async_trait::async_trait;
use std::time::Duration;
use tracing::debug;
use url::Url;

/// Timeout for health probes.
pub const HEALTH_TIMEOUT: Duration = Duration::from_secs(2);

/// Talks to `wcagscan serve` (or a compatible server) over HTTP.
#[derive(Clone, Debug)]
pub struct ServerClient {
    http: reqwest::Client,
    base: Url,
}

impl ServerClient {
    /// `scan_timeout` bounds a whole remote scan, navigation plus analysis.
    pub fn new(base: &str, scan_timeout: Duration) -> Result<Self> {
        let base = Url::parse(base).with_context(|| format!("invalid server URL '{base}'"))?;
        let http = reqwest::Client::builder()
            .timeout(scan_timeout)
            .build()
            .context("failed to build HTTP client")?;
        Ok(Self { http, base })
    }

    pub fn base(&self) -> &Url {
        &self.base
    }

    fn endpoint(&self, path: &str) -> Result<Url> {
        self.base
            .join(path)
            .with_context(|| format!("invalid endpoint {path} on {}", self.base))
    }

    /// `GET /health`. True when the server answers 2xx.
    pub async fn health(&self) -> Result<bool> {
        let resp = self
            .http
            .get(self.endpoint("health")?)
            .timeout(HEALTH_TIMEOUT)
            .send()
            .await
            .with_context(|| format!("health check against {} failed", self.base))?;
        Ok(resp.status().is_success())
    }

    /// `POST /scan {url}`. The returned report's ordering and counts are
    /// recomputed locally rather than trusted.
    pub async fn post_scan(&self, url: &str) -> Result<ScanReport, ScanError> {
        let transport = |detail: String| ScanError::new(ErrorKind::Unknown, url).with_details(detail);

        let endpoint = self
            .endpoint("scan")
            .map_err(|e| transport(format!("{e:#}")))?;
        debug!("POST {endpoint} url={url}");

        let resp = self
            .http
            .post(endpoint)
            .json(&serde_json::json!({ "url": url }))
            .send()
            .await
            .map_err(|e| transport(format!("scan server at {} unreachable: {e}", self.base)))?;

        let status = resp.status();
        let body = resp
            .text()
            .await
            .map_err(|e| transport(format!("failed to read response from {}: {e}", self.base)))?;

        if status.is_success() {
            let mut report: ScanReport = serde_json::from_str(&body).map_err(|e| {
                transport(format!("scan server at {} sent an invalid report: {e}", self.base))
            })?;
            report.reprioritize();
            return Ok(report);
        }

        match serde_json::from_str::<ErrorBody>(&body) {
            Ok(err) => Err(err.into_scan_error(status.as_u16(), url)),
            Err(_) => {
                let mut err = transport(format!(
                    "scan server at {} answered {status}: {}",
                    self.base,
                    body.chars().take(200).collect::<String>()
                ));
                err.http_status = Some(status.as_u16());
                Err(err)
            }
        }
    }
}

#[async_trait]
impl LivenessCheck for ServerClient {
    async fn is_alive(&self) -> bool {
        match self.health().await {
            Ok(alive) => alive,
            Err(e) => {
                debug!("{e:#}");
                false
            }
        }
    }

    fn target(&self) -> String {
        self.base.to_string()
    }
}
