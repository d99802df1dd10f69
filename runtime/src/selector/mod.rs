// Copyright 2026 wcagscan Contributors
// SPDX-License-Identifier: Apache-2.0

//! Dual-path scan selection.
//!
//! Each request goes down exactly one path: the server-mediated path when it
//! is known to be available and preferred, otherwise the local same-origin
//! path. Nothing falls back to the other path after a failure.

pub mod client;
pub mod probe;

use crate::classify::{classify, ScanError};
use crate::error::RawScanError;
use crate::renderer::manager::validate_url;
use crate::report::{ScanPathKind, ScanReport};
use crate::scanner::{CancelToken, Scanner};
use async_trait::async_trait;
use client::ServerClient;
use probe::AvailabilityProbe;
use serde::Serialize;
use std::sync::{Arc, Mutex};
use tokio::task::JoinHandle;
use tracing::{debug, info};

/// Per-request selector states. `Failed` and `Succeeded` are terminal.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum SelectorState {
    Idle,
    ProbingAvailability,
    ServerPath,
    LocalPath,
    Failed,
    Succeeded,
}

/// Which path the caller would like.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum PathPreference {
    #[default]
    Server,
    Local,
}

impl std::str::FromStr for PathPreference {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "server" => Ok(PathPreference::Server),
            "local" => Ok(PathPreference::Local),
            other => Err(format!("unknown path '{other}' (expected server or local)")),
        }
    }
}

/// Server path only when it is known to be up and preferred. Unknown
/// availability means local.
pub fn choose_path(server_available: Option<bool>, preference: PathPreference) -> ScanPathKind {
    match (server_available, preference) {
        (Some(true), PathPreference::Server) => ScanPathKind::Server,
        _ => ScanPathKind::Local,
    }
}

/// Something that can run a scan end to end.
#[async_trait]
pub trait ScanBackend: Send + Sync {
    async fn scan(&self, url: &str, cancel: &CancelToken) -> Result<ScanReport, ScanError>;

    fn describe(&self) -> String;
}

#[async_trait]
impl ScanBackend for Scanner {
    async fn scan(&self, url: &str, cancel: &CancelToken) -> Result<ScanReport, ScanError> {
        self.submit_with_cancel(url, cancel).await
    }

    fn describe(&self) -> String {
        format!("{} path via {}", self.path(), self.manager().renderer().name())
    }
}

#[async_trait]
impl ScanBackend for ServerClient {
    async fn scan(&self, url: &str, cancel: &CancelToken) -> Result<ScanReport, ScanError> {
        tokio::select! {
            biased;
            _ = cancel.cancelled() => Err(classify(&RawScanError::Cancelled, url)),
            result = self.post_scan(url) => result,
        }
    }

    fn describe(&self) -> String {
        format!("scan server at {}", self.base())
    }
}

/// Outcome of one request through the selector.
#[derive(Debug)]
pub struct ScanAttempt {
    /// `None` when the request was rejected before a path was chosen.
    pub path: Option<ScanPathKind>,
    /// States visited, in order.
    pub states: Vec<SelectorState>,
    pub outcome: Result<ScanReport, ScanError>,
}

impl ScanAttempt {
    pub fn final_state(&self) -> SelectorState {
        self.states.last().copied().unwrap_or(SelectorState::Idle)
    }
}

/// Routes scans to the server-mediated or the local path.
pub struct ScanSelector {
    probe: Arc<AvailabilityProbe>,
    server: Arc<dyn ScanBackend>,
    local: Arc<dyn ScanBackend>,
    refresher: Mutex<Option<JoinHandle<()>>>,
}

impl ScanSelector {
    pub fn new(
        probe: Arc<AvailabilityProbe>,
        server: Arc<dyn ScanBackend>,
        local: Arc<dyn ScanBackend>,
    ) -> Self {
        Self {
            probe,
            server,
            local,
            refresher: Mutex::new(None),
        }
    }

    pub fn probe(&self) -> &Arc<AvailabilityProbe> {
        &self.probe
    }

    /// Start the background refresher. Idempotent.
    pub fn start_probing(&self) {
        let mut slot = self.refresher.lock().unwrap_or_else(|e| e.into_inner());
        if slot.is_none() {
            info!(
                "probing server path every {}s",
                self.probe.interval().as_secs()
            );
            *slot = Some(self.probe.spawn());
        }
    }

    /// Scan `url` on the path chosen from the cached availability.
    ///
    /// Never waits on a probe: when the cache is stale a refresh is spawned
    /// and the current value is used.
    pub async fn submit(
        &self,
        url: &str,
        preference: PathPreference,
        cancel: &CancelToken,
    ) -> ScanAttempt {
        let mut states = vec![SelectorState::Idle];

        if let Err(e) = validate_url(url) {
            states.push(SelectorState::Failed);
            return ScanAttempt {
                path: None,
                states,
                outcome: Err(classify(&RawScanError::from(e), url)),
            };
        }

        if self.probe.is_due() {
            states.push(SelectorState::ProbingAvailability);
            let probe = Arc::clone(&self.probe);
            // Re-checked on the task: back-to-back submits spawn at most one
            // live check per interval.
            tokio::spawn(async move {
                probe.refresh_if_due().await;
            });
        }

        let available = self.probe.server_path_available();
        let path = choose_path(available, preference);
        let backend = match path {
            ScanPathKind::Server => {
                states.push(SelectorState::ServerPath);
                &self.server
            }
            ScanPathKind::Local => {
                states.push(SelectorState::LocalPath);
                &self.local
            }
        };
        debug!(
            "selected {path} path for {url} (available={available:?}, preference={preference:?}) -> {}",
            backend.describe()
        );

        let outcome = backend.scan(url, cancel).await.map(|mut report| {
            report.scan_path = Some(path);
            report
        });
        states.push(if outcome.is_ok() {
            SelectorState::Succeeded
        } else {
            SelectorState::Failed
        });

        ScanAttempt {
            path: Some(path),
            states,
            outcome,
        }
    }
}

impl Drop for ScanSelector {
    fn drop(&mut self) {
        let slot = self.refresher.get_mut().unwrap_or_else(|e| e.into_inner());
        if let Some(task) = slot.take() {
            task.abort();
        }
    }
}
