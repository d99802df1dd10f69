// Copyright 2026 wcagscan Contributors
// SPDX-License-Identifier: Apache-2.0

//! Scan orchestration for one path: acquire a context, run the engine,
//! release the context, then normalize or classify.

use crate::classify::{classify, ScanError};
use crate::engine::types::RawEngineResult;
use crate::engine::{ScanExecutor, RULE_TAGS};
use crate::error::{RawScanError, RenderFailure};
use crate::events::{now_timestamp, EventBus, ScanEvent};
use crate::renderer::manager::RenderManager;
use crate::report::{normalize, ScanPathKind, ScanReport};
use std::sync::Arc;
use std::time::Instant;
use tokio::sync::watch;
use tracing::{info, warn};

/// Requests cancellation of the scans holding the paired [`CancelToken`].
#[derive(Clone, Debug)]
pub struct CancelHandle {
    tx: Arc<watch::Sender<bool>>,
}

impl CancelHandle {
    pub fn cancel(&self) {
        self.tx.send_replace(true);
    }
}

/// Observes cancellation. Cheap to clone.
#[derive(Clone, Debug)]
pub struct CancelToken {
    rx: watch::Receiver<bool>,
}

impl CancelToken {
    /// A token that is never cancelled.
    pub fn never() -> Self {
        let (_tx, rx) = watch::channel(false);
        Self { rx }
    }

    pub fn is_cancelled(&self) -> bool {
        *self.rx.borrow()
    }

    /// Resolves once cancellation is requested. Pends forever if the handle
    /// is gone without cancelling.
    pub async fn cancelled(&self) {
        let mut rx = self.rx.clone();
        loop {
            if *rx.borrow_and_update() {
                return;
            }
            if rx.changed().await.is_err() {
                std::future::pending::<()>().await;
            }
        }
    }
}

/// A linked handle and token.
pub fn cancel_pair() -> (CancelHandle, CancelToken) {
    let (tx, rx) = watch::channel(false);
    (CancelHandle { tx: Arc::new(tx) }, CancelToken { rx })
}

/// Runs scans on one path (server-mediated or local).
pub struct Scanner {
    manager: RenderManager,
    executor: ScanExecutor,
    path: ScanPathKind,
    events: Option<Arc<EventBus>>,
}

impl Scanner {
    pub fn new(manager: RenderManager, executor: ScanExecutor, path: ScanPathKind) -> Self {
        Self {
            manager,
            executor,
            path,
            events: None,
        }
    }

    pub fn with_events(mut self, events: Arc<EventBus>) -> Self {
        self.events = Some(events);
        self
    }

    pub fn manager(&self) -> &RenderManager {
        &self.manager
    }

    pub fn path(&self) -> ScanPathKind {
        self.path
    }

    fn emit(&self, event: ScanEvent) {
        if let Some(bus) = &self.events {
            bus.emit(event);
        }
    }

    /// Scan `url` to completion.
    pub async fn submit(&self, url: &str) -> Result<ScanReport, ScanError> {
        self.submit_with_cancel(url, &CancelToken::never()).await
    }

    /// Scan `url`, aborting if `cancel` fires. A cancelled scan never
    /// returns partial results.
    pub async fn submit_with_cancel(
        &self,
        url: &str,
        cancel: &CancelToken,
    ) -> Result<ScanReport, ScanError> {
        let started = Instant::now();
        info!("scan started: {url} ({} path)", self.path);
        self.emit(ScanEvent::ScanStarted {
            url: url.to_string(),
            path: self.path.to_string(),
            timestamp: now_timestamp(),
        });

        match self.run(url, cancel).await {
            Ok(raw) => {
                let mut report = normalize(&raw, url);
                report.scan_path = Some(self.path);
                let elapsed_ms = started.elapsed().as_millis() as u64;
                info!(
                    "scan complete: {url} - {} violation(s), {} issue(s) in {elapsed_ms}ms",
                    report.violations.len(),
                    report.total_issues
                );
                self.emit(ScanEvent::ScanComplete {
                    url: url.to_string(),
                    scan_id: report.scan_id.clone(),
                    violations: report.violations.len(),
                    total_issues: report.total_issues,
                    elapsed_ms,
                });
                Ok(report)
            }
            Err(raw) => {
                let err = classify(&raw, url);
                let elapsed_ms = started.elapsed().as_millis() as u64;
                warn!("scan failed: {url} - {} ({raw})", err.kind);
                self.emit(ScanEvent::ScanFailed {
                    url: url.to_string(),
                    kind: err.kind.to_string(),
                    message: err.message.clone(),
                    elapsed_ms,
                });
                Err(err)
            }
        }
    }

    async fn run(&self, url: &str, cancel: &CancelToken) -> Result<RawEngineResult, RawScanError> {
        let lease = tokio::select! {
            biased;
            _ = cancel.cancelled() => return Err(RawScanError::Cancelled),
            acquired = self.manager.acquire(url) => acquired?,
        };

        if let Some(nav) = lease.navigation() {
            self.emit(ScanEvent::NavigationComplete {
                url: url.to_string(),
                final_url: nav.final_url.clone(),
                load_time_ms: nav.load_time_ms,
            });
        }

        let result = match lease.context() {
            Some(context) => tokio::select! {
                biased;
                _ = cancel.cancelled() => Err(RawScanError::Cancelled),
                analyzed = self.executor.run(context, &RULE_TAGS) => {
                    analyzed.map_err(RawScanError::from)
                }
            },
            None => Err(RawScanError::Render(RenderFailure::Other(
                "render context already released".to_string(),
            ))),
        };

        lease.release().await;
        result
    }
}
