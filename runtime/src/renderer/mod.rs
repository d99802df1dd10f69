//! Renderer abstraction for scan targets.
//!
//! Defines the `Renderer` and `RenderContext` traits that abstract over the
//! two ways a page can be made available to the rule engine: a headless
//! Chromium tab (server-mediated path) or a frame container hosted inside a
//! same-origin page (local path).

pub mod chromium;
pub mod manager;
pub mod sandbox;

use crate::config::Viewport;
use crate::error::RenderFailure;
use anyhow::Result;
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::time::Duration;

/// Result of navigating to a URL.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct NavigationResult {
    /// The final URL after any redirects.
    pub final_url: String,
    /// Time taken until the page settled, in milliseconds.
    pub load_time_ms: u64,
    /// Whether the network reached idle before navigation returned.
    pub network_idle: bool,
}

/// JavaScript expression that evaluates to the document under test, or to
/// `null` when the document cannot be reached.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DocumentHandle {
    expression: String,
}

impl DocumentHandle {
    /// The context's own top-level document.
    pub fn top_level() -> Self {
        Self::expression("document")
    }

    pub fn expression(expr: impl Into<String>) -> Self {
        Self {
            expression: expr.into(),
        }
    }

    pub fn as_js(&self) -> &str {
        &self.expression
    }
}

/// A browser engine that can create rendering contexts.
#[async_trait]
pub trait Renderer: Send + Sync {
    /// Create a new context (tab or container) sized to `viewport`.
    async fn new_context(&self, viewport: Viewport) -> Result<Box<dyn RenderContext>, RenderFailure>;
    /// Shut down the browser engine.
    async fn shutdown(&self) -> Result<()>;
    /// Number of currently open contexts.
    fn active_contexts(&self) -> usize;
    /// Short name for logs and status output.
    fn name(&self) -> &'static str;
}

/// A single live document environment.
#[async_trait]
pub trait RenderContext: Send + Sync {
    /// Navigate to `url`, returning once the network is idle or failing with
    /// `NavigationTimeout` after `timeout`.
    async fn navigate(&mut self, url: &str, timeout: Duration) -> Result<NavigationResult, RenderFailure>;
    /// Execute JavaScript in the context and return the (awaited) result.
    async fn execute_js(&self, script: &str) -> Result<serde_json::Value>;
    /// The document the engine should analyze.
    fn document(&self) -> DocumentHandle;
    /// Close this context. Called exactly once per context.
    async fn close(self: Box<Self>) -> Result<()>;
}

/// A no-op renderer used when Chromium is unavailable.
///
/// The server still answers `/health` and `/status`; every scan fails with a
/// classified error instead of the process refusing to start.
pub struct NoopRenderer;

#[async_trait]
impl Renderer for NoopRenderer {
    async fn new_context(&self, _viewport: Viewport) -> Result<Box<dyn RenderContext>, RenderFailure> {
        Err(RenderFailure::Unavailable(
            "Chromium not found. Set WCAGSCAN_CHROMIUM_PATH or install Chromium.".to_string(),
        ))
    }
    async fn shutdown(&self) -> Result<()> {
        Ok(())
    }
    fn active_contexts(&self) -> usize {
        0
    }
    fn name(&self) -> &'static str {
        "noop"
    }
}

/// Classify a CDP navigation `errorText` into a structured failure.
pub(crate) fn navigation_error(error_text: &str, url: &str) -> RenderFailure {
    let trimmed = error_text.trim();
    if trimmed.starts_with("net::ERR_") {
        RenderFailure::Network {
            code: trimmed.to_string(),
            url: url.to_string(),
        }
    } else {
        RenderFailure::NavigationFailed(trimmed.to_string())
    }
}
