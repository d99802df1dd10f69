//! Chromium-based renderer using chromiumoxide.

use super::{navigation_error, DocumentHandle, NavigationResult, RenderContext, Renderer};
use crate::config::Viewport;
use crate::error::RenderFailure;
use anyhow::{Context, Result};
use async_trait::async_trait;
use chromiumoxide::browser::{Browser, BrowserConfig};
use chromiumoxide::cdp::browser_protocol::emulation::SetDeviceMetricsOverrideParams;
use chromiumoxide::cdp::browser_protocol::page::{
    EventLifecycleEvent, NavigateParams, SetLifecycleEventsEnabledParams,
};
use chromiumoxide::page::Page;
use futures::StreamExt;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::{Duration, Instant};
use tokio::task::JoinHandle;
use tracing::debug;

/// Lifecycle event Chromium fires once no more than two connections remain
/// in flight for the frame's current load.
const NETWORK_ALMOST_IDLE: &str = "networkAlmostIdle";

/// Find the Chromium binary path.
pub fn find_chromium(explicit: Option<&Path>) -> Option<PathBuf> {
    // 1. Explicit path (WCAGSCAN_CHROMIUM_PATH / --chromium)
    if let Some(p) = explicit {
        if p.exists() {
            return Some(p.to_path_buf());
        }
    }

    // 2. ~/.wcagscan/chromium/
    if let Some(home) = dirs::home_dir() {
        let candidates = if cfg!(target_os = "macos") {
            vec![
                home.join(".wcagscan/chromium/chrome-mac-arm64/Google Chrome for Testing.app/Contents/MacOS/Google Chrome for Testing"),
                home.join(".wcagscan/chromium/chrome-mac-x64/Google Chrome for Testing.app/Contents/MacOS/Google Chrome for Testing"),
                home.join(".wcagscan/chromium/chrome"),
            ]
        } else {
            vec![
                home.join(".wcagscan/chromium/chrome-linux64/chrome"),
                home.join(".wcagscan/chromium/chrome"),
            ]
        };
        for c in candidates {
            if c.exists() {
                return Some(c);
            }
        }
    }

    // 3. System PATH
    for name in ["google-chrome", "chromium", "chromium-browser"] {
        if let Ok(path) = which::which(name) {
            return Some(path);
        }
    }

    // 4. Common macOS location
    if cfg!(target_os = "macos") {
        let common =
            PathBuf::from("/Applications/Google Chrome.app/Contents/MacOS/Google Chrome");
        if common.exists() {
            return Some(common);
        }
    }

    None
}

/// Whether Chromium enforces the same-origin policy.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum WebSecurity {
    /// Normal browser behavior. Used as the host for the local path.
    Enforced,
    /// `--disable-web-security`. Used for the server-mediated path.
    Disabled,
}

/// Chromium-based renderer.
pub struct ChromiumRenderer {
    browser: Browser,
    handler: JoinHandle<()>,
    active_count: Arc<AtomicUsize>,
}

impl ChromiumRenderer {
    /// Launch a headless Chromium instance.
    pub async fn launch(
        explicit_path: Option<&Path>,
        viewport: Viewport,
        web_security: WebSecurity,
    ) -> Result<Self> {
        let chrome_path = find_chromium(explicit_path)
            .context("Chromium not found. Set WCAGSCAN_CHROMIUM_PATH or install Chromium.")?;

        let mut builder = BrowserConfig::builder()
            .chrome_executable(chrome_path)
            .arg("--headless=new")
            .arg("--disable-gpu")
            .arg("--no-sandbox")
            .arg("--disable-setuid-sandbox")
            .arg("--disable-dev-shm-usage")
            .arg("--disable-extensions")
            .arg("--disable-background-networking")
            .window_size(viewport.width, viewport.height);
        if web_security == WebSecurity::Disabled {
            builder = builder.arg("--disable-web-security");
        }
        let config = builder
            .build()
            .map_err(|e| anyhow::anyhow!("failed to build browser config: {e}"))?;

        let (browser, mut handler) = Browser::launch(config)
            .await
            .context("failed to launch Chromium")?;

        let handler = tokio::spawn(async move {
            while let Some(event) = handler.next().await {
                if let Err(e) = event {
                    debug!("chromium handler error: {e}");
                }
            }
        });

        Ok(Self {
            browser,
            handler,
            active_count: Arc::new(AtomicUsize::new(0)),
        })
    }
}

impl Drop for ChromiumRenderer {
    fn drop(&mut self) {
        self.handler.abort();
    }
}

#[async_trait]
impl Renderer for ChromiumRenderer {
    async fn new_context(&self, viewport: Viewport) -> Result<Box<dyn RenderContext>, RenderFailure> {
        let page = self
            .browser
            .new_page("about:blank")
            .await
            .map_err(|e| RenderFailure::Other(format!("failed to create new page: {e}")))?;

        // Count the page before configuring it so a failed setup still
        // balances against the close below.
        self.active_count.fetch_add(1, Ordering::SeqCst);
        let context = ChromiumContext {
            page,
            active_count: Arc::clone(&self.active_count),
        };

        if let Err(e) = context.configure(viewport).await {
            let _ = Box::new(context).close().await;
            return Err(e);
        }

        Ok(Box::new(context))
    }

    async fn shutdown(&self) -> Result<()> {
        // Browser is dropped (and the process killed) with the renderer.
        Ok(())
    }

    fn active_contexts(&self) -> usize {
        self.active_count.load(Ordering::SeqCst)
    }

    fn name(&self) -> &'static str {
        "chromium"
    }
}

/// A single Chromium page context.
pub struct ChromiumContext {
    page: Page,
    active_count: Arc<AtomicUsize>,
}

impl ChromiumContext {
    async fn configure(&self, viewport: Viewport) -> Result<(), RenderFailure> {
        self.page
            .execute(SetDeviceMetricsOverrideParams::new(
                viewport.width as i64,
                viewport.height as i64,
                1.0,
                false,
            ))
            .await
            .map_err(|e| RenderFailure::Other(format!("failed to set viewport: {e}")))?;
        self.page
            .execute(SetLifecycleEventsEnabledParams::new(true))
            .await
            .map_err(|e| RenderFailure::Other(format!("failed to enable lifecycle events: {e}")))?;
        Ok(())
    }
}

#[async_trait]
impl RenderContext for ChromiumContext {
    async fn navigate(&mut self, url: &str, timeout: Duration) -> Result<NavigationResult, RenderFailure> {
        let start = Instant::now();

        let mut lifecycle = self
            .page
            .event_listener::<EventLifecycleEvent>()
            .await
            .map_err(|e| RenderFailure::Other(format!("failed to subscribe to lifecycle events: {e}")))?;

        let page = &self.page;
        let settle = async {
            let response = page
                .execute(NavigateParams::new(url))
                .await
                .map_err(|e| RenderFailure::NavigationFailed(e.to_string()))?;

            if let Some(error_text) = &response.result.error_text {
                return Err(navigation_error(error_text, url));
            }

            let frame_id = response.result.frame_id.clone();
            let loader_id = response.result.loader_id.clone();

            while let Some(event) = lifecycle.next().await {
                let same_load = match &loader_id {
                    Some(id) => &event.loader_id == id,
                    None => true,
                };
                if event.frame_id == frame_id && same_load && event.name == NETWORK_ALMOST_IDLE {
                    return Ok(());
                }
            }

            Err(RenderFailure::NavigationFailed(
                "page closed before the network went idle".to_string(),
            ))
        };

        match tokio::time::timeout(timeout, settle).await {
            Ok(Ok(())) => {}
            Ok(Err(e)) => return Err(e),
            Err(_) => {
                return Err(RenderFailure::NavigationTimeout {
                    timeout_ms: timeout.as_millis() as u64,
                })
            }
        }

        let final_url = self
            .page
            .url()
            .await
            .ok()
            .flatten()
            .map(|u| u.to_string())
            .unwrap_or_else(|| url.to_string());

        Ok(NavigationResult {
            final_url,
            load_time_ms: start.elapsed().as_millis() as u64,
            network_idle: true,
        })
    }

    async fn execute_js(&self, script: &str) -> Result<serde_json::Value> {
        let result = self
            .page
            .evaluate(script)
            .await
            .context("JS execution failed")?;

        result
            .into_value()
            .map_err(|e| anyhow::anyhow!("failed to convert JS result: {e:?}"))
    }

    fn document(&self) -> DocumentHandle {
        DocumentHandle::top_level()
    }

    async fn close(self: Box<Self>) -> Result<()> {
        self.active_count.fetch_sub(1, Ordering::SeqCst);
        let _ = self.page.close().await;
        Ok(())
    }
}
