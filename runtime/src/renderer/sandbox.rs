//! Same-origin frame container for the local scan path.
//!
//! The container is a hidden iframe injected into a host page served from
//! the configured local origin. The browser's same-origin policy applies
//! exactly as it would for an in-page scan: a cross-origin target loads, but
//! its document stays unreachable and the engine step reports
//! `CrossOriginBlocked`.
//!
//! Frame load, load error and timeout all resolve through one awaited
//! outcome, and the frame is detached in `close` whatever happened.

use super::{DocumentHandle, NavigationResult, RenderContext, Renderer};
use crate::config::Viewport;
use crate::error::RenderFailure;
use anyhow::Result;
use async_trait::async_trait;
use serde::Deserialize;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::{Duration, Instant};
use tracing::{debug, warn};

/// DOM id of the injected frame.
pub const FRAME_ID: &str = "__wcagscan_frame";

/// Renderer that wraps another renderer's contexts in a frame container.
pub struct SandboxRenderer {
    host: Arc<dyn Renderer>,
    origin: String,
    active_count: Arc<AtomicUsize>,
}

impl SandboxRenderer {
    /// `origin` is the page the container is hosted in, e.g.
    /// `http://localhost:3000`.
    pub fn new(host: Arc<dyn Renderer>, origin: &str) -> Self {
        Self {
            host,
            origin: origin.trim_end_matches('/').to_string(),
            active_count: Arc::new(AtomicUsize::new(0)),
        }
    }

    pub fn origin(&self) -> &str {
        &self.origin
    }
}

#[async_trait]
impl Renderer for SandboxRenderer {
    async fn new_context(&self, viewport: Viewport) -> Result<Box<dyn RenderContext>, RenderFailure> {
        let host = self.host.new_context(viewport).await?;
        self.active_count.fetch_add(1, Ordering::SeqCst);
        Ok(Box::new(FrameContainer {
            host,
            origin: self.origin.clone(),
            viewport,
            attached: false,
            active_count: Arc::clone(&self.active_count),
        }))
    }

    async fn shutdown(&self) -> Result<()> {
        self.host.shutdown().await
    }

    fn active_contexts(&self) -> usize {
        self.active_count.load(Ordering::SeqCst)
    }

    fn name(&self) -> &'static str {
        "sandbox"
    }
}

/// One hidden iframe inside a host page.
pub struct FrameContainer {
    host: Box<dyn RenderContext>,
    origin: String,
    viewport: Viewport,
    attached: bool,
    active_count: Arc<AtomicUsize>,
}

#[derive(Debug, Deserialize)]
struct FrameOutcome {
    outcome: String,
}

impl FrameContainer {
    fn attach_script(&self, url: &str) -> Result<String, RenderFailure> {
        let src = serde_json::to_string(url)
            .map_err(|e| RenderFailure::Other(format!("failed to encode frame URL: {e}")))?;
        Ok(format!(
            r#"new Promise((resolve) => {{
  const previous = document.getElementById('{id}');
  if (previous) previous.remove();
  const frame = document.createElement('iframe');
  frame.id = '{id}';
  frame.setAttribute('aria-hidden', 'true');
  frame.style.position = 'absolute';
  frame.style.left = '-9999px';
  frame.style.width = '{w}px';
  frame.style.height = '{h}px';
  frame.onload = () => resolve({{ outcome: 'loaded' }});
  frame.onerror = () => resolve({{ outcome: 'error' }});
  frame.src = {src};
  (document.body || document.documentElement).appendChild(frame);
}})"#,
            id = FRAME_ID,
            w = self.viewport.width,
            h = self.viewport.height,
        ))
    }

    fn detach_script() -> String {
        format!(
            "(() => {{ const f = document.getElementById('{FRAME_ID}'); if (f) f.remove(); return true; }})()"
        )
    }
}

#[async_trait]
impl RenderContext for FrameContainer {
    async fn navigate(&mut self, url: &str, timeout: Duration) -> Result<NavigationResult, RenderFailure> {
        let start = Instant::now();

        // The host load and the frame load share one budget.
        self.host.navigate(&self.origin, timeout).await.map_err(|e| match e {
            RenderFailure::NavigationTimeout { .. } => e,
            other => RenderFailure::ContainerHost {
                origin: self.origin.clone(),
                reason: other.to_string(),
            },
        })?;

        let remaining = timeout.saturating_sub(start.elapsed());
        let script = self.attach_script(url)?;
        self.attached = true;

        let outcome = match tokio::time::timeout(remaining, self.host.execute_js(&script)).await {
            Err(_) => {
                return Err(RenderFailure::NavigationTimeout {
                    timeout_ms: timeout.as_millis() as u64,
                })
            }
            Ok(Err(e)) => return Err(RenderFailure::Other(format!("{e:#}"))),
            Ok(Ok(value)) => serde_json::from_value::<FrameOutcome>(value)
                .map_err(|e| RenderFailure::Other(format!("unexpected frame outcome: {e}")))?,
        };

        match outcome.outcome.as_str() {
            "loaded" => Ok(NavigationResult {
                final_url: url.to_string(),
                load_time_ms: start.elapsed().as_millis() as u64,
                // Frames expose no network-idle signal; onload is the best we get.
                network_idle: false,
            }),
            _ => Err(RenderFailure::NavigationFailed(
                "Failed to load URL - page may not exist or is unreachable".to_string(),
            )),
        }
    }

    async fn execute_js(&self, script: &str) -> Result<serde_json::Value> {
        self.host.execute_js(script).await
    }

    fn document(&self) -> DocumentHandle {
        DocumentHandle::expression(format!(
            "(document.getElementById('{FRAME_ID}')?.contentDocument ?? null)"
        ))
    }

    async fn close(self: Box<Self>) -> Result<()> {
        let FrameContainer {
            host,
            attached,
            active_count,
            ..
        } = *self;

        if attached {
            if let Err(e) = host.execute_js(&Self::detach_script()).await {
                debug!("frame detach failed (host closing anyway): {e:#}");
            }
        }
        active_count.fetch_sub(1, Ordering::SeqCst);

        if let Err(e) = host.close().await {
            warn!("failed to close container host: {e:#}");
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::{json, Value};
    use std::sync::Mutex;

    /// Host context that records scripts and answers the attach promise.
    struct ScriptedHost {
        outcome: Option<Value>,
        scripts: Arc<Mutex<Vec<String>>>,
        closed: Arc<AtomicUsize>,
    }

    #[async_trait]
    impl RenderContext for ScriptedHost {
        async fn navigate(&mut self, url: &str, _timeout: Duration) -> Result<NavigationResult, RenderFailure> {
            Ok(NavigationResult {
                final_url: url.to_string(),
                load_time_ms: 1,
                network_idle: true,
            })
        }
        async fn execute_js(&self, script: &str) -> Result<Value> {
            self.scripts.lock().unwrap().push(script.to_string());
            if script.contains("new Promise") {
                match &self.outcome {
                    Some(v) => Ok(v.clone()),
                    None => futures::future::pending().await,
                }
            } else {
                Ok(json!(true))
            }
        }
        fn document(&self) -> DocumentHandle {
            DocumentHandle::top_level()
        }
        async fn close(self: Box<Self>) -> Result<()> {
            self.closed.fetch_add(1, Ordering::SeqCst);
            Ok(())
        }
    }

    fn container(outcome: Option<Value>) -> (FrameContainer, Arc<Mutex<Vec<String>>>, Arc<AtomicUsize>) {
        let scripts = Arc::new(Mutex::new(Vec::new()));
        let closed = Arc::new(AtomicUsize::new(0));
        let host = ScriptedHost {
            outcome,
            scripts: Arc::clone(&scripts),
            closed: Arc::clone(&closed),
        };
        let active = Arc::new(AtomicUsize::new(1));
        (
            FrameContainer {
                host: Box::new(host),
                origin: "http://localhost:3000".into(),
                viewport: Viewport::default(),
                attached: false,
                active_count: active,
            },
            scripts,
            closed,
        )
    }

    #[tokio::test]
    async fn test_loaded_frame_then_detached_on_close() {
        let (mut c, scripts, closed) = container(Some(json!({ "outcome": "loaded" })));
        let nav = c
            .navigate("http://localhost:3000/page.html", Duration::from_secs(1))
            .await
            .unwrap();
        assert_eq!(nav.final_url, "http://localhost:3000/page.html");
        assert!(scripts.lock().unwrap()[0].contains("\"http://localhost:3000/page.html\""));
        assert!(scripts.lock().unwrap()[0].contains("1024px"));

        Box::new(c).close().await.unwrap();
        let scripts = scripts.lock().unwrap();
        assert!(scripts.last().unwrap().contains(".remove()"));
        assert_eq!(closed.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn test_frame_error_is_navigation_failure() {
        let (mut c, _, _) = container(Some(json!({ "outcome": "error" })));
        let err = c
            .navigate("http://localhost:3000/missing", Duration::from_secs(1))
            .await
            .unwrap_err();
        assert!(matches!(err, RenderFailure::NavigationFailed(_)));
    }

    #[tokio::test]
    async fn test_frame_that_never_loads_times_out() {
        let (mut c, scripts, closed) = container(None);
        let err = c
            .navigate("http://localhost:3000/slow", Duration::from_millis(50))
            .await
            .unwrap_err();
        assert_eq!(err, RenderFailure::NavigationTimeout { timeout_ms: 50 });

        // Cleanup still removes the half-attached frame.
        Box::new(c).close().await.unwrap();
        assert!(scripts.lock().unwrap().last().unwrap().contains(".remove()"));
        assert_eq!(closed.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn test_document_handle_targets_frame() {
        let (c, _, _) = container(None);
        assert!(c.document().as_js().contains(FRAME_ID));
        assert!(c.document().as_js().contains("contentDocument"));
    }
}
