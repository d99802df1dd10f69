//! Render resource management: URL validation, the concurrency ceiling, and
//! scoped context leases that are released on every exit path.

use super::{NavigationResult, RenderContext, Renderer};
use crate::config::{PathProfile, Viewport};
use crate::error::RenderFailure;
use std::sync::Arc;
use tokio::sync::{OwnedSemaphorePermit, Semaphore};
use tracing::{debug, info, warn};
use url::Url;

/// Validate a scan target: absolute, with an http or https scheme and a host.
pub fn validate_url(raw: &str) -> Result<Url, RenderFailure> {
    let invalid = |reason: &str| RenderFailure::InvalidUrl {
        url: raw.to_string(),
        reason: reason.to_string(),
    };

    let trimmed = raw.trim();
    if trimmed.is_empty() {
        return Err(invalid("URL is required"));
    }
    let url = Url::parse(trimmed).map_err(|e| invalid(&e.to_string()))?;
    match url.scheme() {
        "http" | "https" => {}
        other => return Err(invalid(&format!("unsupported scheme '{other}'"))),
    }
    if url.host_str().map_or(true, str::is_empty) {
        return Err(invalid("missing host"));
    }
    Ok(url)
}

/// Hands out render contexts, bounded by a concurrency ceiling.
pub struct RenderManager {
    renderer: Arc<dyn Renderer>,
    permits: Arc<Semaphore>,
    ceiling: usize,
    viewport: Viewport,
    profile: PathProfile,
}

impl RenderManager {
    pub fn new(
        renderer: Arc<dyn Renderer>,
        ceiling: usize,
        viewport: Viewport,
        profile: PathProfile,
    ) -> Self {
        let ceiling = ceiling.max(1);
        info!(
            "render manager: renderer={} ceiling={ceiling} nav_timeout={:?} grace={:?}",
            renderer.name(),
            profile.navigation_timeout,
            profile.grace
        );
        Self {
            renderer,
            permits: Arc::new(Semaphore::new(ceiling)),
            ceiling,
            viewport,
            profile,
        }
    }

    pub fn renderer(&self) -> &Arc<dyn Renderer> {
        &self.renderer
    }

    pub fn profile(&self) -> PathProfile {
        self.profile
    }

    pub fn ceiling(&self) -> usize {
        self.ceiling
    }

    /// Scans currently holding a slot.
    pub fn in_flight(&self) -> usize {
        self.ceiling - self.permits.available_permits()
    }

    /// Acquire a navigated, settled context for `url`.
    ///
    /// Invalid URLs fail before anything is allocated. Over the ceiling the
    /// call fails fast with `ResourceExhausted`. Context creation and
    /// navigation together are bounded by the profile's navigation timeout,
    /// whatever the renderer does. Any failure after the context exists
    /// closes it before returning. Dropping the returned future
    /// mid-navigation also closes it (see [`RenderLease`]).
    pub async fn acquire(&self, url: &str) -> Result<RenderLease, RenderFailure> {
        let target = validate_url(url)?;

        let permit = Arc::clone(&self.permits)
            .try_acquire_owned()
            .map_err(|_| RenderFailure::ResourceExhausted {
                limit: self.ceiling,
            })?;

        let mut lease = RenderLease {
            context: None,
            permit: Some(permit),
            navigation: None,
        };

        let timeout = self.profile.navigation_timeout;
        let loading = async {
            let context = self.renderer.new_context(self.viewport).await?;
            let ctx = lease.context.insert(context);
            ctx.navigate(target.as_str(), timeout).await
        };
        let navigated = match tokio::time::timeout(timeout, loading).await {
            Ok(result) => result,
            Err(_) => {
                warn!("navigation to {target} exceeded {timeout:?}");
                Err(RenderFailure::NavigationTimeout {
                    timeout_ms: timeout.as_millis() as u64,
                })
            }
        };

        match navigated {
            Ok(nav) => {
                debug!("navigated to {} in {}ms", nav.final_url, nav.load_time_ms);
                lease.navigation = Some(nav);
            }
            Err(e) => {
                lease.release().await;
                return Err(e);
            }
        }

        if !self.profile.grace.is_zero() {
            tokio::time::sleep(self.profile.grace).await;
        }

        Ok(lease)
    }
}

/// Exclusive ownership of one render context and its concurrency slot.
///
/// Call [`RenderLease::release`] to close the context. If the lease is
/// dropped instead (cancellation, panic), the close runs on a spawned task.
pub struct RenderLease {
    context: Option<Box<dyn RenderContext>>,
    permit: Option<OwnedSemaphorePermit>,
    navigation: Option<NavigationResult>,
}

impl RenderLease {
    /// The live context. Always present on a lease returned by
    /// [`RenderManager::acquire`].
    pub fn context(&self) -> Option<&dyn RenderContext> {
        self.context.as_deref()
    }

    pub fn navigation(&self) -> Option<&NavigationResult> {
        self.navigation.as_ref()
    }

    /// Close the context and free the slot.
    pub async fn release(mut self) {
        if let Some(ctx) = self.context.take() {
            if let Err(e) = ctx.close().await {
                warn!("failed to close render context: {e:#}");
            }
        }
        self.permit.take();
    }
}

impl Drop for RenderLease {
    fn drop(&mut self) {
        let Some(ctx) = self.context.take() else {
            return;
        };
        let permit = self.permit.take();
        match tokio::runtime::Handle::try_current() {
            Ok(handle) => {
                debug!("render lease dropped without release; closing in background");
                handle.spawn(async move {
                    if let Err(e) = ctx.close().await {
                        warn!("failed to close abandoned render context: {e:#}");
                    }
                    drop(permit);
                });
            }
            Err(_) => warn!("render lease dropped outside a runtime; context leaked"),
        }
    }
}
