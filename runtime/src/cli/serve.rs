//! `wcagscan serve` — run the server-mediated scan path over HTTP.

use crate::cli::output::{self, Styled};
use crate::config::{PathProfile, ScanConfig};
use crate::engine::axe::AxeEngine;
use crate::engine::ScanExecutor;
use crate::events::{EventBus, ScanEvent};
use crate::renderer::chromium::{ChromiumRenderer, WebSecurity};
use crate::renderer::manager::RenderManager;
use crate::renderer::{NoopRenderer, Renderer};
use crate::report::ScanPathKind;
use crate::rest::{self, AppState};
use crate::scanner::Scanner;
use anyhow::{Context, Result};
use std::sync::Arc;
use tracing::{info, warn};

/// Launch Chromium, falling back to [`NoopRenderer`] when it cannot start.
/// The flag reports whether Chromium is up.
pub(crate) async fn launch_renderer(
    config: &ScanConfig,
    web_security: WebSecurity,
) -> (Arc<dyn Renderer>, bool) {
    match ChromiumRenderer::launch(config.chromium_path.as_deref(), config.viewport, web_security)
        .await
    {
        Ok(renderer) => {
            info!("Chromium renderer initialized");
            (Arc::new(renderer), true)
        }
        Err(e) => {
            warn!("failed to initialize Chromium: {e:#}");
            warn!("scans will fail until Chromium is available");
            (Arc::new(NoopRenderer), false)
        }
    }
}

/// Wire a scanner for one path.
pub(crate) fn build_scanner(
    config: &ScanConfig,
    renderer: Arc<dyn Renderer>,
    engine: Arc<AxeEngine>,
    profile: PathProfile,
    path: ScanPathKind,
) -> Scanner {
    let manager = RenderManager::new(renderer, config.max_concurrent, config.viewport, profile);
    let executor = ScanExecutor::new(engine, config.engine_timeout);
    Scanner::new(manager, executor, path)
}

/// Start the scan server and block until Ctrl-C.
pub async fn run(port: Option<u16>) -> Result<()> {
    let s = Styled::new();
    let config = ScanConfig::from_env();
    let port = port.unwrap_or(config.port);

    info!("starting wcagscan v{}", env!("CARGO_PKG_VERSION"));

    let engine = Arc::new(AxeEngine::load(&config).context("cannot start scan server")?);
    let (renderer, chromium_available) = launch_renderer(&config, WebSecurity::Disabled).await;

    let events = Arc::new(EventBus::default());
    let scanner = build_scanner(
        &config,
        Arc::clone(&renderer),
        engine,
        config.server_profile,
        ScanPathKind::Server,
    )
    .with_events(Arc::clone(&events));
    let state = Arc::new(AppState::new(
        Arc::new(scanner),
        Arc::clone(&events),
        chromium_available,
    ));

    events.emit(ScanEvent::RuntimeStarted {
        version: env!("CARGO_PKG_VERSION").to_string(),
        http_port: port,
        renderer: renderer.name().to_string(),
    });

    if output::is_json() {
        output::print_json(&serde_json::json!({
            "status": "listening",
            "port": port,
            "chromium_available": chromium_available,
            "max_concurrent": config.max_concurrent,
        }));
    } else if !output::is_quiet() {
        eprintln!(
            "  {} wcagscan v{} serving on http://127.0.0.1:{port}",
            s.ok_sym(),
            env!("CARGO_PKG_VERSION")
        );
        if !chromium_available {
            eprintln!(
                "  {} Chromium not available; scans will fail. Run `wcagscan doctor`.",
                s.warn_sym()
            );
        }
        eprintln!("  {}", s.dim("Press Ctrl-C to stop."));
    }

    let shutdown = async {
        let _ = tokio::signal::ctrl_c().await;
        info!("received shutdown signal");
    };
    let result = rest::start(port, state, shutdown).await;

    if let Err(e) = renderer.shutdown().await {
        warn!("renderer shutdown failed: {e:#}");
    }
    if !output::is_quiet() && !output::is_json() {
        eprintln!("  {} wcagscan stopped.", s.ok_sym());
    }

    result
}
