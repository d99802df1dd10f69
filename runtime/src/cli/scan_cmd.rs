//! `wcagscan scan <url>` — scan one page through the path selector.

use crate::classify::{ErrorKind, ScanError};
use crate::cli::output::{self, Styled};
use crate::cli::serve::{build_scanner, launch_renderer};
use crate::config::ScanConfig;
use crate::engine::axe::AxeEngine;
use crate::engine::types::Impact;
use crate::events::{EventBus, ScanEvent};
use crate::renderer::chromium::WebSecurity;
use crate::renderer::sandbox::SandboxRenderer;
use crate::report::export::{default_filename, render_text, write_report};
use crate::report::{ScanPathKind, ScanReport, SortOrder};
use crate::scanner::{cancel_pair, CancelToken, Scanner};
use crate::selector::client::ServerClient;
use crate::selector::probe::{AvailabilityProbe, SystemClock};
use crate::selector::{PathPreference, ScanBackend, ScanSelector};
use anyhow::{bail, Context, Result};
use async_trait::async_trait;
use indicatif::ProgressBar;
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::{broadcast, OnceCell};
use tokio::task::JoinHandle;
use tracing::debug;

/// `--path` values.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, clap::ValueEnum)]
pub enum PathArg {
    /// Server path when reachable, local otherwise.
    #[default]
    Auto,
    /// Require the scan server.
    Server,
    /// Always scan locally in the same-origin frame container.
    Local,
}

/// `--sort` values.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, clap::ValueEnum)]
pub enum SortArg {
    #[default]
    Priority,
    Instances,
}

impl From<SortArg> for SortOrder {
    fn from(arg: SortArg) -> Self {
        match arg {
            SortArg::Priority => SortOrder::Priority,
            SortArg::Instances => SortOrder::Instances,
        }
    }
}

pub struct ScanArgs {
    pub url: String,
    pub path: PathArg,
    pub server: Option<String>,
    pub impact: Option<Impact>,
    pub sort: SortArg,
    pub output: Option<PathBuf>,
}

/// The local path, started on first use so a server-path scan never
/// launches a browser here.
struct LazyLocal {
    config: ScanConfig,
    events: Arc<EventBus>,
    scanner: OnceCell<Scanner>,
}

impl LazyLocal {
    fn new(config: ScanConfig, events: Arc<EventBus>) -> Self {
        Self {
            config,
            events,
            scanner: OnceCell::new(),
        }
    }

    async fn scanner(&self) -> Result<&Scanner> {
        self.scanner
            .get_or_try_init(|| async {
                let engine = Arc::new(AxeEngine::load(&self.config)?);
                let (host, chromium) = launch_renderer(&self.config, WebSecurity::Enforced).await;
                if !chromium {
                    bail!("the local path needs Chromium. Run `wcagscan doctor`.");
                }
                let renderer = Arc::new(SandboxRenderer::new(host, &self.config.local_origin));
                Ok(build_scanner(
                    &self.config,
                    renderer,
                    engine,
                    self.config.local_profile,
                    ScanPathKind::Local,
                )
                .with_events(Arc::clone(&self.events)))
            })
            .await
    }
}

#[async_trait]
impl ScanBackend for LazyLocal {
    async fn scan(&self, url: &str, cancel: &CancelToken) -> Result<ScanReport, ScanError> {
        let scanner = self.scanner().await.map_err(|e| {
            ScanError::new(ErrorKind::Unknown, url)
                .with_details(format!("local path unavailable: {e:#}"))
        })?;
        scanner.submit_with_cancel(url, cancel).await
    }

    fn describe(&self) -> String {
        format!("local frame container hosted at {}", self.config.local_origin)
    }
}

/// Upper bound for one remote scan.
fn remote_scan_timeout(config: &ScanConfig) -> Duration {
    config.server_profile.navigation_timeout
        + config.server_profile.grace
        + config.engine_timeout
        + Duration::from_secs(10)
}

/// Spinner text for a lifecycle event, if it changes what the user sees.
fn progress_message(event: &ScanEvent) -> Option<String> {
    match event {
        ScanEvent::ScanStarted { url, path, .. } => Some(format!("Scanning {url} ({path} path)")),
        ScanEvent::NavigationComplete {
            final_url,
            load_time_ms,
            ..
        } => Some(format!("Analyzing {final_url} (loaded in {load_time_ms}ms)")),
        ScanEvent::AvailabilityChanged {
            server_path_available,
        } => Some(if *server_path_available {
            "Scan server is up".to_string()
        } else {
            "Scan server is down".to_string()
        }),
        _ => None,
    }
}

/// Mirror lifecycle events onto the spinner until the bus closes or the
/// task is aborted.
fn follow_progress(events: &EventBus, pb: ProgressBar) -> JoinHandle<()> {
    let mut rx = events.subscribe();
    tokio::spawn(async move {
        loop {
            match rx.recv().await {
                Ok(event) => {
                    if let Some(msg) = progress_message(&event) {
                        pb.set_message(msg);
                    }
                }
                Err(broadcast::error::RecvError::Lagged(_)) => continue,
                Err(broadcast::error::RecvError::Closed) => break,
            }
        }
    })
}

/// Run the scan command.
pub async fn run(args: ScanArgs) -> Result<()> {
    let s = Styled::new();
    let config = ScanConfig::from_env();
    let server_url = args.server.clone().unwrap_or_else(|| config.server_url.clone());

    let events = Arc::new(EventBus::default());

    let client = Arc::new(ServerClient::new(&server_url, remote_scan_timeout(&config))?);
    let probe = Arc::new(
        AvailabilityProbe::new(client.clone(), Arc::new(SystemClock), config.probe_interval)
            .with_events(Arc::clone(&events)),
    );
    let selector = ScanSelector::new(
        Arc::clone(&probe),
        client,
        Arc::new(LazyLocal::new(config.clone(), Arc::clone(&events))),
    );

    let preference = match args.path {
        PathArg::Local => PathPreference::Local,
        PathArg::Auto | PathArg::Server => PathPreference::Server,
    };
    if preference == PathPreference::Server {
        let pb = output::spinner(format!("Checking scan server at {server_url}"));
        let available = probe.refresh().await;
        pb.finish_and_clear();
        debug!("server path available: {available:?}");
        if args.path == PathArg::Server && available != Some(true) {
            bail!("scan server at {server_url} is not reachable. Start it with `wcagscan serve`.");
        }
    }

    let (cancel_handle, cancel) = cancel_pair();
    let interrupt = tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            cancel_handle.cancel();
        }
    });

    let pb = output::spinner(format!("Scanning {}", args.url));
    let progress = follow_progress(&events, pb.clone());
    let attempt = selector.submit(&args.url, preference, &cancel).await;
    progress.abort();
    pb.finish_and_clear();
    interrupt.abort();

    let report = attempt.outcome?;

    if let Some(out) = &args.output {
        let path = if out.is_dir() {
            out.join(default_filename(report.timestamp))
        } else {
            out.clone()
        };
        write_report(&report, &path)?;
        if !output::is_quiet() && !output::is_json() {
            eprintln!("  {} Report saved to {}", s.ok_sym(), path.display());
        }
    }

    if output::is_json() {
        let value = serde_json::to_value(&report).context("failed to serialize report")?;
        output::print_json(&value);
    } else if !output::is_quiet() {
        print!("{}", render_text(&report, args.impact, args.sort.into()));
    }

    Ok(())
}
