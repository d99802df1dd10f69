//! Fake renderer and engine shared by the integration tests.

#![allow(dead_code)]

use async_trait::async_trait;
use serde_json::{json, Value};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;
use wcagscan_runtime::config::{PathProfile, Viewport};
use wcagscan_runtime::engine::types::{NodeResult, RawEngineResult, RuleResult, TargetSelector};
use wcagscan_runtime::engine::{RuleEngine, ScanExecutor};
use wcagscan_runtime::error::{EngineFailure, RenderFailure};
use wcagscan_runtime::renderer::manager::RenderManager;
use wcagscan_runtime::renderer::{DocumentHandle, NavigationResult, RenderContext, Renderer};
use wcagscan_runtime::report::ScanPathKind;
use wcagscan_runtime::scanner::Scanner;

/// How a fake context responds to `navigate`.
#[derive(Clone, Debug)]
pub enum Nav {
    Ok,
    /// Never settles and ignores the timeout it is handed.
    Hang,
    Fail(RenderFailure),
}

pub struct FakeRenderer {
    nav: Nav,
    document_reachable: bool,
    frame_outcome: &'static str,
    active: Arc<AtomicUsize>,
    created: AtomicUsize,
}

impl FakeRenderer {
    pub fn new(nav: Nav) -> Arc<Self> {
        Self::build(nav, true, "loaded")
    }

    /// A page whose document cannot be reached (cross-origin frame).
    pub fn cross_origin() -> Arc<Self> {
        Self::build(Nav::Ok, false, "loaded")
    }

    fn build(nav: Nav, document_reachable: bool, frame_outcome: &'static str) -> Arc<Self> {
        Arc::new(Self {
            nav,
            document_reachable,
            frame_outcome,
            active: Arc::new(AtomicUsize::new(0)),
            created: AtomicUsize::new(0),
        })
    }

    pub fn created(&self) -> usize {
        self.created.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl Renderer for FakeRenderer {
    async fn new_context(&self, _viewport: Viewport) -> Result<Box<dyn RenderContext>, RenderFailure> {
        self.created.fetch_add(1, Ordering::SeqCst);
        self.active.fetch_add(1, Ordering::SeqCst);
        Ok(Box::new(FakeContext {
            nav: self.nav.clone(),
            document_reachable: self.document_reachable,
            frame_outcome: self.frame_outcome,
            active: Arc::clone(&self.active),
        }))
    }

    async fn shutdown(&self) -> anyhow::Result<()> {
        Ok(())
    }

    fn active_contexts(&self) -> usize {
        self.active.load(Ordering::SeqCst)
    }

    fn name(&self) -> &'static str {
        "fake"
    }
}

pub struct FakeContext {
    nav: Nav,
    document_reachable: bool,
    frame_outcome: &'static str,
    active: Arc<AtomicUsize>,
}

#[async_trait]
impl RenderContext for FakeContext {
    async fn navigate(&mut self, url: &str, _timeout: Duration) -> Result<NavigationResult, RenderFailure> {
        match &self.nav {
            Nav::Ok => Ok(NavigationResult {
                final_url: url.to_string(),
                load_time_ms: 5,
                network_idle: true,
            }),
            Nav::Hang => std::future::pending().await,
            Nav::Fail(f) => Err(f.clone()),
        }
    }

    async fn execute_js(&self, script: &str) -> anyhow::Result<Value> {
        if script.starts_with("new Promise") {
            return Ok(json!({ "outcome": self.frame_outcome }));
        }
        if script.contains("return d !== null") {
            return Ok(json!(self.document_reachable));
        }
        Ok(json!(true))
    }

    fn document(&self) -> DocumentHandle {
        DocumentHandle::top_level()
    }

    async fn close(self: Box<Self>) -> anyhow::Result<()> {
        self.active.fetch_sub(1, Ordering::SeqCst);
        Ok(())
    }
}

/// Engine returning canned output, optionally after a delay.
pub struct FakeEngine {
    pub output: Result<RawEngineResult, EngineFailure>,
    pub delay: Duration,
}

impl FakeEngine {
    pub fn returning(raw: RawEngineResult) -> Arc<Self> {
        Arc::new(Self {
            output: Ok(raw),
            delay: Duration::ZERO,
        })
    }

    pub fn slow(raw: RawEngineResult, delay: Duration) -> Arc<Self> {
        Arc::new(Self {
            output: Ok(raw),
            delay,
        })
    }

    pub fn failing(failure: EngineFailure) -> Arc<Self> {
        Arc::new(Self {
            output: Err(failure),
            delay: Duration::ZERO,
        })
    }
}

#[async_trait]
impl RuleEngine for FakeEngine {
    async fn analyze(
        &self,
        _context: &dyn RenderContext,
        _document: &DocumentHandle,
        _tags: &[&str],
    ) -> Result<RawEngineResult, EngineFailure> {
        if !self.delay.is_zero() {
            tokio::time::sleep(self.delay).await;
        }
        self.output.clone()
    }

    fn name(&self) -> &str {
        "fake-engine"
    }
}

pub fn rule(id: &str, impact: Option<&str>, nodes: usize) -> RuleResult {
    RuleResult {
        id: id.to_string(),
        impact: impact.map(String::from),
        description: format!("{id} description"),
        help_text: format!("{id} help"),
        help_url: format!("https://dequeuniversity.com/rules/axe/4.10/{id}"),
        tags: ["wcag2a".to_string()].into_iter().collect(),
        nodes: (0..nodes)
            .map(|i| NodeResult {
                html: format!("<p id=\"n{i}\"></p>"),
                target: vec![TargetSelector::Css(format!("#n{i}"))],
                failure_summary: None,
                impact: None,
            })
            .collect(),
    }
}

/// `image-alt` (critical, 2 nodes) and `color-contrast` (serious, 5 nodes),
/// reported in the "wrong" order.
pub fn sample_raw() -> RawEngineResult {
    RawEngineResult {
        violations: vec![
            rule("color-contrast", Some("serious"), 5),
            rule("image-alt", Some("critical"), 2),
        ],
        passes: vec![rule("document-title", None, 1)],
        ..Default::default()
    }
}

pub fn profile(timeout_ms: u64) -> PathProfile {
    PathProfile {
        navigation_timeout: Duration::from_millis(timeout_ms),
        grace: Duration::from_millis(10),
    }
}

pub fn scanner(
    renderer: Arc<dyn Renderer>,
    engine: Arc<dyn RuleEngine>,
    ceiling: usize,
    profile: PathProfile,
    path: ScanPathKind,
) -> Scanner {
    let manager = RenderManager::new(renderer, ceiling, Viewport::default(), profile);
    Scanner::new(manager, ScanExecutor::new(engine, Duration::from_secs(5)), path)
}
