//! Scan execution: runs the external rule engine against a ready context.

pub mod axe;
pub mod types;

use crate::error::EngineFailure;
use crate::renderer::{DocumentHandle, RenderContext};
use async_trait::async_trait;
use std::sync::Arc;
use std::time::Duration;
use tracing::debug;
use types::RawEngineResult;

/// Rule tags selecting the WCAG 2.2 AA-and-below rule surface.
pub const RULE_TAGS: [&str; 5] = ["wcag2a", "wcag2aa", "wcag21a", "wcag21aa", "wcag22aa"];

/// Result categories requested from the engine.
pub const RESULT_TYPES: [&str; 4] = ["violations", "incomplete", "inapplicable", "passes"];

/// An accessibility rule engine. Treated as opaque: given a document and a
/// rule-tag selection it returns the four result categories.
#[async_trait]
pub trait RuleEngine: Send + Sync {
    async fn analyze(
        &self,
        context: &dyn RenderContext,
        document: &DocumentHandle,
        tags: &[&str],
    ) -> Result<RawEngineResult, EngineFailure>;

    fn name(&self) -> &str;
}

/// Invokes the engine after checking the document is reachable at all. Both
/// steps share one timeout.
pub struct ScanExecutor {
    engine: Arc<dyn RuleEngine>,
    timeout: Duration,
}

impl ScanExecutor {
    pub fn new(engine: Arc<dyn RuleEngine>, timeout: Duration) -> Self {
        Self { engine, timeout }
    }

    pub fn engine_name(&self) -> &str {
        self.engine.name()
    }

    /// Run the engine against `context`.
    ///
    /// A document that cannot be obtained (cross-origin frame) fails with
    /// `CrossOriginBlocked`; everything that goes wrong inside the engine is
    /// an invocation failure.
    pub async fn run(
        &self,
        context: &dyn RenderContext,
        tags: &[&str],
    ) -> Result<RawEngineResult, EngineFailure> {
        let document = context.document();
        let analysis = async {
            ensure_document(context, &document).await?;
            debug!("running {} with tags {:?}", self.engine.name(), tags);
            self.engine.analyze(context, &document, tags).await
        };

        match tokio::time::timeout(self.timeout, analysis).await {
            Ok(result) => result,
            Err(_) => Err(EngineFailure::Timeout {
                timeout_ms: self.timeout.as_millis() as u64,
            }),
        }
    }
}

async fn ensure_document(
    context: &dyn RenderContext,
    document: &DocumentHandle,
) -> Result<(), EngineFailure> {
    let probe = format!(
        "(() => {{ try {{ const d = {}; return d !== null && d !== undefined; }} catch (e) {{ return false; }} }})()",
        document.as_js()
    );
    let reachable = context
        .execute_js(&probe)
        .await
        .map_err(|e| EngineFailure::Invocation(format!("{e:#}")))?;

    if reachable.as_bool() == Some(true) {
        Ok(())
    } else {
        Err(EngineFailure::CrossOriginBlocked(format!(
            "{} evaluated to null",
            document.as_js()
        )))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::RenderFailure;
    use crate::renderer::NavigationResult;
    use serde_json::{json, Value};

    struct StubContext {
        reachable: bool,
    }

    #[async_trait]
    impl RenderContext for StubContext {
        async fn navigate(&mut self, url: &str, _t: Duration) -> Result<NavigationResult, RenderFailure> {
            Ok(NavigationResult {
                final_url: url.into(),
                load_time_ms: 0,
                network_idle: true,
            })
        }
        async fn execute_js(&self, _script: &str) -> anyhow::Result<Value> {
            Ok(json!(self.reachable))
        }
        fn document(&self) -> DocumentHandle {
            DocumentHandle::top_level()
        }
        async fn close(self: Box<Self>) -> anyhow::Result<()> {
            Ok(())
        }
    }

    /// A page whose main thread never yields.
    struct BusyContext;

    #[async_trait]
    impl RenderContext for BusyContext {
        async fn navigate(&mut self, url: &str, _t: Duration) -> Result<NavigationResult, RenderFailure> {
            Ok(NavigationResult {
                final_url: url.into(),
                load_time_ms: 0,
                network_idle: true,
            })
        }
        async fn execute_js(&self, _script: &str) -> anyhow::Result<Value> {
            std::future::pending().await
        }
        fn document(&self) -> DocumentHandle {
            DocumentHandle::top_level()
        }
        async fn close(self: Box<Self>) -> anyhow::Result<()> {
            Ok(())
        }
    }

    struct SlowEngine;

    #[async_trait]
    impl RuleEngine for SlowEngine {
        async fn analyze(
            &self,
            _c: &dyn RenderContext,
            _d: &DocumentHandle,
            _t: &[&str],
        ) -> Result<RawEngineResult, EngineFailure> {
            tokio::time::sleep(Duration::from_secs(5)).await;
            Ok(RawEngineResult::default())
        }
        fn name(&self) -> &str {
            "slow"
        }
    }

    struct TagEcho;

    #[async_trait]
    impl RuleEngine for TagEcho {
        async fn analyze(
            &self,
            _c: &dyn RenderContext,
            _d: &DocumentHandle,
            tags: &[&str],
        ) -> Result<RawEngineResult, EngineFailure> {
            let mut raw = RawEngineResult::default();
            raw.passes.push(types::RuleResult {
                id: tags.join(","),
                ..Default::default()
            });
            Ok(raw)
        }
        fn name(&self) -> &str {
            "echo"
        }
    }

    #[test]
    fn test_rule_tags_are_wcag22_aa_surface() {
        assert_eq!(
            RULE_TAGS,
            ["wcag2a", "wcag2aa", "wcag21a", "wcag21aa", "wcag22aa"]
        );
    }

    #[tokio::test]
    async fn test_unreachable_document_is_cross_origin() {
        let exec = ScanExecutor::new(Arc::new(TagEcho), Duration::from_secs(1));
        let err = exec
            .run(&StubContext { reachable: false }, &RULE_TAGS)
            .await
            .unwrap_err();
        assert!(matches!(err, EngineFailure::CrossOriginBlocked(_)));
    }

    #[tokio::test]
    async fn test_tags_are_passed_through() {
        let exec = ScanExecutor::new(Arc::new(TagEcho), Duration::from_secs(1));
        let raw = exec
            .run(&StubContext { reachable: true }, &RULE_TAGS)
            .await
            .unwrap();
        assert_eq!(raw.passes[0].id, "wcag2a,wcag2aa,wcag21a,wcag21aa,wcag22aa");
    }

    #[tokio::test(start_paused = true)]
    async fn test_engine_timeout() {
        let exec = ScanExecutor::new(Arc::new(SlowEngine), Duration::from_millis(100));
        let err = exec
            .run(&StubContext { reachable: true }, &RULE_TAGS)
            .await
            .unwrap_err();
        assert_eq!(err, EngineFailure::Timeout { timeout_ms: 100 });
    }

    #[tokio::test(start_paused = true)]
    async fn test_stuck_page_times_out_before_engine_runs() {
        let exec = ScanExecutor::new(Arc::new(TagEcho), Duration::from_millis(100));
        let res = tokio::time::timeout(
            Duration::from_secs(3600),
            exec.run(&BusyContext, &RULE_TAGS),
        )
        .await
        .expect("executor did not honour its timeout");
        assert_eq!(res.unwrap_err(), EngineFailure::Timeout { timeout_ms: 100 });
    }
}
