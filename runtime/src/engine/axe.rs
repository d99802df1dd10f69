//! axe-core engine: injects the axe script into the context and runs it.

use super::types::RawEngineResult;
use super::{RuleEngine, RESULT_TYPES};
use crate::config::ScanConfig;
use crate::error::EngineFailure;
use crate::renderer::{DocumentHandle, RenderContext};
use anyhow::{bail, Context, Result};
use async_trait::async_trait;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, info};

/// axe-core, loaded once and injected into each context on demand.
pub struct AxeEngine {
    source: Arc<str>,
}

impl AxeEngine {
    pub fn from_source(source: impl Into<String>) -> Self {
        Self {
            source: Arc::from(source.into()),
        }
    }

    /// Load axe-core from `WCAGSCAN_AXE_PATH` or the install cache.
    pub fn load(config: &ScanConfig) -> Result<Self> {
        let path = resolve_script_path(config)
            .context("axe-core not found. Run `wcagscan install` or set WCAGSCAN_AXE_PATH.")?;
        let source = std::fs::read_to_string(&path)
            .with_context(|| format!("failed to read axe-core from {}", path.display()))?;
        if !source.contains("axe") {
            bail!("{} does not look like axe-core", path.display());
        }
        info!("loaded axe-core from {} ({} bytes)", path.display(), source.len());
        Ok(Self::from_source(source))
    }

    fn injection_script(&self) -> String {
        // Evaluate the bundle for its side effect, then yield a plain value
        // so the result converts cleanly.
        format!("{}\n;true", self.source)
    }

    fn run_script(document: &DocumentHandle, tags: &[&str]) -> Result<String, EngineFailure> {
        let tags = serde_json::to_string(tags)
            .map_err(|e| EngineFailure::Invocation(format!("failed to encode tags: {e}")))?;
        let result_types = serde_json::to_string(&RESULT_TYPES)
            .map_err(|e| EngineFailure::Invocation(format!("failed to encode result types: {e}")))?;
        Ok(format!(
            r#"(async () => {{
  const doc = {doc};
  if (!doc) {{ throw new Error('document not accessible'); }}
  const results = await window.axe.run(doc, {{
    runOnly: {{ type: 'tag', values: {tags} }},
    resultTypes: {result_types},
    rules: {{}}
  }});
  return JSON.stringify(results);
}})()"#,
            doc = document.as_js(),
        ))
    }
}

/// Locate axe-core on disk.
pub fn resolve_script_path(config: &ScanConfig) -> Option<PathBuf> {
    if let Some(p) = &config.axe_path {
        if p.exists() {
            return Some(p.clone());
        }
    }
    let cached = ScanConfig::axe_cache_path();
    cached.exists().then_some(cached)
}

/// Download axe-core from `url` into `dest`. Returns the number of bytes
/// written.
pub async fn download(url: &str, dest: &Path) -> Result<u64> {
    let client = reqwest::Client::builder()
        .timeout(Duration::from_secs(60))
        .build()
        .context("failed to build HTTP client")?;
    let response = client
        .get(url)
        .send()
        .await
        .with_context(|| format!("failed to download {url}"))?
        .error_for_status()
        .with_context(|| format!("download of {url} failed"))?;
    let body = response.text().await.context("failed to read download body")?;
    if !body.contains("axe") {
        bail!("{url} did not return axe-core");
    }

    if let Some(parent) = dest.parent() {
        std::fs::create_dir_all(parent)
            .with_context(|| format!("failed to create {}", parent.display()))?;
    }
    std::fs::write(dest, &body).with_context(|| format!("failed to write {}", dest.display()))?;
    Ok(body.len() as u64)
}

#[async_trait]
impl RuleEngine for AxeEngine {
    async fn analyze(
        &self,
        context: &dyn RenderContext,
        document: &DocumentHandle,
        tags: &[&str],
    ) -> Result<RawEngineResult, EngineFailure> {
        let present = context
            .execute_js("typeof window.axe !== 'undefined'")
            .await
            .map_err(|e| EngineFailure::Invocation(format!("{e:#}")))?;

        if present.as_bool() != Some(true) {
            debug!("injecting axe-core ({} bytes)", self.source.len());
            context
                .execute_js(&self.injection_script())
                .await
                .map_err(|e| EngineFailure::Invocation(format!("failed to inject axe-core: {e:#}")))?;
        }

        let output = context
            .execute_js(&Self::run_script(document, tags)?)
            .await
            .map_err(|e| EngineFailure::Invocation(format!("{e:#}")))?;

        let json = output.as_str().ok_or_else(|| {
            EngineFailure::MalformedOutput(format!("expected a JSON string, got {output}"))
        })?;
        serde_json::from_str(json).map_err(|e| EngineFailure::MalformedOutput(e.to_string()))
    }

    fn name(&self) -> &str {
        "axe-core"
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::RenderFailure;
    use crate::renderer::NavigationResult;
    use serde_json::{json, Value};
    use std::sync::Mutex;

    /// Context that pretends to be a page with (or without) axe loaded.
    struct AxeStub {
        has_axe: Mutex<bool>,
        run_output: Value,
        scripts: Mutex<Vec<String>>,
    }

    #[async_trait]
    impl RenderContext for AxeStub {
        async fn navigate(&mut self, url: &str, _t: Duration) -> Result<NavigationResult, RenderFailure> {
            Ok(NavigationResult {
                final_url: url.into(),
                load_time_ms: 0,
                network_idle: true,
            })
        }
        async fn execute_js(&self, script: &str) -> Result<Value> {
            self.scripts.lock().unwrap().push(script.to_string());
            if script.starts_with("typeof window.axe") {
                return Ok(json!(*self.has_axe.lock().unwrap()));
            }
            if script.ends_with(";true") {
                *self.has_axe.lock().unwrap() = true;
                return Ok(json!(true));
            }
            Ok(self.run_output.clone())
        }
        fn document(&self) -> DocumentHandle {
            DocumentHandle::top_level()
        }
        async fn close(self: Box<Self>) -> Result<()> {
            Ok(())
        }
    }

    fn stub(has_axe: bool, run_output: Value) -> AxeStub {
        AxeStub {
            has_axe: Mutex::new(has_axe),
            run_output,
            scripts: Mutex::new(Vec::new()),
        }
    }

    #[tokio::test]
    async fn test_injects_once_then_runs() {
        let engine = AxeEngine::from_source("window.axe = {};");
        let results = json!({
            "violations": [{ "id": "image-alt", "impact": "critical", "nodes": [] }],
            "passes": [], "incomplete": [], "inapplicable": []
        })
        .to_string();
        let ctx = stub(false, json!(results));

        let raw = engine
            .analyze(&ctx, &DocumentHandle::top_level(), &super::super::RULE_TAGS)
            .await
            .unwrap();
        assert_eq!(raw.violations[0].id, "image-alt");

        let scripts = ctx.scripts.lock().unwrap();
        assert_eq!(scripts.len(), 3);
        assert!(scripts[1].starts_with("window.axe = {};"));
        assert!(scripts[2].contains("\"wcag22aa\""));
        assert!(scripts[2].contains("\"inapplicable\""));
    }

    #[tokio::test]
    async fn test_skips_injection_when_present() {
        let engine = AxeEngine::from_source("window.axe = {};");
        let ctx = stub(true, json!("{}"));
        engine
            .analyze(&ctx, &DocumentHandle::top_level(), &["wcag2a"])
            .await
            .unwrap();
        assert_eq!(ctx.scripts.lock().unwrap().len(), 2);
    }

    #[tokio::test]
    async fn test_non_string_output_is_malformed() {
        let engine = AxeEngine::from_source("window.axe = {};");
        let ctx = stub(true, json!(42));
        let err = engine
            .analyze(&ctx, &DocumentHandle::top_level(), &["wcag2a"])
            .await
            .unwrap_err();
        assert!(matches!(err, EngineFailure::MalformedOutput(_)));
    }

    #[test]
    fn test_run_script_targets_document_expression() {
        let doc = DocumentHandle::expression("frameDoc");
        let script = AxeEngine::run_script(&doc, &["wcag2a"]).unwrap();
        assert!(script.contains("const doc = frameDoc;"));
        assert!(script.contains("runOnly"));
    }

    #[test]
    fn test_load_reports_missing_script() {
        let cfg = ScanConfig {
            axe_path: Some(PathBuf::from("/nonexistent/axe.min.js")),
            ..ScanConfig::default()
        };
        // Only meaningful when the user has no cached copy.
        if !ScanConfig::axe_cache_path().exists() {
            let err = AxeEngine::load(&cfg).err().unwrap();
            assert!(err.to_string().contains("wcagscan install"));
        }
    }

    #[test]
    fn test_load_from_explicit_path() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("axe.min.js");
        std::fs::write(&path, "/*! axe v4.10.2 */ window.axe = {};").unwrap();
        let cfg = ScanConfig {
            axe_path: Some(path),
            ..ScanConfig::default()
        };
        let engine = AxeEngine::load(&cfg).unwrap();
        assert_eq!(engine.name(), "axe-core");
    }
}
