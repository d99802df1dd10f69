//! Report export: lossless JSON for download/audit, and a plain-text
//! rendering for the terminal.

use super::{ScanReport, SortOrder};
use crate::engine::types::Impact;
use anyhow::{Context, Result};
use chrono::{DateTime, Utc};
use std::fmt::Write as _;
use std::path::Path;

/// Serialize a report as pretty-printed JSON.
pub fn to_json(report: &ScanReport) -> serde_json::Result<String> {
    serde_json::to_string_pretty(report)
}

/// Parse a report previously produced by [`to_json`].
pub fn from_json(json: &str) -> serde_json::Result<ScanReport> {
    serde_json::from_str(json)
}

/// Download filename, e.g. `accessibility-report-1760000000000.json`.
pub fn default_filename(at: DateTime<Utc>) -> String {
    format!("accessibility-report-{}.json", at.timestamp_millis())
}

/// Write the JSON export to `path`.
pub fn write_report(report: &ScanReport, path: &Path) -> Result<()> {
    let json = to_json(report).context("failed to serialize report")?;
    if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
        std::fs::create_dir_all(parent)
            .with_context(|| format!("failed to create {}", parent.display()))?;
    }
    std::fs::write(path, json).with_context(|| format!("failed to write {}", path.display()))
}

/// Read a JSON export back from `path`.
pub fn read_report(path: &Path) -> Result<ScanReport> {
    let json = std::fs::read_to_string(path)
        .with_context(|| format!("failed to read {}", path.display()))?;
    from_json(&json).with_context(|| format!("{} is not a scan report", path.display()))
}

fn guide_line(impact: Impact) -> &'static str {
    match impact {
        Impact::Critical => "blocks access for users with disabilities - fix immediately",
        Impact::Serious => "severely impacts accessibility - fix as soon as possible",
        Impact::Moderate => "creates significant barriers - address in near term",
        Impact::Minor => "small improvement to accessibility - fix when possible",
    }
}

/// Human-readable report.
pub fn render_text(report: &ScanReport, impact: Option<Impact>, order: SortOrder) -> String {
    let mut out = String::new();
    let _ = writeln!(out, "Accessibility report for {}", report.url);
    let _ = writeln!(out, "Scanned: {}", report.timestamp.to_rfc3339());
    if let Some(path) = report.scan_path {
        let _ = writeln!(out, "Path:    {path}");
    }
    if let Some(engine) = &report.engine_info.test_engine {
        let _ = writeln!(out, "Engine:  {} v{}", engine.name, engine.version);
    }
    let _ = writeln!(out);
    let _ = writeln!(
        out,
        "{} issue(s) across {} violation type(s); {} passed, {} need review",
        report.total_issues,
        report.violations.len(),
        report.pass_count,
        report.incomplete_count
    );
    let s = &report.impact_summary;
    let _ = writeln!(
        out,
        "  critical {}  serious {}  moderate {}  minor {}",
        s.critical, s.serious, s.moderate, s.minor
    );
    let _ = writeln!(out);

    if report.is_clean() {
        let _ = writeln!(
            out,
            "No issues found. This page appears to meet WCAG 2.2 Level AA."
        );
        return out;
    }

    let listed = report.view(impact, order);
    if listed.is_empty() {
        let level = impact.map(|i| i.to_string()).unwrap_or_default();
        let _ = writeln!(out, "No {level} issues found.");
        return out;
    }

    for (i, v) in listed.iter().enumerate() {
        let level = v
            .impact()
            .map(|i| i.as_str().to_uppercase())
            .unwrap_or_else(|| "UNRATED".to_string());
        let _ = writeln!(
            out,
            "{:>3}. [P{} {}] {} ({} instance{})",
            i + 1,
            v.priority,
            level,
            v.rule.help_text,
            v.instance_count,
            if v.instance_count == 1 { "" } else { "s" }
        );
        let _ = writeln!(out, "     rule: {}", v.rule.id);
        let criteria = v.rule.wcag_criteria();
        if !criteria.is_empty() {
            let _ = writeln!(out, "     WCAG: {}", criteria.join(", "));
        }
        if !v.rule.help_url.is_empty() {
            let _ = writeln!(out, "     more: {}", v.rule.help_url);
        }
    }

    let _ = writeln!(out);
    let _ = writeln!(out, "Remediation priority guide:");
    for level in Impact::ALL {
        let _ = writeln!(out, "  {level:<9} {}", guide_line(level));
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::engine::types::{EngineInfo, RawEngineResult, TestEngine};
    use crate::report::tests::rule;
    use crate::report::{normalize, ScanPathKind};
    use assert_json_diff::assert_json_include;
    use serde_json::json;

    fn sample() -> ScanReport {
        let raw = RawEngineResult {
            violations: vec![
                rule("color-contrast", Some("serious"), 5),
                rule("image-alt", Some("critical"), 2),
                rule("region", None, 3),
            ],
            passes: vec![rule("html-has-lang", None, 1)],
            incomplete: vec![],
            inapplicable: vec![rule("video-caption", None, 0)],
            engine_info: EngineInfo {
                test_engine: Some(TestEngine {
                    name: "axe-core".into(),
                    version: "4.10.2".into(),
                }),
                ..Default::default()
            },
        };
        let mut report = normalize(&raw, "https://example.com");
        report.scan_path = Some(ScanPathKind::Server);
        report
    }

    #[test]
    fn test_round_trip_preserves_order_counts_and_timestamp() {
        let report = sample();
        let back = from_json(&to_json(&report).unwrap()).unwrap();
        assert_eq!(back, report);
        assert_eq!(back.timestamp, report.timestamp);
        let ids: Vec<_> = back.violations.iter().map(|v| v.rule.id.clone()).collect();
        assert_eq!(ids, vec!["image-alt", "color-contrast", "region"]);
    }

    #[test]
    fn test_json_shape() {
        let value = serde_json::to_value(sample()).unwrap();
        assert_json_include!(
            actual: value,
            expected: json!({
                "url": "https://example.com",
                "scanPath": "server",
                "passCount": 1,
                "inapplicableCount": 1,
                "totalIssues": 10,
                "testEngine": { "name": "axe-core", "version": "4.10.2" },
                "violations": [
                    { "id": "image-alt", "impact": "critical", "priority": 1, "instanceCount": 2, "help": "image-alt help" }
                ]
            })
        );
    }

    #[test]
    fn test_write_and_read_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("out").join(default_filename(Utc::now()));
        let report = sample();
        write_report(&report, &path).unwrap();
        assert_eq!(read_report(&path).unwrap(), report);
    }

    #[test]
    fn test_default_filename() {
        let at = DateTime::parse_from_rfc3339("2026-01-02T03:04:05.678Z")
            .unwrap()
            .with_timezone(&Utc);
        assert_eq!(default_filename(at), "accessibility-report-1767323045678.json");
    }

    #[test]
    fn test_render_text() {
        let text = render_text(&sample(), None, SortOrder::Priority);
        assert!(text.contains("Accessibility report for https://example.com"));
        assert!(text.contains("[P1 CRITICAL] image-alt help (2 instances)"));
        assert!(text.contains("[P5 UNRATED]"));
        assert!(text.contains("Remediation priority guide"));
        let first = text.find("image-alt help").unwrap();
        let second = text.find("color-contrast help").unwrap();
        assert!(first < second);
    }

    #[test]
    fn test_render_text_empty_filter() {
        let text = render_text(&sample(), Some(Impact::Minor), SortOrder::Priority);
        assert!(text.contains("No minor issues found."));
    }

    #[test]
    fn test_render_text_clean_report() {
        let report = normalize(&RawEngineResult::default(), "https://example.com");
        assert!(report.is_clean());
        let text = render_text(&report, Some(Impact::Serious), SortOrder::Priority);
        assert!(text.contains("No issues found. This page appears to meet WCAG 2.2 Level AA."));
        assert!(!text.contains("Remediation priority guide"));
    }
}
