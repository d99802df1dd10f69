// Copyright 2026 wcagscan Contributors
// SPDX-License-Identifier: Apache-2.0

//! Report normalization and prioritization.
//!
//! Turns raw engine output into the canonical [`ScanReport`]: every
//! violation gets an integer priority from its impact and an instance count
//! from its nodes, and the list is put in a fully deterministic order.

pub mod export;

use crate::engine::types::{EngineInfo, Impact, RawEngineResult, RuleResult};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::cmp::Ordering;

/// Priority for violations with a missing or unrecognized impact.
pub const UNRATED_PRIORITY: u8 = 5;

/// Priority for an impact level. Lower is more urgent.
pub fn priority_for(impact: Option<Impact>) -> u8 {
    match impact {
        Some(Impact::Critical) => 1,
        Some(Impact::Serious) => 2,
        Some(Impact::Moderate) => 3,
        Some(Impact::Minor) => 4,
        None => UNRATED_PRIORITY,
    }
}

/// Which path produced a report.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ScanPathKind {
    /// Out-of-process Chromium, no origin restriction.
    Server,
    /// Same-origin frame container.
    Local,
}

impl std::fmt::Display for ScanPathKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ScanPathKind::Server => write!(f, "server"),
            ScanPathKind::Local => write!(f, "local"),
        }
    }
}

/// A rule failure with its computed priority and instance count.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Violation {
    #[serde(flatten)]
    pub rule: RuleResult,
    pub priority: u8,
    /// Always `rule.nodes.len()`.
    pub instance_count: usize,
}

impl Violation {
    pub fn from_rule(rule: RuleResult) -> Self {
        let priority = priority_for(rule.impact_level());
        let instance_count = rule.nodes.len();
        Self {
            rule,
            priority,
            instance_count,
        }
    }

    pub fn impact(&self) -> Option<Impact> {
        self.rule.impact_level()
    }
}

/// Canonical ordering: priority ascending, then instance count descending,
/// then rule id so the result never depends on engine output order.
pub fn compare_violations(a: &Violation, b: &Violation) -> Ordering {
    a.priority
        .cmp(&b.priority)
        .then_with(|| b.instance_count.cmp(&a.instance_count))
        .then_with(|| a.rule.id.cmp(&b.rule.id))
}

/// Affected-element counts per impact level.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ImpactSummary {
    pub critical: usize,
    pub serious: usize,
    pub moderate: usize,
    pub minor: usize,
    /// Instances of violations without a recognized impact.
    pub unrated: usize,
}

impl ImpactSummary {
    fn from_violations(violations: &[Violation]) -> Self {
        let mut summary = Self::default();
        for v in violations {
            let slot = match v.impact() {
                Some(Impact::Critical) => &mut summary.critical,
                Some(Impact::Serious) => &mut summary.serious,
                Some(Impact::Moderate) => &mut summary.moderate,
                Some(Impact::Minor) => &mut summary.minor,
                None => &mut summary.unrated,
            };
            *slot += v.instance_count;
        }
        summary
    }

    pub fn get(&self, impact: Impact) -> usize {
        match impact {
            Impact::Critical => self.critical,
            Impact::Serious => self.serious,
            Impact::Moderate => self.moderate,
            Impact::Minor => self.minor,
        }
    }
}

/// The finished, prioritized result of one scan.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ScanReport {
    pub scan_id: String,
    pub url: String,
    /// When analysis completed.
    pub timestamp: DateTime<Utc>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub scan_path: Option<ScanPathKind>,
    pub violations: Vec<Violation>,
    pub pass_count: usize,
    pub incomplete_count: usize,
    pub inapplicable_count: usize,
    /// Sum of instance counts over all violations.
    pub total_issues: usize,
    pub impact_summary: ImpactSummary,
    pub engine_info: EngineInfo,
}

/// Order in which a [`ScanReport::view`] lists violations.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum SortOrder {
    /// The report's canonical order.
    #[default]
    Priority,
    /// Most affected elements first, regardless of impact.
    Instances,
}

impl std::str::FromStr for SortOrder {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "priority" => Ok(SortOrder::Priority),
            "instances" => Ok(SortOrder::Instances),
            other => Err(format!("unknown sort order '{other}' (expected priority or instances)")),
        }
    }
}

impl ScanReport {
    /// A filtered, re-sorted listing. Never changes the report itself.
    pub fn view(&self, impact: Option<Impact>, order: SortOrder) -> Vec<&Violation> {
        let mut out: Vec<&Violation> = self
            .violations
            .iter()
            .filter(|v| impact.is_none() || v.impact() == impact)
            .collect();
        if order == SortOrder::Instances {
            // Stable: equal counts keep priority order.
            out.sort_by(|a, b| b.instance_count.cmp(&a.instance_count));
        }
        out
    }

    /// True when no violations were found.
    pub fn is_clean(&self) -> bool {
        self.violations.is_empty()
    }

    /// Re-derive priority, instance count, order and totals from the rule
    /// results themselves. Reports decoded from elsewhere go through this.
    pub fn reprioritize(&mut self) {
        let violations = std::mem::take(&mut self.violations);
        self.violations = violations
            .into_iter()
            .map(|v| Violation::from_rule(v.rule))
            .collect();
        self.violations.sort_by(compare_violations);
        self.total_issues = self.violations.iter().map(|v| v.instance_count).sum();
        self.impact_summary = ImpactSummary::from_violations(&self.violations);
    }
}

/// Normalize engine output for `url`, stamped with the current time.
pub fn normalize(raw: &RawEngineResult, url: &str) -> ScanReport {
    normalize_at(raw, url, Utc::now())
}

/// Normalize with an explicit completion timestamp.
pub fn normalize_at(raw: &RawEngineResult, url: &str, timestamp: DateTime<Utc>) -> ScanReport {
    let mut report = ScanReport {
        scan_id: uuid::Uuid::new_v4().to_string(),
        url: url.to_string(),
        timestamp,
        scan_path: None,
        violations: raw
            .violations
            .iter()
            .cloned()
            .map(Violation::from_rule)
            .collect(),
        pass_count: raw.passes.len(),
        incomplete_count: raw.incomplete.len(),
        inapplicable_count: raw.inapplicable.len(),
        total_issues: 0,
        impact_summary: ImpactSummary::default(),
        engine_info: raw.engine_info.clone(),
    };
    report.reprioritize();
    report
}

#[cfg(test)]
pub(crate) mod tests {
    use super::*;
    use crate::engine::types::NodeResult;

    pub(crate) fn rule(id: &str, impact: Option<&str>, nodes: usize) -> RuleResult {
        RuleResult {
            id: id.to_string(),
            impact: impact.map(String::from),
            description: format!("{id} description"),
            help_text: format!("{id} help"),
            help_url: format!("https://dequeuniversity.com/rules/axe/4.10/{id}"),
            tags: ["wcag2a".to_string()].into_iter().collect(),
            nodes: (0..nodes)
                .map(|i| NodeResult {
                    html: format!("<div id=\"n{i}\"></div>"),
                    target: vec![crate::engine::types::TargetSelector::Css(format!("#n{i}"))],
                    failure_summary: Some("Fix this".to_string()),
                    impact: impact.map(String::from),
                })
                .collect(),
        }
    }

    fn raw_with(violations: Vec<RuleResult>) -> RawEngineResult {
        RawEngineResult {
            violations,
            passes: vec![rule("html-has-lang", None, 1), rule("document-title", None, 1)],
            incomplete: vec![rule("color-contrast", Some("serious"), 2)],
            inapplicable: vec![],
            engine_info: EngineInfo::default(),
        }
    }

    fn ids(report: &ScanReport) -> Vec<&str> {
        report.violations.iter().map(|v| v.rule.id.as_str()).collect()
    }

    #[test]
    fn test_priority_mapping() {
        assert_eq!(priority_for(Some(Impact::Critical)), 1);
        assert_eq!(priority_for(Some(Impact::Serious)), 2);
        assert_eq!(priority_for(Some(Impact::Moderate)), 3);
        assert_eq!(priority_for(Some(Impact::Minor)), 4);
        assert_eq!(priority_for(None), 5);
    }

    #[test]
    fn test_critical_before_serious() {
        let raw = raw_with(vec![
            rule("color-contrast", Some("serious"), 5),
            rule("image-alt", Some("critical"), 2),
        ]);
        let report = normalize(&raw, "https://example.com");
        assert_eq!(ids(&report), vec!["image-alt", "color-contrast"]);
        assert_eq!(report.violations[0].priority, 1);
        assert_eq!(report.violations[1].priority, 2);
    }

    #[test]
    fn test_instance_count_breaks_ties() {
        let raw = raw_with(vec![
            rule("region", Some("moderate"), 3),
            rule("landmark-one-main", Some("moderate"), 7),
        ]);
        let report = normalize(&raw, "https://example.com");
        assert_eq!(ids(&report), vec!["landmark-one-main", "region"]);
    }

    #[test]
    fn test_unknown_and_missing_impact_sort_last() {
        let raw = raw_with(vec![
            rule("odd", Some("blocker"), 9),
            rule("none", None, 1),
            rule("tiny", Some("minor"), 1),
        ]);
        let report = normalize(&raw, "https://example.com");
        assert_eq!(ids(&report), vec!["tiny", "odd", "none"]);
        assert_eq!(report.violations[1].priority, UNRATED_PRIORITY);
        assert_eq!(report.impact_summary.unrated, 10);
    }

    #[test]
    fn test_order_independent_of_engine_order() {
        let a = vec![
            rule("b-rule", Some("serious"), 2),
            rule("a-rule", Some("serious"), 2),
            rule("c-rule", Some("critical"), 1),
        ];
        let mut b = a.clone();
        b.reverse();
        let ra = normalize(&raw_with(a), "https://example.com");
        let rb = normalize(&raw_with(b), "https://example.com");
        assert_eq!(ids(&ra), ids(&rb));
        assert_eq!(ids(&ra), vec!["c-rule", "a-rule", "b-rule"]);
    }

    #[test]
    fn test_adjacent_pairs_are_ordered() {
        let impacts = [Some("minor"), Some("critical"), None, Some("serious"), Some("moderate")];
        let rules: Vec<RuleResult> = (0..25)
            .map(|i| rule(&format!("r{i:02}"), impacts[i % 5], (i * 7) % 11))
            .collect();
        let report = normalize(&raw_with(rules), "https://example.com");
        for pair in report.violations.windows(2) {
            let (a, b) = (&pair[0], &pair[1]);
            assert!(a.priority <= b.priority);
            if a.priority == b.priority {
                assert!(a.instance_count >= b.instance_count);
            }
        }
        for v in &report.violations {
            assert_eq!(v.instance_count, v.rule.nodes.len());
        }
    }

    #[test]
    fn test_renormalizing_is_stable() {
        let raw = raw_with(vec![
            rule("a", Some("moderate"), 3),
            rule("b", Some("moderate"), 3),
            rule("c", None, 4),
            rule("d", Some("critical"), 1),
        ]);
        let ts = Utc::now();
        let first = normalize_at(&raw, "https://example.com", ts);
        let second = normalize_at(&raw, "https://example.com", ts);
        assert_eq!(
            serde_json::to_string(&first.violations).unwrap(),
            serde_json::to_string(&second.violations).unwrap()
        );
    }

    #[test]
    fn test_counts_other_categories_without_touching_them() {
        let raw = raw_with(vec![rule("image-alt", Some("critical"), 2)]);
        let report = normalize(&raw, "https://example.com");
        assert_eq!(report.pass_count, 2);
        assert_eq!(report.incomplete_count, 1);
        assert_eq!(report.inapplicable_count, 0);
        assert_eq!(raw.passes[0].id, "html-has-lang");
    }

    #[test]
    fn test_summary_and_total_issues() {
        let raw = raw_with(vec![
            rule("image-alt", Some("critical"), 2),
            rule("color-contrast", Some("serious"), 5),
            rule("label", Some("critical"), 1),
        ]);
        let report = normalize(&raw, "https://example.com");
        assert_eq!(report.total_issues, 8);
        assert_eq!(report.impact_summary.critical, 3);
        assert_eq!(report.impact_summary.serious, 5);
        assert_eq!(report.impact_summary.get(Impact::Moderate), 0);
    }

    #[test]
    fn test_views_filter_and_resort() {
        let raw = raw_with(vec![
            rule("image-alt", Some("critical"), 2),
            rule("color-contrast", Some("serious"), 5),
            rule("label", Some("critical"), 1),
        ]);
        let report = normalize(&raw, "https://example.com");

        let critical: Vec<&str> = report
            .view(Some(Impact::Critical), SortOrder::Priority)
            .iter()
            .map(|v| v.rule.id.as_str())
            .collect();
        assert_eq!(critical, vec!["image-alt", "label"]);

        let by_instances: Vec<&str> = report
            .view(None, SortOrder::Instances)
            .iter()
            .map(|v| v.rule.id.as_str())
            .collect();
        assert_eq!(by_instances, vec!["color-contrast", "image-alt", "label"]);

        // Report itself keeps canonical order.
        assert_eq!(ids(&report), vec!["image-alt", "label", "color-contrast"]);
    }

    #[test]
    fn test_sort_order_parse() {
        assert_eq!("Instances".parse::<SortOrder>().unwrap(), SortOrder::Instances);
        assert!("alphabetical".parse::<SortOrder>().is_err());
    }
}
