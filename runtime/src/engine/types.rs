//! Raw rule-engine output, shaped after axe-core's results object.

use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;

/// Everything the engine returned for one document.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RawEngineResult {
    #[serde(default)]
    pub violations: Vec<RuleResult>,
    #[serde(default)]
    pub passes: Vec<RuleResult>,
    #[serde(default)]
    pub incomplete: Vec<RuleResult>,
    #[serde(default)]
    pub inapplicable: Vec<RuleResult>,
    #[serde(flatten)]
    pub engine_info: EngineInfo,
}

/// One rule's outcome.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RuleResult {
    pub id: String,
    /// Raw impact string as reported (`critical`, `serious`, `moderate`,
    /// `minor`, or absent). Kept verbatim so exports stay lossless; use
    /// [`Impact::parse`] to interpret it.
    #[serde(default)]
    pub impact: Option<String>,
    #[serde(default)]
    pub description: String,
    /// Short help text (axe's `help`).
    #[serde(default, rename = "help")]
    pub help_text: String,
    #[serde(default)]
    pub help_url: String,
    #[serde(default)]
    pub tags: BTreeSet<String>,
    #[serde(default)]
    pub nodes: Vec<NodeResult>,
}

impl RuleResult {
    pub fn impact_level(&self) -> Option<Impact> {
        self.impact.as_deref().and_then(Impact::parse)
    }

    /// WCAG success criteria referenced by the rule's tags, e.g. `wcag111`
    /// becomes `1.1.1`.
    pub fn wcag_criteria(&self) -> Vec<String> {
        self.tags
            .iter()
            .filter_map(|t| criterion_from_tag(t))
            .collect()
    }
}

/// An affected DOM node.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct NodeResult {
    #[serde(default)]
    pub html: String,
    #[serde(default)]
    pub target: Vec<TargetSelector>,
    #[serde(default)]
    pub failure_summary: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub impact: Option<String>,
}

/// A node selector. Nodes inside shadow roots or frames are addressed by a
/// path of selectors.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum TargetSelector {
    Css(String),
    Path(Vec<String>),
}

/// Engine and environment metadata.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct EngineInfo {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub test_engine: Option<TestEngine>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub test_runner: Option<TestRunner>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub test_environment: Option<TestEnvironment>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct TestEngine {
    pub name: String,
    pub version: String,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct TestRunner {
    pub name: String,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TestEnvironment {
    #[serde(default)]
    pub user_agent: String,
    #[serde(default)]
    pub window_width: u32,
    #[serde(default)]
    pub window_height: u32,
}

/// Severity of a violation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Impact {
    Critical,
    Serious,
    Moderate,
    Minor,
}

impl Impact {
    pub const ALL: [Impact; 4] = [
        Impact::Critical,
        Impact::Serious,
        Impact::Moderate,
        Impact::Minor,
    ];

    pub fn parse(s: &str) -> Option<Self> {
        match s.trim().to_ascii_lowercase().as_str() {
            "critical" => Some(Impact::Critical),
            "serious" => Some(Impact::Serious),
            "moderate" => Some(Impact::Moderate),
            "minor" => Some(Impact::Minor),
            _ => None,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Impact::Critical => "critical",
            Impact::Serious => "serious",
            Impact::Moderate => "moderate",
            Impact::Minor => "minor",
        }
    }
}

impl std::fmt::Display for Impact {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

impl std::str::FromStr for Impact {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Impact::parse(s).ok_or_else(|| {
            format!("unknown impact level '{s}' (expected critical, serious, moderate or minor)")
        })
    }
}

/// `wcag1411` → `1.4.11`. Level tags like `wcag2aa` are not criteria.
fn criterion_from_tag(tag: &str) -> Option<String> {
    let digits = tag.strip_prefix("wcag")?;
    if digits.len() < 3 || !digits.chars().all(|c| c.is_ascii_digit()) {
        return None;
    }
    let (principle, rest) = digits.split_at(1);
    let (guideline, criterion) = rest.split_at(1);
    Some(format!("{principle}.{guideline}.{criterion}"))
}
