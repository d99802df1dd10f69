// Copyright 2026 wcagscan Contributors
// SPDX-License-Identifier: Apache-2.0

//! Error classification.
//!
//! Maps every [`RawScanError`] onto a small, stable taxonomy with a
//! user-facing message and HTTP status. Rules are evaluated in table order and
//! the first match wins. Each rule looks at structured signals first; the
//! text heuristics in [`heuristics`] only apply to failures that arrive as
//! plain text, and nothing outside this module inspects error messages.

use crate::error::{EngineFailure, RawScanError, RenderFailure};
use serde::{Deserialize, Serialize};
use std::fmt;

/// Guidance attached to cross-origin failures on the local path.
pub const SERVER_PATH_GUIDANCE: &str = "Enable the server-mediated scan path \
(start it with `wcagscan serve`, then scan with `--path server`) to scan \
cross-origin URLs without same-origin restrictions.";

/// Stable error taxonomy.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum ErrorKind {
    InvalidUrl,
    NavigationTimeout,
    Unreachable,
    NavigationFailed,
    CrossOriginBlocked,
    ResourceExhausted,
    EngineInvocationError,
    Unknown,
}

impl ErrorKind {
    /// HTTP status for this kind. `CrossOriginBlocked` only ever happens
    /// client-side, so it has none.
    pub fn http_status(self) -> Option<u16> {
        match self {
            ErrorKind::InvalidUrl => Some(400),
            ErrorKind::NavigationTimeout => Some(408),
            ErrorKind::Unreachable => Some(502),
            ErrorKind::NavigationFailed => Some(404),
            ErrorKind::CrossOriginBlocked => None,
            ErrorKind::ResourceExhausted => Some(503),
            ErrorKind::EngineInvocationError => Some(500),
            ErrorKind::Unknown => Some(500),
        }
    }

    /// Fixed message template. `Unreachable` gets its detail appended by
    /// [`classify`].
    pub fn message(self) -> &'static str {
        match self {
            ErrorKind::InvalidUrl => "Invalid URL format",
            ErrorKind::NavigationTimeout => "Page took too long to load",
            ErrorKind::Unreachable => "Cannot reach URL",
            ErrorKind::NavigationFailed => {
                "Navigation failed — URL may not exist or is unreachable"
            }
            ErrorKind::CrossOriginBlocked => {
                "Cannot access page content due to CORS restrictions"
            }
            ErrorKind::ResourceExhausted => "Too many concurrent scans",
            ErrorKind::EngineInvocationError => "Accessibility analysis failed",
            ErrorKind::Unknown => "Failed to scan URL",
        }
    }

    pub fn as_str(self) -> &'static str {
        match self {
            ErrorKind::InvalidUrl => "InvalidUrl",
            ErrorKind::NavigationTimeout => "NavigationTimeout",
            ErrorKind::Unreachable => "Unreachable",
            ErrorKind::NavigationFailed => "NavigationFailed",
            ErrorKind::CrossOriginBlocked => "CrossOriginBlocked",
            ErrorKind::ResourceExhausted => "ResourceExhausted",
            ErrorKind::EngineInvocationError => "EngineInvocationError",
            ErrorKind::Unknown => "Unknown",
        }
    }
}

impl fmt::Display for ErrorKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A classified, terminal scan failure.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ScanError {
    pub kind: ErrorKind,
    pub message: String,
    pub http_status: Option<u16>,
    pub url: String,
    /// Raw lower-level text. Auxiliary only; never replaces `message`.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub details: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub guidance: Option<String>,
}

impl ScanError {
    /// Build an error of the given kind with the kind's fixed message.
    pub fn new(kind: ErrorKind, url: &str) -> Self {
        Self {
            kind,
            message: kind.message().to_string(),
            http_status: kind.http_status(),
            url: url.to_string(),
            details: None,
            guidance: guidance_for(kind),
        }
    }

    pub fn with_details(mut self, details: impl Into<String>) -> Self {
        self.details = Some(details.into());
        self
    }

    /// Status to send over HTTP. Kinds without a status fall back to 500.
    pub fn status_or_default(&self) -> u16 {
        self.http_status.unwrap_or(500)
    }
}

impl fmt::Display for ScanError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.message)?;
        if let Some(guidance) = &self.guidance {
            write!(f, ". {guidance}")?;
        }
        Ok(())
    }
}

impl std::error::Error for ScanError {}

fn guidance_for(kind: ErrorKind) -> Option<String> {
    match kind {
        ErrorKind::CrossOriginBlocked => Some(SERVER_PATH_GUIDANCE.to_string()),
        ErrorKind::ResourceExhausted => {
            Some("Wait for running scans to finish and try again.".to_string())
        }
        _ => None,
    }
}

/// Error body sent over HTTP: `{error, kind, details, url, guidance}`.
///
/// Older servers send only `{error, details, url}`; [`ErrorBody::into_scan_error`]
/// classifies those from their text and status.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ErrorBody {
    pub error: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub kind: Option<ErrorKind>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub details: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub url: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub guidance: Option<String>,
}

impl From<&ScanError> for ErrorBody {
    fn from(err: &ScanError) -> Self {
        Self {
            error: err.message.clone(),
            kind: Some(err.kind),
            details: err.details.clone(),
            url: Some(err.url.clone()),
            guidance: err.guidance.clone(),
        }
    }
}

impl ErrorBody {
    /// Rebuild a [`ScanError`] from a body received with HTTP `status`.
    pub fn into_scan_error(self, status: u16, fallback_url: &str) -> ScanError {
        let url = self.url.unwrap_or_else(|| fallback_url.to_string());
        match self.kind {
            Some(kind) => ScanError {
                kind,
                message: self.error,
                http_status: Some(status),
                url,
                details: self.details,
                guidance: self.guidance.or_else(|| guidance_for(kind)),
            },
            None => {
                let text = self.details.clone().unwrap_or_else(|| self.error.clone());
                let mut err = classify(&RawScanError::Message(text), &url);
                if err.kind == ErrorKind::Unknown {
                    if let Some(kind) = kind_for_status(status) {
                        err = ScanError::new(kind, &url);
                        err.details = self.details;
                    }
                }
                err.http_status = Some(status);
                err
            }
        }
    }
}

/// Inverse of [`ErrorKind::http_status`] for the unambiguous statuses.
pub fn kind_for_status(status: u16) -> Option<ErrorKind> {
    match status {
        400 => Some(ErrorKind::InvalidUrl),
        404 => Some(ErrorKind::NavigationFailed),
        408 => Some(ErrorKind::NavigationTimeout),
        502 => Some(ErrorKind::Unreachable),
        503 => Some(ErrorKind::ResourceExhausted),
        _ => None,
    }
}

type Matcher = fn(&RawScanError) -> bool;

/// Ordered classification table. First match wins.
const RULES: &[(ErrorKind, Matcher)] = &[
    (ErrorKind::InvalidUrl, is_invalid_url),
    (ErrorKind::NavigationTimeout, is_navigation_timeout),
    (ErrorKind::Unreachable, is_unreachable),
    (ErrorKind::NavigationFailed, is_navigation_failed),
    (ErrorKind::CrossOriginBlocked, is_cross_origin_blocked),
    (ErrorKind::ResourceExhausted, is_resource_exhausted),
    (ErrorKind::EngineInvocationError, is_engine_failure),
];

/// Classify a raw failure for `url`. Pure; unmatched input becomes `Unknown`.
pub fn classify(raw: &RawScanError, url: &str) -> ScanError {
    let kind = RULES
        .iter()
        .find(|(_, matches)| matches(raw))
        .map(|(kind, _)| *kind)
        .unwrap_or(ErrorKind::Unknown);

    let mut err = ScanError::new(kind, url).with_details(raw.details());
    if kind == ErrorKind::Unreachable {
        err.message = format!("{}: {}", kind.message(), unreachable_detail(raw));
    }
    err
}

fn free_text(raw: &RawScanError) -> Option<&str> {
    match raw {
        RawScanError::Message(text) => Some(text),
        RawScanError::Render(RenderFailure::Other(text)) => Some(text),
        _ => None,
    }
}

fn is_invalid_url(raw: &RawScanError) -> bool {
    matches!(raw, RawScanError::Render(RenderFailure::InvalidUrl { .. }))
        || free_text(raw).is_some_and(heuristics::looks_like_invalid_url)
}

fn is_navigation_timeout(raw: &RawScanError) -> bool {
    matches!(
        raw,
        RawScanError::Render(RenderFailure::NavigationTimeout { .. })
    ) || free_text(raw).is_some_and(heuristics::looks_like_timeout)
}

fn is_unreachable(raw: &RawScanError) -> bool {
    matches!(raw, RawScanError::Render(RenderFailure::Network { .. }))
        || free_text(raw).is_some_and(|t| heuristics::net_error_code(t).is_some())
}

fn is_navigation_failed(raw: &RawScanError) -> bool {
    matches!(
        raw,
        RawScanError::Render(RenderFailure::NavigationFailed(_))
    ) || free_text(raw).is_some_and(heuristics::looks_like_navigation_failure)
}

fn is_cross_origin_blocked(raw: &RawScanError) -> bool {
    matches!(
        raw,
        RawScanError::Engine(EngineFailure::CrossOriginBlocked(_))
    )
}

fn is_resource_exhausted(raw: &RawScanError) -> bool {
    matches!(
        raw,
        RawScanError::Render(RenderFailure::ResourceExhausted { .. })
    )
}

fn is_engine_failure(raw: &RawScanError) -> bool {
    matches!(
        raw,
        RawScanError::Engine(
            EngineFailure::Invocation(_)
                | EngineFailure::Timeout { .. }
                | EngineFailure::MalformedOutput(_)
        )
    )
}

fn unreachable_detail(raw: &RawScanError) -> String {
    match raw {
        RawScanError::Render(RenderFailure::Network { code, .. }) => code.clone(),
        other => {
            let text = other.details();
            heuristics::net_error_code(&text)
                .map(str::to_string)
                .unwrap_or(text)
        }
    }
}

/// Text heuristics for failures that only come with a message, e.g. an error
/// body from a remote scan server or a CDP error string.
pub mod heuristics {
    use regex::Regex;
    use std::sync::OnceLock;

    static NET_ERROR: OnceLock<Regex> = OnceLock::new();

    fn net_error_regex() -> &'static Regex {
        NET_ERROR.get_or_init(|| {
            Regex::new(r"net::ERR_[A-Z0-9_]+").unwrap_or_else(|e| panic!("bad net error regex: {e}"))
        })
    }

    /// Extract a Chromium `net::ERR_*` code.
    pub fn net_error_code(text: &str) -> Option<&str> {
        net_error_regex().find(text).map(|m| m.as_str())
    }

    pub fn looks_like_timeout(text: &str) -> bool {
        let lower = text.to_ascii_lowercase();
        text.contains("TimeoutError") || lower.contains("timed out") || lower.contains("timeout")
    }

    pub fn looks_like_navigation_failure(text: &str) -> bool {
        text.contains("Navigation failed") || text.contains("navigation failed")
    }

    pub fn looks_like_invalid_url(text: &str) -> bool {
        text.starts_with("Invalid URL") || text.starts_with("invalid URL")
    }
}
