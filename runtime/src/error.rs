//! Low-level failure signals raised by the render and engine layers.
//!
//! These carry structured detail (error codes, timeouts, limits) so that the
//! classifier in [`crate::classify`] never has to parse message text for
//! failures we produce ourselves.

use thiserror::Error;

/// Failure while acquiring or navigating a render context.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum RenderFailure {
    #[error("invalid URL {url:?}: {reason}")]
    InvalidUrl { url: String, reason: String },

    #[error("navigation timed out after {timeout_ms}ms")]
    NavigationTimeout { timeout_ms: u64 },

    /// Connection or DNS level failure. `code` is the Chromium net error
    /// code, e.g. `net::ERR_NAME_NOT_RESOLVED`.
    #[error("network error {code} while loading {url}")]
    Network { code: String, url: String },

    #[error("navigation failed: {0}")]
    NavigationFailed(String),

    #[error("render resource limit reached ({limit} concurrent contexts)")]
    ResourceExhausted { limit: usize },

    #[error("renderer unavailable: {0}")]
    Unavailable(String),

    /// The page hosting the local frame container could not be loaded. Says
    /// nothing about the scan target itself.
    #[error("container host {origin} unavailable: {reason}")]
    ContainerHost { origin: String, reason: String },

    /// Anything the render provider reported that has no structured signal.
    #[error("{0}")]
    Other(String),
}

/// Failure while running the rule engine against a ready context.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum EngineFailure {
    /// The document object could not be obtained at all (same-origin policy).
    #[error("document not accessible: {0}")]
    CrossOriginBlocked(String),

    #[error("engine invocation failed: {0}")]
    Invocation(String),

    #[error("engine timed out after {timeout_ms}ms")]
    Timeout { timeout_ms: u64 },

    #[error("engine returned malformed results: {0}")]
    MalformedOutput(String),
}

/// Any failure that reaches the classifier.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum RawScanError {
    #[error(transparent)]
    Render(#[from] RenderFailure),

    #[error(transparent)]
    Engine(#[from] EngineFailure),

    #[error("scan cancelled")]
    Cancelled,

    /// Free text from a collaborator that gives us nothing better.
    #[error("{0}")]
    Message(String),
}

impl RawScanError {
    /// Text used for the auxiliary `details` field of a classified error.
    pub fn details(&self) -> String {
        self.to_string()
    }
}

impl From<anyhow::Error> for RawScanError {
    fn from(e: anyhow::Error) -> Self {
        RawScanError::Message(format!("{e:#}"))
    }
}
