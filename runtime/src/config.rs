// Copyright 2026 wcagscan Contributors
// SPDX-License-Identifier: Apache-2.0

//! Runtime configuration.
//!
//! Defaults are tuned for the two scan paths; every knob can be overridden
//! with a `WCAGSCAN_*` environment variable and, for the common ones, a CLI
//! flag on top of that.

use std::path::PathBuf;
use std::time::Duration;
use tracing::warn;

/// Default port for `wcagscan serve`.
pub const DEFAULT_PORT: u16 = 3001;

/// Default axe-core download location used by `wcagscan install`.
pub const DEFAULT_AXE_URL: &str = "https://cdn.jsdelivr.net/npm/axe-core@4.10.2/axe.min.js";

/// Fixed layout viewport. Contrast and overlap rules depend on layout, so
/// every context uses the same size.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Viewport {
    pub width: u32,
    pub height: u32,
}

impl Default for Viewport {
    fn default() -> Self {
        Self {
            width: 1024,
            height: 768,
        }
    }
}

/// Timing budget for one scan path.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PathProfile {
    /// Upper bound on navigation (including network-idle wait).
    pub navigation_timeout: Duration,
    /// Fixed settle time after navigation so deferred DOM mutations land.
    /// A heuristic: long-hydrating SPAs may still be scanned early.
    pub grace: Duration,
}

impl PathProfile {
    /// Server-mediated path: out-of-process Chromium.
    pub fn server() -> Self {
        Self {
            navigation_timeout: Duration::from_secs(30),
            grace: Duration::from_millis(1500),
        }
    }

    /// Local path: frame container, bounded by the user-facing budget.
    pub fn local() -> Self {
        Self {
            navigation_timeout: Duration::from_secs(15),
            grace: Duration::from_millis(1000),
        }
    }
}

/// Full runtime configuration.
#[derive(Debug, Clone)]
pub struct ScanConfig {
    pub server_profile: PathProfile,
    pub local_profile: PathProfile,
    pub engine_timeout: Duration,
    /// Maximum simultaneous render contexts per renderer.
    pub max_concurrent: usize,
    pub viewport: Viewport,
    pub probe_interval: Duration,
    /// Base URL of the server-mediated path, as seen by the selector.
    pub server_url: String,
    /// Origin the local frame container is hosted on.
    pub local_origin: String,
    pub port: u16,
    pub chromium_path: Option<PathBuf>,
    pub axe_path: Option<PathBuf>,
    pub axe_url: String,
}

impl Default for ScanConfig {
    fn default() -> Self {
        Self {
            server_profile: PathProfile::server(),
            local_profile: PathProfile::local(),
            engine_timeout: Duration::from_secs(60),
            max_concurrent: 4,
            viewport: Viewport::default(),
            probe_interval: Duration::from_secs(30),
            server_url: format!("http://localhost:{DEFAULT_PORT}"),
            local_origin: "http://localhost:3000".to_string(),
            port: DEFAULT_PORT,
            chromium_path: None,
            axe_path: None,
            axe_url: DEFAULT_AXE_URL.to_string(),
        }
    }
}

impl ScanConfig {
    /// Defaults overridden by the process environment.
    pub fn from_env() -> Self {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Defaults overridden by an arbitrary key lookup.
    pub fn from_lookup<F>(lookup: F) -> Self
    where
        F: Fn(&str) -> Option<String>,
    {
        let mut cfg = Self::default();

        if let Some(ms) = parse_u64(&lookup, "WCAGSCAN_NAV_TIMEOUT_MS") {
            cfg.server_profile.navigation_timeout = Duration::from_millis(ms);
        }
        if let Some(ms) = parse_u64(&lookup, "WCAGSCAN_LOCAL_NAV_TIMEOUT_MS") {
            cfg.local_profile.navigation_timeout = Duration::from_millis(ms);
        }
        if let Some(ms) = parse_u64(&lookup, "WCAGSCAN_GRACE_MS") {
            cfg.server_profile.grace = Duration::from_millis(ms);
        }
        if let Some(ms) = parse_u64(&lookup, "WCAGSCAN_LOCAL_GRACE_MS") {
            cfg.local_profile.grace = Duration::from_millis(ms);
        }
        if let Some(ms) = parse_u64(&lookup, "WCAGSCAN_ENGINE_TIMEOUT_MS") {
            cfg.engine_timeout = Duration::from_millis(ms);
        }
        if let Some(n) = parse_u64(&lookup, "WCAGSCAN_MAX_CONCURRENT") {
            if n == 0 {
                warn!("WCAGSCAN_MAX_CONCURRENT must be at least 1, keeping {}", cfg.max_concurrent);
            } else {
                cfg.max_concurrent = n as usize;
            }
        }
        if let Some(secs) = parse_u64(&lookup, "WCAGSCAN_PROBE_INTERVAL_SECS") {
            cfg.probe_interval = Duration::from_secs(secs.max(1));
        }
        if let Some(port) = parse_u64(&lookup, "WCAGSCAN_PORT") {
            match u16::try_from(port) {
                Ok(p) => cfg.port = p,
                Err(_) => warn!("WCAGSCAN_PORT out of range: {port}"),
            }
        }
        if let Some(v) = non_empty(&lookup, "WCAGSCAN_SERVER_URL") {
            cfg.server_url = v.trim_end_matches('/').to_string();
        }
        if let Some(v) = non_empty(&lookup, "WCAGSCAN_LOCAL_ORIGIN") {
            cfg.local_origin = v.trim_end_matches('/').to_string();
        }
        if let Some(v) = non_empty(&lookup, "WCAGSCAN_CHROMIUM_PATH") {
            cfg.chromium_path = Some(PathBuf::from(v));
        }
        if let Some(v) = non_empty(&lookup, "WCAGSCAN_AXE_PATH") {
            cfg.axe_path = Some(PathBuf::from(v));
        }
        if let Some(v) = non_empty(&lookup, "WCAGSCAN_AXE_URL") {
            cfg.axe_url = v;
        }

        cfg
    }

    /// Data directory (`~/.wcagscan`).
    pub fn data_dir() -> PathBuf {
        dirs::home_dir()
            .unwrap_or_else(|| PathBuf::from("/tmp"))
            .join(".wcagscan")
    }

    /// Where `wcagscan install` stores axe-core.
    pub fn axe_cache_path() -> PathBuf {
        Self::data_dir().join("axe.min.js")
    }
}

fn non_empty<F>(lookup: &F, key: &str) -> Option<String>
where
    F: Fn(&str) -> Option<String>,
{
    lookup(key)
        .map(|v| v.trim().to_string())
        .filter(|v| !v.is_empty())
}

fn parse_u64<F>(lookup: &F, key: &str) -> Option<u64>
where
    F: Fn(&str) -> Option<String>,
{
    let raw = non_empty(lookup, key)?;
    match raw.parse::<u64>() {
        Ok(v) => Some(v),
        Err(_) => {
            warn!("ignoring {key}={raw:?}: not an unsigned integer");
            None
        }
    }
}
