//! Availability probe for the server-mediated path.
//!
//! Holds the cached `serverPathAvailable` flag. Refreshes are driven either by
//! a background tokio interval ([`AvailabilityProbe::spawn`]) or on demand by
//! the selector when the cached value is stale. Readers never wait on a
//! refresh.

use crate::events::{EventBus, ScanEvent};
use async_trait::async_trait;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex, RwLock};
use std::time::{Duration, Instant};
use tokio::task::JoinHandle;
use tracing::{debug, info};

/// Source of monotonic time.
pub trait Clock: Send + Sync {
    fn now(&self) -> Instant;
}

/// Wall clock.
#[derive(Debug, Default, Clone, Copy)]
pub struct SystemClock;

impl Clock for SystemClock {
    fn now(&self) -> Instant {
        Instant::now()
    }
}

/// Hand-driven clock for tests and simulations.
#[derive(Debug)]
pub struct ManualClock {
    now: Mutex<Instant>,
}

impl ManualClock {
    pub fn new() -> Self {
        Self {
            now: Mutex::new(Instant::now()),
        }
    }

    pub fn advance(&self, by: Duration) {
        let mut now = self.now.lock().unwrap_or_else(|e| e.into_inner());
        *now += by;
    }
}

impl Default for ManualClock {
    fn default() -> Self {
        Self::new()
    }
}

impl Clock for ManualClock {
    fn now(&self) -> Instant {
        *self.now.lock().unwrap_or_else(|e| e.into_inner())
    }
}

/// One liveness check against the server path.
#[async_trait]
pub trait LivenessCheck: Send + Sync {
    async fn is_alive(&self) -> bool;

    /// Where the check goes, for logs.
    fn target(&self) -> String;
}

/// Last probe outcome.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ProbeSnapshot {
    pub available: bool,
    pub checked_at: Instant,
}

/// Cached server-path availability.
pub struct AvailabilityProbe {
    check: Arc<dyn LivenessCheck>,
    clock: Arc<dyn Clock>,
    interval: Duration,
    state: RwLock<Option<ProbeSnapshot>>,
    refreshing: AtomicBool,
    events: Option<Arc<EventBus>>,
}

impl AvailabilityProbe {
    pub fn new(check: Arc<dyn LivenessCheck>, clock: Arc<dyn Clock>, interval: Duration) -> Self {
        Self {
            check,
            clock,
            interval,
            state: RwLock::new(None),
            refreshing: AtomicBool::new(false),
            events: None,
        }
    }

    /// Announce availability changes as [`ScanEvent::AvailabilityChanged`].
    pub fn with_events(mut self, events: Arc<EventBus>) -> Self {
        self.events = Some(events);
        self
    }

    /// Cached availability. `None` until the first probe completes.
    pub fn server_path_available(&self) -> Option<bool> {
        self.snapshot().map(|s| s.available)
    }

    pub fn snapshot(&self) -> Option<ProbeSnapshot> {
        *self.state.read().unwrap_or_else(|e| e.into_inner())
    }

    pub fn interval(&self) -> Duration {
        self.interval
    }

    /// True when no probe has run yet or the last one is older than the
    /// interval.
    pub fn is_due(&self) -> bool {
        match self.snapshot() {
            None => true,
            Some(s) => self.clock.now().saturating_duration_since(s.checked_at) >= self.interval,
        }
    }

    /// Run one check and replace the cached value. Concurrent calls collapse
    /// into one; the losers return the current cached value.
    pub async fn refresh(&self) -> Option<bool> {
        if self.refreshing.swap(true, Ordering::AcqRel) {
            return self.server_path_available();
        }
        let available = self.check.is_alive().await;
        let previous = {
            let mut state = self.state.write().unwrap_or_else(|e| e.into_inner());
            let previous = state.as_ref().map(|s| s.available);
            *state = Some(ProbeSnapshot {
                available,
                checked_at: self.clock.now(),
            });
            previous
        };
        self.refreshing.store(false, Ordering::Release);

        if previous != Some(available) {
            info!(
                "server path at {} is {}",
                self.check.target(),
                if available { "available" } else { "unavailable" }
            );
            if let Some(bus) = &self.events {
                bus.emit(ScanEvent::AvailabilityChanged {
                    server_path_available: available,
                });
            }
        } else {
            debug!("server path probe: available={available}");
        }
        Some(available)
    }

    /// Refresh only when stale.
    pub async fn refresh_if_due(&self) -> Option<bool> {
        if self.is_due() {
            self.refresh().await
        } else {
            self.server_path_available()
        }
    }

    /// Probe immediately, then on every interval tick until the task is
    /// aborted.
    pub fn spawn(self: &Arc<Self>) -> JoinHandle<()> {
        let probe = Arc::clone(self);
        tokio::spawn(async move {
            let mut ticker = tokio::time::interval(probe.interval);
            ticker.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Delay);
            loop {
                ticker.tick().await;
                probe.refresh().await;
            }
        })
    }
}
