// Copyright 2026 wcagscan Contributors
// SPDX-License-Identifier: Apache-2.0

//! Scan lifecycle event bus.
//!
//! The EventBus is a `tokio::sync::broadcast` channel that carries
//! [`ScanEvent`] values. The SSE endpoint and the CLI progress display
//! subscribe independently. With no subscribers, events are dropped.

use serde::{Deserialize, Serialize};
use tokio::sync::broadcast;

/// Every event the runtime emits. Serialized to JSON for SSE.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type")]
pub enum ScanEvent {
    // ── Scan Events ───────────────────────
    /// A scan was accepted and is acquiring a render context.
    ScanStarted {
        url: String,
        path: String,
        timestamp: String,
    },
    /// Navigation settled; the engine is about to run.
    NavigationComplete {
        url: String,
        final_url: String,
        load_time_ms: u64,
    },
    /// A report was produced.
    ScanComplete {
        url: String,
        scan_id: String,
        violations: usize,
        total_issues: usize,
        elapsed_ms: u64,
    },
    /// The scan ended with a classified error.
    ScanFailed {
        url: String,
        kind: String,
        message: String,
        elapsed_ms: u64,
    },

    // ── System Events ─────────────────────
    /// The server-mediated path availability changed.
    AvailabilityChanged { server_path_available: bool },
    /// The scan server started.
    RuntimeStarted {
        version: String,
        http_port: u16,
        renderer: String,
    },
}

/// Fan-out bus for [`ScanEvent`]s.
pub struct EventBus {
    sender: broadcast::Sender<ScanEvent>,
}

impl EventBus {
    /// Create a new event bus with the given buffer capacity.
    pub fn new(capacity: usize) -> Self {
        let (sender, _) = broadcast::channel(capacity.max(1));
        Self { sender }
    }

    /// Emit an event to all subscribers. Silently ignores if no subscribers.
    pub fn emit(&self, event: ScanEvent) {
        let _ = self.sender.send(event);
    }

    /// Subscribe to receive all future events.
    pub fn subscribe(&self) -> broadcast::Receiver<ScanEvent> {
        self.sender.subscribe()
    }

    pub fn subscriber_count(&self) -> usize {
        self.sender.receiver_count()
    }
}

impl Default for EventBus {
    fn default() -> Self {
        Self::new(256)
    }
}

/// Check if an event concerns scans of `url`. System events always match.
pub fn event_matches_url(event: &ScanEvent, url: &str) -> bool {
    match event {
        ScanEvent::ScanStarted { url: u, .. }
        | ScanEvent::NavigationComplete { url: u, .. }
        | ScanEvent::ScanComplete { url: u, .. }
        | ScanEvent::ScanFailed { url: u, .. } => u == url,
        ScanEvent::AvailabilityChanged { .. } | ScanEvent::RuntimeStarted { .. } => true,
    }
}

/// RFC 3339 timestamp for the current time.
pub fn now_timestamp() -> String {
    chrono::Utc::now().to_rfc3339()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_event_serialization() {
        let event = ScanEvent::ScanStarted {
            url: "https://example.com".to_string(),
            path: "server".to_string(),
            timestamp: "2026-01-01T00:00:00+00:00".to_string(),
        };
        let json = serde_json::to_string(&event).unwrap();
        assert!(json.contains("\"type\":\"ScanStarted\""));
        assert!(json.contains("example.com"));

        let parsed: ScanEvent = serde_json::from_str(&json).unwrap();
        assert_eq!(parsed, event);
    }

    #[test]
    fn test_event_bus_emit_no_subscribers() {
        let bus = EventBus::new(16);
        bus.emit(ScanEvent::RuntimeStarted {
            version: "0.3.0".to_string(),
            http_port: 3001,
            renderer: "chromium".to_string(),
        });
        assert_eq!(bus.subscriber_count(), 0);
    }

    #[test]
    fn test_event_bus_subscribe_receive() {
        let bus = EventBus::new(16);
        let mut rx = bus.subscribe();

        bus.emit(ScanEvent::ScanFailed {
            url: "https://test.com".to_string(),
            kind: "NavigationTimeout".to_string(),
            message: "Page took too long to load".to_string(),
            elapsed_ms: 30_001,
        });

        match rx.try_recv().unwrap() {
            ScanEvent::ScanFailed { kind, .. } => assert_eq!(kind, "NavigationTimeout"),
            other => panic!("wrong event: {other:?}"),
        }
    }

    #[test]
    fn test_event_matches_url() {
        let event = ScanEvent::ScanComplete {
            url: "https://example.com".to_string(),
            scan_id: "abc".to_string(),
            violations: 2,
            total_issues: 7,
            elapsed_ms: 1200,
        };
        assert!(event_matches_url(&event, "https://example.com"));
        assert!(!event_matches_url(&event, "https://other.com"));

        let sys = ScanEvent::AvailabilityChanged {
            server_path_available: false,
        };
        assert!(event_matches_url(&sys, "anything"));
    }
}
