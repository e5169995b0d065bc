//! Structured gateway events.
//!
//! # Responsibilities
//! - Define the anomalies the core reports (route miss, upstream error
//!   status, forwarding failure)
//! - Provide the sink trait the core emits into
//! - Provide a tracing-backed sink and an in-memory sink
//!
//! # Design Decisions
//! - The core never formats log lines; it emits events
//! - Sinks are injected as `Arc<dyn EventSink>`, no global logger
//! - Upstream identity appears only here, never in client responses

use std::sync::{Arc, Mutex};

use crate::routing::{RouteKey, RouteTarget};

/// An anomaly observed while handling a request.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum GatewayEvent {
    /// No route for the inbound identity.
    RouteMiss {
        client: String,
        local: RouteKey,
        path: String,
    },
    /// Upstream answered with status >= 400.
    UpstreamErrorStatus {
        client: String,
        upstream_url: String,
        status: u16,
    },
    /// Forwarding or relay setup failed.
    ForwardingFailed {
        client: String,
        path: String,
        upstream: RouteTarget,
        cause: String,
    },
}

impl GatewayEvent {
    /// Short, stable name for the event kind.
    pub fn kind(&self) -> &'static str {
        match self {
            GatewayEvent::RouteMiss { .. } => "route_miss",
            GatewayEvent::UpstreamErrorStatus { .. } => "upstream_error_status",
            GatewayEvent::ForwardingFailed { .. } => "forwarding_failed",
        }
    }
}

/// Receiver of gateway events.
pub trait EventSink: Send + Sync {
    fn emit(&self, event: GatewayEvent);
}

impl<T: EventSink + ?Sized> EventSink for Arc<T> {
    fn emit(&self, event: GatewayEvent) {
        (**self).emit(event)
    }
}

/// Production sink: writes events through `tracing`.
#[derive(Debug, Clone, Copy, Default)]
pub struct TracingEventSink;

impl EventSink for TracingEventSink {
    fn emit(&self, event: GatewayEvent) {
        match event {
            GatewayEvent::RouteMiss { client, local, path } => {
                tracing::warn!(
                    client = %client,
                    local = %local,
                    path = %path,
                    "No mapping found"
                );
            }
            GatewayEvent::UpstreamErrorStatus { client, upstream_url, status } => {
                tracing::warn!(
                    client = %client,
                    upstream_url = %upstream_url,
                    status,
                    "Upstream returned error status"
                );
            }
            GatewayEvent::ForwardingFailed { client, path, upstream, cause } => {
                tracing::error!(
                    client = %client,
                    path = %path,
                    upstream = %upstream,
                    cause = %cause,
                    "Error forwarding request"
                );
            }
        }
    }
}

/// Sink that keeps every event in memory.
#[derive(Debug, Clone, Default)]
pub struct MemoryEventSink {
    events: Arc<Mutex<Vec<GatewayEvent>>>,
}

impl MemoryEventSink {
    pub fn new() -> Self {
        Self::default()
    }

    /// Snapshot of the events recorded so far.
    pub fn events(&self) -> Vec<GatewayEvent> {
        self.events
            .lock()
            .map(|events| events.clone())
            .unwrap_or_default()
    }

    /// Number of recorded events of the given kind.
    pub fn count(&self, kind: &str) -> usize {
        self.events().iter().filter(|e| e.kind() == kind).count()
    }
}

impl EventSink for MemoryEventSink {
    fn emit(&self, event: GatewayEvent) {
        if let Ok(mut events) = self.events.lock() {
            events.push(event);
        }
    }
}
