//! Observability subsystem.
//!
//! # Data Flow
//! ```text
//! Core (dispatcher, forwarder, relay):
//!     → events.rs (GatewayEvent emitted into an injected EventSink)
//!     → TracingEventSink → logging.rs subscriber → stdout
//! ```
//!
//! # Design Decisions
//! - Structured fields, not formatted strings
//! - Log level configurable via config and environment

pub mod events;
pub mod logging;

pub use events::{EventSink, GatewayEvent, MemoryEventSink, TracingEventSink};
