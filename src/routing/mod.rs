//! Routing subsystem.
//!
//! # Data Flow
//! ```text
//! Inbound connection (local socket address)
//!     → RouteKey (host, port)
//!     → table.rs (exact lookup)
//!     → Return: RouteTarget or miss
//!
//! Table construction (at startup):
//!     RouteConfig[]
//!     → validate each entry (host non-empty, port 1-65535)
//!     → reject duplicates
//!     → Freeze as immutable RouteTable
//! ```
//!
//! # Design Decisions
//! - Built once at startup, never reloaded
//! - Exact (host, port) match only; no wildcards or ranges
//! - Malformed entries are fatal at startup, never per request

pub mod table;

pub use table::{RouteKey, RouteTable, RouteTableError, RouteTarget};
