//! Network layer subsystem.
//!
//! # Data Flow
//! ```text
//! Upgraded client connection + upstream connection
//!     → connection.rs (session ID, live-session guard)
//!     → guard dropped when the relay ends and both sockets are closed
//! ```
//!
//! # Design Decisions
//! - Each relay session tracked for graceful shutdown
//! - Guards decrement on drop

pub mod connection;

pub use connection::{SessionGuard, SessionId, SessionTracker};
