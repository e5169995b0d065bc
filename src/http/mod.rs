//! HTTP protocol handling subsystem.
//!
//! # Data Flow
//! ```text
//! TCP connection
//!     → server.rs (Axum setup, catch-all dispatch)
//!     → request.rs (local identity from the socket, InboundRequest)
//!     → routing::RouteTable (exact lookup)
//!     → forward.rs (unary) or websocket.rs (upgraded)
//!         both use headers.rs to sanitize each leg
//!     → response.rs (OutboundResult → client status contract)
//! ```

pub mod forward;
pub mod headers;
pub mod request;
pub mod response;
pub mod server;
pub mod websocket;

pub use forward::UnaryForwarder;
pub use request::{ConnectionAddrs, InboundRequest};
pub use response::OutboundResult;
pub use server::HttpServer;
pub use websocket::{DuplexRelay, RelaySession};
