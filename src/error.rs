//! Request-time error taxonomy.
//!
//! Every variant is handled at the boundary where it occurs and turned into a
//! client-visible response or closure. The `Display` text may contain upstream
//! addresses and is only ever handed to the event sink.

use std::fmt;

use thiserror::Error;

use crate::routing::RouteKey;

/// Boxed error used for causes coming from different client stacks.
pub type BoxError = Box<dyn std::error::Error + Send + Sync>;

/// Direction of a duplex relay pump.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Direction {
    ClientToUpstream,
    UpstreamToClient,
}

impl fmt::Display for Direction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Direction::ClientToUpstream => f.write_str("client->upstream"),
            Direction::UpstreamToClient => f.write_str("upstream->client"),
        }
    }
}

/// Errors produced while handling a routed request.
#[derive(Debug, Error)]
pub enum ProxyError {
    /// No route for the inbound identity. A configuration gap, never retried.
    #[error("no mapping found for {0}")]
    RouteMiss(RouteKey),

    /// The client's own request body could not be read.
    #[error("failed to read inbound body: {0}")]
    InboundBody(#[source] axum::Error),

    /// Connection refused, timeout, DNS failure and similar.
    #[error("upstream transport failure: {0}")]
    UpstreamTransport(#[source] BoxError),

    /// Bad handshake or response framing from the upstream.
    #[error("upstream protocol failure: {0}")]
    UpstreamProtocol(#[source] BoxError),

    /// Mid-stream failure on one relay direction; terminal for the session.
    #[error("relay frame error ({direction}): {source}")]
    RelayFrame {
        direction: Direction,
        #[source]
        source: BoxError,
    },
}

impl ProxyError {
    pub fn transport(err: impl Into<BoxError>) -> Self {
        ProxyError::UpstreamTransport(err.into())
    }

    pub fn protocol(err: impl Into<BoxError>) -> Self {
        ProxyError::UpstreamProtocol(err.into())
    }

    pub fn frame(direction: Direction, err: impl Into<BoxError>) -> Self {
        ProxyError::RelayFrame {
            direction,
            source: err.into(),
        }
    }
}
