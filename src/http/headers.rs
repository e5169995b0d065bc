//! Header sanitization for both relay legs.
//!
//! # Responsibilities
//! - Strip hop-by-hop headers (including those named by `Connection`)
//! - Strip `Host` from outbound requests
//! - Strip `Transfer-Encoding` from upstream responses
//! - Rewrite `Origin` on upstream upgrade handshakes
//! - Detect upgrade intent
//!
//! # Design Decisions
//! - Pure functions: never log, never fail
//! - Unknown or malformed headers pass through untouched
//! - Filtering is idempotent

use axum::http::header::{self, HeaderMap, HeaderName, HeaderValue};

use crate::routing::RouteTarget;

/// Headers that only describe one transport leg.
const HOP_BY_HOP: &[&str] = &[
    "connection",
    "keep-alive",
    "proxy-connection",
    "te",
    "trailer",
    "transfer-encoding",
    "upgrade",
];

/// Headers owned by the WebSocket handshake of each leg.
const HANDSHAKE_OWNED: &[&str] = &[
    "sec-websocket-key",
    "sec-websocket-version",
    "sec-websocket-extensions",
    "sec-websocket-accept",
];

/// Sanitize client request headers before forwarding upstream.
pub fn filter_request_headers(headers: &HeaderMap) -> HeaderMap {
    let mut out = strip_hop_by_hop(headers);
    out.remove(header::HOST);
    out
}

/// Sanitize upstream response headers before returning them to the client.
pub fn filter_response_headers(headers: &HeaderMap) -> HeaderMap {
    strip_hop_by_hop(headers)
}

/// Build the extra headers for the upstream upgrade handshake.
///
/// The client's `Sec-WebSocket-Protocol` list is kept as-is; `Origin` is
/// replaced with the upstream target's own origin.
pub fn filter_upgrade_headers(headers: &HeaderMap, target: &RouteTarget) -> HeaderMap {
    let mut out = strip_hop_by_hop(headers);
    out.remove(header::HOST);
    out.remove(header::ORIGIN);
    for name in HANDSHAKE_OWNED {
        out.remove(*name);
    }
    if let Ok(origin) = HeaderValue::from_str(&target.origin()) {
        out.insert(header::ORIGIN, origin);
    }
    out
}

/// Sub-protocols requested by the client, in order.
pub fn requested_protocols(headers: &HeaderMap) -> Vec<String> {
    headers
        .get_all(header::SEC_WEBSOCKET_PROTOCOL)
        .iter()
        .filter_map(|v| v.to_str().ok())
        .flat_map(|v| v.split(','))
        .map(str::trim)
        .filter(|p| !p.is_empty())
        .map(str::to_string)
        .collect()
}

/// True if the request asks to switch to a WebSocket stream.
pub fn is_upgrade_request(headers: &HeaderMap) -> bool {
    let connection_upgrade = headers
        .get_all(header::CONNECTION)
        .iter()
        .filter_map(|v| v.to_str().ok())
        .flat_map(|v| v.split(','))
        .any(|token| token.trim().eq_ignore_ascii_case("upgrade"));

    let upgrade_websocket = headers
        .get_all(header::UPGRADE)
        .iter()
        .filter_map(|v| v.to_str().ok())
        .flat_map(|v| v.split(','))
        .any(|token| token.trim().eq_ignore_ascii_case("websocket"));

    connection_upgrade && upgrade_websocket
}

fn strip_hop_by_hop(headers: &HeaderMap) -> HeaderMap {
    let mut out = headers.clone();

    // Headers listed in `Connection` are hop-by-hop for this leg too.
    let named: Vec<HeaderName> = headers
        .get_all(header::CONNECTION)
        .iter()
        .filter_map(|v| v.to_str().ok())
        .flat_map(|v| v.split(','))
        .filter_map(|token| HeaderName::from_bytes(token.trim().as_bytes()).ok())
        .collect();
    for name in named {
        out.remove(name);
    }

    for name in HOP_BY_HOP {
        out.remove(*name);
    }
    out
}
