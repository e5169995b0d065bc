//! Client-facing response mapping.
//!
//! # Responsibilities
//! - Represent the outcome of one unary forward
//! - Map each outcome to the client-visible status contract
//!
//! # Design Decisions
//! - Route misses and failures get fixed, generic bodies
//! - Upstream statuses (including 4xx/5xx) pass through unchanged
//! - Internal causes never reach the client

use axum::{
    body::{Body, Bytes},
    http::{HeaderMap, StatusCode},
    response::{IntoResponse, Response},
};

use crate::error::ProxyError;

/// Body returned when no route matches.
pub const ROUTE_MISS_BODY: &str = "No mapping found for this IP and port";

/// Body returned when forwarding fails.
pub const FORWARDING_FAILED_BODY: &str = "Error forwarding request";

/// Result of handling one non-upgrade request.
#[derive(Debug)]
pub enum OutboundResult {
    /// Upstream answered; status, filtered headers and full body.
    Forwarded {
        status: StatusCode,
        headers: HeaderMap,
        body: Bytes,
    },
    /// No route for the inbound identity.
    RouteMiss,
    /// The single forwarding attempt failed.
    ForwardingFailed(ProxyError),
}

impl IntoResponse for OutboundResult {
    fn into_response(self) -> Response {
        match self {
            OutboundResult::Forwarded { status, headers, body } => {
                let mut response = Response::new(Body::from(body));
                *response.status_mut() = status;
                *response.headers_mut() = headers;
                response
            }
            OutboundResult::RouteMiss => (StatusCode::NOT_FOUND, ROUTE_MISS_BODY).into_response(),
            OutboundResult::ForwardingFailed(_) => {
                (StatusCode::BAD_GATEWAY, FORWARDING_FAILED_BODY).into_response()
            }
        }
    }
}
