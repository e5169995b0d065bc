//! Inbound request model.
//!
//! # Responsibilities
//! - Capture both socket addresses of an accepted connection
//! - Derive the local identity used for routing
//! - Package a request for the forwarder or relay
//!
//! # Design Decisions
//! - Local identity comes from the accepted socket, never from `Host`
//! - IPv4-mapped IPv6 addresses are canonicalised so dual-stack
//!   listeners match IPv4 routes
//! - The body is left unread until the forwarder consumes it

use std::net::SocketAddr;

use axum::{
    body::Body,
    extract::connect_info::Connected,
    http::{request::Parts, HeaderMap, Method, Uri},
    serve::IncomingStream,
};
use tokio::net::TcpListener;

use crate::routing::RouteKey;

/// Local and peer address of an accepted connection.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ConnectionAddrs {
    /// Address the client connected to.
    pub local: SocketAddr,
    /// Address the client connected from.
    pub peer: SocketAddr,
}

impl ConnectionAddrs {
    pub fn new(local: SocketAddr, peer: SocketAddr) -> Self {
        Self { local, peer }
    }

    /// Routing identity of the listener side of the connection.
    pub fn route_key(&self) -> RouteKey {
        RouteKey::new(self.local.ip().to_canonical().to_string(), self.local.port())
    }

    /// Identity of the caller, as reported in events.
    pub fn client_identity(&self) -> String {
        self.peer.ip().to_canonical().to_string()
    }
}

impl<'a> Connected<IncomingStream<'a, TcpListener>> for ConnectionAddrs {
    fn connect_info(stream: IncomingStream<'a, TcpListener>) -> Self {
        let peer = *stream.remote_addr();
        // An unspecified local address never matches a route.
        let local = stream
            .io()
            .local_addr()
            .unwrap_or_else(|_| SocketAddr::from(([0, 0, 0, 0], 0)));
        Self { local, peer }
    }
}

/// A request ready to be forwarded.
#[derive(Debug)]
pub struct InboundRequest {
    pub method: Method,
    pub path_and_query: String,
    pub headers: HeaderMap,
    pub body: Body,
    pub upgrade_intent: bool,
    pub client: String,
    pub local: RouteKey,
}

impl InboundRequest {
    pub fn from_parts(parts: Parts, body: Body, addrs: ConnectionAddrs, upgrade_intent: bool) -> Self {
        let path_and_query = path_and_query(&parts.uri);

        Self {
            method: parts.method,
            path_and_query,
            headers: parts.headers,
            body,
            upgrade_intent,
            client: addrs.client_identity(),
            local: addrs.route_key(),
        }
    }
}

/// Path and query of a request target, `/` if absent.
pub fn path_and_query(uri: &Uri) -> String {
    uri.path_and_query()
        .map(|pq| pq.as_str().to_string())
        .unwrap_or_else(|| "/".to_string())
}
