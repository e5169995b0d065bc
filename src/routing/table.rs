//! Static route table.
//!
//! # Responsibilities
//! - Hold the local (host, port) → upstream (host, port) mapping
//! - Resolve inbound identities with exact matching
//! - Reject malformed entries at construction time
//!
//! # Design Decisions
//! - Immutable after construction (shared via `Arc`, no locks)
//! - O(1) lookup via HashMap
//! - Local hosts must be IP literals: the inbound identity is the socket's
//!   own address, so a hostname could never match
//! - Local addresses are canonicalised (IPv4-mapped IPv6 becomes IPv4)
//! - Explicit `None` on miss rather than a silent default

use std::collections::HashMap;
use std::fmt;
use std::net::IpAddr;

use thiserror::Error;

use crate::config::RouteConfig;

/// Errors raised while building the route table.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum RouteTableError {
    /// Local or remote host is empty.
    #[error("route #{index}: {side} host must not be empty")]
    EmptyHost { index: usize, side: &'static str },

    /// Local host is not an IP address.
    #[error("route #{index}: local host '{host}' is not an IP address")]
    InvalidLocalAddress { index: usize, host: String },

    /// Port outside of 1..=65535.
    #[error("route #{index}: {side} port {port} is out of range (1-65535)")]
    PortOutOfRange {
        index: usize,
        side: &'static str,
        port: i64,
    },

    /// Two entries share the same local identity.
    #[error("route #{index}: duplicate mapping for {key}")]
    Duplicate { index: usize, key: RouteKey },
}

/// Local identity of an inbound virtual service.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct RouteKey {
    host: String,
    port: u16,
}

impl RouteKey {
    pub fn new(host: impl AsRef<str>, port: u16) -> Self {
        Self {
            host: host.as_ref().trim().to_ascii_lowercase(),
            port,
        }
    }

    pub fn host(&self) -> &str {
        &self.host
    }

    pub fn port(&self) -> u16 {
        self.port
    }
}

impl fmt::Display for RouteKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", authority(&self.host, self.port))
    }
}

/// Upstream destination for a [`RouteKey`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RouteTarget {
    host: String,
    port: u16,
}

impl RouteTarget {
    pub fn new(host: impl AsRef<str>, port: u16) -> Self {
        Self {
            host: host.as_ref().trim().to_string(),
            port,
        }
    }

    pub fn host(&self) -> &str {
        &self.host
    }

    pub fn port(&self) -> u16 {
        self.port
    }

    /// `host:port`, with IPv6 literals bracketed.
    pub fn authority(&self) -> String {
        authority(&self.host, self.port)
    }

    /// Upstream URL for a unary request.
    pub fn http_url(&self, path_and_query: &str) -> String {
        format!("http://{}{}", self.authority(), path_and_query)
    }

    /// Upstream URL for an upgraded connection.
    pub fn ws_url(&self, path_and_query: &str) -> String {
        format!("ws://{}{}", self.authority(), path_and_query)
    }

    /// Value sent as `Origin` on upstream upgrade handshakes.
    pub fn origin(&self) -> String {
        format!("http://{}", self.authority())
    }
}

impl fmt::Display for RouteTarget {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.authority())
    }
}

fn authority(host: &str, port: u16) -> String {
    if host.contains(':') && !host.starts_with('[') {
        format!("[{}]:{}", host, port)
    } else {
        format!("{}:{}", host, port)
    }
}

/// Immutable routing table.
#[derive(Debug, Clone, Default)]
pub struct RouteTable {
    routes: HashMap<RouteKey, RouteTarget>,
}

impl RouteTable {
    /// Build the table from configured entries, failing on the first bad one.
    pub fn from_config(entries: &[RouteConfig]) -> Result<Self, RouteTableError> {
        let mut routes = HashMap::with_capacity(entries.len());

        for (index, entry) in entries.iter().enumerate() {
            let (key, target) = Self::parse_entry(index, entry)?;
            if routes.contains_key(&key) {
                return Err(RouteTableError::Duplicate { index, key });
            }
            routes.insert(key, target);
        }

        Ok(Self { routes })
    }

    /// Validate a single configured entry.
    pub fn parse_entry(
        index: usize,
        entry: &RouteConfig,
    ) -> Result<(RouteKey, RouteTarget), RouteTableError> {
        let local_port = checked_port(index, "local", entry.local_port)?;
        let remote_port = checked_port(index, "remote", entry.remote_port)?;

        if entry.local_host.trim().is_empty() {
            return Err(RouteTableError::EmptyHost { index, side: "local" });
        }
        if entry.remote_host.trim().is_empty() {
            return Err(RouteTableError::EmptyHost { index, side: "remote" });
        }

        let local_ip = parse_local_ip(&entry.local_host).ok_or_else(|| RouteTableError::InvalidLocalAddress {
            index,
            host: entry.local_host.trim().to_string(),
        })?;

        Ok((
            RouteKey::new(local_ip.to_string(), local_port),
            RouteTarget::new(&entry.remote_host, remote_port),
        ))
    }

    /// Exact-match lookup.
    pub fn resolve(&self, local_host: &str, local_port: u16) -> Option<&RouteTarget> {
        self.routes.get(&RouteKey::new(local_host, local_port))
    }

    pub fn resolve_key(&self, key: &RouteKey) -> Option<&RouteTarget> {
        self.routes.get(key)
    }

    pub fn len(&self) -> usize {
        self.routes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.routes.is_empty()
    }
}

fn parse_local_ip(host: &str) -> Option<IpAddr> {
    let host = host.trim();
    let host = host
        .strip_prefix('[')
        .and_then(|h| h.strip_suffix(']'))
        .unwrap_or(host);
    host.parse::<IpAddr>().ok().map(|ip| ip.to_canonical())
}

fn checked_port(index: usize, side: &'static str, port: i64) -> Result<u16, RouteTableError> {
    match u16::try_from(port) {
        Ok(p) if p != 0 => Ok(p),
        _ => Err(RouteTableError::PortOutOfRange { index, side, port }),
    }
}
