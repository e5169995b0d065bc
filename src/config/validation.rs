//! Configuration validation.
//!
//! # Responsibilities
//! - Semantic validation (serde handles syntactic)
//! - Validate value ranges (timeouts > 0, ports valid)
//! - Detect duplicate routes
//!
//! # Design Decisions
//! - Returns all validation errors, not just first
//! - Validation is pure function: GatewayConfig → Result<(), Vec<ValidationError>>
//! - Runs before config is accepted into the system

use std::collections::HashSet;
use std::fmt;
use std::net::SocketAddr;

use crate::config::schema::GatewayConfig;
use crate::routing::{RouteTable, RouteTableError};

/// A single semantic problem found in the configuration.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ValidationError {
    NoListeners,
    InvalidBindAddress(String),
    ZeroConnectTimeout,
    ZeroBodyLimit,
    Route(RouteTableError),
}

impl fmt::Display for ValidationError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ValidationError::NoListeners => write!(f, "listener.bind_addresses must not be empty"),
            ValidationError::InvalidBindAddress(addr) => {
                write!(f, "listener bind address '{}' is not a valid socket address", addr)
            }
            ValidationError::ZeroConnectTimeout => write!(f, "timeouts.connect_secs must be > 0"),
            ValidationError::ZeroBodyLimit => write!(f, "limits.max_body_bytes must be > 0"),
            ValidationError::Route(e) => write!(f, "{}", e),
        }
    }
}

impl std::error::Error for ValidationError {}

/// Check the whole configuration, collecting every problem.
pub fn validate_config(config: &GatewayConfig) -> Result<(), Vec<ValidationError>> {
    let mut errors = Vec::new();

    if config.listener.bind_addresses.is_empty() {
        errors.push(ValidationError::NoListeners);
    }
    for addr in &config.listener.bind_addresses {
        if addr.parse::<SocketAddr>().is_err() {
            errors.push(ValidationError::InvalidBindAddress(addr.clone()));
        }
    }

    if config.timeouts.connect_secs == 0 {
        errors.push(ValidationError::ZeroConnectTimeout);
    }
    if config.limits.max_body_bytes == 0 {
        errors.push(ValidationError::ZeroBodyLimit);
    }

    let mut seen = HashSet::new();
    for (index, entry) in config.routes.iter().enumerate() {
        match RouteTable::parse_entry(index, entry) {
            Ok((key, _)) => {
                if !seen.insert(key.clone()) {
                    errors.push(ValidationError::Route(RouteTableError::Duplicate { index, key }));
                }
            }
            Err(e) => errors.push(ValidationError::Route(e)),
        }
    }

    if errors.is_empty() {
        Ok(())
    } else {
        Err(errors)
    }
}
