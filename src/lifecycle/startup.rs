//! Startup orchestration.
//!
//! # Responsibilities
//! - Bind every configured listener before traffic is accepted
//!
//! # Design Decisions
//! - Fail fast: any bind error is fatal
//! - Listeners are bound after the route table is built, so a bad
//!   table never opens a port

use std::net::SocketAddr;

use tokio::net::TcpListener;

use crate::config::ListenerConfig;

/// Bind all configured addresses, stopping at the first failure.
pub async fn bind_listeners(config: &ListenerConfig) -> Result<Vec<TcpListener>, std::io::Error> {
    let mut listeners = Vec::with_capacity(config.bind_addresses.len());

    for address in &config.bind_addresses {
        let addr: SocketAddr = address
            .parse()
            .map_err(|e| std::io::Error::new(std::io::ErrorKind::InvalidInput, e))?;
        let listener = TcpListener::bind(addr).await?;

        tracing::info!(address = %listener.local_addr()?, "Listener bound");
        listeners.push(listener);
    }

    Ok(listeners)
}
