//! HTTP server setup and request dispatch.
//!
//! # Responsibilities
//! - Create Axum Router with a catch-all handler
//! - Wire up middleware (tracing)
//! - Serve every listener with graceful shutdown
//! - Resolve the inbound identity through the route table
//! - Dispatch to the unary forwarder or the duplex relay

use std::sync::Arc;
use std::time::Duration;

use axum::{
    body::Body,
    extract::{ConnectInfo, FromRequestParts, State, WebSocketUpgrade},
    http::Request,
    response::{IntoResponse, Response},
    routing::any,
    Router,
};
use tokio::net::TcpListener;
use tokio_util::sync::CancellationToken;
use tower_http::trace::TraceLayer;

use crate::config::GatewayConfig;
use crate::http::forward::UnaryForwarder;
use crate::http::headers::is_upgrade_request;
use crate::http::request::{path_and_query, ConnectionAddrs, InboundRequest};
use crate::http::response::OutboundResult;
use crate::http::websocket::DuplexRelay;
use crate::lifecycle::Shutdown;
use crate::net::SessionTracker;
use crate::observability::{EventSink, GatewayEvent, TracingEventSink};
use crate::routing::{RouteTable, RouteTableError};

/// How long shutdown waits for live relay sessions to release.
const SESSION_DRAIN_TIMEOUT: Duration = Duration::from_secs(5);

/// Application state injected into handlers.
#[derive(Clone)]
pub struct AppState {
    pub routes: Arc<RouteTable>,
    pub events: Arc<dyn EventSink>,
    pub forwarder: UnaryForwarder,
    pub relay: DuplexRelay,
}

/// HTTP server for the gateway.
pub struct HttpServer {
    router: Router,
    config: GatewayConfig,
    sessions: SessionTracker,
    relay_shutdown: CancellationToken,
}

impl HttpServer {
    /// Create a server that reports events through `tracing`.
    pub fn new(config: GatewayConfig) -> Result<Self, RouteTableError> {
        Self::with_event_sink(config, Arc::new(TracingEventSink))
    }

    /// Create a server with an explicit event sink.
    ///
    /// Fails if the configured routes do not form a valid table.
    pub fn with_event_sink(
        config: GatewayConfig,
        events: Arc<dyn EventSink>,
    ) -> Result<Self, RouteTableError> {
        let routes = Arc::new(RouteTable::from_config(&config.routes)?);
        let sessions = SessionTracker::new();
        let relay_shutdown = CancellationToken::new();

        let state = AppState {
            routes,
            forwarder: UnaryForwarder::new(&config, events.clone()),
            relay: DuplexRelay::new(&config, events.clone(), sessions.clone(), relay_shutdown.clone()),
            events,
        };

        let router = Self::build_router(state);
        Ok(Self {
            router,
            config,
            sessions,
            relay_shutdown,
        })
    }

    /// Build the Axum router with all middleware layers.
    fn build_router(state: AppState) -> Router {
        Router::new()
            .route("/{*path}", any(dispatch))
            .route("/", any(dispatch))
            .with_state(state)
            .layer(TraceLayer::new_for_http())
    }

    /// The router, for serving or in-process testing.
    pub fn router(&self) -> Router {
        self.router.clone()
    }

    /// Live relay sessions.
    pub fn sessions(&self) -> SessionTracker {
        self.sessions.clone()
    }

    /// Get a reference to the config.
    pub fn config(&self) -> &GatewayConfig {
        &self.config
    }

    /// Serve every listener until `shutdown` fires.
    ///
    /// After the listeners stop, live relays are cancelled and given a
    /// bounded time to release their connections.
    pub async fn run(self, listeners: Vec<TcpListener>, shutdown: &Shutdown) -> Result<(), std::io::Error> {
        let mut servers = tokio::task::JoinSet::new();

        for listener in listeners {
            let addr = listener.local_addr()?;
            tracing::info!(address = %addr, "HTTP server starting");

            let app = self
                .router
                .clone()
                .into_make_service_with_connect_info::<ConnectionAddrs>();
            let stop = shutdown.subscribe();

            servers.spawn(async move {
                axum::serve(listener, app)
                    .with_graceful_shutdown(stop.cancelled_owned())
                    .await
            });
        }

        let mut result = Ok(());
        while let Some(joined) = servers.join_next().await {
            match joined {
                Ok(Ok(())) => {}
                Ok(Err(e)) => {
                    tracing::error!(error = %e, "HTTP server failed");
                    shutdown.trigger();
                    result = Err(e);
                }
                Err(e) => {
                    tracing::error!(error = %e, "HTTP server task aborted");
                    shutdown.trigger();
                }
            }
        }

        self.relay_shutdown.cancel();
        if !self.sessions.wait_idle(SESSION_DRAIN_TIMEOUT).await {
            tracing::warn!(
                active_sessions = self.sessions.active_count(),
                "Relay sessions still open after shutdown deadline"
            );
        }

        tracing::info!("HTTP server stopped");
        result
    }
}

/// Catch-all handler: resolve the inbound identity and dispatch.
async fn dispatch(
    State(state): State<AppState>,
    ConnectInfo(addrs): ConnectInfo<ConnectionAddrs>,
    request: Request<Body>,
) -> Response {
    let (mut parts, body) = request.into_parts();
    let local = addrs.route_key();

    let Some(target) = state.routes.resolve_key(&local).cloned() else {
        state.events.emit(GatewayEvent::RouteMiss {
            client: addrs.client_identity(),
            local,
            path: path_and_query(&parts.uri),
        });
        return OutboundResult::RouteMiss.into_response();
    };

    // The only upgrade check; forwarder and relay trust this decision.
    if is_upgrade_request(&parts.headers) {
        let upgrade = match WebSocketUpgrade::from_request_parts(&mut parts, &state).await {
            Ok(upgrade) => upgrade,
            Err(rejection) => return rejection.into_response(),
        };
        let request = InboundRequest::from_parts(parts, body, addrs, true);
        state.relay.accept(upgrade, request, target)
    } else {
        let request = InboundRequest::from_parts(parts, body, addrs, false);
        state.forwarder.forward(request, &target).await.into_response()
    }
}
