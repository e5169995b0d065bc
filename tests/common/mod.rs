//! Shared utilities for integration testing.

#![allow(dead_code)]

use std::net::SocketAddr;
use std::sync::{Arc, Mutex};
use std::time::Duration;

use axum::body::{to_bytes, Body};
use axum::http::{Request, Response, StatusCode};
use axum::Router;
use futures_util::{SinkExt, StreamExt};
use tokio::net::TcpListener;
use tokio::task::JoinHandle;
use tokio_tungstenite::tungstenite::Message;

use relay_gateway::config::{GatewayConfig, RouteConfig};
use relay_gateway::net::SessionTracker;
use relay_gateway::observability::MemoryEventSink;
use relay_gateway::{HttpServer, Shutdown};

/// What a mock backend saw for one request.
#[derive(Debug, Clone)]
pub struct CapturedRequest {
    pub method: String,
    pub path_and_query: String,
    pub host: Option<String>,
    pub headers: Vec<(String, String)>,
    pub body: Vec<u8>,
}

impl CapturedRequest {
    pub fn header(&self, name: &str) -> Option<&str> {
        self.headers
            .iter()
            .find(|(n, _)| n.eq_ignore_ascii_case(name))
            .map(|(_, v)| v.as_str())
    }
}

/// Canned reply of a programmable backend.
#[derive(Debug, Clone)]
pub struct CannedResponse {
    pub status: u16,
    pub headers: Vec<(&'static str, String)>,
    pub body: String,
    /// Stream the body in pieces so it goes out chunked.
    pub chunked: bool,
}

impl CannedResponse {
    pub fn new(status: u16, body: &str) -> Self {
        Self {
            status,
            headers: Vec::new(),
            body: body.to_string(),
            chunked: false,
        }
    }

    pub fn header(mut self, name: &'static str, value: &str) -> Self {
        self.headers.push((name, value.to_string()));
        self
    }

    pub fn chunked(mut self) -> Self {
        self.chunked = true;
        self
    }
}

/// Start a programmable HTTP backend that records every request.
pub async fn start_programmable_backend(
    response: CannedResponse,
) -> (SocketAddr, Arc<Mutex<Vec<CapturedRequest>>>) {
    let captured = Arc::new(Mutex::new(Vec::new()));
    let seen = captured.clone();

    let app = Router::new().fallback(move |request: Request<Body>| {
        let seen = seen.clone();
        let response = response.clone();
        async move {
            let (parts, body) = request.into_parts();
            let body = to_bytes(body, usize::MAX).await.unwrap_or_default();
            seen.lock().unwrap().push(CapturedRequest {
                method: parts.method.to_string(),
                path_and_query: parts
                    .uri
                    .path_and_query()
                    .map(|pq| pq.as_str().to_string())
                    .unwrap_or_else(|| "/".into()),
                host: parts
                    .headers
                    .get("host")
                    .and_then(|v| v.to_str().ok())
                    .map(str::to_string),
                headers: parts
                    .headers
                    .iter()
                    .map(|(n, v)| (n.to_string(), v.to_str().unwrap_or_default().to_string()))
                    .collect(),
                body: body.to_vec(),
            });

            let mut builder = Response::builder()
                .status(StatusCode::from_u16(response.status).unwrap());
            for (name, value) in &response.headers {
                builder = builder.header(*name, value);
            }
            if response.chunked {
                let pieces: Vec<Result<String, std::io::Error>> = response
                    .body
                    .split_inclusive(' ')
                    .map(|piece| Ok(piece.to_string()))
                    .collect();
                builder.body(Body::from_stream(futures_util::stream::iter(pieces))).unwrap()
            } else {
                builder.body(Body::from(response.body)).unwrap()
            }
        }
    });

    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    tokio::spawn(async move {
        let _ = axum::serve(listener, app).await;
    });

    (addr, captured)
}

/// Start a WebSocket backend that answers "ping" with "pong" and echoes the rest.
pub async fn start_ws_echo_backend() -> SocketAddr {
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();

    tokio::spawn(async move {
        while let Ok((stream, _)) = listener.accept().await {
            tokio::spawn(async move {
                let Ok(mut socket) = tokio_tungstenite::accept_async(stream).await else {
                    return;
                };
                while let Some(Ok(message)) = socket.next().await {
                    let reply = match message {
                        Message::Text(text) if text.as_str() == "ping" => Message::text("pong"),
                        Message::Text(text) => Message::Text(text),
                        Message::Binary(data) => Message::Binary(data),
                        // Keep reading so the close reply gets flushed.
                        _ => continue,
                    };
                    if socket.send(reply).await.is_err() {
                        break;
                    }
                }
            });
        }
    });

    addr
}

/// An address with nothing listening on it.
pub async fn unreachable_addr() -> SocketAddr {
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    drop(listener);
    addr
}

/// A gateway running on an ephemeral loopback port.
pub struct TestGateway {
    pub addr: SocketAddr,
    pub events: MemoryEventSink,
    pub sessions: SessionTracker,
    pub shutdown: Shutdown,
    handle: JoinHandle<std::io::Result<()>>,
}

impl TestGateway {
    pub fn http_url(&self, path: &str) -> String {
        format!("http://{}{}", self.addr, path)
    }

    pub fn ws_url(&self, path: &str) -> String {
        format!("ws://{}{}", self.addr, path)
    }

    pub async fn stop(self) {
        self.shutdown.trigger();
        let _ = tokio::time::timeout(Duration::from_secs(10), self.handle).await;
    }
}

/// Start a gateway whose listener maps to `upstream`.
pub async fn start_gateway(upstream: SocketAddr) -> TestGateway {
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    spawn_gateway(listener, route(addr, upstream))
}

/// Start a gateway whose only route belongs to some other listener.
pub async fn start_unmapped_gateway(upstream: SocketAddr) -> TestGateway {
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    let elsewhere = SocketAddr::new(addr.ip(), addr.port().wrapping_add(1).max(1));
    spawn_gateway(listener, route(elsewhere, upstream))
}

fn route(local: SocketAddr, upstream: SocketAddr) -> RouteConfig {
    RouteConfig {
        local_host: local.ip().to_string(),
        local_port: i64::from(local.port()),
        remote_host: upstream.ip().to_string(),
        remote_port: i64::from(upstream.port()),
    }
}

fn spawn_gateway(listener: TcpListener, route: RouteConfig) -> TestGateway {
    let addr = listener.local_addr().unwrap();

    let mut config = GatewayConfig::default();
    config.timeouts.connect_secs = 2;
    config.routes.push(route);

    let events = MemoryEventSink::new();
    let server = HttpServer::with_event_sink(config, Arc::new(events.clone())).unwrap();
    let sessions = server.sessions();
    let shutdown = Shutdown::new();

    let run_shutdown = shutdown.clone();
    let handle = tokio::spawn(async move { server.run(vec![listener], &run_shutdown).await });

    TestGateway {
        addr,
        events,
        sessions,
        shutdown,
        handle,
    }
}

/// Poll `check` until it holds or a second passes.
pub async fn eventually<F: Fn() -> bool>(check: F) -> bool {
    for _ in 0..50 {
        if check() {
            return true;
        }
        tokio::time::sleep(Duration::from_millis(20)).await;
    }
    check()
}
