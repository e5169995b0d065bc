//! WebSocket relay handling.
//!
//! # Responsibilities
//! - Complete the upgrade handshake with the client
//! - Establish a WebSocket connection to the upstream
//! - Bidirectional frame forwarding under one cancellation token
//!
//! # Data Flow
//! ```text
//! Client ←──── WebSocket frames ────→ Gateway ←──── WebSocket frames ────→ Upstream
//!          (axum::extract::ws)                      (tokio-tungstenite)
//! ```
//!
//! # Design Decisions
//! - Client upgrade is committed before the upstream is contacted
//! - Frame-level forwarding (no message buffering or rewriting)
//! - Close frames propagated; ping/pong forwarded like any other frame
//! - Either pump ending cancels the shared token, stopping its sibling
//! - A failed upstream handshake drops the client socket without a close frame

use std::pin::pin;
use std::sync::Arc;
use std::time::Duration;

use axum::{
    body::Bytes,
    extract::ws::{self, WebSocket, WebSocketUpgrade},
    http::{header, HeaderMap},
    response::Response,
};
use futures_util::{Sink, SinkExt, Stream, StreamExt};
use tokio::net::TcpStream;
use tokio::time::Instant;
use tokio_tungstenite::{
    tungstenite::{self, client::IntoClientRequest, protocol::CloseFrame},
    MaybeTlsStream, WebSocketStream,
};
use tokio_util::sync::CancellationToken;

use crate::config::GatewayConfig;
use crate::error::{BoxError, Direction, ProxyError};
use crate::http::headers::{filter_upgrade_headers, requested_protocols};
use crate::http::request::InboundRequest;
use crate::net::{SessionGuard, SessionTracker};
use crate::observability::{EventSink, GatewayEvent};
use crate::routing::RouteTarget;

/// Upstream side of a relay session.
pub type UpstreamSocket = WebSocketStream<MaybeTlsStream<TcpStream>>;

/// A frame as seen by the relay, independent of either WebSocket stack.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Frame {
    Text(String),
    Binary(Bytes),
    Ping(Bytes),
    Pong(Bytes),
    Close(Option<(u16, String)>),
}

/// Conversion between a stack's message type and [`Frame`].
pub trait RelayMessage: Sized {
    /// `None` for messages that never travel over the wire.
    fn into_frame(self) -> Option<Frame>;
    fn from_frame(frame: Frame) -> Self;
}

impl RelayMessage for Frame {
    fn into_frame(self) -> Option<Frame> {
        Some(self)
    }

    fn from_frame(frame: Frame) -> Self {
        frame
    }
}

impl RelayMessage for ws::Message {
    fn into_frame(self) -> Option<Frame> {
        Some(match self {
            ws::Message::Text(text) => Frame::Text(text.as_str().to_owned()),
            ws::Message::Binary(data) => Frame::Binary(data),
            ws::Message::Ping(data) => Frame::Ping(data),
            ws::Message::Pong(data) => Frame::Pong(data),
            ws::Message::Close(close) => {
                Frame::Close(close.map(|c| (c.code, c.reason.as_str().to_owned())))
            }
        })
    }

    fn from_frame(frame: Frame) -> Self {
        match frame {
            Frame::Text(text) => ws::Message::Text(text.into()),
            Frame::Binary(data) => ws::Message::Binary(data),
            Frame::Ping(data) => ws::Message::Ping(data),
            Frame::Pong(data) => ws::Message::Pong(data),
            Frame::Close(close) => ws::Message::Close(close.map(|(code, reason)| ws::CloseFrame {
                code,
                reason: reason.into(),
            })),
        }
    }
}

impl RelayMessage for tungstenite::Message {
    fn into_frame(self) -> Option<Frame> {
        match self {
            tungstenite::Message::Text(text) => Some(Frame::Text(text.as_str().to_owned())),
            tungstenite::Message::Binary(data) => Some(Frame::Binary(data)),
            tungstenite::Message::Ping(data) => Some(Frame::Ping(data)),
            tungstenite::Message::Pong(data) => Some(Frame::Pong(data)),
            tungstenite::Message::Close(close) => Some(Frame::Close(
                close.map(|c| (u16::from(c.code), c.reason.as_str().to_owned())),
            )),
            // Raw frames are only produced for writing.
            tungstenite::Message::Frame(_) => None,
        }
    }

    fn from_frame(frame: Frame) -> Self {
        match frame {
            Frame::Text(text) => tungstenite::Message::Text(text.into()),
            Frame::Binary(data) => tungstenite::Message::Binary(data),
            Frame::Ping(data) => tungstenite::Message::Ping(data),
            Frame::Pong(data) => tungstenite::Message::Pong(data),
            Frame::Close(close) => tungstenite::Message::Close(close.map(|(code, reason)| CloseFrame {
                code: code.into(),
                reason: reason.into(),
            })),
        }
    }
}

/// Why a pump stopped without error.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PumpEnd {
    /// Its source closed (stream ended or close frame forwarded).
    SourceClosed,
    /// The shared token was cancelled.
    Cancelled,
}

/// How long a pump keeps draining its source after forwarding a close frame.
pub const CLOSE_GRACE: Duration = Duration::from_secs(1);

/// Forward frames from `source` to `sink` until either ends or `token` fires.
///
/// After a close frame is forwarded the source is still polled until it
/// ends (at most [`CLOSE_GRACE`]), so the stack can flush its close reply.
/// Frames read in that phase are discarded.
///
/// The token is cancelled when this returns, panics, or is dropped.
pub async fn pump<S, K, In, Out, E>(
    source: S,
    sink: K,
    token: CancellationToken,
    direction: Direction,
) -> Result<PumpEnd, ProxyError>
where
    S: Stream<Item = Result<In, E>>,
    K: Sink<Out>,
    K::Error: Into<BoxError>,
    E: Into<BoxError>,
    In: RelayMessage,
    Out: RelayMessage,
{
    let _cancel_sibling = token.clone().drop_guard();
    let mut source = pin!(source);
    let mut sink = pin!(sink);
    let mut close_deadline: Option<Instant> = None;

    loop {
        let next = tokio::select! {
            biased;
            _ = token.cancelled() => return Ok(PumpEnd::Cancelled),
            _ = close_timer(close_deadline) => return Ok(PumpEnd::SourceClosed),
            next = source.next() => next,
        };

        let message = match next {
            None => return Ok(PumpEnd::SourceClosed),
            Some(Ok(message)) => message,
            // The peer may drop the socket instead of answering our close.
            Some(Err(_)) if close_deadline.is_some() => return Ok(PumpEnd::SourceClosed),
            Some(Err(e)) => return Err(ProxyError::frame(direction, e)),
        };
        if close_deadline.is_some() {
            continue;
        }
        let Some(frame) = message.into_frame() else {
            continue;
        };
        let closing = matches!(frame, Frame::Close(_));

        tokio::select! {
            biased;
            _ = token.cancelled() => return Ok(PumpEnd::Cancelled),
            sent = sink.send(Out::from_frame(frame)) => match sent {
                Ok(()) => {}
                // Destination already finished its own close handshake.
                Err(_) if closing => return Ok(PumpEnd::SourceClosed),
                Err(e) => return Err(ProxyError::frame(direction, e)),
            }
        }

        if closing {
            tokio::select! {
                biased;
                _ = token.cancelled() => return Ok(PumpEnd::Cancelled),
                _ = sink.close() => {}
            }
            close_deadline = Some(Instant::now() + CLOSE_GRACE);
        }
    }
}

async fn close_timer(deadline: Option<Instant>) {
    match deadline {
        Some(deadline) => tokio::time::sleep_until(deadline).await,
        None => std::future::pending().await,
    }
}

/// Run both pump directions until the session ends.
///
/// Each half is moved into its own task and dropped when that task ends,
/// so both connections are released by the time this returns.
pub async fn relay_streams<CS, CK, US, UK, CM, UM, CE, UE>(
    client: (CK, CS),
    upstream: (UK, US),
    token: CancellationToken,
) -> Result<(), ProxyError>
where
    CS: Stream<Item = Result<CM, CE>> + Send + 'static,
    CK: Sink<CM> + Send + 'static,
    CK::Error: Into<BoxError> + Send,
    US: Stream<Item = Result<UM, UE>> + Send + 'static,
    UK: Sink<UM> + Send + 'static,
    UK::Error: Into<BoxError> + Send,
    CM: RelayMessage + Send + 'static,
    UM: RelayMessage + Send + 'static,
    CE: Into<BoxError> + Send + 'static,
    UE: Into<BoxError> + Send + 'static,
{
    let (client_tx, client_rx) = client;
    let (upstream_tx, upstream_rx) = upstream;

    let outbound = tokio::spawn(pump::<CS, UK, CM, UM, CE>(
        client_rx,
        upstream_tx,
        token.clone(),
        Direction::ClientToUpstream,
    ));
    let inbound = tokio::spawn(pump::<US, CK, UM, CM, UE>(
        upstream_rx,
        client_tx,
        token.clone(),
        Direction::UpstreamToClient,
    ));

    let (outbound, inbound) = tokio::join!(outbound, inbound);
    let outbound = outbound.map_err(|e| ProxyError::frame(Direction::ClientToUpstream, e))?;
    let inbound = inbound.map_err(|e| ProxyError::frame(Direction::UpstreamToClient, e))?;
    outbound?;
    inbound?;
    Ok(())
}

/// One live client ↔ upstream relay.
pub struct RelaySession {
    client: WebSocket,
    upstream: UpstreamSocket,
    token: CancellationToken,
    guard: SessionGuard,
}

impl RelaySession {
    pub fn new(
        client: WebSocket,
        upstream: UpstreamSocket,
        token: CancellationToken,
        guard: SessionGuard,
    ) -> Self {
        Self {
            client,
            upstream,
            token,
            guard,
        }
    }

    /// Token shared by both pump directions.
    pub fn token(&self) -> &CancellationToken {
        &self.token
    }

    /// Pump frames until either side closes or the token is cancelled.
    pub async fn run(self) -> Result<(), ProxyError> {
        let session_id = self.guard.id();
        tracing::debug!(session_id = %session_id, "Relay session started");

        let result = relay_streams(self.client.split(), self.upstream.split(), self.token).await;

        tracing::debug!(session_id = %session_id, ok = result.is_ok(), "Relay session finished");
        drop(self.guard);
        result
    }
}

/// Open the upgraded connection to the upstream.
///
/// Also returns the sub-protocol the upstream selected, if any.
pub async fn connect_upstream(
    target: &RouteTarget,
    path_and_query: &str,
    client_headers: &HeaderMap,
    connect_timeout: Duration,
) -> Result<(UpstreamSocket, Option<String>), ProxyError> {
    let mut request = target
        .ws_url(path_and_query)
        .into_client_request()
        .map_err(ProxyError::protocol)?;

    for (name, value) in filter_upgrade_headers(client_headers, target).iter() {
        request.headers_mut().append(name, value.clone());
    }

    match tokio::time::timeout(connect_timeout, tokio_tungstenite::connect_async(request)).await {
        Ok(Ok((socket, response))) => {
            let protocol = response
                .headers()
                .get(header::SEC_WEBSOCKET_PROTOCOL)
                .and_then(|v| v.to_str().ok())
                .map(|v| v.trim().to_string());
            Ok((socket, protocol))
        }
        Ok(Err(tungstenite::Error::Io(e))) => Err(ProxyError::transport(e)),
        Ok(Err(e)) => Err(ProxyError::protocol(e)),
        Err(elapsed) => Err(ProxyError::transport(elapsed)),
    }
}

/// Relays upgraded connections to their upstream.
#[derive(Clone)]
pub struct DuplexRelay {
    events: Arc<dyn EventSink>,
    sessions: SessionTracker,
    shutdown: CancellationToken,
    connect_timeout: Duration,
}

impl DuplexRelay {
    /// Session tokens are children of `shutdown`.
    pub fn new(
        config: &GatewayConfig,
        events: Arc<dyn EventSink>,
        sessions: SessionTracker,
        shutdown: CancellationToken,
    ) -> Self {
        Self {
            events,
            sessions,
            shutdown,
            connect_timeout: Duration::from_secs(config.timeouts.connect_secs),
        }
    }

    /// Accept the client upgrade and relay it once the handshake completes.
    ///
    /// The first sub-protocol the client asked for is echoed back, because the
    /// upstream's choice is not known yet.
    pub fn accept(&self, upgrade: WebSocketUpgrade, request: InboundRequest, target: RouteTarget) -> Response {
        let relay = self.clone();
        upgrade
            .protocols(requested_protocols(&request.headers))
            .on_upgrade(move |socket| async move { relay.run(socket, request, target).await })
    }

    async fn run(self, client: WebSocket, request: InboundRequest, target: RouteTarget) {
        let upstream = match connect_upstream(
            &target,
            &request.path_and_query,
            &request.headers,
            self.connect_timeout,
        )
        .await
        {
            Ok((upstream, upstream_protocol)) => {
                let echoed = requested_protocols(&request.headers).into_iter().next();
                if upstream_protocol != echoed {
                    tracing::debug!(
                        client = %request.client,
                        upstream = %target,
                        client_protocol = ?echoed,
                        upstream_protocol = ?upstream_protocol,
                        "Upstream selected a different sub-protocol"
                    );
                }
                upstream
            }
            Err(err) => {
                self.events.emit(GatewayEvent::ForwardingFailed {
                    client: request.client,
                    path: request.path_and_query,
                    upstream: target,
                    cause: err.to_string(),
                });
                // No close frame: the client sees an abrupt close.
                drop(client);
                return;
            }
        };

        let session = RelaySession::new(
            client,
            upstream,
            self.shutdown.child_token(),
            self.sessions.track(),
        );
        if let Err(err) = session.run().await {
            tracing::debug!(client = %request.client, error = %err, "Relay session ended with error");
        }
    }
}
