//! Unary request forwarding.
//!
//! # Responsibilities
//! - Rewrite the request URI onto the upstream target
//! - Buffer the inbound body and issue exactly one upstream call
//! - Buffer the upstream response and filter its headers
//! - Emit upstream-error-status and forwarding-failed events
//!
//! # Design Decisions
//! - No retries, no backoff: a single best-effort attempt
//! - No connection reuse: the client keeps zero idle connections
//! - Redirects are returned to the client verbatim (hyper never follows them)
//! - Only the connect phase has a timeout, set on the connector

use std::sync::Arc;
use std::time::Duration;

use axum::{
    body::{Body, Bytes},
    http::{header, HeaderMap, HeaderValue, Request, StatusCode},
};
use hyper_util::{
    client::legacy::{connect::HttpConnector, Client},
    rt::TokioExecutor,
};

use crate::config::GatewayConfig;
use crate::error::ProxyError;
use crate::http::headers::{filter_request_headers, filter_response_headers};
use crate::http::request::InboundRequest;
use crate::http::response::OutboundResult;
use crate::observability::{EventSink, GatewayEvent};
use crate::routing::RouteTarget;

/// Forwards non-upgrade requests to their upstream.
#[derive(Clone)]
pub struct UnaryForwarder {
    client: Client<HttpConnector, Body>,
    max_body_bytes: usize,
    events: Arc<dyn EventSink>,
}

impl UnaryForwarder {
    /// Create a forwarder using the configured connect timeout and body limit.
    pub fn new(config: &GatewayConfig, events: Arc<dyn EventSink>) -> Self {
        let mut connector = HttpConnector::new();
        connector.set_connect_timeout(Some(Duration::from_secs(config.timeouts.connect_secs)));
        connector.set_nodelay(true);

        let client = Client::builder(TokioExecutor::new())
            .pool_max_idle_per_host(0)
            .build(connector);

        Self {
            client,
            max_body_bytes: config.limits.max_body_bytes,
            events,
        }
    }

    /// Forward one request and reshape the upstream answer.
    pub async fn forward(&self, request: InboundRequest, target: &RouteTarget) -> OutboundResult {
        let client = request.client.clone();
        let path = request.path_and_query.clone();
        let upstream_url = target.http_url(&request.path_and_query);

        match self.exchange(request, &upstream_url, target).await {
            Ok((status, headers, body)) => {
                if status.as_u16() >= 400 {
                    self.events.emit(GatewayEvent::UpstreamErrorStatus {
                        client,
                        upstream_url,
                        status: status.as_u16(),
                    });
                }
                OutboundResult::Forwarded { status, headers, body }
            }
            Err(err) => {
                self.events.emit(GatewayEvent::ForwardingFailed {
                    client,
                    path,
                    upstream: target.clone(),
                    cause: err.to_string(),
                });
                OutboundResult::ForwardingFailed(err)
            }
        }
    }

    async fn exchange(
        &self,
        request: InboundRequest,
        upstream_url: &str,
        target: &RouteTarget,
    ) -> Result<(StatusCode, HeaderMap, Bytes), ProxyError> {
        let body = axum::body::to_bytes(request.body, self.max_body_bytes)
            .await
            .map_err(ProxyError::InboundBody)?;

        let mut builder = Request::builder().method(request.method).uri(upstream_url);
        if let Some(headers) = builder.headers_mut() {
            *headers = filter_request_headers(&request.headers);
            if let Ok(host) = HeaderValue::from_str(&target.authority()) {
                headers.insert(header::HOST, host);
            }
        }
        let outbound = builder.body(Body::from(body)).map_err(ProxyError::protocol)?;

        let response = self.client.request(outbound).await.map_err(|e| {
            if e.is_connect() {
                ProxyError::transport(e)
            } else {
                ProxyError::protocol(e)
            }
        })?;

        // Over-limit or malformed response bodies are a protocol failure.
        let (parts, body) = response.into_parts();
        let body = axum::body::to_bytes(Body::new(body), self.max_body_bytes)
            .await
            .map_err(ProxyError::protocol)?;

        Ok((parts.status, filter_response_headers(&parts.headers), body))
    }
}
