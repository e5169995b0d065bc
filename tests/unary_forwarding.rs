//! End-to-end tests for plain request forwarding.

mod common;

use common::{
    start_gateway, start_programmable_backend, start_unmapped_gateway, unreachable_addr, CannedResponse,
};
use relay_gateway::observability::GatewayEvent;

#[tokio::test]
async fn test_request_is_forwarded_verbatim() {
    let (backend, captured) = start_programmable_backend(CannedResponse::new(201, "ok")).await;
    let gateway = start_gateway(backend).await;

    let client = reqwest::Client::new();
    let response = client
        .post(gateway.http_url("/foo?x=1"))
        .header("x-custom", "kept")
        .body("hello")
        .send()
        .await
        .unwrap();

    assert_eq!(response.status().as_u16(), 201);
    assert_eq!(response.text().await.unwrap(), "ok");

    let seen = captured.lock().unwrap().clone();
    assert_eq!(seen.len(), 1);
    assert_eq!(seen[0].method, "POST");
    assert_eq!(seen[0].path_and_query, "/foo?x=1");
    assert_eq!(seen[0].body, b"hello");
    assert_eq!(seen[0].header("x-custom"), Some("kept"));
    // Host names the upstream, not the gateway.
    assert_eq!(seen[0].host.as_deref(), Some(backend.to_string().as_str()));

    assert!(gateway.events.events().is_empty());
    gateway.stop().await;
}

#[tokio::test]
async fn test_error_status_passes_through_and_is_reported() {
    let (backend, _captured) =
        start_programmable_backend(CannedResponse::new(503, "backend down").header("x-reason", "maintenance")).await;
    let gateway = start_gateway(backend).await;

    let response = reqwest::get(gateway.http_url("/status")).await.unwrap();
    assert_eq!(response.status().as_u16(), 503);
    assert_eq!(
        response.headers().get("x-reason").and_then(|v| v.to_str().ok()),
        Some("maintenance")
    );
    assert_eq!(response.text().await.unwrap(), "backend down");

    let events = gateway.events.events();
    assert_eq!(events.len(), 1);
    match &events[0] {
        GatewayEvent::UpstreamErrorStatus { status, upstream_url, .. } => {
            assert_eq!(*status, 503);
            assert!(upstream_url.ends_with("/status"));
        }
        other => panic!("unexpected event: {:?}", other),
    }
    gateway.stop().await;
}

#[tokio::test]
async fn test_redirect_is_not_followed() {
    let (backend, captured) =
        start_programmable_backend(CannedResponse::new(302, "").header("location", "/elsewhere")).await;
    let gateway = start_gateway(backend).await;

    let client = reqwest::Client::builder()
        .redirect(reqwest::redirect::Policy::none())
        .build()
        .unwrap();
    let response = client.get(gateway.http_url("/old")).send().await.unwrap();

    assert_eq!(response.status().as_u16(), 302);
    assert_eq!(
        response.headers().get("location").and_then(|v| v.to_str().ok()),
        Some("/elsewhere")
    );
    assert_eq!(captured.lock().unwrap().len(), 1);
    assert!(gateway.events.events().is_empty());
    gateway.stop().await;
}

#[tokio::test]
async fn test_chunked_upstream_body_is_reframed() {
    let body = "several pieces of a streamed upstream body";
    let (backend, _captured) = start_programmable_backend(CannedResponse::new(200, body).chunked()).await;
    let gateway = start_gateway(backend).await;

    let response = reqwest::get(gateway.http_url("/stream")).await.unwrap();
    assert_eq!(response.status().as_u16(), 200);
    assert!(response.headers().get("transfer-encoding").is_none());
    assert_eq!(
        response.headers().get("content-length").and_then(|v| v.to_str().ok()),
        Some(body.len().to_string().as_str())
    );
    assert_eq!(response.text().await.unwrap(), body);
    assert!(gateway.events.events().is_empty());
    gateway.stop().await;
}

#[tokio::test]
async fn test_unreachable_upstream_returns_502() {
    let upstream = unreachable_addr().await;
    let gateway = start_gateway(upstream).await;

    let response = reqwest::get(gateway.http_url("/x")).await.unwrap();
    assert_eq!(response.status().as_u16(), 502);

    let body = response.text().await.unwrap();
    assert_eq!(body, "Error forwarding request");
    assert!(!body.contains(&upstream.port().to_string()));

    let events = gateway.events.events();
    assert_eq!(events.len(), 1);
    match &events[0] {
        GatewayEvent::ForwardingFailed { path, upstream: target, .. } => {
            assert_eq!(path, "/x");
            assert_eq!(target.port(), upstream.port());
        }
        other => panic!("unexpected event: {:?}", other),
    }
    gateway.stop().await;
}

#[tokio::test]
async fn test_unmapped_listener_returns_404() {
    let (backend, captured) = start_programmable_backend(CannedResponse::new(200, "never")).await;
    let gateway = start_unmapped_gateway(backend).await;

    let response = reqwest::get(gateway.http_url("/foo")).await.unwrap();
    assert_eq!(response.status().as_u16(), 404);

    let body = response.text().await.unwrap();
    assert_eq!(body, "No mapping found for this IP and port");
    assert!(!body.contains(&backend.port().to_string()));
    assert!(captured.lock().unwrap().is_empty());

    assert_eq!(gateway.events.count("route_miss"), 1);
    match &gateway.events.events()[0] {
        GatewayEvent::RouteMiss { client, local, path } => {
            assert_eq!(client, "127.0.0.1");
            assert_eq!(local.port(), gateway.addr.port());
            assert_eq!(path, "/foo");
        }
        other => panic!("unexpected event: {:?}", other),
    }
    gateway.stop().await;
}
