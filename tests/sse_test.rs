//! End-to-end tests for the Server-Sent Events endpoint.

#![allow(clippy::panic)]

mod common;

use std::time::Duration;

use common::{TestApp, spawn_app, wait_for_connections};

async fn open_stream(app: &TestApp, last_event_id: Option<&str>) -> reqwest::Response {
    let mut request = reqwest::Client::new().get(app.sse_url());
    if let Some(id) = last_event_id {
        request = request.header("Last-Event-ID", id);
    }
    let Ok(response) = request.send().await else {
        panic!("stream request failed");
    };
    response
}

/// Reads the stream until the accumulated text contains `needle`.
async fn read_until(response: &mut reqwest::Response, needle: &str) -> String {
    let mut seen = String::new();
    let deadline = tokio::time::Instant::now() + Duration::from_secs(3);
    while !seen.contains(needle) {
        let Ok(Ok(Some(chunk))) = tokio::time::timeout_at(deadline, response.chunk()).await else {
            panic!("stream ended before {needle:?}; saw {seen:?}");
        };
        seen.push_str(&String::from_utf8_lossy(&chunk));
    }
    seen
}

#[tokio::test]
async fn stream_opens_with_headers_and_welcome() {
    let app = spawn_app().await;
    let mut stream = open_stream(&app, None).await;

    let headers = stream.headers();
    assert_eq!(
        headers.get("content-type").and_then(|v| v.to_str().ok()),
        Some("text/event-stream")
    );
    assert_eq!(
        headers.get("cache-control").and_then(|v| v.to_str().ok()),
        Some("no-cache")
    );

    let seen = read_until(&mut stream, "\n\n").await;
    assert!(seen.starts_with("event: welcome\ndata: {"), "unexpected start: {seen:?}");
    assert!(seen.contains("Connected to SSE stream"));
}

#[tokio::test]
async fn resume_cursor_is_reported() {
    let app = spawn_app().await;
    let mut stream = open_stream(&app, Some("9")).await;
    read_until(&mut stream, r#""resumed_from":"9""#).await;
}

#[tokio::test]
async fn trigger_reaches_open_streams() {
    let app = spawn_app().await;
    let mut stream = open_stream(&app, None).await;
    read_until(&mut stream, "event: welcome").await;
    wait_for_connections(&app.state.sse_hub, 1).await;

    let Ok(response) = reqwest::Client::new()
        .post(app.http_url("/sse/trigger?event=alert"))
        .json(&serde_json::json!({"level": "high"}))
        .send()
        .await
    else {
        panic!("trigger request failed");
    };
    assert_eq!(response.status(), reqwest::StatusCode::OK);
    let Ok(body) = response.json::<serde_json::Value>().await else {
        panic!("trigger body is not JSON");
    };
    assert_eq!(body["receivers"], 1);

    read_until(&mut stream, "event: alert\ndata: {\"level\":\"high\"}\n\n").await;
}

#[tokio::test]
async fn heartbeats_keep_idle_streams_alive() {
    let app = spawn_app().await;
    let mut stream = open_stream(&app, None).await;
    read_until(&mut stream, ": keep-alive\n\n").await;
}

#[tokio::test]
async fn shutdown_notifies_and_ends_stream() {
    let app = spawn_app().await;
    let mut stream = open_stream(&app, None).await;
    read_until(&mut stream, "event: welcome").await;
    wait_for_connections(&app.state.sse_hub, 1).await;

    assert!(app.state.sse_hub.shutdown(Duration::from_secs(5)).await.is_ok());

    read_until(&mut stream, "event: shutdown\ndata: server shutting down\n\n").await;
    let mut ended = false;
    for _ in 0..100 {
        match tokio::time::timeout(Duration::from_secs(2), stream.chunk()).await {
            Ok(Ok(Some(_))) => continue,
            _ => {
                ended = true;
                break;
            }
        }
    }
    assert!(ended, "stream kept running after shutdown");
}

#[tokio::test]
async fn stopped_hub_refuses_new_streams() {
    let app = spawn_app().await;
    assert!(app.state.sse_hub.shutdown(Duration::from_secs(5)).await.is_ok());

    let response = open_stream(&app, None).await;
    assert_eq!(response.status(), reqwest::StatusCode::SERVICE_UNAVAILABLE);
}

#[tokio::test]
async fn client_disconnect_unregisters_stream() {
    let app = spawn_app().await;
    let mut stream = open_stream(&app, None).await;
    read_until(&mut stream, "event: welcome").await;
    wait_for_connections(&app.state.sse_hub, 1).await;

    drop(stream);
    wait_for_connections(&app.state.sse_hub, 0).await;
}
