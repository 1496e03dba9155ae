use std::collections::HashMap;
use std::net::SocketAddr;
use std::time::Duration;

use axum::{
    extract::Query,
    http::StatusCode,
    response::IntoResponse,
    routing::get,
    Json, Router,
};
use serde_json::json;
use tokio::net::TcpListener;
use wxmon_fetch::{FetchClient, FetchError, ObservationSource};

async fn observations(Query(q): Query<HashMap<String, String>>) -> impl IntoResponse {
    if q.get("apiKey").map(String::as_str) != Some("KEY") {
        return StatusCode::UNAUTHORIZED.into_response();
    }
    if q.get("format").map(String::as_str) != Some("json")
        || q.get("units").map(String::as_str) != Some("e")
    {
        return StatusCode::BAD_REQUEST.into_response();
    }
    let station = q.get("stationId").cloned().unwrap_or_else(|| "ANY".to_string());
    Json(json!({
        "observations": [
            {
                "stationID": station,
                "lat": 1.0, "lon": 2.0, "tz": "UTC",
                "epoch": 1000, "obsTimeLocal": "2024-01-01 00:00:00",
                "imperial": { "tempAvg": 68 }
            },
            { "stationID": station, "garbage": true }
        ]
    }))
    .into_response()
}

async fn spawn_server() -> SocketAddr {
    let app = Router::new()
        .route("/observations", get(observations))
        .route("/fail", get(|| async { StatusCode::INTERNAL_SERVER_ERROR }))
        .route("/empty", get(|| async { StatusCode::NO_CONTENT }))
        .route("/garbage", get(|| async { "<html>maintenance</html>" }))
        .route("/wrong-shape", get(|| async { Json(json!({ "data": [] })) }))
        .route(
            "/slow",
            get(|| async {
                tokio::time::sleep(Duration::from_secs(5)).await;
                Json(json!({ "observations": [] }))
            }),
        );

    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    tokio::spawn(async move {
        axum::serve(listener, app).await.unwrap();
    });
    addr
}

#[tokio::test]
async fn fetch_returns_envelope_without_validating_records() {
    let addr = spawn_server().await;
    let client = FetchClient::new(
        &format!("http://{}/observations", addr),
        "KEY",
        Some("KXYZ1".to_string()),
    )
    .unwrap();

    let envelope = client.fetch().await.unwrap();
    assert_eq!(envelope.observations.len(), 2);
    assert_eq!(envelope.observations[0]["stationID"], "KXYZ1");
    assert_eq!(client.name(), "weather-api");
}

#[tokio::test]
async fn non_success_status_is_an_error() {
    let addr = spawn_server().await;

    let client = FetchClient::new(&format!("http://{}/fail", addr), "KEY", None).unwrap();
    match client.fetch().await {
        Err(FetchError::Status(status)) => assert_eq!(status, 500),
        other => panic!("expected status error, got {:?}", other),
    }

    let client = FetchClient::new(&format!("http://{}/observations", addr), "WRONG", None).unwrap();
    assert!(matches!(client.fetch().await, Err(FetchError::Status(_))));
}

#[tokio::test]
async fn no_content_is_an_empty_envelope() {
    let addr = spawn_server().await;
    let client = FetchClient::new(&format!("http://{}/empty", addr), "KEY", None).unwrap();
    let envelope = client.fetch().await.unwrap();
    assert!(envelope.observations.is_empty());
}

#[tokio::test]
async fn malformed_body_is_an_error() {
    let addr = spawn_server().await;

    let client = FetchClient::new(&format!("http://{}/garbage", addr), "KEY", None).unwrap();
    assert!(matches!(client.fetch().await, Err(FetchError::InvalidBody(_))));

    let client = FetchClient::new(&format!("http://{}/wrong-shape", addr), "KEY", None).unwrap();
    assert!(matches!(client.fetch().await, Err(FetchError::InvalidBody(_))));
}

#[tokio::test]
async fn timeout_is_a_transport_error() {
    let addr = spawn_server().await;
    let client = FetchClient::with_timeout(
        &format!("http://{}/slow", addr),
        "KEY",
        None,
        Duration::from_millis(200),
    )
    .unwrap();

    match client.fetch().await {
        Err(FetchError::Transport(e)) => assert!(e.is_timeout()),
        other => panic!("expected timeout, got {:?}", other),
    }
}

#[tokio::test]
async fn connection_refused_is_a_transport_error() {
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    drop(listener);

    let client = FetchClient::new(&format!("http://{}/observations", addr), "KEY", None).unwrap();
    assert!(matches!(client.fetch().await, Err(FetchError::Transport(_))));
}

#[tokio::test]
async fn transport_errors_do_not_leak_api_key() {
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    drop(listener);

    let client =
        FetchClient::new(&format!("http://{}/observations", addr), "SUPERSECRET", None).unwrap();
    let err = client.fetch().await.unwrap_err();
    assert!(matches!(err, FetchError::Transport(_)));
    assert!(!err.to_string().contains("SUPERSECRET"), "{}", err);
    assert!(!format!("{:?}", err).contains("SUPERSECRET"));

    let addr = spawn_server().await;
    let client = FetchClient::with_timeout(
        &format!("http://{}/slow", addr),
        "SUPERSECRET",
        None,
        Duration::from_millis(200),
    )
    .unwrap();
    let err = client.fetch().await.unwrap_err();
    assert!(!err.to_string().contains("SUPERSECRET"), "{}", err);
}
