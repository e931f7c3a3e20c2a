#![allow(clippy::unwrap_used)]
// Integration tests for `FytaClient` using wiremock.

use std::time::{Duration, Instant};

use secrecy::SecretString;
use serde_json::json;
use url::Url;
use wiremock::matchers::{body_json, header, method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

use fytalink_api::{Error, FytaClient, TransportConfig};

// ── Helpers ─────────────────────────────────────────────────────────

async fn setup() -> (MockServer, FytaClient) {
    setup_with_watchdog(Duration::from_secs(5)).await
}

async fn setup_with_watchdog(watchdog: Duration) -> (MockServer, FytaClient) {
    let server = MockServer::start().await;
    let base_url = Url::parse(&format!("{}/api", server.uri())).unwrap();
    let client = FytaClient::with_client(reqwest::Client::new(), base_url, watchdog);
    (server, client)
}

fn password(s: &str) -> SecretString {
    s.to_string().into()
}

// ── Authentication tests ────────────────────────────────────────────

#[tokio::test]
async fn test_login_success() {
    let (server, client) = setup().await;

    Mock::given(method("POST"))
        .and(path("/api/auth/login"))
        .and(body_json(json!({ "email": "ann@example.com", "password": "hunter2" })))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "access_token": "tok-1",
            "refresh_token": "ref-1",
            "expires_in": 3600,
            "token_type": "bearer"
        })))
        .mount(&server)
        .await;

    let tokens = client
        .authenticate("ann@example.com", &password("hunter2"))
        .await
        .unwrap();

    assert_eq!(tokens.access_token, "tok-1");
    assert_eq!(tokens.refresh_token.as_deref(), Some("ref-1"));
    assert_eq!(tokens.expires_in, Some(3600));
}

#[tokio::test]
async fn test_login_rejected() {
    let (server, client) = setup().await;

    Mock::given(method("POST"))
        .and(path("/api/auth/login"))
        .respond_with(ResponseTemplate::new(401).set_body_string("Unauthorized"))
        .mount(&server)
        .await;

    let result = client
        .authenticate("ann@example.com", &password("wrong"))
        .await;

    assert!(
        matches!(result, Err(Error::Authentication { .. })),
        "expected Authentication error, got: {result:?}"
    );
}

#[tokio::test]
async fn test_login_without_token_is_auth_error() {
    let (server, client) = setup().await;

    Mock::given(method("POST"))
        .and(path("/api/auth/login"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({ "status": "ok" })))
        .mount(&server)
        .await;

    let result = client
        .authenticate("ann@example.com", &password("hunter2"))
        .await;

    match result {
        Err(Error::Authentication { ref message }) => {
            assert!(message.contains("no access token"), "got: {message}");
        }
        other => panic!("expected Authentication error, got: {other:?}"),
    }
}

#[tokio::test]
async fn test_login_hang_hits_watchdog() {
    let (server, client) = setup_with_watchdog(Duration::from_millis(200)).await;

    Mock::given(method("POST"))
        .and(path("/api/auth/login"))
        .respond_with(
            ResponseTemplate::new(200)
                .set_body_json(json!({ "access_token": "late" }))
                .set_delay(Duration::from_secs(30)),
        )
        .mount(&server)
        .await;

    let started = Instant::now();
    let result = client
        .authenticate("ann@example.com", &password("hunter2"))
        .await;

    assert!(
        matches!(result, Err(Error::Timeout { timeout_ms: 200 })),
        "expected Timeout error, got: {result:?}"
    );
    assert!(
        started.elapsed() < Duration::from_secs(5),
        "watchdog took {:?}",
        started.elapsed()
    );
}

#[tokio::test]
async fn test_transport_timeout_reports_its_bound() {
    let server = MockServer::start().await;
    let base_url = Url::parse(&format!("{}/api", server.uri())).unwrap();
    let transport = TransportConfig {
        timeout: Duration::from_millis(150),
        watchdog: Duration::from_secs(5),
    };
    let client = FytaClient::new(base_url, &transport).unwrap();

    Mock::given(method("GET"))
        .and(path("/api/user-plant"))
        .respond_with(
            ResponseTemplate::new(200)
                .set_body_json(json!({ "plants": [] }))
                .set_delay(Duration::from_secs(30)),
        )
        .mount(&server)
        .await;

    let result = client.list_plants("tok-1").await;
    assert!(
        matches!(result, Err(Error::Timeout { timeout_ms: 150 })),
        "expected Timeout error, got: {result:?}"
    );
}

// ── Plant tests ─────────────────────────────────────────────────────

#[tokio::test]
async fn test_list_plants_sends_bearer() {
    let (server, client) = setup().await;

    Mock::given(method("GET"))
        .and(path("/api/user-plant"))
        .and(header("Authorization", "Bearer tok-1"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "plants": [
                {
                    "id": 101,
                    "nickname": "Monstera",
                    "scientific_name": "Monstera deliciosa",
                    "sensor": { "has_sensor": true, "is_battery_low": false }
                },
                {
                    "id": 102,
                    "nickname": "Cactus",
                    "sensor": { "has_sensor": false }
                },
                { "id": 103, "nickname": "Basil" }
            ]
        })))
        .mount(&server)
        .await;

    let plants = client.list_plants("tok-1").await.unwrap();
    assert_eq!(plants.len(), 3);
    assert_eq!(plants[0].id, "101");
    assert_eq!(plants[0].nickname.as_deref(), Some("Monstera"));

    let sensors = client.list_sensors("tok-1").await.unwrap();
    assert_eq!(sensors.len(), 1);
    assert_eq!(sensors[0].id, "101");
}

#[tokio::test]
async fn test_get_sensor_data() {
    let (server, client) = setup().await;

    Mock::given(method("GET"))
        .and(path("/api/user-plant/101"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "plant": {
                "id": 101,
                "nickname": "Monstera",
                "measurements": {
                    "temperature": { "status": 3, "values": { "current": "21.3" } },
                    "moisture": { "status": 1, "values": { "current": 12 } },
                    "salinity": { "status": 0, "values": {} }
                },
                "sensor": { "has_sensor": true, "is_battery_low": true, "battery": 18 }
            }
        })))
        .mount(&server)
        .await;

    let details = client.get_sensor_data("tok-1", "101").await.unwrap();

    assert_eq!(details.id, "101");
    let temp = details.measurements.temperature.unwrap();
    assert_eq!(temp.status, Some(3));
    assert_eq!(temp.values.current, Some(21.3));
    assert_eq!(details.measurements.moisture.unwrap().values.current, Some(12.0));
    assert!(details.measurements.light.is_none());
    assert_eq!(details.measurements.salinity.unwrap().values.current, None);
    let sensor = details.sensor.unwrap();
    assert!(sensor.is_battery_low);
    assert_eq!(sensor.battery, Some(18.0));
}

// ── Error tests ─────────────────────────────────────────────────────

#[tokio::test]
async fn test_expired_token() {
    let (server, client) = setup().await;

    Mock::given(method("GET"))
        .respond_with(ResponseTemplate::new(401))
        .mount(&server)
        .await;

    let result = client.list_plants("stale").await;
    assert!(
        matches!(result, Err(Error::TokenRejected)),
        "expected TokenRejected, got: {result:?}"
    );
}

#[tokio::test]
async fn test_server_error_is_api_error() {
    let (server, client) = setup().await;

    Mock::given(method("GET"))
        .and(path("/api/user-plant/9"))
        .respond_with(ResponseTemplate::new(500).set_body_string("boom"))
        .mount(&server)
        .await;

    let result = client.get_sensor_data("tok-1", "9").await;
    match result {
        Err(Error::Api {
            status,
            ref message,
        }) => {
            assert_eq!(status, 500);
            assert!(message.contains("boom"), "got: {message}");
        }
        other => panic!("expected Api error, got: {other:?}"),
    }
}

#[tokio::test]
async fn test_malformed_body_is_deserialization_error() {
    let (server, client) = setup().await;

    Mock::given(method("GET"))
        .and(path("/api/user-plant"))
        .respond_with(ResponseTemplate::new(200).set_body_string("<html>maintenance</html>"))
        .mount(&server)
        .await;

    let result = client.list_plants("tok-1").await;
    assert!(
        matches!(result, Err(Error::Deserialization { .. })),
        "expected Deserialization error, got: {result:?}"
    );
}
