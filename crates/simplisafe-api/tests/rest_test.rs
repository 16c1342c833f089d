#![allow(clippy::unwrap_used)]
// Integration tests for the REST endpoint methods using wiremock.

use std::sync::Arc;

use chrono::{TimeZone, Utc};
use secrecy::SecretString;
use serde_json::json;
use wiremock::matchers::{body_json, method, path, query_param};
use wiremock::{Mock, MockServer, ResponseTemplate};

use simplisafe_api::{ApiClient, Error, TokenManager, TransportConfig};

const USER_ID: u64 = 12345;
const SYSTEM_ID: u64 = 98765;

// ── Helpers ─────────────────────────────────────────────────────────

/// Start a mock server and return a logged-in client.
async fn setup() -> (MockServer, ApiClient) {
    let server = MockServer::start().await;

    Mock::given(method("POST"))
        .and(path("/v1/api/token"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "access_token": "access",
            "refresh_token": "refresh",
            "expires_in": 3600,
            "token_type": "Bearer"
        })))
        .mount(&server)
        .await;
    Mock::given(method("GET"))
        .and(path("/v1/api/authCheck"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({ "userId": USER_ID })))
        .mount(&server)
        .await;

    let transport = TransportConfig::default()
        .with_base_url(&format!("{}/v1", server.uri()))
        .unwrap();
    let tokens = TokenManager::new(transport).unwrap();
    tokens
        .login("user@example.com", &SecretString::from("pw".to_string()))
        .await
        .unwrap();

    (server, ApiClient::new(Arc::clone(&tokens)))
}

// ── Discovery ───────────────────────────────────────────────────────

#[tokio::test]
async fn test_get_subscriptions() {
    let (server, client) = setup().await;

    Mock::given(method("GET"))
        .and(path(format!("/v1/users/{USER_ID}/subscriptions")))
        .and(query_param("activeOnly", "true"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "subscriptions": [{
                "uid": USER_ID,
                "sid": SYSTEM_ID,
                "location": {
                    "street1": "1234 Main Street",
                    "system": {
                        "serial": "1234ABCD",
                        "alarmState": "OFF",
                        "isAlarming": false,
                        "version": 3,
                        "temperature": 67,
                        "messages": []
                    }
                }
            }]
        })))
        .mount(&server)
        .await;

    let subscriptions = client.get_subscriptions().await.unwrap();
    assert_eq!(subscriptions.len(), 1);
    assert_eq!(subscriptions[0].sid, SYSTEM_ID);
    assert_eq!(subscriptions[0].location.system.alarm_state, "OFF");

    let missing = client.get_subscription(1).await.unwrap();
    assert!(missing.is_none());
}

#[tokio::test]
async fn test_server_error_carries_status_and_body() {
    let (server, client) = setup().await;

    Mock::given(method("GET"))
        .and(path(format!("/v1/users/{USER_ID}/subscriptions")))
        .respond_with(ResponseTemplate::new(503).set_body_string("maintenance"))
        .mount(&server)
        .await;

    let result = client.get_subscriptions().await;
    match result {
        Err(Error::Request {
            endpoint,
            status,
            body,
        }) => {
            assert_eq!(endpoint, format!("users/{USER_ID}/subscriptions"));
            assert_eq!(status, 503);
            assert_eq!(body, "maintenance");
        }
        other => panic!("expected Request error, got: {other:?}"),
    }
}

#[tokio::test]
async fn test_non_json_body_with_multibyte_text() {
    let (server, client) = setup().await;

    let page = format!("{}é<html>maintenance</html>", "x".repeat(199));
    Mock::given(method("GET"))
        .and(path(format!("/v1/users/{USER_ID}/subscriptions")))
        .respond_with(ResponseTemplate::new(200).set_body_string(page.clone()))
        .mount(&server)
        .await;

    let result = client.get_subscriptions().await;
    match result {
        Err(Error::Deserialization { message, body }) => {
            assert!(message.starts_with(&format!("users/{USER_ID}/subscriptions")));
            assert!(!message.contains("<html>"));
            assert_eq!(body, page);
        }
        other => panic!("expected Deserialization error, got: {other:?}"),
    }
}

// ── State commands ──────────────────────────────────────────────────

#[tokio::test]
async fn test_set_state_v3() {
    let (server, client) = setup().await;

    Mock::given(method("POST"))
        .and(path(format!("/v1/ss3/subscriptions/{SYSTEM_ID}/state/home")))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "success": true,
            "reason": null,
            "state": "HOME",
            "lastUpdated": 1_534_725_096,
            "exitDelay": 120
        })))
        .expect(1)
        .mount(&server)
        .await;

    let resp = client.set_state_v3(SYSTEM_ID, "home").await.unwrap();
    assert!(resp.success);
    assert_eq!(resp.reported_state(), Some("HOME"));
    assert_eq!(resp.exit_delay, Some(120));
}

#[tokio::test]
async fn test_set_state_v2_uses_query() {
    let (server, client) = setup().await;

    Mock::given(method("POST"))
        .and(path(format!("/v1/subscriptions/{SYSTEM_ID}/state")))
        .and(query_param("state", "away"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "success": true,
            "requestedState": "away"
        })))
        .expect(1)
        .mount(&server)
        .await;

    let resp = client.set_state_v2(SYSTEM_ID, "away").await.unwrap();
    assert_eq!(resp.reported_state(), Some("away"));
}

#[tokio::test]
async fn test_empty_state_body_is_tolerated() {
    let (server, client) = setup().await;

    Mock::given(method("POST"))
        .and(path(format!("/v1/ss3/subscriptions/{SYSTEM_ID}/state/off")))
        .respond_with(ResponseTemplate::new(200))
        .mount(&server)
        .await;

    let resp = client.set_state_v3(SYSTEM_ID, "off").await.unwrap();
    assert!(!resp.success);
    assert_eq!(resp.reported_state(), None);
}

// ── Devices ─────────────────────────────────────────────────────────

#[tokio::test]
async fn test_sensors_v2_skip_empty_slots() {
    let (server, client) = setup().await;

    Mock::given(method("GET"))
        .and(path(format!("/v1/subscriptions/{SYSTEM_ID}/settings")))
        .and(query_param("settingsType", "all"))
        .and(query_param("cached", "true"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "settings": {
                "general": {},
                "sensors": [
                    {
                        "type": 5,
                        "serial": "195",
                        "name": "Front Door",
                        "setting": 1,
                        "instant": false,
                        "enotify": true,
                        "sensorStatus": 0,
                        "sensorData": 130,
                        "error": false,
                        "entryStatus": "closed"
                    },
                    {},
                    {}
                ]
            }
        })))
        .mount(&server)
        .await;

    let sensors = client.get_sensors_v2(SYSTEM_ID, true).await.unwrap();
    assert_eq!(sensors.len(), 1);
    assert_eq!(sensors[0].serial, "195");
    assert_eq!(sensors[0].sensor_data, 130);
    assert_eq!(sensors[0].entry_status.as_deref(), Some("closed"));
}

#[tokio::test]
async fn test_devices_v3_force_update() {
    let (server, client) = setup().await;

    Mock::given(method("GET"))
        .and(path(format!("/v1/ss3/subscriptions/{SYSTEM_ID}/sensors")))
        .and(query_param("forceUpdate", "true"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "success": true,
            "sensors": [{
                "type": 16,
                "serial": "987",
                "name": "Front Door",
                "setting": { "autoLock": 3 },
                "status": { "lockState": 1, "lockJamState": 0 },
                "flags": { "lowBattery": false, "offline": false }
            }]
        })))
        .mount(&server)
        .await;

    let devices = client.get_devices_v3(SYSTEM_ID, false).await.unwrap();
    assert_eq!(devices.len(), 1);
    assert_eq!(devices[0].device_type, 16);
    assert_eq!(devices[0].status["lockState"], 1);
}

#[tokio::test]
async fn test_lock_command_body() {
    let (server, client) = setup().await;

    Mock::given(method("POST"))
        .and(path(format!("/v1/doorlock/{SYSTEM_ID}/987/state")))
        .and(body_json(json!({ "state": "unlock" })))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({ "success": true })))
        .expect(1)
        .mount(&server)
        .await;

    client.set_lock_state(SYSTEM_ID, "987", "unlock").await.unwrap();
}

// ── Settings ────────────────────────────────────────────────────────

#[tokio::test]
async fn test_settings_v3_round_trip() {
    let (server, client) = setup().await;

    Mock::given(method("POST"))
        .and(path(format!(
            "/v1/ss3/subscriptions/{SYSTEM_ID}/settings/normal"
        )))
        .and(body_json(json!({ "alarmVolume": 1 })))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "settings": {
                "normal": { "alarmVolume": 1, "wifiSSID": "MY_WIFI" },
                "pins": {
                    "master": { "pin": "1234" },
                    "duress": { "pin": "9876" },
                    "users": [{ "name": "Test", "pin": "3456" }]
                }
            },
            "basestationStatus": { "wifiRssi": -43, "backupBattery": 5_293 }
        })))
        .mount(&server)
        .await;

    let resp = client
        .set_settings_v3(SYSTEM_ID, &json!({ "alarmVolume": 1 }))
        .await
        .unwrap();
    let normal = resp.settings.normal.unwrap();
    assert_eq!(normal.alarm_volume, Some(1));
    assert_eq!(normal.wifi_ssid.as_deref(), Some("MY_WIFI"));
    let pins = resp.settings.pins.unwrap();
    assert_eq!(pins.duress.pin, "9876");
    assert_eq!(pins.users[0].name, "Test");
    assert_eq!(resp.basestation_status.unwrap().wifi_rssi, Some(-43));
}

// ── Events ──────────────────────────────────────────────────────────

#[tokio::test]
async fn test_events_query() {
    let (server, client) = setup().await;

    Mock::given(method("GET"))
        .and(path(format!("/v1/subscriptions/{SYSTEM_ID}/events")))
        .and(query_param("numEvents", "2"))
        .and(query_param("fromTimestamp", "1534035861"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "numEvents": 2,
            "lastEventTimestamp": 1_534_035_861,
            "events": [{ "eventCid": 3401 }, { "eventCid": 1400 }]
        })))
        .mount(&server)
        .await;

    let from = Utc.timestamp_opt(1_534_035_861, 0).single().unwrap();
    let resp = client.get_events(SYSTEM_ID, Some(from), 2).await.unwrap();
    assert_eq!(resp.num_events, Some(2));
    assert_eq!(resp.events.len(), 2);
}
