#![allow(clippy::unwrap_used)]
// End-to-end tests for the facade and system model against a mock backend.

use std::time::Duration;

use pretty_assertions::assert_eq;
use secrecy::{ExposeSecret, SecretString};
use serde_json::{Value, json};
use wiremock::matchers::{body_json, body_string_contains, method, path, query_param};
use wiremock::{Mock, MockServer, ResponseTemplate};

use simplisafe_core::{
    AlarmSystem, ClientConfig, CoreError, Entity, EventKind, LockState, PinError, SimpliSafe,
    System, SystemState, Volume,
};

const USER_ID: u64 = 12345;
const SYSTEM_ID: u64 = 98765;

// ── Helpers ─────────────────────────────────────────────────────────

async fn setup(expires_in: i64) -> MockServer {
    let server = MockServer::start().await;

    Mock::given(method("POST"))
        .and(path("/v1/api/token"))
        .and(body_string_contains("grant_type=password"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "access_token": "a1",
            "refresh_token": "r1",
            "expires_in": expires_in,
            "token_type": "Bearer"
        })))
        .mount(&server)
        .await;
    Mock::given(method("GET"))
        .and(path("/v1/api/authCheck"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({ "userId": USER_ID })))
        .mount(&server)
        .await;

    server
}

fn config(server: &MockServer) -> ClientConfig {
    let mut config = ClientConfig::default()
        .with_api_base_url(&format!("{}/v1", server.uri()))
        .unwrap();
    config.confirm_timeout = Duration::from_millis(500);
    config.poll_interval = Duration::from_millis(20);
    config
}

async fn login(server: &MockServer) -> SimpliSafe {
    SimpliSafe::login_via_credentials(
        "user@example.com",
        &SecretString::from("hunter2".to_string()),
        config(server),
    )
    .await
    .unwrap()
}

fn subscriptions(version: u8, alarm_state: &str) -> Value {
    json!({
        "subscriptions": [{
            "uid": USER_ID,
            "sid": SYSTEM_ID,
            "location": {
                "street1": "1234 Main Street",
                "system": {
                    "serial": "1234ABCD",
                    "alarmState": alarm_state,
                    "isAlarming": false,
                    "version": version,
                    "connType": "wifi",
                    "temperature": 67,
                    "messages": []
                }
            }
        }]
    })
}

/// Subscription listing; `times` bounds how often it answers before later
/// mounts take over.
async fn mount_subscriptions(server: &MockServer, body: Value, times: Option<u64>) {
    let mock = Mock::given(method("GET"))
        .and(path(format!("/v1/users/{USER_ID}/subscriptions")))
        .respond_with(ResponseTemplate::new(200).set_body_json(body));
    let mock = match times {
        Some(n) => mock.up_to_n_times(n),
        None => mock,
    };
    mock.mount(server).await;
}

fn settings_v3(pins: &Value) -> Value {
    json!({
        "account": USER_ID,
        "settings": {
            "normal": {
                "wifiSSID": "MY_WIFI",
                "alarmDuration": 240,
                "alarmVolume": 3,
                "doorChime": 2,
                "entryDelayAway": 30,
                "entryDelayHome": 30,
                "exitDelayAway": 60,
                "exitDelayHome": 0,
                "light": true,
                "voicePrompts": 2
            },
            "pins": pins
        },
        "basestationStatus": {
            "backupBattery": 5_293,
            "wallPower": 5_933,
            "wifiRssi": -43,
            "gsmRssi": -73,
            "rfJamming": false
        }
    })
}

fn pins_v3() -> Value {
    json!({
        "master": { "pin": "1234" },
        "duress": { "pin": "9876" },
        "users": [
            { "name": "Test 1", "pin": "3456" },
            { "name": "Test 2", "pin": "5423" },
            { "name": "", "pin": "" },
            { "name": "", "pin": "" }
        ]
    })
}

async fn mount_v3_details(server: &MockServer) {
    Mock::given(method("GET"))
        .and(path(format!("/v1/ss3/subscriptions/{SYSTEM_ID}/settings/normal")))
        .respond_with(ResponseTemplate::new(200).set_body_json(settings_v3(&pins_v3())))
        .mount(server)
        .await;
    Mock::given(method("GET"))
        .and(path(format!("/v1/ss3/subscriptions/{SYSTEM_ID}/sensors")))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "success": true,
            "sensors": [
                {
                    "type": 5, "serial": "825", "name": "Front Door",
                    "setting": { "instantTrigger": false },
                    "status": { "triggered": false },
                    "flags": { "lowBattery": false, "offline": false }
                },
                {
                    "type": 10, "serial": "320", "name": "Freezer",
                    "status": { "temperature": 12 },
                    "flags": { "lowBattery": false, "offline": false }
                },
                {
                    "type": 16, "serial": "987", "name": "Front Door Lock",
                    "status": { "lockState": 1, "lockJamState": 0, "pinPadOffline": false },
                    "flags": { "lowBattery": false, "offline": false }
                }
            ]
        })))
        .mount(server)
        .await;
}

async fn v3_system(server: &MockServer, alarm_state: &str) -> (SimpliSafe, System) {
    mount_subscriptions(server, subscriptions(3, alarm_state), None).await;
    mount_v3_details(server).await;
    let simplisafe = login(server).await;
    let mut systems = simplisafe.get_systems().await.unwrap();
    let system = systems.remove(&SYSTEM_ID).unwrap();
    (simplisafe, system)
}

async fn mount_state_v3(server: &MockServer, target: &str, body: Value, times: u64) {
    Mock::given(method("POST"))
        .and(path(format!("/v1/ss3/subscriptions/{SYSTEM_ID}/state/{target}")))
        .respond_with(ResponseTemplate::new(200).set_body_json(body))
        .expect(times)
        .mount(server)
        .await;
}

// ── Discovery ───────────────────────────────────────────────────────

#[tokio::test]
async fn test_get_systems_v3() {
    let server = setup(3600).await;
    let (_simplisafe, system) = v3_system(&server, "OFF").await;

    assert_eq!(system.system_id(), SYSTEM_ID);
    assert_eq!(system.version(), 3);
    assert_eq!(system.state(), SystemState::Off);
    assert_eq!(system.address(), Some("1234 Main Street"));

    let v3 = system.as_v3().unwrap();
    assert_eq!(v3.sensors().len(), 2);
    assert_eq!(v3.locks().len(), 1);
    assert_eq!(v3.sensor("320").unwrap().temperature(), Some(12.0));
    assert_eq!(v3.lock_by_serial("987").unwrap().state(), LockState::Locked);
    assert_eq!(v3.alarm_volume(), Some(Volume::High));
    assert_eq!(v3.wifi_ssid(), Some("MY_WIFI"));
    assert_eq!(v3.entry_delay_away(), Some(Duration::from_secs(30)));
    assert!(system.as_v2().is_none());
}

#[tokio::test]
async fn test_get_systems_v2() {
    let server = setup(3600).await;
    mount_subscriptions(&server, subscriptions(2, "AWAY"), None).await;
    Mock::given(method("GET"))
        .and(path(format!("/v1/subscriptions/{SYSTEM_ID}/settings")))
        .and(query_param("settingsType", "all"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "settings": {
                "general": {},
                "sensors": [
                    {
                        "type": 5, "serial": "195", "name": "Front Door",
                        "setting": 1, "instant": false, "sensorData": 130,
                        "error": false, "entryStatus": "closed"
                    },
                    {
                        "type": 1, "serial": "609", "name": "Keypad",
                        "setting": 1, "instant": false, "sensorData": 0,
                        "error": false, "battery": "ok"
                    },
                    {}
                ]
            }
        })))
        .mount(&server)
        .await;

    let simplisafe = login(&server).await;
    let systems = simplisafe.get_systems().await.unwrap();
    let system = &systems[&SYSTEM_ID];

    assert_eq!(system.state(), SystemState::Away);
    let v2 = system.as_v2().unwrap();
    assert_eq!(v2.sensors().len(), 2);
    assert_eq!(v2.sensor("195").unwrap().triggered(), Some(false));
    assert_eq!(v2.sensor("609").unwrap().triggered(), None);
    assert_eq!(v2.sensor("609").unwrap().name(), "Keypad");
}

#[tokio::test]
async fn test_unsupported_version_is_an_error() {
    let server = setup(3600).await;
    mount_subscriptions(&server, subscriptions(1, "OFF"), None).await;

    let simplisafe = login(&server).await;
    let result = simplisafe.get_systems().await;
    assert!(
        matches!(
            result,
            Err(CoreError::UnsupportedSystemVersion {
                system_id: SYSTEM_ID,
                version: 1
            })
        ),
        "expected UnsupportedSystemVersion, got: {result:?}"
    );
}

#[tokio::test]
async fn test_mid_session_expiry_refreshes_transparently() {
    let server = setup(0).await;
    Mock::given(method("POST"))
        .and(path("/v1/api/token"))
        .and(body_string_contains("grant_type=refresh_token"))
        .and(body_string_contains("refresh_token=r1"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "access_token": "a2",
            "refresh_token": "r2",
            "expires_in": 3600,
            "token_type": "Bearer"
        })))
        .expect(1)
        .mount(&server)
        .await;
    mount_subscriptions(&server, subscriptions(3, "OFF"), None).await;
    mount_v3_details(&server).await;

    let simplisafe = login(&server).await;
    assert!(!simplisafe.is_refresh_token_dirty());

    let systems = simplisafe.get_systems().await.unwrap();
    assert_eq!(systems.len(), 1);
    assert!(simplisafe.is_refresh_token_dirty());
    assert_eq!(simplisafe.refresh_token().unwrap().expose_secret(), "r2");
}

#[tokio::test]
async fn test_login_via_revoked_token() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/v1/api/token"))
        .respond_with(ResponseTemplate::new(401))
        .mount(&server)
        .await;

    let result =
        SimpliSafe::login_via_token(&SecretString::from("stale".to_string()), config(&server))
            .await;
    let err = result.unwrap_err();
    assert!(err.requires_login(), "expected a login error, got: {err:?}");
}

// ── Arming ──────────────────────────────────────────────────────────

#[tokio::test]
async fn test_set_home_confirmed_by_response() {
    let server = setup(3600).await;
    let (_simplisafe, mut system) = v3_system(&server, "OFF").await;
    mount_state_v3(
        &server,
        "home",
        json!({ "success": true, "reason": null, "state": "HOME", "exitDelay": 0 }),
        1,
    )
    .await;

    system.set_home().await.unwrap();
    assert_eq!(system.state(), SystemState::Home);
}

#[tokio::test]
async fn test_set_away_confirmed_by_polling() {
    let server = setup(3600).await;
    // Discovery sees OFF once; every later poll sees the exit countdown.
    mount_subscriptions(&server, subscriptions(3, "OFF"), Some(1)).await;
    mount_subscriptions(&server, subscriptions(3, "AWAY_COUNT"), None).await;
    mount_v3_details(&server).await;
    mount_state_v3(&server, "away", json!({ "success": true }), 1).await;

    let simplisafe = login(&server).await;
    let mut system = simplisafe.get_systems().await.unwrap().remove(&SYSTEM_ID).unwrap();
    assert_eq!(system.state(), SystemState::Off);

    system.set_away().await.unwrap();
    assert_eq!(system.state(), SystemState::AwayCount);
}

#[tokio::test]
async fn test_set_away_when_already_away() {
    let server = setup(3600).await;
    let (_simplisafe, mut system) = v3_system(&server, "AWAY").await;
    // The command is still sent; the response repeats the current state.
    mount_state_v3(&server, "away", json!({ "success": true, "state": "AWAY" }), 1).await;

    system.set_away().await.unwrap();
    assert_eq!(system.state(), SystemState::Away);
}

#[tokio::test]
async fn test_arming_times_out() {
    let server = setup(3600).await;
    let (_simplisafe, mut system) = v3_system(&server, "OFF").await;
    mount_state_v3(&server, "home", json!({ "success": true }), 1).await;

    let result = system.set_home().await;
    match result {
        Err(CoreError::CommandTimeout { target, timeout }) => {
            assert_eq!(target, "home");
            assert_eq!(timeout, Duration::from_millis(500));
        }
        other => panic!("expected CommandTimeout, got: {other:?}"),
    }
    assert_eq!(system.state(), SystemState::Off);
}

#[tokio::test]
async fn test_arming_rejected() {
    let server = setup(3600).await;
    let (_simplisafe, mut system) = v3_system(&server, "OFF").await;
    mount_state_v3(
        &server,
        "away",
        json!({ "success": false, "reason": "Sensor open: Front Door" }),
        1,
    )
    .await;

    let result = system.set_away().await;
    assert!(
        matches!(&result, Err(CoreError::CommandRejected { message }) if message.contains("Front Door")),
        "expected CommandRejected, got: {result:?}"
    );
}

#[tokio::test]
async fn test_set_off_v2() {
    let server = setup(3600).await;
    mount_subscriptions(&server, subscriptions(2, "HOME"), None).await;
    Mock::given(method("GET"))
        .and(path(format!("/v1/subscriptions/{SYSTEM_ID}/settings")))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({ "settings": { "sensors": [] } })))
        .mount(&server)
        .await;
    Mock::given(method("POST"))
        .and(path(format!("/v1/subscriptions/{SYSTEM_ID}/state")))
        .and(query_param("state", "off"))
        .respond_with(
            ResponseTemplate::new(200).set_body_json(json!({ "success": true, "requestedState": "off" })),
        )
        .expect(1)
        .mount(&server)
        .await;

    let simplisafe = login(&server).await;
    let mut system = simplisafe.get_systems().await.unwrap().remove(&SYSTEM_ID).unwrap();
    system.set_off().await.unwrap();
    assert_eq!(system.state(), SystemState::Off);
}

#[tokio::test]
async fn test_failed_v2_command_is_not_confirmed_by_echo() {
    let server = setup(3600).await;
    mount_subscriptions(&server, subscriptions(2, "OFF"), None).await;
    Mock::given(method("GET"))
        .and(path(format!("/v1/subscriptions/{SYSTEM_ID}/settings")))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({ "settings": { "sensors": [] } })))
        .mount(&server)
        .await;
    // The backend echoes the requested state even though arming failed.
    Mock::given(method("POST"))
        .and(path(format!("/v1/subscriptions/{SYSTEM_ID}/state")))
        .and(query_param("state", "away"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "success": false,
            "reason": "Sensor open",
            "requestedState": "away"
        })))
        .expect(1)
        .mount(&server)
        .await;

    let simplisafe = login(&server).await;
    let mut system = simplisafe.get_systems().await.unwrap().remove(&SYSTEM_ID).unwrap();

    let result = system.set_away().await;
    assert!(
        matches!(&result, Err(CoreError::CommandRejected { message }) if message == "Sensor open"),
        "expected CommandRejected, got: {result:?}"
    );
    assert_eq!(system.state(), SystemState::Off);
}

#[tokio::test]
async fn test_failed_command_without_reason_polls() {
    let server = setup(3600).await;
    let (_simplisafe, mut system) = v3_system(&server, "OFF").await;
    mount_state_v3(&server, "home", json!({ "success": false, "state": "HOME" }), 1).await;

    // Subscriptions still report OFF, so the echoed HOME must not confirm.
    let result = system.set_home().await;
    assert!(
        matches!(result, Err(CoreError::CommandTimeout { .. })),
        "expected CommandTimeout, got: {result:?}"
    );
    assert_eq!(system.state(), SystemState::Off);
}

// ── PINs ────────────────────────────────────────────────────────────

#[tokio::test]
async fn test_pin_round_trip_v3() {
    let server = setup(3600).await;
    let (_simplisafe, mut system) = v3_system(&server, "OFF").await;

    let with_new_pin = json!({
        "master": { "pin": "1234" },
        "duress": { "pin": "9876" },
        "users": [
            { "name": "Test 1", "pin": "3456" },
            { "name": "Test 2", "pin": "5423" },
            { "name": "whatever", "pin": "1275" },
            { "name": "", "pin": "" }
        ]
    });

    // Uncached reads: the original table once, then the table with the new PIN.
    Mock::given(method("GET"))
        .and(path(format!("/v1/ss3/subscriptions/{SYSTEM_ID}/settings/normal")))
        .and(query_param("forceUpdate", "true"))
        .respond_with(ResponseTemplate::new(200).set_body_json(settings_v3(&pins_v3())))
        .up_to_n_times(1)
        .with_priority(1)
        .mount(&server)
        .await;
    Mock::given(method("GET"))
        .and(path(format!("/v1/ss3/subscriptions/{SYSTEM_ID}/settings/normal")))
        .and(query_param("forceUpdate", "true"))
        .respond_with(ResponseTemplate::new(200).set_body_json(settings_v3(&with_new_pin)))
        .with_priority(2)
        .mount(&server)
        .await;

    let pins_path = format!("/v1/ss3/subscriptions/{SYSTEM_ID}/settings/pins");
    Mock::given(method("POST"))
        .and(path(pins_path.as_str()))
        .and(body_json(json!({
            "pins": {
                "duress": { "pin": "9876" },
                "master": { "pin": "1234" },
                "users": {
                    "0": { "name": "Test 1", "pin": "3456" },
                    "1": { "name": "Test 2", "pin": "5423" },
                    "2": { "name": "whatever", "pin": "1275" },
                    "3": { "name": "", "pin": "" }
                }
            }
        })))
        .respond_with(ResponseTemplate::new(200).set_body_json(settings_v3(&with_new_pin)))
        .expect(1)
        .mount(&server)
        .await;
    Mock::given(method("POST"))
        .and(path(pins_path.as_str()))
        .and(body_json(json!({
            "pins": {
                "duress": { "pin": "9876" },
                "master": { "pin": "1234" },
                "users": {
                    "0": { "name": "Test 1", "pin": "3456" },
                    "1": { "name": "Test 2", "pin": "5423" },
                    "2": { "name": "", "pin": "" },
                    "3": { "name": "", "pin": "" }
                }
            }
        })))
        .respond_with(ResponseTemplate::new(200).set_body_json(settings_v3(&pins_v3())))
        .expect(1)
        .mount(&server)
        .await;

    system.set_pin("whatever", "1275").await.unwrap();
    let removed = system.remove_pin("1275").await.unwrap();
    assert_eq!(removed, "whatever");
}

#[tokio::test]
async fn test_reserved_pins_are_refused_without_posting() {
    let server = setup(3600).await;
    let (_simplisafe, mut system) = v3_system(&server, "OFF").await;
    Mock::given(method("POST"))
        .and(path(format!("/v1/ss3/subscriptions/{SYSTEM_ID}/settings/pins")))
        .respond_with(ResponseTemplate::new(200))
        .expect(0)
        .mount(&server)
        .await;

    let pins = system.get_pins(true).await.unwrap();
    assert_eq!(pins.master(), "1234");
    assert_eq!(pins.users().len(), 2);

    let result = system.remove_pin("master").await;
    assert!(matches!(
        result,
        Err(CoreError::Pin(PinError::Reserved { ref label })) if label == "master"
    ));
    let result = system.set_pin("new", "3456").await;
    assert!(matches!(result, Err(CoreError::Pin(PinError::Duplicate { .. }))));
}

// ── Locks & settings ────────────────────────────────────────────────

#[tokio::test]
async fn test_unlock() {
    let server = setup(3600).await;
    let (_simplisafe, mut system) = v3_system(&server, "OFF").await;
    Mock::given(method("POST"))
        .and(path(format!("/v1/doorlock/{SYSTEM_ID}/987/state")))
        .and(body_json(json!({ "state": "unlock" })))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({})))
        .expect(1)
        .mount(&server)
        .await;

    let v3 = system.as_v3_mut().unwrap();
    v3.unlock("987").await.unwrap();
    assert_eq!(v3.lock_by_serial("987").unwrap().state(), LockState::Unlocked);
}

#[tokio::test]
async fn test_set_alarm_volume() {
    let server = setup(3600).await;
    let (_simplisafe, mut system) = v3_system(&server, "OFF").await;

    let mut updated = settings_v3(&pins_v3());
    updated["settings"]["normal"]["alarmVolume"] = json!(1);
    Mock::given(method("POST"))
        .and(path(format!("/v1/ss3/subscriptions/{SYSTEM_ID}/settings/normal")))
        .and(body_json(json!({ "alarmVolume": 1 })))
        .respond_with(ResponseTemplate::new(200).set_body_json(updated))
        .expect(1)
        .mount(&server)
        .await;

    let v3 = system.as_v3_mut().unwrap();
    v3.set_alarm_volume(Volume::Low).await.unwrap();
    assert_eq!(v3.alarm_volume(), Some(Volume::Low));
}

// ── Events ──────────────────────────────────────────────────────────

#[tokio::test]
async fn test_events_are_normalized() {
    let server = setup(3600).await;
    let (_simplisafe, system) = v3_system(&server, "OFF").await;
    Mock::given(method("GET"))
        .and(path(format!("/v1/subscriptions/{SYSTEM_ID}/events")))
        .and(query_param("numEvents", "50"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "numEvents": 2,
            "lastEventTimestamp": 1_534_035_861,
            "events": [
                {
                    "eventTimestamp": 1_534_720_376,
                    "eventCid": 3401,
                    "sensorType": 1,
                    "sensorSerial": "123",
                    "sid": SYSTEM_ID,
                    "info": "System Armed (Away) by Keypad Garage Keypad",
                    "pinName": "",
                    "sensorName": "Garage Keypad"
                },
                {
                    "eventTimestamp": 1_534_702_778,
                    "eventCid": 4242,
                    "sid": SYSTEM_ID,
                    "info": "Something new"
                }
            ]
        })))
        .mount(&server)
        .await;

    let events = system.get_events(None, None).await.unwrap();
    assert_eq!(events.len(), 2);
    assert_eq!(events[0].kind, EventKind::ArmedAwayByKeypad);
    assert_eq!(events[0].sensor_name.as_deref(), Some("Garage Keypad"));
    assert_eq!(events[1].kind, EventKind::Unknown);
    assert_eq!(events[1].raw["info"], "Something new");
}

#[tokio::test]
async fn test_latest_event_when_none() {
    let server = setup(3600).await;
    let (_simplisafe, system) = v3_system(&server, "OFF").await;
    Mock::given(method("GET"))
        .and(path(format!("/v1/subscriptions/{SYSTEM_ID}/events")))
        .and(query_param("numEvents", "1"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({ "numEvents": 0, "events": [] })))
        .mount(&server)
        .await;

    let result = system.get_latest_event().await;
    assert!(matches!(result, Err(CoreError::NoEvents { system_id: SYSTEM_ID })));
}
