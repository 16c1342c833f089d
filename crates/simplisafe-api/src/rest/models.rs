// REST response types
//
// Wire models for the SimpliSafe mobile API. The backend is inconsistent
// about field presence across hardware generations and firmware, so fields
// use `#[serde(default)]` liberally and unknown fields land in `extra`.

use std::collections::BTreeMap;

use serde::{Deserialize, Deserializer, Serialize};
use serde_json::{Map, Value};

// ── Subscriptions ────────────────────────────────────────────────────

/// `GET users/{uid}/subscriptions` response.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SubscriptionsResponse {
    #[serde(default)]
    pub subscriptions: Vec<Subscription>,
}

/// One monitored location (a "subscription" in backend terms).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Subscription {
    pub sid: u64,
    #[serde(default)]
    pub uid: Option<u64>,
    pub location: Location,
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Location {
    #[serde(default)]
    pub street1: Option<String>,
    pub system: LocationSystem,
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

/// Panel summary embedded in each subscription's location.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct LocationSystem {
    pub serial: String,
    #[serde(default)]
    pub alarm_state: String,
    #[serde(default)]
    pub is_alarming: bool,
    pub version: u8,
    #[serde(default)]
    pub conn_type: Option<String>,
    #[serde(default)]
    pub temperature: Option<f64>,
    #[serde(default)]
    pub is_offline: Option<bool>,
    #[serde(default)]
    pub power_outage: Option<bool>,
    #[serde(default)]
    pub messages: Vec<SystemMessage>,
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

/// A notification attached to a system (`location.system.messages`).
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SystemMessage {
    #[serde(deserialize_with = "string_or_number")]
    pub id: String,
    #[serde(default)]
    pub text: String,
    #[serde(default)]
    pub category: String,
    #[serde(default, deserialize_with = "string_or_number")]
    pub code: String,
    #[serde(default)]
    pub timestamp: i64,
    #[serde(default)]
    pub link: Option<String>,
    #[serde(default)]
    pub link_label: Option<String>,
}

// ── V2 settings & sensors ────────────────────────────────────────────

/// `GET subscriptions/{sid}/settings` response (V2 panels).
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct SettingsV2Response {
    #[serde(default)]
    pub settings: SettingsV2,
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct SettingsV2 {
    #[serde(default)]
    pub general: Map<String, Value>,
    /// Slot list; unused slots come back as empty objects.
    #[serde(default)]
    pub sensors: Vec<Value>,
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

/// A V2 sensor record. Most values are raw panel integers.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SensorV2Data {
    #[serde(rename = "type")]
    pub sensor_type: i64,
    pub serial: String,
    #[serde(default)]
    pub name: String,
    #[serde(default)]
    pub sensor_data: i64,
    #[serde(default)]
    pub setting: i64,
    #[serde(default)]
    pub instant: bool,
    #[serde(default)]
    pub error: bool,
    #[serde(default)]
    pub battery: Option<String>,
    #[serde(default)]
    pub entry_status: Option<String>,
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

// ── V3 sensors & settings ────────────────────────────────────────────

/// `GET ss3/subscriptions/{sid}/sensors` response.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct SensorsV3Response {
    #[serde(default)]
    pub sensors: Vec<DeviceV3Data>,
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

/// A V3 device record: sensors and locks share this shape.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DeviceV3Data {
    #[serde(rename = "type")]
    pub device_type: i64,
    pub serial: String,
    #[serde(default)]
    pub name: String,
    #[serde(default)]
    pub setting: Map<String, Value>,
    #[serde(default)]
    pub status: Map<String, Value>,
    #[serde(default)]
    pub flags: Map<String, Value>,
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

/// `GET/POST ss3/subscriptions/{sid}/settings/normal` response.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SettingsV3Response {
    #[serde(default)]
    pub settings: SettingsV3,
    #[serde(default)]
    pub basestation_status: Option<BasestationStatus>,
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct SettingsV3 {
    #[serde(default)]
    pub normal: Option<NormalSettings>,
    #[serde(default)]
    pub pins: Option<PinsV3>,
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

/// The "normal" (non-PIN) panel settings.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct NormalSettings {
    #[serde(default, rename = "wifiSSID")]
    pub wifi_ssid: Option<String>,
    #[serde(default)]
    pub alarm_duration: Option<u64>,
    #[serde(default)]
    pub alarm_volume: Option<u8>,
    #[serde(default)]
    pub door_chime: Option<u8>,
    #[serde(default)]
    pub voice_prompts: Option<u8>,
    #[serde(default)]
    pub entry_delay_away: Option<u64>,
    #[serde(default)]
    pub entry_delay_home: Option<u64>,
    #[serde(default)]
    pub exit_delay_away: Option<u64>,
    #[serde(default)]
    pub exit_delay_home: Option<u64>,
    #[serde(default)]
    pub light: Option<bool>,
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct BasestationStatus {
    #[serde(default)]
    pub backup_battery: Option<i64>,
    #[serde(default)]
    pub gsm_rssi: Option<i64>,
    #[serde(default)]
    pub wifi_rssi: Option<i64>,
    #[serde(default)]
    pub wall_power: Option<i64>,
    #[serde(default)]
    pub rf_jamming: Option<bool>,
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

// ── PINs ─────────────────────────────────────────────────────────────

/// V3 PIN table as embedded in the settings payload.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct PinsV3 {
    #[serde(default)]
    pub master: PinSlotV3,
    #[serde(default)]
    pub duress: PinSlotV3,
    #[serde(default)]
    pub users: Vec<PinSlotV3>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct PinSlotV3 {
    #[serde(default)]
    pub name: String,
    #[serde(default)]
    pub pin: String,
}

/// `GET subscriptions/{sid}/pins` response (V2 panels).
///
/// Keyed by slot: `pin1` is the master PIN, `duress`, then `pin2..pin5`.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct PinsV2Response {
    #[serde(default)]
    pub pins: BTreeMap<String, PinSlotV2>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct PinSlotV2 {
    #[serde(default)]
    pub name: String,
    #[serde(default)]
    pub value: String,
}

// ── Commands ─────────────────────────────────────────────────────────

/// Response to an arm/disarm command (both generations).
///
/// V2 panels echo `requestedState`; V3 panels report the resulting `state`.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct StateResponse {
    #[serde(default)]
    pub success: bool,
    #[serde(default)]
    pub reason: Option<String>,
    #[serde(default)]
    pub state: Option<String>,
    #[serde(default)]
    pub requested_state: Option<String>,
    #[serde(default)]
    pub exit_delay: Option<u64>,
    #[serde(default)]
    pub last_updated: Option<i64>,
}

impl StateResponse {
    /// The state the panel reports after the command, whichever field
    /// this panel generation uses. `None` unless the command succeeded:
    /// a failed V2 reply still echoes `requestedState`.
    pub fn reported_state(&self) -> Option<&str> {
        if !self.success {
            return None;
        }
        self.state.as_deref().or(self.requested_state.as_deref())
    }
}

// ── Events ───────────────────────────────────────────────────────────

/// `GET subscriptions/{sid}/events` response. Events stay raw so the
/// normalizer can keep unknown payloads intact.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct EventsResponse {
    #[serde(default)]
    pub num_events: Option<u64>,
    #[serde(default)]
    pub last_event_timestamp: Option<i64>,
    #[serde(default)]
    pub events: Vec<Value>,
}

// ── Helpers ──────────────────────────────────────────────────────────

/// Accept either a JSON string or number, yielding a string.
fn string_or_number<'de, D>(deserializer: D) -> Result<String, D::Error>
where
    D: Deserializer<'de>,
{
    match Value::deserialize(deserializer)? {
        Value::String(s) => Ok(s),
        Value::Number(n) => Ok(n.to_string()),
        Value::Null => Ok(String::new()),
        other => Err(serde::de::Error::custom(format!(
            "expected string or number, got {other}"
        ))),
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn subscription_tolerates_missing_optional_fields() {
        let raw = json!({
            "subscriptions": [{
                "uid": 12345,
                "sid": 98765,
                "sStatus": 20,
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
        });

        let resp: SubscriptionsResponse = serde_json::from_value(raw).unwrap();
        let sub = &resp.subscriptions[0];
        assert_eq!(sub.sid, 98765);
        assert_eq!(sub.location.system.version, 3);
        assert_eq!(sub.location.system.conn_type, None);
        assert!(sub.extra.contains_key("sStatus"));
    }

    #[test]
    fn message_ids_may_be_numeric() {
        let msg: SystemMessage = serde_json::from_value(json!({
            "id": 42,
            "text": "Power outage",
            "category": "error",
            "code": 2000,
            "timestamp": 1_581_892_842
        }))
        .unwrap();
        assert_eq!(msg.id, "42");
        assert_eq!(msg.code, "2000");
        assert_eq!(msg.link, None);
    }

    #[test]
    fn state_response_prefers_reported_state() {
        let v3: StateResponse =
            serde_json::from_value(json!({ "success": true, "state": "HOME", "exitDelay": 120 }))
                .unwrap();
        assert_eq!(v3.reported_state(), Some("HOME"));

        let v2: StateResponse =
            serde_json::from_value(json!({ "success": true, "requestedState": "away" })).unwrap();
        assert_eq!(v2.reported_state(), Some("away"));

        let failed: StateResponse = serde_json::from_value(
            json!({ "success": false, "reason": "Sensor open", "requestedState": "away" }),
        )
        .unwrap();
        assert_eq!(failed.reported_state(), None);
    }
}
