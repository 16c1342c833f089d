// ── Event normalization ──
//
// Event history and realtime frames share one raw shape keyed by a
// contact-ID style `eventCid`. `normalize` maps that onto a closed
// `EventKind` and never fails: anything unrecognized becomes
// `EventKind::Unknown` with the raw payload kept and a warning attached.

use chrono::{DateTime, Utc};
use serde::Serialize;
use serde_json::Value;
use strum::{AsRefStr, Display, EnumString};
use thiserror::Error;
use tracing::warn;

use crate::model::EntityType;

// ── Kinds ────────────────────────────────────────────────────────────

/// What happened.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Display, EnumString, AsRefStr,
)]
#[serde(rename_all = "snake_case")]
#[strum(serialize_all = "snake_case")]
pub enum EventKind {
    AlarmTriggered,
    AlarmCanceled,
    ArmedAway,
    ArmedAwayByKeypad,
    ArmedAwayByRemote,
    ArmedHome,
    AwayExitDelayByKeypad,
    AwayExitDelayByRemote,
    HomeExitDelay,
    DisarmedByMasterPin,
    DisarmedByRemote,
    EntryDelay,
    SensorNotResponding,
    SensorRestored,
    LockLocked,
    LockUnlocked,
    LockJammed,
    ConnectionLost,
    ConnectionRestored,
    PowerOutage,
    PowerRestored,
    CameraMotionDetected,
    Doorbell,
    AutomaticTest,
    Unknown,
}

/// Coarse grouping of [`EventKind`]s.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Display, EnumString, AsRefStr,
)]
#[serde(rename_all = "snake_case")]
#[strum(serialize_all = "snake_case")]
pub enum EventCategory {
    Alarm,
    Arming,
    Disarming,
    EntryDelay,
    ExitDelay,
    SensorTrouble,
    Lock,
    Connectivity,
    Power,
    Activity,
    Unknown,
}

impl EventKind {
    pub fn from_code(code: i64) -> Option<Self> {
        Some(match code {
            1110 | 1120 | 1132 | 1134 | 1154 | 1159 | 1162 => Self::AlarmTriggered,
            1170 => Self::CameraMotionDetected,
            1301 => Self::PowerOutage,
            1350 => Self::ConnectionLost,
            1381 => Self::SensorNotResponding,
            1400 => Self::DisarmedByMasterPin,
            1406 => Self::AlarmCanceled,
            1407 => Self::DisarmedByRemote,
            1429 => Self::EntryDelay,
            1458 => Self::Doorbell,
            1602 => Self::AutomaticTest,
            3301 => Self::PowerRestored,
            3350 => Self::ConnectionRestored,
            3381 => Self::SensorRestored,
            3401 => Self::ArmedAwayByKeypad,
            3407 => Self::ArmedAwayByRemote,
            3441 | 3487 | 3491 => Self::ArmedHome,
            3481 => Self::ArmedAway,
            9401 => Self::AwayExitDelayByKeypad,
            9407 => Self::AwayExitDelayByRemote,
            9441 => Self::HomeExitDelay,
            9700 => Self::LockUnlocked,
            9701 => Self::LockLocked,
            9703 => Self::LockJammed,
            _ => return None,
        })
    }

    pub fn category(self) -> EventCategory {
        match self {
            Self::AlarmTriggered | Self::AlarmCanceled => EventCategory::Alarm,
            Self::ArmedAway | Self::ArmedAwayByKeypad | Self::ArmedAwayByRemote | Self::ArmedHome => {
                EventCategory::Arming
            }
            Self::DisarmedByMasterPin | Self::DisarmedByRemote => EventCategory::Disarming,
            Self::EntryDelay => EventCategory::EntryDelay,
            Self::AwayExitDelayByKeypad | Self::AwayExitDelayByRemote | Self::HomeExitDelay => {
                EventCategory::ExitDelay
            }
            Self::SensorNotResponding | Self::SensorRestored => EventCategory::SensorTrouble,
            Self::LockLocked | Self::LockUnlocked | Self::LockJammed => EventCategory::Lock,
            Self::ConnectionLost | Self::ConnectionRestored => EventCategory::Connectivity,
            Self::PowerOutage | Self::PowerRestored => EventCategory::Power,
            Self::CameraMotionDetected | Self::Doorbell | Self::AutomaticTest => {
                EventCategory::Activity
            }
            Self::Unknown => EventCategory::Unknown,
        }
    }
}

// ── Event ────────────────────────────────────────────────────────────

/// A normalized alarm event.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Event {
    pub kind: EventKind,
    /// The raw `eventCid`, if the payload had one.
    pub code: Option<i64>,
    /// Human-readable description from the backend.
    pub info: String,
    pub system_id: Option<u64>,
    pub timestamp: Option<DateTime<Utc>>,
    /// Name of the PIN that caused the event, if any.
    pub changed_by: Option<String>,
    pub sensor_name: Option<String>,
    pub sensor_serial: Option<String>,
    pub sensor_type: Option<EntityType>,
    #[serde(skip)]
    pub raw: Value,
}

impl Event {
    pub fn category(&self) -> EventCategory {
        self.kind.category()
    }
}

/// Something `normalize` could not map. Never fatal.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum UnknownEventWarning {
    #[error("unknown event code {0}")]
    EventCode(i64),

    #[error("event payload has no event code")]
    MissingCode,

    #[error("unknown sensor type {0}")]
    SensorType(i64),
}

/// Result of [`normalize`].
#[derive(Debug, Clone, PartialEq)]
pub struct Normalized {
    pub event: Event,
    pub warnings: Vec<UnknownEventWarning>,
}

/// Map a raw event payload (history entry or realtime frame).
pub fn normalize(raw: &Value) -> Normalized {
    let mut warnings = Vec::new();

    let code = int(raw, "eventCid");
    let kind = match code {
        Some(code) => EventKind::from_code(code).unwrap_or_else(|| {
            warnings.push(UnknownEventWarning::EventCode(code));
            EventKind::Unknown
        }),
        None => {
            warnings.push(UnknownEventWarning::MissingCode);
            EventKind::Unknown
        }
    };

    let sensor_type = int(raw, "sensorType").and_then(|code| {
        let ty = EntityType::from_code(code);
        if ty.is_none() {
            warnings.push(UnknownEventWarning::SensorType(code));
        }
        ty
    });

    for warning in &warnings {
        warn!(%warning, info = text(raw, "info").as_deref(), "event not fully recognized");
    }

    let event = Event {
        kind,
        code,
        info: text(raw, "info").unwrap_or_default(),
        system_id: int(raw, "sid").and_then(|sid| u64::try_from(sid).ok()),
        timestamp: int(raw, "eventTimestamp").and_then(|ts| DateTime::from_timestamp(ts, 0)),
        changed_by: text(raw, "pinName"),
        sensor_name: text(raw, "sensorName"),
        sensor_serial: text(raw, "sensorSerial"),
        sensor_type,
        raw: raw.clone(),
    };

    Normalized { event, warnings }
}

/// An integer field that may arrive as a number or a numeric string.
fn int(raw: &Value, key: &str) -> Option<i64> {
    match raw.get(key)? {
        Value::Number(n) => n.as_i64(),
        Value::String(s) => s.trim().parse().ok(),
        _ => None,
    }
}

/// A non-empty string field.
fn text(raw: &Value, key: &str) -> Option<String> {
    match raw.get(key)? {
        Value::String(s) if !s.is_empty() => Some(s.clone()),
        Value::Number(n) => Some(n.to_string()),
        _ => None,
    }
}
