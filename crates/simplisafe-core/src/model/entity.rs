// ── Entity identity ──
//
// Sensors and locks share a serial/name/type identity. The numeric type
// code comes straight from the panel and is mapped onto a closed enum.

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use strum::{AsRefStr, Display, EnumString};
use tracing::warn;

/// Device class reported by the panel.
#[derive(
    Debug,
    Clone,
    Copy,
    PartialEq,
    Eq,
    Hash,
    Serialize,
    Deserialize,
    Display,
    EnumString,
    AsRefStr,
)]
#[serde(rename_all = "snake_case")]
#[strum(serialize_all = "snake_case")]
pub enum EntityType {
    Remote,
    Keypad,
    Keychain,
    PanicButton,
    Motion,
    Entry,
    GlassBreak,
    CarbonMonoxide,
    Smoke,
    Leak,
    Temperature,
    Camera,
    Siren,
    Lock,
    Unknown,
}

impl EntityType {
    /// Map a panel type code. Unrecognized codes return `None`.
    pub fn from_code(code: i64) -> Option<Self> {
        Some(match code {
            0 => Self::Remote,
            1 => Self::Keypad,
            2 => Self::Keychain,
            3 => Self::PanicButton,
            4 => Self::Motion,
            5 => Self::Entry,
            6 => Self::GlassBreak,
            7 => Self::CarbonMonoxide,
            8 => Self::Smoke,
            9 => Self::Leak,
            10 => Self::Temperature,
            12 => Self::Camera,
            13 => Self::Siren,
            16 => Self::Lock,
            _ => return None,
        })
    }

    /// Like [`from_code`](Self::from_code), but logs and falls back to
    /// `Unknown` so an unfamiliar device never fails a whole refresh.
    pub fn from_code_lossy(code: i64, serial: &str) -> Self {
        Self::from_code(code).unwrap_or_else(|| {
            warn!(code, serial, "unknown entity type");
            Self::Unknown
        })
    }

    /// The panel type code, if this type has one.
    pub fn code(self) -> Option<i64> {
        Some(match self {
            Self::Remote => 0,
            Self::Keypad => 1,
            Self::Keychain => 2,
            Self::PanicButton => 3,
            Self::Motion => 4,
            Self::Entry => 5,
            Self::GlassBreak => 6,
            Self::CarbonMonoxide => 7,
            Self::Smoke => 8,
            Self::Leak => 9,
            Self::Temperature => 10,
            Self::Camera => 12,
            Self::Siren => 13,
            Self::Lock => 16,
            Self::Unknown => return None,
        })
    }
}

/// Identity shared by every sensor and lock.
pub trait Entity {
    fn serial(&self) -> &str;
    fn name(&self) -> &str;
    fn entity_type(&self) -> EntityType;
    /// Whether the device currently reports a fault.
    fn error(&self) -> bool;
}

pub(crate) fn flag(map: &Map<String, Value>, key: &str) -> bool {
    match map.get(key) {
        Some(Value::Bool(b)) => *b,
        Some(Value::Number(n)) => n.as_i64().is_some_and(|n| n != 0),
        _ => false,
    }
}
