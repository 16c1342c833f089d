// ── Door locks (V3 only) ──

use serde::{Deserialize, Serialize};
use serde_json::Value;
use strum::{AsRefStr, Display, EnumString};
use tracing::warn;

use simplisafe_api::rest::models::DeviceV3Data;

use super::entity::{Entity, EntityType, flag};

/// Lock position as reported by the panel.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Display, EnumString, AsRefStr,
)]
#[serde(rename_all = "snake_case")]
#[strum(serialize_all = "snake_case")]
pub enum LockState {
    Unlocked,
    Locked,
    Jammed,
    Unknown,
}

impl LockState {
    fn from_code(code: i64) -> Self {
        match code {
            0 => Self::Unlocked,
            1 => Self::Locked,
            2 => Self::Jammed,
            other => {
                warn!(code = other, "unknown lock state");
                Self::Unknown
            }
        }
    }

    pub(crate) fn code(self) -> Option<i64> {
        match self {
            Self::Unlocked => Some(0),
            Self::Locked => Some(1),
            Self::Jammed => Some(2),
            Self::Unknown => None,
        }
    }

    /// Verb the lock endpoint expects.
    pub(crate) fn command(self) -> Option<&'static str> {
        match self {
            Self::Locked => Some("lock"),
            Self::Unlocked => Some("unlock"),
            Self::Jammed | Self::Unknown => None,
        }
    }
}

/// A door lock paired with a V3 panel.
#[derive(Debug, Clone)]
pub struct Lock {
    data: DeviceV3Data,
}

impl Lock {
    pub(crate) fn new(data: DeviceV3Data) -> Self {
        Self { data }
    }

    pub(crate) fn replace(&mut self, data: DeviceV3Data) {
        self.data = data;
    }

    /// Record a confirmed command locally until the next refresh.
    pub(crate) fn set_state(&mut self, state: LockState) {
        if let Some(code) = state.code() {
            self.data.status.insert("lockState".into(), Value::from(code));
            self.data.status.insert("lockJamState".into(), Value::from(0));
        }
    }

    pub fn state(&self) -> LockState {
        if flag(&self.data.status, "lockJamState") {
            return LockState::Jammed;
        }
        match self.data.status.get("lockState").and_then(Value::as_i64) {
            Some(code) => LockState::from_code(code),
            None => LockState::Unknown,
        }
    }

    pub fn disabled(&self) -> bool {
        flag(&self.data.status, "lockDisabled")
    }

    pub fn lock_low_battery(&self) -> bool {
        flag(&self.data.status, "lockLowBattery")
    }

    pub fn pin_pad_low_battery(&self) -> bool {
        flag(&self.data.status, "pinPadLowBattery")
    }

    pub fn pin_pad_offline(&self) -> bool {
        flag(&self.data.status, "pinPadOffline")
    }

    pub fn low_battery(&self) -> bool {
        flag(&self.data.flags, "lowBattery")
    }

    pub fn offline(&self) -> bool {
        flag(&self.data.flags, "offline")
    }
}

impl Entity for Lock {
    fn serial(&self) -> &str {
        &self.data.serial
    }

    fn name(&self) -> &str {
        &self.data.name
    }

    fn entity_type(&self) -> EntityType {
        EntityType::Lock
    }

    fn error(&self) -> bool {
        self.offline() || self.state() == LockState::Jammed
    }
}
