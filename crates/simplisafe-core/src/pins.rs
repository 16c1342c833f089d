// ── PIN table ──
//
// The backend only accepts whole-table writes, so every mutation is:
// fetch the table uncached, apply the change here, post the full payload.
// Two reserved slots (`master`, `duress`) plus up to four labelled user PINs.

use indexmap::IndexMap;
use serde::Serialize;
use serde_json::{Map, Value, json};

use simplisafe_api::rest::models::{PinsV2Response, PinsV3};

use crate::error::PinError;

pub const MASTER: &str = "master";
pub const DURESS: &str = "duress";

/// User PIN slots in addition to master and duress.
pub const MAX_USER_PINS: usize = 4;

const PIN_LENGTH: usize = 4;

/// A snapshot of a system's PINs.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct PinTable {
    master: String,
    duress: String,
    users: IndexMap<String, String>,
}

impl PinTable {
    pub fn master(&self) -> &str {
        &self.master
    }

    /// Empty when no duress PIN is configured.
    pub fn duress(&self) -> &str {
        &self.duress
    }

    /// User PINs by label, in slot order.
    pub fn users(&self) -> &IndexMap<String, String> {
        &self.users
    }

    pub fn get(&self, label: &str) -> Option<&str> {
        match label {
            MASTER => Some(self.master.as_str()),
            DURESS => Some(self.duress.as_str()).filter(|v| !v.is_empty()),
            _ => self.users.get(label).map(String::as_str),
        }
    }

    /// Every configured `(label, pin)`, reserved slots first.
    pub fn iter(&self) -> impl Iterator<Item = (&str, &str)> {
        [(MASTER, self.master.as_str()), (DURESS, self.duress.as_str())]
            .into_iter()
            .filter(|(_, v)| !v.is_empty())
            .chain(self.users.iter().map(|(k, v)| (k.as_str(), v.as_str())))
    }

    /// Set or replace a PIN.
    ///
    /// Reserved and existing labels are updated in place; a new label takes
    /// the next free user slot.
    pub fn set(&mut self, label: &str, value: &str) -> Result<(), PinError> {
        validate(value)?;

        if self.iter().any(|(l, v)| v == value && l != label) {
            return Err(PinError::Duplicate {
                value: value.to_owned(),
            });
        }

        match label {
            MASTER => self.master = value.to_owned(),
            DURESS => self.duress = value.to_owned(),
            _ => {
                if let Some(slot) = self.users.get_mut(label) {
                    value.clone_into(slot);
                } else if self.users.len() >= MAX_USER_PINS {
                    return Err(PinError::LimitReached { max: MAX_USER_PINS });
                } else {
                    self.users.insert(label.to_owned(), value.to_owned());
                }
            }
        }
        Ok(())
    }

    /// Remove a user PIN by label or by value. Returns the removed label.
    ///
    /// Reserved slots are refused whether named directly or matched by value.
    pub fn remove(&mut self, label_or_value: &str) -> Result<String, PinError> {
        let label = self
            .iter()
            .find(|(l, v)| *l == label_or_value || *v == label_or_value)
            .map(|(l, _)| l.to_owned())
            .or_else(|| {
                // A reserved label with no value set still resolves to its slot.
                [MASTER, DURESS]
                    .contains(&label_or_value)
                    .then(|| label_or_value.to_owned())
            })
            .ok_or_else(|| PinError::NotFound(label_or_value.to_owned()))?;

        if label == MASTER || label == DURESS {
            return Err(PinError::Reserved { label });
        }

        self.users.shift_remove(&label);
        Ok(label)
    }

    // ── Wire conversion ──────────────────────────────────────────────

    /// V2 tables key slots `pin1` (master), `duress`, `pin2..pin5`.
    pub(crate) fn from_v2(resp: &PinsV2Response) -> Self {
        let mut table = Self::default();
        for (slot, pin) in &resp.pins {
            match slot.as_str() {
                "pin1" => table.master.clone_from(&pin.value),
                DURESS => table.duress.clone_from(&pin.value),
                _ if !pin.value.is_empty() => {
                    let label = if pin.name.is_empty() { slot } else { &pin.name };
                    table.users.insert(label.clone(), pin.value.clone());
                }
                _ => {}
            }
        }
        table
    }

    pub(crate) fn from_v3(pins: &PinsV3) -> Self {
        Self {
            master: pins.master.pin.clone(),
            duress: pins.duress.pin.clone(),
            users: pins
                .users
                .iter()
                .filter(|u| !u.pin.is_empty())
                .map(|u| (u.name.clone(), u.pin.clone()))
                .collect(),
        }
    }

    /// Full V2 payload; unused user slots are sent blank.
    pub(crate) fn to_v2_payload(&self) -> Value {
        let mut pins = Map::new();
        pins.insert(DURESS.into(), json!({ "value": self.duress }));
        pins.insert("pin1".into(), json!({ "value": self.master }));
        for idx in 0..MAX_USER_PINS {
            let (name, value) = self
                .users
                .get_index(idx)
                .map_or(("", ""), |(n, v)| (n.as_str(), v.as_str()));
            pins.insert(format!("pin{}", idx + 2), json!({ "name": name, "value": value }));
        }
        json!({ "pins": pins })
    }

    /// Full V3 payload; unused user slots are sent blank.
    pub(crate) fn to_v3_payload(&self) -> Value {
        let mut users = Map::new();
        for idx in 0..MAX_USER_PINS {
            let (name, pin) = self
                .users
                .get_index(idx)
                .map_or(("", ""), |(n, v)| (n.as_str(), v.as_str()));
            users.insert(idx.to_string(), json!({ "name": name, "pin": pin }));
        }
        json!({
            "pins": {
                DURESS: { "pin": self.duress },
                MASTER: { "pin": self.master },
                "users": users,
            }
        })
    }
}

fn validate(value: &str) -> Result<(), PinError> {
    if value.len() == PIN_LENGTH && value.bytes().all(|b| b.is_ascii_digit()) {
        Ok(())
    } else {
        Err(PinError::InvalidFormat)
    }
}
