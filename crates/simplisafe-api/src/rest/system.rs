// System state and settings endpoints
//
// V2 panels live under `subscriptions/{sid}/...`, V3 panels under
// `ss3/subscriptions/{sid}/...`. The two generations disagree on almost
// every shape, so each gets its own method.

use serde_json::Value;
use tracing::debug;

use crate::error::Error;
use crate::rest::client::ApiClient;
use crate::rest::models::{SettingsV2Response, SettingsV3Response, StateResponse};

impl ApiClient {
    // ── V2 ───────────────────────────────────────────────────────────

    /// Fetch all V2 panel settings (including the sensor table).
    ///
    /// `GET subscriptions/{sid}/settings?settingsType=all&cached={cached}`
    pub async fn get_settings_v2(
        &self,
        system_id: u64,
        cached: bool,
    ) -> Result<SettingsV2Response, Error> {
        debug!(system_id, cached, "fetching V2 settings");
        self.get(
            &format!("subscriptions/{system_id}/settings"),
            &[
                ("settingsType", "all".to_owned()),
                ("cached", cached.to_string()),
            ],
        )
        .await
    }

    /// Arm or disarm a V2 panel.
    ///
    /// `POST subscriptions/{sid}/state?state={off|home|away}`
    pub async fn set_state_v2(&self, system_id: u64, state: &str) -> Result<StateResponse, Error> {
        debug!(system_id, state, "setting V2 state");
        let value: Value = self
            .post(
                &format!("subscriptions/{system_id}/state"),
                &[("state", state.to_owned())],
                None,
            )
            .await?;
        decode_state(value)
    }

    // ── V3 ───────────────────────────────────────────────────────────

    /// Fetch V3 panel settings, PIN table, and base station status.
    ///
    /// `GET ss3/subscriptions/{sid}/settings/normal?forceUpdate={!cached}`
    pub async fn get_settings_v3(
        &self,
        system_id: u64,
        cached: bool,
    ) -> Result<SettingsV3Response, Error> {
        debug!(system_id, cached, "fetching V3 settings");
        self.get(
            &format!("ss3/subscriptions/{system_id}/settings/normal"),
            &[("forceUpdate", (!cached).to_string())],
        )
        .await
    }

    /// Update one or more V3 "normal" settings.
    ///
    /// `POST ss3/subscriptions/{sid}/settings/normal` with the flat map of
    /// changed properties, e.g. `{"alarmVolume": 1}`. Returns the updated
    /// settings payload.
    pub async fn set_settings_v3(
        &self,
        system_id: u64,
        changes: &Value,
    ) -> Result<SettingsV3Response, Error> {
        debug!(system_id, "updating V3 settings");
        self.post(
            &format!("ss3/subscriptions/{system_id}/settings/normal"),
            &[],
            Some(changes),
        )
        .await
    }

    /// Arm or disarm a V3 panel.
    ///
    /// `POST ss3/subscriptions/{sid}/state/{off|home|away}`
    pub async fn set_state_v3(&self, system_id: u64, state: &str) -> Result<StateResponse, Error> {
        debug!(system_id, state, "setting V3 state");
        let value: Value = self
            .post(
                &format!("ss3/subscriptions/{system_id}/state/{state}"),
                &[],
                None,
            )
            .await?;
        decode_state(value)
    }
}

/// Some panels answer a state change with an empty body.
fn decode_state(value: Value) -> Result<StateResponse, Error> {
    if value.is_null() {
        return Ok(StateResponse::default());
    }
    serde_json::from_value(value.clone()).map_err(|e| Error::Deserialization {
        message: format!("state response: {e}"),
        body: value.to_string(),
    })
}
