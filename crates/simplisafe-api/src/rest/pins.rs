// PIN table endpoints
//
// Payload construction (slot padding, reserved labels) lives with the PIN
// rules in the core crate; these methods only move JSON.

use serde_json::Value;
use tracing::debug;

use crate::error::Error;
use crate::rest::client::ApiClient;
use crate::rest::models::{PinsV2Response, SettingsV3Response};

impl ApiClient {
    /// `GET subscriptions/{sid}/pins?settingsType=all&cached={cached}`
    pub async fn get_pins_v2(&self, system_id: u64, cached: bool) -> Result<PinsV2Response, Error> {
        debug!(system_id, cached, "fetching V2 PINs");
        self.get(
            &format!("subscriptions/{system_id}/pins"),
            &[
                ("settingsType", "all".to_owned()),
                ("cached", cached.to_string()),
            ],
        )
        .await
    }

    /// `POST subscriptions/{sid}/pins`
    pub async fn set_pins_v2(&self, system_id: u64, payload: &Value) -> Result<Value, Error> {
        debug!(system_id, "updating V2 PINs");
        self.post(&format!("subscriptions/{system_id}/pins"), &[], Some(payload))
            .await
    }

    /// V3 PINs ride along in the settings payload.
    pub async fn get_pins_v3(
        &self,
        system_id: u64,
        cached: bool,
    ) -> Result<SettingsV3Response, Error> {
        self.get_settings_v3(system_id, cached).await
    }

    /// `POST ss3/subscriptions/{sid}/settings/pins`
    ///
    /// Returns the full settings payload with the new PIN table.
    pub async fn set_pins_v3(
        &self,
        system_id: u64,
        payload: &Value,
    ) -> Result<SettingsV3Response, Error> {
        debug!(system_id, "updating V3 PINs");
        self.post(
            &format!("ss3/subscriptions/{system_id}/settings/pins"),
            &[],
            Some(payload),
        )
        .await
    }
}
