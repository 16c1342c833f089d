// Sensor and lock endpoints

use serde_json::{Value, json};
use tracing::{debug, trace};

use crate::error::Error;
use crate::rest::client::ApiClient;
use crate::rest::models::{DeviceV3Data, SensorV2Data, SensorsV3Response};

impl ApiClient {
    /// List V2 sensors.
    ///
    /// Sensors are part of the V2 settings payload; empty slots are skipped.
    pub async fn get_sensors_v2(
        &self,
        system_id: u64,
        cached: bool,
    ) -> Result<Vec<SensorV2Data>, Error> {
        let settings = self.get_settings_v2(system_id, cached).await?;
        let mut sensors = Vec::with_capacity(settings.settings.sensors.len());
        for slot in settings.settings.sensors {
            if slot.as_object().is_none_or(serde_json::Map::is_empty) {
                trace!(system_id, "skipping empty sensor slot");
                continue;
            }
            let sensor = serde_json::from_value(slot.clone()).map_err(|e| {
                Error::Deserialization {
                    message: format!("V2 sensor: {e}"),
                    body: slot.to_string(),
                }
            })?;
            sensors.push(sensor);
        }
        Ok(sensors)
    }

    /// List V3 devices (sensors and locks).
    ///
    /// `GET ss3/subscriptions/{sid}/sensors?forceUpdate={!cached}`
    pub async fn get_devices_v3(
        &self,
        system_id: u64,
        cached: bool,
    ) -> Result<Vec<DeviceV3Data>, Error> {
        debug!(system_id, cached, "fetching V3 devices");
        let resp: SensorsV3Response = self
            .get(
                &format!("ss3/subscriptions/{system_id}/sensors"),
                &[("forceUpdate", (!cached).to_string())],
            )
            .await?;
        Ok(resp.sensors)
    }

    /// Lock or unlock a door lock.
    ///
    /// `POST doorlock/{sid}/{serial}/state` with `{"state": "lock"|"unlock"}`
    pub async fn set_lock_state(
        &self,
        system_id: u64,
        serial: &str,
        state: &str,
    ) -> Result<Value, Error> {
        debug!(system_id, serial, state, "setting lock state");
        self.post(
            &format!("doorlock/{system_id}/{serial}/state"),
            &[],
            Some(&json!({ "state": state })),
        )
        .await
    }
}
