// ── V2 panels ──

use indexmap::IndexMap;
use tracing::{debug, info};

use crate::error::CoreError;
use crate::model::sensor::SensorV2;
use crate::pins::PinTable;

use super::{AlarmSystem, SystemCore, UpdateOptions, merge_by_serial};

/// An original-generation SimpliSafe panel.
#[derive(Debug, Clone)]
pub struct SystemV2 {
    pub(super) core: SystemCore,
    sensors: IndexMap<String, SensorV2>,
}

impl SystemV2 {
    pub(super) fn new(core: SystemCore) -> Self {
        Self {
            core,
            sensors: IndexMap::new(),
        }
    }

    /// Sensors by serial, in panel slot order.
    pub fn sensors(&self) -> &IndexMap<String, SensorV2> {
        &self.sensors
    }

    pub fn sensor(&self, serial: &str) -> Option<&SensorV2> {
        self.sensors.get(serial)
    }

    /// V2 panels have no separate settings payload, so
    /// `include_settings` is ignored.
    pub async fn update(&mut self, options: UpdateOptions) -> Result<(), CoreError> {
        let system_id = self.system_id();
        debug!(system_id, ?options, "updating V2 system");

        if options.include_system {
            self.core.refresh_system().await?;
        }
        if options.include_entities {
            let records = self
                .core
                .api()
                .get_sensors_v2(system_id, options.cached)
                .await?;
            merge_by_serial(
                &mut self.sensors,
                records,
                |r| &r.serial,
                SensorV2::new,
                SensorV2::replace,
            );
        }
        Ok(())
    }

    pub async fn get_pins(&self, cached: bool) -> Result<PinTable, CoreError> {
        let resp = self
            .core
            .api()
            .get_pins_v2(self.system_id(), cached)
            .await?;
        Ok(PinTable::from_v2(&resp))
    }

    pub async fn set_pin(&mut self, label: &str, value: &str) -> Result<(), CoreError> {
        let mut pins = self.get_pins(false).await?;
        pins.set(label, value)?;
        self.post_pins(&pins).await?;
        info!(system_id = self.system_id(), label, "PIN set");
        Ok(())
    }

    pub async fn remove_pin(&mut self, label_or_value: &str) -> Result<String, CoreError> {
        let mut pins = self.get_pins(false).await?;
        let label = pins.remove(label_or_value)?;
        self.post_pins(&pins).await?;
        info!(system_id = self.system_id(), label, "PIN removed");
        Ok(label)
    }

    async fn post_pins(&self, pins: &PinTable) -> Result<(), CoreError> {
        self.core
            .api()
            .set_pins_v2(self.system_id(), &pins.to_v2_payload())
            .await?;
        Ok(())
    }
}

impl AlarmSystem for SystemV2 {
    fn core(&self) -> &SystemCore {
        &self.core
    }
}
