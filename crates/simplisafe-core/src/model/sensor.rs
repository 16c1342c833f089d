// ── Sensors ──
//
// V2 and V3 sensors are distinct types: the V2 panel reports raw integers,
// the V3 panel structured `setting`/`status`/`flags` maps. Neither performs
// network I/O; values are as fresh as the parent system's last update.

use serde_json::{Map, Value};

use simplisafe_api::rest::models::{DeviceV3Data, SensorV2Data};

use super::entity::{Entity, EntityType, flag};

// ── V2 ───────────────────────────────────────────────────────────────

/// A sensor on a V2 (original) panel.
#[derive(Debug, Clone)]
pub struct SensorV2 {
    data: SensorV2Data,
    entity_type: EntityType,
}

impl SensorV2 {
    pub(crate) fn new(data: SensorV2Data) -> Self {
        let entity_type = EntityType::from_code_lossy(data.sensor_type, &data.serial);
        Self { data, entity_type }
    }

    pub(crate) fn replace(&mut self, data: SensorV2Data) {
        *self = Self::new(data);
    }

    /// Raw `sensorData` value (meaning depends on the sensor type).
    pub fn data(&self) -> i64 {
        self.data.sensor_data
    }

    /// Raw `setting` value.
    pub fn settings(&self) -> i64 {
        self.data.setting
    }

    pub fn trigger_instantly(&self) -> bool {
        self.data.instant
    }

    pub fn low_battery(&self) -> bool {
        self.data.battery.as_deref().is_some_and(|b| b != "ok")
    }

    /// Open/closed state for entry sensors; `None` for every other type.
    pub fn triggered(&self) -> Option<bool> {
        (self.entity_type == EntityType::Entry)
            .then(|| self.data.entry_status.as_deref() == Some("open"))
    }

    pub fn raw(&self) -> &SensorV2Data {
        &self.data
    }
}

impl Entity for SensorV2 {
    fn serial(&self) -> &str {
        &self.data.serial
    }

    fn name(&self) -> &str {
        &self.data.name
    }

    fn entity_type(&self) -> EntityType {
        self.entity_type
    }

    fn error(&self) -> bool {
        self.data.error
    }
}

// ── V3 ───────────────────────────────────────────────────────────────

/// Sensor types whose `status.triggered` is meaningful.
const TRIGGERABLE: [EntityType; 7] = [
    EntityType::CarbonMonoxide,
    EntityType::Entry,
    EntityType::GlassBreak,
    EntityType::Leak,
    EntityType::Motion,
    EntityType::Smoke,
    EntityType::Temperature,
];

/// A sensor on a V3 panel.
#[derive(Debug, Clone)]
pub struct SensorV3 {
    data: DeviceV3Data,
    entity_type: EntityType,
}

impl SensorV3 {
    pub(crate) fn new(data: DeviceV3Data) -> Self {
        let entity_type = EntityType::from_code_lossy(data.device_type, &data.serial);
        Self { data, entity_type }
    }

    pub(crate) fn replace(&mut self, data: DeviceV3Data) {
        *self = Self::new(data);
    }

    /// The structured `setting` map.
    pub fn settings(&self) -> &Map<String, Value> {
        &self.data.setting
    }

    /// The structured `status` map.
    pub fn status(&self) -> &Map<String, Value> {
        &self.data.status
    }

    pub fn trigger_instantly(&self) -> bool {
        flag(&self.data.setting, "instantTrigger")
    }

    /// Always `false` for types that cannot trip (keypads, sirens, ...).
    pub fn triggered(&self) -> bool {
        TRIGGERABLE.contains(&self.entity_type) && flag(&self.data.status, "triggered")
    }

    pub fn low_battery(&self) -> bool {
        flag(&self.data.flags, "lowBattery")
    }

    pub fn offline(&self) -> bool {
        flag(&self.data.flags, "offline")
    }

    /// Reading in °F for temperature sensors; `None` for every other type.
    pub fn temperature(&self) -> Option<f64> {
        if self.entity_type != EntityType::Temperature {
            return None;
        }
        self.data.status.get("temperature").and_then(Value::as_f64)
    }
}

impl Entity for SensorV3 {
    fn serial(&self) -> &str {
        &self.data.serial
    }

    fn name(&self) -> &str {
        &self.data.name
    }

    fn entity_type(&self) -> EntityType {
        self.entity_type
    }

    /// V3 panels have no single error field: offline or malfunctioning.
    fn error(&self) -> bool {
        self.offline() || flag(&self.data.status, "malfunction")
    }
}
