// ── V3 panels ──
//
// V3 panels add a settings payload (volumes, delays, base station health),
// structured sensor records, and door locks.

use std::ops::RangeInclusive;
use std::time::Duration;

use indexmap::IndexMap;
use serde_json::{Value, json};
use tracing::{debug, info};

use simplisafe_api::rest::models::{
    BasestationStatus, DeviceV3Data, NormalSettings, PinsV3, SettingsV3Response,
};

use crate::error::CoreError;
use crate::model::entity::EntityType;
use crate::model::lock::{Lock, LockState};
use crate::model::sensor::SensorV3;
use crate::pins::PinTable;

use super::{AlarmSystem, SystemCore, UpdateOptions, Volume, merge_by_serial};

const ALARM_DURATION: RangeInclusive<u64> = 30..=480;
const ENTRY_DELAY_AWAY: RangeInclusive<u64> = 30..=255;
const ENTRY_DELAY_HOME: RangeInclusive<u64> = 0..=255;
const EXIT_DELAY_AWAY: RangeInclusive<u64> = 45..=255;
const EXIT_DELAY_HOME: RangeInclusive<u64> = 0..=255;

/// A third-generation SimpliSafe panel.
#[derive(Debug, Clone)]
pub struct SystemV3 {
    pub(super) core: SystemCore,
    settings: Option<SettingsV3Response>,
    sensors: IndexMap<String, SensorV3>,
    locks: IndexMap<String, Lock>,
}

impl SystemV3 {
    pub(super) fn new(core: SystemCore) -> Self {
        Self {
            core,
            settings: None,
            sensors: IndexMap::new(),
            locks: IndexMap::new(),
        }
    }

    // ── Entities ─────────────────────────────────────────────────────

    /// Sensors by serial (locks excluded).
    pub fn sensors(&self) -> &IndexMap<String, SensorV3> {
        &self.sensors
    }

    pub fn sensor(&self, serial: &str) -> Option<&SensorV3> {
        self.sensors.get(serial)
    }

    pub fn locks(&self) -> &IndexMap<String, Lock> {
        &self.locks
    }

    pub fn lock_by_serial(&self, serial: &str) -> Option<&Lock> {
        self.locks.get(serial)
    }

    // ── Refresh ──────────────────────────────────────────────────────

    /// Refresh the system record and settings concurrently, then entities.
    ///
    /// Entities go last: the backend answers 409 when the sensor listing
    /// races a settings fetch.
    pub async fn update(&mut self, options: UpdateOptions) -> Result<(), CoreError> {
        let system_id = self.system_id();
        debug!(system_id, ?options, "updating V3 system");
        let api = self.core.api().clone();

        match (options.include_system, options.include_settings) {
            (true, true) => {
                let (subscription, settings) = tokio::try_join!(
                    self.core.fetch_subscription(),
                    async {
                        api.get_settings_v3(system_id, options.cached)
                            .await
                            .map_err(CoreError::from)
                    },
                )?;
                self.core.apply_subscription(subscription);
                self.absorb_settings(settings);
            }
            (true, false) => self.core.refresh_system().await?,
            (false, true) => {
                let settings = api.get_settings_v3(system_id, options.cached).await?;
                self.absorb_settings(settings);
            }
            (false, false) => {}
        }

        if options.include_entities {
            let devices = api.get_devices_v3(system_id, options.cached).await?;
            let (locks, sensors): (Vec<DeviceV3Data>, Vec<DeviceV3Data>) = devices
                .into_iter()
                .partition(|d| EntityType::from_code(d.device_type) == Some(EntityType::Lock));

            merge_by_serial(
                &mut self.sensors,
                sensors,
                |d| &d.serial,
                SensorV3::new,
                SensorV3::replace,
            );
            merge_by_serial(&mut self.locks, locks, |d| &d.serial, Lock::new, Lock::replace);
        }
        Ok(())
    }

    /// Fold a settings response into the snapshot, keeping sections the
    /// response left out.
    fn absorb_settings(&mut self, resp: SettingsV3Response) {
        match &mut self.settings {
            None => self.settings = Some(resp),
            Some(current) => {
                if resp.settings.normal.is_some() {
                    current.settings.normal = resp.settings.normal;
                }
                if resp.settings.pins.is_some() {
                    current.settings.pins = resp.settings.pins;
                }
                if resp.basestation_status.is_some() {
                    current.basestation_status = resp.basestation_status;
                }
            }
        }
    }

    // ── Settings accessors ───────────────────────────────────────────

    fn normal(&self) -> Option<&NormalSettings> {
        self.settings.as_ref()?.settings.normal.as_ref()
    }

    fn basestation(&self) -> Option<&BasestationStatus> {
        self.settings.as_ref()?.basestation_status.as_ref()
    }

    pub fn alarm_duration(&self) -> Option<Duration> {
        self.normal()?.alarm_duration.map(Duration::from_secs)
    }

    pub fn alarm_volume(&self) -> Option<Volume> {
        self.normal()?.alarm_volume.and_then(Volume::from_level)
    }

    pub fn chime_volume(&self) -> Option<Volume> {
        self.normal()?.door_chime.and_then(Volume::from_level)
    }

    pub fn voice_prompt_volume(&self) -> Option<Volume> {
        self.normal()?.voice_prompts.and_then(Volume::from_level)
    }

    pub fn entry_delay_away(&self) -> Option<Duration> {
        self.normal()?.entry_delay_away.map(Duration::from_secs)
    }

    pub fn entry_delay_home(&self) -> Option<Duration> {
        self.normal()?.entry_delay_home.map(Duration::from_secs)
    }

    pub fn exit_delay_away(&self) -> Option<Duration> {
        self.normal()?.exit_delay_away.map(Duration::from_secs)
    }

    pub fn exit_delay_home(&self) -> Option<Duration> {
        self.normal()?.exit_delay_home.map(Duration::from_secs)
    }

    /// Whether the base station light is on.
    pub fn light(&self) -> Option<bool> {
        self.normal()?.light
    }

    pub fn wifi_ssid(&self) -> Option<&str> {
        self.normal()?.wifi_ssid.as_deref()
    }

    /// Wi-Fi RSSI in dBm.
    pub fn wifi_strength(&self) -> Option<i64> {
        self.basestation()?.wifi_rssi
    }

    /// Cellular RSSI in dBm.
    pub fn gsm_strength(&self) -> Option<i64> {
        self.basestation()?.gsm_rssi
    }

    /// Backup battery level in millivolts.
    pub fn battery_backup_power_level(&self) -> Option<i64> {
        self.basestation()?.backup_battery
    }

    pub fn wall_power_level(&self) -> Option<i64> {
        self.basestation()?.wall_power
    }

    pub fn rf_jamming(&self) -> bool {
        self.basestation().and_then(|b| b.rf_jamming).unwrap_or(false)
    }

    pub fn offline(&self) -> bool {
        self.core.system.is_offline.unwrap_or(false)
    }

    pub fn power_outage(&self) -> bool {
        self.core.system.power_outage.unwrap_or(false)
    }

    // ── Settings setters ─────────────────────────────────────────────

    /// 30 s to 8 min.
    pub async fn set_alarm_duration(&mut self, duration: Duration) -> Result<(), CoreError> {
        let secs = in_range("alarm duration", duration, &ALARM_DURATION)?;
        self.post_settings(json!({ "alarmDuration": secs })).await
    }

    pub async fn set_alarm_volume(&mut self, volume: Volume) -> Result<(), CoreError> {
        self.post_settings(json!({ "alarmVolume": volume.level() }))
            .await
    }

    pub async fn set_chime_volume(&mut self, volume: Volume) -> Result<(), CoreError> {
        self.post_settings(json!({ "doorChime": volume.level() }))
            .await
    }

    pub async fn set_voice_prompt_volume(&mut self, volume: Volume) -> Result<(), CoreError> {
        self.post_settings(json!({ "voicePrompts": volume.level() }))
            .await
    }

    pub async fn set_entry_delay_away(&mut self, delay: Duration) -> Result<(), CoreError> {
        let secs = in_range("away entry delay", delay, &ENTRY_DELAY_AWAY)?;
        self.post_settings(json!({ "entryDelayAway": secs })).await
    }

    pub async fn set_entry_delay_home(&mut self, delay: Duration) -> Result<(), CoreError> {
        let secs = in_range("home entry delay", delay, &ENTRY_DELAY_HOME)?;
        self.post_settings(json!({ "entryDelayHome": secs })).await
    }

    pub async fn set_exit_delay_away(&mut self, delay: Duration) -> Result<(), CoreError> {
        let secs = in_range("away exit delay", delay, &EXIT_DELAY_AWAY)?;
        self.post_settings(json!({ "exitDelayAway": secs })).await
    }

    pub async fn set_exit_delay_home(&mut self, delay: Duration) -> Result<(), CoreError> {
        let secs = in_range("home exit delay", delay, &EXIT_DELAY_HOME)?;
        self.post_settings(json!({ "exitDelayHome": secs })).await
    }

    pub async fn set_light(&mut self, on: bool) -> Result<(), CoreError> {
        self.post_settings(json!({ "light": on })).await
    }

    async fn post_settings(&mut self, changes: Value) -> Result<(), CoreError> {
        let system_id = self.system_id();
        info!(system_id, settings = %changes, "updating settings");
        let resp = self.core.api().set_settings_v3(system_id, &changes).await?;
        self.absorb_settings(resp);
        Ok(())
    }

    // ── Locks ────────────────────────────────────────────────────────

    pub async fn lock(&mut self, serial: &str) -> Result<(), CoreError> {
        self.set_lock_state(serial, LockState::Locked).await
    }

    pub async fn unlock(&mut self, serial: &str) -> Result<(), CoreError> {
        self.set_lock_state(serial, LockState::Unlocked).await
    }

    async fn set_lock_state(&mut self, serial: &str, state: LockState) -> Result<(), CoreError> {
        let system_id = self.system_id();
        let command = state
            .command()
            .ok_or_else(|| CoreError::Internal(format!("{state} is not a lock command")))?;
        if !self.locks.contains_key(serial) {
            return Err(CoreError::EntityNotFound {
                serial: serial.to_owned(),
            });
        }

        self.core
            .api()
            .set_lock_state(system_id, serial, command)
            .await?;
        info!(system_id, serial, %state, "lock command accepted");

        if let Some(lock) = self.locks.get_mut(serial) {
            lock.set_state(state);
        }
        Ok(())
    }

    // ── PINs ─────────────────────────────────────────────────────────

    pub async fn get_pins(&self, cached: bool) -> Result<PinTable, CoreError> {
        let resp = self
            .core
            .api()
            .get_pins_v3(self.system_id(), cached)
            .await?;
        let pins = resp.settings.pins.unwrap_or_else(PinsV3::default);
        Ok(PinTable::from_v3(&pins))
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

    async fn post_pins(&mut self, pins: &PinTable) -> Result<(), CoreError> {
        let resp = self
            .core
            .api()
            .set_pins_v3(self.system_id(), &pins.to_v3_payload())
            .await?;
        self.absorb_settings(resp);
        Ok(())
    }
}

impl AlarmSystem for SystemV3 {
    fn core(&self) -> &SystemCore {
        &self.core
    }
}

fn in_range(
    name: &str,
    value: Duration,
    range: &RangeInclusive<u64>,
) -> Result<u64, CoreError> {
    let secs = value.as_secs();
    if range.contains(&secs) {
        Ok(secs)
    } else {
        Err(CoreError::InvalidSetting {
            message: format!(
                "{name} must be between {}s and {}s, got {secs}s",
                range.start(),
                range.end()
            ),
        })
    }
}
