//! System command handlers.

use std::time::Duration;

use serde::Serialize;
use tabled::Tabled;

use simplisafe_core::{
    AlarmSystem, Entity, EntityType, System, SystemNotification, SystemState, SystemV3, Volume,
};

use crate::cli::{GlobalOpts, SystemsArgs, SystemsCommand};
use crate::error::CliError;
use crate::output::{self, or_dash};
use crate::session::Session;

// ── Serializable views ──────────────────────────────────────────────

#[derive(Serialize)]
struct SystemSummary {
    system_id: u64,
    serial: String,
    version: u8,
    address: Option<String>,
    state: SystemState,
    connection: Option<String>,
    alarming: bool,
    temperature: Option<f64>,
    sensors: usize,
    locks: usize,
    notifications: Vec<SystemNotification>,
    #[serde(skip_serializing_if = "Option::is_none")]
    settings: Option<SettingsSummary>,
}

#[derive(Serialize)]
struct SettingsSummary {
    alarm_duration_secs: Option<u64>,
    alarm_volume: Option<Volume>,
    chime_volume: Option<Volume>,
    voice_prompt_volume: Option<Volume>,
    entry_delay_away_secs: Option<u64>,
    entry_delay_home_secs: Option<u64>,
    exit_delay_away_secs: Option<u64>,
    exit_delay_home_secs: Option<u64>,
    light: Option<bool>,
    wifi_ssid: Option<String>,
    wifi_strength: Option<i64>,
    gsm_strength: Option<i64>,
    battery_backup_power_level: Option<i64>,
    wall_power_level: Option<i64>,
    rf_jamming: bool,
    offline: bool,
    power_outage: bool,
}

#[derive(Serialize)]
struct SensorInfo {
    serial: String,
    name: String,
    entity_type: EntityType,
    /// `None` where the sensor type has no open/tripped notion (V2).
    triggered: Option<bool>,
    low_battery: bool,
    error: bool,
    temperature: Option<f64>,
}

fn secs(d: Option<Duration>) -> Option<u64> {
    d.as_ref().map(Duration::as_secs)
}

impl SystemSummary {
    fn new(system: &System, with_settings: bool) -> Self {
        let (sensors, locks, settings) = match system {
            System::V2(v2) => (v2.sensors().len(), 0, None),
            System::V3(v3) => (
                v3.sensors().len(),
                v3.locks().len(),
                with_settings.then(|| SettingsSummary::new(v3)),
            ),
        };
        Self {
            system_id: system.system_id(),
            serial: system.serial().to_owned(),
            version: system.version(),
            address: system.address().map(str::to_owned),
            state: system.state(),
            connection: system.connection_type().map(str::to_owned),
            alarming: system.alarm_going_off(),
            temperature: system.temperature(),
            sensors,
            locks,
            notifications: system.notifications().to_vec(),
            settings,
        }
    }
}

impl SettingsSummary {
    fn new(v3: &SystemV3) -> Self {
        Self {
            alarm_duration_secs: secs(v3.alarm_duration()),
            alarm_volume: v3.alarm_volume(),
            chime_volume: v3.chime_volume(),
            voice_prompt_volume: v3.voice_prompt_volume(),
            entry_delay_away_secs: secs(v3.entry_delay_away()),
            entry_delay_home_secs: secs(v3.entry_delay_home()),
            exit_delay_away_secs: secs(v3.exit_delay_away()),
            exit_delay_home_secs: secs(v3.exit_delay_home()),
            light: v3.light(),
            wifi_ssid: v3.wifi_ssid().map(str::to_owned),
            wifi_strength: v3.wifi_strength(),
            gsm_strength: v3.gsm_strength(),
            battery_backup_power_level: v3.battery_backup_power_level(),
            wall_power_level: v3.wall_power_level(),
            rf_jamming: v3.rf_jamming(),
            offline: v3.offline(),
            power_outage: v3.power_outage(),
        }
    }
}

fn sensors(system: &System) -> Vec<SensorInfo> {
    match system {
        System::V2(v2) => v2
            .sensors()
            .values()
            .map(|s| SensorInfo {
                serial: s.serial().to_owned(),
                name: s.name().to_owned(),
                entity_type: s.entity_type(),
                triggered: s.triggered(),
                low_battery: s.low_battery(),
                error: s.error(),
                temperature: None,
            })
            .collect(),
        System::V3(v3) => v3
            .sensors()
            .values()
            .map(|s| SensorInfo {
                serial: s.serial().to_owned(),
                name: s.name().to_owned(),
                entity_type: s.entity_type(),
                triggered: Some(s.triggered()),
                low_battery: s.low_battery(),
                error: s.error(),
                temperature: s.temperature(),
            })
            .collect(),
    }
}

// ── Table rows ──────────────────────────────────────────────────────

#[derive(Tabled)]
struct SystemRow {
    #[tabled(rename = "ID")]
    id: u64,
    #[tabled(rename = "Address")]
    address: String,
    #[tabled(rename = "Version")]
    version: String,
    #[tabled(rename = "State")]
    state: String,
    #[tabled(rename = "Connection")]
    connection: String,
    #[tabled(rename = "Sensors")]
    sensors: usize,
    #[tabled(rename = "Locks")]
    locks: usize,
}

impl From<&SystemSummary> for SystemRow {
    fn from(s: &SystemSummary) -> Self {
        Self {
            id: s.system_id,
            address: or_dash(s.address.as_deref()),
            version: format!("V{}", s.version),
            state: if s.alarming {
                format!("{} (ALARM)", s.state)
            } else {
                s.state.to_string()
            },
            connection: or_dash(s.connection.as_deref()),
            sensors: s.sensors,
            locks: s.locks,
        }
    }
}

#[derive(Tabled)]
struct SensorRow {
    #[tabled(rename = "Serial")]
    serial: String,
    #[tabled(rename = "Name")]
    name: String,
    #[tabled(rename = "Type")]
    kind: String,
    #[tabled(rename = "Status")]
    status: String,
}

impl From<&SensorInfo> for SensorRow {
    fn from(s: &SensorInfo) -> Self {
        let mut flags = Vec::new();
        match s.triggered {
            Some(true) => flags.push("triggered".to_owned()),
            Some(false) => flags.push("ok".to_owned()),
            None => {}
        }
        if let Some(t) = s.temperature {
            flags.push(format!("{t:.0}°F"));
        }
        if s.low_battery {
            flags.push("low battery".into());
        }
        if s.error {
            flags.push("error".into());
        }
        Self {
            serial: s.serial.clone(),
            name: s.name.clone(),
            kind: s.entity_type.to_string(),
            status: if flags.is_empty() {
                "-".into()
            } else {
                flags.join(", ")
            },
        }
    }
}

fn detail(s: &SystemSummary) -> String {
    let mut lines = vec![
        format!("ID:          {}", s.system_id),
        format!("Serial:      {}", s.serial),
        format!("Version:     V{}", s.version),
        format!("Address:     {}", or_dash(s.address.as_deref())),
        format!("State:       {}", s.state),
        format!("Alarming:    {}", s.alarming),
        format!("Connection:  {}", or_dash(s.connection.as_deref())),
        format!("Temperature: {}", or_dash(s.temperature.map(|t| format!("{t:.0}°F")))),
        format!("Sensors:     {}", s.sensors),
    ];
    if s.version == 3 {
        lines.push(format!("Locks:       {}", s.locks));
    }

    if let Some(ref set) = s.settings {
        lines.push(String::new());
        lines.push(format!(
            "Alarm duration:   {}",
            or_dash(set.alarm_duration_secs.map(|v| format!("{v}s")))
        ));
        lines.push(format!("Alarm volume:     {}", or_dash(set.alarm_volume)));
        lines.push(format!("Chime volume:     {}", or_dash(set.chime_volume)));
        lines.push(format!("Voice prompts:    {}", or_dash(set.voice_prompt_volume)));
        lines.push(format!(
            "Entry delay:      away {} / home {}",
            or_dash(set.entry_delay_away_secs.map(|v| format!("{v}s"))),
            or_dash(set.entry_delay_home_secs.map(|v| format!("{v}s")))
        ));
        lines.push(format!(
            "Exit delay:       away {} / home {}",
            or_dash(set.exit_delay_away_secs.map(|v| format!("{v}s"))),
            or_dash(set.exit_delay_home_secs.map(|v| format!("{v}s")))
        ));
        lines.push(format!("Light:            {}", or_dash(set.light)));
        lines.push(format!(
            "WiFi:             {} ({} dBm)",
            or_dash(set.wifi_ssid.as_deref()),
            or_dash(set.wifi_strength)
        ));
        lines.push(format!("Cellular:         {} dBm", or_dash(set.gsm_strength)));
        lines.push(format!(
            "Power:            wall {} / backup {}{}",
            or_dash(set.wall_power_level),
            or_dash(set.battery_backup_power_level),
            if set.power_outage { " (OUTAGE)" } else { "" }
        ));
        if set.rf_jamming {
            lines.push("RF jamming detected".into());
        }
        if set.offline {
            lines.push("Base station offline".into());
        }
    }

    if !s.notifications.is_empty() {
        lines.push(String::new());
        lines.push("Notifications:".into());
        for n in &s.notifications {
            lines.push(format!("  [{}] {}", n.category, n.text));
        }
    }

    lines.join("\n")
}

// ── Handler ─────────────────────────────────────────────────────────

pub async fn handle(
    session: &Session,
    args: SystemsArgs,
    global: &GlobalOpts,
) -> Result<(), CliError> {
    let out = match args.command.unwrap_or(SystemsCommand::List) {
        SystemsCommand::List => {
            let mut systems: Vec<SystemSummary> = session
                .client()
                .get_systems()
                .await?
                .values()
                .filter(|s| global.system.is_none_or(|id| id == s.system_id()))
                .map(|s| SystemSummary::new(s, false))
                .collect();
            systems.sort_by_key(|s| s.system_id);
            output::render_list(global.output, &systems, |s| SystemRow::from(s), |s| {
                s.system_id.to_string()
            })
        }
        SystemsCommand::Show => {
            let system = session.system(global.system).await?;
            let summary = SystemSummary::new(&system, true);
            output::render_single(global.output, &summary, detail, |s| s.state.to_string())
        }
        SystemsCommand::Sensors => {
            let system = session.system(global.system).await?;
            let sensors = sensors(&system);
            output::render_list(global.output, &sensors, |s| SensorRow::from(s), |s| s.serial.clone())
        }
    };

    output::print_output(&out, global.quiet);
    Ok(())
}
