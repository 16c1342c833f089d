// ── Alarm systems ──
//
// A `System` is one monitored location. The panel generation is fixed at
// discovery and carried in the type: `SystemV2` and `SystemV3` share the
// `AlarmSystem` surface, while settings, locks and structured sensors exist
// only on `SystemV3`.

mod state;
mod v2;
mod v3;

use std::time::Duration;

use chrono::{DateTime, Utc};
use indexmap::IndexMap;
use serde::Serialize;
use tracing::{debug, info, warn};

use simplisafe_api::ApiClient;
use simplisafe_api::rest::models::{LocationSystem, Subscription, SystemMessage};

use crate::config::ClientConfig;
use crate::error::CoreError;
use crate::events::{self, Event};
use crate::pins::PinTable;

pub use state::{ArmTarget, SystemState, Volume};
pub use v2::SystemV2;
pub use v3::SystemV3;

/// Events requested when the caller gives no limit.
pub const DEFAULT_EVENT_LIMIT: u32 = 50;

// ── Notifications ────────────────────────────────────────────────────

/// A message the backend attached to a system (power outage, low battery,
/// service notices, ...).
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct SystemNotification {
    pub id: String,
    pub text: String,
    pub category: String,
    pub code: String,
    pub timestamp: Option<DateTime<Utc>>,
    pub link: Option<String>,
    pub link_label: Option<String>,
}

impl From<&SystemMessage> for SystemNotification {
    fn from(msg: &SystemMessage) -> Self {
        Self {
            id: msg.id.clone(),
            text: msg.text.clone(),
            category: msg.category.clone(),
            code: msg.code.clone(),
            timestamp: DateTime::from_timestamp(msg.timestamp, 0),
            link: msg.link.clone(),
            link_label: msg.link_label.clone(),
        }
    }
}

// ── Update options ───────────────────────────────────────────────────

/// What [`System::update`] refreshes.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct UpdateOptions {
    /// Panel state and notifications (the subscription record).
    pub include_system: bool,
    /// V3 settings and base station status. Ignored on V2.
    pub include_settings: bool,
    /// Sensors and locks.
    pub include_entities: bool,
    /// Let the backend answer from its cache instead of polling the panel.
    pub cached: bool,
}

impl Default for UpdateOptions {
    fn default() -> Self {
        Self {
            include_system: true,
            include_settings: true,
            include_entities: true,
            cached: true,
        }
    }
}

impl UpdateOptions {
    /// Subscription record only.
    pub fn system_only() -> Self {
        Self {
            include_system: true,
            include_settings: false,
            include_entities: false,
            cached: true,
        }
    }
}

// ── Shared core ──────────────────────────────────────────────────────

/// State and behavior common to both panel generations.
#[derive(Debug, Clone)]
pub struct SystemCore {
    api: ApiClient,
    confirm_timeout: Duration,
    poll_interval: Duration,
    system_id: u64,
    address: Option<String>,
    system: LocationSystem,
    state: SystemState,
    notifications: Vec<SystemNotification>,
}

impl SystemCore {
    pub(crate) fn new(api: ApiClient, config: &ClientConfig, subscription: Subscription) -> Self {
        let mut core = Self {
            api,
            confirm_timeout: config.confirm_timeout,
            poll_interval: config.poll_interval,
            system_id: subscription.sid,
            address: None,
            system: subscription.location.system.clone(),
            state: SystemState::Unknown,
            notifications: Vec::new(),
        };
        core.apply_subscription(subscription);
        core
    }

    pub(crate) fn api(&self) -> &ApiClient {
        &self.api
    }

    pub(crate) fn apply_subscription(&mut self, subscription: Subscription) {
        let location = subscription.location;
        self.address = location.street1;
        self.state = SystemState::parse(&location.system.alarm_state);
        self.notifications = location
            .system
            .messages
            .iter()
            .map(SystemNotification::from)
            .collect();
        self.system = location.system;
    }

    /// Fetch this system's subscription record.
    pub(crate) async fn fetch_subscription(&self) -> Result<Subscription, CoreError> {
        self.api
            .get_subscription(self.system_id)
            .await?
            .ok_or(CoreError::SystemNotFound {
                system_id: self.system_id,
            })
    }

    pub(crate) async fn refresh_system(&mut self) -> Result<(), CoreError> {
        let subscription = self.fetch_subscription().await?;
        self.apply_subscription(subscription);
        Ok(())
    }

    /// Issue an arm/disarm command and wait for the panel to confirm it.
    ///
    /// The command is always sent, so arming an already-armed system is a
    /// cheap success. Confirmation comes from a successful command response
    /// when the panel reports the new state directly, otherwise from polling
    /// the subscription record every `poll_interval` until `confirm_timeout`.
    /// A failed response with a reason is a rejection; without one the
    /// reported state is ignored and the subscription is polled.
    pub(crate) async fn arm(&mut self, target: ArmTarget) -> Result<(), CoreError> {
        let system_id = self.system_id;
        info!(system_id, %target, "setting system state");

        let resp = if self.system.version == 2 {
            self.api.set_state_v2(system_id, target.as_ref()).await?
        } else {
            self.api.set_state_v3(system_id, target.as_ref()).await?
        };

        if resp.success {
            if let Some(reported) = resp.reported_state() {
                self.state = SystemState::parse(reported);
            }
            if target.is_satisfied_by(self.state) {
                debug!(system_id, state = %self.state, "state confirmed by command response");
                return Ok(());
            }
        } else if let Some(message) = resp.reason {
            return Err(CoreError::CommandRejected { message });
        }

        let timeout = self.confirm_timeout;
        let poll_interval = self.poll_interval;
        let confirmed = tokio::time::timeout(timeout, async {
            loop {
                tokio::time::sleep(poll_interval).await;
                self.refresh_system().await?;
                debug!(system_id, state = %self.state, "polled system state");
                if target.is_satisfied_by(self.state) {
                    return Ok::<_, CoreError>(());
                }
            }
        })
        .await;

        match confirmed {
            Ok(result) => result,
            Err(_) => {
                warn!(system_id, %target, state = %self.state, "state change not confirmed");
                Err(CoreError::CommandTimeout {
                    target: target.to_string(),
                    timeout,
                })
            }
        }
    }

    pub(crate) async fn get_events(
        &self,
        from: Option<DateTime<Utc>>,
        limit: Option<u32>,
    ) -> Result<Vec<Event>, CoreError> {
        let resp = self
            .api
            .get_events(self.system_id, from, limit.unwrap_or(DEFAULT_EVENT_LIMIT))
            .await?;
        Ok(resp
            .events
            .iter()
            .map(|raw| events::normalize(raw).event)
            .collect())
    }

    pub(crate) async fn get_latest_event(&self) -> Result<Event, CoreError> {
        self.get_events(None, Some(1))
            .await?
            .into_iter()
            .next()
            .ok_or(CoreError::NoEvents {
                system_id: self.system_id,
            })
    }
}

/// Reconcile an entity map with a fresh device listing: known serials are
/// updated in place, new ones appended, and missing ones dropped.
pub(super) fn merge_by_serial<R, T>(
    entities: &mut IndexMap<String, T>,
    records: Vec<R>,
    serial: impl Fn(&R) -> &str,
    create: impl Fn(R) -> T,
    replace: impl Fn(&mut T, R),
) {
    let mut merged = IndexMap::with_capacity(records.len());
    for record in records {
        let key = serial(&record).to_owned();
        let entity = match entities.shift_remove(&key) {
            Some(mut existing) => {
                replace(&mut existing, record);
                existing
            }
            None => create(record),
        };
        merged.insert(key, entity);
    }
    *entities = merged;
}

// ── AlarmSystem ──────────────────────────────────────────────────────

/// Identity and reported state shared by every panel generation.
///
/// All values reflect the last `update()` or command; none performs I/O.
pub trait AlarmSystem {
    fn core(&self) -> &SystemCore;

    /// The subscription id (`sid`).
    fn system_id(&self) -> u64 {
        self.core().system_id
    }

    fn serial(&self) -> &str {
        &self.core().system.serial
    }

    fn address(&self) -> Option<&str> {
        self.core().address.as_deref()
    }

    /// `wifi`, `cell`, ... as reported by the backend.
    fn connection_type(&self) -> Option<&str> {
        self.core().system.conn_type.as_deref()
    }

    fn state(&self) -> SystemState {
        self.core().state
    }

    fn version(&self) -> u8 {
        self.core().system.version
    }

    fn notifications(&self) -> &[SystemNotification] {
        &self.core().notifications
    }

    fn alarm_going_off(&self) -> bool {
        self.core().system.is_alarming
    }

    /// Base station temperature in °F, when the panel reports one.
    fn temperature(&self) -> Option<f64> {
        self.core().system.temperature
    }
}

// ── System ───────────────────────────────────────────────────────────

/// A discovered system of either generation.
#[derive(Debug, Clone)]
pub enum System {
    V2(SystemV2),
    V3(SystemV3),
}

impl System {
    /// Build the right variant for a subscription. Generations other than
    /// 2 and 3 are rejected.
    pub(crate) fn from_subscription(
        api: ApiClient,
        config: &ClientConfig,
        subscription: Subscription,
    ) -> Result<Self, CoreError> {
        let version = subscription.location.system.version;
        let system_id = subscription.sid;
        let core = SystemCore::new(api, config, subscription);
        match version {
            2 => Ok(Self::V2(SystemV2::new(core))),
            3 => Ok(Self::V3(SystemV3::new(core))),
            _ => Err(CoreError::UnsupportedSystemVersion { system_id, version }),
        }
    }

    pub fn as_v2(&self) -> Option<&SystemV2> {
        match self {
            Self::V2(system) => Some(system),
            Self::V3(_) => None,
        }
    }

    pub fn as_v3(&self) -> Option<&SystemV3> {
        match self {
            Self::V3(system) => Some(system),
            Self::V2(_) => None,
        }
    }

    pub fn as_v3_mut(&mut self) -> Option<&mut SystemV3> {
        match self {
            Self::V3(system) => Some(system),
            Self::V2(_) => None,
        }
    }

    pub async fn update(&mut self, options: UpdateOptions) -> Result<(), CoreError> {
        match self {
            Self::V2(system) => system.update(options).await,
            Self::V3(system) => system.update(options).await,
        }
    }

    pub async fn set_away(&mut self) -> Result<(), CoreError> {
        self.set_state(ArmTarget::Away).await
    }

    pub async fn set_home(&mut self) -> Result<(), CoreError> {
        self.set_state(ArmTarget::Home).await
    }

    pub async fn set_off(&mut self) -> Result<(), CoreError> {
        self.set_state(ArmTarget::Off).await
    }

    /// Arm or disarm, resolving once the panel confirms the new state.
    pub async fn set_state(&mut self, target: ArmTarget) -> Result<(), CoreError> {
        match self {
            Self::V2(system) => system.core.arm(target).await,
            Self::V3(system) => system.core.arm(target).await,
        }
    }

    pub async fn get_pins(&self, cached: bool) -> Result<PinTable, CoreError> {
        match self {
            Self::V2(system) => system.get_pins(cached).await,
            Self::V3(system) => system.get_pins(cached).await,
        }
    }

    pub async fn set_pin(&mut self, label: &str, value: &str) -> Result<(), CoreError> {
        match self {
            Self::V2(system) => system.set_pin(label, value).await,
            Self::V3(system) => system.set_pin(label, value).await,
        }
    }

    /// Remove a user PIN by label or value; returns the removed label.
    pub async fn remove_pin(&mut self, label_or_value: &str) -> Result<String, CoreError> {
        match self {
            Self::V2(system) => system.remove_pin(label_or_value).await,
            Self::V3(system) => system.remove_pin(label_or_value).await,
        }
    }

    /// Normalized event history, newest first. `limit` defaults to
    /// [`DEFAULT_EVENT_LIMIT`].
    pub async fn get_events(
        &self,
        from: Option<DateTime<Utc>>,
        limit: Option<u32>,
    ) -> Result<Vec<Event>, CoreError> {
        self.core().get_events(from, limit).await
    }

    pub async fn get_latest_event(&self) -> Result<Event, CoreError> {
        self.core().get_latest_event().await
    }
}

impl AlarmSystem for System {
    fn core(&self) -> &SystemCore {
        match self {
            Self::V2(system) => &system.core,
            Self::V3(system) => &system.core,
        }
    }
}
