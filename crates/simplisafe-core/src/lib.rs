//! Domain layer between `simplisafe-api` and consumers (CLI, automations).
//!
//! - **[`SimpliSafe`]**: session facade. Log in with credentials or a
//!   saved refresh token, discover systems, track refresh-token rotation,
//!   and open the realtime channel.
//!
//! - **[`System`]**: a V2 or V3 panel. Shared identity and state live on
//!   the [`AlarmSystem`] trait; settings, locks and structured sensors only
//!   exist on [`SystemV3`]. Arming resolves once the panel confirms.
//!
//! - **[`PinTable`]**: PIN rules (reserved slots, user limit, format,
//!   duplicates) applied before the whole table is posted back.
//!
//! - **[`events::normalize`]**: maps raw history entries and push frames
//!   to a closed [`EventKind`], keeping unrecognized payloads.
//!
//! - **[`RealtimeChannel`]**: push events with connect/disconnect/event
//!   callbacks and automatic reconnect.

pub mod client;
pub mod config;
pub mod error;
pub mod events;
pub mod model;
pub mod pins;
pub mod realtime;

// ── Primary re-exports ──────────────────────────────────────────────
pub use client::SimpliSafe;
pub use config::{AuthCredentials, ClientConfig};
pub use error::{CoreError, PinError};
pub use events::{Event, EventCategory, EventKind, Normalized, UnknownEventWarning};
pub use pins::PinTable;
pub use realtime::{ConnectionState, RealtimeChannel};

pub use model::{
    AlarmSystem, ArmTarget, Entity, EntityType, Lock, LockState, SensorV2, SensorV3, System,
    SystemNotification, SystemState, SystemV2, SystemV3, UpdateOptions, Volume,
};

pub use simplisafe_api::TokenRefreshed;
