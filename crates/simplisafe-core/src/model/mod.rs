// ── Domain model ──
//
// Systems own their entities. Everything here is a snapshot: values change
// only through `System::update()` or a command issued on the owning system.

pub mod entity;
pub mod lock;
pub mod sensor;
pub mod system;

pub use entity::{Entity, EntityType};
pub use lock::{Lock, LockState};
pub use sensor::{SensorV2, SensorV3};
pub use system::{
    AlarmSystem, ArmTarget, DEFAULT_EVENT_LIMIT, System, SystemCore, SystemNotification,
    SystemState, SystemV2, SystemV3, UpdateOptions, Volume,
};
