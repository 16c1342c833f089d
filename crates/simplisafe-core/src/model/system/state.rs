// ── System state enums ──

use std::str::FromStr;

use serde::{Deserialize, Serialize};
use strum::{AsRefStr, Display, EnumString};
use tracing::warn;

/// Alarm state of a panel.
#[derive(
    Debug,
    Clone,
    Copy,
    PartialEq,
    Eq,
    Hash,
    Serialize,
    Deserialize,
    Display,
    EnumString,
    AsRefStr,
)]
#[serde(rename_all = "snake_case")]
#[strum(serialize_all = "snake_case")]
pub enum SystemState {
    Alarm,
    AlarmCount,
    Away,
    AwayCount,
    EntryDelay,
    Error,
    ExitDelay,
    Home,
    HomeCount,
    Off,
    Unknown,
}

impl SystemState {
    /// Parse a backend state string (`"AWAY"`, `"entryDelay"`,
    /// `"HOME_COUNT"`, ...). Unrecognized values log and map to `Unknown`.
    pub fn parse(raw: &str) -> Self {
        let normalized = to_snake_case(raw);
        Self::from_str(&normalized).unwrap_or_else(|_| {
            warn!(state = raw, "unknown system state");
            Self::Unknown
        })
    }
}

/// The three states a caller can command.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Display, EnumString, AsRefStr)]
#[strum(serialize_all = "snake_case")]
pub enum ArmTarget {
    Away,
    Home,
    Off,
}

impl ArmTarget {
    /// Whether `state` counts as the panel having reached this target.
    ///
    /// The `*_count` states are the exit-delay countdown into the mode.
    pub fn is_satisfied_by(self, state: SystemState) -> bool {
        matches!(
            (self, state),
            (Self::Away, SystemState::Away | SystemState::AwayCount)
                | (Self::Home, SystemState::Home | SystemState::HomeCount)
                | (Self::Off, SystemState::Off)
        )
    }
}

/// Off/low/medium/high level used by V3 volume settings.
#[derive(
    Debug,
    Clone,
    Copy,
    PartialEq,
    Eq,
    Hash,
    Serialize,
    Deserialize,
    Display,
    EnumString,
    AsRefStr,
)]
#[serde(rename_all = "snake_case")]
#[strum(serialize_all = "snake_case")]
pub enum Volume {
    Off,
    Low,
    Medium,
    High,
}

impl Volume {
    pub fn from_level(level: u8) -> Option<Self> {
        Some(match level {
            0 => Self::Off,
            1 => Self::Low,
            2 => Self::Medium,
            3 => Self::High,
            _ => return None,
        })
    }

    pub fn level(self) -> u8 {
        match self {
            Self::Off => 0,
            Self::Low => 1,
            Self::Medium => 2,
            Self::High => 3,
        }
    }
}

/// `entryDelay` -> `entry_delay`, `AWAY_COUNT` -> `away_count`.
fn to_snake_case(raw: &str) -> String {
    let mut out = String::with_capacity(raw.len() + 4);
    let mut prev: Option<char> = None;
    for c in raw.trim().chars() {
        if c.is_ascii_uppercase()
            && prev.is_some_and(|p| p.is_ascii_lowercase() || p.is_ascii_digit())
        {
            out.push('_');
        }
        out.push(c.to_ascii_lowercase());
        prev = Some(c);
    }
    out
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    #[test]
    fn parses_backend_spellings() {
        assert_eq!(SystemState::parse("AWAY"), SystemState::Away);
        assert_eq!(SystemState::parse("off"), SystemState::Off);
        assert_eq!(SystemState::parse("entryDelay"), SystemState::EntryDelay);
        assert_eq!(SystemState::parse("HOME_COUNT"), SystemState::HomeCount);
        assert_eq!(SystemState::parse("awayCount"), SystemState::AwayCount);
        assert_eq!(SystemState::parse("ALARM"), SystemState::Alarm);
    }

    #[test]
    fn unknown_state_does_not_fail() {
        assert_eq!(SystemState::parse("SELF_DESTRUCT"), SystemState::Unknown);
        assert_eq!(SystemState::parse(""), SystemState::Unknown);
    }

    #[test]
    fn confirmation_accepts_countdown_states() {
        assert!(ArmTarget::Away.is_satisfied_by(SystemState::AwayCount));
        assert!(ArmTarget::Home.is_satisfied_by(SystemState::Home));
        assert!(!ArmTarget::Home.is_satisfied_by(SystemState::Away));
        assert!(!ArmTarget::Off.is_satisfied_by(SystemState::EntryDelay));
    }

    #[test]
    fn volume_levels() {
        assert_eq!(Volume::from_level(2), Some(Volume::Medium));
        assert_eq!(Volume::from_level(4), None);
        assert_eq!(Volume::High.level(), 3);
        assert_eq!("low".parse::<Volume>().unwrap(), Volume::Low);
    }
}
