//! Signal timing configuration

use crate::{ConfigError, Lane, SignalSequence};
use serde::{Deserialize, Serialize};
use std::time::Duration;

/// Longest accepted phase or timeout setting (one day)
pub const MAX_SETTING_SECS: u64 = 86_400;

/// Longest accepted tick period
pub const MAX_TICK_MS: u64 = 60_000;

/// Largest accepted staleness tick multiple
pub const MAX_STALE_TICK_MULTIPLE: u32 = 1_000;

/// Policy for choosing among several non-active lanes reporting emergencies
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum EmergencyTieBreak {
    /// Fewest rotation steps forward from the active lane
    #[default]
    NearestInRotation,
    /// Earliest position in the configured sequence
    SequenceOrder,
}

/// Signal controller configuration
///
/// Loaded once at startup and passed by value; never mutated afterwards.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SignalConfig {
    /// Floor for any green phase (seconds)
    pub min_green_secs: u64,

    /// Hard ceiling for a green phase (seconds)
    pub max_green_secs: u64,

    /// Fixed caution phase (seconds)
    pub yellow_secs: u64,

    /// Vehicle count below which a lane is considered clear
    pub clearance_threshold: u32,

    /// Time a lane must stay below threshold before early switch (seconds)
    pub clearance_wait_secs: u64,

    /// Green budget granted to an emergency lane (seconds)
    pub emergency_green_secs: u64,

    /// Controller tick period (milliseconds)
    pub tick_ms: u64,

    /// A stale snapshot older than this many ticks marks its lane degraded
    pub stale_tick_multiple: u32,

    /// Snapshot age at which a lane is considered offline (seconds)
    pub offline_after_secs: u64,

    /// Rotation order
    pub sequence: Vec<Lane>,

    /// Tie-break between simultaneous emergency lanes
    pub emergency_tie_break: EmergencyTieBreak,
}

impl Default for SignalConfig {
    fn default() -> Self {
        Self {
            min_green_secs: 10,
            max_green_secs: 30,
            yellow_secs: 5,
            clearance_threshold: 3,
            clearance_wait_secs: 5,
            emergency_green_secs: 60,
            tick_ms: 1000,
            stale_tick_multiple: 3,
            offline_after_secs: 30,
            sequence: SignalSequence::default().iter().collect(),
            emergency_tie_break: EmergencyTieBreak::NearestInRotation,
        }
    }
}

impl SignalConfig {
    /// Check cross-field constraints
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.min_green_secs > self.max_green_secs {
            return Err(ConfigError::GreenBounds {
                min: self.min_green_secs,
                max: self.max_green_secs,
            });
        }
        if self.max_green_secs == 0 {
            return Err(ConfigError::ZeroDuration("max_green_secs"));
        }
        if self.yellow_secs == 0 {
            return Err(ConfigError::ZeroDuration("yellow_secs"));
        }
        if self.tick_ms == 0 {
            return Err(ConfigError::ZeroDuration("tick_ms"));
        }
        if self.emergency_green_secs == 0 {
            return Err(ConfigError::ZeroDuration("emergency_green_secs"));
        }
        for (field, value) in [
            ("min_green_secs", self.min_green_secs),
            ("max_green_secs", self.max_green_secs),
            ("yellow_secs", self.yellow_secs),
            ("clearance_wait_secs", self.clearance_wait_secs),
            ("emergency_green_secs", self.emergency_green_secs),
            ("offline_after_secs", self.offline_after_secs),
        ] {
            check_limit(field, value, MAX_SETTING_SECS)?;
        }
        check_limit("tick_ms", self.tick_ms, MAX_TICK_MS)?;
        check_limit(
            "stale_tick_multiple",
            u64::from(self.stale_tick_multiple),
            u64::from(MAX_STALE_TICK_MULTIPLE),
        )?;

        let degraded_ms = self
            .tick_ms
            .saturating_mul(u64::from(self.stale_tick_multiple));
        let offline_ms = self.offline_after_secs.saturating_mul(1000);
        if offline_ms <= degraded_ms {
            return Err(ConfigError::OfflineCeiling {
                offline_ms,
                stale_ms: degraded_ms,
            });
        }
        SignalSequence::new(&self.sequence)?;
        Ok(())
    }

    /// Validated rotation order
    pub fn signal_sequence(&self) -> Result<SignalSequence, ConfigError> {
        SignalSequence::new(&self.sequence)
    }

    pub fn min_green(&self) -> Duration {
        Duration::from_secs(self.min_green_secs)
    }

    pub fn max_green(&self) -> Duration {
        Duration::from_secs(self.max_green_secs)
    }

    pub fn yellow(&self) -> Duration {
        Duration::from_secs(self.yellow_secs)
    }

    pub fn clearance_wait(&self) -> Duration {
        Duration::from_secs(self.clearance_wait_secs)
    }

    pub fn emergency_green(&self) -> Duration {
        Duration::from_secs(self.emergency_green_secs)
    }

    pub fn tick_period(&self) -> Duration {
        Duration::from_millis(self.tick_ms)
    }

    /// Age beyond which a stale snapshot degrades its lane
    pub fn degraded_after(&self) -> Duration {
        self.tick_period() * self.stale_tick_multiple
    }

    pub fn offline_after(&self) -> Duration {
        Duration::from_secs(self.offline_after_secs)
    }

    /// Create config with short phases (quiet intersections)
    pub fn short_cycle() -> Self {
        Self {
            min_green_secs: 5,
            max_green_secs: 20,
            yellow_secs: 3,
            ..Default::default()
        }
    }
}

fn check_limit(field: &'static str, value: u64, max: u64) -> Result<(), ConfigError> {
    if value > max {
        return Err(ConfigError::TooLarge { field, value, max });
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_config_is_valid() {
        assert!(SignalConfig::default().validate().is_ok());
        assert!(SignalConfig::short_cycle().validate().is_ok());
    }

    #[test]
    fn test_green_bounds_rejected() {
        let config = SignalConfig {
            min_green_secs: 40,
            max_green_secs: 30,
            ..Default::default()
        };
        assert_eq!(
            config.validate(),
            Err(ConfigError::GreenBounds { min: 40, max: 30 })
        );
    }

    #[test]
    fn test_offline_ceiling_must_exceed_degraded_window() {
        let config = SignalConfig {
            tick_ms: 1000,
            stale_tick_multiple: 5,
            offline_after_secs: 5,
            ..Default::default()
        };
        assert!(matches!(
            config.validate(),
            Err(ConfigError::OfflineCeiling { .. })
        ));
    }

    #[test]
    fn test_zero_yellow_rejected() {
        let config = SignalConfig {
            yellow_secs: 0,
            ..Default::default()
        };
        assert_eq!(config.validate(), Err(ConfigError::ZeroDuration("yellow_secs")));
    }

    #[test]
    fn test_huge_values_rejected_without_overflow() {
        let config = SignalConfig {
            emergency_green_secs: u64::MAX,
            ..Default::default()
        };
        assert_eq!(
            config.validate(),
            Err(ConfigError::TooLarge {
                field: "emergency_green_secs",
                value: u64::MAX,
                max: MAX_SETTING_SECS,
            })
        );

        let config = SignalConfig {
            tick_ms: u64::MAX,
            stale_tick_multiple: u32::MAX,
            offline_after_secs: u64::MAX,
            ..Default::default()
        };
        assert!(matches!(config.validate(), Err(ConfigError::TooLarge { .. })));

        let config = SignalConfig {
            tick_ms: MAX_TICK_MS,
            stale_tick_multiple: MAX_STALE_TICK_MULTIPLE,
            offline_after_secs: MAX_SETTING_SECS,
            ..Default::default()
        };
        assert!(config.validate().is_ok());
        assert_eq!(config.degraded_after(), Duration::from_secs(60_000));
    }

    #[test]
    fn test_degraded_window() {
        let config = SignalConfig {
            tick_ms: 500,
            stale_tick_multiple: 4,
            ..Default::default()
        };
        assert_eq!(config.degraded_after(), Duration::from_secs(2));
    }
}
