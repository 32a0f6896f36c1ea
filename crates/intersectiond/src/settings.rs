//! Daemon settings: defaults, optional file, environment overrides

use config::{Config, Environment, File};
use lane_monitor::MonitorConfig;
use serde::{Deserialize, Serialize};
use signal_core::SignalConfig;
use std::path::Path;
use thiserror::Error;
use tracing::Level;

/// Environment variable prefix, e.g. `INTERSECTION__SIGNAL__MAX_GREEN_SECS=45`
pub const ENV_PREFIX: &str = "INTERSECTION";

#[derive(Error, Debug)]
pub enum SettingsError {
    #[error("Failed to load settings: {0}")]
    Load(#[from] config::ConfigError),

    #[error("Invalid settings: {0}")]
    Invalid(#[from] signal_core::ConfigError),

    #[error("Unknown log level: {0}")]
    LogLevel(String),

    #[error("Simulated frame rate must be positive")]
    FrameRate,
}

/// Where events are written
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum EventStream {
    /// Structured log lines
    #[default]
    Tracing,
    /// One JSON object per line on stdout
    Json,
    Both,
}

/// Complete daemon configuration
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct IntersectionSettings {
    pub signal: SignalConfig,
    pub monitor: MonitorConfig,
    pub log_level: String,
    pub log_json: bool,
    pub event_stream: EventStream,
    /// Frames per second produced by each simulated camera
    pub simulated_fps: u32,
}

impl Default for IntersectionSettings {
    fn default() -> Self {
        Self {
            signal: SignalConfig::default(),
            monitor: MonitorConfig::default(),
            log_level: "info".to_string(),
            log_json: false,
            event_stream: EventStream::default(),
            simulated_fps: 10,
        }
    }
}

impl IntersectionSettings {
    /// Layer defaults, an optional file, then the environment, and validate
    pub fn load(path: Option<&Path>) -> Result<Self, SettingsError> {
        let mut builder = Config::builder().add_source(Config::try_from(&Self::default())?);
        if let Some(path) = path {
            builder = builder.add_source(File::from(path));
        }
        builder = builder.add_source(
            Environment::with_prefix(ENV_PREFIX)
                .separator("__")
                .try_parsing(true),
        );

        let settings: Self = builder.build()?.try_deserialize()?;
        settings.validate()?;
        Ok(settings)
    }

    pub fn validate(&self) -> Result<(), SettingsError> {
        self.signal.validate()?;
        self.monitor.validate()?;
        self.level()?;
        if self.simulated_fps == 0 {
            return Err(SettingsError::FrameRate);
        }
        Ok(())
    }

    /// Parsed `log_level`
    pub fn level(&self) -> Result<Level, SettingsError> {
        self.log_level
            .parse()
            .map_err(|_| SettingsError::LogLevel(self.log_level.clone()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use signal_core::{EmergencyTieBreak, Lane};
    use std::io::Write;

    #[test]
    fn test_defaults_are_valid() {
        let settings = IntersectionSettings::default();
        assert!(settings.validate().is_ok());
        assert_eq!(settings.level().unwrap(), Level::INFO);
    }

    #[test]
    fn test_file_overrides_defaults() {
        let path = std::env::temp_dir().join(format!("intersectiond-{}.toml", std::process::id()));
        let mut file = std::fs::File::create(&path).unwrap();
        writeln!(
            file,
            r#"
log_level = "debug"
event_stream = "both"

[signal]
max_green_secs = 45
sequence = ["NORTH", "SOUTH", "EAST", "WEST"]
emergency_tie_break = "sequence_order"

[monitor]
frame_skip = 1
"#
        )
        .unwrap();
        drop(file);

        let settings = IntersectionSettings::load(Some(&path)).unwrap();
        std::fs::remove_file(&path).ok();

        assert_eq!(settings.signal.max_green_secs, 45);
        assert_eq!(settings.signal.min_green_secs, 10);
        assert_eq!(settings.signal.sequence[1], Lane::South);
        assert_eq!(settings.signal.emergency_tie_break, EmergencyTieBreak::SequenceOrder);
        assert_eq!(settings.monitor.frame_skip, 1);
        assert_eq!(settings.event_stream, EventStream::Both);
        assert_eq!(settings.level().unwrap(), Level::DEBUG);
    }

    #[test]
    fn test_invalid_values_rejected() {
        let settings = IntersectionSettings {
            log_level: "loud".into(),
            ..Default::default()
        };
        assert!(matches!(settings.validate(), Err(SettingsError::LogLevel(_))));

        let mut settings = IntersectionSettings::default();
        settings.signal.min_green_secs = 50;
        assert!(matches!(settings.validate(), Err(SettingsError::Invalid(_))));

        let settings = IntersectionSettings {
            simulated_fps: 0,
            ..Default::default()
        };
        assert!(matches!(settings.validate(), Err(SettingsError::FrameRate)));
    }
}
