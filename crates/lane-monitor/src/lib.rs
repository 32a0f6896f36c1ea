//! Lane Monitor
//!
//! Turns a lane's frame stream into a bounded-staleness count signal:
//! - Runs the detection capability on incoming frames
//! - Filters detections by confidence and tallies them per class
//! - Raises the emergency flag for emergency-class detections
//! - Publishes immutable snapshots through a latest-wins channel

pub mod detection;
pub mod frame;
pub mod monitor;

pub use detection::{Detection, DetectionError, Detector, ScriptedDetector};
pub use frame::VideoFrame;
pub use monitor::{ClassWeights, FrameOutcome, LaneMonitor, MonitorConfig, SnapshotReader};

use thiserror::Error;

/// Lane monitor error types
#[derive(Error, Debug)]
pub enum MonitorError {
    #[error("Frame source for lane {0} closed")]
    SourceClosed(signal_core::Lane),

    #[error("Configuration error: {0}")]
    Config(#[from] signal_core::ConfigError),
}
