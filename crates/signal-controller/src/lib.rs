//! Signal Controller
//!
//! Sequential phase state machine for a four-approach intersection:
//! - Rotates GREEN/YELLOW through the configured signal sequence
//! - Adapts green length to observed counts (early clearance, max ceiling)
//! - Preempts the rotation for emergency vehicles
//! - Degrades gracefully on stale or offline lane snapshots
//!
//! Decisions are a prioritized rule list evaluated once per tick; the
//! controller never calls into detection and never blocks.

mod controller;
mod health;
mod runtime;
mod stats;
mod view;

pub use controller::{SignalController, Transition};
pub use health::LaneHealth;
pub use runtime::{ControllerCommand, ControllerHandle, ControllerRuntime};
pub use stats::{ChangeRecord, ControllerStats};
pub use view::{IntersectionStatus, IntersectionView};

use thiserror::Error;

/// Controller error types
#[derive(Error, Debug)]
pub enum ControllerError {
    #[error("Configuration error: {0}")]
    Config(#[from] signal_core::ConfigError),

    #[error("Controller is not running")]
    NotRunning,
}
