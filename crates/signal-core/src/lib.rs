//! Adaptive Intersection Core Types
//!
//! Shared data model for the four-approach signal controller:
//! - Lanes and the cyclic signal sequence
//! - Immutable per-lane count snapshots
//! - The authoritative phase state
//! - Structured events and the sink they are delivered to
//! - Cooperative shutdown broadcast

pub mod clock;
pub mod config;
pub mod error;
pub mod event;
pub mod lane;
pub mod phase;
pub mod shutdown;
pub mod snapshot;

pub use config::{EmergencyTieBreak, SignalConfig};
pub use error::ConfigError;
pub use event::{Event, EventSink, NullSink, PhaseRef, SystemAlertKind};
pub use lane::{Lane, LaneMap, SignalSequence};
pub use phase::{PhaseKind, PhaseState, SignalColor, TransitionReason};
pub use shutdown::{Shutdown, ShutdownSignal};
pub use snapshot::{LaneSnapshot, ObjectClass};
