//! Phase state owned by the signal controller

use crate::Lane;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::time::{Duration, Instant};

/// Phase held by the single active lane
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum PhaseKind {
    Green,
    Yellow,
}

/// Colour shown on a lane's signal head
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum SignalColor {
    Red,
    Yellow,
    Green,
}

impl From<PhaseKind> for SignalColor {
    fn from(kind: PhaseKind) -> Self {
        match kind {
            PhaseKind::Green => SignalColor::Green,
            PhaseKind::Yellow => SignalColor::Yellow,
        }
    }
}

/// Why a transition happened
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum TransitionReason {
    #[serde(rename = "startup")]
    Startup,
    #[serde(rename = "max time reached")]
    MaxTimeReached,
    #[serde(rename = "early clearance")]
    EarlyClearance,
    #[serde(rename = "emergency preempt")]
    EmergencyPreempt,
    #[serde(rename = "yellow expired")]
    YellowExpired,
    #[serde(rename = "lane offline")]
    LaneOffline,
    #[serde(rename = "manual override")]
    ManualOverride,
    #[serde(rename = "shutdown")]
    Shutdown,
}

impl TransitionReason {
    pub fn as_str(self) -> &'static str {
        match self {
            TransitionReason::Startup => "startup",
            TransitionReason::MaxTimeReached => "max time reached",
            TransitionReason::EarlyClearance => "early clearance",
            TransitionReason::EmergencyPreempt => "emergency preempt",
            TransitionReason::YellowExpired => "yellow expired",
            TransitionReason::LaneOffline => "lane offline",
            TransitionReason::ManualOverride => "manual override",
            TransitionReason::Shutdown => "shutdown",
        }
    }
}

impl fmt::Display for TransitionReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Authoritative signal phase
///
/// Exactly one lane is GREEN or YELLOW; the other three are RED by
/// construction. Only the controller tick mutates this value.
#[derive(Debug, Clone, PartialEq)]
pub struct PhaseState {
    pub active_lane: Lane,
    pub kind: PhaseKind,
    pub started_at: Instant,
    /// Set while the active lane stays below the clearance threshold
    pub low_count_dwell_start: Option<Instant>,
    pub last_transition_reason: TransitionReason,
    /// Green ceiling granted to an emergency; replaces max green for this phase
    pub emergency_deadline: Option<Instant>,
}

impl PhaseState {
    /// Initial GREEN phase
    pub fn startup(lane: Lane, at: Instant) -> Self {
        Self {
            active_lane: lane,
            kind: PhaseKind::Green,
            started_at: at,
            low_count_dwell_start: None,
            last_transition_reason: TransitionReason::Startup,
            emergency_deadline: None,
        }
    }

    /// Time spent in the current phase
    pub fn elapsed(&self, now: Instant) -> Duration {
        now.saturating_duration_since(self.started_at)
    }

    pub fn is_green(&self) -> bool {
        self.kind == PhaseKind::Green
    }

    pub fn is_yellow(&self) -> bool {
        self.kind == PhaseKind::Yellow
    }

    /// Colour currently shown to `lane`
    pub fn signal(&self, lane: Lane) -> SignalColor {
        if lane == self.active_lane {
            self.kind.into()
        } else {
            SignalColor::Red
        }
    }

    /// Move into a new phase; the start time never moves backward
    pub fn enter(&mut self, lane: Lane, kind: PhaseKind, now: Instant, reason: TransitionReason) {
        self.active_lane = lane;
        self.kind = kind;
        self.started_at = self.started_at.max(now);
        self.low_count_dwell_start = None;
        self.last_transition_reason = reason;
        if kind == PhaseKind::Green {
            self.emergency_deadline = None;
        }
    }
}
