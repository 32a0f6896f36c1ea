//! Read-only intersection status for presentation layers

use crate::controller::SignalController;
use crate::health::LaneHealth;
use crate::stats::ControllerStats;
use chrono::{DateTime, Utc};
use signal_core::{Lane, LaneMap, LaneSnapshot, PhaseState, SignalColor};
use std::time::{Duration, Instant};
use tokio::sync::watch;

/// Everything a display needs after one tick
#[derive(Debug, Clone)]
pub struct IntersectionStatus {
    pub phase: PhaseState,
    pub lanes: LaneMap<LaneSnapshot>,
    pub health: LaneMap<LaneHealth>,
    pub stats: ControllerStats,
    /// Time left before the current phase is forced to end
    pub remaining: Duration,
    pub running: bool,
    pub observed_at: DateTime<Utc>,
}

impl IntersectionStatus {
    pub(crate) fn capture(
        controller: &SignalController,
        lanes: LaneMap<LaneSnapshot>,
        now: Instant,
        running: bool,
    ) -> Self {
        Self {
            phase: controller.phase().clone(),
            lanes,
            health: controller.health().clone(),
            stats: controller.stats().clone(),
            remaining: controller.remaining(now),
            running,
            observed_at: Utc::now(),
        }
    }

    pub fn signal(&self, lane: Lane) -> SignalColor {
        self.phase.signal(lane)
    }
}

/// Subscriber to published [`IntersectionStatus`] values
///
/// Holds no mutable access to the controller.
#[derive(Debug, Clone)]
pub struct IntersectionView {
    rx: watch::Receiver<IntersectionStatus>,
}

impl IntersectionView {
    pub(crate) fn new(rx: watch::Receiver<IntersectionStatus>) -> Self {
        Self { rx }
    }

    pub fn current(&self) -> IntersectionStatus {
        self.rx.borrow().clone()
    }

    pub fn signal(&self, lane: Lane) -> SignalColor {
        self.rx.borrow().signal(lane)
    }

    pub fn phase(&self) -> PhaseState {
        self.rx.borrow().phase.clone()
    }

    pub fn snapshot(&self, lane: Lane) -> LaneSnapshot {
        self.rx.borrow().lanes[lane].clone()
    }

    /// Wait for the next published status; `false` once the runtime is gone
    pub async fn changed(&mut self) -> bool {
        self.rx.changed().await.is_ok()
    }
}
