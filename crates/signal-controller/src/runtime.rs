//! Tick loop driving the controller from published lane snapshots

use crate::controller::{SignalController, Transition};
use crate::view::{IntersectionStatus, IntersectionView};
use crate::ControllerError;
use lane_monitor::SnapshotReader;
use signal_core::{clock, Lane, LaneMap, LaneSnapshot, ShutdownSignal};
use std::time::Instant;
use tokio::sync::{mpsc, watch};
use tokio::time::MissedTickBehavior;
use tracing::{debug, info};

const COMMAND_CAPACITY: usize = 16;

/// Operator requests applied at the start of the next tick
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ControllerCommand {
    Override(Lane),
}

/// Client side of a running controller
#[derive(Debug, Clone)]
pub struct ControllerHandle {
    tx: mpsc::Sender<ControllerCommand>,
    view: IntersectionView,
}

impl ControllerHandle {
    pub async fn request_override(&self, lane: Lane) -> Result<(), ControllerError> {
        self.tx
            .send(ControllerCommand::Override(lane))
            .await
            .map_err(|_| ControllerError::NotRunning)
    }

    pub fn view(&self) -> IntersectionView {
        self.view.clone()
    }
}

/// Owns the controller and its inputs for the lifetime of the tick loop
pub struct ControllerRuntime {
    controller: SignalController,
    readers: LaneMap<SnapshotReader>,
    commands: mpsc::Receiver<ControllerCommand>,
    status: watch::Sender<IntersectionStatus>,
}

impl ControllerRuntime {
    pub fn new(
        controller: SignalController,
        readers: LaneMap<SnapshotReader>,
    ) -> (Self, ControllerHandle) {
        let (tx, commands) = mpsc::channel(COMMAND_CAPACITY);

        let started_at = controller.phase().started_at;
        let lanes = readers.map(|_, reader| reader.snapshot_at(started_at));
        let initial = IntersectionStatus::capture(&controller, lanes, started_at, true);
        let (status, rx) = watch::channel(initial);

        (
            Self {
                controller,
                readers,
                commands,
                status,
            },
            ControllerHandle {
                tx,
                view: IntersectionView::new(rx),
            },
        )
    }

    pub fn controller(&self) -> &SignalController {
        &self.controller
    }

    /// One tick: apply commands, read snapshots, evaluate rules, publish
    pub fn step(&mut self, now: Instant) -> Option<Transition> {
        while let Ok(command) = self.commands.try_recv() {
            match command {
                ControllerCommand::Override(lane) => self.controller.request_override(lane),
            }
        }

        let lanes = self.readers.map(|_, reader| reader.snapshot_at(now));
        let transition = self.controller.tick(now, &lanes);
        self.publish(lanes, now, true);
        transition
    }

    /// Tick at the configured cadence until stop is broadcast
    ///
    /// Returns the controller after its final `shutdown` signal change.
    pub async fn run(mut self, mut shutdown: ShutdownSignal) -> SignalController {
        let period = self.controller.config().tick_period();
        let mut ticker = tokio::time::interval(period);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);

        info!("Controller tick loop started ({}ms)", period.as_millis());

        loop {
            tokio::select! {
                biased;
                _ = shutdown.triggered() => break,
                _ = ticker.tick() => {
                    if let Some(transition) = self.step(clock::now()) {
                        debug!("Tick produced {}", transition.reason);
                    }
                }
            }
        }

        let stopped_at = clock::now();
        self.controller.shutdown(stopped_at);
        let lanes = self.readers.map(|_, reader| reader.snapshot_at(stopped_at));
        self.publish(lanes, stopped_at, false);

        info!(
            "Controller stopped after {} cycles, {} signal changes",
            self.controller.stats().total_cycles,
            self.controller.stats().transitions
        );
        self.controller
    }

    fn publish(&self, lanes: LaneMap<LaneSnapshot>, now: Instant, running: bool) {
        self.status
            .send_replace(IntersectionStatus::capture(&self.controller, lanes, now, running));
    }
}
