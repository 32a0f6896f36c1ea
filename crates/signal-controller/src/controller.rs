//! Phase state machine

use crate::health::{HealthTracker, LaneHealth};
use crate::stats::{ChangeRecord, ControllerStats};
use crate::ControllerError;
use chrono::Utc;
use signal_core::{
    EmergencyTieBreak, Event, EventSink, Lane, LaneMap, LaneSnapshot, PhaseKind, PhaseRef,
    PhaseState, SignalConfig, SignalSequence, TransitionReason,
};
use std::sync::Arc;
use std::time::{Duration, Instant};
use tracing::{debug, info, warn};

/// A phase change produced by a tick
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Transition {
    pub from: Option<PhaseRef>,
    pub to: Option<PhaseRef>,
    pub held: Duration,
    pub reason: TransitionReason,
}

/// Lane to receive GREEN at the next yellow expiry
#[derive(Debug, Clone, Copy, PartialEq)]
struct PendingGreen {
    lane: Lane,
    reason: TransitionReason,
}

/// Central signal state machine
///
/// Owns the only [`PhaseState`]. All decisions happen inside [`tick`], in a
/// fixed priority order, so the machine is deterministic given the snapshot
/// history.
///
/// [`tick`]: SignalController::tick
pub struct SignalController {
    config: SignalConfig,
    sequence: SignalSequence,
    phase: PhaseState,
    health: HealthTracker,
    pending: Option<PendingGreen>,
    override_request: Option<Lane>,
    stats: ControllerStats,
    sink: Arc<dyn EventSink>,
}

impl SignalController {
    /// Validate configuration and start GREEN on the first lane of the sequence
    pub fn new(
        config: SignalConfig,
        sink: Arc<dyn EventSink>,
        now: Instant,
    ) -> Result<Self, ControllerError> {
        config.validate()?;
        let sequence = config.signal_sequence()?;

        info!(
            "Signal controller starting: sequence {:?}, green {}..{}s, yellow {}s, clearance <{} for {}s",
            sequence.iter().collect::<Vec<_>>(),
            config.min_green_secs,
            config.max_green_secs,
            config.yellow_secs,
            config.clearance_threshold,
            config.clearance_wait_secs,
        );

        let mut controller = Self {
            phase: PhaseState::startup(sequence.first(), now),
            sequence,
            config,
            health: HealthTracker::default(),
            pending: None,
            override_request: None,
            stats: ControllerStats::default(),
            sink,
        };

        controller.emit(Transition {
            from: None,
            to: Some(controller.active()),
            held: Duration::ZERO,
            reason: TransitionReason::Startup,
        });

        Ok(controller)
    }

    pub fn phase(&self) -> &PhaseState {
        &self.phase
    }

    pub fn config(&self) -> &SignalConfig {
        &self.config
    }

    pub fn sequence(&self) -> &SignalSequence {
        &self.sequence
    }

    pub fn stats(&self) -> &ControllerStats {
        &self.stats
    }

    pub fn lane_health(&self, lane: Lane) -> LaneHealth {
        self.health.get(lane)
    }

    pub fn health(&self) -> &LaneMap<LaneHealth> {
        self.health.lanes()
    }

    /// Lane waiting for GREEN after the current yellow, if any
    pub fn pending_lane(&self) -> Option<Lane> {
        self.pending.map(|p| p.lane)
    }

    /// Ask for `lane` to be served next; applied on the following tick
    pub fn request_override(&mut self, lane: Lane) {
        info!("Manual override requested for {}", lane);
        self.override_request = Some(lane);
    }

    /// Time left before the current phase is forced to end
    pub fn remaining(&self, now: Instant) -> Duration {
        let limit = match self.phase.kind {
            PhaseKind::Yellow => self.config.yellow(),
            PhaseKind::Green => match self.phase.emergency_deadline {
                Some(deadline) => deadline.saturating_duration_since(self.phase.started_at),
                None => self.config.max_green(),
            },
        };
        limit.saturating_sub(self.phase.elapsed(now))
    }

    /// Evaluate the rule list once
    pub fn tick(&mut self, now: Instant, snapshots: &LaneMap<LaneSnapshot>) -> Option<Transition> {
        self.health.assess(now, snapshots, &self.config, self.sink.as_ref());

        if self.health.all_offline() {
            return None;
        }

        let serving_emergency = match self.preempt(now, snapshots) {
            Ok(serving) => serving,
            Err(transition) => return Some(transition),
        };

        let active = self.phase.active_lane;

        if self.phase.is_green() && self.health.get(active).is_offline() {
            warn!("Active lane {} offline; ending green", active);
            return Some(self.begin_yellow(now, TransitionReason::LaneOffline));
        }

        if !serving_emergency {
            if let Some(transition) = self.apply_override(now) {
                return Some(transition);
            }
        }

        if self.phase.is_green() {
            if self.ceiling_reached(now) {
                return Some(self.begin_yellow(now, TransitionReason::MaxTimeReached));
            }
            if !serving_emergency && self.clearance_reached(now, snapshots[active].total_count) {
                return Some(self.begin_yellow(now, TransitionReason::EarlyClearance));
            }
            return None;
        }

        if self.phase.elapsed(now) >= self.config.yellow() {
            return self.begin_green(now);
        }

        None
    }

    /// Final signal change before halting
    pub fn shutdown(&mut self, now: Instant) -> Transition {
        info!("Signal controller shutting down on {}", self.phase.active_lane);
        let transition = Transition {
            from: Some(self.active()),
            to: None,
            held: self.phase.elapsed(now),
            reason: TransitionReason::Shutdown,
        };
        self.emit(transition);
        transition
    }

    /// Emergency rule
    ///
    /// `Ok(true)` when the active GREEN lane is serving an emergency,
    /// `Err` when a preemption transition was made.
    fn preempt(
        &mut self,
        now: Instant,
        snapshots: &LaneMap<LaneSnapshot>,
    ) -> Result<bool, Transition> {
        let active = self.phase.active_lane;
        let reporting = snapshots
            .map(|lane, snapshot| snapshot.emergency_present && !self.health.get(lane).is_offline());

        if self.phase.is_green() && reporting[active] {
            if self.phase.emergency_deadline.is_none() {
                let extended = (now + self.config.emergency_green())
                    .max(self.phase.started_at + self.config.max_green());
                info!("Emergency on active lane {}; green extended", active);
                self.phase.emergency_deadline = Some(extended);
                self.stats.preemptions += 1;
            }
            return Ok(true);
        }

        let chosen = {
            let mut candidates = self.sequence.after(active).filter(|lane| reporting[*lane]);
            match self.config.emergency_tie_break {
                // after() already walks forward in rotation order
                EmergencyTieBreak::NearestInRotation => candidates.next(),
                EmergencyTieBreak::SequenceOrder => {
                    candidates.min_by_key(|lane| self.sequence.position(*lane))
                }
            }
        };
        let Some(lane) = chosen else {
            return Ok(false);
        };

        let already_committed =
            matches!(self.pending, Some(p) if p.reason == TransitionReason::EmergencyPreempt);
        if !already_committed {
            info!("Emergency on {}; preempting {}", lane, active);
            self.pending = Some(PendingGreen {
                lane,
                reason: TransitionReason::EmergencyPreempt,
            });
            self.stats.preemptions += 1;
        }

        if self.phase.is_green() {
            return Err(self.begin_yellow(now, TransitionReason::EmergencyPreempt));
        }
        Ok(false)
    }

    fn apply_override(&mut self, now: Instant) -> Option<Transition> {
        let target = self.override_request.take()?;

        if self.health.get(target).is_offline() {
            warn!("Ignoring override to offline lane {}", target);
            return None;
        }
        if target == self.phase.active_lane && self.phase.is_green() {
            debug!("Override target {} already green", target);
            return None;
        }
        if self.pending.is_none() {
            self.pending = Some(PendingGreen {
                lane: target,
                reason: TransitionReason::ManualOverride,
            });
        }

        if self.phase.is_green() {
            return Some(self.begin_yellow(now, TransitionReason::ManualOverride));
        }
        None
    }

    fn ceiling_reached(&self, now: Instant) -> bool {
        match self.phase.emergency_deadline {
            Some(deadline) => now >= deadline,
            None => self.phase.elapsed(now) >= self.config.max_green(),
        }
    }

    /// Early clearance dwell bookkeeping
    fn clearance_reached(&mut self, now: Instant, count: u32) -> bool {
        if count >= self.config.clearance_threshold {
            self.phase.low_count_dwell_start = None;
            return false;
        }
        if self.phase.elapsed(now) < self.config.min_green() {
            return false;
        }

        let dwell_start = *self.phase.low_count_dwell_start.get_or_insert(now);
        now.saturating_duration_since(dwell_start) >= self.config.clearance_wait()
    }

    fn begin_yellow(&mut self, now: Instant, reason: TransitionReason) -> Transition {
        let from = self.active();
        let held = self.phase.elapsed(now);
        self.phase.enter(from.lane, PhaseKind::Yellow, now, reason);

        let transition = Transition {
            from: Some(from),
            to: Some(self.active()),
            held,
            reason,
        };
        self.emit(transition);
        transition
    }

    /// Yellow expiry: serve the pending lane or the next eligible successor
    fn begin_green(&mut self, now: Instant) -> Option<Transition> {
        let current = self.phase.active_lane;
        let pending = self
            .pending
            .take()
            .filter(|p| !self.health.get(p.lane).is_offline());

        let (next, reason) = match pending {
            Some(p) => (p.lane, p.reason),
            None => {
                let successor = self
                    .sequence
                    .after(current)
                    .find(|lane| !self.health.get(*lane).is_offline());
                let next = match successor {
                    Some(lane) => lane,
                    // Only the yellow lane is eligible, or none is
                    None if self.health.get(current).is_offline() => return None,
                    None => current,
                };
                (next, TransitionReason::YellowExpired)
            }
        };

        let from = self.active();
        let held = self.phase.elapsed(now);
        self.phase.enter(next, PhaseKind::Green, now, reason);
        if reason == TransitionReason::EmergencyPreempt {
            self.phase.emergency_deadline = Some(self.phase.started_at + self.config.emergency_green());
        }
        if next == self.sequence.first() {
            self.stats.total_cycles += 1;
        }

        let transition = Transition {
            from: Some(from),
            to: Some(self.active()),
            held,
            reason,
        };
        self.emit(transition);
        Some(transition)
    }

    fn active(&self) -> PhaseRef {
        PhaseRef {
            lane: self.phase.active_lane,
            phase: self.phase.kind,
        }
    }

    fn emit(&mut self, transition: Transition) {
        let at = Utc::now();
        debug!(
            "Signal change {:?} -> {:?} after {:.1}s: {}",
            transition.from,
            transition.to,
            transition.held.as_secs_f64(),
            transition.reason
        );
        self.stats.record(ChangeRecord {
            at,
            from: transition.from,
            to: transition.to,
            held: transition.held,
            reason: transition.reason,
        });
        self.sink.record(Event::SignalChange {
            at,
            from: transition.from,
            to: transition.to,
            held: transition.held,
            reason: transition.reason,
        });
    }
}
