//! Lane snapshot health tracking

use chrono::Utc;
use serde::{Deserialize, Serialize};
use signal_core::{Event, EventSink, Lane, LaneMap, LaneSnapshot, SignalConfig, SystemAlertKind};
use std::time::Instant;
use tracing::{info, warn};

/// How far a lane's counts can be trusted
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum LaneHealth {
    #[default]
    Fresh,
    /// Stale beyond the tick multiple; last count still used
    Degraded,
    /// Stale beyond the hard ceiling; excluded from rotation
    Offline,
}

impl LaneHealth {
    pub fn classify(snapshot: &LaneSnapshot, now: Instant, config: &SignalConfig) -> Self {
        let age = snapshot.age(now);
        if age >= config.offline_after() {
            LaneHealth::Offline
        } else if snapshot.stale && age >= config.degraded_after() {
            LaneHealth::Degraded
        } else {
            LaneHealth::Fresh
        }
    }

    pub fn is_offline(self) -> bool {
        self == LaneHealth::Offline
    }
}

/// Edge-triggered health bookkeeping
///
/// Events fire when a lane changes health and once per intersection-wide
/// episode, never once per tick.
#[derive(Debug, Default)]
pub(crate) struct HealthTracker {
    lanes: LaneMap<LaneHealth>,
    stale_alerted: bool,
    offline_alerted: bool,
}

impl HealthTracker {
    pub(crate) fn lanes(&self) -> &LaneMap<LaneHealth> {
        &self.lanes
    }

    pub(crate) fn get(&self, lane: Lane) -> LaneHealth {
        self.lanes[lane]
    }

    pub(crate) fn all_offline(&self) -> bool {
        self.lanes.values().all(|h| h.is_offline())
    }

    /// Re-evaluate every lane and emit health events
    pub(crate) fn assess(
        &mut self,
        now: Instant,
        snapshots: &LaneMap<LaneSnapshot>,
        config: &SignalConfig,
        sink: &dyn EventSink,
    ) {
        for (lane, snapshot) in snapshots.iter() {
            let health = LaneHealth::classify(snapshot, now, config);
            let previous = std::mem::replace(&mut self.lanes[lane], health);
            if previous == health {
                continue;
            }

            match health {
                LaneHealth::Fresh => {
                    info!("Lane {} recovered", lane);
                    sink.record(Event::LaneRecovered { lane, at: Utc::now() });
                }
                LaneHealth::Degraded | LaneHealth::Offline => {
                    warn!(
                        "Lane {} {} (snapshot age {:.1}s)",
                        lane,
                        if health.is_offline() { "offline" } else { "degraded" },
                        snapshot.age(now).as_secs_f64()
                    );
                    sink.record(Event::LaneDegraded {
                        lane,
                        at: Utc::now(),
                        age: snapshot.age(now),
                        offline: health.is_offline(),
                    });
                }
            }
        }

        let all_stale = self.lanes.values().all(|h| *h != LaneHealth::Fresh);
        if all_stale && !self.stale_alerted {
            warn!("All lanes stale; continuing on rotation timers");
            sink.record(Event::SystemAlert {
                at: Utc::now(),
                alert: SystemAlertKind::AllLanesStale,
            });
        }
        self.stale_alerted = all_stale;

        let all_offline = self.all_offline();
        if all_offline && !self.offline_alerted {
            warn!("All lanes offline; holding current phase");
            sink.record(Event::SystemAlert {
                at: Utc::now(),
                alert: SystemAlertKind::AllLanesOffline,
            });
        }
        self.offline_alerted = all_offline;
    }
}
