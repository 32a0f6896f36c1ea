//! Controller statistics

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use signal_core::{PhaseRef, TransitionReason};
use std::collections::VecDeque;
use std::time::Duration;

/// Number of signal changes kept for presentation
const RECENT_CAPACITY: usize = 10;

/// One recorded signal change
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ChangeRecord {
    pub at: DateTime<Utc>,
    pub from: Option<PhaseRef>,
    pub to: Option<PhaseRef>,
    pub held: Duration,
    pub reason: TransitionReason,
}

/// Running totals since startup
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ControllerStats {
    /// Times the first lane of the sequence became GREEN again
    pub total_cycles: u64,
    /// Signal changes emitted, including startup
    pub transitions: u64,
    /// Emergency preemptions started
    pub preemptions: u64,
    recent: VecDeque<ChangeRecord>,
}

impl ControllerStats {
    pub(crate) fn record(&mut self, change: ChangeRecord) {
        self.transitions += 1;
        if self.recent.len() >= RECENT_CAPACITY {
            self.recent.pop_front();
        }
        self.recent.push_back(change);
    }

    /// Most recent changes, oldest first
    pub fn recent(&self) -> impl Iterator<Item = &ChangeRecord> {
        self.recent.iter()
    }

    pub fn last_change(&self) -> Option<&ChangeRecord> {
        self.recent.back()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_recent_window_is_bounded() {
        let mut stats = ControllerStats::default();
        for secs in 0..15 {
            stats.record(ChangeRecord {
                at: Utc::now(),
                from: None,
                to: None,
                held: Duration::from_secs(secs),
                reason: TransitionReason::YellowExpired,
            });
        }

        assert_eq!(stats.transitions, 15);
        assert_eq!(stats.recent().count(), RECENT_CAPACITY);
        assert_eq!(stats.recent().next().map(|c| c.held), Some(Duration::from_secs(5)));
        assert_eq!(stats.last_change().map(|c| c.held), Some(Duration::from_secs(14)));
    }
}
