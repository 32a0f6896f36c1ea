//! Property tests over random count histories

use proptest::prelude::*;
use signal_controller::{SignalController, Transition};
use signal_core::{
    Lane, LaneMap, LaneSnapshot, NullSink, PhaseKind, PhaseRef, SignalColor, SignalConfig,
    TransitionReason,
};
use std::sync::Arc;
use std::time::{Duration, Instant};

#[derive(Debug, Clone)]
struct TickInput {
    counts: [u32; 4],
    emergency: Option<Lane>,
}

fn arb_lane() -> impl Strategy<Value = Lane> {
    prop::sample::select(Lane::ALL.to_vec())
}

fn arb_tick(emergency_weight: u32) -> impl Strategy<Value = TickInput> {
    // proptest's `weighted` rejects a probability of exactly 0.0
    let emergency = if emergency_weight == 0 {
        Just(None).boxed()
    } else {
        prop::option::weighted(f64::from(emergency_weight) / 100.0, arb_lane()).boxed()
    };
    (prop::array::uniform4(0u32..12), emergency)
        .prop_map(|(counts, emergency)| TickInput { counts, emergency })
}

fn config() -> SignalConfig {
    SignalConfig {
        min_green_secs: 5,
        max_green_secs: 15,
        yellow_secs: 2,
        clearance_threshold: 4,
        clearance_wait_secs: 3,
        emergency_green_secs: 10,
        ..Default::default()
    }
}

/// Drive one tick per second; returns every transition with its tick
fn simulate(config: SignalConfig, inputs: &[TickInput]) -> (SignalController, Vec<(u64, Transition)>) {
    let t0 = Instant::now();
    let mut controller = SignalController::new(config, Arc::new(NullSink), t0).unwrap();
    let mut transitions = Vec::new();

    for (i, input) in inputs.iter().enumerate() {
        let t = i as u64 + 1;
        let now = t0 + Duration::from_secs(t);
        let snapshots = LaneMap::from_fn(|lane| {
            LaneSnapshot::with_count(lane, input.counts[lane.index()], now)
                .with_emergency(input.emergency == Some(lane))
        });
        if let Some(transition) = controller.tick(now, &snapshots) {
            transitions.push((t, transition));
        }

        let lit = Lane::ALL
            .iter()
            .filter(|lane| controller.phase().signal(**lane) != SignalColor::Red)
            .count();
        assert_eq!(lit, 1, "exactly one lane must be non-red");
    }

    (controller, transitions)
}

fn ends_green(transition: &Transition) -> bool {
    matches!(
        transition.from,
        Some(PhaseRef {
            phase: PhaseKind::Green,
            ..
        })
    )
}

proptest! {
    #[test]
    fn green_never_exceeds_max_without_emergencies(inputs in prop::collection::vec(arb_tick(0), 1..200)) {
        let config = config();
        let max_green = config.max_green();
        let (_, transitions) = simulate(config, &inputs);

        for (_, transition) in transitions.iter().filter(|(_, t)| ends_green(t)) {
            prop_assert!(transition.held <= max_green);
        }
    }

    #[test]
    fn early_clearance_respects_min_green_and_dwell(inputs in prop::collection::vec(arb_tick(3), 1..200)) {
        let config = config();
        let floor = config.min_green() + config.clearance_wait();
        let (_, transitions) = simulate(config, &inputs);

        for (_, transition) in &transitions {
            if transition.reason == TransitionReason::EarlyClearance {
                prop_assert!(transition.held >= floor);
            }
        }
    }

    #[test]
    fn emergency_green_is_bounded(inputs in prop::collection::vec(arb_tick(10), 1..200)) {
        let config = config();
        let ceiling = config.max_green() + config.emergency_green();
        let (_, transitions) = simulate(config, &inputs);

        for (_, transition) in transitions.iter().filter(|(_, t)| ends_green(t)) {
            prop_assert!(transition.held <= ceiling);
        }
    }

    #[test]
    fn rotation_follows_sequence_without_emergencies(inputs in prop::collection::vec(arb_tick(0), 1..300)) {
        let (controller, transitions) = simulate(config(), &inputs);
        let sequence = controller.sequence();

        let mut previous = sequence.first();
        for (_, transition) in &transitions {
            if let Some(PhaseRef { lane, phase: PhaseKind::Green }) = transition.to {
                prop_assert_eq!(lane, sequence.successor(previous));
                prop_assert_eq!(transition.reason, TransitionReason::YellowExpired);
                previous = lane;
            }
        }
    }

    #[test]
    fn yellow_always_lasts_full_duration(inputs in prop::collection::vec(arb_tick(10), 1..200)) {
        let config = config();
        let yellow = config.yellow();
        let (_, transitions) = simulate(config, &inputs);

        for (_, transition) in &transitions {
            if let Some(PhaseRef { phase: PhaseKind::Yellow, .. }) = transition.from {
                prop_assert_eq!(transition.held, yellow);
            }
        }
    }
}
