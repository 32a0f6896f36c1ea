//! Adaptive Intersection Daemon
//!
//! Wires four simulated lane cameras through lane monitors into the signal
//! controller and streams every event to the configured sinks.

pub mod settings;
pub mod sim;

use anyhow::Context;
use event_sink::{FanoutSink, JsonLinesSink, TracingSink};
use lane_monitor::LaneMonitor;
use settings::{EventStream, IntersectionSettings};
use signal_controller::{ControllerRuntime, ControllerStats, IntersectionView, SignalController};
use signal_core::{EventSink, Lane, LaneMap, Shutdown, ShutdownSignal};
use sim::SimulatedDetector;
use std::sync::Arc;
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tracing::{debug, info, warn};
use tracing_subscriber::FmtSubscriber;

/// Frames buffered between a camera and its monitor
const FRAME_QUEUE: usize = 8;

/// Initialize logging
pub fn init_logging(settings: &IntersectionSettings) -> anyhow::Result<()> {
    let builder = FmtSubscriber::builder()
        .with_max_level(settings.level()?)
        .with_target(true);

    let installed = if settings.log_json {
        tracing::subscriber::set_global_default(builder.json().finish())
    } else {
        tracing::subscriber::set_global_default(builder.finish())
    };
    installed.context("Failed to set tracing subscriber")
}

/// Sink for the configured event stream
pub fn event_sink(stream: EventStream) -> Arc<dyn EventSink> {
    match stream {
        EventStream::Tracing => Arc::new(TracingSink),
        EventStream::Json => Arc::new(JsonLinesSink::stdout()),
        EventStream::Both => Arc::new(
            FanoutSink::new()
                .with(Arc::new(TracingSink))
                .with(Arc::new(JsonLinesSink::stdout())),
        ),
    }
}

/// Run the intersection until `shutdown` is triggered
pub async fn run(
    settings: IntersectionSettings,
    sink: Arc<dyn EventSink>,
    shutdown: &Shutdown,
) -> anyhow::Result<ControllerStats> {
    let mut monitors = Vec::with_capacity(Lane::ALL.len());
    let mut readers = Vec::with_capacity(Lane::ALL.len());

    for lane in Lane::ALL {
        let (monitor, reader) = LaneMonitor::new(
            lane,
            settings.monitor.clone(),
            SimulatedDetector::new(lane),
            sink.clone(),
        )
        .with_context(|| format!("Failed to create monitor for {}", lane))?;

        let (tx, rx) = mpsc::channel(FRAME_QUEUE);
        tokio::spawn(sim::pump_frames(
            lane,
            settings.simulated_fps,
            tx,
            shutdown.subscribe(),
        ));
        monitors.push((lane, tokio::spawn(monitor.run(rx, shutdown.subscribe()))));
        readers.push(reader);
    }
    let readers = LaneMap::from_fn(|lane| readers[lane.index()].clone());

    let now = signal_core::clock::now();
    let controller = SignalController::new(settings.signal, sink, now)
        .context("Failed to start signal controller")?;
    let (runtime, handle) = ControllerRuntime::new(controller, readers);

    tokio::spawn(report_status(handle.view(), shutdown.subscribe()));
    let controller = tokio::spawn(runtime.run(shutdown.subscribe()))
        .await
        .context("Controller task failed")?;

    join_monitors(monitors).await;

    Ok(controller.stats().clone())
}

async fn join_monitors(monitors: Vec<(Lane, JoinHandle<Result<(), lane_monitor::MonitorError>>)>) {
    for (lane, task) in monitors {
        match task.await {
            Ok(Ok(())) => debug!("Monitor {} joined", lane),
            Ok(Err(e)) => warn!("Monitor {} ended with error: {}", lane, e),
            Err(e) => warn!("Monitor {} task failed: {}", lane, e),
        }
    }
}

/// Log a one-line intersection summary on every phase change
async fn report_status(mut view: IntersectionView, mut shutdown: ShutdownSignal) {
    let mut last = view.phase();

    loop {
        tokio::select! {
            biased;
            _ = shutdown.triggered() => break,
            alive = view.changed() => {
                if !alive {
                    break;
                }
                let status = view.current();
                if status.phase.active_lane == last.active_lane && status.phase.kind == last.kind {
                    continue;
                }
                last = status.phase.clone();

                let counts: Vec<String> = status
                    .lanes
                    .iter()
                    .map(|(lane, s)| {
                        let flag = if s.emergency_present { "!" } else { "" };
                        format!("{}={}{}", lane, s.total_count, flag)
                    })
                    .collect();
                info!(
                    "{} {:?} ({}) | {} | cycles {}",
                    status.phase.active_lane,
                    status.phase.kind,
                    status.phase.last_transition_reason,
                    counts.join(" "),
                    status.stats.total_cycles
                );
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use event_sink::MemorySink;
    use std::time::Duration;

    #[tokio::test(start_paused = true)]
    async fn test_run_until_shutdown() {
        let settings = IntersectionSettings {
            signal: signal_core::SignalConfig::short_cycle(),
            ..Default::default()
        };
        let sink = Arc::new(MemorySink::new());
        let shutdown = Arc::new(Shutdown::new());

        let trigger = shutdown.clone();
        tokio::spawn(async move {
            tokio::time::sleep(Duration::from_secs(120)).await;
            trigger.trigger();
        });

        let stats = run(settings, sink.clone(), &shutdown).await.unwrap();

        assert!(stats.transitions >= 4);
        assert!(sink.count_of("VEHICLE_COUNT") > 0);
        assert_eq!(
            stats.last_change().map(|c| c.reason),
            Some(signal_core::TransitionReason::Shutdown)
        );
    }
}
