//! Sink implementations

use signal_core::{Event, EventSink};
use std::io::Write;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use tokio::sync::mpsc;
use tracing::{debug, info, warn};

/// Writes each event as a structured log line
#[derive(Debug, Clone, Copy, Default)]
pub struct TracingSink;

impl EventSink for TracingSink {
    fn record(&self, event: Event) {
        match &event {
            Event::VehicleCount {
                lane,
                total,
                emergency,
                ..
            } => {
                debug!(kind = event.kind(), %lane, total, emergency, "vehicle count");
            }
            Event::SignalChange {
                from,
                to,
                held,
                reason,
                ..
            } => {
                let from = from.map(|p| format!("{} {:?}", p.lane, p.phase));
                let to = to.map(|p| format!("{} {:?}", p.lane, p.phase));
                info!(
                    kind = event.kind(),
                    from = from.as_deref().unwrap_or("-"),
                    to = to.as_deref().unwrap_or("-"),
                    held_secs = held.as_secs_f64(),
                    %reason,
                    "signal change"
                );
            }
            Event::EmergencyDetected {
                lane, confidence, ..
            } => {
                warn!(kind = event.kind(), %lane, confidence, "emergency vehicle detected");
            }
            Event::LaneDegraded {
                lane, age, offline, ..
            } => {
                warn!(
                    kind = event.kind(),
                    %lane,
                    age_secs = age.as_secs_f64(),
                    offline,
                    "lane degraded"
                );
            }
            Event::LaneRecovered { lane, .. } => {
                info!(kind = event.kind(), %lane, "lane recovered");
            }
            Event::SystemAlert { alert, .. } => {
                warn!(kind = event.kind(), alert = ?alert, "system alert");
            }
        }
    }
}

/// Forwards events into a bounded channel
///
/// Drops the event when the channel is full or closed.
#[derive(Debug, Clone)]
pub struct ChannelSink {
    tx: mpsc::Sender<Event>,
    dropped: Arc<AtomicUsize>,
}

impl ChannelSink {
    pub fn new(capacity: usize) -> (Self, mpsc::Receiver<Event>) {
        let (tx, rx) = mpsc::channel(capacity);
        (
            Self {
                tx,
                dropped: Arc::new(AtomicUsize::new(0)),
            },
            rx,
        )
    }

    /// Events lost to a full or closed channel
    pub fn dropped(&self) -> usize {
        self.dropped.load(Ordering::Relaxed)
    }
}

impl EventSink for ChannelSink {
    fn record(&self, event: Event) {
        if let Err(e) = self.tx.try_send(event) {
            let dropped = self.dropped.fetch_add(1, Ordering::Relaxed) + 1;
            debug!("Event channel rejected event ({} dropped): {}", dropped, e);
        }
    }
}

/// Keeps every event in memory
#[derive(Debug, Default)]
pub struct MemorySink {
    events: Mutex<Vec<Event>>,
}

impl MemorySink {
    pub fn new() -> Self {
        Self::default()
    }

    /// Copy of everything recorded so far
    pub fn events(&self) -> Vec<Event> {
        self.events.lock().map(|e| e.clone()).unwrap_or_default()
    }

    /// Number of recorded events of a kind (e.g. "SIGNAL_CHANGE")
    pub fn count_of(&self, kind: &str) -> usize {
        self.events
            .lock()
            .map(|events| events.iter().filter(|e| e.kind() == kind).count())
            .unwrap_or(0)
    }

    pub fn len(&self) -> usize {
        self.events.lock().map(|e| e.len()).unwrap_or(0)
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn clear(&self) {
        if let Ok(mut events) = self.events.lock() {
            events.clear();
        }
    }
}

impl EventSink for MemorySink {
    fn record(&self, event: Event) {
        if let Ok(mut events) = self.events.lock() {
            events.push(event);
        }
    }
}

/// Serializes each event as one JSON object per line
pub struct JsonLinesSink<W> {
    writer: Mutex<W>,
}

impl<W: Write + Send> JsonLinesSink<W> {
    pub fn new(writer: W) -> Self {
        Self {
            writer: Mutex::new(writer),
        }
    }

    pub fn into_inner(self) -> Option<W> {
        self.writer.into_inner().ok()
    }
}

impl JsonLinesSink<std::io::Stdout> {
    pub fn stdout() -> Self {
        Self::new(std::io::stdout())
    }
}

impl<W: Write + Send> EventSink for JsonLinesSink<W> {
    fn record(&self, event: Event) {
        let Ok(mut writer) = self.writer.lock() else {
            return;
        };
        let written = serde_json::to_writer(&mut *writer, &event)
            .map_err(std::io::Error::from)
            .and_then(|_| writer.write_all(b"\n"));
        if let Err(e) = written {
            debug!("Failed to write {} event: {}", event.kind(), e);
        }
    }
}

/// Delivers each event to several sinks
#[derive(Clone, Default)]
pub struct FanoutSink {
    sinks: Vec<Arc<dyn EventSink>>,
}

impl FanoutSink {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with(mut self, sink: Arc<dyn EventSink>) -> Self {
        self.sinks.push(sink);
        self
    }

    pub fn len(&self) -> usize {
        self.sinks.len()
    }

    pub fn is_empty(&self) -> bool {
        self.sinks.is_empty()
    }
}

impl EventSink for FanoutSink {
    fn record(&self, event: Event) {
        if let Some((last, rest)) = self.sinks.split_last() {
            for sink in rest {
                sink.record(event.clone());
            }
            last.record(event);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Utc;
    use signal_core::{Lane, SystemAlertKind};

    fn recovered(lane: Lane) -> Event {
        Event::LaneRecovered { lane, at: Utc::now() }
    }

    #[test]
    fn test_memory_sink_counts() {
        let sink = MemorySink::new();
        sink.record(recovered(Lane::North));
        sink.record(Event::SystemAlert {
            at: Utc::now(),
            alert: SystemAlertKind::AllLanesStale,
        });

        assert_eq!(sink.len(), 2);
        assert_eq!(sink.count_of("SYSTEM_ALERT"), 1);
        sink.clear();
        assert!(sink.is_empty());
    }

    #[tokio::test]
    async fn test_channel_sink_drops_when_full() {
        let (sink, mut rx) = ChannelSink::new(1);
        sink.record(recovered(Lane::East));
        sink.record(recovered(Lane::West));

        assert_eq!(sink.dropped(), 1);
        assert_eq!(rx.recv().await.and_then(|e| e.lane()), Some(Lane::East));
    }

    #[test]
    fn test_channel_sink_closed_receiver() {
        let (sink, rx) = ChannelSink::new(4);
        drop(rx);
        sink.record(recovered(Lane::South));
        assert_eq!(sink.dropped(), 1);
    }

    #[test]
    fn test_json_lines_format() {
        let sink = JsonLinesSink::new(Vec::new());
        sink.record(recovered(Lane::South));
        sink.record(recovered(Lane::North));

        let bytes = sink.into_inner().unwrap();
        let text = String::from_utf8(bytes).unwrap();
        let lines: Vec<_> = text.lines().collect();
        assert_eq!(lines.len(), 2);

        let first: serde_json::Value = serde_json::from_str(lines[0]).unwrap();
        assert_eq!(first["type"], "LANE_RECOVERED");
        assert_eq!(first["lane"], "SOUTH");
    }

    #[test]
    fn test_fanout_delivers_to_all() {
        let a = Arc::new(MemorySink::new());
        let b = Arc::new(MemorySink::new());
        let fanout = FanoutSink::new().with(a.clone()).with(b.clone()).with(Arc::new(TracingSink));

        fanout.record(recovered(Lane::West));
        assert_eq!(fanout.len(), 3);
        assert_eq!(a.len(), 1);
        assert_eq!(b.len(), 1);
    }
}
