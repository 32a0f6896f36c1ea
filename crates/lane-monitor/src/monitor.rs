//! Lane monitor and snapshot publishing

use crate::{Detection, DetectionError, Detector, MonitorError, VideoFrame};
use chrono::Utc;
use serde::{Deserialize, Serialize};
use signal_core::{clock, ConfigError, Event, EventSink, Lane, LaneSnapshot, ObjectClass, ShutdownSignal};
use std::collections::BTreeMap;
use std::sync::{Arc, Mutex};
use std::time::{Duration, Instant};
use tokio::sync::{mpsc, watch};
use tracing::{debug, info, trace, warn};

/// Per-class weights for the density metric
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ClassWeights {
    pub car: f32,
    pub motorcycle: f32,
    pub bus: f32,
    pub truck: f32,
}

impl Default for ClassWeights {
    fn default() -> Self {
        Self {
            car: 1.0,
            motorcycle: 0.5,
            bus: 2.0,
            truck: 2.0,
        }
    }
}

impl ClassWeights {
    pub fn weight(&self, class: ObjectClass) -> f32 {
        match class {
            ObjectClass::Car => self.car,
            ObjectClass::Motorcycle => self.motorcycle,
            ObjectClass::Bus => self.bus,
            ObjectClass::Truck => self.truck,
            ObjectClass::Emergency | ObjectClass::Other => 0.0,
        }
    }
}

/// Lane monitor configuration
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct MonitorConfig {
    /// Detections below this confidence are discarded
    pub detection_confidence: f32,

    /// Freshness window; older snapshots are reported stale (milliseconds)
    pub stale_after_ms: u64,

    /// Run detection on every Nth received frame
    pub frame_skip: u32,

    /// Minimum spacing of VEHICLE_COUNT events (milliseconds, 0 = every update)
    pub count_event_interval_ms: u64,

    /// Density weights
    pub weights: ClassWeights,
}

impl Default for MonitorConfig {
    fn default() -> Self {
        Self {
            detection_confidence: 0.4,
            stale_after_ms: 3000,
            frame_skip: 2,
            count_event_interval_ms: 0,
            weights: ClassWeights::default(),
        }
    }
}

impl MonitorConfig {
    pub fn validate(&self) -> Result<(), ConfigError> {
        if !(0.0..=1.0).contains(&self.detection_confidence) {
            return Err(ConfigError::Confidence(self.detection_confidence));
        }
        if self.stale_after_ms == 0 {
            return Err(ConfigError::ZeroDuration("stale_after_ms"));
        }
        if self.frame_skip == 0 {
            return Err(ConfigError::InvalidValue {
                field: "frame_skip",
                value: "0".into(),
            });
        }
        Ok(())
    }

    pub fn stale_after(&self) -> Duration {
        Duration::from_millis(self.stale_after_ms)
    }

    pub fn count_event_interval(&self) -> Duration {
        Duration::from_millis(self.count_event_interval_ms)
    }
}

/// What happened to an ingested frame
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FrameOutcome {
    /// Dropped by frame skipping
    Skipped,
    /// New counts published
    Counted,
    /// Detection failed; previous counts kept
    DetectionFailed,
}

/// Read side of a lane's snapshot channel
///
/// Cheap to clone; reads never block and never fail.
#[derive(Debug, Clone)]
pub struct SnapshotReader {
    lane: Lane,
    rx: watch::Receiver<LaneSnapshot>,
    stale_after: Duration,
}

impl SnapshotReader {
    pub fn lane(&self) -> Lane {
        self.lane
    }

    /// Latest snapshot, stale flag evaluated now
    pub fn snapshot(&self) -> LaneSnapshot {
        self.snapshot_at(clock::now())
    }

    /// Latest snapshot, stale flag evaluated at `now`
    pub fn snapshot_at(&self, now: Instant) -> LaneSnapshot {
        self.rx.borrow().evaluated(now, self.stale_after)
    }
}

/// Per-lane frame consumer
pub struct LaneMonitor<D> {
    lane: Lane,
    config: MonitorConfig,
    detector: Arc<Mutex<D>>,
    sink: Arc<dyn EventSink>,
    tx: watch::Sender<LaneSnapshot>,
    frames_received: u64,
    last_count_event: Option<Instant>,
    emergency_raised: bool,
}

impl<D: Detector> LaneMonitor<D> {
    /// Create a monitor and the reader for its snapshots
    pub fn new(
        lane: Lane,
        config: MonitorConfig,
        detector: D,
        sink: Arc<dyn EventSink>,
    ) -> Result<(Self, SnapshotReader), MonitorError> {
        config.validate()?;

        let (tx, rx) = watch::channel(LaneSnapshot::empty(lane, clock::now()));
        let reader = SnapshotReader {
            lane,
            rx,
            stale_after: config.stale_after(),
        };

        debug!("Lane monitor for {} created with config: {:?}", lane, config);

        Ok((
            Self {
                lane,
                config,
                detector: Arc::new(Mutex::new(detector)),
                sink,
                tx,
                frames_received: 0,
                last_count_event: None,
                emergency_raised: false,
            },
            reader,
        ))
    }

    pub fn lane(&self) -> Lane {
        self.lane
    }

    /// Another reader for presentation or diagnostics
    pub fn reader(&self) -> SnapshotReader {
        SnapshotReader {
            lane: self.lane,
            rx: self.tx.subscribe(),
            stale_after: self.config.stale_after(),
        }
    }

    /// Most recently published snapshot, as stored
    pub fn current(&self) -> LaneSnapshot {
        self.tx.borrow().clone()
    }

    pub fn ingest_frame(&mut self, frame: &VideoFrame) -> FrameOutcome {
        self.ingest_frame_at(frame, clock::now())
    }

    /// Run detection on a frame captured at `now` and publish the result
    ///
    /// Detection runs on the calling thread.
    pub fn ingest_frame_at(&mut self, frame: &VideoFrame, now: Instant) -> FrameOutcome {
        if !self.admit() {
            return FrameOutcome::Skipped;
        }
        let result = detect_with(&self.detector, frame);
        self.publish(frame.sequence, result, now)
    }

    /// Count a received frame; false when frame skipping drops it
    fn admit(&mut self) -> bool {
        self.frames_received += 1;
        (self.frames_received - 1) % u64::from(self.config.frame_skip) == 0
    }

    fn publish(
        &mut self,
        sequence: u32,
        result: Result<Vec<Detection>, DetectionError>,
        now: Instant,
    ) -> FrameOutcome {
        match result {
            Ok(detections) => {
                let snapshot = self.tally(&detections, now);
                self.announce(&snapshot, &detections, now);
                self.tx.send_replace(snapshot);
                FrameOutcome::Counted
            }
            Err(e) => {
                // Keep counts and capture time; only the failure streak grows
                trace!("Detection failed on lane {} frame {}: {}", self.lane, sequence, e);
                self.tx.send_modify(|snapshot| snapshot.missed_frames += 1);
                FrameOutcome::DetectionFailed
            }
        }
    }

    fn tally(&self, detections: &[Detection], now: Instant) -> LaneSnapshot {
        let mut counts_by_class = BTreeMap::new();
        let mut total_count = 0;
        let mut weighted_density = 0.0;
        let mut emergency_present = false;

        for detection in detections
            .iter()
            .filter(|d| d.confidence >= self.config.detection_confidence)
        {
            match detection.class {
                ObjectClass::Other => continue,
                ObjectClass::Emergency => emergency_present = true,
                class => {
                    total_count += 1;
                    weighted_density += self.config.weights.weight(class);
                }
            }
            *counts_by_class.entry(detection.class).or_insert(0) += 1;
        }

        LaneSnapshot {
            lane: self.lane,
            total_count,
            counts_by_class,
            emergency_present,
            weighted_density,
            captured_at: now,
            stale: false,
            missed_frames: 0,
        }
    }

    fn announce(&mut self, snapshot: &LaneSnapshot, detections: &[Detection], now: Instant) {
        if snapshot.emergency_present && !self.emergency_raised {
            let confidence = detections
                .iter()
                .filter(|d| d.class == ObjectClass::Emergency)
                .map(|d| d.confidence)
                .fold(0.0_f32, f32::max);
            info!("Emergency vehicle detected on lane {} ({:.2})", self.lane, confidence);
            self.sink.record(Event::EmergencyDetected {
                lane: self.lane,
                at: Utc::now(),
                confidence,
            });
        }
        self.emergency_raised = snapshot.emergency_present;

        let due = match self.last_count_event {
            Some(last) => now.saturating_duration_since(last) >= self.config.count_event_interval(),
            None => true,
        };
        if due {
            self.last_count_event = Some(now);
            self.sink.record(Event::VehicleCount {
                lane: self.lane,
                at: Utc::now(),
                total: snapshot.total_count,
                by_class: snapshot.counts_by_class.clone(),
                emergency: snapshot.emergency_present,
            });
        }
    }
}

impl<D: Detector + 'static> LaneMonitor<D> {
    /// Consume frames until stop is broadcast or the source closes
    ///
    /// Detection runs on the blocking pool so a slow model never holds up
    /// the async workers driving the controller. A frame already being
    /// processed when stop arrives is finished first.
    pub async fn run(
        mut self,
        mut frames: mpsc::Receiver<VideoFrame>,
        mut shutdown: ShutdownSignal,
    ) -> Result<(), MonitorError> {
        info!("Lane monitor {} started", self.lane);

        loop {
            tokio::select! {
                biased;
                _ = shutdown.triggered() => {
                    info!("Lane monitor {} stopping after {} frames", self.lane, self.frames_received);
                    return Ok(());
                }
                frame = frames.recv() => match frame {
                    Some(frame) => {
                        self.ingest_offloaded(frame).await;
                    }
                    None => {
                        warn!("Frame source for lane {} closed", self.lane);
                        return Err(MonitorError::SourceClosed(self.lane));
                    }
                },
            }
        }
    }

    async fn ingest_offloaded(&mut self, frame: VideoFrame) -> FrameOutcome {
        if !self.admit() {
            return FrameOutcome::Skipped;
        }
        let now = clock::now();
        let sequence = frame.sequence;
        let detector = self.detector.clone();

        let result = tokio::task::spawn_blocking(move || detect_with(&detector, &frame))
            .await
            .unwrap_or_else(|e| Err(DetectionError::Inference(format!("detector task failed: {}", e))));
        self.publish(sequence, result, now)
    }
}

/// Validate the frame, then run the detector
///
/// A detector that panicked mid-frame leaves the lock poisoned; every later
/// frame then counts as a failure and the lane ages toward offline.
fn detect_with<D: Detector>(
    detector: &Mutex<D>,
    frame: &VideoFrame,
) -> Result<Vec<Detection>, DetectionError> {
    if !frame.is_well_formed() {
        return Err(DetectionError::InvalidFrame);
    }
    match detector.lock() {
        Ok(mut detector) => detector.detect(frame),
        Err(_) => Err(DetectionError::Inference("detector poisoned by an earlier panic".into())),
    }
}
