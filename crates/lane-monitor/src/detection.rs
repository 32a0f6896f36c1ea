//! Detection capability consumed by the lane monitor

use crate::VideoFrame;
use serde::{Deserialize, Serialize};
use signal_core::ObjectClass;
use std::collections::VecDeque;
use thiserror::Error;

/// Detection error types
#[derive(Error, Debug, Clone, PartialEq)]
pub enum DetectionError {
    #[error("Inference failed: {0}")]
    Inference(String),

    #[error("Invalid frame format")]
    InvalidFrame,
}

/// Single classified bounding box
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Detection {
    /// Object class
    pub class: ObjectClass,

    /// Detection confidence (0-1)
    pub confidence: f32,

    /// Bounding box [x1, y1, x2, y2]
    pub bbox: [f32; 4],
}

impl Detection {
    pub fn new(class: ObjectClass, confidence: f32) -> Self {
        Self {
            class,
            confidence,
            bbox: [0.0; 4],
        }
    }
}

/// Turns a frame into classified detections
///
/// Implementations may block. `LaneMonitor::run` calls them on the blocking
/// thread pool, one frame at a time.
pub trait Detector: Send {
    fn detect(&mut self, frame: &VideoFrame) -> Result<Vec<Detection>, DetectionError>;
}

impl<F> Detector for F
where
    F: FnMut(&VideoFrame) -> Result<Vec<Detection>, DetectionError> + Send,
{
    fn detect(&mut self, frame: &VideoFrame) -> Result<Vec<Detection>, DetectionError> {
        self(frame)
    }
}

/// Detector replaying a fixed script of results, one per frame
///
/// Once the script is exhausted the last result repeats.
#[derive(Debug, Clone, Default)]
pub struct ScriptedDetector {
    script: VecDeque<Result<Vec<Detection>, DetectionError>>,
    last: Option<Result<Vec<Detection>, DetectionError>>,
}

impl ScriptedDetector {
    pub fn new() -> Self {
        Self::default()
    }

    /// Queue a frame result
    pub fn then(mut self, result: Result<Vec<Detection>, DetectionError>) -> Self {
        self.script.push_back(result);
        self
    }

    /// Queue a frame containing `count` cars
    pub fn cars(self, count: usize) -> Self {
        self.then(Ok(vec![Detection::new(ObjectClass::Car, 0.9); count]))
    }

    /// Queue a detection failure
    pub fn failure(self) -> Self {
        self.then(Err(DetectionError::Inference("scripted failure".into())))
    }
}

impl Detector for ScriptedDetector {
    fn detect(&mut self, _frame: &VideoFrame) -> Result<Vec<Detection>, DetectionError> {
        if let Some(next) = self.script.pop_front() {
            self.last = Some(next);
        }
        self.last.clone().unwrap_or_else(|| Ok(Vec::new()))
    }
}
