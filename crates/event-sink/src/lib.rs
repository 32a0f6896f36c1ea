//! Event Sinks
//!
//! Implementations of [`signal_core::EventSink`]. Every sink absorbs its own
//! failures; recording never blocks the controller or a lane monitor.

mod sinks;

pub use sinks::{ChannelSink, FanoutSink, JsonLinesSink, MemorySink, TracingSink};
