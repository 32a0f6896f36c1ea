//! Shared monotonic clock
//!
//! Monitors, readers and the controller all stamp and compare snapshots
//! against this clock. It follows the tokio clock, so a paused test runtime
//! moves every component together.

use std::time::Instant;

/// Current instant on the runtime clock
///
/// Outside a runtime this is the system monotonic clock.
pub fn now() -> Instant {
    tokio::time::Instant::now().into_std()
}
