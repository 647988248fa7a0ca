//! Logical tick arithmetic.
//!
//! Hosts advance in discrete ticks. Every strategy converts tick delays with the
//! same fixed rate so that delayed work submitted through different strategies
//! stays comparable:
//!
//! ```
//! use worldsync::time::{ticks_to_duration, TICKS_PER_SECOND};
//!
//! assert_eq!(ticks_to_duration(TICKS_PER_SECOND).as_millis(), 1000);
//! ```

use std::time::Duration;

/// Wall-clock length of one tick
pub const MS_PER_TICK: u64 = 50;

/// Ticks per wall-clock second
pub const TICKS_PER_SECOND: u64 = 1000 / MS_PER_TICK;

/// Smallest delay a region host accepts for entity-affine work
pub const MIN_ENTITY_DELAY_TICKS: u64 = 1;

/// Convert a tick count to wall-clock time
pub fn ticks_to_duration(ticks: u64) -> Duration {
    Duration::from_millis(ticks.saturating_mul(MS_PER_TICK))
}
