//! Time sources.
//!
//! The scheduler never reads the system clock directly; it asks a
//! [`TimeSource`]. [`WallClock`] is the production source and
//! [`VirtualClock`] the deterministic one used by tests.

mod clock;

pub use clock::{TimeSource, VirtualClock, WallClock};
