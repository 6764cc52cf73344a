//! Timerkit: an in-process timer scheduler.
//!
//! # Overview
//!
//! Timerkit runs callbacks after a delay, periodically forever, or a bounded
//! number of times. Timers are evaluated in passes: each pass fires every
//! timer that is due, catching up on missed intervals, and removes timers
//! that are finished or cancelled. Passes are driven by the caller or by a
//! background thread at a fixed cadence.
//!
//! # Guarantees
//!
//! - **No drift**: a timer's due time advances by exactly one interval per
//!   firing, so late passes never shift the schedule
//! - **Catch-up**: a late pass fires every missed occurrence of a repeating
//!   timer, up to its remaining count
//! - **Reentrancy**: handlers may register, cancel and query on the
//!   evaluating thread
//! - **Isolation**: a panicking handler removes its own timer and nothing else
//!
//! # Module Structure
//!
//! - [`scheduler`]: The timer manager and its background loop
//! - [`timer`]: Timer state machine and repeat policies
//! - [`time`]: Clock sources (wall clock, virtual clock)
//! - [`types`]: Timer identifiers and time points
//! - [`config`]: Scheduler configuration (env vars, optional TOML file)
//! - [`error`]: Error types
//!
//! # Example
//!
//! ```no_run
//! use std::time::Duration;
//! use timerkit::Scheduler;
//!
//! let scheduler = Scheduler::new();
//! scheduler.schedule_once(|| println!("timeout"), Duration::from_secs(10));
//! scheduler.schedule_repeating(|| println!("tick"), Duration::from_secs(5));
//! scheduler.schedule_n_times(|| println!("bounded"), Duration::from_secs(3), 5);
//!
//! scheduler.start().expect("spawn evaluation loop");
//! std::thread::sleep(Duration::from_secs(30));
//! scheduler.stop();
//! ```

#![forbid(unsafe_code)]
#![warn(missing_docs)]
#![warn(clippy::pedantic)]
#![warn(clippy::nursery)]
#![allow(clippy::missing_errors_doc)]
#![allow(clippy::module_name_repetitions)]
#![allow(clippy::doc_markdown)]

pub mod config;
pub mod error;
pub mod scheduler;
pub mod time;
pub mod timer;
pub mod types;

#[cfg(test)]
pub(crate) mod test_utils;

pub use config::SchedulerConfig;
pub use error::{ConfigError, SchedulerError};
pub use scheduler::{Scheduler, SchedulerHandle};
pub use time::{TimeSource, VirtualClock, WallClock};
pub use timer::Repeat;
pub use types::{Time, TimerId};
