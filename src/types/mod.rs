//! Core value types shared by the timer and the scheduler.
//!
//! - [`id`]: [`TimerId`] handles and the monotonic [`Time`] instant

pub mod id;

pub use id::{Time, TimerId};
