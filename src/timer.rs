//! The timer state machine.
//!
//! A [`Timer`] couples a handler with a cadence and a [`Repeat`] policy.
//! Each evaluation pass calls [`Timer::evaluate_while`] once; the timer
//! decides whether it is due, fires as many times as it owes (catch-up), and
//! reports whether it is finished.
//!
//! # Due-time bookkeeping
//!
//! `next_due` starts at creation time + interval and advances by exactly one
//! interval per firing. It is never reset to "now + interval", so a late pass
//! does not shift the schedule: it only delays the firings, which are then
//! caught up within the same pass.

use crate::types::{Time, TimerId};
use std::fmt;
use std::panic::{self, AssertUnwindSafe};
use std::time::Duration;

/// A timer callback.
pub type Handler = Box<dyn FnMut() + Send + 'static>;

/// How many times a timer fires before it finishes.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Repeat {
    /// Fire once, however late the pass is, then finish.
    Once,
    /// Fire once per elapsed interval, forever.
    Forever,
    /// Fire the given number of remaining times, then finish.
    ///
    /// `Times(0)` finishes without firing.
    Times(u64),
}

impl Repeat {
    /// Maps a requested firing count onto a policy.
    ///
    /// Returns `None` for counts below one, `Once` for one and `Times(n)`
    /// otherwise.
    #[must_use]
    pub fn from_count(count: i64) -> Option<Self> {
        match count {
            i64::MIN..=0 => None,
            1 => Some(Self::Once),
            n => Some(Self::Times(n.unsigned_abs())),
        }
    }
}

/// Result of evaluating one timer in one pass.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct Evaluation {
    /// Handler invocations made during this evaluation.
    pub fired: u64,
    /// The timer has nothing left to do and should be removed.
    pub finished: bool,
    /// The last handler invocation panicked.
    pub panicked: bool,
}

impl Evaluation {
    const fn pending(fired: u64) -> Self {
        Self {
            fired,
            finished: false,
            panicked: false,
        }
    }

    const fn finished(fired: u64) -> Self {
        Self {
            fired,
            finished: true,
            panicked: false,
        }
    }
}

/// One scheduled unit of work.
pub struct Timer {
    id: TimerId,
    handler: Option<Handler>,
    interval: Duration,
    next_due: Time,
    repeat: Repeat,
}

impl Timer {
    /// Creates a timer first due at `created_at + interval`.
    ///
    /// A timer without a handler is inert and reports itself finished on the
    /// first evaluation.
    #[must_use]
    pub fn new(
        id: TimerId,
        handler: Option<Handler>,
        interval: Duration,
        repeat: Repeat,
        created_at: Time,
    ) -> Self {
        Self {
            id,
            handler,
            interval,
            next_due: created_at + interval,
            repeat,
        }
    }

    /// Returns the timer's id.
    #[must_use]
    pub const fn id(&self) -> TimerId {
        self.id
    }

    /// Returns the interval between firings.
    #[must_use]
    pub const fn interval(&self) -> Duration {
        self.interval
    }

    /// Returns the instant of the next scheduled firing.
    #[must_use]
    pub const fn next_due(&self) -> Time {
        self.next_due
    }

    /// Returns the current repeat policy.
    #[must_use]
    pub const fn repeat(&self) -> Repeat {
        self.repeat
    }

    /// Returns true if the timer has no handler.
    #[must_use]
    pub const fn is_inert(&self) -> bool {
        self.handler.is_none()
    }

    /// Evaluates the timer at `now`, firing every occurrence it owes.
    pub fn evaluate(&mut self, now: Time) -> Evaluation {
        self.evaluate_while(now, || true)
    }

    /// Evaluates the timer at `now`, checking `live` before each catch-up
    /// firing after the first.
    ///
    /// When `live` returns false the evaluation stops without finishing the
    /// timer; the caller owns removal in that case.
    pub fn evaluate_while<F>(&mut self, now: Time, mut live: F) -> Evaluation
    where
        F: FnMut() -> bool,
    {
        if self.handler.is_none() {
            return Evaluation::finished(0);
        }
        if now < self.next_due {
            return Evaluation::pending(0);
        }
        // Only reachable through direct construction.
        if self.repeat == Repeat::Times(0) {
            return Evaluation::finished(0);
        }

        let mut fired = 0;
        loop {
            if fired > 0 && !live() {
                return Evaluation::pending(fired);
            }
            let completed = self.fire();
            fired += 1;
            if !completed {
                return Evaluation {
                    fired,
                    finished: true,
                    panicked: true,
                };
            }

            match &mut self.repeat {
                Repeat::Once => return Evaluation::finished(fired),
                Repeat::Forever => {
                    // A zero interval would never catch up.
                    if self.interval.is_zero() {
                        return Evaluation::pending(fired);
                    }
                }
                Repeat::Times(remaining) => {
                    *remaining = remaining.saturating_sub(1);
                    if *remaining == 0 {
                        return Evaluation::finished(fired);
                    }
                }
            }

            if self.next_due > now {
                return Evaluation::pending(fired);
            }
        }
    }

    /// Invokes the handler once and advances `next_due`.
    ///
    /// Returns false if the handler panicked.
    fn fire(&mut self) -> bool {
        let Some(handler) = self.handler.as_mut() else {
            return false;
        };
        let outcome = panic::catch_unwind(AssertUnwindSafe(|| handler()));
        self.next_due = self.next_due + self.interval;

        match outcome {
            Ok(()) => true,
            Err(payload) => {
                let message = payload
                    .downcast_ref::<&str>()
                    .map(|s| (*s).to_string())
                    .or_else(|| payload.downcast_ref::<String>().cloned())
                    .unwrap_or_else(|| "non-string panic payload".to_string());
                tracing::error!(
                    timer_id = %self.id,
                    panic = %message,
                    "timer handler panicked; timer will be removed"
                );
                false
            }
        }
    }
}

impl fmt::Debug for Timer {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Timer")
            .field("id", &self.id)
            .field("handler", &self.handler.is_some())
            .field("interval", &self.interval)
            .field("next_due", &self.next_due)
            .field("repeat", &self.repeat)
            .finish()
    }
}
