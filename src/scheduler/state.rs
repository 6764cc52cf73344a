//! Registry state guarded by the scheduler lock.
//!
//! Every method here assumes the caller holds the scheduler's reentrant lock,
//! so at most one thread touches the state at a time. The `RefCell`s are
//! split so a handler running inside a pass can re-enter on the same thread:
//! registration goes to `staged` while the timer map is being walked, and
//! cancellation only touches `removals`.

use crate::error::SchedulerError;
use crate::timer::Timer;
use crate::types::{Time, TimerId};
use std::cell::{Cell, RefCell};
use std::collections::{HashMap, HashSet};

/// Outcome of one evaluation pass.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub(crate) struct PassReport {
    /// Handler invocations made during the pass.
    pub fired: u64,
    /// Timers deleted at the end of the pass.
    pub removed: usize,
}

#[derive(Debug, Default)]
pub(crate) struct State {
    timers: RefCell<HashMap<TimerId, RefCell<Timer>>>,
    /// Registered from a handler while `timers` is being walked.
    staged: RefCell<Vec<Timer>>,
    pending_removals: RefCell<HashSet<TimerId>>,
    next_id: Cell<u64>,
    in_pass: Cell<bool>,
}

impl State {
    /// Returns the next free id.
    ///
    /// Skips [`TimerId::INVALID`] and ids still held by a live timer, so the
    /// counter may wrap. If every id is live this never returns.
    pub(crate) fn allocate_id(&self) -> TimerId {
        loop {
            let id = TimerId::from_raw(self.next_id.get());
            self.next_id.set(id.as_raw().wrapping_add(1));
            if id.is_valid() && !self.is_stored(id) {
                return id;
            }
        }
    }

    pub(crate) fn insert(&self, timer: Timer) {
        if self.in_pass.get() {
            self.staged.borrow_mut().push(timer);
        } else {
            self.timers
                .borrow_mut()
                .insert(timer.id(), RefCell::new(timer));
        }
    }

    /// Queues `id` for removal at the end of the current or next pass.
    ///
    /// Returns false for the invalid id and for ids that are not stored.
    pub(crate) fn cancel(&self, id: TimerId) -> bool {
        if !id.is_valid() || !self.is_stored(id) {
            return false;
        }
        self.pending_removals.borrow_mut().insert(id)
    }

    /// True if `id` is stored and not queued for removal.
    pub(crate) fn contains(&self, id: TimerId) -> bool {
        self.is_stored(id) && !self.pending_removals.borrow().contains(&id)
    }

    /// Number of stored timers, including staged ones and ones queued for removal.
    pub(crate) fn len(&self) -> usize {
        self.timers.borrow().len() + self.staged.borrow().len()
    }

    /// Earliest `next_due` among live timers.
    ///
    /// A timer whose handler is running at call time is skipped.
    pub(crate) fn next_deadline(&self) -> Option<Time> {
        let removals = self.pending_removals.borrow();
        let timers = self.timers.borrow();
        let stored = timers
            .iter()
            .filter(|(id, _)| !removals.contains(id))
            .filter_map(|(_, cell)| cell.try_borrow().ok().map(|t| t.next_due()));
        let staged = self.staged.borrow();
        let staged = staged
            .iter()
            .filter(|t| !removals.contains(&t.id()))
            .map(Timer::next_due);
        stored.chain(staged).min()
    }

    pub(crate) fn in_pass(&self) -> bool {
        self.in_pass.get()
    }

    /// Evaluates every live timer at `now`, then applies deferred changes.
    ///
    /// Returns the removed timers alongside the report. The caller drops them
    /// after releasing the scheduler lock, since a handler's captured state
    /// may call back into the scheduler from its `Drop`.
    ///
    /// Returns `None` when called from inside a handler of a pass that is
    /// already in flight.
    pub(crate) fn run_pass(&self, now: Time) -> Option<(PassReport, Vec<Timer>)> {
        if self.in_pass.replace(true) {
            return None;
        }

        let mut fired = 0;
        {
            let timers = self.timers.borrow();
            for (&id, cell) in timers.iter() {
                if self.pending_removals.borrow().contains(&id) {
                    continue;
                }
                let eval = cell
                    .borrow_mut()
                    .evaluate_while(now, || !self.pending_removals.borrow().contains(&id));
                fired += eval.fired;
                if eval.finished {
                    self.pending_removals.borrow_mut().insert(id);
                }
            }
        }
        self.in_pass.set(false);

        let staged = self.staged.take();
        let removals = self.pending_removals.take();
        let mut released = Vec::with_capacity(removals.len());
        {
            let mut timers = self.timers.borrow_mut();
            for timer in staged {
                timers.insert(timer.id(), RefCell::new(timer));
            }
            for id in &removals {
                if let Some(timer) = timers.remove(id) {
                    released.push(timer.into_inner());
                }
            }
        }
        let removed = released.len();
        Some((PassReport { fired, removed }, released))
    }

    /// Takes every timer out without firing it and resets the id counter.
    ///
    /// As with [`run_pass`](Self::run_pass), the caller drops the returned
    /// timers once the lock is released.
    pub(crate) fn clear(&self) -> Result<Vec<Timer>, SchedulerError> {
        if self.in_pass.get() {
            return Err(SchedulerError::PassInFlight);
        }
        let mut released = self.staged.take();
        released.extend(self.timers.take().into_values().map(RefCell::into_inner));
        self.pending_removals.borrow_mut().clear();
        self.next_id.set(0);
        Ok(released)
    }

    fn is_stored(&self, id: TimerId) -> bool {
        self.timers.borrow().contains_key(&id)
            || self.staged.borrow().iter().any(|t| t.id() == id)
    }

    #[cfg(test)]
    pub(crate) fn set_next_id(&self, raw: u64) {
        self.next_id.set(raw);
    }
}
