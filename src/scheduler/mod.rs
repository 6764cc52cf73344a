//! The timer manager.
//!
//! A [`Scheduler`] owns a registry of [`Timer`]s keyed by [`TimerId`]. Each
//! evaluation pass walks every live timer under one exclusive lock, fires the
//! ones that are due, and removes finished or cancelled timers once the walk
//! is over. Passes are driven either by the caller ([`Scheduler::update`]) or
//! by a background thread ([`Scheduler::start`]).
//!
//! # Locking
//!
//! All registry state sits behind a single reentrant lock that is held for
//! the whole pass, handler invocations included. Firing is therefore
//! serialized per scheduler: a slow handler delays every other timer and the
//! next pass. A handler may call back into the scheduler on the evaluating
//! thread (register, cancel, query, stop); other threads block until the
//! pass ends.
//!
//! # Handles
//!
//! Handlers are `'static`, so a handler that needs the scheduler captures a
//! [`SchedulerHandle`]. A handle stored inside a timer keeps the scheduler's
//! state alive; dropping the owning [`Scheduler`] clears every timer, which
//! releases such handles. Once the scheduler is dropped, its handles can no
//! longer start a background loop.
//!
//! [`Timer`]: crate::timer::Timer

mod state;
mod worker;

use crate::config::SchedulerConfig;
use crate::error::SchedulerError;
use crate::time::{TimeSource, WallClock};
use crate::timer::{Handler, Repeat, Timer};
use crate::types::{Time, TimerId};
use parking_lot::ReentrantMutex;
use state::State;
use std::fmt;
use std::sync::Arc;
use std::time::Duration;
use worker::LoopControl;

pub(crate) struct Shared<T> {
    clock: T,
    config: SchedulerConfig,
    state: ReentrantMutex<State>,
    control: LoopControl,
}

impl<T: TimeSource> Shared<T> {
    fn register(&self, handler: Handler, interval: Duration, repeat: Repeat) -> TimerId {
        let state = self.state.lock();
        let id = state.allocate_id();
        let timer = Timer::new(id, Some(handler), interval, repeat, self.clock.now());
        tracing::debug!(
            timer_id = %id,
            ?repeat,
            interval_ms = interval.as_millis(),
            next_due = %timer.next_due(),
            "timer registered"
        );
        state.insert(timer);
        id
    }

    fn update(&self) -> u64 {
        let state = self.state.lock();
        let now = self.clock.now();
        let Some((report, released)) = state.run_pass(now) else {
            drop(state);
            tracing::warn!("update called from inside a handler; nested pass skipped");
            return 0;
        };
        let remaining = state.len();
        drop(state);
        // Released handlers may call back into the scheduler when dropped.
        drop(released);
        tracing::trace!(
            now = %now,
            fired = report.fired,
            removed = report.removed,
            remaining,
            "evaluation pass complete"
        );
        report.fired
    }

    /// True when the calling thread is running a handler of an in-flight pass.
    fn inside_pass_on_this_thread(&self) -> bool {
        self.state.try_lock().is_some_and(|state| state.in_pass())
    }
}

/// Cloneable access to a scheduler, for handlers and other threads.
///
/// A handle offers every operation of the [`Scheduler`] that created it, but
/// dropping a handle neither stops the loop nor clears timers.
pub struct SchedulerHandle<T: TimeSource = WallClock> {
    shared: Arc<Shared<T>>,
}

impl<T: TimeSource> Clone for SchedulerHandle<T> {
    fn clone(&self) -> Self {
        Self {
            shared: Arc::clone(&self.shared),
        }
    }
}

impl<T: TimeSource> fmt::Debug for SchedulerHandle<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("SchedulerHandle")
            .field("timers", &self.len())
            .field("running", &self.is_running())
            .finish()
    }
}

impl<T: TimeSource> SchedulerHandle<T> {
    /// Fires `handler` once, `delay` from now.
    pub fn schedule_once<F>(&self, handler: F, delay: Duration) -> TimerId
    where
        F: FnMut() + Send + 'static,
    {
        self.shared.register(Box::new(handler), delay, Repeat::Once)
    }

    /// Fires `handler` every `period`, forever, starting one period from now.
    pub fn schedule_repeating<F>(&self, handler: F, period: Duration) -> TimerId
    where
        F: FnMut() + Send + 'static,
    {
        self.shared.register(Box::new(handler), period, Repeat::Forever)
    }

    /// Fires `handler` exactly `count` times, `period` apart, starting one
    /// period from now.
    ///
    /// Returns [`TimerId::INVALID`] and registers nothing if `count < 1`.
    pub fn schedule_n_times<F>(&self, handler: F, period: Duration, count: i64) -> TimerId
    where
        F: FnMut() + Send + 'static,
    {
        self.try_schedule_n_times(handler, period, count)
            .unwrap_or(TimerId::INVALID)
    }

    /// Like [`schedule_n_times`](Self::schedule_n_times), reporting a
    /// rejected count as an error.
    pub fn try_schedule_n_times<F>(
        &self,
        handler: F,
        period: Duration,
        count: i64,
    ) -> Result<TimerId, SchedulerError>
    where
        F: FnMut() + Send + 'static,
    {
        let Some(repeat) = Repeat::from_count(count) else {
            tracing::debug!(count, "bounded repeat rejected");
            return Err(SchedulerError::InvalidRepeatCount(count));
        };
        Ok(self.shared.register(Box::new(handler), period, repeat))
    }

    /// Removes `id` at the end of the current or next pass.
    ///
    /// The timer is not evaluated again, even by the pass currently in
    /// flight. Unknown ids and [`TimerId::INVALID`] are ignored.
    pub fn cancel(&self, id: TimerId) {
        let state = self.shared.state.lock();
        if state.cancel(id) {
            tracing::debug!(timer_id = %id, "timer cancelled");
        }
    }

    /// Runs one evaluation pass on the calling thread.
    ///
    /// Returns the number of handler invocations. Called from inside a
    /// handler, it does nothing and returns zero.
    pub fn update(&self) -> u64 {
        self.shared.update()
    }

    /// Drops every timer without firing it and resets the id counter.
    ///
    /// Waits for an in-flight pass on another thread to finish; refused with
    /// [`SchedulerError::PassInFlight`] from inside a handler.
    pub fn clear(&self) -> Result<(), SchedulerError> {
        let state = self.shared.state.lock();
        let released = state.clear()?;
        drop(state);
        let dropped = released.len();
        drop(released);
        tracing::debug!(dropped, "scheduler cleared");
        Ok(())
    }

    /// Asks the background loop to exit after its current pass and blocks
    /// until it has.
    ///
    /// Idempotent. From inside a handler it only requests the exit.
    pub fn stop(&self) {
        let control = &self.shared.control;
        let was_running = control.is_running();
        let generation = control.request_stop();
        if was_running {
            tracing::debug!(generation, "evaluation loop stop requested");
        }
        if !self.shared.inside_pass_on_this_thread() {
            control.wait_for_exit(generation);
        }
    }

    /// Blocks until the background loop exits, without asking it to.
    ///
    /// Returns immediately if no loop is running or when called from inside
    /// a handler.
    pub fn wait(&self) {
        if !self.shared.inside_pass_on_this_thread() {
            let control = &self.shared.control;
            control.wait_for_exit(control.generation());
        }
    }

    /// True while the background loop is running.
    #[must_use]
    pub fn is_running(&self) -> bool {
        self.shared.control.is_running()
    }

    /// True if `id` names a live timer that is not queued for removal.
    #[must_use]
    pub fn contains(&self, id: TimerId) -> bool {
        self.shared.state.lock().contains(id)
    }

    /// Number of stored timers, including those queued for removal.
    #[must_use]
    pub fn len(&self) -> usize {
        self.shared.state.lock().len()
    }

    /// True if no timers are stored.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Earliest due time among live timers.
    #[must_use]
    pub fn next_deadline(&self) -> Option<Time> {
        self.shared.state.lock().next_deadline()
    }

    /// Current time of the scheduler's clock.
    #[must_use]
    pub fn now(&self) -> Time {
        self.shared.clock.now()
    }

    /// The configuration this scheduler was built with.
    #[must_use]
    pub fn config(&self) -> &SchedulerConfig {
        &self.shared.config
    }
}

impl<T: TimeSource + 'static> SchedulerHandle<T> {
    /// Starts the background loop at the configured cadence.
    ///
    /// Fails with [`SchedulerError::AlreadyRunning`] while a loop is alive
    /// and with [`SchedulerError::Closed`] once the owning [`Scheduler`] has
    /// been dropped.
    pub fn start(&self) -> Result<(), SchedulerError> {
        self.start_with_cadence(self.shared.config.cadence)
    }

    /// Starts the background loop with an explicit cadence.
    pub fn start_with_cadence(&self, cadence: Duration) -> Result<(), SchedulerError> {
        worker::spawn(&self.shared, cadence)
    }
}

/// Owner of a timer registry.
///
/// Dropping the scheduler stops its background loop and drops every timer.
///
/// # Example
///
/// ```
/// use std::sync::atomic::{AtomicUsize, Ordering};
/// use std::sync::Arc;
/// use std::time::Duration;
/// use timerkit::time::VirtualClock;
/// use timerkit::types::Time;
/// use timerkit::{Scheduler, SchedulerConfig};
///
/// let clock = Arc::new(VirtualClock::new());
/// let scheduler = Scheduler::with_clock_and_config(Arc::clone(&clock), SchedulerConfig::default());
///
/// let fired = Arc::new(AtomicUsize::new(0));
/// let counter = Arc::clone(&fired);
/// scheduler.schedule_n_times(
///     move || {
///         counter.fetch_add(1, Ordering::SeqCst);
///     },
///     Duration::from_secs(3),
///     5,
/// );
///
/// clock.set(Time::from_secs(16));
/// scheduler.update();
/// assert_eq!(fired.load(Ordering::SeqCst), 5);
/// assert!(scheduler.is_empty());
/// ```
pub struct Scheduler<T: TimeSource = WallClock> {
    handle: SchedulerHandle<T>,
}

impl Scheduler<WallClock> {
    /// Creates a wall-clock scheduler with default configuration.
    #[must_use]
    pub fn new() -> Self {
        Self::with_config(SchedulerConfig::default())
    }

    /// Creates a wall-clock scheduler with the given configuration.
    #[must_use]
    pub fn with_config(config: SchedulerConfig) -> Self {
        Self::with_clock_and_config(WallClock::new(), config)
    }
}

impl Default for Scheduler<WallClock> {
    fn default() -> Self {
        Self::new()
    }
}

impl<T: TimeSource> Scheduler<T> {
    /// Creates a scheduler reading time from `clock`.
    #[must_use]
    pub fn with_clock(clock: T) -> Self {
        Self::with_clock_and_config(clock, SchedulerConfig::default())
    }

    /// Creates a scheduler reading time from `clock` with `config`.
    #[must_use]
    pub fn with_clock_and_config(clock: T, config: SchedulerConfig) -> Self {
        let shared = Shared {
            clock,
            config,
            state: ReentrantMutex::new(State::default()),
            control: LoopControl::default(),
        };
        Self {
            handle: SchedulerHandle {
                shared: Arc::new(shared),
            },
        }
    }

    /// Returns a cloneable handle to this scheduler.
    #[must_use]
    pub fn handle(&self) -> SchedulerHandle<T> {
        self.handle.clone()
    }

    /// See [`SchedulerHandle::schedule_once`].
    pub fn schedule_once<F>(&self, handler: F, delay: Duration) -> TimerId
    where
        F: FnMut() + Send + 'static,
    {
        self.handle.schedule_once(handler, delay)
    }

    /// See [`SchedulerHandle::schedule_repeating`].
    pub fn schedule_repeating<F>(&self, handler: F, period: Duration) -> TimerId
    where
        F: FnMut() + Send + 'static,
    {
        self.handle.schedule_repeating(handler, period)
    }

    /// See [`SchedulerHandle::schedule_n_times`].
    pub fn schedule_n_times<F>(&self, handler: F, period: Duration, count: i64) -> TimerId
    where
        F: FnMut() + Send + 'static,
    {
        self.handle.schedule_n_times(handler, period, count)
    }

    /// See [`SchedulerHandle::try_schedule_n_times`].
    pub fn try_schedule_n_times<F>(
        &self,
        handler: F,
        period: Duration,
        count: i64,
    ) -> Result<TimerId, SchedulerError>
    where
        F: FnMut() + Send + 'static,
    {
        self.handle.try_schedule_n_times(handler, period, count)
    }

    /// See [`SchedulerHandle::cancel`].
    pub fn cancel(&self, id: TimerId) {
        self.handle.cancel(id);
    }

    /// See [`SchedulerHandle::update`].
    pub fn update(&self) -> u64 {
        self.handle.update()
    }

    /// See [`SchedulerHandle::clear`].
    pub fn clear(&self) -> Result<(), SchedulerError> {
        self.handle.clear()
    }

    /// See [`SchedulerHandle::stop`].
    pub fn stop(&self) {
        self.handle.stop();
    }

    /// See [`SchedulerHandle::wait`].
    pub fn wait(&self) {
        self.handle.wait();
    }

    /// See [`SchedulerHandle::is_running`].
    #[must_use]
    pub fn is_running(&self) -> bool {
        self.handle.is_running()
    }

    /// See [`SchedulerHandle::contains`].
    #[must_use]
    pub fn contains(&self, id: TimerId) -> bool {
        self.handle.contains(id)
    }

    /// See [`SchedulerHandle::len`].
    #[must_use]
    pub fn len(&self) -> usize {
        self.handle.len()
    }

    /// See [`SchedulerHandle::is_empty`].
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.handle.is_empty()
    }

    /// See [`SchedulerHandle::next_deadline`].
    #[must_use]
    pub fn next_deadline(&self) -> Option<Time> {
        self.handle.next_deadline()
    }

    /// See [`SchedulerHandle::now`].
    #[must_use]
    pub fn now(&self) -> Time {
        self.handle.now()
    }

    /// See [`SchedulerHandle::config`].
    #[must_use]
    pub fn config(&self) -> &SchedulerConfig {
        self.handle.config()
    }
}

impl<T: TimeSource + 'static> Scheduler<T> {
    /// See [`SchedulerHandle::start`].
    pub fn start(&self) -> Result<(), SchedulerError> {
        self.handle.start()
    }

    /// See [`SchedulerHandle::start_with_cadence`].
    pub fn start_with_cadence(&self, cadence: Duration) -> Result<(), SchedulerError> {
        self.handle.start_with_cadence(cadence)
    }
}

impl<T: TimeSource> fmt::Debug for Scheduler<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Scheduler")
            .field("timers", &self.len())
            .field("running", &self.is_running())
            .field("cadence", &self.config().cadence)
            .finish()
    }
}

impl<T: TimeSource> Drop for Scheduler<T> {
    fn drop(&mut self) {
        let generation = self.handle.shared.control.close();
        if !self.handle.shared.inside_pass_on_this_thread() {
            self.handle.shared.control.wait_for_exit(generation);
        }
        if let Err(err) = self.handle.clear() {
            tracing::warn!(error = %err, "scheduler dropped inside a handler; timers kept");
        }
    }
}
