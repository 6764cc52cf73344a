//! Background evaluation loop.
//!
//! The loop runs one pass, measures how long it took, and idles for the rest
//! of the cadence. A slow pass shortens the idle time; a pass longer than the
//! cadence is followed immediately by the next one. Lateness beyond that is
//! absorbed by the timers' catch-up firing.
//!
//! Every start, stop request and exit is decided under the `slot` lock. Each
//! spawned loop gets a fresh generation number, and a stop waits only for the
//! generation it asked to stop.

use super::Shared;
use crate::error::SchedulerError;
use crate::time::TimeSource;
use parking_lot::{Condvar, Mutex};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::thread::{self, JoinHandle};
use std::time::{Duration, Instant};

/// Start/stop bookkeeping for the evaluation thread.
#[derive(Debug, Default)]
pub(crate) struct LoopControl {
    /// Cleared to ask the loop to exit after its current pass.
    running: AtomicBool,
    slot: Mutex<LoopSlot>,
    /// Signalled when a stop is requested.
    wake: Condvar,
    /// Signalled when the loop thread exits.
    exited: Condvar,
}

#[derive(Debug, Default)]
struct LoopSlot {
    handle: Option<JoinHandle<()>>,
    alive: bool,
    /// Bumped by every successful spawn.
    generation: u64,
    /// Set once the owning scheduler is gone; no loop may start after.
    closed: bool,
}

impl LoopControl {
    pub(crate) fn is_running(&self) -> bool {
        self.running.load(Ordering::Acquire)
    }

    /// Asks the current loop to exit and wakes it if it is idling.
    ///
    /// Returns the generation the request applies to.
    pub(crate) fn request_stop(&self) -> u64 {
        let slot = self.slot.lock();
        self.running.store(false, Ordering::Release);
        self.wake.notify_all();
        slot.generation
    }

    /// Refuses every later start and asks the current loop to exit.
    pub(crate) fn close(&self) -> u64 {
        let mut slot = self.slot.lock();
        slot.closed = true;
        self.running.store(false, Ordering::Release);
        self.wake.notify_all();
        slot.generation
    }

    /// Generation of the most recently spawned loop.
    pub(crate) fn generation(&self) -> u64 {
        self.slot.lock().generation
    }

    /// Blocks until the loop of `generation` has exited.
    ///
    /// Returns immediately when that loop is not alive, when a newer loop has
    /// replaced it, and when called from the loop thread itself.
    pub(crate) fn wait_for_exit(&self, generation: u64) {
        let mut slot = self.slot.lock();
        let on_loop_thread = slot
            .handle
            .as_ref()
            .is_some_and(|h| h.thread().id() == thread::current().id());
        if on_loop_thread {
            return;
        }
        while slot.alive && slot.generation == generation {
            self.exited.wait(&mut slot);
        }
        if slot.generation != generation || slot.alive {
            return;
        }
        let handle = slot.handle.take();
        drop(slot);
        if let Some(handle) = handle {
            if handle.join().is_err() {
                tracing::error!("evaluation loop thread panicked");
            }
        }
    }

    /// Sleeps for `idle` unless a stop is requested first.
    fn idle(&self, idle: Duration) {
        let mut slot = self.slot.lock();
        if self.is_running() {
            let _ = self.wake.wait_for(&mut slot, idle);
        }
    }
}

/// Marks the loop dead when the thread leaves `run_loop`, even by unwinding.
struct ExitGuard<'a>(&'a LoopControl);

impl Drop for ExitGuard<'_> {
    fn drop(&mut self) {
        let mut slot = self.0.slot.lock();
        self.0.running.store(false, Ordering::Release);
        slot.alive = false;
        self.0.exited.notify_all();
    }
}

/// Spawns the evaluation thread for `shared`.
pub(crate) fn spawn<T>(shared: &Arc<Shared<T>>, cadence: Duration) -> Result<(), SchedulerError>
where
    T: TimeSource + 'static,
{
    let control = &shared.control;
    let mut slot = control.slot.lock();
    if slot.closed {
        return Err(SchedulerError::Closed);
    }
    if slot.alive {
        return Err(SchedulerError::AlreadyRunning);
    }
    // Reap a loop that stopped itself from inside a handler.
    if let Some(previous) = slot.handle.take() {
        if previous.join().is_err() {
            tracing::error!("previous evaluation loop thread panicked");
        }
    }

    control.running.store(true, Ordering::Release);
    let worker = Arc::clone(shared);
    let spawned = thread::Builder::new()
        .name(shared.config.thread_name.clone())
        .spawn(move || run_loop(&worker, cadence));

    match spawned {
        Ok(handle) => {
            slot.handle = Some(handle);
            slot.alive = true;
            slot.generation = slot.generation.wrapping_add(1);
            tracing::debug!(
                cadence_ms = cadence.as_millis(),
                thread = %shared.config.thread_name,
                generation = slot.generation,
                "evaluation loop started"
            );
            Ok(())
        }
        Err(err) => {
            control.running.store(false, Ordering::Release);
            Err(err.into())
        }
    }
}

fn run_loop<T: TimeSource>(shared: &Shared<T>, cadence: Duration) {
    let control = &shared.control;
    let _exit = ExitGuard(control);

    while control.is_running() {
        let started = Instant::now();
        shared.update();
        let elapsed = started.elapsed();
        if let Some(idle) = cadence.checked_sub(elapsed) {
            if !idle.is_zero() {
                control.idle(idle);
            }
        }
    }

    tracing::debug!("evaluation loop exited");
}
