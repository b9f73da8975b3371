//! Emulated primitives: everything from `Mutex` + `Condvar`
//!
//! Each primitive keeps its state behind its own lock and sleeps on its own
//! condition variable. Every wait re-checks its predicate in a loop, so a
//! spurious wakeup never lets a caller through early.

use super::{
    BarrierWaitResult, RawBarrier, RawMutex, RawSemaphore, SEMAPHORE_MAX, SyncBackend,
};
use crate::error::{Result, SyncError};
use std::sync::{Condvar, Mutex};
use std::thread::{self, ThreadId};

/// Portable backend
#[derive(Debug)]
pub struct Emulated;

impl SyncBackend for Emulated {
    const NAME: &'static str = "emulated";

    type Semaphore = EmulatedSemaphore;
    type Mutex = EmulatedMutex;
    type Barrier = EmulatedBarrier;
}

fn poisoned(op: &'static str) -> SyncError {
    SyncError::Poisoned { op }
}

// =============================================================================
// Counting semaphore
// =============================================================================

#[derive(Debug)]
pub struct EmulatedSemaphore {
    count: Mutex<u32>,
    available: Condvar,
}

impl RawSemaphore for EmulatedSemaphore {
    fn new(initial: u32) -> Result<Self> {
        Ok(Self {
            count: Mutex::new(initial),
            available: Condvar::new(),
        })
    }

    fn acquire(&self) -> Result<()> {
        let mut count = self.count.lock().map_err(|_| poisoned("sem_acquire"))?;
        while *count == 0 {
            count = self
                .available
                .wait(count)
                .map_err(|_| poisoned("sem_acquire"))?;
        }
        *count -= 1;
        Ok(())
    }

    fn try_acquire(&self) -> Result<bool> {
        let mut count = self
            .count
            .lock()
            .map_err(|_| poisoned("sem_try_acquire"))?;
        if *count == 0 {
            return Ok(false);
        }
        *count -= 1;
        Ok(true)
    }

    fn release(&self) -> Result<()> {
        let mut count = self.count.lock().map_err(|_| poisoned("sem_release"))?;
        if *count >= SEMAPHORE_MAX {
            return Err(SyncError::Overflow { op: "sem_release" });
        }
        *count += 1;
        // One unit, one waiter
        self.available.notify_one();
        Ok(())
    }

    fn value(&self) -> Result<u32> {
        Ok(*self.count.lock().map_err(|_| poisoned("sem_value"))?)
    }
}

// =============================================================================
// Error-checking mutex
// =============================================================================

/// Lock and unlock are separate calls, so ownership is tracked by thread id
/// rather than by a guard.
#[derive(Debug)]
pub struct EmulatedMutex {
    owner: Mutex<Option<ThreadId>>,
    unlocked: Condvar,
}

impl RawMutex for EmulatedMutex {
    fn new() -> Result<Self> {
        Ok(Self {
            owner: Mutex::new(None),
            unlocked: Condvar::new(),
        })
    }

    fn lock(&self) -> Result<()> {
        let me = thread::current().id();
        let mut owner = self.owner.lock().map_err(|_| poisoned("mutex_lock"))?;
        if *owner == Some(me) {
            return Err(SyncError::Deadlock { op: "mutex_lock" });
        }
        while owner.is_some() {
            owner = self
                .unlocked
                .wait(owner)
                .map_err(|_| poisoned("mutex_lock"))?;
        }
        *owner = Some(me);
        Ok(())
    }

    fn try_lock(&self) -> Result<bool> {
        let me = thread::current().id();
        let mut owner = self.owner.lock().map_err(|_| poisoned("mutex_try_lock"))?;
        match *owner {
            Some(_) => Ok(false),
            None => {
                *owner = Some(me);
                Ok(true)
            }
        }
    }

    fn unlock(&self) -> Result<()> {
        let me = thread::current().id();
        let mut owner = self.owner.lock().map_err(|_| poisoned("mutex_unlock"))?;
        if *owner != Some(me) {
            return Err(SyncError::NotOwner { op: "mutex_unlock" });
        }
        *owner = None;
        self.unlocked.notify_one();
        Ok(())
    }
}

// =============================================================================
// Cyclic barrier
// =============================================================================

#[derive(Debug)]
struct BarrierState {
    /// Arrivals in the current round; always < required between rounds
    waiting: u32,
    /// Completed rounds; advances by exactly one per round
    generation: u64,
}

/// Reusable rendezvous for a fixed number of participants
///
/// The last participant to arrive starts the next generation and wakes the
/// others instead of sleeping. A sleeper leaves only once the generation it
/// saw on arrival has moved on.
#[derive(Debug)]
pub struct EmulatedBarrier {
    state: Mutex<BarrierState>,
    round_complete: Condvar,
    required: u32,
}

impl EmulatedBarrier {
    /// Number of completed rounds
    pub fn generation(&self) -> Result<u64> {
        Ok(self
            .state
            .lock()
            .map_err(|_| poisoned("barrier_generation"))?
            .generation)
    }

    /// Participants currently blocked in the open round
    pub fn waiting(&self) -> Result<u32> {
        Ok(self
            .state
            .lock()
            .map_err(|_| poisoned("barrier_waiting"))?
            .waiting)
    }
}

impl RawBarrier for EmulatedBarrier {
    fn new(required: u32) -> Result<Self> {
        if required == 0 {
            return Err(SyncError::invalid(
                "barrier_init",
                "participant count must be at least 1",
            ));
        }
        Ok(Self {
            state: Mutex::new(BarrierState {
                waiting: 0,
                generation: 0,
            }),
            round_complete: Condvar::new(),
            required,
        })
    }

    fn wait(&self) -> Result<BarrierWaitResult> {
        let mut state = self.state.lock().map_err(|_| poisoned("barrier_wait"))?;
        let arrived_in = state.generation;
        state.waiting += 1;

        if state.waiting >= self.required {
            state.generation = state.generation.wrapping_add(1);
            state.waiting = 0;
            self.round_complete.notify_all();
            return Ok(BarrierWaitResult::new(true));
        }

        while state.generation == arrived_in {
            state = self
                .round_complete
                .wait(state)
                .map_err(|_| poisoned("barrier_wait"))?;
        }
        Ok(BarrierWaitResult::new(false))
    }
}
