//! Synchronization backends
//!
//! The sync layer talks to primitives only through the traits below. A backend
//! supplies one implementation of each:
//!
//! - [`emulated::Emulated`]: everything built from `std::sync::Mutex` and
//!   `Condvar`, including the generation-counted cyclic barrier. Works on any
//!   host and is always compiled.
//! - `native::Native` (Linux): forwards to POSIX `sem_t`, error-checking
//!   `pthread_mutex_t` and `pthread_barrier_t`.
//!
//! [`DefaultBackend`] is picked at build time. Enabling the `emulated` feature
//! forces the emulated backend everywhere.
//!
//! Both backends behave identically from the outside:
//! - semaphore release wakes at most one acquirer
//! - mutexes are non-reentrant and error-checking (relock is `Deadlock`,
//!   unlock by a non-owner is `NotOwner`)
//! - each barrier round releases all participants together and names exactly
//!   one of them leader

use crate::error::Result;

pub mod emulated;
#[cfg(target_os = "linux")]
pub mod native;

/// Largest count a semaphore may hold
pub const SEMAPHORE_MAX: u32 = i32::MAX as u32;

/// Outcome of a barrier wait
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct BarrierWaitResult {
    is_leader: bool,
}

impl BarrierWaitResult {
    pub(crate) fn new(is_leader: bool) -> Self {
        Self { is_leader }
    }

    /// True for exactly one participant per round
    pub fn is_leader(&self) -> bool {
        self.is_leader
    }
}

pub trait RawSemaphore: Send + Sync + Sized {
    /// `initial` has already been checked against [`SEMAPHORE_MAX`]
    fn new(initial: u32) -> Result<Self>;

    /// Block until the count is positive, then decrement it
    fn acquire(&self) -> Result<()>;

    /// Decrement without blocking; `false` if the count was zero
    fn try_acquire(&self) -> Result<bool>;

    /// Increment the count and wake one blocked acquirer
    fn release(&self) -> Result<()>;

    /// Current count (a snapshot)
    fn value(&self) -> Result<u32>;
}

pub trait RawMutex: Send + Sync + Sized {
    fn new() -> Result<Self>;

    fn lock(&self) -> Result<()>;

    /// Lock without blocking; `false` if another thread holds it
    fn try_lock(&self) -> Result<bool>;

    fn unlock(&self) -> Result<()>;
}

pub trait RawBarrier: Send + Sync + Sized {
    /// `required` is at least 1
    fn new(required: u32) -> Result<Self>;

    /// Block until `required` participants of the current round have arrived
    fn wait(&self) -> Result<BarrierWaitResult>;
}

/// A family of primitives chosen together
pub trait SyncBackend: Send + Sync + 'static {
    /// Short name for logs
    const NAME: &'static str;

    type Semaphore: RawSemaphore;
    type Mutex: RawMutex;
    type Barrier: RawBarrier;
}

#[cfg(all(target_os = "linux", not(feature = "emulated")))]
pub type DefaultBackend = native::Native;

#[cfg(any(not(target_os = "linux"), feature = "emulated"))]
pub type DefaultBackend = emulated::Emulated;
