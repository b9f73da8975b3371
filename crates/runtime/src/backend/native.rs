//! Native primitives: POSIX semaphores, mutexes and barriers via libc
//!
//! Each primitive lives in a `Box<UnsafeCell<_>>` so its address never changes
//! after `*_init`; POSIX objects must not be moved once initialized.
//!
//! ## Error mapping
//!
//! | errno / return code | SyncError |
//! |---------------------|-----------|
//! | `EINTR` | `Interrupted` (never retried) |
//! | `EDEADLK` | `Deadlock` |
//! | `EPERM` on unlock | `NotOwner` |
//! | `EOVERFLOW` | `Overflow` |
//! | anything during init | `CreateFailed` |
//! | anything else | `Os` |

use super::{
    BarrierWaitResult, RawBarrier, RawMutex, RawSemaphore, SEMAPHORE_MAX, SyncBackend,
};
use crate::error::{Result, SyncError};
use std::cell::UnsafeCell;
use std::io;

/// Linux backend
#[derive(Debug)]
pub struct Native;

impl SyncBackend for Native {
    const NAME: &'static str = "native";

    type Semaphore = NativeSemaphore;
    type Mutex = NativeMutex;
    type Barrier = NativeBarrier;
}

/// Map an error code from a blocking or state-changing call
fn op_error(op: &'static str, code: i32) -> SyncError {
    match code {
        libc::EINTR => SyncError::Interrupted { op },
        libc::EDEADLK => SyncError::Deadlock { op },
        libc::EPERM => SyncError::NotOwner { op },
        libc::EOVERFLOW => SyncError::Overflow { op },
        _ => SyncError::Os {
            op,
            source: io::Error::from_raw_os_error(code),
        },
    }
}

fn create_error(op: &'static str, code: i32) -> SyncError {
    SyncError::CreateFailed {
        op,
        source: io::Error::from_raw_os_error(code),
    }
}

// sem_* report failures through errno; pthread_* return the code directly.
fn last_errno() -> i32 {
    io::Error::last_os_error().raw_os_error().unwrap_or(libc::EINVAL)
}

// =============================================================================
// Counting semaphore
// =============================================================================

pub struct NativeSemaphore {
    raw: Box<UnsafeCell<libc::sem_t>>,
}

// SAFETY: sem_t is designed for concurrent use from multiple threads; all
// access goes through the sem_* functions.
unsafe impl Send for NativeSemaphore {}
unsafe impl Sync for NativeSemaphore {}

impl RawSemaphore for NativeSemaphore {
    fn new(initial: u32) -> Result<Self> {
        debug_assert!(initial <= SEMAPHORE_MAX);
        // SAFETY: sem_t is plain data; sem_init fully initializes it.
        let raw = Box::new(UnsafeCell::new(unsafe { std::mem::zeroed::<libc::sem_t>() }));
        // SAFETY: raw points to a live, pinned sem_t; pshared = 0 (process-private).
        if unsafe { libc::sem_init(raw.get(), 0, initial as libc::c_uint) } != 0 {
            return Err(create_error("sem_init", last_errno()));
        }
        Ok(Self { raw })
    }

    fn acquire(&self) -> Result<()> {
        // SAFETY: initialized in new(), destroyed only in drop()
        if unsafe { libc::sem_wait(self.raw.get()) } != 0 {
            return Err(op_error("sem_wait", last_errno()));
        }
        Ok(())
    }

    fn try_acquire(&self) -> Result<bool> {
        // SAFETY: initialized in new(), destroyed only in drop()
        if unsafe { libc::sem_trywait(self.raw.get()) } == 0 {
            return Ok(true);
        }
        match last_errno() {
            libc::EAGAIN => Ok(false),
            code => Err(op_error("sem_trywait", code)),
        }
    }

    fn release(&self) -> Result<()> {
        // SEM_VALUE_MAX is INT_MAX on Linux, the same ceiling as SEMAPHORE_MAX,
        // so sem_post reports EOVERFLOW exactly where the emulated backend does.
        // SAFETY: initialized in new(), destroyed only in drop()
        if unsafe { libc::sem_post(self.raw.get()) } != 0 {
            return Err(op_error("sem_post", last_errno()));
        }
        Ok(())
    }

    fn value(&self) -> Result<u32> {
        let mut value: libc::c_int = 0;
        // SAFETY: initialized in new(); value is a valid out-pointer
        if unsafe { libc::sem_getvalue(self.raw.get(), &mut value) } != 0 {
            return Err(op_error("sem_getvalue", last_errno()));
        }
        // Linux reports 0 (not a negative waiter count) when threads are blocked
        Ok(value.max(0) as u32)
    }
}

impl Drop for NativeSemaphore {
    fn drop(&mut self) {
        // SAFETY: drop runs once, after every Arc holder is gone
        unsafe {
            libc::sem_destroy(self.raw.get());
        }
    }
}

// =============================================================================
// Error-checking mutex
// =============================================================================

pub struct NativeMutex {
    raw: Box<UnsafeCell<libc::pthread_mutex_t>>,
}

// SAFETY: pthread mutexes are shared between threads by design.
unsafe impl Send for NativeMutex {}
unsafe impl Sync for NativeMutex {}

impl RawMutex for NativeMutex {
    fn new() -> Result<Self> {
        let raw = Box::new(UnsafeCell::new(libc::PTHREAD_MUTEX_INITIALIZER));
        // SAFETY: attr is initialized before use and destroyed afterwards;
        // raw is pinned in its box.
        unsafe {
            let mut attr: libc::pthread_mutexattr_t = std::mem::zeroed();
            let rc = libc::pthread_mutexattr_init(&mut attr);
            if rc != 0 {
                return Err(create_error("pthread_mutexattr_init", rc));
            }
            let rc = libc::pthread_mutexattr_settype(&mut attr, libc::PTHREAD_MUTEX_ERRORCHECK);
            if rc != 0 {
                libc::pthread_mutexattr_destroy(&mut attr);
                return Err(create_error("pthread_mutexattr_settype", rc));
            }
            let rc = libc::pthread_mutex_init(raw.get(), &attr);
            libc::pthread_mutexattr_destroy(&mut attr);
            if rc != 0 {
                return Err(create_error("pthread_mutex_init", rc));
            }
        }
        Ok(Self { raw })
    }

    fn lock(&self) -> Result<()> {
        // SAFETY: initialized in new(), destroyed only in drop()
        match unsafe { libc::pthread_mutex_lock(self.raw.get()) } {
            0 => Ok(()),
            code => Err(op_error("mutex_lock", code)),
        }
    }

    fn try_lock(&self) -> Result<bool> {
        // SAFETY: initialized in new(), destroyed only in drop()
        match unsafe { libc::pthread_mutex_trylock(self.raw.get()) } {
            0 => Ok(true),
            libc::EBUSY => Ok(false),
            code => Err(op_error("mutex_try_lock", code)),
        }
    }

    fn unlock(&self) -> Result<()> {
        // SAFETY: initialized in new(); ERRORCHECK rejects non-owners with EPERM
        match unsafe { libc::pthread_mutex_unlock(self.raw.get()) } {
            0 => Ok(()),
            code => Err(op_error("mutex_unlock", code)),
        }
    }
}

impl Drop for NativeMutex {
    fn drop(&mut self) {
        // SAFETY: no other holder remains. Destroying a locked mutex returns
        // EBUSY and is otherwise harmless here.
        unsafe {
            libc::pthread_mutex_destroy(self.raw.get());
        }
    }
}

// =============================================================================
// Cyclic barrier
// =============================================================================

pub struct NativeBarrier {
    raw: Box<UnsafeCell<libc::pthread_barrier_t>>,
}

// SAFETY: pthread barriers are shared between threads by design.
unsafe impl Send for NativeBarrier {}
unsafe impl Sync for NativeBarrier {}

impl RawBarrier for NativeBarrier {
    fn new(required: u32) -> Result<Self> {
        if required == 0 {
            return Err(SyncError::invalid(
                "barrier_init",
                "participant count must be at least 1",
            ));
        }
        // SAFETY: plain data, fully initialized by pthread_barrier_init
        let raw = Box::new(UnsafeCell::new(unsafe {
            std::mem::zeroed::<libc::pthread_barrier_t>()
        }));
        // SAFETY: raw is pinned; default attributes
        let rc = unsafe {
            libc::pthread_barrier_init(raw.get(), std::ptr::null(), required as libc::c_uint)
        };
        if rc != 0 {
            return Err(create_error("pthread_barrier_init", rc));
        }
        Ok(Self { raw })
    }

    fn wait(&self) -> Result<BarrierWaitResult> {
        // SAFETY: initialized in new(), destroyed only in drop()
        match unsafe { libc::pthread_barrier_wait(self.raw.get()) } {
            0 => Ok(BarrierWaitResult::new(false)),
            libc::PTHREAD_BARRIER_SERIAL_THREAD => Ok(BarrierWaitResult::new(true)),
            code => Err(op_error("barrier_wait", code)),
        }
    }
}

impl Drop for NativeBarrier {
    fn drop(&mut self) {
        // SAFETY: drop runs after every participant has released its Arc
        unsafe {
            libc::pthread_barrier_destroy(self.raw.get());
        }
    }
}
