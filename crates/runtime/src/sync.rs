//! SyncLayer: one synchronization API on every host
//!
//! Application code creates primitives here, gets back typed handles, and
//! passes those handles around inside `Variant`s. Every operation looks the
//! handle up in its registry, so a handle whose primitive has been destroyed is
//! rejected with `StaleHandle` instead of touching freed memory.
//!
//! ## Blocking
//!
//! `semaphore_acquire`, `mutex_lock`, `barrier_wait` and `join` may block
//! indefinitely. The registry lock is never held while blocking: the layer
//! clones an `Arc` to the primitive and releases the registry first. That
//! in-flight `Arc` is also how `*_destroy` notices that another thread is still
//! using a primitive and refuses with `InUse`.
//!
//! ## Observability
//!
//! Every operation emits a `tracing` event (`trace` for operations, `debug`
//! for creation and destruction, `warn` for failures). Nothing is printed
//! unless a subscriber is installed, e.g. via [`crate::logging::init`].

use crate::backend::{
    BarrierWaitResult, DefaultBackend, RawBarrier, RawMutex, RawSemaphore, SEMAPHORE_MAX,
    SyncBackend,
};
use crate::config::RuntimeConfig;
use crate::error::{Result, SyncError};
use crate::registry::Registry;
use crate::thread::ThreadResult;
use alecci_core::{Handle, HandleKind, Variant, kind};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, OnceLock};
use std::thread::JoinHandle;

static GLOBAL_LAYER: OnceLock<SyncLayer> = OnceLock::new();

/// Snapshot of live resources and thread lifecycle counters
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct LayerStats {
    pub semaphores: usize,
    pub mutexes: usize,
    pub barriers: usize,
    /// Spawned and not yet claimed by a join
    pub threads: usize,
    pub threads_spawned: u64,
    /// Counted when a join claims the handle, before it finishes waiting
    pub threads_joined: u64,
}

impl LayerStats {
    /// Spawned threads that are neither registered nor joined
    pub fn unaccounted(&self) -> u64 {
        self.threads_spawned
            .saturating_sub(self.threads_joined)
            .saturating_sub(self.threads as u64)
    }
}

pub struct SyncLayer<B: SyncBackend = DefaultBackend> {
    pub(crate) config: RuntimeConfig,
    semaphores: Registry<kind::Semaphore, Arc<B::Semaphore>>,
    mutexes: Registry<kind::Mutex, Arc<B::Mutex>>,
    barriers: Registry<kind::Barrier, Arc<B::Barrier>>,
    pub(crate) threads: Registry<kind::Thread, JoinHandle<ThreadResult>>,
    pub(crate) next_thread_serial: AtomicU64,
    pub(crate) threads_spawned: AtomicU64,
    pub(crate) threads_joined: AtomicU64,
}

impl SyncLayer<DefaultBackend> {
    /// Create a layer on the build's default backend
    pub fn new(config: RuntimeConfig) -> Self {
        Self::with_backend(config)
    }

    /// Process-wide layer, configured from the environment on first use
    pub fn global() -> &'static SyncLayer {
        GLOBAL_LAYER.get_or_init(|| SyncLayer::new(RuntimeConfig::from_env()))
    }
}

impl Default for SyncLayer<DefaultBackend> {
    fn default() -> Self {
        Self::new(RuntimeConfig::default())
    }
}

/// Destroy a shared primitive unless another thread holds it
fn destroy_shared<K: HandleKind, T>(
    registry: &Registry<K, Arc<T>>,
    handle: Handle<K>,
) -> Result<()> {
    let removed = registry.remove_if(handle, |primitive| {
        match Arc::strong_count(primitive) - 1 {
            0 => Ok(()),
            holders => Err(SyncError::InUse {
                kind: K::TAG,
                handle: handle.to_raw(),
                holders,
            }),
        }
    });
    match removed {
        Ok(_) => {
            tracing::debug!(%handle, "destroyed");
            Ok(())
        }
        Err(err) => {
            tracing::warn!(%handle, %err, "destroy refused");
            Err(err)
        }
    }
}

fn logged<T>(handle: impl std::fmt::Display, op: &'static str, result: Result<T>) -> Result<T> {
    if let Err(err) = &result {
        tracing::warn!(%handle, %err, "{} failed", op);
    }
    result
}

impl<B: SyncBackend> SyncLayer<B> {
    /// Create a layer on an explicitly chosen backend
    pub fn with_backend(config: RuntimeConfig) -> Self {
        let capacity = config.registry_capacity;
        tracing::debug!(backend = B::NAME, capacity, "sync layer created");
        Self {
            config,
            semaphores: Registry::new(capacity),
            mutexes: Registry::new(capacity),
            barriers: Registry::new(capacity),
            threads: Registry::new(capacity),
            next_thread_serial: AtomicU64::new(1),
            threads_spawned: AtomicU64::new(0),
            threads_joined: AtomicU64::new(0),
        }
    }

    pub fn backend_name(&self) -> &'static str {
        B::NAME
    }

    pub fn config(&self) -> &RuntimeConfig {
        &self.config
    }

    // =========================================================================
    // Counting semaphore
    // =========================================================================

    /// Create a semaphore holding `initial` units
    ///
    /// `initial` must lie in `0..=SEMAPHORE_MAX`.
    pub fn semaphore_init(&self, initial: i64) -> Result<Handle<kind::Semaphore>> {
        let count = u32::try_from(initial)
            .ok()
            .filter(|count| *count <= SEMAPHORE_MAX)
            .ok_or_else(|| {
                SyncError::invalid(
                    "semaphore_init",
                    format!("initial count {} outside 0..={}", initial, SEMAPHORE_MAX),
                )
            })?;
        let handle = self
            .semaphores
            .insert(Arc::new(B::Semaphore::new(count)?))?;
        tracing::debug!(%handle, initial, backend = B::NAME, "semaphore created");
        Ok(handle)
    }

    /// Block until a unit is available, then take it
    pub fn semaphore_acquire(&self, handle: Handle<kind::Semaphore>) -> Result<()> {
        let semaphore = self.semaphores.get(handle)?;
        tracing::trace!(%handle, "semaphore acquire");
        logged(handle, "semaphore acquire", semaphore.acquire())
    }

    /// Take a unit if one is available; never blocks
    pub fn semaphore_try_acquire(&self, handle: Handle<kind::Semaphore>) -> Result<bool> {
        let semaphore = self.semaphores.get(handle)?;
        logged(handle, "semaphore try_acquire", semaphore.try_acquire())
    }

    /// Return a unit and wake at most one blocked acquirer
    pub fn semaphore_release(&self, handle: Handle<kind::Semaphore>) -> Result<()> {
        let semaphore = self.semaphores.get(handle)?;
        tracing::trace!(%handle, "semaphore release");
        logged(handle, "semaphore release", semaphore.release())
    }

    /// Current count (a snapshot; may be stale by the time it is read)
    pub fn semaphore_value(&self, handle: Handle<kind::Semaphore>) -> Result<u32> {
        self.semaphores.get(handle)?.value()
    }

    /// Destroy the semaphore; refused with `InUse` while a thread is blocked on it
    pub fn semaphore_destroy(&self, handle: Handle<kind::Semaphore>) -> Result<()> {
        destroy_shared(&self.semaphores, handle)
    }

    // =========================================================================
    // Mutex
    // =========================================================================

    /// Create an unlocked, non-reentrant mutex
    pub fn mutex_init(&self) -> Result<Handle<kind::Mutex>> {
        let handle = self.mutexes.insert(Arc::new(B::Mutex::new()?))?;
        tracing::debug!(%handle, backend = B::NAME, "mutex created");
        Ok(handle)
    }

    /// Block until the calling thread owns the mutex
    ///
    /// Locking a mutex the caller already owns is `Deadlock`.
    pub fn mutex_lock(&self, handle: Handle<kind::Mutex>) -> Result<()> {
        let mutex = self.mutexes.get(handle)?;
        tracing::trace!(%handle, "mutex lock");
        logged(handle, "mutex lock", mutex.lock())
    }

    pub fn mutex_try_lock(&self, handle: Handle<kind::Mutex>) -> Result<bool> {
        let mutex = self.mutexes.get(handle)?;
        logged(handle, "mutex try_lock", mutex.try_lock())
    }

    /// Release the mutex; only the owning thread may unlock
    pub fn mutex_unlock(&self, handle: Handle<kind::Mutex>) -> Result<()> {
        let mutex = self.mutexes.get(handle)?;
        tracing::trace!(%handle, "mutex unlock");
        logged(handle, "mutex unlock", mutex.unlock())
    }

    pub fn mutex_destroy(&self, handle: Handle<kind::Mutex>) -> Result<()> {
        destroy_shared(&self.mutexes, handle)
    }

    // =========================================================================
    // Cyclic barrier
    // =========================================================================

    /// Create a barrier for `required` participants per round
    pub fn barrier_init(&self, required: u32) -> Result<Handle<kind::Barrier>> {
        if required == 0 {
            return Err(SyncError::invalid(
                "barrier_init",
                "participant count must be at least 1",
            ));
        }
        let handle = self.barriers.insert(Arc::new(B::Barrier::new(required)?))?;
        tracing::debug!(%handle, required, backend = B::NAME, "barrier created");
        Ok(handle)
    }

    /// Block until every participant of the current round has arrived
    ///
    /// Exactly one participant per round gets a leader result.
    pub fn barrier_wait(&self, handle: Handle<kind::Barrier>) -> Result<BarrierWaitResult> {
        let barrier = self.barriers.get(handle)?;
        tracing::trace!(%handle, "barrier wait");
        let result = logged(handle, "barrier wait", barrier.wait())?;
        if result.is_leader() {
            tracing::trace!(%handle, "barrier round complete");
        }
        Ok(result)
    }

    /// Destroy the barrier; refused with `InUse` while participants are blocked
    pub fn barrier_destroy(&self, handle: Handle<kind::Barrier>) -> Result<()> {
        destroy_shared(&self.barriers, handle)
    }

    // =========================================================================
    // Diagnostics
    // =========================================================================

    pub fn stats(&self) -> LayerStats {
        LayerStats {
            semaphores: self.semaphores.len(),
            mutexes: self.mutexes.len(),
            barriers: self.barriers.len(),
            threads: self.threads.len(),
            threads_spawned: self.threads_spawned.load(Ordering::Relaxed),
            threads_joined: self.threads_joined.load(Ordering::Relaxed),
        }
    }

    /// Log a snapshot of [`SyncLayer::stats`] at `info`
    pub fn dump_diagnostics(&self) {
        let stats = self.stats();
        tracing::info!(
            backend = B::NAME,
            semaphores = stats.semaphores,
            mutexes = stats.mutexes,
            barriers = stats.barriers,
            threads = stats.threads,
            threads_spawned = stats.threads_spawned,
            threads_joined = stats.threads_joined,
            "sync layer diagnostics"
        );
        let lost = stats.unaccounted();
        if lost > 0 {
            tracing::warn!(lost, "threads unaccounted for");
        }
    }
}

/// Extract a handle of kind `K` from a variant, or fail with `WrongKind`
///
/// This is the strict counterpart of `Variant::get_<kind>`: code about to
/// block on a primitive should not proceed on a default.
pub fn expect_handle<K: HandleKind>(value: &Variant<'_>) -> Result<Handle<K>> {
    value.as_handle::<K>().ok_or(SyncError::WrongKind {
        expected: K::TAG,
        found: value.tag(),
    })
}
