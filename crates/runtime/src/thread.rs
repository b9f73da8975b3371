//! OS threads behind `Handle<kind::Thread>`
//!
//! Threads are preemptive `std::thread`s. An entry function takes one argument
//! and returns a pointer-width integer, which `join` hands back unchanged.
//!
//! A thread may be joined exactly once. Joining removes its handle from the
//! registry, so a second join (or a join of a never-issued handle) reports
//! `StaleHandle`. A thread joining itself is refused with `Deadlock`. A thread
//! that panics surfaces as `ThreadPanicked` carrying the panic message.

use crate::backend::SyncBackend;
use crate::error::{Result, SyncError};
use crate::sync::SyncLayer;
use alecci_core::{Handle, format_panic_payload, kind};
use std::sync::atomic::Ordering;
use std::thread;

/// Value a thread entry returns to its joiner
pub type ThreadResult = usize;

impl<B: SyncBackend> SyncLayer<B> {
    /// Start `entry(arg)` on a new OS thread
    ///
    /// The thread is named `<prefix>-<n>` and uses the configured stack size.
    /// It is registered before this returns, so the handle can be joined from
    /// any thread.
    pub fn spawn<A, F>(&self, entry: F, arg: A) -> Result<Handle<kind::Thread>>
    where
        A: Send + 'static,
        F: FnOnce(A) -> ThreadResult + Send + 'static,
    {
        let serial = self.next_thread_serial.fetch_add(1, Ordering::Relaxed);
        let name = format!("{}-{}", self.config.thread_name_prefix, serial);

        let handle = self.threads.insert_with(|| {
            let mut builder = thread::Builder::new().name(name.clone());
            if let Some(size) = self.config.thread_stack_size {
                builder = builder.stack_size(size);
            }
            builder
                .spawn(move || entry(arg))
                .map_err(|source| SyncError::CreateFailed {
                    op: "thread_spawn",
                    source,
                })
        });

        match handle {
            Ok(handle) => {
                self.threads_spawned.fetch_add(1, Ordering::Relaxed);
                tracing::debug!(%handle, thread = %name, "thread spawned");
                Ok(handle)
            }
            Err(err) => {
                tracing::warn!(thread = %name, %err, "thread spawn failed");
                Err(err)
            }
        }
    }

    /// Wait for the thread to finish and return its result
    pub fn join(&self, handle: Handle<kind::Thread>) -> Result<ThreadResult> {
        let me = thread::current().id();
        // The join is counted under the registry lock, together with the
        // removal, so stats never see a thread that is in neither place.
        let join = self.threads.remove_if(handle, |join| {
            if join.thread().id() == me {
                return Err(SyncError::Deadlock { op: "thread_join" });
            }
            self.threads_joined.fetch_add(1, Ordering::Relaxed);
            Ok(())
        });
        let join = match join {
            Ok(join) => join,
            Err(err) => {
                tracing::warn!(%handle, %err, "thread join refused");
                return Err(err);
            }
        };

        tracing::trace!(%handle, "thread join");
        let outcome = join.join();

        match outcome {
            Ok(result) => {
                tracing::debug!(%handle, result, "thread joined");
                Ok(result)
            }
            Err(payload) => {
                let message = format_panic_payload(&payload);
                tracing::warn!(%handle, %message, "thread panicked");
                Err(SyncError::ThreadPanicked { message })
            }
        }
    }

    /// True once the thread's entry has returned (or panicked)
    ///
    /// The handle stays valid until it is joined.
    pub fn is_finished(&self, handle: Handle<kind::Thread>) -> Result<bool> {
        self.threads.with(handle, |join| join.is_finished())
    }
}
