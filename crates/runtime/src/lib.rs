//! Alecci Runtime: portable threads and synchronization primitives
//!
//! Key design principles:
//! - SyncLayer: one API for threads, semaphores, mutexes and cyclic barriers
//! - Handles: primitives are addressed by generation-checked registry handles,
//!   so use after destroy is an error rather than undefined behavior
//! - Backends: native POSIX primitives on Linux, `Mutex` + `Condvar` emulation
//!   everywhere else (or with the `emulated` feature)
//! - Errors: hard failures are `Result<_, SyncError>`; nothing aborts the process
//!
//! # Modules
//!
//! - `sync`: The `SyncLayer` facade (semaphores, mutexes, barriers, diagnostics)
//! - `thread`: Thread spawn/join on the layer
//! - `array`: `ArrayStore`, the resource behind `Tag::Array`
//! - `backend`: Backend traits plus the native and emulated implementations
//! - `registry`: Generational handle registry
//! - `config`: `RuntimeConfig` and its environment variables
//! - `logging`: Optional stderr subscriber driven by `ALECCI_LOG`
//! - `error`: `SyncError` and its error classes

pub mod array;
pub mod backend;
pub mod config;
pub mod error;
pub mod logging;
pub mod registry;
pub mod sync;
pub mod thread;

// Re-export key types and functions
pub use array::ArrayStore;
pub use backend::{BarrierWaitResult, DefaultBackend, SEMAPHORE_MAX, SyncBackend};
pub use config::RuntimeConfig;
pub use error::{ErrorClass, Result, SyncError};
pub use sync::{LayerStats, SyncLayer, expect_handle};
pub use thread::ThreadResult;

// The value model, so embedders need only one dependency
pub use alecci_core::{Handle, HandleKind, Tag, Variant, kind};
