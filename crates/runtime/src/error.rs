//! Sync Layer Errors
//!
//! Every fallible operation of the sync layer returns [`SyncError`]. Nothing in
//! this crate aborts the process: bad parameters, exhausted resources, OS
//! failures and misuse all come back as values.
//!
//! Each variant belongs to one [`ErrorClass`]:
//! - `Construction`: an `init`/`spawn`/`create` could not produce a resource
//! - `SyncOperation`: a blocking or state-changing call failed at runtime
//! - `PreconditionViolation`: the caller broke the API contract (stale handle,
//!   wrong kind, unlocking a mutex it does not own, destroying a busy primitive)

use alecci_core::Tag;
use std::fmt;
use std::io;

/// Result alias for sync layer operations
pub type Result<T> = std::result::Result<T, SyncError>;

/// Coarse classification of a [`SyncError`]
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorClass {
    Construction,
    SyncOperation,
    PreconditionViolation,
}

#[derive(Debug)]
pub enum SyncError {
    /// A constructor was given a parameter it cannot honor
    InvalidArgument { op: &'static str, reason: String },
    /// The registry for this kind is full
    ResourceExhausted { kind: Tag, capacity: usize },
    /// The OS refused to create the resource
    CreateFailed { op: &'static str, source: io::Error },
    /// The OS reported a failure during an operation
    Os { op: &'static str, source: io::Error },
    /// A blocking call was interrupted by a signal
    Interrupted { op: &'static str },
    /// A semaphore release would exceed the maximum count
    Overflow { op: &'static str },
    /// A primitive's internal lock was poisoned by a panicking thread
    Poisoned { op: &'static str },
    /// The joined thread panicked
    ThreadPanicked { message: String },
    /// Array index outside `0..len`
    IndexOutOfBounds { index: usize, len: usize },
    /// The handle names a destroyed (or joined) resource, or was never issued
    StaleHandle { kind: Tag, handle: u64 },
    /// A variant of the wrong kind was passed where a handle was expected
    WrongKind { expected: Tag, found: Tag },
    /// The calling thread does not own the mutex it tried to unlock
    NotOwner { op: &'static str },
    /// The call would block the calling thread forever
    Deadlock { op: &'static str },
    /// Destroy was refused because other threads are still using the primitive
    InUse { kind: Tag, handle: u64, holders: usize },
}

impl SyncError {
    pub fn class(&self) -> ErrorClass {
        match self {
            SyncError::InvalidArgument { .. }
            | SyncError::ResourceExhausted { .. }
            | SyncError::CreateFailed { .. } => ErrorClass::Construction,
            SyncError::Os { .. }
            | SyncError::Interrupted { .. }
            | SyncError::Overflow { .. }
            | SyncError::Poisoned { .. }
            | SyncError::ThreadPanicked { .. }
            | SyncError::IndexOutOfBounds { .. } => ErrorClass::SyncOperation,
            SyncError::StaleHandle { .. }
            | SyncError::WrongKind { .. }
            | SyncError::NotOwner { .. }
            | SyncError::Deadlock { .. }
            | SyncError::InUse { .. } => ErrorClass::PreconditionViolation,
        }
    }

    /// True if a signal interrupted a blocking call
    pub fn is_interrupted(&self) -> bool {
        matches!(self, SyncError::Interrupted { .. })
    }

    pub(crate) fn invalid(op: &'static str, reason: impl Into<String>) -> Self {
        SyncError::InvalidArgument {
            op,
            reason: reason.into(),
        }
    }
}

impl fmt::Display for SyncError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            SyncError::InvalidArgument { op, reason } => write!(f, "{}: {}", op, reason),
            SyncError::ResourceExhausted { kind, capacity } => {
                write!(f, "{} registry is full ({} live handles)", kind, capacity)
            }
            SyncError::CreateFailed { op, source } => write!(f, "{} failed: {}", op, source),
            SyncError::Os { op, source } => write!(f, "{} failed: {}", op, source),
            SyncError::Interrupted { op } => write!(f, "{} interrupted by a signal", op),
            SyncError::Overflow { op } => write!(f, "{}: semaphore count overflow", op),
            SyncError::Poisoned { op } => {
                write!(f, "{}: lock poisoned by a panicking thread", op)
            }
            SyncError::ThreadPanicked { message } => write!(f, "thread panicked: {}", message),
            SyncError::IndexOutOfBounds { index, len } => {
                write!(f, "index {} out of bounds for array of length {}", index, len)
            }
            SyncError::StaleHandle { kind, handle } => {
                write!(f, "stale {} handle {:#018x}", kind, handle)
            }
            SyncError::WrongKind { expected, found } => {
                write!(f, "expected a {} handle, got {}", expected, found)
            }
            SyncError::NotOwner { op } => write!(f, "{}: mutex not owned by caller", op),
            SyncError::Deadlock { op } => write!(f, "{}: would deadlock", op),
            SyncError::InUse {
                kind,
                handle,
                holders,
            } => write!(
                f,
                "{} {:#018x} still in use by {} other thread(s)",
                kind, handle, holders
            ),
        }
    }
}

impl std::error::Error for SyncError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            SyncError::CreateFailed { source, .. } | SyncError::Os { source, .. } => Some(source),
            _ => None,
        }
    }
}
