//! Soft Value Errors
//!
//! Provides thread-local diagnostic state for value operations that must not
//! abort the caller. A wrong-tag access or an unsupported conversion records a
//! [`Diagnostic`] here and hands back a safe default; the interpreter decides
//! later whether to surface it.
//!
//! # Usage
//!
//! Value operations record a diagnostic instead of panicking:
//! ```ignore
//! if !value.is_int() {
//!     set_runtime_error(Diagnostic::TypeMismatch { op: "get_int", expected: Tag::Int, found: value.tag() });
//!     return 0;
//! }
//! ```
//!
//! Callers can check for diagnostics:
//! ```ignore
//! if has_runtime_error() {
//!     let diagnostic = take_runtime_error();
//!     // Report it...
//! }
//! ```

use crate::value::Tag;
use std::cell::RefCell;
use std::fmt;

thread_local! {
    /// Thread-local storage for the last recorded diagnostic
    static LAST_ERROR: RefCell<Option<Diagnostic>> = const { RefCell::new(None) };
}

/// A recoverable error raised by a value operation
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Diagnostic {
    /// A typed accessor was called on a variant holding a different kind
    TypeMismatch {
        op: &'static str,
        expected: Tag,
        found: Tag,
    },
    /// A conversion was requested between unrelated kinds
    Conversion { target: Tag, found: Tag },
}

impl fmt::Display for Diagnostic {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Diagnostic::TypeMismatch {
                op,
                expected,
                found,
            } => write!(f, "{} called on {} variant (expected {})", op, found, expected),
            Diagnostic::Conversion { target, found } => {
                write!(f, "cannot convert {} to {}", found, target)
            }
        }
    }
}

impl std::error::Error for Diagnostic {}

/// Record a diagnostic, replacing any pending one
///
/// The diagnostic is also emitted as a `warn` event so a subscriber sees it
/// even if nobody drains the slot.
pub fn set_runtime_error(diagnostic: Diagnostic) {
    tracing::warn!(target: "alecci_core", %diagnostic, "soft value error");
    LAST_ERROR.with(|e| {
        *e.borrow_mut() = Some(diagnostic);
    });
}

/// Take (and clear) the last diagnostic
pub fn take_runtime_error() -> Option<Diagnostic> {
    LAST_ERROR.with(|e| e.borrow_mut().take())
}

/// Check if there's a pending diagnostic
pub fn has_runtime_error() -> bool {
    LAST_ERROR.with(|e| e.borrow().is_some())
}

/// Clear any pending diagnostic
pub fn clear_runtime_error() {
    LAST_ERROR.with(|e| *e.borrow_mut() = None);
}

/// Format a panic payload into an error message
pub fn format_panic_payload(payload: &Box<dyn std::any::Any + Send>) -> String {
    if let Some(s) = payload.downcast_ref::<&str>() {
        s.to_string()
    } else if let Some(s) = payload.downcast_ref::<String>() {
        s.clone()
    } else {
        "unknown panic".to_string()
    }
}
