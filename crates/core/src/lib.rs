//! Alecci Core: the runtime value model
//!
//! This crate defines what an Alecci program's values look like at runtime,
//! independent of how synchronization primitives are implemented.
//!
//! Key design principles:
//! - Variant: a fixed-size tagged union (Int, Float, String, resource handles, Null)
//! - Handle: a generation-checked registry identifier, never a raw pointer
//! - Soft failures: wrong-tag access yields a default plus a diagnostic
//!
//! # Modules
//!
//! - `error`: Thread-local diagnostic slot for soft value errors
//! - `handle`: Typed handles and their kind markers
//! - `value`: The `Variant` enum and its `Tag`

pub mod error;
pub mod handle;
pub mod value;

// Re-export key types and functions
pub use handle::{Handle, HandleKind, kind};
pub use value::{FLOAT_DISPLAY_PRECISION, Tag, VARIANT_SIZE, Variant};

// Error handling
pub use error::{
    Diagnostic, clear_runtime_error, format_panic_payload, has_runtime_error, set_runtime_error,
    take_runtime_error,
};
