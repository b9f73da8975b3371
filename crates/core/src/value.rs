//! Variant: the runtime value the language talks about
//!
//! A `Variant` holds exactly one of a fixed set of kinds: a number, a borrowed
//! string, a handle to a runtime resource, or nothing. It is `Copy`; copying a
//! variant duplicates the tag and payload only and never the resource a handle
//! names.
//!
//! # Soft failures
//!
//! The typed accessors (`get_int`, `get_string`, ...) and the numeric
//! conversions never panic on a wrong tag. They record a
//! [`Diagnostic`](crate::error::Diagnostic) on the thread-local error slot and
//! return a documented default. Code that must not act on a default checks
//! `is_<kind>` first or uses the silent `as_<kind>` accessors.

use crate::error::{Diagnostic, set_runtime_error};
use crate::handle::{Handle, HandleKind, kind};
use std::fmt;

/// Upper bound on `size_of::<Variant>()` on every supported target
///
/// Large enough for a discriminant plus the widest payload: a string slice
/// (pointer + length). Integers, floats and handles are 8 bytes.
pub const VARIANT_SIZE: usize = 24;

/// Digits after the decimal point when a Float is displayed
pub const FLOAT_DISPLAY_PRECISION: usize = 6;

const _: () = assert!(std::mem::size_of::<Variant<'static>>() <= VARIANT_SIZE);

/// Discriminator identifying which kind a variant holds
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Tag {
    Int,
    Float,
    String,
    Semaphore,
    Mutex,
    Barrier,
    Thread,
    Array,
    Null,
}

impl Tag {
    /// Every tag, in declaration order
    pub const ALL: [Tag; 9] = [
        Tag::Int,
        Tag::Float,
        Tag::String,
        Tag::Semaphore,
        Tag::Mutex,
        Tag::Barrier,
        Tag::Thread,
        Tag::Array,
        Tag::Null,
    ];

    /// Lowercase name used in diagnostics and display strings
    pub const fn name(self) -> &'static str {
        match self {
            Tag::Int => "int",
            Tag::Float => "float",
            Tag::String => "string",
            Tag::Semaphore => "semaphore",
            Tag::Mutex => "mutex",
            Tag::Barrier => "barrier",
            Tag::Thread => "thread",
            Tag::Array => "array",
            Tag::Null => "null",
        }
    }

    /// True for kinds whose payload is a handle to an external resource
    pub const fn is_handle(self) -> bool {
        matches!(
            self,
            Tag::Semaphore | Tag::Mutex | Tag::Barrier | Tag::Thread | Tag::Array
        )
    }
}

impl fmt::Display for Tag {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// Runtime value: a tagged union with fixed-size storage
///
/// String payloads are borrowed for `'a`; handle payloads are registry
/// identifiers whose validity the runtime checks on use.
#[derive(Debug, Clone, Copy)]
pub enum Variant<'a> {
    /// Signed 64-bit integer
    Int(i64),

    /// IEEE 754 double
    Float(f64),

    /// Borrowed string
    String(&'a str),

    Semaphore(Handle<kind::Semaphore>),
    Mutex(Handle<kind::Mutex>),
    Barrier(Handle<kind::Barrier>),
    Thread(Handle<kind::Thread>),
    Array(Handle<kind::Array>),

    /// Absence of a value; also the result of a failed conversion
    Null,
}

// Records a wrong-tag access and yields the caller's default.
fn mismatch<T>(op: &'static str, expected: Tag, found: Tag, default: T) -> T {
    set_runtime_error(Diagnostic::TypeMismatch {
        op,
        expected,
        found,
    });
    default
}

impl<'a> Variant<'a> {
    // Constructors

    pub const fn int(value: i64) -> Self {
        Variant::Int(value)
    }

    pub const fn float(value: f64) -> Self {
        Variant::Float(value)
    }

    pub const fn string(value: &'a str) -> Self {
        Variant::String(value)
    }

    pub const fn semaphore(handle: Handle<kind::Semaphore>) -> Self {
        Variant::Semaphore(handle)
    }

    pub const fn mutex(handle: Handle<kind::Mutex>) -> Self {
        Variant::Mutex(handle)
    }

    pub const fn barrier(handle: Handle<kind::Barrier>) -> Self {
        Variant::Barrier(handle)
    }

    pub const fn thread(handle: Handle<kind::Thread>) -> Self {
        Variant::Thread(handle)
    }

    pub const fn array(handle: Handle<kind::Array>) -> Self {
        Variant::Array(handle)
    }

    pub const fn null() -> Self {
        Variant::Null
    }

    // Introspection

    /// Which kind this variant currently holds
    pub const fn tag(&self) -> Tag {
        match self {
            Variant::Int(_) => Tag::Int,
            Variant::Float(_) => Tag::Float,
            Variant::String(_) => Tag::String,
            Variant::Semaphore(_) => Tag::Semaphore,
            Variant::Mutex(_) => Tag::Mutex,
            Variant::Barrier(_) => Tag::Barrier,
            Variant::Thread(_) => Tag::Thread,
            Variant::Array(_) => Tag::Array,
            Variant::Null => Tag::Null,
        }
    }

    pub const fn type_name(&self) -> &'static str {
        self.tag().name()
    }

    pub const fn is_int(&self) -> bool {
        matches!(self, Variant::Int(_))
    }

    pub const fn is_float(&self) -> bool {
        matches!(self, Variant::Float(_))
    }

    pub const fn is_string(&self) -> bool {
        matches!(self, Variant::String(_))
    }

    pub const fn is_semaphore(&self) -> bool {
        matches!(self, Variant::Semaphore(_))
    }

    pub const fn is_mutex(&self) -> bool {
        matches!(self, Variant::Mutex(_))
    }

    pub const fn is_barrier(&self) -> bool {
        matches!(self, Variant::Barrier(_))
    }

    pub const fn is_thread(&self) -> bool {
        matches!(self, Variant::Thread(_))
    }

    pub const fn is_array(&self) -> bool {
        matches!(self, Variant::Array(_))
    }

    pub const fn is_null(&self) -> bool {
        matches!(self, Variant::Null)
    }

    // Silent accessors

    pub const fn as_int(&self) -> Option<i64> {
        match self {
            Variant::Int(n) => Some(*n),
            _ => None,
        }
    }

    pub const fn as_float(&self) -> Option<f64> {
        match self {
            Variant::Float(x) => Some(*x),
            _ => None,
        }
    }

    pub const fn as_str(&self) -> Option<&'a str> {
        match self {
            Variant::String(s) => Some(*s),
            _ => None,
        }
    }

    /// Extract a handle of kind `K` without recording a diagnostic
    pub fn as_handle<K: HandleKind>(&self) -> Option<Handle<K>> {
        K::from_variant(self)
    }

    // Soft-failing accessors

    /// Stored integer, or `0` plus a diagnostic on a wrong tag
    pub fn get_int(&self) -> i64 {
        match self {
            Variant::Int(n) => *n,
            other => mismatch("get_int", Tag::Int, other.tag(), 0),
        }
    }

    /// Stored float, or `0.0` plus a diagnostic on a wrong tag
    pub fn get_float(&self) -> f64 {
        match self {
            Variant::Float(x) => *x,
            other => mismatch("get_float", Tag::Float, other.tag(), 0.0),
        }
    }

    /// Stored string, or `""` plus a diagnostic on a wrong tag
    pub fn get_string(&self) -> &'a str {
        match self {
            Variant::String(s) => *s,
            other => mismatch("get_string", Tag::String, other.tag(), ""),
        }
    }

    pub fn get_semaphore(&self) -> Option<Handle<kind::Semaphore>> {
        self.get_handle("get_semaphore")
    }

    pub fn get_mutex(&self) -> Option<Handle<kind::Mutex>> {
        self.get_handle("get_mutex")
    }

    pub fn get_barrier(&self) -> Option<Handle<kind::Barrier>> {
        self.get_handle("get_barrier")
    }

    pub fn get_thread(&self) -> Option<Handle<kind::Thread>> {
        self.get_handle("get_thread")
    }

    pub fn get_array(&self) -> Option<Handle<kind::Array>> {
        self.get_handle("get_array")
    }

    fn get_handle<K: HandleKind>(&self, op: &'static str) -> Option<Handle<K>> {
        match K::from_variant(self) {
            Some(handle) => Some(handle),
            None => mismatch(op, K::TAG, self.tag(), None),
        }
    }

    // Comparison and conversion

    /// Same tag and identical payload; never coerces between kinds
    ///
    /// Floats compare by bit pattern, so `NaN` equals an identical `NaN` and
    /// `0.0` differs from `-0.0`. Strings compare by the borrowed slice
    /// (address and length), so two buffers that happen to hold the same text
    /// are different values; a copy of a variant always equals its source.
    pub fn equals(&self, other: &Variant<'_>) -> bool {
        match (self, other) {
            (Variant::Int(a), Variant::Int(b)) => a == b,
            (Variant::Float(a), Variant::Float(b)) => a.to_bits() == b.to_bits(),
            (Variant::String(a), Variant::String(b)) => std::ptr::eq(*a, *b),
            (Variant::Semaphore(a), Variant::Semaphore(b)) => a == b,
            (Variant::Mutex(a), Variant::Mutex(b)) => a == b,
            (Variant::Barrier(a), Variant::Barrier(b)) => a == b,
            (Variant::Thread(a), Variant::Thread(b)) => a == b,
            (Variant::Array(a), Variant::Array(b)) => a == b,
            (Variant::Null, Variant::Null) => true,
            _ => false,
        }
    }

    /// Int unchanged; Float truncated toward zero; anything else is Null
    ///
    /// Out-of-range floats saturate at `i64::MIN`/`i64::MAX` and `NaN` maps to 0.
    pub fn convert_to_int(&self) -> Variant<'a> {
        match self {
            Variant::Int(_) => *self,
            Variant::Float(x) => Variant::Int(*x as i64),
            other => {
                set_runtime_error(Diagnostic::Conversion {
                    target: Tag::Int,
                    found: other.tag(),
                });
                Variant::Null
            }
        }
    }

    /// Float unchanged; Int widened; anything else is Null
    pub fn convert_to_float(&self) -> Variant<'a> {
        match self {
            Variant::Float(_) => *self,
            Variant::Int(n) => Variant::Float(*n as f64),
            other => {
                set_runtime_error(Diagnostic::Conversion {
                    target: Tag::Float,
                    found: other.tag(),
                });
                Variant::Null
            }
        }
    }

    /// Human-readable rendering; same as the `Display` impl
    pub fn to_display_string(&self) -> String {
        self.to_string()
    }
}

impl PartialEq<Variant<'_>> for Variant<'_> {
    fn eq(&self, other: &Variant<'_>) -> bool {
        self.equals(other)
    }
}

impl fmt::Display for Variant<'_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Variant::Int(n) => write!(f, "{}", n),
            Variant::Float(x) => write!(f, "{:.*}", FLOAT_DISPLAY_PRECISION, x),
            Variant::String(s) => f.write_str(s),
            Variant::Semaphore(h) => write!(f, "{}", h),
            Variant::Mutex(h) => write!(f, "{}", h),
            Variant::Barrier(h) => write!(f, "{}", h),
            Variant::Thread(h) => write!(f, "{}", h),
            Variant::Array(h) => write!(f, "{}", h),
            Variant::Null => f.write_str("null"),
        }
    }
}

impl Default for Variant<'_> {
    fn default() -> Self {
        Variant::Null
    }
}

impl From<i64> for Variant<'_> {
    fn from(value: i64) -> Self {
        Variant::Int(value)
    }
}

impl From<f64> for Variant<'_> {
    fn from(value: f64) -> Self {
        Variant::Float(value)
    }
}

impl<'a> From<&'a str> for Variant<'a> {
    fn from(value: &'a str) -> Self {
        Variant::String(value)
    }
}

impl<K: HandleKind> From<Handle<K>> for Variant<'_> {
    fn from(handle: Handle<K>) -> Self {
        K::into_variant(handle)
    }
}
