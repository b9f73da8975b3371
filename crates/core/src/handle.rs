//! Typed resource handles
//!
//! Synchronization primitives and arrays live in registries owned by the
//! runtime. A `Handle<K>` names one registry slot by `(index, generation)`:
//! destroying the resource bumps the slot's generation, so every handle that
//! still names the old resource is detectably stale instead of dangling.
//!
//! The kind marker `K` keeps a semaphore handle from being passed where a
//! barrier is expected. Handles are `Copy` and 8 bytes wide; copying one never
//! copies or owns the resource behind it.

use crate::value::{Tag, Variant};
use std::fmt;
use std::hash::{Hash, Hasher};
use std::marker::PhantomData;

/// Kind markers for [`Handle`]
///
/// These are uninhabited types: they only exist at the type level.
pub mod kind {
    /// Counting semaphore
    #[derive(Debug)]
    pub enum Semaphore {}
    /// Non-reentrant mutex
    #[derive(Debug)]
    pub enum Mutex {}
    /// Cyclic (reusable) barrier
    #[derive(Debug)]
    pub enum Barrier {}
    /// Joinable OS thread
    #[derive(Debug)]
    pub enum Thread {}
    /// Runtime array of variants
    #[derive(Debug)]
    pub enum Array {}
}

mod sealed {
    pub trait Sealed {}
    impl Sealed for super::kind::Semaphore {}
    impl Sealed for super::kind::Mutex {}
    impl Sealed for super::kind::Barrier {}
    impl Sealed for super::kind::Thread {}
    impl Sealed for super::kind::Array {}
}

/// Ties a kind marker to its variant tag
pub trait HandleKind: sealed::Sealed + 'static {
    /// Tag a variant carries when it holds this kind of handle
    const TAG: Tag;

    /// Wrap a handle of this kind in a variant
    fn into_variant(handle: Handle<Self>) -> Variant<'static>;

    /// Extract a handle of this kind, if the variant holds one
    fn from_variant(value: &Variant<'_>) -> Option<Handle<Self>>;
}

macro_rules! handle_kind {
    ($marker:ident) => {
        impl HandleKind for kind::$marker {
            const TAG: Tag = Tag::$marker;

            fn into_variant(handle: Handle<Self>) -> Variant<'static> {
                Variant::$marker(handle)
            }

            fn from_variant(value: &Variant<'_>) -> Option<Handle<Self>> {
                match value {
                    Variant::$marker(handle) => Some(*handle),
                    _ => None,
                }
            }
        }
    };
}

handle_kind!(Semaphore);
handle_kind!(Mutex);
handle_kind!(Barrier);
handle_kind!(Thread);
handle_kind!(Array);

/// Generation-checked reference to a runtime resource
pub struct Handle<K: ?Sized> {
    index: u32,
    generation: u32,
    _kind: PhantomData<fn() -> K>,
}

impl<K: ?Sized> Handle<K> {
    /// Build a handle from its registry coordinates
    pub const fn from_parts(index: u32, generation: u32) -> Self {
        Self {
            index,
            generation,
            _kind: PhantomData,
        }
    }

    /// Rebuild a handle from [`Handle::to_raw`]
    pub const fn from_raw(raw: u64) -> Self {
        Self::from_parts(raw as u32, (raw >> 32) as u32)
    }

    /// Slot index in the owning registry
    pub const fn index(self) -> u32 {
        self.index
    }

    /// Slot generation at the time the handle was issued
    pub const fn generation(self) -> u32 {
        self.generation
    }

    /// Pack into a single word: generation in the high half, index in the low half
    pub const fn to_raw(self) -> u64 {
        ((self.generation as u64) << 32) | self.index as u64
    }
}

// Manual impls: derives would put bounds on K, which is uninhabited.
impl<K: ?Sized> Clone for Handle<K> {
    fn clone(&self) -> Self {
        *self
    }
}

impl<K: ?Sized> Copy for Handle<K> {}

impl<K: ?Sized> PartialEq for Handle<K> {
    fn eq(&self, other: &Self) -> bool {
        self.index == other.index && self.generation == other.generation
    }
}

impl<K: ?Sized> Eq for Handle<K> {}

impl<K: ?Sized> Hash for Handle<K> {
    fn hash<H: Hasher>(&self, state: &mut H) {
        self.to_raw().hash(state);
    }
}

impl<K: HandleKind> fmt::Debug for Handle<K> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Handle<{}>({}:{})", K::TAG, self.index, self.generation)
    }
}

impl<K: HandleKind> fmt::Display for Handle<K> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}@{:#018x}", K::TAG, self.to_raw())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashSet;

    #[test]
    fn test_handle_is_word_sized() {
        assert_eq!(std::mem::size_of::<Handle<kind::Semaphore>>(), 8);
    }

    #[test]
    fn test_raw_packing() {
        let handle: Handle<kind::Mutex> = Handle::from_parts(7, 3);
        assert_eq!(handle.to_raw(), (3u64 << 32) | 7);

        let back: Handle<kind::Mutex> = Handle::from_raw(handle.to_raw());
        assert_eq!(back, handle);
        assert_eq!(back.index(), 7);
        assert_eq!(back.generation(), 3);
    }

    #[test]
    fn test_generation_distinguishes_handles() {
        let old: Handle<kind::Barrier> = Handle::from_parts(0, 0);
        let new: Handle<kind::Barrier> = Handle::from_parts(0, 1);
        assert_ne!(old, new);

        let set: HashSet<_> = [old, new, old].into_iter().collect();
        assert_eq!(set.len(), 2);
    }

    #[test]
    fn test_handle_display() {
        let handle: Handle<kind::Thread> = Handle::from_parts(2, 1);
        assert_eq!(handle.to_string(), "thread@0x0000000100000002");
        assert_eq!(format!("{:?}", handle), "Handle<thread>(2:1)");
    }

    #[test]
    fn test_kind_round_trip_through_variant() {
        let handle: Handle<kind::Array> = Handle::from_parts(4, 0);
        let value = kind::Array::into_variant(handle);
        assert_eq!(value.tag(), Tag::Array);
        assert_eq!(kind::Array::from_variant(&value), Some(handle));
        assert_eq!(kind::Semaphore::from_variant(&value), None);
    }
}
