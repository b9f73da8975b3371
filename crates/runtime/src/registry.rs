//! Generational handle registry
//!
//! Every live primitive occupies one slot of a `Registry`. A slot carries a
//! generation counter that is bumped when its resource is removed, so a handle
//! issued before the removal no longer matches and is reported as stale
//! instead of silently reaching whatever reuses the slot.
//!
//! ```text
//! ┌───────────────────────────────────────────────┐
//! │ Registry<kind::Semaphore, Arc<B::Semaphore>>  │
//! ├───────────────────────────────────────────────┤
//! │ slot 0: gen 2, Some(sem)   <- Handle(0:2)     │
//! │ slot 1: gen 1, None        (free list)        │
//! │ slot 2: gen 0, Some(sem)   <- Handle(2:0)     │
//! └───────────────────────────────────────────────┘
//! ```
//!
//! The registry lock is held only to look up, insert or remove a slot. Callers
//! clone what they need (an `Arc` to the primitive) and block outside it.
//!
//! Note: generations are u32 and wrap. A handle can only be confused with a
//! newer resource after its slot has been recycled 2^32 times.

use crate::error::{Result, SyncError};
use alecci_core::{Handle, HandleKind};
use std::marker::PhantomData;
use std::sync::{Mutex, MutexGuard, PoisonError};

struct Entry<T> {
    generation: u32,
    value: Option<T>,
}

struct Slots<T> {
    entries: Vec<Entry<T>>,
    free: Vec<u32>,
    live: usize,
}

pub struct Registry<K: HandleKind, T> {
    slots: Mutex<Slots<T>>,
    capacity: usize,
    _kind: PhantomData<fn() -> K>,
}

impl<K: HandleKind, T> Registry<K, T> {
    /// Create a registry that holds at most `capacity` live entries
    pub fn new(capacity: usize) -> Self {
        let capacity = capacity.clamp(1, u32::MAX as usize);
        Self {
            slots: Mutex::new(Slots {
                entries: Vec::new(),
                free: Vec::new(),
                live: 0,
            }),
            capacity,
            _kind: PhantomData,
        }
    }

    // No code panics while holding the slot lock, so a poisoned lock still
    // guards consistent data.
    fn lock(&self) -> MutexGuard<'_, Slots<T>> {
        self.slots.lock().unwrap_or_else(PoisonError::into_inner)
    }

    fn stale(handle: Handle<K>) -> SyncError {
        SyncError::StaleHandle {
            kind: K::TAG,
            handle: handle.to_raw(),
        }
    }

    /// Store a value and issue a handle for it
    pub fn insert(&self, value: T) -> Result<Handle<K>> {
        self.insert_with(|| Ok(value))
    }

    /// Build the value under the registry lock, once a slot is known to be free
    ///
    /// Used when constructing the value has side effects that must not happen
    /// if the registry is full (starting a thread). If `make` fails no slot is
    /// consumed.
    pub fn insert_with(&self, make: impl FnOnce() -> Result<T>) -> Result<Handle<K>> {
        let mut slots = self.lock();
        if slots.live >= self.capacity {
            return Err(SyncError::ResourceExhausted {
                kind: K::TAG,
                capacity: self.capacity,
            });
        }
        let value = make()?;

        let index = match slots.free.pop() {
            Some(index) => {
                slots.entries[index as usize].value = Some(value);
                index
            }
            None => {
                let index = slots.entries.len() as u32;
                slots.entries.push(Entry {
                    generation: 0,
                    value: Some(value),
                });
                index
            }
        };
        slots.live += 1;

        Ok(Handle::from_parts(
            index,
            slots.entries[index as usize].generation,
        ))
    }

    /// Run `f` on the value behind `handle` while holding the registry lock
    ///
    /// `f` must not block.
    pub fn with<R>(&self, handle: Handle<K>, f: impl FnOnce(&T) -> R) -> Result<R> {
        let slots = self.lock();
        slots
            .entries
            .get(handle.index() as usize)
            .filter(|entry| entry.generation == handle.generation())
            .and_then(|entry| entry.value.as_ref())
            .map(f)
            .ok_or_else(|| Self::stale(handle))
    }

    /// Clone of the value behind `handle`
    pub fn get(&self, handle: Handle<K>) -> Result<T>
    where
        T: Clone,
    {
        self.with(handle, T::clone)
    }

    /// Remove the value, invalidating every copy of `handle`
    pub fn remove(&self, handle: Handle<K>) -> Result<T> {
        self.remove_if(handle, |_| Ok(()))
    }

    /// Remove the value only if `check` accepts it
    ///
    /// `check` runs under the registry lock, so no other caller can obtain the
    /// value between the check and the removal.
    pub fn remove_if(&self, handle: Handle<K>, check: impl FnOnce(&T) -> Result<()>) -> Result<T> {
        let mut guard = self.lock();
        let slots = &mut *guard;

        let entry = slots
            .entries
            .get_mut(handle.index() as usize)
            .filter(|entry| entry.generation == handle.generation())
            .ok_or_else(|| Self::stale(handle))?;
        check(entry.value.as_ref().ok_or_else(|| Self::stale(handle))?)?;

        let value = entry.value.take().ok_or_else(|| Self::stale(handle))?;
        entry.generation = entry.generation.wrapping_add(1);
        slots.free.push(handle.index());
        slots.live -= 1;
        Ok(value)
    }

    /// Number of live entries
    pub fn len(&self) -> usize {
        self.lock().live
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn capacity(&self) -> usize {
        self.capacity
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use alecci_core::{Tag, kind};
    use std::sync::Arc;

    #[test]
    fn test_insert_and_get() {
        let registry: Registry<kind::Semaphore, u32> = Registry::new(8);
        let a = registry.insert(10).unwrap();
        let b = registry.insert(20).unwrap();
        assert_ne!(a, b);
        assert_eq!(registry.get(a).unwrap(), 10);
        assert_eq!(registry.get(b).unwrap(), 20);
        assert_eq!(registry.len(), 2);
    }

    #[test]
    fn test_removed_handle_is_stale() {
        let registry: Registry<kind::Mutex, &str> = Registry::new(8);
        let handle = registry.insert("m").unwrap();
        assert_eq!(registry.remove(handle).unwrap(), "m");

        match registry.get(handle) {
            Err(SyncError::StaleHandle { kind, handle: raw }) => {
                assert_eq!(kind, Tag::Mutex);
                assert_eq!(raw, handle.to_raw());
            }
            other => panic!("expected StaleHandle, got {:?}", other),
        }
        assert!(matches!(
            registry.remove(handle),
            Err(SyncError::StaleHandle { .. })
        ));
        assert!(registry.is_empty());
    }

    #[test]
    fn test_slot_reuse_bumps_generation() {
        let registry: Registry<kind::Barrier, u8> = Registry::new(8);
        let old = registry.insert(1).unwrap();
        registry.remove(old).unwrap();

        let new = registry.insert(2).unwrap();
        assert_eq!(new.index(), old.index());
        assert_eq!(new.generation(), old.generation() + 1);

        // The old handle must not reach the new occupant
        assert!(registry.get(old).is_err());
        assert_eq!(registry.get(new).unwrap(), 2);
    }

    #[test]
    fn test_never_issued_handle_is_stale() {
        let registry: Registry<kind::Thread, u8> = Registry::new(8);
        assert!(matches!(
            registry.get(Handle::from_parts(3, 0)),
            Err(SyncError::StaleHandle { .. })
        ));
    }

    #[test]
    fn test_capacity_exhaustion() {
        let registry: Registry<kind::Array, u8> = Registry::new(2);
        let a = registry.insert(1).unwrap();
        registry.insert(2).unwrap();
        match registry.insert(3) {
            Err(SyncError::ResourceExhausted { kind, capacity }) => {
                assert_eq!(kind, Tag::Array);
                assert_eq!(capacity, 2);
            }
            other => panic!("expected ResourceExhausted, got {:?}", other),
        }

        // Freeing a slot makes room again
        registry.remove(a).unwrap();
        assert!(registry.insert(4).is_ok());
    }

    #[test]
    fn test_remove_if_refusal_keeps_entry() {
        let registry: Registry<kind::Semaphore, Arc<u8>> = Registry::new(4);
        let handle = registry.insert(Arc::new(5)).unwrap();
        let held = registry.get(handle).unwrap();

        let refused = registry.remove_if(handle, |value| {
            if Arc::strong_count(value) > 1 {
                Err(SyncError::InUse {
                    kind: Tag::Semaphore,
                    handle: handle.to_raw(),
                    holders: Arc::strong_count(value) - 1,
                })
            } else {
                Ok(())
            }
        });
        assert!(matches!(refused, Err(SyncError::InUse { holders: 1, .. })));
        assert_eq!(*registry.get(handle).unwrap(), 5);

        drop(held);
        assert!(registry.remove_if(handle, |_| Ok(())).is_ok());
    }

    #[test]
    fn test_concurrent_inserts_issue_unique_handles() {
        let registry: Arc<Registry<kind::Mutex, usize>> = Arc::new(Registry::new(1024));
        let workers: Vec<_> = (0..8)
            .map(|t| {
                let registry = Arc::clone(&registry);
                std::thread::spawn(move || {
                    (0..50)
                        .map(|i| registry.insert(t * 100 + i).unwrap())
                        .collect::<Vec<_>>()
                })
            })
            .collect();

        let mut all: Vec<_> = workers
            .into_iter()
            .flat_map(|w| w.join().unwrap())
            .collect();
        let count = all.len();
        all.sort_by_key(|h| h.to_raw());
        all.dedup();
        assert_eq!(all.len(), count);
        assert_eq!(registry.len(), 400);
    }
}
