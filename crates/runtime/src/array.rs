//! Arrays: the resource behind `Tag::Array`
//!
//! An array is a fixed-length vector of `Variant<'static>` created filled with
//! `Null`. Arrays are shared between threads by handle, so each one sits behind
//! its own lock; element reads return a copy.

use crate::config::RuntimeConfig;
use crate::error::{Result, SyncError};
use crate::registry::Registry;
use alecci_core::{Handle, Variant, kind};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

type Elements = Arc<Mutex<Vec<Variant<'static>>>>;

pub struct ArrayStore {
    arrays: Registry<kind::Array, Elements>,
}

impl Default for ArrayStore {
    fn default() -> Self {
        Self::new(&RuntimeConfig::default())
    }
}

// Element writes are single assignments; a poisoned lock still holds a valid vector.
fn lock(elements: &Elements) -> MutexGuard<'_, Vec<Variant<'static>>> {
    elements.lock().unwrap_or_else(PoisonError::into_inner)
}

impl ArrayStore {
    pub fn new(config: &RuntimeConfig) -> Self {
        Self {
            arrays: Registry::new(config.registry_capacity),
        }
    }

    /// Create an array of `len` `Null` elements
    ///
    /// A length that cannot be allocated is `InvalidArgument`.
    pub fn create(&self, len: usize) -> Result<Handle<kind::Array>> {
        let mut elements = Vec::new();
        elements.try_reserve_exact(len).map_err(|err| {
            tracing::warn!(len, %err, "array allocation failed");
            SyncError::invalid(
                "array_create",
                format!("cannot allocate {} elements: {}", len, err),
            )
        })?;
        elements.resize(len, Variant::Null);

        let handle = self.arrays.insert(Arc::new(Mutex::new(elements)))?;
        tracing::debug!(%handle, len, "array created");
        Ok(handle)
    }

    pub fn get(&self, handle: Handle<kind::Array>, index: usize) -> Result<Variant<'static>> {
        let elements = self.arrays.get(handle)?;
        let elements = lock(&elements);
        elements
            .get(index)
            .copied()
            .ok_or(SyncError::IndexOutOfBounds {
                index,
                len: elements.len(),
            })
    }

    pub fn set(
        &self,
        handle: Handle<kind::Array>,
        index: usize,
        value: Variant<'static>,
    ) -> Result<()> {
        let elements = self.arrays.get(handle)?;
        let mut elements = lock(&elements);
        let len = elements.len();
        match elements.get_mut(index) {
            Some(slot) => {
                *slot = value;
                Ok(())
            }
            None => {
                tracing::warn!(%handle, index, len, "array index out of bounds");
                Err(SyncError::IndexOutOfBounds { index, len })
            }
        }
    }

    pub fn len(&self, handle: Handle<kind::Array>) -> Result<usize> {
        let elements = self.arrays.get(handle)?;
        Ok(lock(&elements).len())
    }

    /// Remove the array; its handle (and every copy of it) becomes stale
    ///
    /// A thread in the middle of `get`/`set` keeps the elements alive until
    /// it finishes.
    pub fn destroy(&self, handle: Handle<kind::Array>) -> Result<()> {
        self.arrays.remove(handle)?;
        tracing::debug!(%handle, "array destroyed");
        Ok(())
    }

    /// Number of live arrays
    pub fn count(&self) -> usize {
        self.arrays.len()
    }
}
