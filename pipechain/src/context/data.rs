//! Typed per-stage data storage.

use std::any::Any;
use std::collections::HashMap;
use std::fmt;
use std::marker::PhantomData;

/// A typed key into a [`StageData`] store.
///
/// Keys are usually declared as constants next to the processor that owns
/// them:
///
/// ```rust
/// use pipechain::context::DataKey;
///
/// const TILE_COUNT: DataKey<u32> = DataKey::new("tile_count");
/// ```
pub struct DataKey<T> {
    name: &'static str,
    _marker: PhantomData<fn() -> T>,
}

impl<T> DataKey<T> {
    /// Creates a new key.
    #[must_use]
    pub const fn new(name: &'static str) -> Self {
        Self {
            name,
            _marker: PhantomData,
        }
    }

    /// Returns the key name.
    #[must_use]
    pub const fn name(&self) -> &'static str {
        self.name
    }
}

impl<T> Clone for DataKey<T> {
    fn clone(&self) -> Self {
        *self
    }
}

impl<T> Copy for DataKey<T> {}

impl<T> fmt::Debug for DataKey<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_tuple("DataKey").field(&self.name).finish()
    }
}

/// Processor-private key/value storage, scoped to one stage of one run.
///
/// Last write wins. Reading a key with a type other than the one stored
/// yields `None`.
#[derive(Default)]
pub struct StageData {
    entries: HashMap<&'static str, Box<dyn Any + Send>>,
}

impl StageData {
    /// Creates an empty store.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Stores a value, returning the previous value of the same type.
    pub fn put<T: Any + Send>(&mut self, key: DataKey<T>, value: T) -> Option<T> {
        self.entries
            .insert(key.name, Box::new(value))
            .and_then(|prev| prev.downcast::<T>().ok())
            .map(|prev| *prev)
    }

    /// Gets a value.
    #[must_use]
    pub fn get<T: Any + Send>(&self, key: DataKey<T>) -> Option<&T> {
        self.entries.get(key.name).and_then(|v| v.downcast_ref::<T>())
    }

    /// Gets a mutable reference to a value.
    pub fn get_mut<T: Any + Send>(&mut self, key: DataKey<T>) -> Option<&mut T> {
        self.entries
            .get_mut(key.name)
            .and_then(|v| v.downcast_mut::<T>())
    }

    /// Removes a value.
    pub fn remove<T: Any + Send>(&mut self, key: DataKey<T>) -> Option<T> {
        match self.entries.get(key.name) {
            Some(v) if v.is::<T>() => self
                .entries
                .remove(key.name)
                .and_then(|v| v.downcast::<T>().ok())
                .map(|v| *v),
            _ => None,
        }
    }

    /// Checks whether a key holds a value of the key's type.
    #[must_use]
    pub fn contains<T: Any + Send>(&self, key: DataKey<T>) -> bool {
        self.get(key).is_some()
    }

    /// Returns the number of entries.
    #[must_use]
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// Returns true if the store is empty.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

impl fmt::Debug for StageData {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let mut keys: Vec<_> = self.entries.keys().collect();
        keys.sort_unstable();
        f.debug_struct("StageData").field("keys", &keys).finish()
    }
}
