//! `Field<T>`: a named, typed configuration value.
//!
//! A field binds a document key to a value of a fixed type `T`.  Creating one
//! with a key registers it in a [`FieldRegistry`], after which every bulk
//! load/save performed through that registry reads or writes the field.
//!
//! ```rust
//! use std::sync::Arc;
//! use confvar_core::{Field, FieldRegistry};
//!
//! let registry = Arc::new(FieldRegistry::new());
//! let volume = Field::new_in(&registry, "volume", 80u8).unwrap();
//!
//! volume.set_value(50);
//! assert_eq!(volume.value(), 50);
//! assert_eq!(registry.keys(), vec!["volume"]);
//! ```
//!
//! # Handles and ownership
//!
//! `Field<T>` is a handle: cloning it yields a second handle to the same
//! value, and the registry only keeps a weak reference.  The field stays
//! registered for as long as at least one handle exists, which in practice
//! means "for the life of the process" when fields are kept in statics or in
//! a long-lived settings struct.
//!
//! # Guards and bulk load/save
//!
//! [`Field::read`], [`Field::write`] and [`Field::update`] lock the value.
//! Registry and store calls never wait on that lock: if a guard is still
//! alive they return [`ConfigError::FieldBusy`] for that field instead.
//! Other accessors on the *same* field do wait, so calling e.g.
//! [`Field::value`] while holding that field's `write()` guard deadlocks.

use std::fmt;
use std::sync::{Arc, PoisonError, RwLock, RwLockReadGuard, RwLockWriteGuard, TryLockError};

use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};

use crate::entry::{ConfigEntry, Document};
use crate::error::ConfigError;
use crate::registry::FieldRegistry;

/// Value types a [`Field`] can persist.
///
/// Anything serde_json can round-trip qualifies: numbers, strings, booleans,
/// `Option`, collections, and `#[derive(Serialize, Deserialize)]` structs.
pub trait FieldValue: Serialize + DeserializeOwned + Send + Sync + 'static {}

impl<T> FieldValue for T where T: Serialize + DeserializeOwned + Send + Sync + 'static {}

/// Shared storage behind every handle of one field.  This is what the
/// registry points at.
struct FieldSlot<T> {
    key: String,
    value: RwLock<T>,
}

impl<T> FieldSlot<T> {
    // Every write replaces the value wholesale (or runs a caller closure on
    // it), so a poisoned lock still guards a complete `T`.
    fn read(&self) -> RwLockReadGuard<'_, T> {
        self.value.read().unwrap_or_else(PoisonError::into_inner)
    }

    fn write(&self) -> RwLockWriteGuard<'_, T> {
        self.value.write().unwrap_or_else(PoisonError::into_inner)
    }

    // Bulk load/save must not hang on a guard the caller still holds.
    fn try_read(&self) -> Result<RwLockReadGuard<'_, T>, ConfigError> {
        match self.value.try_read() {
            Ok(guard) => Ok(guard),
            Err(TryLockError::Poisoned(poisoned)) => Ok(poisoned.into_inner()),
            Err(TryLockError::WouldBlock) => Err(self.busy()),
        }
    }

    fn try_write(&self) -> Result<RwLockWriteGuard<'_, T>, ConfigError> {
        match self.value.try_write() {
            Ok(guard) => Ok(guard),
            Err(TryLockError::Poisoned(poisoned)) => Ok(poisoned.into_inner()),
            Err(TryLockError::WouldBlock) => Err(self.busy()),
        }
    }

    fn busy(&self) -> ConfigError {
        ConfigError::FieldBusy {
            key: self.key.clone(),
        }
    }
}

impl<T: FieldValue> ConfigEntry for FieldSlot<T> {
    fn key(&self) -> &str {
        &self.key
    }

    fn load_from(&self, document: &Document) -> Result<(), ConfigError> {
        let Some(raw) = document.get(&self.key) else {
            return Ok(());
        };

        let value: T = Deserialize::deserialize(raw).map_err(|source| {
            ConfigError::Deserialize {
                key: self.key.clone(),
                source,
            }
        })?;
        *self.try_write()? = value;
        Ok(())
    }

    fn save_into(&self, document: &mut Document) -> Result<(), ConfigError> {
        let value = serde_json::to_value(&*self.try_read()?).map_err(|source| {
            ConfigError::Serialize {
                key: self.key.clone(),
                source,
            }
        })?;
        document.insert(self.key.clone(), value);
        Ok(())
    }
}

/// A named configuration value of type `T`.
pub struct Field<T> {
    slot: Arc<FieldSlot<T>>,
    bound: bool,
}

impl<T: FieldValue> Field<T> {
    /// Creates a field and registers it in [`FieldRegistry::global`].
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError::DuplicateKey`] if a live field already uses `key`
    /// in the global registry.
    pub fn new(key: impl Into<String>, value: T) -> Result<Self, ConfigError> {
        Self::new_in(&FieldRegistry::global(), key, value)
    }

    /// Creates a field and registers it in `registry`.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError::DuplicateKey`] if a live field already uses `key`
    /// in `registry`.
    pub fn new_in(
        registry: &FieldRegistry,
        key: impl Into<String>,
        value: T,
    ) -> Result<Self, ConfigError> {
        let slot = Arc::new(FieldSlot {
            key: key.into(),
            value: RwLock::new(value),
        });
        registry.register(&slot)?;
        Ok(Self { slot, bound: true })
    }

    /// Reads this field alone from `document`.  See [`ConfigEntry::load_from`].
    ///
    /// An unbound field has no key and leaves its value untouched.
    pub fn load_from(&self, document: &Document) -> Result<(), ConfigError> {
        if !self.bound {
            return Ok(());
        }
        self.slot.load_from(document)
    }

    /// Writes this field alone into `document`.  See [`ConfigEntry::save_into`].
    ///
    /// An unbound field has no key and writes nothing.
    pub fn save_into(&self, document: &mut Document) -> Result<(), ConfigError> {
        if !self.bound {
            return Ok(());
        }
        self.slot.save_into(document)
    }
}

impl<T> Field<T> {
    /// Creates a placeholder field with no key.
    ///
    /// Unbound fields are never registered, so bulk load/save skips them.
    pub fn unbound(value: T) -> Self {
        Self {
            slot: Arc::new(FieldSlot {
                key: String::new(),
                value: RwLock::new(value),
            }),
            bound: false,
        }
    }

    /// The document key.  Empty for unbound fields.
    pub fn key(&self) -> &str {
        &self.slot.key
    }

    /// Returns `true` if the field was registered under its key.
    pub fn is_bound(&self) -> bool {
        self.bound
    }

    /// Returns a copy of the current value.
    pub fn value(&self) -> T
    where
        T: Clone,
    {
        self.slot.read().clone()
    }

    pub fn set_value(&self, value: T) {
        *self.slot.write() = value;
    }

    /// Stores `value` and returns the previous one.
    pub fn replace(&self, value: T) -> T {
        std::mem::replace(&mut *self.slot.write(), value)
    }

    /// Runs `f` with mutable access to the value and returns its result.
    ///
    /// # Deadlocks
    ///
    /// `f` must not call other accessors of this field.  Store and registry
    /// calls made from `f` return [`ConfigError::FieldBusy`] for this field.
    pub fn update<R>(&self, f: impl FnOnce(&mut T) -> R) -> R {
        let mut guard = self.slot.write();
        f(&mut *guard)
    }

    /// Shared access to the value, for APIs that take `&T`.
    ///
    /// # Deadlocks
    ///
    /// Do not hold the guard across a call to `set_value`, `replace`,
    /// `update` or `write` on this field: those wait for it forever.  A store
    /// `load`/`set` while it is held returns [`ConfigError::FieldBusy`].
    pub fn read(&self) -> RwLockReadGuard<'_, T> {
        self.slot.read()
    }

    /// Exclusive access to the value, for APIs that take `&mut T`.
    ///
    /// # Deadlocks
    ///
    /// Do not hold the guard across any other accessor of this field.  Store
    /// calls (`get`, `save`, `set`, `load`) made while it is held return
    /// [`ConfigError::FieldBusy`] instead of waiting.
    pub fn write(&self) -> RwLockWriteGuard<'_, T> {
        self.slot.write()
    }
}

impl<T> Clone for Field<T> {
    fn clone(&self) -> Self {
        Self {
            slot: Arc::clone(&self.slot),
            bound: self.bound,
        }
    }
}

impl<T: Default> Default for Field<T> {
    fn default() -> Self {
        Self::unbound(T::default())
    }
}

impl<T: fmt::Debug> fmt::Debug for Field<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Field")
            .field("key", &self.slot.key)
            .field("value", &*self.slot.read())
            .field("bound", &self.bound)
            .finish()
    }
}

// Lets a field be embedded in larger serde structures as its bare value.
impl<T: Serialize> Serialize for Field<T> {
    fn serialize<S: serde::Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        self.slot.read().serialize(serializer)
    }
}
