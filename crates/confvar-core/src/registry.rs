//! FieldRegistry: the ordered list of every live configuration field.
//!
//! The registry is the fan-out point for bulk load and save.  It does not own
//! the fields it lists: each entry is a [`Weak`] handle, so ownership stays
//! with whoever constructed the `Field<T>`.  Fields are expected to live for
//! the whole process, but when the last handle to one is dropped the registry
//! skips it during fan-out and forgets it on the next registration.
//!
//! # Global vs explicit registries
//!
//! Applications can build a [`FieldRegistry`] themselves and pass it to
//! `Field::new_in` and `ConfigStore::with_registry`.  That keeps all state
//! explicit and is what the tests do.  For the "declare a field anywhere and
//! it is persisted" style, [`FieldRegistry::global`] returns a lazily created
//! process-wide instance; `Field::new` and `ConfigStore::new` use it.
//!
//! # Locking
//!
//! Registration and iteration take a `RwLock` internally so the global
//! instance can live in a `static`.  That lock only protects the list itself.
//! Loading and saving field values concurrently from several threads is still
//! the caller's responsibility to serialise.

use std::fmt;
use std::sync::{Arc, OnceLock, PoisonError, RwLock, RwLockReadGuard, RwLockWriteGuard, Weak};

use tracing::debug;

use crate::entry::{ConfigEntry, Document};
use crate::error::ConfigError;

/// Process-wide registry used by `Field::new`.  Created on first use.
static GLOBAL_REGISTRY: OnceLock<Arc<FieldRegistry>> = OnceLock::new();

/// One registered field: its key (cached so dead handles can still be
/// reported) and a non-owning handle to it.
struct Registered {
    key: String,
    handle: Weak<dyn ConfigEntry>,
}

impl Registered {
    fn is_live(&self) -> bool {
        self.handle.strong_count() > 0
    }
}

/// Insertion-ordered collection of type-erased configuration fields.
#[derive(Default)]
pub struct FieldRegistry {
    entries: RwLock<Vec<Registered>>,
}

impl FieldRegistry {
    /// Creates an empty registry.
    pub fn new() -> Self {
        Self::default()
    }

    /// Returns the process-wide registry, creating it on first call.
    pub fn global() -> Arc<FieldRegistry> {
        Arc::clone(GLOBAL_REGISTRY.get_or_init(|| Arc::new(FieldRegistry::new())))
    }

    /// Appends `entry` to the registry.
    ///
    /// Entries whose fields have been dropped are pruned first, so a key only
    /// counts as taken while the field holding it is alive.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError::DuplicateKey`] if a live entry already uses the
    /// same key.  The registry is left unchanged in that case.
    pub fn register<E>(&self, entry: &Arc<E>) -> Result<(), ConfigError>
    where
        E: ConfigEntry + 'static,
    {
        let key = entry.key().to_string();
        let mut entries = self.write_entries();
        entries.retain(Registered::is_live);

        if entries.iter().any(|registered| registered.key == key) {
            return Err(ConfigError::DuplicateKey { key });
        }

        let handle: Weak<E> = Arc::downgrade(entry);
        let handle: Weak<dyn ConfigEntry> = handle;
        debug!("registered config key {key:?} ({} live)", entries.len() + 1);
        entries.push(Registered { key, handle });
        Ok(())
    }

    /// Invokes `action` on every live entry in registration order.
    ///
    /// The action runs against a snapshot taken up front, so it may freely
    /// use the registry (including registering new fields, which will not be
    /// visited by this pass).  Iteration stops at the first error.
    ///
    /// # Errors
    ///
    /// Propagates the first error returned by `action`.
    pub fn for_each<F>(&self, mut action: F) -> Result<(), ConfigError>
    where
        F: FnMut(&dyn ConfigEntry) -> Result<(), ConfigError>,
    {
        for entry in self.live_entries() {
            action(entry.as_ref())?;
        }
        Ok(())
    }

    /// Writes every live field into `document`.
    ///
    /// # Errors
    ///
    /// Returns the first [`ConfigError::Serialize`] or
    /// [`ConfigError::FieldBusy`] encountered.
    pub fn save_into(&self, document: &mut Document) -> Result<(), ConfigError> {
        self.for_each(|entry| entry.save_into(document))
    }

    /// Lets every live field read its value from `document`.
    ///
    /// Fields whose key is absent keep their value.  On a type mismatch the
    /// pass stops: fields visited earlier keep what they loaded, later ones
    /// are untouched.
    ///
    /// # Errors
    ///
    /// Returns the first [`ConfigError::Deserialize`] or
    /// [`ConfigError::FieldBusy`] encountered.
    pub fn load_from(&self, document: &Document) -> Result<(), ConfigError> {
        self.for_each(|entry| entry.load_from(document))
    }

    /// Keys of all live fields in registration order.
    pub fn keys(&self) -> Vec<String> {
        self.read_entries()
            .iter()
            .filter(|registered| registered.is_live())
            .map(|registered| registered.key.clone())
            .collect()
    }

    /// Returns `true` if a live field is registered under `key`.
    pub fn contains(&self, key: &str) -> bool {
        self.read_entries()
            .iter()
            .any(|registered| registered.is_live() && registered.key == key)
    }

    /// Number of live fields.
    pub fn len(&self) -> usize {
        self.read_entries()
            .iter()
            .filter(|registered| registered.is_live())
            .count()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    fn live_entries(&self) -> Vec<Arc<dyn ConfigEntry>> {
        self.read_entries()
            .iter()
            .filter_map(|registered| registered.handle.upgrade())
            .collect()
    }

    // The guarded Vec is only ever pushed to or filtered, so a panic while
    // holding the lock cannot leave it inconsistent.
    fn read_entries(&self) -> RwLockReadGuard<'_, Vec<Registered>> {
        self.entries.read().unwrap_or_else(PoisonError::into_inner)
    }

    fn write_entries(&self) -> RwLockWriteGuard<'_, Vec<Registered>> {
        self.entries.write().unwrap_or_else(PoisonError::into_inner)
    }
}

impl fmt::Debug for FieldRegistry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("FieldRegistry")
            .field("keys", &self.keys())
            .finish()
    }
}
