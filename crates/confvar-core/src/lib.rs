//! # confvar-core
//!
//! Typed configuration values that persist themselves as one JSON document.
//!
//! An application declares each setting as a [`Field<T>`] with a key and a
//! default value.  Every field registers in a [`FieldRegistry`], and a
//! [`ConfigStore`] saves the whole registry to `<dir>/<file>` as a flat JSON
//! object, or loads it back, one key per field.
//!
//! - **`entry`** – [`ConfigEntry`], the object-safe load/save interface the
//!   registry uses to treat fields of different types uniformly.
//! - **`field`** – [`Field<T>`], the typed value plus its accessors.
//! - **`registry`** – [`FieldRegistry`], the ordered list of live fields, with
//!   an optional process-wide instance.
//! - **`store`** – [`ConfigStore`], JSON text and file persistence.
//!
//! ```rust
//! use std::sync::Arc;
//! use confvar_core::{ConfigStore, Field, FieldRegistry};
//!
//! let registry = Arc::new(FieldRegistry::new());
//! let volume = Field::new_in(&registry, "volume", 80).unwrap();
//! let muted = Field::new_in(&registry, "muted", false).unwrap();
//! let store = ConfigStore::with_registry(registry);
//!
//! assert_eq!(store.get().unwrap(), r#"{"volume":80,"muted":false}"#);
//!
//! store.set(r#"{"volume":50}"#).unwrap();
//! assert_eq!(volume.value(), 50);
//! assert!(!muted.value());
//! ```
//!
//! Nothing here synchronises a load against concurrent reads and writes of
//! field values.  Run load/save from one coordinating thread.
//!
//! Do not hold a [`Field::read`] or [`Field::write`] guard (or sit inside
//! [`Field::update`]) across a store or registry call.  Such calls do not
//! wait for the guard; they fail with [`ConfigError::FieldBusy`].

pub mod entry;
pub mod error;
pub mod field;
pub mod registry;
pub mod store;

pub use entry::{ConfigEntry, Document};
pub use error::ConfigError;
pub use field::{Field, FieldValue};
pub use registry::FieldRegistry;
pub use store::ConfigStore;
