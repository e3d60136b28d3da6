//! The type-erased view of a configuration field.
//!
//! A registry has to hold fields of many different value types in a single
//! list.  [`ConfigEntry`] is the object-safe slice of a field that the
//! registry needs: a key plus "read yourself from this document" and "write
//! yourself into this document".  `Field<T>` implements it once per `T`.

use crate::error::ConfigError;

/// A JSON object holding one entry per configuration key.
///
/// Built fresh for every save and parsed fresh for every load; nothing keeps
/// a document alive between calls.
pub type Document = serde_json::Map<String, serde_json::Value>;

/// Load/save capability shared by every registered field.
#[cfg_attr(test, mockall::automock)]
pub trait ConfigEntry: Send + Sync {
    /// The document key this entry reads from and writes to.
    fn key(&self) -> &str;

    /// Overwrites the entry's value from `document[key]`.
    ///
    /// A missing key leaves the value untouched and returns `Ok(())`.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError::Deserialize`] when the key is present but its
    /// value does not fit the entry's type.
    fn load_from(&self, document: &Document) -> Result<(), ConfigError>;

    /// Writes the entry's current value to `document[key]`, replacing any
    /// existing value at that key.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError::Serialize`] when the value has no JSON form.
    fn save_into(&self, document: &mut Document) -> Result<(), ConfigError>;
}
