//! Error type shared by the registry, the typed fields and the store.
//!
//! Whole-document problems (missing file, malformed JSON, a top-level value
//! that is not an object) never show up here: the store degrades those to
//! no-ops so a fresh install starts from the compiled-in defaults.  What does
//! show up is anything that means the data on disk or in memory is wrong for
//! the field that owns it.

use std::path::PathBuf;

use thiserror::Error;

/// Error type for configuration registry and persistence operations.
#[derive(Debug, Error)]
pub enum ConfigError {
    /// A live field already owns this key in the target registry.
    #[error("duplicate config key: {key:?} is already registered")]
    DuplicateKey { key: String },

    /// The document holds a value for `key` that does not fit the field's type.
    #[error("failed to deserialize config key {key:?}: {source}")]
    Deserialize {
        key: String,
        #[source]
        source: serde_json::Error,
    },

    /// The field's current value has no JSON representation.
    #[error("failed to serialize config key {key:?}: {source}")]
    Serialize {
        key: String,
        #[source]
        source: serde_json::Error,
    },

    /// The field's value is locked by a guard that is still alive, e.g. a
    /// `Field::write()` guard held across a store call on the same thread.
    #[error("config key {key:?} is locked by an outstanding guard")]
    FieldBusy { key: String },

    /// Reading or writing an already opened config file failed.
    #[error("I/O error accessing config at {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
}

impl ConfigError {
    /// Returns the field key the error is about, if any.
    pub fn key(&self) -> Option<&str> {
        match self {
            ConfigError::DuplicateKey { key }
            | ConfigError::Deserialize { key, .. }
            | ConfigError::Serialize { key, .. }
            | ConfigError::FieldBusy { key } => Some(key),
            ConfigError::Io { .. } => None,
        }
    }
}
