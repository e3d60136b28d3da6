//! ConfigStore: moves the registry's aggregate state to and from JSON text
//! and files.
//!
//! The persisted format is a single flat JSON object, one entry per
//! registered field, keys in registration order:
//!
//! ```json
//! {"volume":80,"muted":false}
//! ```
//!
//! # Failure policy
//!
//! A missing or unreadable file, a directory that cannot be created, text
//! that is not JSON, or JSON whose top level is not an object are all
//! treated as "nothing to load" and leave every field untouched.  A file
//! that cannot be opened for writing is skipped the same way.  These paths
//! log at `debug`/`warn` and return `Ok(())`.
//!
//! A key that is present but holds a value of the wrong type is different:
//! it means the file is corrupt or from an incompatible build, so the error
//! is returned to the caller to decide between falling back to defaults and
//! refusing to start.

use std::fs::{self, File};
use std::io::{ErrorKind, Read, Write};
use std::path::{Path, PathBuf};
use std::sync::Arc;

use serde_json::Value;
use tracing::{debug, warn};

use crate::entry::Document;
use crate::error::ConfigError;
use crate::registry::FieldRegistry;

/// UTF-8 byte order mark some editors put at the start of text files.
const UTF8_BOM: &[u8] = b"\xEF\xBB\xBF";

/// Drives bulk load/save of a [`FieldRegistry`] against a base directory.
#[derive(Debug, Clone)]
pub struct ConfigStore {
    base_dir: PathBuf,
    registry: Arc<FieldRegistry>,
}

impl ConfigStore {
    /// Creates a store over [`FieldRegistry::global`] rooted at the current
    /// working directory.
    pub fn new() -> Self {
        Self::with_registry(FieldRegistry::global())
    }

    /// Creates a store over `registry` rooted at the current working directory.
    ///
    /// Falls back to `.` if the working directory cannot be determined.
    pub fn with_registry(registry: Arc<FieldRegistry>) -> Self {
        let base_dir = std::env::current_dir().unwrap_or_else(|e| {
            warn!("could not determine current directory, using \".\": {e}");
            PathBuf::from(".")
        });
        Self { base_dir, registry }
    }

    /// Builder form of [`set_default_path`](Self::set_default_path).
    pub fn with_base_dir(mut self, path: impl Into<PathBuf>) -> Self {
        self.base_dir = path.into();
        self
    }

    /// Replaces the directory used by later [`load`](Self::load) and
    /// [`save`](Self::save) calls.  The path is not checked here.
    pub fn set_default_path(&mut self, path: impl Into<PathBuf>) {
        self.base_dir = path.into();
    }

    pub fn base_dir(&self) -> &Path {
        &self.base_dir
    }

    pub fn registry(&self) -> &Arc<FieldRegistry> {
        &self.registry
    }

    /// Full path of `file_name` under the base directory.
    pub fn file_path(&self, file_name: impl AsRef<Path>) -> PathBuf {
        self.base_dir.join(file_name)
    }

    // ── In-memory interchange ─────────────────────────────────────────────────

    /// Builds a fresh document holding every registered field.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError::Serialize`] if a field value has no JSON form.
    pub fn document(&self) -> Result<Document, ConfigError> {
        let mut document = Document::new();
        self.registry.save_into(&mut document)?;
        Ok(document)
    }

    /// Loads every registered field from `document`.  Absent keys are left
    /// alone; keys no field claims are ignored.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError::Deserialize`] for the first mismatched value.
    pub fn apply(&self, document: &Document) -> Result<(), ConfigError> {
        self.registry.load_from(document)
    }

    /// Serializes every registered field to compact JSON text.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError::Serialize`] if a field value has no JSON form.
    pub fn get(&self) -> Result<String, ConfigError> {
        Ok(Value::Object(self.document()?).to_string())
    }

    /// Loads every registered field from JSON text.
    ///
    /// A leading UTF-8 byte order mark is skipped.  Text that does not
    /// parse, or parses to anything but an object, is ignored.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError::Deserialize`] for the first mismatched value.
    pub fn set(&self, text: &str) -> Result<(), ConfigError> {
        self.set_bytes(text.as_bytes())
    }

    fn set_bytes(&self, bytes: &[u8]) -> Result<(), ConfigError> {
        let bytes = bytes.strip_prefix(UTF8_BOM).unwrap_or(bytes);
        match serde_json::from_slice::<Value>(bytes) {
            Ok(Value::Object(document)) => self.apply(&document),
            Ok(other) => {
                debug!("ignoring config document with non-object top level: {}", kind_of(&other));
                Ok(())
            }
            Err(e) => {
                debug!("ignoring malformed config document: {e}");
                Ok(())
            }
        }
    }

    // ── File persistence ──────────────────────────────────────────────────────

    /// Loads every registered field from `<base_dir>/<file_name>`.
    ///
    /// The base directory is created first if it is missing.  If the file
    /// cannot be opened nothing changes.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError::Io`] if reading an opened file fails, and
    /// [`ConfigError::Deserialize`] for a mismatched value.
    pub fn load(&self, file_name: impl AsRef<Path>) -> Result<(), ConfigError> {
        self.ensure_base_dir();
        let path = self.file_path(file_name);

        let mut file = match File::open(&path) {
            Ok(file) => file,
            Err(e) => {
                debug!("no config loaded from {}: {e}", path.display());
                return Ok(());
            }
        };

        let mut bytes = Vec::new();
        file.read_to_end(&mut bytes)
            .map_err(|source| ConfigError::Io {
                path: path.clone(),
                source,
            })?;

        debug!("loaded {} bytes of config from {}", bytes.len(), path.display());
        self.set_bytes(&bytes)
    }

    /// Writes every registered field to `<base_dir>/<file_name>`, replacing
    /// the file's previous content.
    ///
    /// The base directory is created first if it is missing.  If the file
    /// cannot be opened for writing nothing is written.  The document is
    /// rendered before the file is opened, so a serialization error leaves an
    /// existing file intact.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError::Serialize`] if a field value has no JSON form and
    /// [`ConfigError::Io`] if writing to the opened file fails.
    pub fn save(&self, file_name: impl AsRef<Path>) -> Result<(), ConfigError> {
        let text = self.get()?;

        self.ensure_base_dir();
        let path = self.file_path(file_name);

        let mut file = match File::create(&path) {
            Ok(file) => file,
            Err(e) => {
                warn!("config not saved, cannot open {}: {e}", path.display());
                return Ok(());
            }
        };

        file.write_all(text.as_bytes())
            .and_then(|()| file.flush())
            .map_err(|source| ConfigError::Io {
                path: path.clone(),
                source,
            })?;

        debug!("saved {} bytes of config to {}", text.len(), path.display());
        Ok(())
    }

    /// Creates the base directory itself (not its parents).  Failure is only
    /// logged: the following open fails and takes the no-op path.
    fn ensure_base_dir(&self) {
        match fs::create_dir(&self.base_dir) {
            Ok(()) => debug!("created config directory {}", self.base_dir.display()),
            Err(e) if e.kind() == ErrorKind::AlreadyExists => {}
            Err(e) => debug!(
                "could not create config directory {}: {e}",
                self.base_dir.display()
            ),
        }
    }
}

impl Default for ConfigStore {
    fn default() -> Self {
        Self::new()
    }
}

fn kind_of(value: &Value) -> &'static str {
    match value {
        Value::Null => "null",
        Value::Bool(_) => "boolean",
        Value::Number(_) => "number",
        Value::String(_) => "string",
        Value::Array(_) => "array",
        Value::Object(_) => "object",
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::field::Field;

    fn store_with_registry() -> (ConfigStore, Arc<FieldRegistry>) {
        let registry = Arc::new(FieldRegistry::new());
        (ConfigStore::with_registry(Arc::clone(&registry)), registry)
    }

    // ── Paths ─────────────────────────────────────────────────────────────────

    #[test]
    fn test_default_base_dir_is_current_dir() {
        let (store, _registry) = store_with_registry();

        if let Ok(cwd) = std::env::current_dir() {
            assert_eq!(store.base_dir(), cwd.as_path());
        }
    }

    #[test]
    fn test_set_default_path_changes_file_path() {
        // Arrange
        let (mut store, _registry) = store_with_registry();

        // Act
        store.set_default_path("/var/lib/app");

        // Assert
        assert_eq!(store.base_dir(), Path::new("/var/lib/app"));
        assert_eq!(
            store.file_path("cfg.json"),
            PathBuf::from("/var/lib/app/cfg.json")
        );
    }

    #[test]
    fn test_with_base_dir_builder() {
        let (store, _registry) = store_with_registry();

        let store = store.with_base_dir("conf");

        assert_eq!(store.file_path("a.json"), PathBuf::from("conf/a.json"));
    }

    // ── get / set ─────────────────────────────────────────────────────────────

    #[test]
    fn test_get_on_empty_registry_is_empty_object() {
        let (store, _registry) = store_with_registry();

        assert_eq!(store.get().expect("get must succeed"), "{}");
    }

    #[test]
    fn test_get_emits_fields_in_registration_order() {
        // Arrange
        let (store, registry) = store_with_registry();
        let _volume = Field::new_in(&registry, "volume", 80i32).expect("must register");
        let _muted = Field::new_in(&registry, "muted", false).expect("must register");

        // Act
        let text = store.get().expect("get must succeed");

        // Assert
        assert_eq!(text, r#"{"volume":80,"muted":false}"#);
    }

    #[test]
    fn test_set_updates_only_present_keys() {
        // Arrange
        let (store, registry) = store_with_registry();
        let volume = Field::new_in(&registry, "volume", 80i32).expect("must register");
        let muted = Field::new_in(&registry, "muted", false).expect("must register");

        // Act
        store.set(r#"{"volume":50}"#).expect("set must succeed");

        // Assert
        assert_eq!(volume.value(), 50);
        assert!(!muted.value());
    }

    #[test]
    fn test_set_ignores_non_object_documents() {
        let (store, registry) = store_with_registry();
        let volume = Field::new_in(&registry, "volume", 80i32).expect("must register");

        for text in ["not json", "[1,2,3]", "42", "\"volume\"", "null", ""] {
            store.set(text).expect("non-object input must be a no-op");
            assert_eq!(volume.value(), 80, "input {text:?} must not touch fields");
        }
    }

    #[test]
    fn test_set_reports_type_mismatch() {
        let (store, registry) = store_with_registry();
        let volume = Field::new_in(&registry, "volume", 80i32).expect("must register");

        let result = store.set(r#"{"volume":"loud"}"#);

        assert!(matches!(result, Err(ConfigError::Deserialize { ref key, .. }) if key == "volume"));
        assert_eq!(volume.value(), 80);
    }

    #[test]
    fn test_set_skips_leading_byte_order_mark() {
        let (store, registry) = store_with_registry();
        let volume = Field::new_in(&registry, "volume", 80i32).expect("must register");

        store.set("\u{FEFF}{\"volume\":50}").expect("set must succeed");

        assert_eq!(volume.value(), 50);
    }

    #[test]
    fn test_set_type_mismatch_keeps_earlier_loads() {
        // Arrange
        let (store, registry) = store_with_registry();
        let a = Field::new_in(&registry, "a", 0i32).expect("must register");
        let b = Field::new_in(&registry, "b", 0i32).expect("must register");
        let c = Field::new_in(&registry, "c", 0i32).expect("must register");

        // Act
        let result = store.set(r#"{"a":1,"b":"x","c":3}"#);

        // Assert
        assert!(matches!(result, Err(ConfigError::Deserialize { ref key, .. }) if key == "b"));
        assert_eq!(a.value(), 1, "fields before the mismatch keep their loaded value");
        assert_eq!(b.value(), 0);
        assert_eq!(c.value(), 0, "fields after the mismatch are not visited");
    }

    #[test]
    fn test_get_while_write_guard_held_reports_busy_instead_of_hanging() {
        // Arrange
        let (store, registry) = store_with_registry();
        let volume = Field::new_in(&registry, "volume", 80i32).expect("must register");

        // Act
        let mut guard = volume.write();
        *guard = 5;
        let result = store.get();
        drop(guard);

        // Assert
        assert!(matches!(result, Err(ConfigError::FieldBusy { ref key }) if key == "volume"));
        assert_eq!(store.get().expect("get must succeed"), r#"{"volume":5}"#);
    }

    #[test]
    fn test_store_call_inside_update_reports_busy() {
        let (store, registry) = store_with_registry();
        let volume = Field::new_in(&registry, "volume", 80i32).expect("must register");

        let result = volume.update(|v| {
            *v = 10;
            store.set(r#"{"volume":50}"#)
        });

        assert!(matches!(result, Err(ConfigError::FieldBusy { .. })));
        assert_eq!(volume.value(), 10);
    }

    #[test]
    fn test_set_while_read_guard_held_reports_busy() {
        let (store, registry) = store_with_registry();
        let volume = Field::new_in(&registry, "volume", 80i32).expect("must register");

        let guard = volume.read();
        let saved = store.get();
        let loaded = store.set(r#"{"volume":50}"#);
        drop(guard);

        assert_eq!(saved.expect("shared read does not block get"), r#"{"volume":80}"#);
        assert!(matches!(loaded, Err(ConfigError::FieldBusy { .. })));
        assert_eq!(volume.value(), 80);
    }

    #[test]
    fn test_document_and_apply_round_trip() {
        // Arrange
        let (store, registry) = store_with_registry();
        let name = Field::new_in(&registry, "name", "alpha".to_string()).expect("must register");
        let document = store.document().expect("document must build");
        name.set_value("beta".to_string());

        // Act
        store.apply(&document).expect("apply must succeed");

        // Assert
        assert_eq!(name.value(), "alpha");
    }

    #[test]
    fn test_kind_of_names_json_types() {
        assert_eq!(kind_of(&Value::Array(Vec::new())), "array");
        assert_eq!(kind_of(&Value::Null), "null");
        assert_eq!(kind_of(&Value::Bool(true)), "boolean");
    }
}
