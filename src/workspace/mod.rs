//! File-backed persisted workspace state.
//!
//! Implements the opaque key-value [`WorkspaceState`] contract on top of a
//! JSON document, giving the standalone binary the cross-session memory an
//! editor host would normally provide.

use std::collections::HashMap;
use std::io::ErrorKind;
use std::sync::Mutex;

use camino::{Utf8Path, Utf8PathBuf};
use serde_json::Value;
use thiserror::Error;

use crate::host::WorkspaceState;

#[cfg(test)]
mod tests;

/// Errors loading persisted workspace state.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum WorkspaceStateError {
    /// The backing file could not be read.
    #[error("failed to read workspace state: {message}")]
    Io {
        /// I/O error detail.
        message: String,
    },

    /// The backing file exists but is not a JSON object.
    #[error("workspace state file is not valid JSON: {message}")]
    Parse {
        /// Parse error detail.
        message: String,
    },
}

/// Workspace state persisted as a JSON object on disk.
///
/// Writes happen eagerly on every insert; a write failure is logged rather
/// than surfaced, matching the fire-and-forget contract of the trait.
pub struct JsonWorkspaceState {
    path: Utf8PathBuf,
    entries: Mutex<HashMap<String, Value>>,
}

impl JsonWorkspaceState {
    /// Loads the state stored at `path`, starting empty when the file does
    /// not exist yet.
    ///
    /// # Errors
    ///
    /// Returns [`WorkspaceStateError::Io`] when the file exists but cannot be
    /// read and [`WorkspaceStateError::Parse`] when its contents are not a
    /// JSON object.
    pub fn load(path: Utf8PathBuf) -> Result<Self, WorkspaceStateError> {
        let entries = match std::fs::read_to_string(&path) {
            Ok(raw) => {
                serde_json::from_str(&raw).map_err(|error| WorkspaceStateError::Parse {
                    message: error.to_string(),
                })?
            }
            Err(error) if error.kind() == ErrorKind::NotFound => HashMap::new(),
            Err(error) => {
                return Err(WorkspaceStateError::Io {
                    message: error.to_string(),
                });
            }
        };
        Ok(Self {
            path,
            entries: Mutex::new(entries),
        })
    }

    /// Returns the path of the backing file.
    #[must_use]
    pub fn path(&self) -> &Utf8Path {
        &self.path
    }

    fn persist(&self, entries: &HashMap<String, Value>) {
        let serialised = match serde_json::to_string_pretty(entries) {
            Ok(serialised) => serialised,
            Err(error) => {
                tracing::warn!(path = %self.path, %error, "failed to serialise workspace state");
                return;
            }
        };
        if let Err(error) = std::fs::write(&self.path, serialised) {
            tracing::warn!(path = %self.path, %error, "failed to write workspace state");
        }
    }
}

impl WorkspaceState for JsonWorkspaceState {
    fn get(&self, key: &str) -> Option<Value> {
        #[expect(
            clippy::expect_used,
            reason = "Mutex poisoning is an unrecoverable error"
        )]
        let entries = self.entries.lock().expect("workspace state lock poisoned");
        entries.get(key).cloned()
    }

    fn insert(&self, key: &str, value: Value) {
        #[expect(
            clippy::expect_used,
            reason = "Mutex poisoning is an unrecoverable error"
        )]
        let mut entries = self.entries.lock().expect("workspace state lock poisoned");
        entries.insert(key.to_owned(), value);
        self.persist(&entries);
    }
}

impl std::fmt::Debug for JsonWorkspaceState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("JsonWorkspaceState")
            .field("path", &self.path)
            .finish_non_exhaustive()
    }
}
