//! Collaborator traits provided by the hosting environment.
//!
//! The activation coordinator composes subsystems it does not own: the git
//! collaborator that tracks open repositories, the settings surface, the
//! persisted workspace state, and the UI registry the pull-request provider
//! binds its surfaces to. Each is reached only through the traits here, which
//! keeps the coordinator testable with mock implementations and lets the same
//! core run inside an editor host or as a standalone process (see
//! [`crate::git`] and [`crate::workspace`] for the standalone
//! implementations).

use std::collections::HashMap;
use std::sync::Mutex;

use async_trait::async_trait;
use camino::{Utf8Path, Utf8PathBuf};
use serde_json::Value;
use thiserror::Error;

use crate::config::AuthSettings;

#[cfg(any(test, feature = "test-support"))]
pub mod test_support;

/// Opaque reference to a discovered git working copy.
///
/// Produced by the [`GitExtension`] collaborator; the activation core never
/// looks inside beyond the working directory it binds the repository state
/// to.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RepositoryHandle {
    workdir: Utf8PathBuf,
    remote_url: Option<String>,
}

impl RepositoryHandle {
    /// Creates a handle for the working copy rooted at `workdir`.
    #[must_use]
    pub const fn new(workdir: Utf8PathBuf, remote_url: Option<String>) -> Self {
        Self {
            workdir,
            remote_url,
        }
    }

    /// Returns the working directory of the repository.
    #[must_use]
    pub fn workdir(&self) -> &Utf8Path {
        &self.workdir
    }

    /// Returns the URL of the repository's primary remote, when known.
    #[must_use]
    pub fn remote_url(&self) -> Option<&str> {
        self.remote_url.as_deref()
    }
}

/// Errors raised by editor-host collaborators.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum HostError {
    /// Registering a UI surface with the host failed.
    #[error("UI registration failed: {message}")]
    Registration {
        /// Detail reported by the hosting environment.
        message: String,
    },
}

/// Git collaborator that tracks which repositories are open.
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait GitExtension: Send + Sync {
    /// Repositories the collaborator currently knows about. May be empty when
    /// the collaborator has not finished opening any repository yet.
    fn repositories(&self) -> Vec<RepositoryHandle>;

    /// Waits for the next repository to be opened.
    ///
    /// This is a one-shot wait: the coordinator calls it at most once, and
    /// only when [`repositories`](Self::repositories) yielded nothing usable.
    /// Returns `None` when the collaborator will never open another
    /// repository.
    async fn opened_repository(&self) -> Option<RepositoryHandle>;
}

/// The host's settings surface for the three authentication keys.
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait SettingsSource: Send + Sync {
    /// Reads the current values.
    fn current(&self) -> AuthSettings;

    /// Waits for the next settings-change notification, returning the
    /// re-read values. Returns `None` when no further changes will be
    /// delivered.
    async fn changed(&self) -> Option<AuthSettings>;
}

/// A UI surface the pull-request provider registers with the host.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum UiSurface {
    /// Tree view listing the pull requests relevant to the repository.
    PullRequestTree {
        /// Title shown on the tree view.
        title: String,
    },
    /// Webview rendering the description of the selected pull request.
    DescriptionView {
        /// Title shown on the webview.
        title: String,
    },
}

/// Registry the provider uses to bind UI surfaces to the host.
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait UiRegistry: Send + Sync {
    /// Registers a surface, completing once the host has accepted it.
    ///
    /// # Errors
    ///
    /// Returns [`HostError::Registration`] when the host rejects the surface.
    async fn register(&self, surface: UiSurface) -> Result<(), HostError>;
}

/// Opaque key-value store for cross-session workspace memory.
///
/// The core passes this through to the repository state and review mode; it
/// never interprets the stored values itself.
pub trait WorkspaceState: Send + Sync {
    /// Returns the stored value for `key`, if any.
    fn get(&self, key: &str) -> Option<Value>;

    /// Stores `value` under `key`, replacing any previous value.
    fn insert(&self, key: &str, value: Value);
}

/// Workspace state held only in memory, for hosts without persistence.
#[derive(Debug, Default)]
pub struct InMemoryWorkspaceState {
    entries: Mutex<HashMap<String, Value>>,
}

impl InMemoryWorkspaceState {
    /// Creates an empty store.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }
}

impl WorkspaceState for InMemoryWorkspaceState {
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
    }
}

/// Settings source whose values never change after construction.
///
/// Used by the standalone binary, where configuration is fixed at process
/// start; [`changed`](SettingsSource::changed) reports the end of the stream
/// immediately.
#[derive(Debug, Clone)]
pub struct StaticSettings {
    settings: AuthSettings,
}

impl StaticSettings {
    /// Creates a source that always reports `settings`.
    #[must_use]
    pub const fn new(settings: AuthSettings) -> Self {
        Self { settings }
    }
}

#[async_trait]
impl SettingsSource for StaticSettings {
    fn current(&self) -> AuthSettings {
        self.settings.clone()
    }

    async fn changed(&self) -> Option<AuthSettings> {
        None
    }
}

/// UI registry that records registrations in the process log.
///
/// Stands in for real editor surfaces when the crate runs as a plain CLI.
#[derive(Debug, Default)]
pub struct LoggingUiRegistry {
    registered: Mutex<Vec<UiSurface>>,
}

impl LoggingUiRegistry {
    /// Creates an empty registry.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Returns the surfaces registered so far.
    #[must_use]
    pub fn registered(&self) -> Vec<UiSurface> {
        #[expect(
            clippy::expect_used,
            reason = "Mutex poisoning is an unrecoverable error"
        )]
        let registered = self.registered.lock().expect("registry lock poisoned");
        registered.clone()
    }
}

#[async_trait]
impl UiRegistry for LoggingUiRegistry {
    async fn register(&self, surface: UiSurface) -> Result<(), HostError> {
        tracing::info!(?surface, "registered UI surface");
        #[expect(
            clippy::expect_used,
            reason = "Mutex poisoning is an unrecoverable error"
        )]
        let mut registered = self.registered.lock().expect("registry lock poisoned");
        registered.push(surface);
        Ok(())
    }
}
