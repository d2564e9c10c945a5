//! Scriptable collaborator implementations for tests.
//!
//! Unlike the `mockall` automocks, these fakes carry state a test can drive
//! and inspect across await points, which is what the lifecycle tests need.

use std::sync::Arc;
use std::sync::Mutex as StdMutex;
use std::sync::atomic::{AtomicBool, Ordering};

use async_trait::async_trait;
use tokio::sync::{Mutex, mpsc, oneshot};

use crate::config::AuthSettings;
use crate::host::{
    GitExtension, HostError, RepositoryHandle, SettingsSource, UiRegistry, UiSurface,
};
use crate::repository::RepositoryState;

/// Git collaborator scripted by the test.
pub struct FakeGitExtension {
    known: Vec<RepositoryHandle>,
    opened: Mutex<Option<oneshot::Receiver<RepositoryHandle>>>,
    subscribed: AtomicBool,
}

impl FakeGitExtension {
    /// A collaborator that already knows the given repositories and will
    /// never open another one.
    #[must_use]
    pub fn with_repositories(known: Vec<RepositoryHandle>) -> Self {
        Self {
            known,
            opened: Mutex::new(None),
            subscribed: AtomicBool::new(false),
        }
    }

    /// A collaborator with no repository yet; the returned sender opens one.
    #[must_use]
    pub fn opening_later() -> (Self, oneshot::Sender<RepositoryHandle>) {
        let (tx, rx) = oneshot::channel();
        (
            Self {
                known: Vec::new(),
                opened: Mutex::new(Some(rx)),
                subscribed: AtomicBool::new(false),
            },
            tx,
        )
    }

    /// Whether the opened-repository wait was ever armed.
    #[must_use]
    pub fn was_subscribed(&self) -> bool {
        self.subscribed.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl GitExtension for FakeGitExtension {
    fn repositories(&self) -> Vec<RepositoryHandle> {
        self.known.clone()
    }

    async fn opened_repository(&self) -> Option<RepositoryHandle> {
        self.subscribed.store(true, Ordering::SeqCst);
        let receiver = self.opened.lock().await.take()?;
        receiver.await.ok()
    }
}

/// Settings surface whose change stream the test drives.
pub struct FakeSettingsSource {
    initial: AuthSettings,
    changes: Mutex<mpsc::UnboundedReceiver<AuthSettings>>,
}

impl FakeSettingsSource {
    /// A source with an open change stream driven through the sender.
    #[must_use]
    pub fn new(initial: AuthSettings) -> (Self, mpsc::UnboundedSender<AuthSettings>) {
        let (tx, rx) = mpsc::unbounded_channel();
        (
            Self {
                initial,
                changes: Mutex::new(rx),
            },
            tx,
        )
    }

    /// A source that never delivers a change.
    #[must_use]
    pub fn quiet(initial: AuthSettings) -> Self {
        let (source, _tx) = Self::new(initial);
        source
    }
}

#[async_trait]
impl SettingsSource for FakeSettingsSource {
    fn current(&self) -> AuthSettings {
        self.initial.clone()
    }

    async fn changed(&self) -> Option<AuthSettings> {
        self.changes.lock().await.recv().await
    }
}

/// UI registry recording every registration, optionally rejecting them.
pub struct RecordingUiRegistry {
    registered: StdMutex<Vec<UiSurface>>,
    bound: StdMutex<Option<Arc<RepositoryState>>>,
    connected_at_registration: StdMutex<Vec<bool>>,
    reject: AtomicBool,
}

impl RecordingUiRegistry {
    /// A registry that accepts every registration.
    #[must_use]
    pub fn new() -> Self {
        Self {
            registered: StdMutex::new(Vec::new()),
            bound: StdMutex::new(None),
            connected_at_registration: StdMutex::new(Vec::new()),
            reject: AtomicBool::new(false),
        }
    }

    /// A registry that rejects every registration.
    #[must_use]
    pub fn rejecting() -> Self {
        let registry = Self::new();
        registry.reject.store(true, Ordering::SeqCst);
        registry
    }

    /// Gives the registry a repository to probe at registration time.
    pub fn bind_repository(&self, repository: Arc<RepositoryState>) {
        #[expect(
            clippy::expect_used,
            reason = "Mutex poisoning is an unrecoverable error"
        )]
        let mut bound = self.bound.lock().expect("bound repository lock poisoned");
        bound.replace(repository);
    }

    /// Number of surfaces registered so far.
    #[must_use]
    pub fn register_count(&self) -> usize {
        #[expect(
            clippy::expect_used,
            reason = "Mutex poisoning is an unrecoverable error"
        )]
        let registered = self.registered.lock().expect("registrations lock poisoned");
        registered.len()
    }

    /// Whether the bound repository was GitHub-connected at each
    /// registration.
    #[must_use]
    pub fn connection_flags(&self) -> Vec<bool> {
        #[expect(
            clippy::expect_used,
            reason = "Mutex poisoning is an unrecoverable error"
        )]
        let flags = self
            .connected_at_registration
            .lock()
            .expect("connection flags lock poisoned");
        flags.clone()
    }
}

impl Default for RecordingUiRegistry {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl UiRegistry for RecordingUiRegistry {
    async fn register(&self, surface: UiSurface) -> Result<(), HostError> {
        if self.reject.load(Ordering::SeqCst) {
            return Err(HostError::Registration {
                message: "registration rejected by test".to_owned(),
            });
        }
        let bound = {
            #[expect(
                clippy::expect_used,
                reason = "Mutex poisoning is an unrecoverable error"
            )]
            let bound = self.bound.lock().expect("bound repository lock poisoned");
            bound.clone()
        };
        if let Some(repository) = bound {
            #[expect(
                clippy::expect_used,
                reason = "Mutex poisoning is an unrecoverable error"
            )]
            let mut flags = self
                .connected_at_registration
                .lock()
                .expect("connection flags lock poisoned");
            flags.push(repository.is_connected());
        }
        #[expect(
            clippy::expect_used,
            reason = "Mutex poisoning is an unrecoverable error"
        )]
        let mut registered = self.registered.lock().expect("registrations lock poisoned");
        registered.push(surface);
        Ok(())
    }
}
