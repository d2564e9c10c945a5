//! State wrapper around a single git working copy.
//!
//! [`RepositoryState`] is created once per activation. The git collaborator
//! feeds it status snapshots through [`record_status`], which fan out to
//! subscribers; the activation coordinator listens for the first of those
//! notifications. Connecting to GitHub happens at most once over the life of
//! the state, no matter how often [`connect_github`] is called.
//!
//! [`record_status`]: RepositoryState::record_status
//! [`connect_github`]: RepositoryState::connect_github

use std::sync::{Arc, RwLock};

use camino::{Utf8Path, Utf8PathBuf};
use tokio::sync::OnceCell;
use tokio::sync::broadcast;

use crate::credentials::{CredentialError, CredentialStore, GitHubSession};
use crate::host::WorkspaceState;


/// Buffered status notifications per subscriber.
const STATUS_CHANNEL_CAPACITY: usize = 64;

/// One recomputation of the repository's git status.
///
/// The activation core only cares that these fire; the counts exist for the
/// surfaces that render them.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct GitStatusSnapshot {
    /// Checked-out branch name, when HEAD points at a branch.
    pub branch: Option<String>,
    /// Commit id of HEAD, when the repository has any commit.
    pub head_sha: Option<String>,
    /// Entries staged in the index.
    pub staged: usize,
    /// Tracked entries modified in the working tree.
    pub unstaged: usize,
    /// Untracked entries in the working tree.
    pub untracked: usize,
}

/// GitHub connection established for a repository.
struct ConnectedGitHub {
    credentials: Arc<CredentialStore>,
    session: GitHubSession,
}

/// Live state of the git working copy under review.
pub struct RepositoryState {
    root: Utf8PathBuf,
    workspace_state: Arc<dyn WorkspaceState>,
    status_tx: broadcast::Sender<GitStatusSnapshot>,
    last_status: RwLock<Option<GitStatusSnapshot>>,
    github: OnceCell<ConnectedGitHub>,
}

impl RepositoryState {
    /// Creates the state for the working copy rooted at `root`.
    #[must_use]
    pub fn new(root: Utf8PathBuf, workspace_state: Arc<dyn WorkspaceState>) -> Self {
        let (status_tx, _) = broadcast::channel(STATUS_CHANNEL_CAPACITY);
        Self {
            root,
            workspace_state,
            status_tx,
            last_status: RwLock::new(None),
            github: OnceCell::new(),
        }
    }

    /// Returns the root of the working copy.
    #[must_use]
    pub fn root(&self) -> &Utf8Path {
        &self.root
    }

    /// Returns the persisted workspace state handed through at construction.
    #[must_use]
    pub const fn workspace_state(&self) -> &Arc<dyn WorkspaceState> {
        &self.workspace_state
    }

    /// Subscribes to status notifications.
    ///
    /// Notifications fire at least once per status recomputation for as long
    /// as the state lives.
    #[must_use]
    pub fn subscribe_status(&self) -> broadcast::Receiver<GitStatusSnapshot> {
        self.status_tx.subscribe()
    }

    /// Publishes a freshly computed status snapshot to all subscribers.
    ///
    /// Called by the git collaborator every time it recomputes status.
    pub fn record_status(&self, snapshot: GitStatusSnapshot) {
        {
            #[expect(
                clippy::expect_used,
                reason = "RwLock poisoning is an unrecoverable error"
            )]
            let mut last = self.last_status.write().expect("status lock poisoned");
            *last = Some(snapshot.clone());
        }
        // A send error only means nobody is subscribed right now.
        drop(self.status_tx.send(snapshot));
    }

    /// Returns the most recently recorded status snapshot.
    #[must_use]
    pub fn last_status(&self) -> Option<GitStatusSnapshot> {
        #[expect(
            clippy::expect_used,
            reason = "RwLock poisoning is an unrecoverable error"
        )]
        let last = self.last_status.read().expect("status lock poisoned");
        last.clone()
    }

    /// Establishes the GitHub connection through the given credential store.
    ///
    /// The connection happens at most once; concurrent or repeated calls
    /// share the outcome of the first successful establishment.
    ///
    /// # Errors
    ///
    /// Returns [`CredentialError`] when the store cannot produce a session.
    pub async fn connect_github(
        &self,
        credentials: Arc<CredentialStore>,
    ) -> Result<(), CredentialError> {
        self.github
            .get_or_try_init(|| async {
                let session = credentials.session().await?.clone();
                tracing::debug!(
                    repository = %self.root,
                    api_base = %session.api_base(),
                    "repository connected to GitHub"
                );
                Ok(ConnectedGitHub {
                    credentials,
                    session,
                })
            })
            .await
            .map(|_| ())
    }

    /// Reports whether [`connect_github`](Self::connect_github) has
    /// completed.
    #[must_use]
    pub fn is_connected(&self) -> bool {
        self.github.get().is_some()
    }

    /// Returns the established GitHub session, if connected.
    #[must_use]
    pub fn github_session(&self) -> Option<&GitHubSession> {
        self.github.get().map(|connected| &connected.session)
    }

    /// Returns the credential store the connection was made through.
    #[must_use]
    pub fn credentials(&self) -> Option<&Arc<CredentialStore>> {
        self.github.get().map(|connected| &connected.credentials)
    }
}

impl std::fmt::Debug for RepositoryState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RepositoryState")
            .field("root", &self.root)
            .field("connected", &self.is_connected())
            .finish_non_exhaustive()
    }
}
