//! Activation sequencing for the review workspace.
//!
//! [`ActivationCoordinator`] owns the startup order: resolve a repository
//! from the git collaborator (waiting if none is open yet), construct the
//! [`RepositoryState`], arm a listener on its status stream, and on the first
//! status notification run the downstream chain exactly once: credential
//! store, GitHub connection, review mode, then provider activation, each step
//! awaited before the next begins.
//!
//! The lifecycle is a small state machine published through a watch channel:
//!
//! ```text
//! Idle -> AwaitingRepository -> AwaitingFirstStatus -> Initialized
//!                                                  \-> Failed
//! ```
//!
//! `Initialized` is entered when the first status notification trips the
//! latch; the chain runs on entry and a failure anywhere moves the machine to
//! `Failed`, which is terminal for the activation. Status notifications keep
//! firing for the life of the repository state; all of them after the first
//! are no-ops here. Errors from the chain surface through
//! [`Activation::settled`]; there is no automatic retry and the listener is
//! not re-armed.

use std::sync::Arc;
use std::time::Duration;

use thiserror::Error;
use tokio::sync::{broadcast, watch};
use tokio::task::JoinHandle;

use crate::config::SharedAuthSettings;
use crate::credentials::{CredentialError, CredentialStore};
use crate::host::{GitExtension, HostError, RepositoryHandle, SettingsSource, UiRegistry,
    WorkspaceState};
use crate::repository::{GitStatusSnapshot, RepositoryState};
use crate::review::{PrProvider, ReviewMode};


/// Errors that abort an activation.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum ActivationError {
    /// No repository opened within the configured discovery timeout.
    #[error("timed out waiting for a git repository to open")]
    DiscoveryTimedOut,

    /// The discovery wait was cancelled through its cancellation handle.
    #[error("repository discovery was cancelled")]
    DiscoveryCancelled,

    /// The git collaborator stopped reporting before any repository opened.
    #[error("the git collaborator will not open a repository")]
    DiscoveryClosed,

    /// The status stream ended before the first notification arrived.
    #[error("status notifications ended before initialization could run")]
    StatusStreamClosed,

    /// Credential acquisition or the GitHub connection failed.
    #[error("GitHub connection failed: {0}")]
    Connection(#[from] CredentialError),

    /// Provider activation was rejected by the host.
    #[error("pull-request provider activation failed: {0}")]
    Provider(#[from] HostError),

    /// The initialization task itself failed to run to completion.
    #[error("initialization task failed: {message}")]
    Internal {
        /// Detail about the task failure.
        message: String,
    },
}

/// Lifecycle states of one activation, published through a watch channel.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ActivationState {
    /// Nothing has started yet.
    Idle,
    /// Waiting for the git collaborator to yield a repository.
    AwaitingRepository,
    /// Repository resolved; waiting for its first status notification.
    AwaitingFirstStatus,
    /// The latch has tripped; the one-time initialization chain has run or is
    /// running. [`Activation::settled`] reports its outcome.
    Initialized,
    /// Initialization failed; terminal for this activation.
    Failed {
        /// Rendering of the error that stopped initialization.
        message: String,
    },
}

/// Result of a bounded repository-discovery wait.
#[derive(Debug, Clone, PartialEq, Eq)]
enum DiscoveryOutcome {
    /// A repository was selected.
    Found(RepositoryHandle),
    /// The configured timeout elapsed first.
    TimedOut,
    /// The wait was cancelled through its handle.
    Cancelled,
}

/// Pure policy choosing among the repositories the collaborator knows about.
pub type RepositorySelection = fn(&[RepositoryHandle]) -> Option<RepositoryHandle>;

/// Default selection policy: the first known repository.
#[must_use]
pub fn select_first(handles: &[RepositoryHandle]) -> Option<RepositoryHandle> {
    handles.first().cloned()
}

/// Creates a linked cancellation handle and signal for a discovery wait.
#[must_use]
pub fn cancellation() -> (CancellationHandle, CancellationSignal) {
    let (tx, rx) = watch::channel(false);
    let tx = Arc::new(tx);
    (
        CancellationHandle {
            tx: Arc::clone(&tx),
        },
        CancellationSignal { rx, _tx: tx },
    )
}

/// Cancels a pending repository-discovery wait.
#[derive(Debug, Clone)]
pub struct CancellationHandle {
    tx: Arc<watch::Sender<bool>>,
}

impl CancellationHandle {
    /// Requests cancellation. Idempotent; has no effect once discovery has
    /// completed.
    pub fn cancel(&self) {
        self.tx.send_replace(true);
    }
}

/// The waiting side of a cancellation pair.
#[derive(Debug)]
pub struct CancellationSignal {
    rx: watch::Receiver<bool>,
    // Keeps the channel alive so dropping the handle never reads as a
    // cancellation.
    _tx: Arc<watch::Sender<bool>>,
}

impl CancellationSignal {
    /// Resolves once cancellation is requested; pends forever otherwise.
    async fn cancelled(mut self) {
        if self.rx.wait_for(|cancelled| *cancelled).await.is_err() {
            std::future::pending::<()>().await;
        }
    }
}

/// Keeps the settings-change listener running; dropping it stops the task.
struct SettingsListener {
    task: JoinHandle<()>,
}

impl Drop for SettingsListener {
    fn drop(&mut self) {
        self.task.abort();
    }
}

/// The subsystems stood up by a completed activation.
///
/// The settings-change listener armed during activation stays attached to the
/// workspace, so host settings keep flowing into the shared handle for as
/// long as the workspace lives.
pub struct ReviewWorkspace {
    /// Credential store the repository connected through.
    pub credentials: Arc<CredentialStore>,
    /// Review mode derived for the repository.
    pub review_mode: Arc<ReviewMode>,
    /// Activated pull-request UI provider.
    pub provider: Arc<PrProvider>,
    settings_listener: Option<SettingsListener>,
}

impl std::fmt::Debug for ReviewWorkspace {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ReviewWorkspace")
            .field("review_mode", &self.review_mode)
            .finish_non_exhaustive()
    }
}

/// Orchestrates one activation of the review workspace.
pub struct ActivationCoordinator {
    git: Arc<dyn GitExtension>,
    settings_source: Arc<dyn SettingsSource>,
    ui: Arc<dyn UiRegistry>,
    workspace_state: Arc<dyn WorkspaceState>,
    selection: RepositorySelection,
    discovery_timeout: Option<Duration>,
}

impl ActivationCoordinator {
    /// Creates a coordinator over the given host collaborators.
    #[must_use]
    pub fn new(
        git: Arc<dyn GitExtension>,
        settings_source: Arc<dyn SettingsSource>,
        ui: Arc<dyn UiRegistry>,
        workspace_state: Arc<dyn WorkspaceState>,
    ) -> Self {
        Self {
            git,
            settings_source,
            ui,
            workspace_state,
            selection: select_first,
            discovery_timeout: None,
        }
    }

    /// Replaces the repository selection policy.
    #[must_use]
    pub const fn with_selection(mut self, selection: RepositorySelection) -> Self {
        self.selection = selection;
        self
    }

    /// Bounds the wait for a repository to open.
    #[must_use]
    pub const fn with_discovery_timeout(mut self, timeout: Duration) -> Self {
        self.discovery_timeout = Some(timeout);
        self
    }

    /// Runs the activation up to the point where all listeners are armed.
    ///
    /// The call suspends while no repository is open yet, then returns an
    /// [`Activation`] whose state is `AwaitingFirstStatus`. The one-time
    /// initialization chain runs on its own task once the first status
    /// notification fires; await [`Activation::settled`] for its outcome.
    ///
    /// # Errors
    ///
    /// Returns a discovery error when no repository becomes available: the
    /// wait timed out, was cancelled, or the collaborator reported that no
    /// repository will ever open.
    pub async fn activate(
        self,
        cancel: CancellationSignal,
    ) -> Result<Activation, ActivationError> {
        let (state_tx, state_rx) = watch::channel(ActivationState::Idle);
        state_tx.send_replace(ActivationState::AwaitingRepository);

        let settings = SharedAuthSettings::new(self.settings_source.current());
        let settings_task =
            spawn_settings_listener(Arc::clone(&self.settings_source), settings.clone());

        let handle = match self.resolve_repository(cancel).await {
            Ok(DiscoveryOutcome::Found(handle)) => handle,
            Ok(DiscoveryOutcome::TimedOut) => {
                return Err(abandon(
                    &state_tx,
                    settings_task,
                    ActivationError::DiscoveryTimedOut,
                ));
            }
            Ok(DiscoveryOutcome::Cancelled) => {
                return Err(abandon(
                    &state_tx,
                    settings_task,
                    ActivationError::DiscoveryCancelled,
                ));
            }
            Err(error) => return Err(abandon(&state_tx, settings_task, error)),
        };

        let repository = Arc::new(RepositoryState::new(
            handle.workdir().to_owned(),
            Arc::clone(&self.workspace_state),
        ));
        let status_rx = repository.subscribe_status();
        state_tx.send_replace(ActivationState::AwaitingFirstStatus);

        let chain = InitChain {
            status_rx,
            state: state_tx,
            settings: settings.clone(),
            workspace_state: self.workspace_state,
            ui: self.ui,
            repository: Arc::clone(&repository),
            handle: handle.clone(),
        };
        let chain_task = tokio::spawn(chain.run());

        Ok(Activation {
            repository,
            repository_handle: handle,
            state: state_rx,
            settings,
            chain_task,
            settings_task,
        })
    }

    /// Resolves exactly one repository handle.
    ///
    /// Known repositories are consulted first and the selection policy picks
    /// one; only when that yields nothing is the one-shot opened-repository
    /// wait armed.
    async fn resolve_repository(
        &self,
        cancel: CancellationSignal,
    ) -> Result<DiscoveryOutcome, ActivationError> {
        let known = self.git.repositories();
        if let Some(chosen) = (self.selection)(&known) {
            tracing::debug!(repository = %chosen.workdir(), "using already-open repository");
            return Ok(DiscoveryOutcome::Found(chosen));
        }

        tracing::debug!("no repository open yet; waiting for the git collaborator");
        tokio::select! {
            opened = self.git.opened_repository() => match opened {
                Some(handle) => {
                    tracing::debug!(repository = %handle.workdir(), "repository opened");
                    Ok(DiscoveryOutcome::Found(handle))
                }
                None => Err(ActivationError::DiscoveryClosed),
            },
            () = cancel.cancelled() => Ok(DiscoveryOutcome::Cancelled),
            () = discovery_deadline(self.discovery_timeout) => Ok(DiscoveryOutcome::TimedOut),
        }
    }
}

impl std::fmt::Debug for ActivationCoordinator {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ActivationCoordinator")
            .field("discovery_timeout", &self.discovery_timeout)
            .finish_non_exhaustive()
    }
}

/// A running activation: listeners are armed, the chain settles on its own.
pub struct Activation {
    repository: Arc<RepositoryState>,
    repository_handle: RepositoryHandle,
    state: watch::Receiver<ActivationState>,
    settings: SharedAuthSettings,
    chain_task: JoinHandle<Result<ReviewWorkspace, ActivationError>>,
    settings_task: JoinHandle<()>,
}

impl Activation {
    /// Returns the repository state constructed for this activation.
    #[must_use]
    pub const fn repository(&self) -> &Arc<RepositoryState> {
        &self.repository
    }

    /// Returns the handle the repository was discovered under.
    #[must_use]
    pub const fn repository_handle(&self) -> &RepositoryHandle {
        &self.repository_handle
    }

    /// Returns the current lifecycle state.
    #[must_use]
    pub fn state(&self) -> ActivationState {
        self.state.borrow().clone()
    }

    /// Returns a receiver observing every state transition.
    #[must_use]
    pub fn watch_state(&self) -> watch::Receiver<ActivationState> {
        self.state.clone()
    }

    /// Returns the shared settings handle kept current by the change
    /// listener.
    #[must_use]
    pub const fn auth_settings(&self) -> &SharedAuthSettings {
        &self.settings
    }

    /// Waits for the one-time initialization chain to finish.
    ///
    /// On success the settings-change listener moves into the returned
    /// workspace and keeps applying host updates to the shared handle; on
    /// failure it is stopped along with the activation.
    ///
    /// # Errors
    ///
    /// Returns the chain's error: connection or provider failures from the
    /// `Initialized` transition, [`ActivationError::StatusStreamClosed`] when
    /// no status notification can ever arrive, or
    /// [`ActivationError::Internal`] when the chain task did not run to
    /// completion.
    pub async fn settled(self) -> Result<ReviewWorkspace, ActivationError> {
        match self.chain_task.await {
            Ok(Ok(mut workspace)) => {
                workspace.settings_listener = Some(SettingsListener {
                    task: self.settings_task,
                });
                Ok(workspace)
            }
            Ok(Err(error)) => {
                self.settings_task.abort();
                Err(error)
            }
            Err(error) => {
                self.settings_task.abort();
                Err(ActivationError::Internal {
                    message: error.to_string(),
                })
            }
        }
    }
}

impl std::fmt::Debug for Activation {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Activation")
            .field("repository_handle", &self.repository_handle)
            .field("state", &self.state())
            .finish_non_exhaustive()
    }
}

/// Marks the activation failed and tears down the settings listener.
fn abandon(
    state: &watch::Sender<ActivationState>,
    settings_task: JoinHandle<()>,
    error: ActivationError,
) -> ActivationError {
    settings_task.abort();
    state.send_replace(ActivationState::Failed {
        message: error.to_string(),
    });
    error
}

/// Applies every settings-change notification to the shared handle.
fn spawn_settings_listener(
    source: Arc<dyn SettingsSource>,
    settings: SharedAuthSettings,
) -> JoinHandle<()> {
    tokio::spawn(async move {
        while let Some(updated) = source.changed().await {
            settings.update(updated.identity, updated.host, updated.access_token);
        }
        tracing::debug!("settings-change stream ended");
    })
}

/// Sleeps for the discovery timeout, or pends forever when unbounded.
async fn discovery_deadline(timeout: Option<Duration>) {
    match timeout {
        Some(duration) => tokio::time::sleep(duration).await,
        None => std::future::pending().await,
    }
}

/// The one-time, status-triggered initialization chain.
struct InitChain {
    status_rx: broadcast::Receiver<GitStatusSnapshot>,
    state: watch::Sender<ActivationState>,
    settings: SharedAuthSettings,
    workspace_state: Arc<dyn WorkspaceState>,
    ui: Arc<dyn UiRegistry>,
    repository: Arc<RepositoryState>,
    handle: RepositoryHandle,
}

impl InitChain {
    async fn run(mut self) -> Result<ReviewWorkspace, ActivationError> {
        self.await_first_status().await?;
        if !self.trip_latch() {
            // Another trip already happened; repeated notifications must not
            // re-run the chain.
            return Err(ActivationError::Internal {
                message: "initialization latch already tripped".to_owned(),
            });
        }
        match self.build_review_workspace().await {
            Ok(workspace) => Ok(workspace),
            Err(error) => {
                tracing::warn!(%error, "review workspace initialization failed");
                self.state.send_replace(ActivationState::Failed {
                    message: error.to_string(),
                });
                Err(error)
            }
        }
    }

    /// Waits for the first status notification.
    async fn await_first_status(&mut self) -> Result<(), ActivationError> {
        match self.status_rx.recv().await {
            // A lagged receiver still proves that status ran.
            Ok(_) | Err(broadcast::error::RecvError::Lagged(_)) => Ok(()),
            Err(broadcast::error::RecvError::Closed) => {
                let error = ActivationError::StatusStreamClosed;
                self.state.send_replace(ActivationState::Failed {
                    message: error.to_string(),
                });
                Err(error)
            }
        }
    }

    /// Check-and-set into `Initialized`; returns whether this call tripped
    /// the latch.
    fn trip_latch(&self) -> bool {
        self.state.send_if_modified(|state| {
            if matches!(state, ActivationState::AwaitingFirstStatus) {
                *state = ActivationState::Initialized;
                true
            } else {
                false
            }
        })
    }

    /// The strictly sequential downstream chain: credentials, connection,
    /// review mode, provider activation.
    async fn build_review_workspace(&self) -> Result<ReviewWorkspace, ActivationError> {
        let credentials = Arc::new(CredentialStore::new(self.settings.clone()));
        self.repository
            .connect_github(Arc::clone(&credentials))
            .await?;

        let review_mode = Arc::new(ReviewMode::new(
            Arc::clone(&self.repository),
            Arc::clone(&self.workspace_state),
            self.handle.clone(),
        ));

        let provider = Arc::new(PrProvider::new(
            self.settings.clone(),
            Arc::clone(&review_mode),
            Arc::clone(&self.ui),
        ));
        provider.activate(&self.repository).await?;

        tracing::info!(
            repository = %self.handle.workdir(),
            "pull-request review workspace initialized"
        );
        Ok(ReviewWorkspace {
            credentials,
            review_mode,
            provider,
            settings_listener: None,
        })
    }
}
