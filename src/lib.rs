//! Berth turns a local git checkout into a GitHub pull-request review
//! workspace.
//!
//! The crate owns the bootstrap and lifecycle-coordination layer of that
//! workspace: it obtains the active git repository from a host-provided git
//! collaborator, keeps the shared authentication settings current, and, on
//! the first git status notification, connects to GitHub and stands up the
//! review mode and the pull-request UI provider exactly once. The status
//! stream keeps firing for as long as the repository lives; a latch inside
//! [`activation::ActivationCoordinator`] makes every notification after the
//! first a no-op.
//!
//! Everything the coordinator composes but does not own sits behind the
//! collaborator traits in [`host`]: the git extension that reports open
//! repositories, the settings surface, the persisted workspace state, and the
//! UI registry the provider binds surfaces to. The [`git`] and [`workspace`]
//! modules supply libgit2- and file-backed implementations of those traits so
//! the crate also runs as a standalone binary outside an editor host.

pub mod activation;
pub mod config;
pub mod credentials;
pub mod git;
pub mod host;
pub mod repository;
pub mod review;
pub mod workspace;

pub use activation::{
    Activation, ActivationCoordinator, ActivationError, ActivationState, CancellationHandle,
    CancellationSignal, ReviewWorkspace,
};
pub use config::{AuthSettings, BerthConfig, SharedAuthSettings};
pub use credentials::{CredentialError, CredentialStore, GitHubSession};
pub use host::{
    GitExtension, HostError, RepositoryHandle, SettingsSource, UiRegistry, UiSurface,
    WorkspaceState,
};
pub use repository::{GitStatusSnapshot, RepositoryState};
pub use review::{PrProvider, ReviewContext, ReviewMode};
