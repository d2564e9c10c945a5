//! Review mode: interpreting a repository as an in-editor review session.
//!
//! [`ReviewMode`] derives the pull-request review context for a connected
//! repository, remembering the active pull request across sessions through
//! the opaque workspace state. [`PrProvider`] (in [`provider`]) binds UI
//! surfaces to a review mode instance. Both are constructed by the activation
//! coordinator only after the repository's GitHub connection has completed.

use std::sync::Arc;

use serde_json::Value;

use crate::host::{RepositoryHandle, WorkspaceState};
use crate::repository::RepositoryState;

mod provider;
#[cfg(test)]
mod tests;

pub use provider::PrProvider;

/// Workspace-state key remembering the pull request last under review.
const LAST_PULL_REQUEST_KEY: &str = "review.lastPullRequest";

/// Point-in-time description of what is being reviewed.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ReviewContext {
    /// Branch currently checked out, from the latest status snapshot.
    pub branch: Option<String>,
    /// Pull request number remembered from an earlier session, if any.
    pub remembered_pull_request: Option<u64>,
}

/// Derives review context from repository state, workspace state, and the
/// discovered repository handle.
pub struct ReviewMode {
    repository: Arc<RepositoryState>,
    workspace_state: Arc<dyn WorkspaceState>,
    handle: RepositoryHandle,
}

impl ReviewMode {
    /// Creates the review mode for a connected repository.
    #[must_use]
    pub const fn new(
        repository: Arc<RepositoryState>,
        workspace_state: Arc<dyn WorkspaceState>,
        handle: RepositoryHandle,
    ) -> Self {
        Self {
            repository,
            workspace_state,
            handle,
        }
    }

    /// Returns the repository state under review.
    #[must_use]
    pub const fn repository(&self) -> &Arc<RepositoryState> {
        &self.repository
    }

    /// Returns the handle the repository was discovered under.
    #[must_use]
    pub const fn repository_handle(&self) -> &RepositoryHandle {
        &self.handle
    }

    /// Computes the current review context.
    #[must_use]
    pub fn context(&self) -> ReviewContext {
        let branch = self
            .repository
            .last_status()
            .and_then(|status| status.branch);
        let remembered_pull_request = self
            .workspace_state
            .get(LAST_PULL_REQUEST_KEY)
            .and_then(|value| value.as_u64());
        ReviewContext {
            branch,
            remembered_pull_request,
        }
    }

    /// Persists `number` as the pull request under review.
    pub fn remember_pull_request(&self, number: u64) {
        self.workspace_state
            .insert(LAST_PULL_REQUEST_KEY, Value::from(number));
    }
}

impl std::fmt::Debug for ReviewMode {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ReviewMode")
            .field("repository", &self.repository)
            .field("handle", &self.handle)
            .finish_non_exhaustive()
    }
}
