//! libgit2-backed host collaborators.
//!
//! When the crate runs outside an editor there is no git extension to lean
//! on, so this module supplies one: [`Git2Extension`] discovers the working
//! copy containing a starting path and reports it through the
//! [`GitExtension`] trait, and [`GitStatusReader`] recomputes git status and
//! publishes snapshots into a [`RepositoryState`].

use std::sync::Mutex;

use async_trait::async_trait;
use camino::{Utf8Path, Utf8PathBuf};
use git2::{Repository, Status, StatusOptions};
use thiserror::Error;

use crate::host::{GitExtension, RepositoryHandle};
use crate::repository::{GitStatusSnapshot, RepositoryState};


/// Remote consulted for the repository's origin URL.
const DEFAULT_REMOTE_NAME: &str = "origin";

/// Errors from the libgit2-backed collaborators.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum GitHostError {
    /// The starting path is not inside a git repository.
    #[error("not inside a git repository")]
    NotARepository,

    /// The repository has no working directory (bare repository).
    #[error("repository has no working directory")]
    BareRepository,

    /// The working directory path is not valid UTF-8.
    #[error("repository path is not valid UTF-8: {path}")]
    NonUtf8Path {
        /// Lossy rendering of the offending path.
        path: String,
    },

    /// libgit2 reported an error.
    #[error("git error: {message}")]
    Git {
        /// Error detail from the git2 library.
        message: String,
    },
}

impl From<git2::Error> for GitHostError {
    fn from(error: git2::Error) -> Self {
        Self::Git {
            message: error.message().to_owned(),
        }
    }
}

/// Git collaborator that discovers the working copy at construction.
///
/// A standalone process has exactly one checkout to work with, so discovery
/// happens up front and [`opened_repository`](GitExtension::opened_repository)
/// reports that no further repository will ever open.
#[derive(Debug, Clone)]
pub struct Git2Extension {
    known: Vec<RepositoryHandle>,
}

impl Git2Extension {
    /// Discovers the repository containing `start_path`.
    ///
    /// # Errors
    ///
    /// Returns [`GitHostError::NotARepository`] when no repository contains
    /// the path, [`GitHostError::BareRepository`] for bare repositories, and
    /// [`GitHostError::NonUtf8Path`] when the working directory path cannot
    /// be represented as UTF-8.
    pub fn discover(start_path: &Utf8Path) -> Result<Self, GitHostError> {
        let repo = Repository::discover(start_path.as_std_path()).map_err(|error| {
            if error.code() == git2::ErrorCode::NotFound {
                GitHostError::NotARepository
            } else {
                GitHostError::from(error)
            }
        })?;
        let workdir = repo
            .workdir()
            .ok_or(GitHostError::BareRepository)?
            .to_path_buf();
        let workdir =
            Utf8PathBuf::from_path_buf(workdir).map_err(|path| GitHostError::NonUtf8Path {
                path: path.display().to_string(),
            })?;
        let remote_url = repo
            .find_remote(DEFAULT_REMOTE_NAME)
            .ok()
            .and_then(|remote| remote.url().map(ToOwned::to_owned));

        Ok(Self {
            known: vec![RepositoryHandle::new(workdir, remote_url)],
        })
    }
}

#[async_trait]
impl GitExtension for Git2Extension {
    fn repositories(&self) -> Vec<RepositoryHandle> {
        self.known.clone()
    }

    async fn opened_repository(&self) -> Option<RepositoryHandle> {
        None
    }
}

/// Computes git status snapshots for a working copy.
///
/// Wraps the repository in a `Mutex` because `git2::Repository` is not
/// `Sync`, which keeps the reader usable from async contexts.
pub struct GitStatusReader {
    repo: Mutex<Repository>,
}

impl GitStatusReader {
    /// Opens the repository at `workdir`.
    ///
    /// # Errors
    ///
    /// Returns [`GitHostError::Git`] when the repository cannot be opened.
    pub fn open(workdir: &Utf8Path) -> Result<Self, GitHostError> {
        let repo = Repository::open(workdir.as_std_path())?;
        Ok(Self {
            repo: Mutex::new(repo),
        })
    }

    /// Computes the current status snapshot.
    ///
    /// # Errors
    ///
    /// Returns [`GitHostError::Git`] when libgit2 cannot compute status.
    pub fn read(&self) -> Result<GitStatusSnapshot, GitHostError> {
        #[expect(
            clippy::expect_used,
            reason = "Mutex poisoning is an unrecoverable error"
        )]
        let repo = self.repo.lock().expect("git repository mutex poisoned");

        let (branch, head_sha) = match repo.head() {
            Ok(head) => {
                let branch = if head.is_branch() {
                    head.shorthand().map(ToOwned::to_owned)
                } else {
                    None
                };
                let head_sha = head.peel_to_commit().ok().map(|commit| commit.id().to_string());
                (branch, head_sha)
            }
            // A freshly initialized repository has no HEAD to report yet.
            Err(error)
                if matches!(
                    error.code(),
                    git2::ErrorCode::UnbornBranch | git2::ErrorCode::NotFound
                ) =>
            {
                (None, None)
            }
            Err(error) => return Err(GitHostError::from(error)),
        };

        let mut options = StatusOptions::new();
        options.include_untracked(true);
        let statuses = repo.statuses(Some(&mut options))?;

        let mut snapshot = GitStatusSnapshot {
            branch,
            head_sha,
            ..GitStatusSnapshot::default()
        };
        for entry in statuses.iter() {
            let status = entry.status();
            if status.intersects(
                Status::INDEX_NEW
                    | Status::INDEX_MODIFIED
                    | Status::INDEX_DELETED
                    | Status::INDEX_RENAMED
                    | Status::INDEX_TYPECHANGE,
            ) {
                snapshot.staged += 1;
            }
            if status.intersects(
                Status::WT_MODIFIED
                    | Status::WT_DELETED
                    | Status::WT_RENAMED
                    | Status::WT_TYPECHANGE,
            ) {
                snapshot.unstaged += 1;
            }
            if status.contains(Status::WT_NEW) {
                snapshot.untracked += 1;
            }
        }
        Ok(snapshot)
    }

    /// Recomputes status and publishes the snapshot to `repository`.
    ///
    /// # Errors
    ///
    /// Returns [`GitHostError::Git`] when the status computation fails.
    pub fn refresh(&self, repository: &RepositoryState) -> Result<(), GitHostError> {
        let snapshot = self.read()?;
        tracing::debug!(
            branch = snapshot.branch.as_deref().unwrap_or("(none)"),
            staged = snapshot.staged,
            unstaged = snapshot.unstaged,
            untracked = snapshot.untracked,
            "git status recomputed"
        );
        repository.record_status(snapshot);
        Ok(())
    }
}

impl std::fmt::Debug for GitStatusReader {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("GitStatusReader")
            .field("repo", &"<git2::Repository>")
            .finish()
    }
}
