//! Tests for review context derivation and provider activation.

use std::sync::Arc;

use camino::Utf8PathBuf;
use serde_json::json;

use crate::config::{AuthSettings, SharedAuthSettings};
use crate::credentials::CredentialStore;
use crate::host::{
    InMemoryWorkspaceState, MockUiRegistry, RepositoryHandle, UiSurface, WorkspaceState,
};
use crate::repository::{GitStatusSnapshot, RepositoryState};

use super::{PrProvider, ReviewMode};

fn handle() -> RepositoryHandle {
    RepositoryHandle::new(Utf8PathBuf::from("/work/checkout"), None)
}

fn review_mode_over(workspace_state: Arc<InMemoryWorkspaceState>) -> ReviewMode {
    let repository = Arc::new(RepositoryState::new(
        Utf8PathBuf::from("/work/checkout"),
        Arc::clone(&workspace_state) as Arc<dyn WorkspaceState>,
    ));
    ReviewMode::new(repository, workspace_state, handle())
}

#[test]
fn context_is_empty_before_any_status_or_memory() {
    let review = review_mode_over(Arc::new(InMemoryWorkspaceState::new()));

    let context = review.context();

    assert_eq!(context.branch, None);
    assert_eq!(context.remembered_pull_request, None);
}

#[test]
fn context_reads_branch_and_remembered_pull_request() {
    let workspace_state = Arc::new(InMemoryWorkspaceState::new());
    workspace_state.insert("review.lastPullRequest", json!(1347));
    let review = review_mode_over(workspace_state);
    review.repository().record_status(GitStatusSnapshot {
        branch: Some("feature/login".to_owned()),
        ..GitStatusSnapshot::default()
    });

    let context = review.context();

    assert_eq!(context.branch.as_deref(), Some("feature/login"));
    assert_eq!(context.remembered_pull_request, Some(1347));
}

#[test]
fn remember_pull_request_persists_through_workspace_state() {
    let workspace_state = Arc::new(InMemoryWorkspaceState::new());
    let review = review_mode_over(Arc::clone(&workspace_state));

    review.remember_pull_request(42);

    assert_eq!(workspace_state.get("review.lastPullRequest"), Some(json!(42)));
    assert_eq!(review.context().remembered_pull_request, Some(42));
}

#[tokio::test]
async fn activate_registers_surfaces_titled_from_context_and_session() {
    let settings = SharedAuthSettings::new(AuthSettings {
        identity: Some("hubot".to_owned()),
        ..AuthSettings::default()
    });
    let workspace_state: Arc<dyn WorkspaceState> = Arc::new(InMemoryWorkspaceState::new());
    let repository = Arc::new(RepositoryState::new(
        Utf8PathBuf::from("/work/checkout"),
        Arc::clone(&workspace_state),
    ));
    repository
        .connect_github(Arc::new(CredentialStore::new(settings.clone())))
        .await
        .expect("connection should succeed");
    repository.record_status(GitStatusSnapshot {
        branch: Some("feature/login".to_owned()),
        ..GitStatusSnapshot::default()
    });
    let review = Arc::new(ReviewMode::new(
        Arc::clone(&repository),
        workspace_state,
        handle(),
    ));

    let mut ui = MockUiRegistry::new();
    ui.expect_register()
        .withf(|surface| {
            matches!(
                surface,
                UiSurface::PullRequestTree { title } if title == "Pull requests (feature/login)"
            )
        })
        .times(1)
        .returning(|_| Ok(()));
    ui.expect_register()
        .withf(|surface| {
            matches!(
                surface,
                UiSurface::DescriptionView { title } if title == "Review as hubot"
            )
        })
        .times(1)
        .returning(|_| Ok(()));

    let provider = PrProvider::new(settings, review, Arc::new(ui));
    provider
        .activate(&repository)
        .await
        .expect("activation should succeed");

    assert_eq!(provider.registered_surfaces().len(), 2);
}

#[tokio::test]
async fn activate_falls_back_to_anonymous_without_identity() {
    let settings = SharedAuthSettings::default();
    let workspace_state: Arc<dyn WorkspaceState> = Arc::new(InMemoryWorkspaceState::new());
    let repository = Arc::new(RepositoryState::new(
        Utf8PathBuf::from("/work/checkout"),
        Arc::clone(&workspace_state),
    ));
    let review = Arc::new(ReviewMode::new(
        Arc::clone(&repository),
        workspace_state,
        handle(),
    ));

    let mut ui = MockUiRegistry::new();
    ui.expect_register()
        .withf(|surface| matches!(surface, UiSurface::PullRequestTree { title } if title == "Pull requests"))
        .times(1)
        .returning(|_| Ok(()));
    ui.expect_register()
        .withf(|surface| {
            matches!(surface, UiSurface::DescriptionView { title } if title == "Review as anonymous")
        })
        .times(1)
        .returning(|_| Ok(()));

    let provider = PrProvider::new(settings, review, Arc::new(ui));
    provider
        .activate(&repository)
        .await
        .expect("activation should succeed");
}
